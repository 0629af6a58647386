//! Minimal HTML template renderer.
//!
//! Syntax:
//! - `{{name}}` inserts an HTML-escaped value
//! - `{{#if name}}...{{/if}}` keeps its body when `name` is non-empty
//! - `{{#each name}}...{{.}}...{{/each}}` repeats its body per list item

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

const BUILTIN: &[(&str, &str)] = &[
    ("input", include_str!("../templates/input.html")),
    ("submitted", include_str!("../templates/submitted.html")),
    ("error", include_str!("../templates/error.html")),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),
    #[error("could not read template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template syntax error: {0}")]
    Syntax(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    List(Vec<String>),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Text(s) => !s.is_empty(),
            Value::List(v) => !v.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::List(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Text(if b { "1".into() } else { String::new() })
    }
}

pub type Vars = BTreeMap<String, Value>;

/// Looks templates up in an optional override directory first, then in the
/// built-in set.
pub struct TemplateRenderer {
    dir: Option<PathBuf>,
}

impl TemplateRenderer {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn render(&self, name: &str, vars: &Vars) -> Result<String, TemplateError> {
        let src = self.source(name)?;
        render_str(&src, vars)
    }

    fn source(&self, name: &str) -> Result<Cow<'static, str>, TemplateError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.html"));
            match std::fs::read_to_string(&path) {
                Ok(s) => return Ok(Cow::Owned(s)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(TemplateError::Read { path, source }),
            }
        }
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| Cow::Borrowed(*s))
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }
}

#[derive(Debug)]
enum Node<'a> {
    Text(&'a str),
    Var(&'a str),
    Item,
    If(&'a str, Vec<Node<'a>>),
    Each(&'a str, Vec<Node<'a>>),
}

pub fn render_str(src: &str, vars: &Vars) -> Result<String, TemplateError> {
    let nodes = parse(src)?;
    let mut out = String::with_capacity(src.len());
    emit(&nodes, vars, None, &mut out);
    Ok(out)
}

fn parse(src: &str) -> Result<Vec<Node<'_>>, TemplateError> {
    // Open blocks: (kind, name, children collected so far).
    let mut stack: Vec<(&str, &str, Vec<Node>)> = vec![("root", "", Vec::new())];
    let mut rest = src;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            push(&mut stack, Node::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::Syntax("unterminated '{{'".into()))?;
        let tag = after[..end].trim();
        rest = &after[end + 2..];

        if let Some(name) = tag.strip_prefix("#if ") {
            stack.push(("if", name.trim(), Vec::new()));
        } else if let Some(name) = tag.strip_prefix("#each ") {
            stack.push(("each", name.trim(), Vec::new()));
        } else if let Some(kind) = tag.strip_prefix('/') {
            let (open, name, children) = stack
                .pop()
                .filter(|(k, _, _)| *k != "root")
                .ok_or_else(|| TemplateError::Syntax(format!("unexpected '{{{{/{kind}}}}}'")))?;
            if open != kind {
                return Err(TemplateError::Syntax(format!(
                    "'{{{{/{kind}}}}}' closes an open '{open}' block"
                )));
            }
            let node = if open == "if" {
                Node::If(name, children)
            } else {
                Node::Each(name, children)
            };
            push(&mut stack, node);
        } else if tag == "." {
            push(&mut stack, Node::Item);
        } else if tag.is_empty() {
            return Err(TemplateError::Syntax("empty tag".into()));
        } else {
            push(&mut stack, Node::Var(tag));
        }
    }
    if !rest.is_empty() {
        push(&mut stack, Node::Text(rest));
    }

    match stack.pop() {
        Some(("root", _, nodes)) if stack.is_empty() => Ok(nodes),
        Some((kind, name, _)) => Err(TemplateError::Syntax(format!(
            "unclosed '{kind} {name}' block"
        ))),
        None => Err(TemplateError::Syntax("empty template stack".into())),
    }
}

fn push<'a>(stack: &mut [(&'a str, &'a str, Vec<Node<'a>>)], node: Node<'a>) {
    if let Some((_, _, children)) = stack.last_mut() {
        children.push(node);
    }
}

fn emit(nodes: &[Node], vars: &Vars, item: Option<&str>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(name) => match vars.get(*name) {
                Some(Value::Text(s)) => out.push_str(&escape_html(s)),
                Some(Value::List(v)) => out.push_str(&escape_html(&v.join(", "))),
                None => {}
            },
            Node::Item => {
                if let Some(i) = item {
                    out.push_str(&escape_html(i));
                }
            }
            Node::If(name, body) => {
                if vars.get(*name).is_some_and(Value::is_truthy) {
                    emit(body, vars, item, out);
                }
            }
            Node::Each(name, body) => match vars.get(*name) {
                Some(Value::List(items)) => {
                    for i in items {
                        emit(body, vars, Some(i.as_str()), out);
                    }
                }
                Some(Value::Text(s)) if !s.is_empty() => emit(body, vars, Some(s.as_str()), out),
                _ => {}
            },
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitution_is_escaped() {
        let v = vars(&[("name", "<b>R&D</b>".into())]);
        assert_eq!(
            render_str("Hello {{ name }}!", &v).unwrap(),
            "Hello &lt;b&gt;R&amp;D&lt;/b&gt;!"
        );
        assert_eq!(render_str("[{{missing}}]", &v).unwrap(), "[]");
    }

    #[test]
    fn test_if_and_each_blocks() {
        let v = vars(&[
            ("errors", vec!["bad e-mail".to_string(), "x < y".to_string()].into()),
            ("devel", true.into()),
            ("warnings", Vec::<String>::new().into()),
        ]);
        let src = "{{#if devel}}DEV {{/if}}{{#if warnings}}W{{/if}}<ul>{{#each errors}}<li>{{.}}</li>{{/each}}</ul>";
        assert_eq!(
            render_str(src, &v).unwrap(),
            "DEV <ul><li>bad e-mail</li><li>x &lt; y</li></ul>"
        );
    }

    #[test]
    fn test_nested_blocks() {
        let v = vars(&[
            ("items", vec!["a".to_string(), "b".to_string()].into()),
            ("show", "yes".into()),
        ]);
        let src = "{{#each items}}{{#if show}}({{.}}){{/if}}{{/each}}";
        assert_eq!(render_str(src, &v).unwrap(), "(a)(b)");
    }

    #[test]
    fn test_syntax_errors() {
        let v = Vars::new();
        assert!(matches!(render_str("{{name", &v), Err(TemplateError::Syntax(_))));
        assert!(matches!(render_str("{{#if a}}x", &v), Err(TemplateError::Syntax(_))));
        assert!(matches!(render_str("x{{/if}}", &v), Err(TemplateError::Syntax(_))));
        assert!(matches!(
            render_str("{{#each a}}{{/if}}", &v),
            Err(TemplateError::Syntax(_))
        ));
    }

    #[test]
    fn test_override_dir_and_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("error.html"), "custom {{heading}}").unwrap();
        let renderer = TemplateRenderer::new(Some(dir.path().to_path_buf()));
        let v = vars(&[("heading", "TCA".into())]);

        assert_eq!(renderer.render("error", &v).unwrap(), "custom TCA");
        assert!(renderer.render("submitted", &v).is_ok());
        assert!(matches!(
            renderer.render("nonexistent", &v),
            Err(TemplateError::NotFound(_))
        ));
    }
}

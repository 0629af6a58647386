//! HTML form decoding: query strings, URL-encoded bodies and multipart uploads.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("multipart request without a boundary")]
    MissingBoundary,
    #[error("malformed multipart body: {0}")]
    Malformed(&'static str),
    #[error("unsupported form content type '{0}'")]
    UnsupportedContentType(String),
}

/// A file received through a `<input type="file">` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-side file name, without any directory part.
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Decoded form fields. Every field may repeat (multi-select inputs).
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: BTreeMap<String, Vec<String>>,
    uploads: BTreeMap<String, Upload>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the query string and body of a request.
    pub fn from_request(
        query: Option<&str>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Self, FormError> {
        let mut form = FormData::new();
        if let Some(q) = query {
            form.extend_urlencoded(q);
        }
        if body.is_empty() {
            return Ok(form);
        }

        let ct = content_type.unwrap_or("application/x-www-form-urlencoded");
        let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "application/x-www-form-urlencoded" | "" => {
                form.extend_urlencoded(&String::from_utf8_lossy(body));
            }
            "multipart/form-data" => {
                let boundary = boundary_param(ct).ok_or(FormError::MissingBoundary)?;
                form.extend_multipart(body, &boundary)?;
            }
            other => return Err(FormError::UnsupportedContentType(other.to_string())),
        }
        Ok(form)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    pub fn insert_upload(&mut self, name: impl Into<String>, upload: Upload) {
        self.uploads.insert(name.into(), upload);
    }

    /// First raw value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// First value of a field, trimmed, or `None` if it is blank.
    pub fn get_nonempty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|s| !s.is_empty())
    }

    /// All non-blank values of a field, trimmed, in submission order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .get(name)
            .map(|v| {
                v.iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn upload(&self, name: &str) -> Option<&Upload> {
        self.uploads.get(name)
    }

    pub fn extend_urlencoded(&mut self, input: &str) {
        for pair in input.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            self.insert(percent_decode(key), percent_decode(value));
        }
    }

    fn extend_multipart(&mut self, body: &[u8], boundary: &str) -> Result<(), FormError> {
        let delim = format!("--{boundary}").into_bytes();
        // Past the opening one, a delimiter only counts at the start of a line.
        let line_delim = format!("\n--{boundary}").into_bytes();
        let mut pos = find(body, &delim, 0).ok_or(FormError::Malformed("no opening boundary"))?;

        loop {
            pos += delim.len();
            let rest = &body[pos..];
            if rest.starts_with(b"--") {
                return Ok(());
            }
            if rest.starts_with(b"\r\n") {
                pos += 2;
            } else if rest.starts_with(b"\n") {
                pos += 1;
            } else {
                return Err(FormError::Malformed("boundary not followed by a line break"));
            }

            let next = find(body, &line_delim, pos)
                .ok_or(FormError::Malformed("missing closing boundary"))?;
            let part = &body[pos..next];
            let part = part.strip_suffix(b"\r").unwrap_or(part);
            self.add_part(part)?;
            pos = next + 1;
        }
    }

    fn add_part(&mut self, part: &[u8]) -> Result<(), FormError> {
        let (head, content) = split_headers(part).ok_or(FormError::Malformed("part without header block"))?;
        let head = String::from_utf8_lossy(head);

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in head.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "content-disposition" => {
                    for param in value.split(';').skip(1) {
                        if let Some((k, v)) = param.split_once('=') {
                            let v = v.trim().trim_matches('"').to_string();
                            match k.trim() {
                                "name" => name = Some(v),
                                "filename" => filename = Some(v),
                                _ => {}
                            }
                        }
                    }
                }
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let name = name.ok_or(FormError::Malformed("part without a field name"))?;
        match filename {
            // An empty file input still sends a part; there is nothing to keep.
            Some(f) if f.is_empty() => {}
            Some(f) => {
                let base = f.rsplit(['/', '\\']).next().unwrap_or(&f).to_string();
                self.insert_upload(
                    name,
                    Upload {
                        filename: base,
                        content_type,
                        data: content.to_vec(),
                    },
                );
            }
            None => self.insert(name, String::from_utf8_lossy(content).into_owned()),
        }
        Ok(())
    }
}

/// Percent-decode a URL-encoded component; `+` becomes a space.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push(h << 4 | l);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn boundary_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        (k.trim().eq_ignore_ascii_case("boundary"))
            .then(|| v.trim().trim_matches('"').to_string())
            .filter(|b| !b.is_empty())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn split_headers(part: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(p) = find(part, b"\r\n\r\n", 0) {
        return Some((&part[..p], &part[p + 4..]));
    }
    find(part, b"\n\n", 0).map(|p| (&part[..p], &part[p + 2..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Method::Get,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Split a request target (`/path?query`) into its parts.
    pub fn from_target(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: if path.is_empty() { "/".into() } else { path.to_string() },
            query,
            content_type: None,
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            location: None,
            body,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            content_type: "text/plain; charset=utf-8",
            location: Some(location.to_string()),
            body: format!("Moved to {location}"),
        }
    }

    pub fn not_found() -> Self {
        Self::plain(404, "Not found")
    }

    pub fn method_not_allowed() -> Self {
        Self::plain(405, "Method not allowed")
    }

    pub fn payload_too_large() -> Self {
        Self::plain(413, "Request body too large")
    }

    pub fn internal_error(message: &str) -> Self {
        Self::plain(500, message)
    }

    fn plain(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            location: None,
            body: body.to_string(),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            302 => "Found",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_split() {
        let r = HttpRequest::from_target(Method::Get, "/actca?sid=abc&rm=input");
        assert_eq!(r.path, "/actca");
        assert_eq!(r.query.as_deref(), Some("sid=abc&rm=input"));

        let r = HttpRequest::from_target(Method::parse("post"), "");
        assert_eq!(r.method, Method::Post);
        assert_eq!(r.path, "/");
        assert_eq!(r.query, None);
    }
}

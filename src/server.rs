//! HTTP front-ends: a standalone `tiny_http` server and a one-shot CGI adapter.
//!
//! Both only translate between their transport and `HttpRequest`/`HttpResponse`;
//! everything else happens in the controller.

use crate::http::{HttpRequest, HttpResponse, Method};
use crate::orchestrator::Controller;
use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};
use std::sync::Arc;
use tiny_http::{Header, Request, Response, Server};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

/// Upper bound on an accepted request body.
const MAX_BODY: u64 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("request body exceeds {limit} bytes")]
pub(crate) struct BodyTooLarge {
    pub limit: u64,
}

/// Read a whole body, failing rather than truncating past `limit`.
fn read_body(reader: impl Read, limit: u64, body: &mut Vec<u8>) -> Result<()> {
    reader
        .take(limit + 1)
        .read_to_end(body)
        .context("read request body")?;
    if body.len() as u64 > limit {
        return Err(BodyTooLarge { limit }.into());
    }
    Ok(())
}

fn error_response(e: &anyhow::Error) -> HttpResponse {
    if e.downcast_ref::<BodyTooLarge>().is_some() {
        HttpResponse::payload_too_large()
    } else {
        HttpResponse::internal_error("Could not read request")
    }
}

pub(crate) async fn serve(app: Arc<Controller>, bind: &str) -> Result<()> {
    let server = Server::http(bind).map_err(|e| anyhow!("bind {bind}: {e}"))?;
    let server = Arc::new(server);
    info!(%bind, "listening");

    let runtime = Handle::current();
    let mut accept = {
        let server = Arc::clone(&server);
        tokio::task::spawn_blocking(move || {
            for request in server.incoming_requests() {
                let app = Arc::clone(&app);
                runtime.spawn_blocking(move || handle_request(&app, request));
            }
        })
    };

    tokio::select! {
        res = &mut accept => {
            res.context("accept loop failed")?;
            return Ok(());
        }
        res = tokio::signal::ctrl_c() => {
            res.context("listen for ctrl-c")?;
            info!("shutting down");
            server.unblock();
        }
    }
    accept.await.context("accept loop failed")?;
    Ok(())
}

fn handle_request(app: &Controller, mut request: Request) {
    let response = match read_request(&mut request) {
        Ok(req) => app.handle(&req),
        Err(e) => {
            warn!("unreadable request: {e:#}");
            error_response(&e)
        }
    };
    let status = response.status;
    match to_tiny_response(response) {
        Ok(resp) => {
            if let Err(e) = request.respond(resp) {
                warn!(status, "failed to send response: {e}");
            }
        }
        Err(e) => error!("{e:#}"),
    }
}

fn read_request(request: &mut Request) -> Result<HttpRequest> {
    let mut req = HttpRequest::from_target(Method::parse(&request.method().to_string()), request.url());
    req.content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());
    read_body(request.as_reader(), MAX_BODY, &mut req.body)?;
    Ok(req)
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| anyhow!("invalid header {name}: {value}"))
}

fn to_tiny_response(resp: HttpResponse) -> Result<Response<std::io::Cursor<Vec<u8>>>> {
    let mut out = Response::from_string(resp.body)
        .with_status_code(resp.status)
        .with_header(header("Content-Type", resp.content_type)?);
    if let Some(location) = resp.location.as_deref() {
        out = out.with_header(header("Location", location)?);
    }
    Ok(out)
}

/// Build a request from the CGI environment. `env` looks up a meta-variable.
pub(crate) fn cgi_request_from_env(
    env: impl Fn(&str) -> Option<String>,
    stdin: impl Read,
) -> Result<HttpRequest> {
    let method = Method::parse(&env("REQUEST_METHOD").unwrap_or_else(|| "GET".into()));
    let path = env("PATH_INFO")
        .filter(|p| !p.is_empty() && p != "/")
        .unwrap_or_else(|| route_from_script(env("SCRIPT_NAME").as_deref()));

    let mut req = HttpRequest::from_target(method, &path);
    req.query = env("QUERY_STRING").filter(|q| !q.is_empty());
    req.content_type = env("CONTENT_TYPE").filter(|c| !c.is_empty());

    let length = match env("CONTENT_LENGTH").filter(|l| !l.trim().is_empty()) {
        Some(l) => l
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid CONTENT_LENGTH '{l}'"))?,
        None => 0,
    };
    if length > MAX_BODY {
        return Err(BodyTooLarge { limit: MAX_BODY }.into());
    }
    stdin
        .take(length)
        .read_to_end(&mut req.body)
        .context("read CGI request body")?;
    Ok(req)
}

/// A script installed as e.g. `opossum_seq_tca` serves that analysis.
fn route_from_script(script_name: Option<&str>) -> String {
    let base = script_name
        .and_then(|s| s.rsplit('/').next())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if base.contains("actca") {
        "/actca".into()
    } else if base.contains("tca") {
        "/tca".into()
    } else {
        "/".into()
    }
}

pub(crate) fn write_cgi_response(resp: &HttpResponse, mut out: impl Write) -> std::io::Result<()> {
    write!(out, "Status: {} {}\r\n", resp.status, resp.reason())?;
    write!(out, "Content-Type: {}\r\n", resp.content_type)?;
    if let Some(location) = resp.location.as_deref() {
        write!(out, "Location: {location}\r\n")?;
    }
    write!(out, "\r\n")?;
    out.write_all(resp.body.as_bytes())?;
    out.flush()
}

pub(crate) fn run_cgi(app: &Controller) -> Result<()> {
    let resp = match cgi_request_from_env(|k| std::env::var(k).ok(), std::io::stdin().lock()) {
        Ok(req) => app.handle(&req),
        Err(e) if e.downcast_ref::<BodyTooLarge>().is_some() => {
            warn!("rejected CGI request: {e:#}");
            HttpResponse::payload_too_large()
        }
        Err(e) => return Err(e),
    };
    write_cgi_response(&resp, std::io::stdout().lock()).context("write CGI response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_cgi_post_request() {
        let body = b"rm=process&email=a%40b.org&extra-bytes-not-counted";
        let env = env_of(&[
            ("REQUEST_METHOD", "POST"),
            ("PATH_INFO", "/tca"),
            ("QUERY_STRING", "sid=abc"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
            ("CONTENT_LENGTH", "27"),
        ]);
        let req = cgi_request_from_env(env, &body[..]).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "/tca");
        assert_eq!(req.query.as_deref(), Some("sid=abc"));
        assert_eq!(req.body, b"rm=process&email=a%40b.org&");
    }

    #[test]
    fn test_cgi_route_from_script_name() {
        let env = env_of(&[("SCRIPT_NAME", "/cgi-bin/opossum_seq_actca.cgi")]);
        let req = cgi_request_from_env(env, std::io::empty()).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/actca");
        assert!(req.body.is_empty());

        assert_eq!(route_from_script(Some("/cgi-bin/opossum_seq_tca")), "/tca");
        assert_eq!(route_from_script(None), "/");
    }

    #[test]
    fn test_cgi_bad_content_length() {
        let env = env_of(&[("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "lots")]);
        assert!(cgi_request_from_env(env, std::io::empty()).is_err());
    }

    #[test]
    fn test_cgi_oversized_body_is_rejected() {
        let declared = (MAX_BODY + 10).to_string();
        let env = env_of(&[("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", declared.as_str())]);
        let err = cgi_request_from_env(env, std::io::empty()).unwrap_err();
        assert!(err.downcast_ref::<BodyTooLarge>().is_some());
        assert_eq!(error_response(&err).status, 413);
    }

    #[test]
    fn test_read_body_fails_instead_of_truncating() {
        let mut body = Vec::new();
        read_body(&b"0123456789"[..], 10, &mut body).unwrap();
        assert_eq!(body, b"0123456789");

        let mut body = Vec::new();
        let err = read_body(&b"0123456789X"[..], 10, &mut body).unwrap_err();
        assert!(err.downcast_ref::<BodyTooLarge>().is_some());

        let resp = error_response(&anyhow!("socket closed"));
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn test_write_cgi_response() {
        let mut out = Vec::new();
        write_cgi_response(&HttpResponse::redirect("/actca"), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Status: 302 Found\r\n"));
        assert!(text.contains("Location: /actca\r\n"));
        assert!(text.ends_with("\r\n\r\nMoved to /actca"));
    }
}

use std::collections::HashMap;
use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::Method;
use may_minihttp::Request;
use tracing::debug;

use crate::dispatch::{BasicCredentials, RequestHead};

/// Extract the request head and raw body bytes from a
/// `may_minihttp::Request`.
///
/// Header keys are lowercased on the way in so later lookups are plain map
/// gets. Cookies, credentials, and the body text stay unparsed; the context
/// derives them lazily on first access.
pub fn parse_request(req: Request) -> (RequestHead, Vec<u8>) {
    let method: Method = req.method().parse().unwrap_or(Method::GET);
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let query_params = parse_query_params(&raw_path);

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        query_count = query_params.len(),
        "request head parsed"
    );

    let mut body = Vec::new();
    if let Ok(size) = req.body().read_to_end(&mut body) {
        if size > 0 {
            debug!(body_size_bytes = size, "request body buffered");
        }
    }

    (
        RequestHead {
            method,
            path,
            headers,
            query_params,
        },
        body,
    )
}

/// Parse query string parameters from a URL path.
///
/// Extracts everything after the `?` character and URL-decodes parameter
/// names and values.
pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    match path.find('?') {
        Some(pos) => url::form_urlencoded::parse(path[pos + 1..].as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        None => HashMap::new(),
    }
}

/// Split the `cookie` header into a name -> value map.
///
/// Values are percent-decoded; a value that fails to decode is kept raw
/// rather than dropped.
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|header| {
            header
                .split(';')
                .filter_map(|pair| {
                    let mut parts = pair.splitn(2, '=');
                    let name = parts.next()?.trim();
                    if name.is_empty() {
                        return None;
                    }
                    let raw = parts.next().unwrap_or("").trim();
                    let value = urlencoding::decode(raw)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    Some((name.to_string(), value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse an `authorization` header into basic-auth credentials.
///
/// The header splits into a scheme and a base64 payload; the decoded
/// payload splits on the first `:` into username and password. Anything
/// that does not fit yields `None` — credential parsing is tolerant, not
/// validating.
pub fn parse_basic_auth(header: &str) -> Option<BasicCredentials> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next()?.trim();
    let payload = parts.next()?.trim();
    if scheme.is_empty() || payload.is_empty() {
        return None;
    }
    let decoded = BASE64.decode(payload).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = match decoded.find(':') {
        Some(pos) => (&decoded[..pos], &decoded[pos + 1..]),
        None => (decoded.as_str(), ""),
    };
    Some(BasicCredentials {
        scheme: scheme.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    })
}

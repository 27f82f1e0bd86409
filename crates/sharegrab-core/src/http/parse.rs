//! Parse raw response header lines collected by the curl header callback.

/// Parse header lines into `(name, value)` pairs.
///
/// Status lines (`HTTP/1.1 302 Found`) start a new block: when curl follows
/// redirects it reports every hop's headers, and only the last block belongs
/// to the response the caller sees.
pub fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    headers
}

/// First `name=value` pair of a `Set-Cookie` value, attributes dropped.
pub fn cookie_pair(set_cookie: &str) -> Option<(String, String)> {
    let first = set_cookie.split(';').next()?.trim();
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

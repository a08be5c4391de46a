//! Redirect target resolution.
//!
//! Absolute URLs (`https://...`, `//host/...`) are sent as given. Anything
//! else is treated as a path: relative paths are joined to the directory of
//! the current request path, `.` and `..` segments are cleaned up, a
//! trailing slash and any query string are kept.

/// Resolves `location` against the path of the current request.
pub fn resolve_location(location: &str, request_path: &str) -> String {
    if has_scheme(location) || location.starts_with("//") {
        return location.to_string();
    }

    let (path, query) = match location.find(['?', '#']) {
        Some(idx) => location.split_at(idx),
        None => (location, ""),
    };

    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        let base = if request_path.is_empty() {
            "/"
        } else {
            request_path
        };
        let dir = match base.rfind('/') {
            Some(idx) => &base[..=idx],
            None => "/",
        };
        format!("{}{}", dir, path)
    };

    let trailing = joined.ends_with('/');
    let mut cleaned = clean_path(&joined);
    if trailing && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    cleaned.push_str(query);
    cleaned
}

/// Lexically normalizes an absolute path.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Escapes text for use inside an HTML attribute or element.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn has_scheme(location: &str) -> bool {
    let Some(idx) = location.find(':') else {
        return false;
    };
    let scheme = &location[..idx];
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

//! Extraction of an article embedded as a JavaScript object literal.

use serde_json::Value;

/// Locate the object literal assigned to `identifier` in `html`.
///
/// Finds the first occurrence of `identifier`, the next `=` after it, then
/// the next `{`, and scans to the brace that closes it. Braces inside
/// double-quoted strings are not counted; backslash escapes are honored
/// inside strings only.
pub(crate) fn find_json_object<'a>(html: &'a str, identifier: &str) -> Option<&'a str> {
    if identifier.is_empty() {
        return None;
    }
    let after_ident = html.find(identifier)? + identifier.len();
    let equals = after_ident + html[after_ident..].find('=')?;
    let start = equals + html[equals..].find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // Every delimiter is ASCII, so byte offsets are always char boundaries
    for (offset, byte) in html.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Walk a dot-and-bracket path such as `articles[0].body` through `root`.
///
/// A segment `name[i][j]` descends into field `name` (when non-empty) and
/// then indexes arrays in order. Any miss yields `None`.
pub(crate) fn walk_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = root;

    for segment in path.split('.') {
        let (name, mut indexes) = match segment.find('[') {
            Some(i) => (&segment[..i], &segment[i..]),
            None => (segment, ""),
        };

        if name.is_empty() && indexes.is_empty() {
            return None;
        }
        if !name.is_empty() {
            current = current.as_object()?.get(name)?;
        }

        while !indexes.is_empty() {
            let inner = indexes.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index: usize = inner[..close].trim().parse().ok()?;
            current = current.as_array()?.get(index)?;
            indexes = &inner[close + 1..];
        }
    }

    Some(current)
}

/// Text of a path leaf: strings verbatim, numbers and booleans stringified.
pub(crate) fn leaf_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Title and body pulled from the object assigned to `identifier`.
///
/// The body path is required; a missing title yields `None` in the first slot.
pub(crate) fn extract(
    html: &str,
    identifier: &str,
    content_path: &str,
    title_path: Option<&str>,
) -> Option<(Option<String>, String)> {
    let Some(literal) = find_json_object(html, identifier) else {
        tracing::debug!(identifier = %identifier, "Embedded object not found");
        return None;
    };

    let json: Value = match serde_json::from_str(literal) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(identifier = %identifier, error = %e, "Embedded object is not valid JSON");
            return None;
        }
    };

    let Some(body) = walk_path(&json, content_path).and_then(leaf_text) else {
        tracing::debug!(path = %content_path, "Content path missing from embedded object");
        return None;
    };
    let title = title_path
        .and_then(|path| walk_path(&json, path))
        .and_then(leaf_text);

    Some((title, body))
}

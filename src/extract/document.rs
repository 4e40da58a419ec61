/// Placeholder used when no title can be extracted
pub const NO_TITLE: &str = "No Title";

const STYLESHEET: &str = "\
body { font-family: sans-serif; line-height: 1.6; padding: 16px; color: #333; background-color: #fff; }
h1 { font-size: 24px; margin-bottom: 16px; }
.byline { color: #777; font-size: 14px; margin: 0 0 8px; }
img { max-width: 100%; height: auto; }
@media (prefers-color-scheme: dark) {
    body { color: #eee; background-color: #121212; }
    a { color: #8ab4f8; }
    .byline { color: #aaa; }
}";

/// Assemble the standalone offline document.
///
/// `body` is trusted markup produced by extraction and is emitted as-is.
/// `image_url` is only honored when the caller passes one; double quotes in
/// it are escaped so the attribute stays well formed.
pub(crate) fn build_document(
    title: &str,
    body: &str,
    source_name: Option<&str>,
    image_url: Option<&str>,
) -> String {
    let mut out = String::with_capacity(body.len() + STYLESHEET.len() + 512);

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str("<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    out.push_str("<title>");
    out.push_str(&escape_text(title));
    out.push_str("</title>\n<style>\n");
    out.push_str(STYLESHEET);
    out.push_str("\n</style>\n</head>\n<body>\n");

    if let Some(name) = source_name.filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!("<p class=\"byline\">{}</p>\n", escape_text(name)));
    }
    out.push_str(&format!("<h1>{}</h1>\n", escape_text(title)));
    if let Some(src) = image_url.filter(|u| !u.is_empty()) {
        out.push_str(&format!(
            "<img src=\"{}\" alt=\"\">\n",
            src.replace('"', "&quot;")
        ));
    }
    out.push_str("<div class=\"content\">");
    out.push_str(body);
    out.push_str("</div>\n</body>\n</html>\n");

    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

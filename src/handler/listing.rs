//! Directory listing rendering

use std::fmt::Write as _;

use crate::resource::DirEntry;

/// One rendered row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub url: String,
    pub name: String,
}

/// Rows for `entries` under the directory served at `request_path`
///
/// `request_path` is the decoded path and ends with `/`. Sub-directories
/// get a trailing slash so following the link does not cost a redirect.
pub fn listing_entries(request_path: &str, entries: &[DirEntry]) -> Vec<ListingEntry> {
    let base = encode_path(request_path);
    entries
        .iter()
        .map(|e| {
            let mut url = format!("{base}{}", encode_path(&e.name));
            let mut name = e.name.clone();
            if e.is_dir {
                url.push('/');
                name.push('/');
            }
            ListingEntry { url, name }
        })
        .collect()
}

/// Render the HTML page for a directory
pub fn render_listing(request_path: &str, entries: &[DirEntry]) -> String {
    let title = escape_html(request_path);
    let mut rows = String::new();
    for entry in listing_entries(request_path, entries) {
        let _ = writeln!(
            rows,
            "    <li><a href=\"{}\">{}</a></li>",
            escape_html(&entry.url),
            escape_html(&entry.name)
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Index of {title}</title>
</head>
<body>
  <h1>Index of {title}</h1>
  <ul>
{rows}  </ul>
</body>
</html>
"#
    )
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

/// Percent-encode everything except unreserved characters and `/`
fn encode_path(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

//! HTML directory listings

use isoserve_core::error::{Error, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::path::Path;

/// Characters left unescaped in listing links
const LINK_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    display: String,
    link: String,
}

/// Generate the HTML listing for `dir_path`, titled with the decoded request path
pub async fn generate_listing(dir_path: &Path, req_path: &str) -> Result<String> {
    let mut dir = tokio::fs::read_dir(dir_path)
        .await
        .map_err(|e| Error::NotFound(format!("cannot list {}: {}", req_path, e)))?;

    let mut entries = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_link = entry.file_type().await?.is_symlink();
        // Follows symlinks, so a link to a directory is listed as one
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        entries.push(entry_for(name, is_dir, is_link));
    }
    entries.sort_by_key(|e| e.display.to_lowercase());

    Ok(render(req_path, &entries))
}

fn entry_for(name: String, is_dir: bool, is_link: bool) -> Entry {
    let mut display = name.clone();
    let mut link = name;
    if is_dir {
        link.push('/');
    }
    // A link shows `@` in place of the directory slash
    if is_link {
        display.push('@');
    } else if is_dir {
        display.push('/');
    }
    Entry { display, link }
}

fn render(req_path: &str, entries: &[Entry]) -> String {
    let title = format!("Directory listing for {}", escape_html(req_path));
    let mut html = String::with_capacity(256 + entries.len() * 64);

    html.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n<hr>\n<ul>\n", title, title));

    for entry in entries {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            utf8_percent_encode(&entry.link, LINK_SAFE),
            escape_html(&entry.display)
        ));
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}

/// Escape text for inclusion in HTML content or attribute values
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

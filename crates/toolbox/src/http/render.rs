//! HTML rendering for directory listings.

use std::fmt::Write;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::files::{DirectoryEntry, DirectoryListing};
use crate::payloads::PayloadGenerator;

/// Characters escaped in href paths; `/` is kept as the separator.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Render a directory listing page.
///
/// Lists served entries, then configured aliases, then the available
/// payload templates with their default host and port.
pub fn render_listing(listing: &DirectoryListing, payloads: &PayloadGenerator) -> String {
    let title = format!("/{}", listing.requested_path.trim_start_matches('/'));

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>Index of {}</title>", escape_html(&title));
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>Index of {}</h1>", escape_html(&title));

    html.push_str("<h2>Files</h2>\n");
    write_entries(&mut html, &listing.entries);

    if !listing.custom_entries.is_empty() {
        html.push_str("<h2>Custom files</h2>\n");
        write_entries(&mut html, &listing.custom_entries);
    }

    html.push_str("<h2>Shells</h2>\n");
    let _ = writeln!(
        html,
        "<p>Default lhost {} lport {}</p>",
        escape_html(payloads.default_lhost()),
        payloads.default_lport()
    );
    html.push_str("<ul>\n");
    for name in payloads.template_names() {
        let _ = writeln!(
            html,
            "<li><a href=\"/shells/{0}\">{0}</a></li>",
            escape_html(name)
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");

    html
}

fn write_entries(html: &mut String, entries: &[DirectoryEntry]) {
    if entries.is_empty() {
        html.push_str("<p>Empty</p>\n");
        return;
    }

    html.push_str("<ul>\n");
    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}{}</a></li>",
            escape_html(&utf8_percent_encode(&entry.virtual_path, PATH_SEGMENT).to_string()),
            escape_html(&entry.name),
            suffix
        );
    }
    html.push_str("</ul>\n");
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

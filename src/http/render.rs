//! Listing and error page rendering.

use std::fmt::Write;

use axum::http::StatusCode;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::listing::DirectoryListing;

/// Turns listing data and error descriptors into HTML.
pub trait Renderer: Send + Sync {
    fn render_listing(&self, listing: &DirectoryListing) -> String;
    fn render_error(&self, status: StatusCode, message: &str) -> String;
}

/// Minimal built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicRenderer;

const STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,\"Segoe UI\",Roboto,sans-serif;\
margin:0;padding:1.5em}h1{font-size:18px;font-weight:500}h1 a{color:#000;text-decoration:none}\
ul{margin:0;padding:1.5em 0 0 0}li{list-style:none;font-size:14px}\
li a{color:#000;display:block;padding:10px 0;text-decoration:none}li a:hover{text-decoration:underline}\
li a.folder{font-weight:600}";

impl Renderer for BasicRenderer {
    fn render_listing(&self, listing: &DirectoryListing) -> String {
        let mut html = String::with_capacity(1024 + listing.files.len() * 96);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>Files within {}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<main>\n<header>\n<h1><i>Index of&nbsp;</i>",
            encode_text(&listing.directory)
        );

        for crumb in &listing.paths {
            let _ = write!(
                html,
                "<a href=\"/{}\">{}</a>",
                encode_double_quoted_attribute(&crumb.url),
                encode_text(&crumb.name)
            );
        }
        html.push_str("</h1>\n</header>\n<ul id=\"files\">\n");

        for file in &listing.files {
            let kind = match file.kind {
                crate::listing::EntryType::File => "file",
                crate::listing::EntryType::Folder => "folder",
            };
            let _ = writeln!(
                html,
                "<li><a href=\"{}\" title=\"{}\" class=\"{kind} {}\">{}</a></li>",
                encode_double_quoted_attribute(&file.relative),
                encode_double_quoted_attribute(&file.title),
                encode_double_quoted_attribute(&file.ext),
                encode_text(&file.base)
            );
        }

        html.push_str("</ul>\n</main>\n</body>\n</html>\n");
        html
    }

    fn render_error(&self, status: StatusCode, message: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{code} - {reason}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <main>\n<h1>{code}</h1>\n<p>{message}</p>\n</main>\n</body>\n</html>\n",
            code = status.as_u16(),
            reason = encode_text(status.canonical_reason().unwrap_or("Error")),
            message = encode_text(message),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Breadcrumb, EntryType, ListingEntry};

    #[test]
    fn test_listing_escapes_names() {
        let listing = DirectoryListing {
            directory: "site/".into(),
            paths: vec![Breadcrumb {
                name: "site/".into(),
                url: String::new(),
            }],
            files: vec![ListingEntry {
                base: "<b>.txt".into(),
                relative: "/<b>.txt".into(),
                title: "<b>.txt".into(),
                kind: EntryType::File,
                ext: "txt".into(),
                size: None,
                mtime: None,
            }],
        };
        let html = BasicRenderer.render_listing(&listing);
        assert!(html.contains("<title>Files within site/</title>"));
        assert!(html.contains("&lt;b&gt;.txt</a>"));
        assert!(html.contains("class=\"file txt\""));
        assert!(!html.contains("<b>.txt"));
    }

    #[test]
    fn test_error_page() {
        let html = BasicRenderer.render_error(StatusCode::NOT_FOUND, "The requested path could not be found");
        assert!(html.contains("<h1>404</h1>"));
        assert!(html.contains("Not Found"));
    }
}

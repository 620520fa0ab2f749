//! Script tag injection into HTML documents.

use std::cell::Cell;
use std::rc::Rc;

use lol_html::html_content::{ContentType, EndTag};
use lol_html::{element, HtmlRewriter, Settings};

use crate::rewrite::RewriteError;

/// Build the `<script>` tag pointing at `src`, carrying `nonce` when given.
pub fn script_tag(src: &str, nonce: Option<&str>) -> String {
    match nonce {
        Some(nonce) => format!(
            r#"<script src="{}" nonce="{}"></script>"#,
            escape_attribute(src),
            escape_attribute(nonce)
        ),
        None => format!(r#"<script src="{}"></script>"#, escape_attribute(src)),
    }
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Append `tag` as the last child of the first `<body>` element of `document`.
pub fn inject_into_body(document: &[u8], tag: &str) -> Result<Vec<u8>, RewriteError> {
    let found = Cell::new(false);
    let flushed = Rc::new(Cell::new(false));
    let mut output = Vec::with_capacity(document.len() + tag.len());

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![element!("body", |el| {
                    if found.replace(true) {
                        return Ok(());
                    }
                    if let Some(handlers) = el.end_tag_handlers() {
                        let flushed = Rc::clone(&flushed);
                        let tag = tag.to_string();
                        handlers.push(Box::new(move |end: &mut EndTag<'_>| {
                            end.before(&tag, ContentType::Html);
                            flushed.set(true);
                            Ok(())
                        }) as _);
                    }
                    Ok(())
                })],
                ..Settings::new()
            },
            |chunk: &[u8]| output.extend_from_slice(chunk),
        );
        rewriter
            .write(document)
            .map_err(|e| RewriteError::Html(e.to_string()))?;
        rewriter.end().map_err(|e| RewriteError::Html(e.to_string()))?;
    }

    if !found.get() {
        return Err(RewriteError::BodyNotFound);
    }

    // `</body>` never arrived. Trailing content still lands inside the body
    // when the browser parses it.
    if !flushed.get() {
        output.extend_from_slice(tag.as_bytes());
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: &str = r#"<script src="/_reload/script.js"></script>"#;

    fn inject(doc: &str) -> Result<String, RewriteError> {
        inject_into_body(doc.as_bytes(), TAG).map(|b| String::from_utf8(b).unwrap())
    }

    #[test]
    fn test_appends_as_last_child_of_body() {
        let out = inject("<html><body>Hi</body></html>").unwrap();
        assert_eq!(out, format!("<html><body>Hi{TAG}</body></html>"));
    }

    #[test]
    fn test_only_first_body_gets_script() {
        let out = inject("<html><body><p>a</p></body><body>b</body></html>").unwrap();
        assert_eq!(out.matches(TAG).count(), 1);
        assert!(out.starts_with(&format!("<html><body><p>a</p>{TAG}</body>")));
    }

    #[test]
    fn test_body_with_attributes_and_nested_content() {
        let doc = r#"<!DOCTYPE html><html><head><title>t</title></head><body class="x"><div><span>deep</span></div></body></html>"#;
        let out = inject(doc).unwrap();
        assert!(out.contains(&format!("<span>deep</span></div>{TAG}</body>")));
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let err = inject("<html><head></head></html>").unwrap_err();
        assert!(matches!(err, RewriteError::BodyNotFound));

        let err = inject("<div>fragment</div>").unwrap_err();
        assert!(matches!(err, RewriteError::BodyNotFound));
    }

    #[test]
    fn test_unclosed_body() {
        let out = inject("<html><body>Hi").unwrap();
        assert_eq!(out.matches(TAG).count(), 1);
        assert!(out.ends_with(TAG));
    }

    #[test]
    fn test_unclosed_body_with_script_already_in_head() {
        let out = inject(&format!("<html><head>{TAG}</head><body>Hi")).unwrap();
        assert_eq!(out.matches(TAG).count(), 2);
        assert!(out.ends_with(&format!("<body>Hi{TAG}")));
    }

    #[test]
    fn test_script_tag_with_nonce() {
        assert_eq!(script_tag("/s.js", None), r#"<script src="/s.js"></script>"#);
        assert_eq!(
            script_tag("/s.js", Some("XYZ")),
            r#"<script src="/s.js" nonce="XYZ"></script>"#
        );
        assert_eq!(
            script_tag("/s.js", Some(r#"a"b"#)),
            r#"<script src="/s.js" nonce="a&quot;b"></script>"#
        );
    }
}

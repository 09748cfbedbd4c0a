use crate::parsers::text;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Parse a CSS selector, logging instead of failing on bad input
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            ::log::warn!("Ignoring invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Whitespace-normalized text of an element
pub fn element_text(element: &ElementRef) -> String {
    text::normalize_whitespace_in_segment(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of an element with paragraph structure kept from its `<p>` children
pub fn block_text(element: &ElementRef) -> String {
    let Some(p) = selector("p") else {
        return element_text(element);
    };
    let paragraphs: Vec<String> = element
        .select(&p)
        .map(|para| element_text(&para))
        .filter(|t| !t.is_empty())
        .collect();

    if paragraphs.is_empty() {
        element_text(element)
    } else {
        text::clean_block(&paragraphs.join("\n\n"))
    }
}

/// Page text outside of script, style and template elements
pub fn visible_text(doc: &Html) -> String {
    let parts: Vec<&str> = doc
        .root_element()
        .descendants()
        .filter_map(|node| {
            let content = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            let hidden = matches!(
                parent.value().name(),
                "script" | "style" | "noscript" | "template"
            );
            (!hidden).then_some(&**content)
        })
        .collect();
    text::normalize_whitespace_in_segment(&parts.join(" "))
}

/// First non-empty text matched by `css`
pub fn first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty())
}

/// All non-empty texts matched by `css`, in document order
pub fn all_texts(doc: &Html, css: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
        .collect()
}

/// First non-empty value of `attr` on elements matched by `css`
pub fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .filter_map(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Every JSON value embedded in `application/ld+json` script blocks
pub fn json_ld_blocks(doc: &Html) -> Vec<Value> {
    let Some(sel) = selector(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    ::log::debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Read a string or number as text
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

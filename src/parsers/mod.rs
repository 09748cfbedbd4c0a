pub mod html;
pub mod listing;
pub mod profile;
pub mod text;


pub use listing::{ListingExtractor, ListingStrategy};
pub use profile::ProfileExtractor;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

/// A parsed page plus the pieces probes read repeatedly
pub struct Document {
    html: Html,
    json_ld: Vec<Value>,
    body_text: String,
}

impl Document {
    pub fn parse(raw: &str) -> Self {
        let html = Html::parse_document(raw);
        let json_ld = html::json_ld_blocks(&html);
        let body_text = html::visible_text(&html);
        Self {
            html,
            json_ld,
            body_text,
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn json_ld(&self) -> &[Value] {
        &self.json_ld
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }
}

/// One named way of reading a single field out of a document.
///
/// Probes are pure: the same document always gives the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// First non-empty text of a CSS selector
    Text(&'static str),
    /// Like `Text`, keeping paragraph breaks
    Block(&'static str),
    /// First non-empty attribute value on a CSS selector
    Attr(&'static str, &'static str),
    /// `<meta property|name=...>` content
    Meta(&'static str),
    /// Key path into any JSON-LD object; arrays yield their first element
    JsonLd(&'static [&'static str]),
    /// Regex over the page text; capture group 1 if present
    Pattern(&'static str),
}

impl Probe {
    pub fn run(&self, doc: &Document) -> Option<String> {
        match *self {
            Probe::Text(css) => html::first_text(doc.html(), css),
            Probe::Block(css) => {
                let sel = html::selector(css)?;
                doc.html()
                    .select(&sel)
                    .map(|e| html::block_text(&e))
                    .find(|t| !t.is_empty())
            }
            Probe::Attr(css, attr) => html::first_attr(doc.html(), css, attr),
            Probe::Meta(key) => html::first_attr(
                doc.html(),
                &format!(r#"meta[property="{key}"], meta[name="{key}"]"#),
                "content",
            ),
            Probe::JsonLd(path) => doc.json_ld().iter().find_map(|v| json_path(v, path)),
            Probe::Pattern(pattern) => {
                let regex = match Regex::new(pattern) {
                    Ok(r) => r,
                    Err(e) => {
                        ::log::warn!("Ignoring invalid probe pattern {:?}: {}", pattern, e);
                        return None;
                    }
                };
                let caps = regex.captures(doc.body_text())?;
                let m = caps.get(1).or_else(|| caps.get(0))?;
                let text = m.as_str().trim();
                (!text.is_empty()).then(|| text.to_string())
            }
        }
    }
}

/// Run probes in order and return the first non-empty result
pub fn first_match(doc: &Document, probes: &[Probe]) -> Option<String> {
    probes.iter().find_map(|probe| {
        let found = probe.run(doc)?;
        ::log::trace!("Probe {:?} matched", probe);
        Some(found)
    })
}

/// Follow `path` through objects, looking into `@graph` and arrays on the way
fn json_path(value: &Value, path: &[&str]) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(|item| json_path(item, path)),
        Value::Object(map) => {
            if let Some(found) = walk(value, path) {
                return Some(found);
            }
            map.get("@graph").and_then(|graph| json_path(graph, path))
        }
        _ => None,
    }
}

fn walk(value: &Value, path: &[&str]) -> Option<String> {
    let Some((head, rest)) = path.split_first() else {
        return match value {
            Value::Array(items) => items.first().and_then(html::value_text),
            other => html::value_text(other),
        };
    };
    let next = match value {
        Value::Array(items) => items.first()?.get(head)?,
        other => other.get(head)?,
    };
    walk(next, rest)
}

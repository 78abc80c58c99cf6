//! Just enough SVG handling to lift an icon file into a `<symbol>`: find the
//! outer `<svg>` element, read its `viewBox`, and drop presentation attributes
//! the sprite re-supplies.

use iconsprite_core::{IconId, Symbol, ViewBox};
use once_cell::sync::Lazy;
use regex::Regex;

const SVG_OPEN: &str = "<svg";
const SVG_CLOSE: &str = "</svg";

static VIEW_BOX_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r#"(?:^|\s)viewBox\s*=\s*"([^"]*)""#).unwrap(),
        Regex::new(r#"(?:^|\s)viewBox\s*=\s*'([^']*)'"#).unwrap(),
        Regex::new(r#"(?:^|\s)viewBox\s*=\s*([^\s"'>/]+)"#).unwrap(),
    ]
});

static PRESENTATION_ATTRS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\s+(?:xmlns(?::[A-Za-z_][\w.-]*)?|fill|stroke|stroke-width|aria-hidden|slot)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>/]+)"#,
    )
    .unwrap()
});

static STROKE_STYLE_ATTRS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+(?:stroke-linecap|stroke-linejoin)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>/]+)"#)
        .unwrap()
});

/// Icon family whose stroke styling comes from the consumer.
pub const STROKE_FAMILY: &str = "outline";

/// The outer `<svg>` element of an icon file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootElement<'a> {
    /// Raw attribute text of the opening tag.
    pub attributes: &'a str,
    /// Everything between the opening and the matching closing tag.
    pub inner: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgError {
    NoRoot,
    NoViewBox,
}

/// Locates the first top-level `<svg>` element, skipping comments and
/// accounting for nested `<svg>` children.
pub fn locate_root(content: &str) -> Option<RootElement<'_>> {
    let start = find_open(content, 0)?;
    let attr_start = start + SVG_OPEN.len();
    let tag_end = find_tag_end(content, attr_start)?;

    if content[..tag_end].ends_with('/') {
        return Some(RootElement {
            attributes: &content[attr_start..tag_end - 1],
            inner: "",
        });
    }

    let attributes = &content[attr_start..tag_end];
    let body_start = tag_end + 1;
    let mut depth = 1usize;
    let mut pos = body_start;
    loop {
        let next_open = find_open(content, pos);
        let next_close = content[pos..].find(SVG_CLOSE).map(|i| i + pos);
        match (next_open, next_close) {
            (Some(open), Some(close)) if open < close => {
                let end = find_tag_end(content, open + SVG_OPEN.len())?;
                if !content[..end].ends_with('/') {
                    depth += 1;
                }
                pos = end + 1;
            }
            (_, Some(close)) => {
                depth -= 1;
                if depth == 0 {
                    return Some(RootElement {
                        attributes,
                        inner: &content[body_start..close],
                    });
                }
                pos = close + SVG_CLOSE.len();
            }
            _ => return None,
        }
    }
}

fn find_open(content: &str, from: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut pos = from;
    while let Some(offset) = content.get(pos..)?.find('<') {
        let at = pos + offset;
        let rest = &content[at..];
        if rest.starts_with("<!--") {
            let end = rest.find("-->")?;
            pos = at + end + 3;
            continue;
        }
        if rest.starts_with(SVG_OPEN) {
            match bytes.get(at + SVG_OPEN.len()) {
                Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(at),
                _ => {}
            }
        }
        pos = at + 1;
    }
    None
}

/// Index of the `>` closing a tag, ignoring any inside quoted values.
fn find_tag_end(content: &str, from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in content.as_bytes().iter().enumerate().skip(from) {
        match (quote, *b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Reads the `viewBox`, trying double-quoted, single-quoted and bare syntax in
/// that order.
pub fn find_view_box(attributes: &str) -> Option<ViewBox> {
    VIEW_BOX_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(attributes)
            .and_then(|caps| caps.get(1))
            .and_then(|raw| ViewBox::parse(raw.as_str()))
    })
}

pub fn is_stroke_family(prefix: &str) -> bool {
    prefix == STROKE_FAMILY
        || prefix
            .strip_suffix(STROKE_FAMILY)
            .is_some_and(|head| head.ends_with('-'))
}

pub fn strip_presentation(body: &str, stroke_family: bool) -> String {
    let cleaned = PRESENTATION_ATTRS.replace_all(body, "");
    if stroke_family {
        STROKE_STYLE_ATTRS.replace_all(&cleaned, "").into_owned()
    } else {
        cleaned.into_owned()
    }
}

/// Turns the text of one icon file into a symbol keyed by `id`.
pub fn compile_symbol(id: &IconId, content: &str) -> Result<Symbol, SvgError> {
    let root = locate_root(content).ok_or(SvgError::NoRoot)?;
    let view_box = find_view_box(root.attributes).ok_or(SvgError::NoViewBox)?;
    let stroke_family = id.prefix().is_some_and(is_stroke_family);
    Ok(Symbol {
        id: id.clone(),
        view_box,
        body: strip_presentation(root.inner.trim(), stroke_family),
    })
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Separator between the prefix and the name of an icon id.
pub const ID_SEPARATOR: char = '/';

/// Composite `prefix/name` key identifying one icon.
///
/// Construction never fails: ids handed over by callers are carried as-is and
/// checked for shape only when they are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IconId(Arc<str>);

impl IconId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn from_parts(prefix: &str, name: &str) -> Self {
        Self::new(format!("{prefix}{ID_SEPARATOR}{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits at the first separator. `None` when the separator is missing,
    /// leading, or trailing.
    pub fn split(&self) -> Option<(&str, &str)> {
        let pos = self.0.find(ID_SEPARATOR)?;
        if pos == 0 || pos + ID_SEPARATOR.len_utf8() >= self.0.len() {
            return None;
        }
        Some((&self.0[..pos], &self.0[pos + ID_SEPARATOR.len_utf8()..]))
    }

    pub fn prefix(&self) -> Option<&str> {
        self.split().map(|(prefix, _)| prefix)
    }
}

impl fmt::Display for IconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IconId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IconId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for IconId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalized key of a source unit (a file path or a virtual scope name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey(String);

impl UnitKey {
    /// Normalizes path separators so the same file scanned through different
    /// spellings maps onto one unit.
    pub fn new(key: impl AsRef<str>) -> Self {
        let raw = key.as_ref().replace('\\', "/");
        let mut normalized = String::with_capacity(raw.len());
        let mut prev_slash = false;
        for ch in raw.chars() {
            if ch == '/' {
                if prev_slash {
                    continue;
                }
                prev_slash = true;
            } else {
                prev_slash = false;
            }
            normalized.push(ch);
        }
        let mut trimmed = normalized.as_str();
        while let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        }
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UnitKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&std::path::Path> for UnitKey {
    fn from(value: &std::path::Path) -> Self {
        Self::new(value.to_string_lossy())
    }
}

/// Parsed `viewBox` of an icon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// Parses four numbers separated by whitespace and/or commas.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut values = raw
            .split(|c: char| c.is_ascii_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().ok().filter(|v| v.is_finite()));

        let min_x = values.next()??;
        let min_y = values.next()??;
        let width = values.next()??;
        let height = values.next()??;
        if values.next().is_some() || width < 0.0 || height < 0.0 {
            return None;
        }
        Some(Self {
            min_x,
            min_y,
            width,
            height,
        })
    }
}

impl fmt::Display for ViewBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.min_x, self.min_y, self.width, self.height
        )
    }
}

/// Compiled fragment for one icon.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: IconId,
    pub view_box: ViewBox,
    /// Inner body with presentation attributes stripped.
    pub body: String,
}

impl Symbol {
    /// The `<symbol>` element as it appears inside the sprite.
    pub fn markup(&self) -> String {
        format!(
            "<symbol id=\"{}\" viewBox=\"{}\">{}</symbol>",
            self.id, self.view_box, self.body
        )
    }
}

/// Composed aggregate of all active symbols.
///
/// The empty sprite has both texts empty and means "nothing to emit".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sprite {
    pub document: String,
    pub body: String,
}

impl Sprite {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty() && self.body.is_empty()
    }
}

use crate::types::IconId;
use regex::Regex;
use std::collections::BTreeSet;

/// Finds `prefix/name` icon references in arbitrary text.
///
/// A reference may be quoted (`"mdi/home"`, `'mdi/home'`) or bare (`mdi/home`).
/// Prefixes match case-sensitively and names are limited to `[a-z0-9-]+`. A
/// match must not be glued to surrounding identifier characters, so `xmdi/home`
/// and `mdi/home/x` are not references to `mdi/home`.
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    pattern: Option<Regex>,
}

impl ReferenceExtractor {
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Self {
        let mut escaped: Vec<String> = prefixes
            .iter()
            .map(|p| p.as_ref())
            .filter(|p: &&str| !p.is_empty())
            .map(regex::escape)
            .collect();
        if escaped.is_empty() {
            return Self { pattern: None };
        }
        // Longest first so `mdi-outline` wins over `mdi`.
        escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        escaped.dedup();

        let source = format!(r"({})/([a-z0-9-]+)", escaped.join("|"));
        let pattern = Regex::new(&source).ok();
        Self { pattern }
    }

    pub fn extract(&self, text: &str) -> BTreeSet<IconId> {
        let mut found = BTreeSet::new();
        let Some(pattern) = &self.pattern else {
            return found;
        };
        if text.is_empty() {
            return found;
        }

        let bytes = text.as_bytes();
        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > 0 && is_glue_before(bytes[whole.start() - 1]) {
                continue;
            }
            if whole.end() < bytes.len() && is_glue_after(bytes[whole.end()]) {
                continue;
            }
            if let (Some(prefix), Some(name)) = (caps.get(1), caps.get(2)) {
                found.insert(IconId::from_parts(prefix.as_str(), name.as_str()));
            }
        }
        found
    }
}

fn is_glue_before(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'/' | b'.' | b'$' | b'@')
}

fn is_glue_after(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'/')
}

/// One-shot extraction. `None` or empty text yields an empty set.
pub fn extract<S: AsRef<str>>(text: Option<&str>, prefixes: &[S]) -> BTreeSet<IconId> {
    match text {
        Some(text) if !text.is_empty() => ReferenceExtractor::new(prefixes).extract(text),
        _ => BTreeSet::new(),
    }
}

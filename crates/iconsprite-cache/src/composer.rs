use crate::loader::SymbolLoader;
use crate::store::ReferenceStore;
use futures::stream::{self, StreamExt};
use iconsprite_core::{Sprite, Symbol};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Clone)]
struct Memo {
    revision: u64,
    sprite: Arc<Sprite>,
}

/// Builds the sprite from the active universe and memoizes it against the
/// store revision it was built from.
pub struct SpriteComposer {
    class: String,
    max_concurrent_loads: usize,
    memo: RwLock<Option<Memo>>,
}

impl SpriteComposer {
    pub fn new(class: impl Into<String>, max_concurrent_loads: usize) -> Self {
        Self {
            class: class.into(),
            max_concurrent_loads: max_concurrent_loads.max(1),
            memo: RwLock::new(None),
        }
    }

    /// Dirty until a compose has caught up with the store's latest revision.
    pub fn is_dirty(&self, store: &ReferenceStore) -> bool {
        self.memo
            .read()
            .as_ref()
            .map_or(true, |memo| memo.revision != store.revision())
    }

    pub async fn compose(&self, store: &ReferenceStore, loader: &SymbolLoader) -> Arc<Sprite> {
        // Read the revision before the universe so a concurrent mutation can
        // only make the memo look older than it is, never newer. The loader
        // generation is pinned first so a reset mid-compose cannot leak the
        // old universe into the new generation's caches.
        let generation = loader.generation();
        let revision = store.revision();
        if let Some(memo) = self.memo.read().as_ref() {
            if memo.revision == revision {
                return Arc::clone(&memo.sprite);
            }
        }

        let ids = store.active_ids();
        debug!("composing sprite from {} icons (revision {})", ids.len(), revision);

        // `buffered` keeps input order, so assembly follows the sorted ids
        // whatever order the loads finish in.
        let symbols: Vec<Arc<Symbol>> = stream::iter(ids)
            .map(|id| async move { loader.resolve_in(&id, generation).await })
            .buffered(self.max_concurrent_loads)
            .filter_map(|resolution| async move { resolution.ok() })
            .collect()
            .await;

        let sprite = Arc::new(assemble(&self.class, &symbols));
        if loader.generation() != generation {
            debug!("generation reset during compose, result not memoized");
            return sprite;
        }

        let mut memo = self.memo.write();
        match memo.as_ref() {
            Some(current) if current.revision > revision => {}
            _ => {
                *memo = Some(Memo {
                    revision,
                    sprite: Arc::clone(&sprite),
                })
            }
        }
        sprite
    }

    pub fn invalidate(&self) {
        *self.memo.write() = None;
    }
}

/// Joins symbols into the aggregate document. No symbols yields the empty
/// sprite rather than a childless container.
pub fn assemble(class: &str, symbols: &[Arc<Symbol>]) -> Sprite {
    if symbols.is_empty() {
        return Sprite::empty();
    }

    let body: String = symbols.iter().map(|symbol| symbol.markup()).collect();
    let class_attr = if class.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", escape_attr(class))
    };
    let document = format!("<svg xmlns=\"{SVG_NAMESPACE}\"{class_attr}>{body}</svg>");
    Sprite { document, body }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

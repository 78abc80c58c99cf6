use crate::composer::{SpriteComposer, SVG_NAMESPACE};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::loader::{Resolution, SymbolLoader};
use crate::store::ReferenceStore;
use iconsprite_core::{
    ConfigManager, IconId, ReferenceExtractor, Result, Sprite, SpriteConfig, UnitKey,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot of engine bookkeeping for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub units: usize,
    pub active_ids: usize,
    pub cached_symbols: usize,
    pub cached_failures: usize,
    pub file_reads: u64,
    pub generation: u64,
}

/// State of one build generation: which units reference which icons, the
/// symbols loaded so far, and the last composed sprite.
///
/// All methods take `&self`; share the engine through an `Arc` to scan units
/// from many tasks at once.
pub struct SpriteEngine {
    config: SpriteConfig,
    extractor: ReferenceExtractor,
    store: ReferenceStore,
    loader: SymbolLoader,
    composer: SpriteComposer,
}

impl SpriteEngine {
    pub fn new(config: SpriteConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: SpriteConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let extractor = ReferenceExtractor::new(config.prefix_names().as_slice());
        let loader = SymbolLoader::new(config.prefixes.clone(), sink);
        let composer = SpriteComposer::new(config.class.clone(), config.max_concurrent_loads);
        Self {
            config,
            extractor,
            store: ReferenceStore::new(),
            loader,
            composer,
        }
    }

    /// Like [`SpriteEngine::with_sink`], but rejects a configuration that
    /// would not survive `ConfigManager` validation.
    pub fn try_with_sink(config: SpriteConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        ConfigManager::validate_config(&config)?;
        Ok(Self::with_sink(config, sink))
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    /// Icon ids referenced by `text` under the configured prefixes.
    pub fn extract(&self, text: &str) -> BTreeSet<IconId> {
        self.extractor.extract(text)
    }

    /// Replaces the reference set of one unit. Symbols of ids that lose their
    /// last reference are released.
    pub fn replace(&self, unit: impl Into<UnitKey>, ids: BTreeSet<IconId>) {
        let change = self.store.replace(&unit.into(), ids);
        for id in &change.released {
            self.loader.release(id);
        }
    }

    /// Extracts references from `text` and records them for `unit`. Missing or
    /// empty text clears the unit.
    pub fn scan(&self, unit: impl Into<UnitKey>, text: Option<&str>) {
        let ids = match text {
            Some(text) if !text.is_empty() => self.extractor.extract(text),
            _ => BTreeSet::new(),
        };
        self.replace(unit, ids);
    }

    /// Forgets a removed source unit.
    pub fn clear(&self, unit: impl Into<UnitKey>) {
        self.replace(unit, BTreeSet::new());
    }

    /// Starts a new build generation; nothing from the previous one survives.
    pub fn reset(&self) {
        self.store.reset();
        self.composer.invalidate();
        self.loader.reset();
        info!("sprite engine reset, generation {}", self.loader.generation());
    }

    pub fn is_dirty(&self) -> bool {
        self.composer.is_dirty(&self.store)
    }

    pub async fn compose(&self) -> Arc<Sprite> {
        self.composer.compose(&self.store, &self.loader).await
    }

    pub async fn resolve(&self, id: &IconId) -> Resolution {
        self.loader.resolve(id).await
    }

    /// Active ids in the order they appear in the sprite.
    pub fn active_ids(&self) -> Vec<IconId> {
        self.store.active_ids()
    }

    pub fn reference_count(&self, id: &IconId) -> usize {
        self.store.reference_count(id)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            units: self.store.unit_count(),
            active_ids: self.store.active_count(),
            cached_symbols: self.loader.cached_symbols(),
            cached_failures: self.loader.cached_failures(),
            file_reads: self.loader.file_reads(),
            generation: self.loader.generation(),
        }
    }

    /// Body markup for injecting into a rendered document, wrapped in a hidden
    /// container. `None` when there is nothing to inject.
    pub async fn inline_markup(&self) -> Option<String> {
        let sprite = self.compose().await;
        if sprite.is_empty() {
            return None;
        }
        Some(format!(
            "<svg xmlns=\"{SVG_NAMESPACE}\" style=\"display:none\">{}</svg>",
            sprite.body
        ))
    }

    /// Writes the full sprite document to `out_dir/<output>`. Nothing is
    /// written for an empty sprite.
    pub async fn emit(&self, out_dir: &Path) -> Result<Option<PathBuf>> {
        let sprite = self.compose().await;
        if sprite.is_empty() {
            debug!("sprite is empty, skipping {}", self.config.output);
            return Ok(None);
        }

        tokio::fs::create_dir_all(out_dir).await?;
        let path = out_dir.join(&self.config.output);
        tokio::fs::write(&path, sprite.document.as_bytes()).await?;
        info!(
            "wrote sprite with {} icons to {}",
            self.store.active_count(),
            path.display()
        );
        Ok(Some(path))
    }
}

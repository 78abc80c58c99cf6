use crate::diagnostics::DiagnosticSink;
use crate::svg::{compile_symbol, SvgError};
use dashmap::DashMap;
use iconsprite_core::{IconId, LoadFailure, Symbol};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

/// File extension of icon sources.
pub const ICON_EXTENSION: &str = "svg";

pub type Resolution = std::result::Result<Arc<Symbol>, LoadFailure>;

type Pending = Arc<OnceCell<Resolution>>;

/// Resolves icon ids to symbols, caching successes and failures for the
/// current generation.
///
/// Concurrent requests for an id that is not cached yet share one pending
/// load through the in-flight table; the entry is drained once the result is
/// cached.
pub struct SymbolLoader {
    dirs: BTreeMap<String, PathBuf>,
    cache: DashMap<IconId, Resolution>,
    in_flight: Mutex<HashMap<IconId, Pending>>,
    warned: Mutex<HashSet<IconId>>,
    sink: Arc<dyn DiagnosticSink>,
    generation: AtomicU64,
    file_reads: AtomicU64,
}

impl SymbolLoader {
    pub fn new(dirs: BTreeMap<String, PathBuf>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            dirs,
            cache: DashMap::new(),
            in_flight: Mutex::new(HashMap::new()),
            warned: Mutex::new(HashSet::new()),
            sink,
            generation: AtomicU64::new(0),
            file_reads: AtomicU64::new(0),
        }
    }

    pub async fn resolve(&self, id: &IconId) -> Resolution {
        self.resolve_in(id, self.generation()).await
    }

    /// Resolves `id` on behalf of `generation`. Once that generation has been
    /// reset the file is still loaded for the caller, but nothing is cached,
    /// coalesced or reported.
    pub async fn resolve_in(&self, id: &IconId, generation: u64) -> Resolution {
        if generation == self.generation() {
            if let Some(cached) = self.cache.get(id) {
                trace!("symbol cache hit for {}", id);
                return cached.value().clone();
            }
        }

        let pending = {
            let mut in_flight = self.in_flight.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                None
            } else if let Some(cached) = self.cache.get(id) {
                // A load may have finished between the lookup above and taking the lock.
                return cached.value().clone();
            } else {
                Some(
                    in_flight
                        .entry(id.clone())
                        .or_insert_with(|| Arc::new(OnceCell::new()))
                        .clone(),
                )
            }
        };

        let Some(pending) = pending else {
            debug!("resolving {} for stale generation {}", id, generation);
            return self.load(id).await;
        };

        let resolution = pending.get_or_init(|| self.load(id)).await.clone();
        self.settle(id, &pending, generation, &resolution);
        resolution
    }

    /// Moves a finished load into the cache and drains its in-flight entry.
    /// Results from a generation that has since been reset are dropped.
    fn settle(&self, id: &IconId, pending: &Pending, generation: u64, resolution: &Resolution) {
        let warning = {
            let mut in_flight = self.in_flight.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("discarding {} resolved for a previous generation", id);
                return;
            }
            match in_flight.get(id) {
                Some(current) if Arc::ptr_eq(current, pending) => {}
                _ => return,
            }
            in_flight.remove(id);
            self.cache.insert(id.clone(), resolution.clone());

            match resolution {
                Err(failure) if failure.is_warnable() && self.warned.lock().insert(id.clone()) => {
                    Some(failure.to_string())
                }
                _ => None,
            }
        };

        if let Some(message) = warning {
            self.sink.report(&message);
        }
    }

    async fn load(&self, id: &IconId) -> Resolution {
        let (prefix, name) = id
            .split()
            .filter(|(_, name)| !name.contains(['/', '\\']))
            .ok_or_else(|| LoadFailure::MalformedId(id.clone()))?;
        let dir = self
            .dirs
            .get(prefix)
            .ok_or_else(|| LoadFailure::UnresolvablePrefix(id.clone()))?;

        let path = dir.join(format!("{name}.{ICON_EXTENSION}"));
        let source = path.display().to_string();
        self.file_reads.fetch_add(1, Ordering::Relaxed);
        debug!("loading {} from {}", id, source);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| LoadFailure::MissingFile {
                id: id.clone(),
                path: source.clone(),
                reason: e.to_string(),
            })?;
        let Ok(content) = String::from_utf8(bytes) else {
            return Err(LoadFailure::InvalidGraphic {
                id: id.clone(),
                path: source,
            });
        };

        compile_symbol(id, &content)
            .map(Arc::new)
            .map_err(|e| match e {
                SvgError::NoRoot => LoadFailure::InvalidGraphic {
                    id: id.clone(),
                    path: source,
                },
                SvgError::NoViewBox => LoadFailure::MissingSizeBox {
                    id: id.clone(),
                    path: source,
                },
            })
    }

    /// Frees the cached symbol of an id nobody references any more. Cached
    /// failures stay so a broken icon is never read or reported twice.
    pub fn release(&self, id: &IconId) {
        if self.cache.remove_if(id, |_, resolution| resolution.is_ok()).is_some() {
            trace!("released symbol {}", id);
        }
    }

    /// Starts a new generation: caches, warned ids and in-flight bookkeeping
    /// are discarded, and loads still running for the old generation will not
    /// publish their results.
    pub fn reset(&self) {
        let mut in_flight = self.in_flight.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        in_flight.clear();
        self.cache.clear();
        self.warned.lock().clear();
        self.file_reads.store(0, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn cached_symbols(&self) -> usize {
        self.cache.iter().filter(|e| e.value().is_ok()).count()
    }

    pub fn cached_failures(&self) -> usize {
        self.cache.iter().filter(|e| e.value().is_err()).count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Source files read since the generation started.
    pub fn file_reads(&self) -> u64 {
        self.file_reads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use std::fs;
    use tempfile::TempDir;

    fn loader_with(dir: &TempDir) -> (SymbolLoader, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let mut dirs = BTreeMap::new();
        dirs.insert("foo".to_string(), dir.path().to_path_buf());
        dirs.insert("outline".to_string(), dir.path().to_path_buf());
        (SymbolLoader::new(dirs, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_resolve_and_cache() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("x.svg"),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path fill="red" d="M0"/></svg>"#,
        )
        .unwrap();
        let (loader, sink) = loader_with(&dir);
        let id = IconId::new("foo/x");

        let symbol = loader.resolve(&id).await.unwrap();
        assert_eq!(symbol.body, r#"<path d="M0"/>"#);
        assert_eq!(symbol.view_box.to_string(), "0 0 24 24");

        loader.resolve(&id).await.unwrap();
        assert_eq!(loader.file_reads(), 1);
        assert_eq!(loader.cached_symbols(), 1);
        assert_eq!(loader.in_flight(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_silent_failures() {
        let dir = TempDir::new().unwrap();
        let (loader, sink) = loader_with(&dir);

        for raw in ["foo", "/x", "foo/", "foo/a/b"] {
            let id = IconId::new(raw);
            assert!(matches!(loader.resolve(&id).await, Err(LoadFailure::MalformedId(_))));
        }
        assert!(matches!(
            loader.resolve(&IconId::new("bar/x")).await,
            Err(LoadFailure::UnresolvablePrefix(_))
        ));
        assert!(sink.is_empty());
        assert_eq!(loader.file_reads(), 0);
    }

    #[tokio::test]
    async fn test_warnable_failures_are_cached_and_reported_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notsvg.svg"), "<html></html>").unwrap();
        fs::write(dir.path().join("nobox.svg"), "<svg width=\"1\"></svg>").unwrap();
        let (loader, sink) = loader_with(&dir);

        for _ in 0..3 {
            assert!(matches!(
                loader.resolve(&IconId::new("foo/missing")).await,
                Err(LoadFailure::MissingFile { .. })
            ));
            assert!(matches!(
                loader.resolve(&IconId::new("foo/notsvg")).await,
                Err(LoadFailure::InvalidGraphic { .. })
            ));
            assert!(matches!(
                loader.resolve(&IconId::new("foo/nobox")).await,
                Err(LoadFailure::MissingSizeBox { .. })
            ));
        }

        assert_eq!(sink.len(), 3);
        assert_eq!(loader.file_reads(), 3);
        assert_eq!(loader.cached_failures(), 3);
    }

    #[tokio::test]
    async fn test_non_utf8_icon_is_invalid_graphic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("binary.svg"), [0x3c, 0x73, 0xff, 0xfe, 0x00]).unwrap();
        let (loader, sink) = loader_with(&dir);

        let resolution = loader.resolve(&IconId::new("foo/binary")).await;
        assert!(matches!(resolution, Err(LoadFailure::InvalidGraphic { .. })));
        assert_eq!(sink.len(), 1);
        assert!(sink.messages()[0].contains("no <svg> element"));
    }

    #[tokio::test]
    async fn test_stale_generation_is_loaded_but_not_cached() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.svg"), "<svg viewBox=\"0 0 1 1\"/>").unwrap();
        let (loader, sink) = loader_with(&dir);
        let stale = loader.generation();
        loader.reset();

        assert!(loader.resolve_in(&IconId::new("foo/x"), stale).await.is_ok());
        assert!(loader.resolve_in(&IconId::new("foo/missing"), stale).await.is_err());
        assert_eq!(loader.cached_symbols(), 0);
        assert_eq!(loader.cached_failures(), 0);
        assert_eq!(loader.in_flight(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_release_keeps_failures() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.svg"), "<svg viewBox=\"0 0 1 1\"/>").unwrap();
        let (loader, _sink) = loader_with(&dir);
        let ok = IconId::new("foo/x");
        let bad = IconId::new("foo/y");
        loader.resolve(&ok).await.unwrap();
        loader.resolve(&bad).await.unwrap_err();

        loader.release(&ok);
        loader.release(&bad);
        assert_eq!(loader.cached_symbols(), 0);
        assert_eq!(loader.cached_failures(), 1);
    }

    #[tokio::test]
    async fn test_reset_forgets_warnings() {
        let dir = TempDir::new().unwrap();
        let (loader, sink) = loader_with(&dir);
        let id = IconId::new("foo/missing");

        loader.resolve(&id).await.unwrap_err();
        loader.reset();
        assert_eq!(loader.cached_failures(), 0);
        assert_eq!(loader.generation(), 1);

        loader.resolve(&id).await.unwrap_err();
        assert_eq!(sink.len(), 2);
    }
}

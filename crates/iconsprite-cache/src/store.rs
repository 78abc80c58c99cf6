use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use iconsprite_core::{IconId, UnitKey};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Ids that entered or left the active universe during one `replace`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UniverseChange {
    pub activated: Vec<IconId>,
    pub released: Vec<IconId>,
}

impl UniverseChange {
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty() && self.released.is_empty()
    }
}

/// Per-unit reference sets plus the reference counts derived from them.
///
/// `revision` is bumped every time the active universe changes. The composer
/// remembers the revision its sprite was built from; the store is dirty while
/// the two differ.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    units: DashMap<UnitKey, BTreeSet<IconId>>,
    counts: DashMap<IconId, usize>,
    revision: AtomicU64,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the reference set of `unit`.
    ///
    /// Set-equal input is a no-op. An empty set removes the unit entirely.
    pub fn replace(&self, unit: &UnitKey, ids: BTreeSet<IconId>) -> UniverseChange {
        let mut change = UniverseChange::default();

        // The unit's shard stays locked while counts move, so two replaces of
        // the same unit cannot interleave.
        match self.units.entry(unit.clone()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == ids {
                    return change;
                }
                let (removed, added): (Vec<IconId>, Vec<IconId>) = {
                    let previous = entry.get();
                    (
                        previous.difference(&ids).cloned().collect(),
                        ids.difference(previous).cloned().collect(),
                    )
                };
                for id in removed {
                    if self.decrement(&id) {
                        change.released.push(id);
                    }
                }
                for id in added {
                    if self.increment(&id) {
                        change.activated.push(id);
                    }
                }
                if ids.is_empty() {
                    entry.remove();
                } else {
                    entry.insert(ids);
                }
            }
            Entry::Vacant(entry) => {
                if ids.is_empty() {
                    return change;
                }
                for id in &ids {
                    if self.increment(id) {
                        change.activated.push(id.clone());
                    }
                }
                entry.insert(ids);
            }
        }

        if !change.is_empty() {
            let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                "unit {} changed active universe (+{} -{}), revision {}",
                unit,
                change.activated.len(),
                change.released.len(),
                revision
            );
        }
        change
    }

    /// Returns true when the id became active.
    fn increment(&self, id: &IconId) -> bool {
        let mut count = self.counts.entry(id.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns true when the id dropped out of the active universe.
    fn decrement(&self, id: &IconId) -> bool {
        match self.counts.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() -= 1;
                if *entry.get() == 0 {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Active ids sorted by byte value.
    pub fn active_ids(&self) -> Vec<IconId> {
        let mut ids: Vec<IconId> = self.counts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn reference_count(&self, id: &IconId) -> usize {
        self.counts.get(id).map(|c| *c).unwrap_or(0)
    }

    pub fn unit_ids(&self, unit: &UnitKey) -> Option<BTreeSet<IconId>> {
        self.units.get(unit).map(|ids| ids.clone())
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn active_count(&self) -> usize {
        self.counts.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Drops every unit and count. The revision keeps increasing so sprites
    /// composed before the reset are never mistaken for current ones.
    pub fn reset(&self) {
        self.units.clear();
        self.counts.clear();
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn set(ids: &[&str]) -> BTreeSet<IconId> {
        ids.iter().map(|id| IconId::new(id)).collect()
    }

    #[test]
    fn test_counts_follow_units() {
        let store = ReferenceStore::new();
        let a = UnitKey::new("a.html");
        let b = UnitKey::new("b.html");

        store.replace(&a, set(&["mdi/home", "mdi/cog"]));
        store.replace(&b, set(&["mdi/home"]));
        assert_eq!(store.reference_count(&IconId::new("mdi/home")), 2);
        assert_eq!(store.reference_count(&IconId::new("mdi/cog")), 1);

        let change = store.replace(&a, set(&["mdi/home"]));
        assert_eq!(change.released, vec![IconId::new("mdi/cog")]);
        assert!(change.activated.is_empty());
        assert_eq!(store.active_ids(), vec![IconId::new("mdi/home")]);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_identical_replace_is_noop() {
        let store = ReferenceStore::new();
        let unit = UnitKey::new("page.md");
        store.replace(&unit, set(&["a/x", "a/y"]));
        let revision = store.revision();

        let change = store.replace(&unit, set(&["a/y", "a/x"]));
        assert!(change.is_empty());
        assert_eq!(store.revision(), revision);
        assert_eq!(store.reference_count(&IconId::new("a/x")), 1);
    }

    #[test]
    fn test_overlap_without_universe_change_keeps_revision() {
        let store = ReferenceStore::new();
        store.replace(&UnitKey::new("one"), set(&["a/x"]));
        let revision = store.revision();

        store.replace(&UnitKey::new("two"), set(&["a/x"]));
        assert_eq!(store.revision(), revision);
        assert_eq!(store.reference_count(&IconId::new("a/x")), 2);
    }

    #[test]
    fn test_empty_set_removes_unit() {
        let store = ReferenceStore::new();
        let unit = UnitKey::new("gone.html");
        store.replace(&unit, set(&["a/x"]));
        assert_eq!(store.unit_count(), 1);

        let change = store.replace(&unit, BTreeSet::new());
        assert_eq!(change.released, vec![IconId::new("a/x")]);
        assert_eq!(store.unit_count(), 0);
        assert!(store.unit_ids(&unit).is_none());
        assert!(store.active_ids().is_empty());

        // clearing an unknown unit changes nothing
        let revision = store.revision();
        assert!(store.replace(&unit, BTreeSet::new()).is_empty());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_active_ids_sorted_bytewise() {
        let store = ReferenceStore::new();
        store.replace(&UnitKey::new("1"), set(&["b/x", "a/y"]));
        store.replace(&UnitKey::new("2"), set(&["a/y"]));
        assert_eq!(store.active_ids(), vec![IconId::new("a/y"), IconId::new("b/x")]);
    }

    #[test]
    fn test_concurrent_replace_keeps_counts_exact() {
        let store = Arc::new(ReferenceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let unit = UnitKey::new(format!("unit-{t}-{i}"));
                        store.replace(&unit, set(&["shared/icon", "other/icon"]));
                        if i % 2 == 0 {
                            store.replace(&unit, set(&["shared/icon"]));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.unit_count(), 1600);
        assert_eq!(store.reference_count(&IconId::new("shared/icon")), 1600);
        assert_eq!(store.reference_count(&IconId::new("other/icon")), 800);
    }

    #[test]
    fn test_reset_clears_everything_and_advances_revision() {
        let store = ReferenceStore::new();
        store.replace(&UnitKey::new("x"), set(&["a/x"]));
        let revision = store.revision();
        store.reset();
        assert_eq!(store.unit_count(), 0);
        assert_eq!(store.active_count(), 0);
        assert!(store.revision() > revision);
    }
}

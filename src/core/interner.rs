// This module implements the flag-set intern pool. Each instruction template names a set
// of flags; FlagSetInterner canonicalizes the set (sorted, deduplicated, comma-joined),
// looks the canonical key up in a hashbrown map and either returns the index issued the
// first time that key was seen or builds the key's FlagBits from the registry, appends it
// and issues the next contiguous index. Keys live in a bumpalo arena owned by the build
// phase, mirroring the arena-backed string interning of the compilation session. The
// empty set and the "ignore" sentinel produce no index. Unknown flag names are rejected
// because a partial bitset would silently mis-match instructions later. freeze() turns
// the pool into an owned, read-only FlagTable that can be shared across threads.
//
// Deduplication is by canonical key, not by bit value: two different name sets that
// happened to produce the same bits would still get separate indices. Downstream
// consumers rely on indices following the order in which keys first appear.

//! Content-addressed flag-set intern pool.

use super::bitset::{FlagBit, FlagBits};
use super::error::{FlagError, FlagResult};
use super::registry::FlagRegistry;
use bumpalo::Bump;
use hashbrown::HashMap;

/// Index of an interned flag set.
pub type FlagSetIndex = u32;

/// Sentinel flag list meaning "no flags at all".
pub const IGNORE_KEY: &str = "ignore";

/// Counters collected while interning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InternStats {
    /// Calls to `intern` that produced an index.
    pub lookups: usize,
    /// Lookups answered by an existing entry.
    pub hits: usize,
    /// New entries appended.
    pub inserted: usize,
    /// Empty or sentinel sets.
    pub ignored: usize,
}

/// Build the canonical key of a flag-name set: sorted, deduplicated, comma-joined.
///
/// Returns `None` for the empty set and for the `ignore` sentinel.
pub fn canonical_key<I, S>(names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<S> = names.into_iter().collect();
    let mut sorted: Vec<&str> = names.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();
    sorted.dedup();

    match sorted.as_slice() {
        [] => None,
        [only] if *only == IGNORE_KEY => None,
        _ => Some(sorted.join(",")),
    }
}

/// Append-only pool of interned flag sets, alive for the build phase.
pub struct FlagSetInterner<'a> {
    /// Arena holding the canonical keys.
    arena: &'a Bump,
    registry: &'a FlagRegistry,
    /// Canonical key to entry position.
    index: HashMap<&'a str, FlagSetIndex>,
    /// Entries in issue order.
    entries: Vec<(&'a str, FlagBits)>,
    stats: InternStats,
}

impl<'a> FlagSetInterner<'a> {
    /// Create an empty pool resolving names against `registry`.
    pub fn new(arena: &'a Bump, registry: &'a FlagRegistry) -> Self {
        Self {
            arena,
            registry,
            index: HashMap::new(),
            entries: Vec::new(),
            stats: InternStats::default(),
        }
    }

    /// Intern a set of flag names.
    ///
    /// Returns `Ok(None)` for the empty set or the `ignore` sentinel. The same
    /// set always yields the same index regardless of name order.
    pub fn intern<I, S>(&mut self, names: I) -> FlagResult<Option<FlagSetIndex>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        // Declared names never contain the separator, so such a name would
        // only alias the key of a different set.
        if let Some(bad) = names.iter().map(|n| -> &str { n.as_ref() }).find(|n| n.contains(',')) {
            return Err(FlagError::UnknownFlag {
                name: bad.to_string(),
                key: bad.to_string(),
            });
        }

        let Some(key) = canonical_key(&names) else {
            self.stats.ignored += 1;
            return Ok(None);
        };
        self.stats.lookups += 1;

        if let Some(&idx) = self.index.get(key.as_str()) {
            self.stats.hits += 1;
            return Ok(Some(idx));
        }

        let bits = self.resolve(&key)?;
        let idx = self.entries.len() as FlagSetIndex;
        let stored: &'a str = self.arena.alloc_str(&key);
        self.entries.push((stored, bits));
        self.index.insert(stored, idx);
        self.stats.inserted += 1;
        log::trace!("interned flag set {idx}: {stored}");

        Ok(Some(idx))
    }

    /// Intern a comma-separated flag list such as `"SSE,LOCK"`.
    pub fn intern_list(&mut self, list: &str) -> FlagResult<Option<FlagSetIndex>> {
        self.intern(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Build the bitset for a canonical key, failing on undeclared names.
    fn resolve(&self, key: &str) -> FlagResult<FlagBits> {
        let mut bits = FlagBits::new();
        for name in key.split(',') {
            let bit: FlagBit = self.registry.bit(name).ok_or_else(|| FlagError::UnknownFlag {
                name: name.to_string(),
                key: key.to_string(),
            })?;
            bits.set(bit);
        }
        Ok(bits)
    }

    /// Look up an already interned key without inserting.
    pub fn get(&self, key: &str) -> Option<FlagSetIndex> {
        self.index.get(key).copied()
    }

    /// Number of distinct sets interned so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> InternStats {
        self.stats
    }

    pub fn registry(&self) -> &'a FlagRegistry {
        self.registry
    }

    /// End the build phase and hand out the read-only table.
    pub fn freeze(self) -> FlagTable {
        let mut keys = Vec::with_capacity(self.entries.len());
        let mut bits = Vec::with_capacity(self.entries.len());
        let mut index = HashMap::with_capacity(self.entries.len());

        for (i, (key, set)) in self.entries.into_iter().enumerate() {
            index.insert(key.to_string(), i as FlagSetIndex);
            keys.push(key.to_string());
            bits.push(set);
        }

        log::debug!(
            "froze flag table: {} entries, {} words each ({} lookups, {} hits, {} ignored)",
            bits.len(),
            self.registry.word_count(),
            self.stats.lookups,
            self.stats.hits,
            self.stats.ignored
        );

        FlagTable {
            keys,
            bits,
            index,
            word_count: self.registry.word_count(),
        }
    }
}

/// Frozen, order-preserving table of interned flag sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagTable {
    keys: Vec<String>,
    bits: Vec<FlagBits>,
    index: HashMap<String, FlagSetIndex>,
    word_count: usize,
}

impl FlagTable {
    /// Bitset stored at `idx`.
    pub fn get(&self, idx: FlagSetIndex) -> Option<&FlagBits> {
        self.bits.get(idx as usize)
    }

    /// Canonical key stored at `idx`.
    pub fn key(&self, idx: FlagSetIndex) -> Option<&str> {
        self.keys.get(idx as usize).map(String::as_str)
    }

    /// Index of a canonical key.
    pub fn index_of(&self, key: &str) -> Option<FlagSetIndex> {
        self.index.get(key).copied()
    }

    /// Test `bit` in entry `idx`; missing entries have no flags.
    pub fn has_flag(&self, idx: FlagSetIndex, bit: FlagBit) -> bool {
        self.get(idx).is_some_and(|set| set.test(bit))
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Words per entry.
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (FlagSetIndex, &str, &FlagBits)> + '_ {
        self.keys
            .iter()
            .zip(self.bits.iter())
            .enumerate()
            .map(|(i, (k, b))| (i as FlagSetIndex, k.as_str(), b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::RegistryBuilder;

    fn registry() -> FlagRegistry {
        let mut b = RegistryBuilder::new();
        b.declare("LOCK", "").unwrap();
        b.declare("LONG", "").unwrap();
        b.close_field("general").unwrap();
        b.declare("SSE", "").unwrap();
        b.declare("AVX", "").unwrap();
        b.close_field("feature").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key(["SSE", "LOCK"]).as_deref(), Some("LOCK,SSE"));
        assert_eq!(canonical_key(["SSE", "LOCK", "SSE"]).as_deref(), Some("LOCK,SSE"));
        assert_eq!(canonical_key(Vec::<&str>::new()), None);
        assert_eq!(canonical_key(["ignore"]), None);
    }

    #[test]
    fn test_intern_is_order_independent() {
        let reg = registry();
        let arena = Bump::new();
        let mut pool = FlagSetInterner::new(&arena, &reg);

        let a = pool.intern(["SSE", "LOCK"]).unwrap();
        let b = pool.intern(["LOCK", "SSE"]).unwrap();
        assert_eq!(a, Some(0));
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);

        let stats = pool.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.inserted, 1);
    }

    #[test]
    fn test_intern_issues_contiguous_indices() {
        let reg = registry();
        let arena = Bump::new();
        let mut pool = FlagSetInterner::new(&arena, &reg);

        assert_eq!(pool.intern(["AVX"]).unwrap(), Some(0));
        assert_eq!(pool.intern(["LONG"]).unwrap(), Some(1));
        assert_eq!(pool.intern(["AVX", "LONG"]).unwrap(), Some(2));
        assert_eq!(pool.intern(["AVX"]).unwrap(), Some(0));
        assert_eq!(pool.get("AVX,LONG"), Some(2));
    }

    #[test]
    fn test_intern_sentinel_yields_no_index() {
        let reg = registry();
        let arena = Bump::new();
        let mut pool = FlagSetInterner::new(&arena, &reg);

        assert_eq!(pool.intern(Vec::<String>::new()).unwrap(), None);
        assert_eq!(pool.intern_list("ignore").unwrap(), None);
        assert_eq!(pool.intern_list("").unwrap(), None);
        assert!(pool.is_empty());
        assert_eq!(pool.stats().ignored, 3);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let reg = registry();
        let arena = Bump::new();
        let mut pool = FlagSetInterner::new(&arena, &reg);

        let err = pool.intern(["SSE", "BOGUS"]).unwrap_err();
        match err {
            FlagError::UnknownFlag { name, key } => {
                assert_eq!(name, "BOGUS");
                assert_eq!(key, "BOGUS,SSE");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(pool.is_empty());
    }

    #[test]
    fn test_joined_name_does_not_hit_existing_key() {
        let reg = registry();
        let arena = Bump::new();
        let mut pool = FlagSetInterner::new(&arena, &reg);

        assert_eq!(pool.intern(["LOCK", "SSE"]).unwrap(), Some(0));
        assert!(matches!(pool.intern(["LOCK,SSE"]), Err(FlagError::UnknownFlag { .. })));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.stats().hits, 0);
    }

    #[test]
    fn test_frozen_table_bits() {
        let reg = registry();
        let arena = Bump::new();
        let mut pool = FlagSetInterner::new(&arena, &reg);
        let idx = pool.intern_list("LOCK, AVX").unwrap().unwrap();
        let table = pool.freeze();

        assert_eq!(table.len(), 1);
        assert_eq!(table.word_count(), 2);
        assert_eq!(table.key(idx), Some("AVX,LOCK"));
        assert_eq!(table.index_of("AVX,LOCK"), Some(idx));

        let bits = table.get(idx).unwrap();
        assert_eq!(bits.words(2), &[0b1, 0b10]);
        assert!(table.has_flag(idx, reg.bit("AVX").unwrap()));
        assert!(!table.has_flag(idx, reg.bit("SSE").unwrap()));
        assert!(!table.has_flag(7, 0));
    }
}

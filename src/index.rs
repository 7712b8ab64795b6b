// Index of old-file rows by composite key.
// Entries live in a Vec in first-seen order and a hash map points keys at
// slots, so the removal sweep is deterministic. Built once per run, then dropped.

use ahash::AHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: String,
    pub offset: u64,
    pub length: u32,
    pub hash: u32,
    pub visited: bool,
}

#[derive(Debug, Default)]
pub struct OldFileIndex {
    entries: Vec<IndexEntry>,
    slots: AHashMap<String, usize>,
    overwritten: u64,
}

impl OldFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a row. A later row with the same key replaces the earlier one's
    /// location and hash (last write wins) but keeps its slot.
    pub fn insert(&mut self, key: String, offset: u64, length: u32, hash: u32) {
        if let Some(&slot) = self.slots.get(&key) {
            let entry = &mut self.entries[slot];
            entry.offset = offset;
            entry.length = length;
            entry.hash = hash;
            self.overwritten += 1;
            return;
        }
        self.slots.insert(key.clone(), self.entries.len());
        self.entries.push(IndexEntry {
            key,
            offset,
            length,
            hash,
            visited: false,
        });
    }

    /// Look up a key and mark its entry visited.
    pub fn visit(&mut self, key: &str) -> Option<&IndexEntry> {
        let slot = *self.slots.get(key)?;
        let entry = &mut self.entries[slot];
        entry.visited = true;
        Some(&*entry)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.slots.get(key).map(|slot| &self.entries[*slot])
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rows that replaced an earlier row with the same key.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_in_first_slot() {
        let mut index = OldFileIndex::new();
        index.insert("1|".into(), 0, 5, 11);
        index.insert("2|".into(), 6, 5, 22);
        index.insert("1|".into(), 12, 7, 33);
        assert_eq!(index.len(), 2);
        assert_eq!(index.overwritten(), 1);
        let e = index.get("1|").unwrap();
        assert_eq!((e.offset, e.length, e.hash), (12, 7, 33));
        assert_eq!(index.entries()[0].key, "1|");
    }

    #[test]
    fn visit_marks_and_sweep_skips() {
        let mut index = OldFileIndex::new();
        index.insert("a|".into(), 0, 1, 1);
        index.insert("b|".into(), 2, 1, 2);
        index.insert("c|".into(), 4, 1, 3);
        assert!(index.visit("b|").is_some());
        assert!(index.visit("zzz|").is_none());
        let left: Vec<_> = index
            .entries()
            .iter()
            .filter(|e| !e.visited)
            .map(|e| e.key.as_str())
            .collect();
        assert_eq!(left, vec!["a|", "c|"]);
    }
}

// Composite keys and the cheap row checksum used by the fast path.

const KEY_SEPARATOR: char = '|';
const FIELD_SEPARATOR: u8 = 0;
const DJB2_SEED: u32 = 5381;

/// Join the trimmed key fields, each followed by `|`. Missing fields count as empty.
///
/// Returns `None` when every key part is empty: such rows are never indexed
/// and never matched.
pub fn build_key(fields: &[String], key_indices: &[usize]) -> Option<String> {
    let mut key = String::new();
    let mut any = false;
    for idx in key_indices {
        let part = fields.get(*idx).map(|f| f.trim()).unwrap_or("");
        if !part.is_empty() {
            any = true;
        }
        key.push_str(part);
        key.push(KEY_SEPARATOR);
    }
    if any {
        Some(key)
    } else {
        None
    }
}

/// Key as shown to users: the stored key without its trailing separator.
pub fn display_key(key: &str) -> &str {
    key.strip_suffix(KEY_SEPARATOR).unwrap_or(key)
}

/// DJB2 (`h * 33 + b`) over all fields joined by NUL. Collisions are accepted;
/// equal hashes are only trusted as "unchanged" when both headers are identical.
pub fn row_hash(fields: &[String]) -> u32 {
    let mut hash = DJB2_SEED;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hash = step(hash, FIELD_SEPARATOR);
        }
        for b in field.as_bytes() {
            hash = step(hash, *b);
        }
    }
    hash
}

#[inline]
fn step(hash: u32, b: u8) -> u32 {
    (hash << 5).wrapping_add(hash).wrapping_add(b as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn composite_keys() {
        let r = row(&["John", " Smith ", "10"]);
        assert_eq!(build_key(&r, &[0, 1]).as_deref(), Some("John|Smith|"));
        assert_eq!(build_key(&r, &[2]).as_deref(), Some("10|"));
        assert_eq!(build_key(&r, &[0, 9]).as_deref(), Some("John||"));
    }

    #[test]
    fn all_empty_key_is_none() {
        let r = row(&["", "  ", "x"]);
        assert_eq!(build_key(&r, &[0, 1]), None);
        assert_eq!(build_key(&r, &[5]), None);
    }

    #[test]
    fn display_strips_trailing_separator() {
        assert_eq!(display_key("2|"), "2");
        assert_eq!(display_key("John|Smith|"), "John|Smith");
    }

    #[test]
    fn hash_is_djb2_with_separator() {
        assert_eq!(row_hash(&[]), 5381);
        // "a" -> 5381 * 33 + 97
        assert_eq!(row_hash(&row(&["a"])), 177_670);
        assert_ne!(row_hash(&row(&["ab", "c"])), row_hash(&row(&["a", "bc"])));
        assert_eq!(row_hash(&row(&["1", "x"])), row_hash(&row(&["1", "x"])));
    }
}

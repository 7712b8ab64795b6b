// Column aligner: reorder a raw old-file row into new-file column order.

use crate::parser::header::ColumnMapping;

/// The result always has one cell per new-file column. Columns missing from
/// the old file, or past the end of a short old row, come back empty.
pub fn align(raw_old_row: &[String], mapping: &ColumnMapping) -> Vec<String> {
    mapping
        .as_slice()
        .iter()
        .map(|slot| {
            slot.and_then(|i| raw_old_row.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

/// Indices (new-file order) whose values differ, comparing up to the longer
/// of the two rows. A missing cell compares as the empty string.
pub fn diff_indices(old_aligned: &[String], new_row: &[String]) -> Vec<usize> {
    let width = old_aligned.len().max(new_row.len());
    (0..width)
        .filter(|&i| {
            let old = old_aligned.get(i).map(String::as_str).unwrap_or("");
            let new = new_row.get(i).map(String::as_str).unwrap_or("");
            old != new
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reorders_and_pads() {
        let mapping = ColumnMapping(vec![Some(0), Some(2), Some(1), None, Some(7)]);
        let aligned = align(&row(&["1", "a", "b"]), &mapping);
        assert_eq!(aligned, row(&["1", "b", "a", "", ""]));
    }

    #[test]
    fn empty_row_aligns_to_blanks() {
        let aligned = align(&[], &ColumnMapping::identity(3));
        assert_eq!(aligned, row(&["", "", ""]));
    }

    #[test]
    fn diff_treats_missing_as_empty() {
        assert_eq!(diff_indices(&row(&["1", "Bob"]), &row(&["1", "Bobby"])), vec![1]);
        assert_eq!(diff_indices(&row(&["1", ""]), &row(&["1"])), Vec::<usize>::new());
        assert_eq!(diff_indices(&row(&["1"]), &row(&["1", "", "x"])), vec![2]);
    }
}

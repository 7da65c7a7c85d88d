//! RS-014: BLAKE3 digests recorded in the journal.
//!
//! Every digest renders as `blake3:<hex>`.

use crate::core::serializer::ResultTable;

fn render(hash: blake3::Hash) -> String {
    format!("blake3:{}", hash.to_hex())
}

/// Digest of the raw dataset text as read from disk.
pub fn dataset_hash(text: &str) -> String {
    render(blake3::hash(text.as_bytes()))
}

/// Digest of a script under a given backend. The same source run by a
/// different backend hashes differently.
pub fn script_hash(backend: &str, source: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(backend.as_bytes());
    hasher.update(&[0]);
    hasher.update(source.as_bytes());
    render(hasher.finalize())
}

/// Digest of a result table in its TSV rendering, so it matches a hash of
/// the written output file.
pub fn results_hash(table: &ResultTable) -> String {
    render(blake3::hash(table.to_tsv().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serializer::ResultRow;

    fn row(name: &str, cells: &[&str]) -> ResultRow {
        ResultRow {
            name: name.to_string(),
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_rs014_dataset_hash() {
        let h1 = dataset_hash("LATA 2020\nGDP 1");
        assert_eq!(h1, dataset_hash("LATA 2020\nGDP 1"));
        assert_ne!(h1, dataset_hash("LATA 2020\nGDP 2"));
        assert!(h1.starts_with("blake3:"));
        assert_eq!(h1.len(), 7 + 64);
    }

    #[test]
    fn test_rs014_script_hash_depends_on_backend() {
        let h = script_hash("calc", "X = 1");
        assert_eq!(h, script_hash("calc", "X = 1"));
        assert_ne!(h, script_hash("other", "X = 1"));
        // the separator keeps ("ca", "lcX") apart from ("calc", "X")
        assert_ne!(script_hash("ca", "lcX = 1"), h);
    }

    #[test]
    fn test_rs014_results_hash_matches_rendered_tsv() {
        let table = ResultTable {
            rows: vec![row("LL", &["a", "b"]), row("GDP", &["1.0", "2.0"])],
        };
        assert_eq!(results_hash(&table), dataset_hash(&table.to_tsv()));

        let changed = ResultTable {
            rows: vec![row("LL", &["a", "b"]), row("GDP", &["1.0", "2.5"])],
        };
        assert_ne!(results_hash(&table), results_hash(&changed));
    }
}

//! Catalog loading boundary.
//!
//! The index does not own where items come from; at startup they are read
//! from a JSON file (an array of items), and at runtime a full replacement
//! catalog arrives via `POST /reindex`. Database-backed loading would slot
//! in behind the same function signature.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::Item;

/// Load a catalog from a JSON file containing an array of items.
///
/// Duplicate item ids are allowed through with a warning; the index keys
/// merged results by id, so duplicates collapse at merge time.
pub fn load_catalog(path: &Path) -> Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

    let items: Vec<Item> =
        serde_json::from_str(&content).with_context(|| "Failed to parse catalog file")?;

    let mut ids: Vec<u64> = items.iter().map(|i| i.id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != items.len() {
        tracing::warn!(
            total = items.len(),
            distinct = ids.len(),
            "catalog contains duplicate item ids"
        );
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_catalog_parses_items() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            br#"[
                {"id": 1, "title": "Apple iPhone 14 Pro", "brand": "Apple", "description": "A16 Bionic"},
                {"id": 2, "title": "Samsung Galaxy S23", "brand": "Samsung"}
            ]"#,
        )
        .unwrap();

        let items = load_catalog(f.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[1].brand, "Samsung");
        // Omitted fields are defaulted.
        assert_eq!(items[1].description, "");
        assert_eq!(items[1].status, 0);
    }

    #[test]
    fn test_load_catalog_rejects_invalid_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{not json").unwrap();
        assert!(load_catalog(f.path()).is_err());
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let err = load_catalog(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog file"));
    }
}

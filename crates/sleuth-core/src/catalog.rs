//! Static case catalog.
//!
//! Cases are published as a JSON array shipped alongside the client:
//!
//! ```json
//! [{"id": 1, "title": "The Lighthouse", "description": "...", "createdDate": "2025-01-12"}]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or querying the catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// No case has this id.
    #[error("case {id} not found")]
    NotFound {
        /// Requested id.
        id: u64,
    },

    /// The catalog file could not be read.
    #[error("failed to read case catalog {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The catalog is not a JSON array of cases.
    #[error("invalid case catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two cases share an id.
    #[error("duplicate case id {id} in catalog")]
    DuplicateId {
        /// Repeated id.
        id: u64,
    },
}

/// One published case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Case text submitted alongside every theory.
    #[serde(default)]
    pub description: String,
    /// Publication date as written in the catalog.
    #[serde(rename = "createdDate", default)]
    pub created_date: Option<String>,
}

/// Read-only collection of [`Case`]s, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseCatalog {
    cases: Vec<Case>,
}

impl CaseCatalog {
    /// Parses a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or repeated ids.
    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let cases: Vec<Case> = serde_json::from_str(content)?;
        Self::from_cases(cases)
    }

    /// Loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Builds a catalog from cases.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateId`] if two cases share an id.
    pub fn from_cases(cases: Vec<Case>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::with_capacity(cases.len());
        for case in &cases {
            if !seen.insert(case.id) {
                return Err(CatalogError::DuplicateId { id: case.id });
            }
        }
        Ok(Self { cases })
    }

    /// All cases.
    #[must_use]
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Looks up a case.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] if no case has `id`.
    pub fn find(&self, id: u64) -> Result<&Case, CatalogError> {
        self.cases
            .iter()
            .find(|case| case.id == id)
            .ok_or(CatalogError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"id": 1, "title": "The Lighthouse", "description": "A keeper vanished.", "createdDate": "2025-01-12"},
        {"id": 2, "title": "Cold Ledger", "description": "Missing funds."}
    ]"#;

    #[test]
    fn test_parse_and_find() {
        let catalog = CaseCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let case = catalog.find(1).unwrap();
        assert_eq!(case.title, "The Lighthouse");
        assert_eq!(case.created_date.as_deref(), Some("2025-01-12"));
        assert_eq!(catalog.find(2).unwrap().created_date, None);
    }

    #[test]
    fn test_missing_case() {
        let catalog = CaseCatalog::from_json(CATALOG).unwrap();
        assert!(matches!(catalog.find(9), Err(CatalogError::NotFound { id: 9 })));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"[{"id": 1, "title": "a"}, {"id": 1, "title": "b"}]"#;
        assert!(matches!(
            CaseCatalog::from_json(json),
            Err(CatalogError::DuplicateId { id: 1 })
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(&path, CATALOG).unwrap();
        assert_eq!(CaseCatalog::from_file(&path).unwrap().len(), 2);

        assert!(matches!(
            CaseCatalog::from_file(&dir.path().join("absent.json")),
            Err(CatalogError::Io { .. })
        ));
    }
}

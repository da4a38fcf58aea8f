use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MineRagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Manual,
    Incident,
    Bulletin,
}

impl DocType {
    pub const ALL: [Self; 3] = [Self::Manual, Self::Incident, Self::Bulletin];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Incident => "incident",
            Self::Bulletin => "bulletin",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" | "manuals" => Ok(Self::Manual),
            "incident" | "incidents" => Ok(Self::Incident),
            "bulletin" | "bulletins" => Ok(Self::Bulletin),
            _ => Err(format!("Unknown document type: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number within the source document.
    pub number: u32,
    pub text: String,
}

/// One source document as produced by the text-extraction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    source_path: String,
    doc_type: DocType,
    pages: Vec<Page>,
}

impl Document {
    /// Builds a document from page texts, numbering pages from 1.
    pub fn new(
        source_path: impl Into<String>,
        doc_type: DocType,
        pages: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let pages = pages
            .into_iter()
            .zip(1u32..)
            .map(|(text, number)| Page {
                number,
                text: text.into(),
            })
            .collect();
        Self::with_pages(source_path, doc_type, pages)
    }

    /// Builds a document from explicitly numbered pages.
    pub fn with_pages(
        source_path: impl Into<String>,
        doc_type: DocType,
        pages: Vec<Page>,
    ) -> Result<Self> {
        let source_path = source_path.into();
        if source_path.trim().is_empty() {
            return Err(MineRagError::InvalidDocument(
                "source path must not be empty".to_string(),
            ));
        }

        let mut previous = 0u32;
        for page in &pages {
            if page.number == 0 {
                return Err(MineRagError::InvalidDocument(format!(
                    "{source_path}: page numbers are 1-based"
                )));
            }
            if page.number <= previous {
                return Err(MineRagError::InvalidDocument(format!(
                    "{source_path}: page {} follows page {previous}",
                    page.number
                )));
            }
            previous = page.number;
        }

        Ok(Self {
            source_path,
            doc_type,
            pages,
        })
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub const fn doc_type(&self) -> DocType {
        self.doc_type
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

/// Page-level record written by the PDF extraction collaborator (one JSON
/// object per line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub source_path: String,
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_numbers_pages_from_one() {
        let doc = Document::new("m.pdf", DocType::Manual, ["a", "b"]).unwrap();
        let numbers: Vec<u32> = doc.pages().iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_rejects_empty_source_path() {
        let err = Document::new("  ", DocType::Manual, ["a"]).unwrap_err();
        assert!(matches!(err, MineRagError::InvalidDocument(_)));
    }

    #[test]
    fn test_rejects_unordered_pages() {
        let pages = vec![
            Page {
                number: 2,
                text: "b".into(),
            },
            Page {
                number: 2,
                text: "c".into(),
            },
        ];
        let err = Document::with_pages("m.pdf", DocType::Manual, pages).unwrap_err();
        assert!(err.to_string().contains("page 2 follows page 2"));
    }

    #[test]
    fn test_doc_type_parsing() {
        assert_eq!("Manuals".parse::<DocType>(), Ok(DocType::Manual));
        assert_eq!("incident".parse::<DocType>(), Ok(DocType::Incident));
        assert!("memo".parse::<DocType>().is_err());
    }

    #[test]
    fn test_page_record_requires_page_number() {
        let parsed: std::result::Result<PageRecord, _> =
            serde_json::from_str(r#"{"source_path": "m.pdf", "text": "x"}"#);
        assert!(parsed.is_err());
    }
}

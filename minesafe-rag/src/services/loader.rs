//! Reads the text-extraction output directory into documents.
//!
//! Layout: one sub-directory per document type (`manuals/`, `incidents/`,
//! `bulletins/`; singular names work too). `*.jsonl` files hold page records,
//! `*.txt` files hold one document with form-feed separated pages.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{DocType, Document, Page, PageRecord};
use crate::error::{MineRagError, Result};

const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    /// Document types with no directory, or an empty one.
    pub missing: Vec<DocType>,
}

pub fn load_corpus(root: &Path) -> Result<Corpus> {
    if !root.is_dir() {
        return Err(MineRagError::InvalidDocument(format!(
            "corpus directory {} does not exist",
            root.display()
        )));
    }

    let mut corpus = Corpus::default();
    for doc_type in DocType::ALL {
        let Some(dir) = type_dir(root, doc_type) else {
            warn!(doc_type = %doc_type, "no directory for document type");
            corpus.missing.push(doc_type);
            continue;
        };

        let before = corpus.documents.len();
        for file in sorted_files(&dir)? {
            match file.extension().and_then(|e| e.to_str()) {
                Some("jsonl") => corpus.documents.extend(load_jsonl(&file, doc_type)?),
                Some("txt") => corpus.documents.push(load_txt(&file, doc_type)?),
                _ => debug!(path = %file.display(), "skipping unsupported file"),
            }
        }

        let loaded = corpus.documents.len() - before;
        if loaded == 0 {
            warn!(doc_type = %doc_type, dir = %dir.display(), "document type directory is empty");
            corpus.missing.push(doc_type);
        }
        debug!(doc_type = %doc_type, documents = loaded, "loaded documents");
    }
    Ok(corpus)
}

fn type_dir(root: &Path, doc_type: DocType) -> Option<PathBuf> {
    [format!("{}s", doc_type.as_str()), doc_type.as_str().to_string()]
        .into_iter()
        .map(|name| root.join(name))
        .find(|path| path.is_dir())
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Groups page records by source path, in order of first appearance.
pub fn load_jsonl(path: &Path, doc_type: DocType) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path)?;
    let mut order: Vec<String> = Vec::new();
    let mut pages: HashMap<String, Vec<Page>> = HashMap::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: PageRecord = serde_json::from_str(line).map_err(|e| {
            MineRagError::InvalidDocument(format!("{}:{}: {e}", path.display(), line_no + 1))
        })?;
        if !pages.contains_key(&record.source_path) {
            order.push(record.source_path.clone());
        }
        pages.entry(record.source_path).or_default().push(Page {
            number: record.page_number,
            text: record.text,
        });
    }

    order
        .into_iter()
        .map(|source| {
            let mut doc_pages = pages.remove(&source).unwrap_or_default();
            doc_pages.sort_by_key(|p| p.number);
            Document::with_pages(source, doc_type, doc_pages)
        })
        .collect()
}

pub fn load_txt(path: &Path, doc_type: DocType) -> Result<Document> {
    let content = fs::read_to_string(path)?;
    Document::new(
        path.to_string_lossy().to_string(),
        doc_type,
        content.split(PAGE_BREAK),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_loads_jsonl_and_txt_by_type() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "manuals/pages.jsonl",
            concat!(
                r#"{"source_path": "raw/haul.pdf", "page_number": 2, "text": "second"}"#,
                "\n",
                r#"{"source_path": "raw/haul.pdf", "page_number": 1, "text": "first"}"#,
                "\n\n",
                r#"{"source_path": "raw/crusher.pdf", "page_number": 1, "text": "crusher"}"#,
                "\n"
            ),
        );
        write(dir.path(), "incident/2023-fall.txt", "page one\x0cpage two");

        let corpus = load_corpus(dir.path()).unwrap();
        let sources: Vec<&str> = corpus.documents.iter().map(Document::source_path).collect();
        assert_eq!(sources[..2].to_vec(), vec!["raw/haul.pdf", "raw/crusher.pdf"]);
        assert_eq!(corpus.documents[0].pages()[0].text, "first");
        assert_eq!(corpus.documents[2].doc_type(), DocType::Incident);
        assert_eq!(corpus.documents[2].pages().len(), 2);
        assert_eq!(corpus.missing, vec![DocType::Bulletin]);
    }

    #[test]
    fn test_missing_field_is_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bulletins/b.jsonl", r#"{"source_path": "b.pdf", "text": "x"}"#);
        let err = load_corpus(dir.path()).unwrap_err();
        assert!(matches!(err, MineRagError::InvalidDocument(_)));
        assert!(err.to_string().contains("b.jsonl:1"));
    }

    #[test]
    fn test_duplicate_pages_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "manuals/dup.jsonl",
            concat!(
                r#"{"source_path": "d.pdf", "page_number": 1, "text": "a"}"#,
                "\n",
                r#"{"source_path": "d.pdf", "page_number": 1, "text": "b"}"#,
            ),
        );
        assert!(matches!(
            load_corpus(dir.path()),
            Err(MineRagError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_empty_root_reports_every_type_missing() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = load_corpus(dir.path()).unwrap();
        assert!(corpus.documents.is_empty());
        assert_eq!(corpus.missing, DocType::ALL.to_vec());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_corpus(&dir.path().join("nope")).is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ChunkId);
define_id!(RequestId);

impl ChunkId {
    /// Deterministic id for the `index`-th chunk of `page` in `source_path`.
    ///
    /// The file name keeps ids readable; the path hash keeps two documents
    /// that share a file name apart.
    pub fn derive(source_path: &str, page: u32, index: usize) -> Self {
        let file_name = Path::new(source_path)
            .file_name()
            .map_or_else(|| source_path.to_string(), |n| n.to_string_lossy().to_string());
        let hash = blake3::hash(source_path.as_bytes());
        let hex = hex::encode(&hash.as_bytes()[..4]);
        Self(format!("{file_name}#{hex}:{page}:{index}"))
    }
}

impl RequestId {
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let hash = blake3::hash(uuid.as_bytes());
        let hex = hex::encode(&hash.as_bytes()[..3]);
        Self(format!("req-{hex}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_stable() {
        let a = ChunkId::derive("data/raw/manuals/haul.pdf", 3, 0);
        let b = ChunkId::derive("data/raw/manuals/haul.pdf", 3, 0);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("haul.pdf#"));
        assert!(a.as_str().ends_with(":3:0"));
    }

    #[test]
    fn test_chunk_id_separates_same_file_name() {
        let a = ChunkId::derive("manuals/report.pdf", 1, 0);
        let b = ChunkId::derive("incidents/report.pdf", 1, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_prefix() {
        let id = RequestId::generate();
        assert!(id.as_str().starts_with("req-"));
        assert_eq!(id.as_str().len(), "req-".len() + 6);
    }
}

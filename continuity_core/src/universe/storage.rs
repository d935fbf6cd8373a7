//! On-disk layout of one universe.
//!
//! ```text
//! <data_dir>/<universe>/graph.json
//! <data_dir>/<universe>/documents/<document id>.txt
//! ```
//!
//! Path components are percent-encoded so any universe name or document id maps to a
//! single, distinct file name.

use lore_model::DocumentId;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::knowledge_base::KnowledgeGraph;

const GRAPH_FILE: &str = "graph.json";
const DOCUMENTS_DIR: &str = "documents";

/// Encode `name` as a file name. ASCII alphanumerics, `-` and `_` pass through.
pub fn encode_component(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Inverse of [`encode_component`]. Returns `None` for names it could not have produced.
pub fn decode_component(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Files backing one universe.
#[derive(Debug, Clone)]
pub struct UniverseStore {
    root: PathBuf,
}

impl UniverseStore {
    pub fn new(data_dir: impl AsRef<Path>, universe: &str) -> Result<Self, StorageError> {
        if universe.trim().is_empty() {
            return Err(StorageError::InvalidName(universe.to_string()));
        }
        Ok(Self {
            root: data_dir.as_ref().join(encode_component(universe)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn graph_path(&self) -> PathBuf {
        self.root.join(GRAPH_FILE)
    }

    fn document_path(&self, id: &DocumentId) -> PathBuf {
        self.root
            .join(DOCUMENTS_DIR)
            .join(format!("{}.txt", encode_component(id.as_str())))
    }

    /// Load the persisted graph. A universe that was never saved is empty.
    pub fn load_graph(&self) -> Result<KnowledgeGraph, StorageError> {
        match fs::read_to_string(self.graph_path()) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(KnowledgeGraph::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the persisted graph in one rename.
    pub fn save_graph(&self, graph: &KnowledgeGraph) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(graph)?;
        write_atomic(&self.graph_path(), &json)
    }

    pub fn write_document(&self, id: &DocumentId, text: &str) -> Result<(), StorageError> {
        write_atomic(&self.document_path(id), text.as_bytes())
    }

    pub fn read_document(&self, id: &DocumentId) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.document_path(id)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn delete_document(&self, id: &DocumentId) -> Result<(), StorageError> {
        match fs::remove_file(self.document_path(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Names of every universe persisted under `data_dir`.
pub fn discover_universes(data_dir: impl AsRef<Path>) -> Result<Vec<String>, StorageError> {
    let entries = match fs::read_dir(data_dir.as_ref()) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.path().join(GRAPH_FILE).is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().and_then(decode_component) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let dir = path
        .parent()
        .ok_or_else(|| StorageError::InvalidName(path.display().to_string()))?;
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

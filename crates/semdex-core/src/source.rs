use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::text::clean_text;
use crate::traits::DocumentSource;
use crate::types::Document;

/// Documents read from files with a given extension under a root directory.
///
/// Identifiers are the path relative to `root` without its extension, so a
/// top-level `doc_0001.txt` becomes `doc_0001` and nested files keep their
/// directory (`news/doc_0001`).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extension: "txt".to_string() }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unavailable(&self, source: io::Error) -> Error {
        Error::SourceUnavailable { path: self.root.clone(), source }
    }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        let meta = fs::metadata(&self.root).map_err(|e| self.unavailable(e))?;
        if !meta.is_dir() {
            return Err(self.unavailable(io::Error::new(io::ErrorKind::InvalidInput, "not a directory")));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| self.unavailable(io::Error::other(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(self.extension.as_str()) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_file_content(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::SourceUnavailable { path: path.to_path_buf(), source: e })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn doc_id(&self, relative: &Path) -> String {
        relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl DocumentSource for DirectorySource {
    fn load(&self) -> Result<Vec<Document>> {
        let files = self.list_files()?;
        let mut seen = HashSet::with_capacity(files.len());
        let mut docs = Vec::with_capacity(files.len());
        for path in files {
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            let id = self.doc_id(relative);
            if !seen.insert(id.clone()) {
                return Err(Error::DuplicateDocument(id));
            }
            let raw = self.read_file_content(&path)?;
            let filename = relative.to_string_lossy().replace('\\', "/");
            debug!(doc_id = %id, bytes = raw.len(), "loaded document");
            docs.push(Document::new(id, filename, clean_text(&raw)));
        }
        Ok(docs)
    }

    fn describe(&self) -> String {
        format!("{} (*.{})", self.root.display(), self.extension)
    }
}

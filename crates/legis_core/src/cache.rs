use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What a cached document is; decides its subarea and file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Roster,
    BillPage,
    VotePage,
    VoteSheet,
}

impl DocumentKind {
    pub fn subdir(&self) -> &'static str {
        match self {
            DocumentKind::Roster => "roster",
            DocumentKind::BillPage => "bills",
            DocumentKind::VotePage | DocumentKind::VoteSheet => "votes",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::VoteSheet => "pdf",
            _ => "html",
        }
    }
}

/// Document store keyed by (kind, id). Entries are only ever overwritten.
pub trait DocumentCache {
    fn exists(&self, kind: DocumentKind, id: &str) -> bool;
    fn read(&self, kind: DocumentKind, id: &str) -> Result<Vec<u8>>;
    fn write(&mut self, kind: DocumentKind, id: &str, content: &[u8]) -> Result<()>;

    fn read_text(&self, kind: DocumentKind, id: &str) -> Result<String> {
        let bytes = self.read(kind, id)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Cache rooted at a per-session directory.
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: DocumentKind, id: &str) -> PathBuf {
        self.root
            .join(kind.subdir())
            .join(format!("{id}.{}", kind.extension()))
    }
}

impl DocumentCache for FsCache {
    fn exists(&self, kind: DocumentKind, id: &str) -> bool {
        self.path_for(kind, id).is_file()
    }

    fn read(&self, kind: DocumentKind, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(kind, id);
        fs::read(&path).with_context(|| format!("reading cache entry {}", path.display()))
    }

    fn write(&mut self, kind: DocumentKind, id: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(kind, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Readers must never see a half-written document.
        let staging = path.with_extension(format!("{}.part", kind.extension()));
        fs::write(&staging, content)
            .with_context(|| format!("writing cache entry {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("replacing cache entry {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<(DocumentKind, String), Vec<u8>>,
    writes: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, kind: DocumentKind, id: &str, content: impl Into<Vec<u8>>) -> Self {
        self.entries.insert((kind, id.to_string()), content.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `write` calls seen.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DocumentCache for MemoryCache {
    fn exists(&self, kind: DocumentKind, id: &str) -> bool {
        self.entries.contains_key(&(kind, id.to_string()))
    }

    fn read(&self, kind: DocumentKind, id: &str) -> Result<Vec<u8>> {
        self.entries
            .get(&(kind, id.to_string()))
            .cloned()
            .with_context(|| format!("no cached {kind:?} for {id}"))
    }

    fn write(&mut self, kind: DocumentKind, id: &str, content: &[u8]) -> Result<()> {
        self.entries.insert((kind, id.to_string()), content.to_vec());
        self.writes += 1;
        Ok(())
    }
}

//! The pending file set: documents submitted by the user, keyed by name.
//!
//! Names are the identity key. Adding a file whose name is already pending
//! is a silent no-op, so re-submitting a folder never produces duplicates.
//! Files are never mutated once added; the content is shared behind an
//! `Arc` so the orchestrator can hand it to blocking extraction tasks
//! without copying.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A user-submitted document awaiting conversion.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    name: String,
    content: Arc<[u8]>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the content in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    /// A cheap handle to the content, for moving into blocking tasks.
    pub fn content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }
}

impl fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFile")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}

/// Ordered, name-unique collection of pending files.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<PendingFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the candidates whose names are not already pending.
    ///
    /// Arrival order is preserved. A name repeated inside `candidates`
    /// keeps its first occurrence. Returns how many files were added.
    pub fn add(&mut self, candidates: impl IntoIterator<Item = PendingFile>) -> usize {
        let mut seen: HashSet<String> = self.files.iter().map(|f| f.name.clone()).collect();
        let before = self.files.len();
        for file in candidates {
            if seen.insert(file.name.clone()) {
                self.files.push(file);
            }
        }
        self.files.len() - before
    }

    /// Remove the file called `name`, if present.
    pub fn remove(&mut self, name: &str) -> Option<PendingFile> {
        let pos = self.files.iter().position(|f| f.name == name)?;
        Some(self.files.remove(pos))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&PendingFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PendingFile> {
        self.files.iter()
    }

    pub fn as_slice(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    /// Sum of all pending file sizes in bytes.
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(PendingFile::size).sum()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PendingFile;
    type IntoIter = std::slice::Iter<'a, PendingFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> PendingFile {
        PendingFile::new(name, name.as_bytes().to_vec())
    }

    #[test]
    fn add_skips_existing_names() {
        let mut set = FileSet::new();
        assert_eq!(set.add([file("A.pdf")]), 1);
        assert_eq!(set.add([file("A.pdf"), file("B.pdf")]), 1);
        assert_eq!(set.names(), vec!["A.pdf", "B.pdf"]);
    }

    #[test]
    fn add_dedupes_within_batch() {
        let mut set = FileSet::new();
        let first = PendingFile::new("x.pdf", b"first".to_vec());
        let second = PendingFile::new("x.pdf", b"second".to_vec());
        assert_eq!(set.add([first, second]), 1);
        assert_eq!(set.get("x.pdf").unwrap().bytes(), b"first");
    }

    #[test]
    fn fully_duplicate_batch_is_noop() {
        let mut set = FileSet::new();
        set.add([file("a"), file("b")]);
        assert_eq!(set.add([file("b"), file("a")]), 0);
        assert_eq!(set.names(), vec!["a", "b"]);
    }

    #[test]
    fn remove_present_and_absent() {
        let mut set = FileSet::new();
        set.add([file("a"), file("b"), file("c")]);
        assert_eq!(set.remove("b").map(|f| f.name().to_string()), Some("b".into()));
        assert!(set.remove("zzz").is_none());
        assert_eq!(set.names(), vec!["a", "c"]);
    }

    #[test]
    fn clear_empties() {
        let mut set = FileSet::new();
        set.add([file("a")]);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.total_bytes(), 0);
    }

    #[test]
    fn size_and_debug() {
        let f = PendingFile::new("doc.pdf", vec![0u8; 1024]);
        assert_eq!(f.size(), 1024);
        let dbg = format!("{f:?}");
        assert!(dbg.contains("doc.pdf") && dbg.contains("1024"));
    }
}

//! In-flight file collections passed between pipeline stages.
//!
//! A [`FileSet`] is an ordered list of [`File`]s. The order is the order in
//! which the files were read or produced, and it is the order used whenever
//! entries are merged (for example by [`Concat`](crate::step::Concat)).
//!
//! File contents are reference counted and never mutated. A step that wants
//! to change an entry builds a new [`File`] with [`File::with_data`] and
//! returns a new set, so the output of every stage can be inspected on its
//! own.

use std::str::Utf8Error;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

/// A single virtual file: a relative path and its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct File {
    /// Path relative to the pipeline's base directory.
    pub path: Utf8PathBuf,
    /// Raw contents.
    pub data: Arc<[u8]>,
}

impl File {
    pub fn new(path: impl Into<Utf8PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into().into(),
        }
    }

    /// Borrows the contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    /// Same path, new contents.
    pub fn with_data(&self, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: self.path.clone(),
            data: data.into().into(),
        }
    }

    /// Same contents, new path.
    pub fn with_path(&self, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: self.data.clone(),
        }
    }
}

/// An ordered collection of [`File`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<File>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new set with `file` appended.
    pub fn with(mut self, file: File) -> Self {
        self.files.push(file);
        self
    }

    /// Returns a new set with the entries of `other` appended after the
    /// entries of `self`.
    pub fn chain(mut self, other: FileSet) -> Self {
        self.files.extend(other.files);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, File> {
        self.files.iter()
    }

    pub fn as_slice(&self) -> &[File] {
        &self.files
    }

    /// Finds an entry by its relative path.
    pub fn get(&self, path: impl AsRef<Utf8Path>) -> Option<&File> {
        let path = path.as_ref();
        self.files.iter().find(|file| file.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.files.iter().map(|file| file.path.as_path())
    }
}

impl FromIterator<File> for FileSet {
    fn from_iter<I: IntoIterator<Item = File>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileSet {
    type Item = File;
    type IntoIter = std::vec::IntoIter<File>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a File;
    type IntoIter = std::slice::Iter<'a, File>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_keeps_order() {
        let a = FileSet::new().with(File::new("a.js", "a"));
        let b = FileSet::new()
            .with(File::new("b.js", "b"))
            .with(File::new("c.js", "c"));

        let merged = a.chain(b);

        assert_eq!(
            merged.paths().map(Utf8Path::as_str).collect::<Vec<_>>(),
            vec!["a.js", "b.js", "c.js"]
        );
    }

    #[test]
    fn test_with_data_does_not_touch_original() {
        let original = File::new("a.js", "var a;");
        let changed = original.with_data("var b;");

        assert_eq!(original.text().unwrap(), "var a;");
        assert_eq!(changed.text().unwrap(), "var b;");
        assert_eq!(changed.path, original.path);
    }

    #[test]
    fn test_get() {
        let set = FileSet::new()
            .with(File::new("x/a.html", "<a>"))
            .with(File::new("b.html", "<b>"));

        assert_eq!(set.get("x/a.html").unwrap().text().unwrap(), "<a>");
        assert!(set.get("missing.html").is_none());
    }
}

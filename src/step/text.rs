use camino::Utf8PathBuf;

use crate::error::TransformError;
use crate::fileset::{File, FileSet};
use crate::step::{Step, map_text};

/// Merges every entry, in order, into a single file.
#[derive(Debug, Clone)]
pub struct Concat {
    name: Utf8PathBuf,
    separator: String,
}

impl Concat {
    pub fn new(name: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            separator: String::from("\n"),
        }
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Step for Concat {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        if input.is_empty() {
            return Ok(FileSet::new());
        }

        let mut data = Vec::new();
        for (i, file) in input.iter().enumerate() {
            if i > 0 {
                data.extend_from_slice(self.separator.as_bytes());
            }
            data.extend_from_slice(&file.data);
        }

        Ok(FileSet::new().with(File::new(self.name.clone(), data)))
    }
}

/// Prepends literal text to every entry.
#[derive(Debug, Clone)]
pub struct Header {
    text: String,
}

impl Header {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Step for Header {
    fn name(&self) -> &'static str {
        "header"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), input, |text| Ok(format!("{}{text}", self.text)))
    }
}

/// Appends literal text to every entry.
#[derive(Debug, Clone)]
pub struct Footer {
    text: String,
}

impl Footer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Step for Footer {
    fn name(&self) -> &'static str {
        "footer"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), input, |text| Ok(format!("{text}{}", self.text)))
    }
}

/// Replaces every occurrence of a literal string.
#[derive(Debug, Clone)]
pub struct Replace {
    needle: String,
    with: String,
}

impl Replace {
    pub fn new(needle: impl Into<String>, with: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            with: with.into(),
        }
    }
}

impl Step for Replace {
    fn name(&self) -> &'static str {
        "replace"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), input, |text| {
            Ok(text.replace(&self.needle, &self.with))
        })
    }
}

/// Renames the single entry of a set.
///
/// An empty set passes through; more than one entry is an error, since all
/// of them would end up under the same name.
#[derive(Debug, Clone)]
pub struct Rename {
    name: Utf8PathBuf,
}

impl Rename {
    pub fn new(name: impl Into<Utf8PathBuf>) -> Self {
        Self { name: name.into() }
    }
}

impl Step for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        match input.as_slice() {
            [] => Ok(FileSet::new()),
            [file] => Ok(FileSet::new().with(file.with_path(self.name.clone()))),
            files => Err(TransformError::new(
                self.name(),
                None,
                anyhow::anyhow!(
                    "expected a single file to rename to {}, got {}",
                    self.name,
                    files.len()
                ),
            )),
        }
    }
}

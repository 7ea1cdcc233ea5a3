use std::fmt::Write;
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::Regex;

use crate::error::TransformError;
use crate::fileset::{File, FileSet};
use crate::step::{Step, map_text};

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Conservative HTML minifier for template partials.
///
/// Drops comments and collapses every run of whitespace into one space, so
/// the gap between two inline elements survives. Attribute quotes and empty
/// attributes are left alone, since templates rely on both.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyHtml;

impl MinifyHtml {
    pub(crate) fn minify(html: &str) -> String {
        let html = RE_COMMENT.replace_all(html, "");
        let html = RE_WHITESPACE.replace_all(&html, " ");
        html.trim().to_string()
    }
}

impl Step for MinifyHtml {
    fn name(&self) -> &'static str {
        "minify-html"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), input, |text| Ok(Self::minify(text)))
    }
}

/// Compiles HTML templates into one script that registers them with an
/// Angular `$templateCache`.
///
/// Every entry becomes a `$templateCache.put(url, contents)` call, where the
/// url is the entry path passed through `transform_url`. The default
/// transform drops a leading separator so the keys read `bootstrap/x.html`.
#[derive(Clone)]
pub struct TemplateCache {
    module: String,
    filename: Utf8PathBuf,
    transform_url: fn(&str) -> String,
}

impl TemplateCache {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            filename: Utf8PathBuf::from("templates.js"),
            transform_url: |url| url.trim_start_matches(['/', '\\']).to_string(),
        }
    }

    pub fn filename(mut self, filename: impl Into<Utf8PathBuf>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn transform_url(mut self, transform: fn(&str) -> String) -> Self {
        self.transform_url = transform;
        self
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("module", &self.module)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

impl Step for TemplateCache {
    fn name(&self) -> &'static str {
        "template-cache"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        if input.is_empty() {
            return Ok(FileSet::new());
        }

        let mut out = format!(
            "angular.module('{}').run(['$templateCache', function($templateCache) {{",
            escape_js(&self.module)
        );

        for (i, file) in input.iter().enumerate() {
            let text = file
                .text()
                .map_err(|e| TransformError::new(self.name(), Some(file.path.clone()), e))?;
            let url = (self.transform_url)(file.path.as_str());

            if i > 0 {
                out.push('\n');
            }
            // writing into a String cannot fail
            let _ = write!(
                out,
                "$templateCache.put('{}','{}');",
                escape_js(&url),
                escape_js(text)
            );
        }

        out.push_str("}]);");

        Ok(FileSet::new().with(File::new(self.filename.clone(), out)))
    }
}

/// Escapes text for a single-quoted JavaScript string literal.
fn escape_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

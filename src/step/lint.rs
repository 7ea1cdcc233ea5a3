use camino::Utf8Path;

use crate::error::TransformError;
use crate::exec::Tool;
use crate::fileset::FileSet;
use crate::step::Step;

/// Feeds every entry to an external linter on stdin.
///
/// The set passes through unchanged. A non-zero exit status fails the step
/// and the linter's report becomes the error message.
#[derive(Debug, Clone)]
pub struct Lint {
    tool: Tool,
}

impl Lint {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }
}

impl Step for Lint {
    fn name(&self) -> &'static str {
        "lint"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        for file in input {
            self.tool
                .output(Utf8Path::new("."), Some(&file.data))
                .map_err(|e| TransformError::new(self.name(), Some(file.path.clone()), e))?;
        }

        Ok(input.clone())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fileset::File;

    #[test]
    fn test_lint_passes_through() {
        let input = FileSet::new().with(File::new("select.js", "var x = 1;"));
        let output = Lint::new(Tool::new("true")).apply(&input).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_lint_failure_reports_output() {
        let tool = Tool::new("sh").args(["-c", "echo 'line 1: Missing semicolon.'; exit 2"]);
        let input = FileSet::new().with(File::new("select.js", "var x = 1"));

        let err = Lint::new(tool).apply(&input).unwrap_err();
        assert_eq!(err.step, "lint");
        assert!(err.source.to_string().contains("Missing semicolon"));
    }
}

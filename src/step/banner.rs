use minijinja::{Environment, Value};

use crate::error::TransformError;
use crate::fileset::FileSet;
use crate::step::{Step, map_text};

/// Renders a template once and prepends the result to every entry.
///
/// The template is rendered with minijinja against `values`, so a banner can
/// refer to package metadata as `{{ pkg.name }}`. Rendering happens when the
/// step is applied; a broken template fails the step instead of the whole
/// run.
#[derive(Debug, Clone)]
pub struct Banner {
    template: String,
    values: Value,
}

impl Banner {
    pub fn new(template: impl Into<String>, values: Value) -> Self {
        Self {
            template: template.into(),
            values,
        }
    }

    fn render(&self) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.render_str(&self.template, &self.values)
    }
}

impl Step for Banner {
    fn name(&self) -> &'static str {
        "banner"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        let banner = self
            .render()
            .map_err(|e| TransformError::new(self.name(), None, e))?;

        map_text(self.name(), input, |text| Ok(format!("{banner}{text}")))
    }
}

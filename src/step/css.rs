use crate::error::TransformError;
use crate::fileset::FileSet;
use crate::step::{Step, map_text};

/// Minifies stylesheets by running them through the `grass` compiler in
/// compressed mode. Plain CSS is valid SCSS, so this doubles as a CSS
/// minifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyCss;

impl Step for MinifyCss {
    fn name(&self) -> &'static str {
        "minify-css"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), input, |text| {
            // `Options` borrows a non-`Sync` file system handle, build it per file
            let options = grass::Options::default().style(grass::OutputStyle::Compressed);
            grass::from_string(text, &options).map_err(|e| anyhow::anyhow!("{e}"))
        })
    }
}

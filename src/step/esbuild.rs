use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::TransformError;
use crate::exec::Tool;
use crate::fileset::{File, FileSet};
use crate::step::Step;

/// Minifies JavaScript with the `esbuild` binary.
///
/// **Note:** requires `esbuild` to be reachable through the configured
/// command, by default via the system `PATH`.
///
/// Without a source map the entry is piped through esbuild's stdin. With
/// [`Esbuild::source_map`] the entry is compiled inside a private temporary
/// directory. The map is emitted as a companion `<name>.map` entry, its
/// `sources` point back at the entry path, and the script ends with a
/// `sourceMappingURL` comment linking the two.
#[derive(Debug, Clone)]
pub struct Esbuild {
    tool: Tool,
    minify: bool,
    legal_comments: bool,
    source_map: bool,
}

impl Esbuild {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            minify: false,
            legal_comments: false,
            source_map: false,
        }
    }

    pub fn minify(mut self) -> Self {
        self.minify = true;
        self
    }

    /// Keeps `/*! ... */` comments, such as license banners.
    pub fn legal_comments(mut self) -> Self {
        self.legal_comments = true;
        self
    }

    pub fn source_map(mut self) -> Self {
        self.source_map = true;
        self
    }

    fn flags(&self) -> Vec<&'static str> {
        let mut flags = vec!["--loader=js"];
        if self.minify {
            flags.push("--minify");
        }
        if self.legal_comments {
            flags.push("--legal-comments=inline");
        }
        flags
    }

    fn compile_piped(&self, file: &File) -> anyhow::Result<Vec<File>> {
        let tool = self.tool.clone().args(self.flags());
        let data = tool.output(Utf8Path::new("."), Some(&file.data))?;
        Ok(vec![file.with_data(data)])
    }

    fn compile_mapped(&self, file: &File) -> anyhow::Result<Vec<File>> {
        let temp = tempfile::tempdir()?;
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf())?;

        let name = file.path.file_name().unwrap_or("out.js");
        let source = dir.join("src").join(name);
        let target = dir.join("out").join(name);

        fs::create_dir_all(dir.join("src"))?;
        fs::write(&source, &file.data)?;

        let tool = self
            .tool
            .clone()
            .arg(source.as_str())
            .args(self.flags())
            .arg("--sourcemap=linked")
            .arg(format!("--outfile={target}"));
        tool.output(&dir, None)?;

        let code = fs::read(&target)?;
        let map = fs::read(Utf8PathBuf::from(format!("{target}.map")))?;
        let map = relink_sources(&map, &file.path)?;

        let map_path = Utf8PathBuf::from(format!("{}.map", file.path));
        Ok(vec![file.with_data(code), File::new(map_path, map)])
    }
}

/// Points the map at the entry path instead of the temporary source, which
/// is gone once the step returns.
fn relink_sources(map: &[u8], entry: &Utf8Path) -> anyhow::Result<Vec<u8>> {
    let mut map: serde_json::Value = serde_json::from_slice(map)?;
    if let Some(object) = map.as_object_mut() {
        object.insert("sources".into(), serde_json::json!([entry.as_str()]));
    }
    Ok(serde_json::to_vec(&map)?)
}

impl Step for Esbuild {
    fn name(&self) -> &'static str {
        "esbuild"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        let mut output = FileSet::new();

        for file in input {
            let files = if self.source_map {
                self.compile_mapped(file)
            } else {
                self.compile_piped(file)
            }
            .map_err(|e| TransformError::new(self.name(), Some(file.path.clone()), e))?;

            output = files.into_iter().fold(output, FileSet::with);
        }

        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let step = Esbuild::new(Tool::new("esbuild")).minify().legal_comments();
        assert_eq!(
            step.flags(),
            vec!["--loader=js", "--minify", "--legal-comments=inline"]
        );
    }

    #[test]
    fn test_piped_through_stand_in() {
        // `sh -c 'cat'` ignores the esbuild flags and echoes stdin back
        let tool = Tool::new("sh").args(["-c", "cat", "sh"]);
        let input = FileSet::new().with(File::new("select.min.js", "var x = 1;"));

        let output = Esbuild::new(tool).minify().apply(&input).unwrap();
        assert_eq!(output.get("select.min.js").unwrap().text().unwrap(), "var x = 1;");
    }

    // Stands in for esbuild: copies the entry to `--outfile`, writes the map
    // next to it and appends the trailer when the map is linked.
    const MAPPED: &str = r#"
src="$1"; out=""; linked=""
for arg in "$@"; do
  case "$arg" in
    --outfile=*) out="${arg#--outfile=}" ;;
    --sourcemap=linked) linked=1 ;;
  esac
done
mkdir -p "$(dirname "$out")"
cat "$src" > "$out"
if [ -n "$linked" ]; then
  printf '\n//# sourceMappingURL=%s.map\n' "$(basename "$out")" >> "$out"
fi
printf '{"version":3,"sources":["../src/%s"],"mappings":"AAAA"}' "$(basename "$src")" > "$out.map"
"#;

    #[test]
    fn test_source_map_through_stand_in() {
        let tool = Tool::new("sh").args(["-c", MAPPED, "sh"]);
        let input = FileSet::new().with(File::new("select.min.js", "var x = 1;"));

        let output = Esbuild::new(tool).minify().source_map().apply(&input).unwrap();
        assert_eq!(output.len(), 2);

        let code = output.get("select.min.js").unwrap().text().unwrap();
        assert!(code.starts_with("var x = 1;"));
        assert!(code.trim_end().ends_with("//# sourceMappingURL=select.min.js.map"));

        let map = output.get("select.min.js.map").unwrap();
        let map: serde_json::Value = serde_json::from_slice(&map.data).unwrap();
        assert_eq!(map["sources"], serde_json::json!(["select.min.js"]));
        assert_eq!(map["mappings"], "AAAA");
    }

    #[test]
    fn test_source_map_not_json_fails_step() {
        let tool = Tool::new("sh").args([
            "-c",
            r#"for a in "$@"; do case "$a" in --outfile=*) o="${a#--outfile=}";; esac; done
mkdir -p "$(dirname "$o")"; echo 'x' > "$o"; echo 'not json' > "$o.map""#,
            "sh",
        ]);
        let input = FileSet::new().with(File::new("select.min.js", "var x = 1;"));

        let err = Esbuild::new(tool).source_map().apply(&input).unwrap_err();
        assert_eq!(err.step, "esbuild");
    }

    #[test]
    fn test_missing_binary_fails_step() {
        let tool = Tool::new("definitely-not-esbuild-1234");
        let input = FileSet::new().with(File::new("select.min.js", "var x = 1;"));

        let err = Esbuild::new(tool).apply(&input).unwrap_err();
        assert_eq!(err.step, "esbuild");
        assert_eq!(err.path.unwrap().as_str(), "select.min.js");
    }
}

//! Project configuration.
//!
//! A [`Config`] is built once at startup from the project root and its
//! `package.json`, then shared read-only with every task.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use minijinja::context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::exec::Tool;
use crate::step::Banner;

/// License banner prepended to every built artifact.
pub const BANNER: &str = "/*!\n * {{ pkg.name }}\n * {{ pkg.homepage }}\n * Version: {{ pkg.version }} - {{ timestamp }}\n * License: {{ pkg.license }}\n */\n\n\n";

/// The fields of `package.json` the build cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub license: String,
}

impl Package {
    pub fn read(root: &Utf8Path) -> Result<Self, ConfigError> {
        let path = root.join("package.json");
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path, e))
    }
}

/// Output directories, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub dist: Utf8PathBuf,
    pub temp: Utf8PathBuf,
    pub docs_built: Utf8PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            dist: "dist".into(),
            temp: "temp".into(),
            docs_built: "docs-built".into(),
        }
    }
}

/// Command lines of the external tools. A tool set to `None` disables the
/// stages that need it where that makes sense (linting, minified scripts),
/// and fails the tasks that cannot run without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub esbuild: Option<Vec<String>>,
    pub lint: Option<Vec<String>>,
    pub karma: Option<Vec<String>>,
    pub bump: Option<Vec<String>>,
    pub changelog: Option<Vec<String>>,
    pub git: Option<Vec<String>>,
}

fn words(words: &[&str]) -> Option<Vec<String>> {
    Some(words.iter().map(|word| word.to_string()).collect())
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            esbuild: words(&["esbuild"]),
            lint: words(&["npx", "jshint", "-"]),
            karma: words(&["npx", "karma", "start", "karma.conf.js"]),
            bump: words(&["npx", "conventional-recommended-bump", "-p", "angular"]),
            changelog: words(&[
                "npx",
                "conventional-changelog",
                "-p",
                "angular",
                "-i",
                "CHANGELOG.md",
                "-s",
            ]),
            git: words(&["git"]),
        }
    }
}

impl Tools {
    pub fn esbuild(&self) -> Option<Tool> {
        self.esbuild.as_deref().and_then(Tool::from_command)
    }

    pub fn lint(&self) -> Option<Tool> {
        self.lint.as_deref().and_then(Tool::from_command)
    }

    pub fn karma(&self) -> Option<Tool> {
        self.karma.as_deref().and_then(Tool::from_command)
    }

    pub fn bump(&self) -> Option<Tool> {
        self.bump.as_deref().and_then(Tool::from_command)
    }

    pub fn changelog(&self) -> Option<Tool> {
        self.changelog.as_deref().and_then(Tool::from_command)
    }

    pub fn git(&self) -> Option<Tool> {
        self.git.as_deref().and_then(Tool::from_command)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute project root; every relative path resolves against it.
    pub root: Utf8PathBuf,
    pub package: Package,
    /// minijinja template rendered with `pkg` and `timestamp`.
    pub banner: String,
    pub paths: Paths,
    pub tools: Tools,
    /// Angular module the template cache registers into.
    pub module: String,
    pub remote: String,
    pub branch: String,
}

impl Config {
    pub fn new(root: impl Into<Utf8PathBuf>, package: Package) -> Self {
        Self {
            root: root.into(),
            package,
            banner: BANNER.to_string(),
            paths: Paths::default(),
            tools: Tools::default(),
            module: "ui.select".to_string(),
            remote: "origin".to_string(),
            branch: "master".to_string(),
        }
    }

    /// Reads `package.json` under `root`.
    pub fn load(root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let package = Package::read(&root)?;
        Ok(Self::new(root, package))
    }

    /// Current UTC time as ISO-8601 with milliseconds, e.g.
    /// `2024-05-01T12:00:00.000Z`.
    pub fn timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// A banner step stamped with the current time.
    pub fn banner(&self) -> Banner {
        Banner::new(
            self.banner.clone(),
            context! {
                pkg => &self.package,
                timestamp => Self::timestamp(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::{File, FileSet};
    use crate::step::Step;

    fn package() -> Package {
        Package {
            name: "ui-select".into(),
            version: "0.19.8".into(),
            homepage: "https://github.com/angular-ui/ui-select".into(),
            license: "MIT".into(),
        }
    }

    #[test]
    fn test_load_package() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        fs::write(
            root.join("package.json"),
            r#"{"name": "ui-select", "version": "0.19.8", "main": "index.js"}"#,
        )
        .unwrap();

        let config = Config::load(&root).unwrap();
        assert_eq!(config.package.name, "ui-select");
        assert_eq!(config.package.version, "0.19.8");
        assert_eq!(config.package.license, "");
        assert_eq!(config.paths.dist, "dist");
    }

    #[test]
    fn test_load_missing_package() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

        assert!(matches!(Config::load(&root), Err(ConfigError::Read(..))));
    }

    #[test]
    fn test_load_invalid_package() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        fs::write(root.join("package.json"), "{ not json").unwrap();

        assert!(matches!(Config::load(&root), Err(ConfigError::Parse(..))));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Config::timestamp();
        assert_eq!(ts.len(), "2024-05-01T12:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_banner() {
        let config = Config::new("/project", package());
        let input = FileSet::new().with(File::new("select.css", ".ui-select{}"));

        let output = config.banner().apply(&input).unwrap();
        let text = output.get("select.css").unwrap().text().unwrap();

        assert!(text.starts_with("/*!\n * ui-select\n * https://github.com/angular-ui/ui-select\n"));
        assert!(text.contains(" * Version: 0.19.8 - "));
        assert!(text.contains(" * License: MIT\n */\n\n\n.ui-select{}"));
    }

    #[test]
    fn test_disabled_tool() {
        let mut config = Config::new("/project", package());
        config.tools.lint = None;
        config.tools.esbuild = Some(Vec::new());

        assert!(config.tools.lint().is_none());
        assert!(config.tools.esbuild().is_none());
        assert_eq!(config.tools.git().unwrap().program(), "git");
    }
}

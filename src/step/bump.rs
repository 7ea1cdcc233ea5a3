use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde_json::Value;

use crate::error::TransformError;
use crate::fileset::FileSet;
use crate::step::{Step, map_text};

/// Semantic version component to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Major,
    Minor,
    Patch,
}

impl FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "major" => Ok(Level::Major),
            "minor" => Ok(Level::Minor),
            "patch" => Ok(Level::Patch),
            other => Err(anyhow!("unknown release level `{other}`")),
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Level::Major => "major",
            Level::Minor => "minor",
            Level::Patch => "patch",
        })
    }
}

/// Increments a `major.minor.patch` version. A pre-release or build suffix
/// is dropped, so `1.2.3-beta.1` bumped by patch becomes `1.2.3`.
pub(crate) fn increment(version: &str, level: Level) -> anyhow::Result<String> {
    let (core, suffix) = match version.find(['-', '+']) {
        Some(at) => (&version[..at], Some(&version[at..])),
        None => (version, None),
    };

    let parts = core
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid version `{version}`"))?;

    let &[major, minor, patch] = parts.as_slice() else {
        return Err(anyhow!("invalid version `{version}`"));
    };

    let pre = suffix.is_some_and(|s| s.starts_with('-'));
    let next = |part: u64| {
        part.checked_add(1)
            .ok_or_else(|| anyhow!("invalid version `{version}`"))
    };

    Ok(match level {
        Level::Major if pre && minor == 0 && patch == 0 => format!("{major}.0.0"),
        Level::Major => format!("{}.0.0", next(major)?),
        Level::Minor if pre && patch == 0 => format!("{major}.{minor}.0"),
        Level::Minor => format!("{major}.{}.0", next(minor)?),
        Level::Patch if pre => format!("{major}.{minor}.{patch}"),
        Level::Patch => format!("{major}.{minor}.{}", next(patch)?),
    })
}

/// Rewrites the `"version"` field of JSON manifests such as `package.json`.
///
/// Key order is preserved and the document is written back with two space
/// indentation and a trailing newline.
#[derive(Debug, Clone, Copy)]
pub struct Bump {
    level: Level,
}

impl Bump {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Step for Bump {
    fn name(&self) -> &'static str {
        "bump"
    }

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), input, |text| {
            let mut manifest: Value = serde_json::from_str(text)?;

            let version = manifest
                .get("version")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("no `version` field"))?;

            let next = increment(version, self.level)?;
            tracing::info!("bumping version {version} -> {next}");

            manifest["version"] = Value::String(next);

            let mut out = serde_json::to_string_pretty(&manifest)?;
            out.push('\n');
            Ok(out)
        })
    }
}

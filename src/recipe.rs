//! The build recipe of the component library.
//!
//! Every task the `plumb` binary knows about is declared here:
//!
//! | task | does |
//! |---|---|
//! | `clean` | removes `dist` and `temp` |
//! | `scripts` | `clean`, then builds `dist/select.js` and `dist/select.min.js` |
//! | `styles` | `clean`, then builds `dist/select.css` and `dist/select.min.css` |
//! | `build` | `clean`, then scripts and styles in parallel |
//! | `test`, `default` | `build`, then a single test run |
//! | `watch` | `build`, then the test runner in watch mode next to a rebuild on every source change |
//! | `docs:clean` | removes `docs-built` |
//! | `docs` | builds the documentation site into `docs-built` |
//! | `docs:watch` | `docs`, then rebuilds it on every change under `docs/` |
//! | `bump` | bumps the version, updates the changelog, commits, tags and pushes |
//!
//! The release steps `recommendedBump`, `changelog`, `add`, `commit`, `tag`,
//! `push` and `pull` can also be run on their own.

use std::fs;

use anyhow::Context as _;
use camino::Utf8Path;

use crate::config::{Config, Package};
use crate::error::ExecError;
use crate::exec::Tool;
use crate::graph::{Blueprint, Context};
use crate::io::remove_dir;
use crate::pipeline::Pipeline;
use crate::step::{
    Bump, Concat, Esbuild, Footer, Header, Level, Lint, MinifyHtml, Rename, Replace, TemplateCache,
};

const LIB_HEADER: &str = "(function () { \n\"use strict\";\n";
const LIB_FOOTER: &str = "\n}());";

/// Placeholder in `docs/index.html` replaced by the list of examples.
pub const EXAMPLES_PLACEHOLDER: &str = "<!-- INSERT EXAMPLES HERE -->";

const COMMIT_MESSAGE: &str = "chore(release): bump package version and update changelog";

fn require(tool: Option<Tool>, name: &'static str) -> Result<Tool, ExecError> {
    tool.ok_or(ExecError::Missing(name))
}

fn clean(cx: &Context) -> anyhow::Result<()> {
    let root = &cx.config.root;
    remove_dir(&root.join(&cx.config.paths.dist))?;
    remove_dir(&root.join(&cx.config.paths.temp))?;
    Ok(())
}

fn scripts(cx: &Context) -> anyhow::Result<Pipeline> {
    let config = cx.config;

    let mut lib = Pipeline::new("scripts:lib")
        .src("src/common.js")
        .src("src/*.js")
        .pipe(Concat::new("select_without_templates.js"))
        .pipe(Header::new(LIB_HEADER))
        .pipe(Footer::new(LIB_FOOTER))
        .dest(&config.paths.temp);

    if let Some(tool) = config.tools.lint() {
        lib = lib.pipe(Lint::new(tool));
    }

    let templates = Pipeline::new("scripts:templates")
        .src("src/**/*.html")
        .pipe(MinifyHtml)
        .pipe(TemplateCache::new(&config.module));

    let mut pipeline = Pipeline::merge(cx.task, [lib, templates])
        .pipe(Concat::new("select.js"))
        .pipe(config.banner())
        .dest(&config.paths.dist);

    match config.tools.esbuild() {
        Some(tool) => {
            pipeline = pipeline
                .pipe(Rename::new("select.min.js"))
                .pipe(Esbuild::new(tool).minify().legal_comments().source_map())
                .dest(&config.paths.dist);
        }
        None => tracing::warn!("no minifier configured, skipping select.min.js"),
    }

    Ok(pipeline)
}

fn styles(cx: &Context) -> anyhow::Result<Pipeline> {
    let config = cx.config;

    let pipeline = Pipeline::new(cx.task)
        .src("src/common.css")
        .base("src")
        .pipe(config.banner())
        .pipe(Concat::new("select.css"))
        .dest(&config.paths.dist);

    #[cfg(feature = "grass")]
    let pipeline = pipeline
        .pipe(crate::step::MinifyCss)
        .pipe(Rename::new("select.min.css"))
        .dest(&config.paths.dist);

    #[cfg(not(feature = "grass"))]
    tracing::warn!("built without the `grass` feature, skipping select.min.css");

    Ok(pipeline)
}

fn karma(cx: &Context, single_run: bool) -> anyhow::Result<()> {
    let tool = require(cx.config.tools.karma(), "the test runner")?;
    let flag = if single_run { "--single-run" } else { "--no-single-run" };
    tool.arg(flag).status(&cx.config.root)?;
    Ok(())
}

fn docs_clean(cx: &Context) -> anyhow::Result<()> {
    remove_dir(&cx.config.root.join(&cx.config.paths.docs_built))?;
    Ok(())
}

fn docs_assets(cx: &Context) -> anyhow::Result<Pipeline> {
    let out = &cx.config.paths.docs_built;

    let dist = Pipeline::new("docs:dist")
        .src(format!("{}/*", cx.config.paths.dist))
        .dest(out.join("dist"));

    let assets = Pipeline::new("docs:static")
        .src("docs/assets/*")
        .dest(out.join("assets"));

    Ok(Pipeline::merge(cx.task, [dist, assets]))
}

fn read_partial(root: &Utf8Path, name: &str) -> anyhow::Result<String> {
    let path = root.join("docs/partials").join(name);
    fs::read_to_string(&path).with_context(|| format!("couldn't read partial {path}"))
}

fn docs_examples(cx: &Context) -> anyhow::Result<Pipeline> {
    let root = &cx.config.root;

    Ok(Pipeline::new(cx.task)
        .src("docs/examples/*.html")
        .pipe(Header::new(read_partial(root, "_header.html")?))
        .pipe(Footer::new(read_partial(root, "_footer.html")?))
        .dest(&cx.config.paths.docs_built))
}

/// Display title of an example page: `demo-tagging.html` is `Tagging`.
pub(crate) fn example_title(filename: &str) -> String {
    let stem = filename.replacen("demo-", "", 1).replacen(".html", "", 1);
    crate::utils::title_case(&stem)
}

/// One link per example page under `docs/examples`, sorted by file name.
pub(crate) fn example_links(root: &Utf8Path) -> anyhow::Result<String> {
    let pattern = format!("{}/docs/examples/*.html", glob::Pattern::escape(root.as_str()));

    let mut names = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = path?;
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let links: Vec<_> = names
        .iter()
        .map(|name| {
            format!(
                "<h4><a href=\"./{name}\">{}</a> <plnkr-opener example-path=\"{name}\"></plnkr-opener></h4>",
                example_title(name)
            )
        })
        .collect();

    Ok(links.join("\n"))
}

fn docs_index(cx: &Context) -> anyhow::Result<Pipeline> {
    let links = example_links(&cx.config.root)?;

    Ok(Pipeline::new(cx.task)
        .src("docs/index.html")
        .pipe(Replace::new(EXAMPLES_PLACEHOLDER, links))
        .dest(&cx.config.paths.docs_built))
}

fn recommended_bump(cx: &Context) -> anyhow::Result<Pipeline> {
    let tool = require(cx.config.tools.bump(), "the version recommender")?;
    let output = tool.output(&cx.config.root, None)?;
    let level: Level = String::from_utf8_lossy(&output).parse()?;

    tracing::info!("recommended release level: {level}");

    Ok(Pipeline::new(cx.task)
        .src("package.json")
        .pipe(Bump::new(level))
        .dest("."))
}

fn changelog(cx: &Context) -> anyhow::Result<()> {
    let tool = require(cx.config.tools.changelog(), "the changelog generator")?;
    tool.status(&cx.config.root)?;
    Ok(())
}

fn git(cx: &Context) -> Result<Tool, ExecError> {
    require(cx.config.tools.git(), "git")
}

fn git_add(cx: &Context) -> anyhow::Result<()> {
    git(cx)?.args(["add", "."]).status(&cx.config.root)?;
    Ok(())
}

fn git_commit(cx: &Context) -> anyhow::Result<()> {
    let output = git(cx)?
        .args(["commit", "-m", COMMIT_MESSAGE])
        .output(&cx.config.root, None)?;
    tracing::info!("{}", String::from_utf8_lossy(&output).trim_end());
    Ok(())
}

fn git_tag(cx: &Context) -> anyhow::Result<()> {
    // The version may have been bumped earlier in the same run.
    let package = Package::read(&cx.config.root)?;
    let tag = format!("v{}", package.version);

    git(cx)?
        .args(["tag", "-a", tag.as_str(), "-m", tag.as_str()])
        .status(&cx.config.root)?;

    tracing::info!("tagged {tag}");
    Ok(())
}

fn git_push(cx: &Context) -> anyhow::Result<()> {
    let config: &Config = cx.config;
    git(cx)?
        .args(["push", config.remote.as_str(), config.branch.as_str(), "--follow-tags"])
        .status(&config.root)?;
    Ok(())
}

fn git_pull(cx: &Context) -> anyhow::Result<()> {
    git(cx)?.arg("pull").status(&cx.config.root)?;
    Ok(())
}

/// Declares every task of the recipe.
pub fn blueprint() -> Blueprint {
    let mut bp = Blueprint::new();

    bp.action("clean", clean);
    bp.pipeline("scripts:compile", scripts);
    bp.pipeline("styles:compile", styles);
    bp.series("scripts", ["clean", "scripts:compile"]);
    bp.series("styles", ["clean", "styles:compile"]);
    bp.parallel("build:compile", ["scripts:compile", "styles:compile"]);
    bp.series("build", ["clean", "build:compile"]);

    bp.action("karma", |cx| karma(cx, true));
    bp.action("karma:watch", |cx| karma(cx, false));
    bp.series("test", ["build", "karma"]);
    bp.series("default", ["build", "karma"]);

    bp.watch("watch:src", ["src/**/*.{js,html}"], "build");
    bp.parallel("watch:all", ["karma:watch", "watch:src"]);
    bp.series("watch", ["build", "watch:all"]);

    bp.action("docs:clean", docs_clean);
    bp.pipeline("docs:assets", docs_assets);
    bp.pipeline("docs:examples", docs_examples);
    bp.pipeline("docs:index", docs_index);
    bp.parallel("docs:compile", ["docs:assets", "docs:examples"]);
    bp.series("docs", ["docs:clean", "docs:compile", "docs:index"]);
    bp.watch("watch:docs", ["docs/**/*.{js,html}"], "docs");
    bp.series("docs:watch", ["docs", "watch:docs"]);

    bp.pipeline("recommendedBump", recommended_bump);
    bp.action("changelog", changelog);
    bp.action("add", git_add);
    bp.action("commit", git_commit);
    bp.action("tag", git_tag);
    bp.action("push", git_push);
    bp.action("pull", git_pull);
    bp.series(
        "bump",
        ["recommendedBump", "changelog", "add", "commit", "tag", "push"],
    );

    bp
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use camino::Utf8PathBuf;
    use regex::Regex;
    use tempfile::TempDir;

    use super::*;
    use crate::runner::{Runner, State};

    const PACKAGE: &str = r#"{
  "name": "ui-select",
  "version": "0.19.8",
  "homepage": "https://github.com/angular-ui/ui-select",
  "license": "MIT"
}
"#;

    struct Project {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Project {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

            fs::write(root.join("package.json"), PACKAGE).unwrap();
            for (path, data) in files {
                let path = root.join(path);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, data).unwrap();
            }

            Self { _dir: dir, root }
        }

        fn config(&self) -> Config {
            let mut config = Config::load(&self.root).unwrap();
            config.tools.esbuild = None;
            config.tools.lint = None;
            config.tools.karma = None;
            config
        }

        fn run_with(&self, config: Config, task: &str) -> crate::runner::Report {
            let graph = blueprint().finish().unwrap();
            Runner::new(Arc::new(config)).execute(&graph, task).unwrap()
        }

        fn run(&self, task: &str) -> crate::runner::Report {
            self.run_with(self.config(), task)
        }

        fn read(&self, path: &str) -> String {
            fs::read_to_string(self.root.join(path)).unwrap()
        }

        fn exists(&self, path: &str) -> bool {
            self.root.join(path).exists()
        }
    }

    #[test]
    fn test_blueprint_is_valid() {
        let graph = blueprint().finish().unwrap();
        for name in [
            "clean",
            "scripts",
            "styles",
            "build",
            "default",
            "test",
            "watch",
            "docs:clean",
            "docs",
            "docs:watch",
            "bump",
            "pull",
            "add",
            "push",
            "commit",
            "tag",
            "recommendedBump",
            "changelog",
        ] {
            assert!(graph.lookup(name).is_some(), "missing task {name}");
        }
    }

    #[test]
    fn test_clean_twice() {
        let project = Project::new(&[("dist/select.js", "x"), ("temp/select_without_templates.js", "y")]);

        let report = project.run("clean");
        assert!(report.is_success());
        assert!(!project.exists("dist"));
        assert!(!project.exists("temp"));

        let report = project.run("clean");
        assert!(report.is_success());
        assert!(!project.exists("dist"));
        assert!(!project.exists("temp"));
    }

    #[test]
    fn test_scripts() {
        let project = Project::new(&[("src/common.js", "var x=1;"), ("src/foo.js", "var y=2;")]);

        let report = project.run("scripts");
        assert!(report.is_success(), "{:?}", report.error());

        let select = project.read("dist/select.js");
        assert!(select.starts_with("/*!\n * ui-select\n * https://github.com/angular-ui/ui-select\n"));
        assert!(select.ends_with("(function () { \n\"use strict\";\nvar x=1;\nvar y=2;\n}());"));

        let timestamp = Regex::new(r" \* Version: 0\.19\.8 - \d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z\n").unwrap();
        assert!(timestamp.is_match(&select));

        assert_eq!(
            project.read("temp/select_without_templates.js"),
            "(function () { \n\"use strict\";\nvar x=1;\nvar y=2;\n}());"
        );
        assert!(!project.exists("dist/select.min.js"));
    }

    #[test]
    fn test_library_before_templates() {
        let project = Project::new(&[
            ("src/common.js", "var x=1;"),
            ("src/bootstrap/choices.tpl.html", "<ul>\n  <li>{{ $select.items }}</li>\n</ul>"),
        ]);

        let report = project.run("build");
        assert!(report.is_success(), "{:?}", report.error());

        let select = project.read("dist/select.js");
        let lib = select.find("var x=1;").unwrap();
        let templates = select
            .find("$templateCache.put('bootstrap/choices.tpl.html','<ul> <li>{{ $select.items }}</li> </ul>');")
            .unwrap();
        assert!(lib < templates);
        assert!(select.contains("angular.module('ui.select').run("));
    }

    #[test]
    fn test_styles() {
        let project = Project::new(&[("src/common.css", ".ui-select-bootstrap .btn {\n  color: red;\n}\n")]);

        let report = project.run("styles");
        assert!(report.is_success(), "{:?}", report.error());

        let css = project.read("dist/select.css");
        assert!(css.starts_with("/*!\n * ui-select\n"));
        assert!(css.ends_with(".ui-select-bootstrap .btn {\n  color: red;\n}\n"));

        #[cfg(feature = "grass")]
        {
            let min = project.read("dist/select.min.css");
            assert!(min.contains(".ui-select-bootstrap .btn{color:red}"));
        }
    }

    #[test]
    fn test_failing_scripts_keep_styles() {
        let project = Project::new(&[
            ("src/common.js", "var x=1;"),
            ("src/common.css", ".ui-select { color: red; }"),
        ]);
        fs::write(project.root.join("src/broken.html"), [0xffu8, 0xfe, 0xfd]).unwrap();

        let report = project.run("build");

        assert!(!report.is_success());
        assert_eq!(report.state("scripts:compile"), Some(State::Failed));
        assert_eq!(report.state("styles:compile"), Some(State::Succeeded));
        assert_eq!(report.state("build"), Some(State::Failed));
        assert!(project.exists("dist/select.css"));
        assert!(!project.exists("dist/select.js"));
    }

    #[test]
    fn test_default_needs_a_test_runner() {
        let project = Project::new(&[("src/common.js", "var x=1;")]);

        let report = project.run("default");

        assert_eq!(report.state("build"), Some(State::Succeeded));
        assert_eq!(report.state("karma"), Some(State::Failed));
        assert!(project.exists("dist/select.js"));
    }

    #[test]
    fn test_example_title() {
        assert_eq!(example_title("demo-basic.html"), "Basic");
        assert_eq!(example_title("demo-select2-with-bootstrap.html"), "Select2 With Bootstrap");
        assert_eq!(example_title("tagging.html"), "Tagging");
    }

    #[test]
    fn test_docs_without_examples() {
        let project = Project::new(&[
            ("docs/index.html", "<body>\n<!-- INSERT EXAMPLES HERE -->\n</body>"),
            ("docs/partials/_header.html", "<header>"),
            ("docs/partials/_footer.html", "</footer>"),
        ]);

        let report = project.run("docs");
        assert!(report.is_success(), "{:?}", report.error());

        assert_eq!(project.read("docs-built/index.html"), "<body>\n\n</body>");
    }

    #[test]
    fn test_docs() {
        let project = Project::new(&[
            ("dist/select.js", "select"),
            ("docs/assets/docs.css", "body{}"),
            ("docs/index.html", "<!-- INSERT EXAMPLES HERE -->"),
            ("docs/partials/_header.html", "<html>"),
            ("docs/partials/_footer.html", "</html>"),
            ("docs/examples/demo-tagging.html", "<tagging/>"),
            ("docs/examples/demo-basic.html", "<basic/>"),
            ("docs-built/stale.html", "old"),
        ]);

        let report = project.run("docs");
        assert!(report.is_success(), "{:?}", report.error());

        assert!(!project.exists("docs-built/stale.html"));
        assert_eq!(project.read("docs-built/dist/select.js"), "select");
        assert_eq!(project.read("docs-built/assets/docs.css"), "body{}");
        assert_eq!(project.read("docs-built/demo-basic.html"), "<html><basic/></html>");
        assert_eq!(
            project.read("docs-built/index.html"),
            "<h4><a href=\"./demo-basic.html\">Basic</a> <plnkr-opener example-path=\"demo-basic.html\"></plnkr-opener></h4>\n\
             <h4><a href=\"./demo-tagging.html\">Tagging</a> <plnkr-opener example-path=\"demo-tagging.html\"></plnkr-opener></h4>"
        );
    }

    #[test]
    fn test_docs_missing_partial() {
        let project = Project::new(&[("docs/index.html", "<!-- INSERT EXAMPLES HERE -->")]);

        let report = project.run("docs");

        assert_eq!(report.state("docs:examples"), Some(State::Failed));
        assert_eq!(report.state("docs:assets"), Some(State::Succeeded));
        assert_eq!(report.state("docs:index"), Some(State::Pending));
    }

    #[cfg(unix)]
    #[test]
    fn test_recommended_bump() {
        let project = Project::new(&[]);
        let mut config = project.config();
        config.tools.bump = Some(vec!["sh".into(), "-c".into(), "echo minor".into()]);

        let report = project.run_with(config, "recommendedBump");
        assert!(report.is_success(), "{:?}", report.error());

        let package = Package::read(&project.root).unwrap();
        assert_eq!(package.version, "0.20.0");
        assert!(project.read("package.json").contains("\"homepage\": \"https://github.com/angular-ui/ui-select\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_tag_reads_current_version() {
        let project = Project::new(&[]);
        let mut config = project.config();
        config.tools.git = Some(vec![
            "sh".into(),
            "-c".into(),
            "echo \"$@\" > git-args.txt".into(),
            "sh".into(),
        ]);

        let report = project.run_with(config, "tag");
        assert!(report.is_success(), "{:?}", report.error());
        assert_eq!(project.read("git-args.txt"), "tag -a v0.19.8 -m v0.19.8\n");
    }

    #[test]
    fn test_release_without_git() {
        let project = Project::new(&[]);
        let mut config = project.config();
        config.tools.git = None;

        let report = project.run_with(config, "pull");
        assert_eq!(report.state("pull"), Some(State::Failed));
    }
}

//! Fixed-point compilation and symbol resolution through the public loader API.

use hbs_loader::compiler::HandlebarsCompiler;
use hbs_loader::config::{LoaderConfig, LoaderOptions, StringList};
use hbs_loader::core::LoaderError;
use hbs_loader::loader::{BLANK_MODULE, LoadOutput, Loader};
use hbs_loader::symbols::BuildCache;
use hbs_loader::test_utils::{CountingResolver, TemplateProject, init_test_logging};
use hbs_loader::utils::normalize_path_for_storage;
use std::path::Path;
use std::sync::Arc;

async fn compile(
    options: LoaderOptions,
    modules: &CountingResolver,
    template: &Path,
) -> Result<LoadOutput, LoaderError> {
    init_test_logging(None);
    let config = LoaderConfig::from_options(&options)?;
    let loader =
        Loader::with_parts(config, Arc::new(BuildCache::new()), HandlebarsCompiler::new(), modules);
    loader.load_file(template).await
}

fn require_of(path: &Path) -> String {
    format!("require(\"{}\")", normalize_path_for_storage(path))
}

#[tokio::test]
async fn test_partial_becomes_dependency() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> header}}<main>{{body}}</main>")
        .unwrap()
        .with_file("views/header.hbs", "<h1>Title</h1>")
        .unwrap();
    let modules = CountingResolver::new();

    let output =
        compile(LoaderOptions::default(), &modules, &project.path("views/page.hbs")).await.unwrap();

    assert_eq!(output.passes, 2);
    assert!(!output.from_cache);
    assert_eq!(output.dependencies, vec![project.path("views/header.hbs")]);
    assert!(output.module.contains(&require_of(&project.path("views/header.hbs"))));
    assert!(output.module.starts_with("var Handlebars = require(\"handlebars/runtime\");"));
}

#[tokio::test]
async fn test_extension_is_tried_in_every_context_first() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> foo}}")
        .unwrap()
        .with_file("views/foo", "bare")
        .unwrap()
        .with_file("shared/foo.hbs", "shared")
        .unwrap();
    let modules = CountingResolver::new();
    let options = LoaderOptions {
        partial_dirs: Some(StringList::One(project.dir_option("shared"))),
        ..Default::default()
    };

    let output = compile(options, &modules, &project.path("views/page.hbs")).await.unwrap();
    assert_eq!(output.dependencies, vec![project.path("shared/foo.hbs")]);
}

#[tokio::test]
async fn test_partial_found_in_partial_dir() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> layout/footer}}")
        .unwrap()
        .with_file("partials/layout/footer.handlebars", "<footer></footer>")
        .unwrap();
    let modules = CountingResolver::new();
    let options = LoaderOptions {
        partial_dirs: Some(StringList::Many(vec![project.dir_option("partials")])),
        ..Default::default()
    };

    let output = compile(options, &modules, &project.path("views/page.hbs")).await.unwrap();
    assert_eq!(output.dependencies, vec![project.path("partials/layout/footer.handlebars")]);
}

#[tokio::test]
async fn test_resolved_request_partial_uses_module_directories() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> $widgets/card}}")
        .unwrap()
        .with_file("views/node_modules/widgets/card.hbs", "<div></div>")
        .unwrap();
    let modules = CountingResolver::new();

    let output =
        compile(LoaderOptions::default(), &modules, &project.path("views/page.hbs")).await.unwrap();
    assert_eq!(output.dependencies, vec![project.path("views/node_modules/widgets/card.hbs")]);
    assert!(modules.requests().iter().all(|request| request.starts_with("widgets/card")));
}

#[tokio::test]
async fn test_missing_partial_fails_with_suggestions() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> headr}}")
        .unwrap()
        .with_file("views/header.hbs", "")
        .unwrap();
    let modules = CountingResolver::new();

    let err = compile(LoaderOptions::default(), &modules, &project.path("views/page.hbs"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LoaderError::PartialNotFound {
            name: "headr".to_string(),
            suggestions: vec!["header".to_string()],
        }
    );
}

#[tokio::test]
async fn test_unknown_helpers_are_treated_as_data() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "<p>{{title}} {{format date}}</p>")
        .unwrap();
    let modules = CountingResolver::new();

    let output =
        compile(LoaderOptions::default(), &modules, &project.path("views/page.hbs")).await.unwrap();
    assert_eq!(output.passes, 1);
    assert!(output.dependencies.is_empty());
    assert!(!output.module.contains("__default(require("));
}

#[tokio::test]
async fn test_ambiguous_lookup_promoted_when_helper_exists() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "<h1>{{title}}</h1><p>{{body}}</p>")
        .unwrap()
        .with_file("views/title.js", "module.exports = function() { return 'T'; };")
        .unwrap();
    let modules = CountingResolver::new();

    let output =
        compile(LoaderOptions::default(), &modules, &project.path("views/page.hbs")).await.unwrap();
    assert_eq!(output.passes, 2);
    assert_eq!(output.dependencies, vec![project.path("views/title.js")]);
    assert!(output.module.contains(&format!("__default({})", require_of(&project.path("views/title.js")))));
}

#[tokio::test]
async fn test_pass_count_is_bounded_and_probes_are_not_repeated() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> a}}{{> b}}{{shout name}}{{whisper name}}{{missing name}}")
        .unwrap()
        .with_file("views/a.hbs", "")
        .unwrap()
        .with_file("views/b.hbs", "")
        .unwrap()
        .with_file("views/shout.js", "")
        .unwrap()
        .with_file("views/whisper.js", "")
        .unwrap();
    let modules = CountingResolver::new();

    let output =
        compile(LoaderOptions::default(), &modules, &project.path("views/page.hbs")).await.unwrap();

    // Five distinct symbols allow at most six passes; all of them are found
    // in the first round, so one recompile suffices.
    assert!(output.passes <= 6);
    assert_eq!(output.passes, 2);
    assert_eq!(output.dependencies.len(), 4);

    let requests = modules.requests();
    let mut unique = requests.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), requests.len(), "probed twice: {requests:?}");
}

#[tokio::test]
async fn test_helper_dirs_register_known_helpers() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{upper name}}")
        .unwrap()
        .with_file("helpers/upper.js", "")
        .unwrap();
    let modules = CountingResolver::new();
    let options = LoaderOptions {
        helper_dirs: Some(StringList::One(project.dir_option("helpers"))),
        ..Default::default()
    };

    let output = compile(options, &modules, &project.path("views/page.hbs")).await.unwrap();
    assert_eq!(output.passes, 1);
    assert_eq!(modules.calls(), 0);
    assert_eq!(output.dependencies, vec![project.path("helpers/upper.js")]);
}

#[tokio::test]
async fn test_unknown_helper_call_rejected_with_helper_dirs() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{nope name}}")
        .unwrap()
        .with_file("helpers/upper.js", "")
        .unwrap();
    let modules = CountingResolver::new();
    let options = LoaderOptions {
        helper_dirs: Some(StringList::One(project.dir_option("helpers"))),
        ..Default::default()
    };

    let err = compile(options, &modules, &project.path("views/page.hbs")).await.unwrap_err();
    assert!(matches!(err, LoaderError::TemplateSyntaxError { ref message, .. } if message.contains("nope")));
}

#[tokio::test]
async fn test_excluded_helper_stays_unresolved() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{shout name}}")
        .unwrap()
        .with_file("views/shout.js", "")
        .unwrap();
    let modules = CountingResolver::new();
    let options = LoaderOptions {
        exclude: Some(r"shout\.js$".to_string()),
        ..Default::default()
    };

    let output = compile(options, &modules, &project.path("views/page.hbs")).await.unwrap();
    assert!(output.dependencies.is_empty());
    assert_eq!(output.passes, 1);
}

#[tokio::test]
async fn test_blank_template_emits_blank_module() {
    let project = TemplateProject::new().unwrap().with_file("views/empty.hbs", "").unwrap();
    let modules = CountingResolver::new();

    let output =
        compile(LoaderOptions::default(), &modules, &project.path("views/empty.hbs")).await.unwrap();
    assert_eq!(output.module, BLANK_MODULE);
    assert_eq!(modules.calls(), 0);
}

#[tokio::test]
async fn test_inline_requires_rewrites_static_text() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "<img src=\"./logo.png\">")
        .unwrap();
    let modules = CountingResolver::new();
    let options = LoaderOptions {
        inline_requires: Some(r"\.png$".to_string()),
        ..Default::default()
    };

    let output = compile(options, &modules, &project.path("views/page.hbs")).await.unwrap();
    assert!(output.module.contains("require(\"./logo.png\")"));
}

//! On-disk module cache and build-wide shared state.

use hbs_loader::cache::TemplateCache;
use hbs_loader::compiler::HandlebarsCompiler;
use hbs_loader::config::{LoaderConfig, LoaderOptions};
use hbs_loader::loader::Loader;
use hbs_loader::symbols::BuildCache;
use hbs_loader::test_utils::{CountingResolver, TemplateProject};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn cached_options(project: &TemplateProject) -> LoaderOptions {
    LoaderOptions {
        cache: Some(project.dir_option("cache")),
        ..Default::default()
    }
}

fn loader<'a>(
    options: &LoaderOptions,
    build: Arc<BuildCache>,
    modules: &'a CountingResolver,
) -> Loader<&'a CountingResolver, HandlebarsCompiler> {
    let config = LoaderConfig::from_options(options).unwrap();
    Loader::with_parts(config, build, HandlebarsCompiler::new(), modules)
}

fn age(path: &Path) {
    let past = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options().write(true).open(path).unwrap().set_modified(past).unwrap();
}

#[tokio::test]
async fn test_fresh_entry_bypasses_compilation() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> header}}{{title}}")
        .unwrap()
        .with_file("views/header.hbs", "<h1></h1>")
        .unwrap();
    let template = project.path("views/page.hbs");
    age(&template);
    let options = cached_options(&project);

    let first_modules = CountingResolver::new();
    let first = loader(&options, Arc::new(BuildCache::new()), &first_modules)
        .load_file(&template)
        .await
        .unwrap();
    assert!(!first.from_cache);
    assert!(first_modules.calls() > 0);
    assert!(TemplateCache::new(project.path("cache")).entry_path(&template).is_file());

    let second_modules = CountingResolver::new();
    let second = loader(&options, Arc::new(BuildCache::new()), &second_modules)
        .load_file(&template)
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.passes, 0);
    assert_eq!(second.module, first.module);
    assert_eq!(second_modules.calls(), 0);
}

#[tokio::test]
async fn test_edited_template_is_recompiled() {
    let project = TemplateProject::new().unwrap().with_file("views/page.hbs", "<p>old</p>").unwrap();
    let template = project.path("views/page.hbs");
    let options = cached_options(&project);
    let modules = CountingResolver::new();

    age(&template);
    let first = loader(&options, Arc::new(BuildCache::new()), &modules).load_file(&template).await.unwrap();

    // Make the entry older than the edited source
    let entry = TemplateCache::new(project.path("cache")).entry_path(&template);
    fs::File::options()
        .write(true)
        .open(&entry)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(7200))
        .unwrap();
    fs::write(&template, "<p>new</p>").unwrap();

    let second = loader(&options, Arc::new(BuildCache::new()), &modules).load_file(&template).await.unwrap();
    assert!(!second.from_cache);
    assert_ne!(second.module, first.module);
    assert!(second.module.contains("new"));
}

#[tokio::test]
async fn test_cache_clean_and_stats() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/a.hbs", "<p>a</p>")
        .unwrap()
        .with_file("views/b.hbs", "<p>b</p>")
        .unwrap();
    let options = cached_options(&project);
    let modules = CountingResolver::new();
    let loader = loader(&options, Arc::new(BuildCache::new()), &modules);
    loader.load_file(&project.path("views/a.hbs")).await.unwrap();
    loader.load_file(&project.path("views/b.hbs")).await.unwrap();

    let cache = TemplateCache::new(project.path("cache"));
    let stats = cache.stats();
    assert_eq!(stats.entries, 2);
    assert!(stats.total_bytes > 0);

    assert_eq!(cache.clean().unwrap(), 2);
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn test_found_helpers_are_shared_across_jobs() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/one.hbs", "{{shout name}}")
        .unwrap()
        .with_file("views/shout.js", "")
        .unwrap()
        .with_file("other/two.hbs", "{{shout name}}")
        .unwrap();
    let build = Arc::new(BuildCache::new());
    let options = LoaderOptions::default();

    let first_modules = CountingResolver::new();
    let first = loader(&options, Arc::clone(&build), &first_modules)
        .load_file(&project.path("views/one.hbs"))
        .await
        .unwrap();
    assert_eq!(first.passes, 2);
    assert_eq!(build.found_helper("shout"), Some(project.path("views/shout.js")));

    let second_modules = CountingResolver::new();
    let second = loader(&options, Arc::clone(&build), &second_modules)
        .load_file(&project.path("other/two.hbs"))
        .await
        .unwrap();
    assert_eq!(second.passes, 1);
    assert_eq!(second_modules.calls(), 0);
    assert_eq!(second.dependencies, vec![project.path("views/shout.js")]);
}

#[tokio::test]
async fn test_first_found_helper_wins_across_directories() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/one.hbs", "{{shout name}}")
        .unwrap()
        .with_file("views/shout.js", "")
        .unwrap()
        .with_file("other/two.hbs", "{{shout name}}")
        .unwrap()
        .with_file("other/shout.js", "")
        .unwrap();
    let build = Arc::new(BuildCache::new());
    let options = LoaderOptions::default();
    let modules = CountingResolver::new();
    let shared = loader(&options, Arc::clone(&build), &modules);

    shared.load_file(&project.path("views/one.hbs")).await.unwrap();
    let second = shared.load_file(&project.path("other/two.hbs")).await.unwrap();

    assert_eq!(second.dependencies, vec![project.path("views/shout.js")]);

    let fresh_modules = CountingResolver::new();
    let alone = loader(&options, Arc::new(BuildCache::new()), &fresh_modules)
        .load_file(&project.path("other/two.hbs"))
        .await
        .unwrap();
    assert_eq!(alone.dependencies, vec![project.path("other/shout.js")]);
}

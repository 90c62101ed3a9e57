//! The `hbs-loader` binary.

use assert_cmd::Command;
use hbs_loader::test_utils::TemplateProject;
use predicates::prelude::*;
use std::fs;

fn hbs_loader(project: &TemplateProject) -> Command {
    let mut cmd = Command::cargo_bin("hbs-loader").unwrap();
    cmd.current_dir(project.root()).env("NO_COLOR", "1").env_remove("RUST_LOG").env_remove("HBS_LOADER_CONFIG");
    cmd
}

#[test]
fn test_compile_prints_module() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> header}}<p>{{body}}</p>")
        .unwrap()
        .with_file("views/header.hbs", "<h1></h1>")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "views/page.hbs"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("var Handlebars = require(\"handlebars/runtime\");"))
        .stdout(predicate::str::contains("views/header.hbs\")"));
}

#[test]
fn test_compile_missing_partial_fails() {
    let project = TemplateProject::new().unwrap().with_file("page.hbs", "{{> footer}}").unwrap();

    hbs_loader(&project)
        .args(["compile", "page.hbs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Partial 'footer' not found"));
}

#[test]
fn test_compile_multiple_templates_into_out_dir() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/a.hbs", "<p>{{shout name}}</p>")
        .unwrap()
        .with_file("views/b.hbs", "<p>{{shout name}}</p>")
        .unwrap()
        .with_file("helpers/shout.js", "")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "views/a.hbs", "views/b.hbs", "--helper-dir", "helpers", "--out-dir", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.js"));

    for name in ["out/a.js", "out/b.js"] {
        let module = fs::read_to_string(project.path(name)).unwrap();
        assert!(module.contains("helpers/shout.js\"))"), "{name}: {module}");
    }
}

#[test]
fn test_compile_multiple_templates_needs_out_dir() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("a.hbs", "a")
        .unwrap()
        .with_file("b.hbs", "b")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "a.hbs", "b.hbs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out-dir"));
}

#[test]
fn test_compile_reads_config_file_and_query() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> card}}")
        .unwrap()
        .with_file("shared/card.tpl", "<div></div>")
        .unwrap()
        .with_file("hbs-loader.toml", "partialDirs = [\"shared\"]\nruntime = \"custom/runtime\"\n")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "views/page.hbs", "--query", "?extensions=.tpl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("require(\"custom/runtime\")"))
        .stdout(predicate::str::contains("card.tpl\")"));
}

#[test]
fn test_debug_from_query_enables_traces() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("views/page.hbs", "{{> header}}")
        .unwrap()
        .with_file("views/header.hbs", "<h1></h1>")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "views/page.hbs", "--query", "?debug"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Compilation pass"));
}

#[test]
fn test_debug_from_config_file_enables_traces() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("page.hbs", "<p>{{title}}</p>")
        .unwrap()
        .with_file("hbs-loader.toml", "debug = true\n")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "page.hbs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Compilation pass 1"));
}

#[test]
fn test_no_traces_without_debug() {
    let project = TemplateProject::new().unwrap().with_file("page.hbs", "<p>{{title}}</p>").unwrap();

    hbs_loader(&project)
        .args(["compile", "page.hbs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Compilation pass").not());
}

#[test]
fn test_runtime_version_mismatch() {
    let project = TemplateProject::new()
        .unwrap()
        .with_file("page.hbs", "<p></p>")
        .unwrap()
        .with_file("runtime.js", "exports.COMPILER_REVISION = 7;")
        .unwrap();

    hbs_loader(&project)
        .args(["compile", "page.hbs", "--runtime"])
        .arg(project.path("runtime.js"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not match runtime version"));
}

#[test]
fn test_invalid_pattern_is_reported() {
    let project = TemplateProject::new().unwrap().with_file("page.hbs", "x").unwrap();

    hbs_loader(&project)
        .args(["compile", "page.hbs", "--exclude", "(unclosed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exclude"));
}

#[test]
fn test_cache_info_and_clean() {
    let project = TemplateProject::new().unwrap().with_file("page.hbs", "<p>{{x}}</p>").unwrap();

    hbs_loader(&project).args(["compile", "page.hbs", "--cache", "cache"]).assert().success();

    hbs_loader(&project)
        .args(["cache", "info", "cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 1"));

    hbs_loader(&project)
        .args(["cache", "clean", "cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cached module(s)"));

    hbs_loader(&project)
        .args(["cache", "info", "cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 0"));
}

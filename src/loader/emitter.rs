//! Module emission.

use crate::compiler::quote;
use crate::config::LoaderConfig;
use crate::constants::TEMPLATE_DIR_SEGMENT;
use crate::utils::normalize_path_for_storage;
use regex::Regex;
use std::path::Path;

/// Module body produced for blank templates.
pub const BLANK_MODULE: &str = "module.exports = function(){return \"\";};";

/// Wraps compiled template code into a loadable module.
#[derive(Debug, Clone)]
pub struct Emitter {
    runtime: String,
    root_strip: Option<Regex>,
}

impl Emitter {
    #[must_use]
    pub fn new(config: &LoaderConfig) -> Self {
        let root_strip = config.root.as_deref().and_then(|root| {
            let root = normalize_path_for_storage(root);
            let root = root.trim_end_matches('/');
            let alternatives: Vec<String> = config
                .module_directories
                .iter()
                .map(|dir| format!("({})", regex::escape(&format!("{root}/{dir}"))))
                .collect();
            if alternatives.is_empty() {
                return None;
            }
            // Alternatives are escaped literals
            Regex::new(&alternatives.join("|")).ok()
        });

        Self {
            runtime: config.runtime_request().to_string(),
            root_strip,
        }
    }

    /// Diagnostic identifier for a template: configured root/module-directory
    /// prefixes removed, `/tpl/` collapsed to `/`, no leading slash.
    #[must_use]
    pub fn template_identifier(&self, resource_path: &Path) -> String {
        let path = normalize_path_for_storage(resource_path);
        let stripped = match &self.root_strip {
            Some(rx) => rx.replace_all(&path, "").into_owned(),
            None => path,
        };
        let collapsed = stripped.replace(TEMPLATE_DIR_SEGMENT, "/");
        collapsed.strip_prefix('/').map(str::to_string).unwrap_or(collapsed)
    }

    /// Module source for `template` (the compiled spec, empty for blank input).
    #[must_use]
    pub fn emit(&self, template: &str, resource_path: &Path) -> String {
        if template.is_empty() {
            return BLANK_MODULE.to_string();
        }

        format!(
            "var Handlebars = require({runtime});\n\
             function __default(obj) {{ return obj && (obj.__esModule ? obj[\"default\"] : obj); }}\n\
             module.exports = (function($__hbsFileName){{ return (Handlebars[\"default\"] || Handlebars).template({template}); }})({identifier})",
            runtime = quote(&self.runtime),
            identifier = quote(&self.template_identifier(resource_path)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderOptions;

    fn emitter(root: Option<&str>) -> Emitter {
        let config = LoaderConfig::from_options(&LoaderOptions {
            root: root.map(str::to_string),
            ..Default::default()
        })
        .unwrap();
        Emitter::new(&config)
    }

    #[test]
    fn test_blank_template() {
        assert_eq!(emitter(None).emit("", Path::new("/src/a.hbs")), BLANK_MODULE);
    }

    #[test]
    fn test_module_shape() {
        let module = emitter(Some("/app")).emit("{\"main\":1}", Path::new("/app/src/tpl/page.hbs"));
        assert_eq!(
            module,
            "var Handlebars = require(\"handlebars/runtime\");\n\
             function __default(obj) { return obj && (obj.__esModule ? obj[\"default\"] : obj); }\n\
             module.exports = (function($__hbsFileName){ return (Handlebars[\"default\"] || Handlebars).template({\"main\":1}); })(\"app/src/page.hbs\")"
        );
    }

    #[test]
    fn test_identifier_strips_module_directories() {
        let emitter = emitter(Some("/app"));
        assert_eq!(
            emitter.template_identifier(Path::new("/app/node_modules/widgets/tpl/card.hbs")),
            "widgets/card.hbs"
        );
        assert_eq!(emitter.template_identifier(Path::new("/other/x.hbs")), "other/x.hbs");
    }

    #[test]
    fn test_identifier_without_root() {
        assert_eq!(emitter(None).template_identifier(Path::new("/src/tpl/x.hbs")), "src/x.hbs");
    }
}

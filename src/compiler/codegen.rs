//! Code generation for parsed templates.
//!
//! Every program (the template body and each block body) becomes one JS
//! function with the runtime's calling convention. Symbol references go
//! through [`CodegenHooks::classify_symbol`], literal text through the
//! literal hooks.

use super::parser::{Block, Call, Expr, Partial, PathExpr, Program, Statement};
use super::{
    COMPILER_REVISION, COMPILER_VERSION, CodegenHooks, CompileOptions, LookupAction, LookupKind,
    SyntaxError,
};

/// Locals shared by every generated program function.
const PROLOGUE: &str = r#"  var stack1, buffer = "", alias1 = depth0 != null ? depth0 : (container.nullContext || {}), lookupProperty = container.lookupProperty || function(parent, propertyName) { if (Object.prototype.hasOwnProperty.call(parent, propertyName)) { return parent[propertyName]; } return undefined; };
  function invokeHelper(helper, context, params, options) { if (helper == null) { helper = container.hooks.helperMissing; } return typeof helper === "function" ? helper.apply(context, params.concat([options])) : helper; }
  function invokeAmbiguous(helper, value, context, options) { if (helper != null) { return typeof helper === "function" ? helper.call(context, options) : helper; } return typeof value === "function" ? value.call(context, options) : value; }
  function invokeBlock(helper, value, context, options) { if (helper != null) { return typeof helper === "function" ? helper.call(context, options) : helper; } return container.hooks.blockHelperMissing.call(context, value, options); }"#;

const SIGNATURE: &str = "function(container,depth0,helpers,partials,data,blockParams,depths)";

pub(crate) fn generate(
    program: &Program,
    options: &CompileOptions,
    hooks: &mut dyn CodegenHooks,
) -> Result<String, SyntaxError> {
    let mut generator = Generator {
        options,
        hooks,
        programs: Vec::new(),
        block_params: Vec::new(),
        use_partial: false,
        use_depths: false,
        use_block_params: false,
    };
    let main = generator.compile_body(program)?;

    let mut spec = String::from("{");
    for (index, body) in generator.programs.iter().enumerate() {
        spec.push_str(&format!("\"{}\":{},", index + 1, body));
    }
    spec.push_str(&format!(
        "\"compiler\":[{},{}],\"main\":{}",
        COMPILER_REVISION,
        quote(COMPILER_VERSION),
        main
    ));
    if generator.use_partial {
        spec.push_str(",\"usePartial\":true");
    }
    spec.push_str(",\"useData\":true");
    if generator.use_depths {
        spec.push_str(",\"useDepths\":true");
    }
    if generator.use_block_params {
        spec.push_str(",\"useBlockParams\":true");
    }
    spec.push('}');
    Ok(spec)
}

/// JS string literal for `value`.
pub(crate) fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_owned())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// How a call is being emitted.
#[derive(Clone, Copy)]
enum Site {
    Mustache,
    SubExpr,
    Block {
        program: Option<usize>,
        inverse: Option<usize>,
        declared: usize,
    },
}

/// How the generator treats a callee.
enum Shape {
    /// Direct helper call
    Helper(String),
    /// Helper if one is registered at render time, otherwise context value
    Ambiguous(String, PathExpr),
    /// Plain value (possibly invoked when it has arguments)
    Simple,
}

struct Generator<'a> {
    options: &'a CompileOptions,
    hooks: &'a mut dyn CodegenHooks,
    /// Bodies of numbered child programs; index 0 is program "1"
    programs: Vec<String>,
    /// Declared block parameters, innermost program last
    block_params: Vec<Vec<String>>,
    use_partial: bool,
    use_depths: bool,
    use_block_params: bool,
}

impl Generator<'_> {
    fn compile_body(&mut self, program: &Program) -> Result<String, SyntaxError> {
        let mut lines = Vec::with_capacity(program.body.len());

        for statement in &program.body {
            match statement {
                Statement::Content(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    let chunk = self.hooks.rewrite_literal_chunk(text).unwrap_or_else(|| quote(text));
                    lines.push(format!("buffer += {chunk};"));
                }
                Statement::Mustache {
                    call,
                    escaped,
                } => {
                    let value = self.call_value(call, Site::Mustache)?;
                    if *escaped {
                        lines.push(format!("buffer += container.escapeExpression({value});"));
                    } else {
                        lines.push(format!("buffer += ((stack1 = {value}) != null ? stack1 : \"\");"));
                    }
                }
                Statement::Block(block) => {
                    let value = self.block_value(block)?;
                    lines.push(format!("buffer += ((stack1 = {value}) != null ? stack1 : \"\");"));
                }
                Statement::Partial(partial) => {
                    let value = self.partial_value(partial)?;
                    lines.push(format!("buffer += ((stack1 = {value}) != null ? stack1 : \"\");"));
                }
            }
        }

        Ok(format!("{SIGNATURE} {{\n{PROLOGUE}\n  {}\n  return buffer;\n}}", lines.join("\n  ")))
    }

    /// Compile a block body as a numbered program and return its number.
    fn compile_child(&mut self, program: &Program) -> Result<usize, SyntaxError> {
        let index = self.programs.len();
        self.programs.push(String::new());
        if !program.block_params.is_empty() {
            self.use_block_params = true;
        }
        self.block_params.push(program.block_params.clone());
        let body = self.compile_body(program);
        self.block_params.pop();
        self.programs[index] = body?;
        Ok(index + 1)
    }

    fn block_value(&mut self, block: &Block) -> Result<String, SyntaxError> {
        let program = block.program.as_ref().map(|p| self.compile_child(p)).transpose()?;
        let inverse = block.inverse.as_ref().map(|p| self.compile_child(p)).transpose()?;
        let declared = block.program.as_ref().map_or(0, |p| p.block_params.len());
        self.call_value(
            &block.call,
            Site::Block {
                program,
                inverse,
                declared,
            },
        )
    }

    fn partial_value(&mut self, partial: &Partial) -> Result<String, SyntaxError> {
        self.use_partial = true;

        let (target, name) = match &partial.name {
            Expr::SubExpr(call) => ("undefined".to_string(), self.call_value(call, Site::SubExpr)?),
            other => {
                let name = other.original();
                (self.lookup("partials", &name, LookupKind::Partial), quote(&name))
            }
        };
        let context = match &partial.context {
            Some(expr) => self.expr_value(expr)?,
            None => "depth0".to_string(),
        };
        let hash = self.hash_object(&partial.hash)?;

        let mut fields = vec![
            format!("\"name\":{name}"),
            format!("\"hash\":{hash}"),
            "\"data\":data".to_string(),
            "\"helpers\":helpers".to_string(),
            "\"partials\":partials".to_string(),
            "\"decorators\":container.decorators".to_string(),
        ];
        if let Some(fallback) = &partial.fallback {
            let index = self.compile_child(fallback)?;
            fields.push(format!("\"fn\":container.program({index}, data, 0, blockParams, depths)"));
        }

        Ok(format!("container.invokePartial({target}, {context}, {{{}}})", fields.join(",")))
    }

    fn classify(&self, call: &Call, site: Site) -> Result<Shape, SyntaxError> {
        let Expr::Path(path) = &call.path else {
            return Ok(Shape::Simple);
        };
        if !path.is_helper_name() || self.block_param_slot(&path.parts[0]).is_some() {
            return Ok(Shape::Simple);
        }

        let name = &path.parts[0];
        if self.options.known_helpers.contains(name) {
            return Ok(Shape::Helper(name.clone()));
        }
        if call.has_arguments() || matches!(site, Site::SubExpr) {
            if self.options.known_helpers_only {
                return Err(SyntaxError::new(
                    format!("You specified knownHelpersOnly, but used the unknown helper {name}"),
                    call.line,
                    call.column,
                ));
            }
            return Ok(Shape::Helper(name.clone()));
        }
        if self.options.known_helpers_only {
            Ok(Shape::Simple)
        } else {
            Ok(Shape::Ambiguous(name.clone(), path.clone()))
        }
    }

    fn call_value(&mut self, call: &Call, site: Site) -> Result<String, SyntaxError> {
        match self.classify(call, site)? {
            Shape::Helper(name) => {
                let helper = self.lookup("helpers", &name, LookupKind::Helper);
                let params = self.params(&call.params)?;
                let options = self.options_object(&name, call, site)?;
                Ok(format!("invokeHelper({helper}, alias1, [{params}], {options})"))
            }
            Shape::Ambiguous(name, path) => {
                let value = self.path_value(&path);
                let helper = self.lookup("helpers", &name, LookupKind::Helper);
                let options = self.options_object(&name, call, site)?;
                let invoker = match site {
                    Site::Block {
                        ..
                    } => "invokeBlock",
                    _ => "invokeAmbiguous",
                };
                Ok(format!("{invoker}({helper}, {value}, alias1, {options})"))
            }
            Shape::Simple => {
                let name = call.path.original();
                let value = self.expr_value(&call.path)?;
                if call.has_arguments() {
                    let params = self.params(&call.params)?;
                    let options = self.options_object(&name, call, site)?;
                    return Ok(format!("invokeHelper({value}, alias1, [{params}], {options})"));
                }
                match site {
                    Site::Block {
                        ..
                    } => {
                        let options = self.options_object(&name, call, site)?;
                        Ok(format!("container.hooks.blockHelperMissing.call(alias1, {value}, {options})"))
                    }
                    _ if matches!(call.path, Expr::Path(_)) => {
                        Ok(format!("container.lambda({value}, depth0)"))
                    }
                    _ => Ok(value),
                }
            }
        }
    }

    fn options_object(&mut self, name: &str, call: &Call, site: Site) -> Result<String, SyntaxError> {
        let hash = self.hash_object(&call.hash)?;
        let mut fields = vec![format!("\"name\":{}", quote(name)), format!("\"hash\":{hash}")];
        if let Site::Block {
            program,
            inverse,
            declared,
        } = site
        {
            fields.push(match program {
                Some(index) => {
                    format!("\"fn\":container.program({index}, data, {declared}, blockParams, depths)")
                }
                None => "\"fn\":container.noop".to_string(),
            });
            fields.push(match inverse {
                Some(index) => {
                    format!("\"inverse\":container.program({index}, data, 0, blockParams, depths)")
                }
                None => "\"inverse\":container.noop".to_string(),
            });
        }
        fields.push("\"data\":data".to_string());
        fields.push(format!(
            "\"loc\":{{\"start\":{{\"line\":{},\"column\":{}}}}}",
            call.line,
            call.column.saturating_sub(1)
        ));
        Ok(format!("{{{}}}", fields.join(",")))
    }

    fn params(&mut self, params: &[Expr]) -> Result<String, SyntaxError> {
        let values =
            params.iter().map(|param| self.expr_value(param)).collect::<Result<Vec<_>, _>>()?;
        Ok(values.join(","))
    }

    fn hash_object(&mut self, hash: &[(String, Expr)]) -> Result<String, SyntaxError> {
        let mut fields = Vec::with_capacity(hash.len());
        for (key, value) in hash {
            let value = self.expr_value(value)?;
            fields.push(format!("{}:{}", quote(key), value));
        }
        Ok(format!("{{{}}}", fields.join(",")))
    }

    fn expr_value(&mut self, expr: &Expr) -> Result<String, SyntaxError> {
        Ok(match expr {
            Expr::Path(path) => self.path_value(path),
            Expr::Str(value) => self.hooks.rewrite_string_literal(value).unwrap_or_else(|| quote(value)),
            Expr::Num(number) => number.clone(),
            Expr::Bool(value) => value.to_string(),
            Expr::Null => "null".to_string(),
            Expr::Undefined => "undefined".to_string(),
            Expr::SubExpr(call) => self.call_value(call, Site::SubExpr)?,
        })
    }

    fn path_value(&mut self, path: &PathExpr) -> String {
        if path.data {
            return self.chain("data".to_string(), &path.parts, LookupKind::Data);
        }
        if path.depth == 0 && !path.scoped {
            if let Some((depth, index)) = path.parts.first().and_then(|p| self.block_param_slot(p)) {
                return self.chain(
                    format!("blockParams[{depth}][{index}]"),
                    &path.parts[1..],
                    LookupKind::Context,
                );
            }
        }
        let base = if path.depth == 0 {
            "depth0".to_string()
        } else {
            self.use_depths = true;
            format!("depths[{}]", path.depth)
        };
        self.chain(base, &path.parts, LookupKind::Context)
    }

    /// Null-guarded member chain. The first segment is reported with
    /// `first_kind`, the rest as context lookups.
    fn chain(&mut self, base: String, parts: &[String], first_kind: LookupKind) -> String {
        let mut expr = base.clone();
        for (i, part) in parts.iter().enumerate() {
            if i == 0 {
                let lookup = self.lookup(&base, part, first_kind);
                expr = format!("({base} != null ? {lookup} : {base})");
            } else {
                let lookup = self.lookup("stack1", part, LookupKind::Context);
                expr = format!("((stack1 = {expr}) != null ? {lookup} : stack1)");
            }
        }
        expr
    }

    fn lookup(&mut self, parent: &str, name: &str, kind: LookupKind) -> String {
        match self.hooks.classify_symbol(parent, name, kind) {
            LookupAction::Replace(code) => code,
            LookupAction::Default => format!("lookupProperty({parent},{})", quote(name)),
        }
    }

    /// Position of a block parameter, counted from the innermost program.
    fn block_param_slot(&self, name: &str) -> Option<(usize, usize)> {
        self.block_params
            .iter()
            .rev()
            .enumerate()
            .find_map(|(depth, names)| names.iter().position(|n| n == name).map(|i| (depth, i)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DefaultHooks, lexer, parser};
    use super::*;

    fn generate_source(source: &str) -> String {
        let program = parser::parse(lexer::scan(source).unwrap()).unwrap();
        generate(&program, &CompileOptions::default(), &mut DefaultHooks).unwrap()
    }

    #[test]
    fn test_block_programs_are_numbered() {
        let code = generate_source("{{#each items}}<li>{{name}}</li>{{else}}none{{/each}}");
        assert!(code.starts_with("{\"1\":function("));
        assert!(code.contains("\"2\":function("));
        assert!(code.contains("\"fn\":container.program(1, data, 0, blockParams, depths)"));
        assert!(code.contains("\"inverse\":container.program(2, data, 0, blockParams, depths)"));
    }

    #[test]
    fn test_block_params_resolve_to_slots() {
        let code = generate_source("{{#each items as |item|}}{{item.name}}{{/each}}");
        assert!(code.contains("blockParams[0][0]"));
        assert!(code.contains("\"useBlockParams\":true"));
    }

    #[test]
    fn test_parent_paths_use_depths() {
        let code = generate_source("{{#with user}}{{../title}}{{/with}}");
        assert!(code.contains("depths[1]"));
        assert!(code.contains("\"useDepths\":true"));
    }

    #[test]
    fn test_unescaped_mustache_skips_escaping() {
        let code = generate_source("{{{body}}}");
        assert!(!code.contains("escapeExpression"));
    }

    #[test]
    fn test_dynamic_partial_has_no_partial_lookup() {
        let code = generate_source("{{> (whichPartial) }}");
        assert!(code.contains("container.invokePartial(undefined"));
        assert!(!code.contains("lookupProperty(partials"));
    }

    #[test]
    fn test_quote_escapes_line_separators() {
        assert_eq!(quote("a\u{2028}b"), "\"a\\u2028b\"");
        assert_eq!(quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }
}

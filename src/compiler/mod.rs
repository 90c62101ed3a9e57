//! Handlebars-syntax template precompiler.
//!
//! This module is the template-compiler collaborator of the loader: it turns
//! template source into a template-spec code string that the template runtime
//! can execute. The loader never inspects the generated code; it steers code
//! generation through a [`CodegenHooks`] value injected per compilation.
//!
//! # Pipeline
//!
//! 1. [`lexer`] splits source into content and tokenized mustache tags
//! 2. [`parser`] builds a [`parser::Program`] tree
//! 3. [`codegen`] walks the tree and emits code, asking the hooks how to
//!    reference every partial, helper and context name it meets
//!
//! # Hooks
//!
//! The generator calls [`CodegenHooks::classify_symbol`] exactly once per
//! symbol reference it emits. Returning [`LookupAction::Default`] keeps the
//! runtime lookup (`lookupProperty(helpers, "name")` and friends); returning
//! [`LookupAction::Replace`] substitutes arbitrary code, which is how resolved
//! partials and helpers become module loads.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hbs_loader::compiler::{CompileOptions, DefaultHooks, HandlebarsCompiler, TemplateCompiler};
//!
//! let compiler = HandlebarsCompiler::new();
//! let code = compiler
//!     .precompile("<h1>{{title}}</h1>", &CompileOptions::default(), &mut DefaultHooks)
//!     .unwrap();
//! assert!(code.contains("\"main\":function"));
//! ```

mod codegen;
mod lexer;
pub mod parser;

pub(crate) use codegen::quote;

use std::collections::BTreeSet;
use std::fmt;

/// Revision of the generated template-spec format.
///
/// A runtime executes only specs of its own revision.
pub const COMPILER_REVISION: u32 = 8;

/// Runtime version range recorded in every generated spec.
pub const COMPILER_VERSION: &str = ">= 4.3.0";

/// Helpers every runtime provides.
pub const BUILTIN_HELPERS: &[&str] =
    &["blockHelperMissing", "each", "helperMissing", "if", "log", "lookup", "unless", "with"];

/// The kind of reference the generator is about to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// `{{> name}}`
    Partial,
    /// A helper invocation, or the helper half of an ambiguous mustache
    Helper,
    /// A member access on the current context (every path segment)
    Context,
    /// An `@data` variable
    Data,
}

/// What the generator should emit for a symbol reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupAction {
    /// Keep the runtime lookup expression
    Default,
    /// Emit this code instead
    Replace(String),
}

/// Capability set injected into one compilation.
///
/// All methods have pass-through defaults, so implementors only override the
/// concerns they care about.
pub trait CodegenHooks {
    /// Decide how the reference to `name` (looked up on `parent`) is emitted.
    fn classify_symbol(&mut self, _parent: &str, _name: &str, _kind: LookupKind) -> LookupAction {
        LookupAction::Default
    }

    /// Replace a string literal argument with code. `None` keeps the literal.
    fn rewrite_string_literal(&mut self, _value: &str) -> Option<String> {
        None
    }

    /// Replace a static content chunk with code. `None` keeps the quoted text.
    fn rewrite_literal_chunk(&mut self, _text: &str) -> Option<String> {
        None
    }
}

/// Hooks that never alter the generated code.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl CodegenHooks for DefaultHooks {}

/// Compilation hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Treat every unknown name as data; a call with arguments to an unknown
    /// helper is an error.
    pub known_helpers_only: bool,
    /// Names compiled as direct helper calls instead of ambiguous lookups.
    pub known_helpers: BTreeSet<String>,
}

/// A rejected template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

impl std::error::Error for SyntaxError {}

/// A template compiler paired with a runtime revision.
pub trait TemplateCompiler: Send + Sync {
    /// Revision of the code this compiler generates.
    fn revision(&self) -> u32;

    /// Human-readable runtime version range.
    fn version(&self) -> &str;

    /// Helpers the paired runtime always provides.
    fn builtin_helpers(&self) -> &[&str];

    /// Compile `source` to a template-spec code string.
    fn precompile(
        &self,
        source: &str,
        options: &CompileOptions,
        hooks: &mut dyn CodegenHooks,
    ) -> Result<String, SyntaxError>;
}

/// The Handlebars-syntax compiler shipped with the loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandlebarsCompiler;

impl HandlebarsCompiler {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TemplateCompiler for HandlebarsCompiler {
    fn revision(&self) -> u32 {
        COMPILER_REVISION
    }

    fn version(&self) -> &str {
        COMPILER_VERSION
    }

    fn builtin_helpers(&self) -> &[&str] {
        BUILTIN_HELPERS
    }

    fn precompile(
        &self,
        source: &str,
        options: &CompileOptions,
        hooks: &mut dyn CodegenHooks,
    ) -> Result<String, SyntaxError> {
        let segments = lexer::scan(source)?;
        let program = parser::parse(segments)?;
        codegen::generate(&program, options, hooks)
    }
}

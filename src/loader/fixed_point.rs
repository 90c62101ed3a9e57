//! The fixed-point compile loop.
//!
//! ```text
//! Compiling -> ResolvingHelpers -> ResolvingAmbiguous -> ResolvingPartials -> Done
//!     ^                                                        |
//!     +-------------------------- Recompiling <----------------+ (progress)
//! ```
//!
//! Each pass compiles the template with the current symbol table, then
//! searches for every symbol the pass discovered and nobody has searched for
//! yet. A pass that finds anything triggers a full recompile because resolved
//! symbols change the generated code. A symbol is searched at most once per
//! kind, so a template referencing N distinct symbols compiles at most N + 1
//! times.
//!
//! Fatal errors (syntax errors, missing partials) leave the loop immediately.

use super::hook::LoaderHooks;
use crate::compiler::{CompileOptions, TemplateCompiler};
use crate::config::LoaderConfig;
use crate::core::LoaderError;
use crate::resolver::{ModuleResolver, Resolver};
use crate::symbols::{BuildCache, SymbolKind, SymbolTable};
use futures::future::{join_all, try_join_all};
use std::path::Path;
use tracing::{debug, trace};

/// States of the compile loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Compiling,
    ResolvingHelpers,
    ResolvingAmbiguous,
    ResolvingPartials,
    Recompiling,
    Done,
}

/// Result of a finished loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Compacted compiled code of the final pass; empty for blank input
    pub code: String,
    pub table: SymbolTable,
    /// Number of compile passes
    pub passes: usize,
}

pub struct FixedPointCompiler<'a, C: TemplateCompiler + ?Sized, R: ModuleResolver> {
    compiler: &'a C,
    resolver: Resolver<'a, R>,
    build: &'a BuildCache,
    config: &'a LoaderConfig,
    template_name: String,
}

impl<'a, C: TemplateCompiler + ?Sized, R: ModuleResolver> FixedPointCompiler<'a, C, R> {
    pub fn new(
        compiler: &'a C,
        resolver: Resolver<'a, R>,
        build: &'a BuildCache,
        config: &'a LoaderConfig,
        template_name: impl Into<String>,
    ) -> Self {
        Self {
            compiler,
            resolver,
            build,
            config,
            template_name: template_name.into(),
        }
    }

    pub async fn run(&self, source: &str) -> Result<LoopOutcome, LoaderError> {
        let mut table = SymbolTable::new();
        let mut state = LoopState::Compiling;
        let mut code = String::new();
        let mut passes = 0;
        let mut progress = false;

        loop {
            trace!("{}: {:?}", self.template_name, state);
            state = match state {
                LoopState::Compiling => {
                    passes += 1;
                    progress = false;
                    if self.config.debug {
                        debug!("Compilation pass {} for {}", passes, self.template_name);
                    }
                    code = self.compile_pass(source, &mut table)?;
                    LoopState::ResolvingHelpers
                }
                LoopState::ResolvingHelpers => {
                    progress |= self.resolve_helpers(&mut table, SymbolKind::Helper).await;
                    LoopState::ResolvingAmbiguous
                }
                LoopState::ResolvingAmbiguous => {
                    progress |= self.resolve_helpers(&mut table, SymbolKind::Ambiguous).await;
                    LoopState::ResolvingPartials
                }
                LoopState::ResolvingPartials => {
                    progress |= self.resolve_partials(&mut table).await?;
                    if progress {
                        LoopState::Recompiling
                    } else {
                        LoopState::Done
                    }
                }
                LoopState::Recompiling => LoopState::Compiling,
                LoopState::Done => break,
            };
        }

        debug!("Compiled {} in {} pass(es), {} symbol(s)", self.template_name, passes, table.len());
        Ok(LoopOutcome {
            code,
            table,
            passes,
        })
    }

    fn compile_pass(&self, source: &str, table: &mut SymbolTable) -> Result<String, LoaderError> {
        if source.is_empty() {
            return Ok(String::new());
        }

        let options = CompileOptions {
            known_helpers_only: self.config.known_helpers_only(),
            known_helpers: self.build.known_helpers().snapshot(),
        };
        let mut hooks = LoaderHooks::new(table, self.build, self.config);
        let raw = self.compiler.precompile(source, &options, &mut hooks).map_err(|e| {
            LoaderError::TemplateSyntaxError {
                template: self.template_name.clone(),
                message: e.message,
                line: e.line,
                column: e.column,
            }
        })?;
        Ok(compact(&raw))
    }

    /// Search every pending helper (or ambiguous) symbol. Misses are recorded
    /// and are not errors.
    ///
    /// Helper and ambiguous names share one request, so an ambiguous name
    /// whose helper entry was already searched takes that outcome instead of
    /// being searched again.
    async fn resolve_helpers(&self, table: &mut SymbolTable, kind: SymbolKind) -> bool {
        let mut pending = table.pending(kind);
        let mut progress = false;

        if kind == SymbolKind::Ambiguous {
            let mut unsearched = Vec::with_capacity(pending.len());
            for name in pending {
                if let Some(path) = table.resolved_path(SymbolKind::Helper, &name).map(Path::to_path_buf) {
                    table.promote(&name, path);
                    progress = true;
                } else if table.is_attempted(SymbolKind::Helper, &name) {
                    table.mark_unresolved(kind, &name);
                } else {
                    unsearched.push(name);
                }
            }
            pending = unsearched;
        }

        if pending.is_empty() {
            return progress;
        }

        let results = join_all(pending.iter().map(|name| async move {
            (name, self.resolver.resolve(kind, name).await)
        }))
        .await;

        for (name, found) in results {
            match found {
                Some(path) => {
                    self.build.record_helper(name, path.clone());
                    if kind == SymbolKind::Ambiguous {
                        table.promote(name, path);
                    } else {
                        table.mark_resolved(kind, name, path);
                    }
                    progress = true;
                }
                None => table.mark_unresolved(kind, name),
            }
        }
        progress
    }

    /// Search every pending partial. The first missing partial aborts the batch.
    async fn resolve_partials(&self, table: &mut SymbolTable) -> Result<bool, LoaderError> {
        let pending = table.pending(SymbolKind::Partial);
        if pending.is_empty() {
            return Ok(false);
        }

        let found = try_join_all(pending.iter().map(|name| async move {
            self.resolver.resolve_partial(name).await.map(|path| (name, path))
        }))
        .await?;

        for (name, path) in found {
            table.mark_resolved(SymbolKind::Partial, name, path);
        }
        Ok(true)
    }
}

/// Shrink generated code: escaped `\r`/`\n` sequences are dropped, whitespace
/// runs become one space and whitespace between `>` and `<` disappears.
pub(crate) fn compact(code: &str) -> String {
    let mut unescaped = String::with_capacity(code.len());
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('r' | 'n') => {}
            Some(escaped) => {
                unescaped.push(c);
                unescaped.push(escaped);
            }
            None => unescaped.push(c),
        }
    }

    let mut collapsed = String::with_capacity(unescaped.len());
    let mut run = String::new();
    for c in unescaped.chars() {
        if c.is_whitespace() {
            run.push(c);
            continue;
        }
        flush_whitespace(&mut collapsed, &mut run);
        collapsed.push(c);
    }
    flush_whitespace(&mut collapsed, &mut run);

    let chars: Vec<char> = collapsed.chars().collect();
    let mut result = String::with_capacity(collapsed.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        result.push(c);
        i += 1;
        if c == '>' {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i && chars.get(j) == Some(&'<') {
                i = j;
            }
        }
    }
    result
}

fn flush_whitespace(out: &mut String, run: &mut String) {
    match run.chars().count() {
        0 => {}
        1 => out.push_str(run),
        _ => out.push(' '),
    }
    run.clear();
}

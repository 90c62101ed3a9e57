//! The naming hook: how symbol references are written into generated code.
//!
//! One [`LoaderHooks`] value is handed to the compiler per pass. It consults
//! the job's [`SymbolTable`] (and the shared [`BuildCache`]) for every
//! reference:
//!
//! - a resolved partial becomes `require("<path>")`
//! - a resolved helper becomes `__default(require("<path>"))`
//! - anything unresolved keeps the runtime lookup and is recorded as pending,
//!   so the loop can search for it after the pass
//!
//! The hook never resolves anything itself.

use crate::compiler::{CodegenHooks, LookupAction, LookupKind, quote};
use crate::config::LoaderConfig;
use crate::constants::BUILTIN_PARTIAL_PREFIX;
use crate::symbols::{BuildCache, SymbolKind, SymbolTable};
use crate::utils::normalize_path_for_storage;
use regex::Regex;
use std::path::Path;
use tracing::debug;

pub struct LoaderHooks<'a> {
    table: &'a mut SymbolTable,
    build: &'a BuildCache,
    inline_requires: Option<&'a Regex>,
    debug: bool,
}

impl<'a> LoaderHooks<'a> {
    pub fn new(table: &'a mut SymbolTable, build: &'a BuildCache, config: &'a LoaderConfig) -> Self {
        Self {
            table,
            build,
            inline_requires: config.inline_requires.as_ref(),
            debug: config.debug,
        }
    }

    fn partial(&mut self, name: &str) -> LookupAction {
        if name.starts_with(BUILTIN_PARTIAL_PREFIX) {
            return LookupAction::Default;
        }
        if let Some(path) = self.table.resolved_path(SymbolKind::Partial, name) {
            return LookupAction::Replace(require(path));
        }
        self.table.register(SymbolKind::Partial, name);
        LookupAction::Default
    }

    fn helper(&mut self, name: &str) -> LookupAction {
        if let Some(path) = self.table.resolved_path(SymbolKind::Helper, name) {
            return LookupAction::Replace(format!("__default({})", require(path)));
        }
        // Found by an earlier job (or the helper directory scan)
        if let Some(path) = self.build.found_helper(name) {
            let action = LookupAction::Replace(format!("__default({})", require(&path)));
            self.table.mark_resolved(SymbolKind::Helper, name, path);
            return action;
        }
        self.table.register(SymbolKind::Helper, name);
        LookupAction::Default
    }

    fn context(&mut self, name: &str) -> LookupAction {
        if self.build.known_helpers().contains(name) {
            self.table.register(SymbolKind::Ambiguous, name);
        }
        LookupAction::Default
    }
}

impl CodegenHooks for LoaderHooks<'_> {
    fn classify_symbol(&mut self, parent: &str, name: &str, kind: LookupKind) -> LookupAction {
        if self.debug {
            debug!("nameLookup {} {} {:?}", parent, name, kind);
        }
        match kind {
            LookupKind::Partial => self.partial(name),
            LookupKind::Helper => self.helper(name),
            LookupKind::Context => self.context(name),
            LookupKind::Data => LookupAction::Default,
        }
    }

    fn rewrite_string_literal(&mut self, value: &str) -> Option<String> {
        let pattern = self.inline_requires?;
        pattern.is_match(value).then(|| format!("require({})", quote(value)))
    }

    fn rewrite_literal_chunk(&mut self, text: &str) -> Option<String> {
        let pattern = self.inline_requires?;
        inline_chunk(text, pattern)
    }
}

fn require(path: &Path) -> String {
    format!("require({})", quote(&normalize_path_for_storage(path)))
}

fn is_token_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '(' | ')')
}

/// Rewrite matching tokens of a static chunk into module loads.
///
/// Returns the chunk as a JS concatenation such as
/// `"<img src=\"" + require("./a.png") + "\">"`, or `None` when no token
/// matches.
fn inline_chunk(text: &str, pattern: &Regex) -> Option<String> {
    let mut pieces = Vec::new();
    let mut literal_start = 0;
    let mut token_start = None;
    let mut matched = false;

    let mut flush_token = |start: usize, end: usize, literal_start: &mut usize, pieces: &mut Vec<String>| {
        let token = &text[start..end];
        if pattern.is_match(token) {
            if *literal_start < start {
                pieces.push(quote(&text[*literal_start..start]));
            }
            pieces.push(format!("require({})", quote(token)));
            *literal_start = end;
            matched = true;
        }
    };

    for (index, c) in text.char_indices() {
        if is_token_delimiter(c) {
            if let Some(start) = token_start.take() {
                flush_token(start, index, &mut literal_start, &mut pieces);
            }
        } else if token_start.is_none() {
            token_start = Some(index);
        }
    }
    if let Some(start) = token_start {
        flush_token(start, text.len(), &mut literal_start, &mut pieces);
    }

    if !matched {
        return None;
    }
    if literal_start < text.len() {
        pieces.push(quote(&text[literal_start..]));
    }
    Some(pieces.join(" + "))
}

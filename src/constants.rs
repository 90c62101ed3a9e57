//! Global constants used throughout the loader.
//!
//! Defaults for loader options, sentinels recognised in symbol names and the
//! file naming conventions of the on-disk cache live here so that the
//! resolver, the naming hook and the CLI agree on them.

/// Candidate partial extensions, tried in this order.
///
/// The trailing empty entry means "the reference as written, without an
/// added extension".
pub const DEFAULT_PARTIAL_EXTENSIONS: &[&str] = &[".handlebars", ".hbs", ""];

/// Prefix joined in front of logical names before they are handed to the
/// module resolver.
pub const DEFAULT_ROOT_RELATIVE: &str = "./";

/// Module request for the template runtime when no `runtime` option is given.
pub const DEFAULT_RUNTIME: &str = "handlebars/runtime";

/// Extension of helper modules picked up by the helper directory scan.
pub const DEFAULT_HELPER_EXTENSION: &str = "js";

/// Module directories stripped from resource paths when building the
/// diagnostic template identifier.
pub const DEFAULT_MODULE_DIRECTORIES: &[&str] = &["node_modules"];

/// Extensions tried by the filesystem module resolver for every candidate.
pub const DEFAULT_MODULE_EXTENSIONS: &[&str] = &["", ".js"];

/// Partial names starting with this character are provided by the runtime
/// (e.g. `@partial-block`) and never become dependencies.
pub const BUILTIN_PARTIAL_PREFIX: char = '@';

/// Symbol names starting with this character are module requests already;
/// the remainder is passed to the resolver untouched.
pub const DEPENDENCY_PREFIX: char = '$';

/// Suffix of cache entry files.
pub const CACHE_FILE_SUFFIX: &str = ".hbs.compiled";

/// Conventional template directory segment collapsed out of identifiers.
pub const TEMPLATE_DIR_SEGMENT: &str = "/tpl/";

/// Loader options file picked up from the working directory by the CLI.
pub const CONFIG_FILE_NAME: &str = "hbs-loader.toml";

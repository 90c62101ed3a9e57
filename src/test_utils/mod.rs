//! Test utilities for hbs-loader
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] to see loader traces while debugging a test
//! - [`TemplateProject`] for laying out templates, partials and helpers in a
//!   temporary directory
//! - [`CountingResolver`] for observing how often the loader probes the disk
//!
//! # Example
//!
//! ```rust,no_run
//! use hbs_loader::test_utils::TemplateProject;
//!
//! let project = TemplateProject::new()
//!     .unwrap()
//!     .with_file("views/page.hbs", "{{> header}}")
//!     .unwrap()
//!     .with_file("views/header.hbs", "<h1>Hi</h1>")
//!     .unwrap();
//! assert!(project.path("views/header.hbs").exists());
//! ```

pub mod fixtures;

pub use fixtures::{CountingResolver, TemplateProject};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; does nothing when neither
/// is set. Only the first call has an effect.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

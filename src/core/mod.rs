//! Core types shared by every part of the loader.
//!
//! Currently this is the error layer: [`LoaderError`] for fatal job outcomes and
//! [`ErrorContext`] / [`user_friendly_error`] for presenting them in the CLI.

pub mod error;

pub use error::{ErrorContext, LoaderError, user_friendly_error};

//! semdex-core
//!
//! Shared vocabulary for the semantic document search workspace: documents,
//! hits and results, the error taxonomy, the provider/source/index traits,
//! layered configuration and the text helpers used at load and query time.

pub mod config;
pub mod error;
pub mod source;
pub mod text;
pub mod traits;
pub mod types;

pub use error::{Error, Result};

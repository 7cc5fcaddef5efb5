//! Error types for ditalist operations.

use thiserror::Error;

/// Errors that abort a resolution run.
///
/// Only conditions affecting the root input are fatal; problems in referenced
/// files are reported as [`Diagnostic`](crate::resolve::Diagnostic) values on
/// the returned resolution instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("[DL012F] failed to parse root file {path}: {detail}")]
    RootParse { path: String, detail: String },

    #[error("[DL022F] root file {0} was entirely excluded by filtering")]
    RootFiltered(String),

    #[error("[DL034F] root file {0} is not a valid input document")]
    RootInvalid(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;

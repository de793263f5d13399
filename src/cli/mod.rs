//! CLI support for ssc-gen
//!
//! Provides programmatic access to the `sscgen` commands for embedding
//! in other tools.

mod check;
mod convert;

pub use check::{CheckReport, execute_check};
pub use convert::{AstOptions, JsonSchemaOptions, execute_ast, execute_json_schema};

use std::io;

use thiserror::Error;

use crate::error::{AssembleError, JsonInferError};
use crate::parser::ParseError;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Assemble(#[from] AssembleError),

    #[error("json inference failed: {0}")]
    JsonInfer(#[from] JsonInferError),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("no input provided. Pass a file or --input, or pipe it to stdin.")]
    NoInput,
}

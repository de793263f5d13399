//! Parse and statically check a declaration module

use super::CliError;
use crate::config::BuildOptions;
use crate::error::Warning;
use crate::parser::parse_module;

/// Result of a passing check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    /// Declared schemas, dependencies first
    pub schemas: Vec<String>,
    pub json_schemas: usize,
    pub warnings: Vec<Warning>,
}

/// Runs the full front half of the pipeline on `source`.
///
/// Diagnostics of every schema are reported together through
/// [`CliError::Assemble`].
pub fn execute_check(source: &str) -> Result<CheckReport, CliError> {
    let module = parse_module(source)?;
    let assembled = module.assemble(&BuildOptions::default())?;

    Ok(CheckReport {
        schemas: module.struct_order()?,
        json_schemas: module.json_schemas().len(),
        warnings: assembled.warnings,
    })
}

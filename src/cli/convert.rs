//! Declaration module → IR JSON, and sample JSON → `json` declarations

use super::CliError;
use crate::config::BuildOptions;
use crate::error::Warning;
use crate::json_struct::{infer_schemas, render_declarations};
use crate::output::{to_json, to_json_pretty};
use crate::parser::parse_module;

/// Options for the ast command
#[derive(Debug, Clone, Default)]
pub struct AstOptions {
    /// Declaration module source
    pub source: String,
    /// Pretty-print the output
    pub pretty: bool,
    pub build: BuildOptions,
}

/// Returns the serialized `ModuleProgram` and the warnings raised on the way
pub fn execute_ast(options: &AstOptions) -> Result<(String, Vec<Warning>), CliError> {
    let module = parse_module(&options.source)?;
    let assembled = module.assemble(&options.build)?;

    let json = if options.pretty {
        to_json_pretty(&assembled.program)?
    } else {
        to_json(&assembled.program)?
    };
    Ok((json, assembled.warnings))
}

/// Options for the json-schema command
#[derive(Debug, Clone)]
pub struct JsonSchemaOptions {
    /// Sample JSON document
    pub input: Option<String>,
    /// Name of the entry schema
    pub name: String,
    /// Dotted path to the object to describe
    pub start: String,
}

impl Default for JsonSchemaOptions {
    fn default() -> Self {
        JsonSchemaOptions {
            input: None,
            name: "Main".to_string(),
            start: String::new(),
        }
    }
}

pub fn execute_json_schema(options: &JsonSchemaOptions) -> Result<String, CliError> {
    let input = options.input.as_deref().ok_or(CliError::NoInput)?;
    let schemas = infer_schemas(input, &options.name, &options.start)?;
    Ok(render_declarations(&schemas))
}

//! JSON serialization of the module IR for out-of-process emitters.
//!
//! Every node is tagged with a `kind` field in SCREAMING_SNAKE_CASE and
//! object keys keep declaration order, so the output is stable across runs.
//!
//! # Examples
//!
//! ```
//! use ssc_gen::ast::ModuleProgram;
//! use ssc_gen::output::{to_json, to_json_pretty};
//!
//! let program = ModuleProgram::default();
//! assert_eq!(to_json(&program).unwrap(), r#"{"body":[]}"#);
//! assert_eq!(to_json_pretty(&program).unwrap(), "{\n  \"body\": []\n}");
//! ```

use crate::ast::ModuleProgram;

/// Compact, single-line JSON
pub fn to_json(program: &ModuleProgram) -> Result<String, serde_json::Error> {
    serde_json::to_string(program)
}

/// Two-space indented JSON
pub fn to_json_pretty(program: &ModuleProgram) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(program)
}

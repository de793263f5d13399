pub mod ast;
pub mod builder;
pub mod checker;
pub mod config;
pub mod document;
pub mod error;
pub mod json_struct;
pub mod lexer;
pub mod module;
pub mod output;
pub mod parser;
pub mod pattern;
pub mod pseudo;
pub mod schema;
pub mod selector;
pub mod signature;
pub mod transform;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Expr, ExpressionChain, ModuleProgram, StructType, Token, VariableType};
pub use config::BuildOptions;
pub use document::{D, F, FE, N, R};
pub use error::{AssembleError, BuildError, CheckError, CheckFailure, Warning};
pub use lexer::{LexError, Lexer, Position};
pub use module::{Assembled, Module};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser, parse_module};
pub use schema::Schema;
pub use value::Literal;

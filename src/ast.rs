//! # Schema IR - Abstract Syntax Tree
//!
//! This module defines the typed intermediate representation produced from
//! schema declarations and consumed by code emitters.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Variable types, schema kinds, reserved hooks and the
//!   declaration-language tokens
//! - **[expressions]** - Expression nodes, variable slots and chains
//! - **[filters]** - Predicate trees embedded by `FILTER` and `DOCUMENT_FILTER`
//! - **[nodes]** - Module-level IR (structs, functions, typedefs, imports)
//!
//! ## Quick Start
//!
//! ```text
//! schema Main: item {
//!     title = D().css("title::text")
//! }
//! ```
//!
//! This declaration lowers to one `StructParser` of kind `ITEM` holding a
//! `title` field whose body is `[CSS("title"), TEXT, RETURN]`.
//!
//! ## Core Concepts
//!
//! ### Type-state
//!
//! Every expression carries an accept type and a return type. A chain is
//! well-typed when each node accepts what the previous one returned:
//!
//! ```text
//! DOCUMENT --css--> DOCUMENT --text--> STRING --to_int--> INT
//! ```
//!
//! ### Defaults
//!
//! A leading `DEFAULT` is not part of the data flow. Lowering moves it into
//! a [`nodes::DefaultValueWrapper`] and numbers the remaining nodes from 0.
//!
//! ### Cross-schema references
//!
//! `NESTED` nodes name another schema. The module assembler orders schemas
//! so that dependencies come first and replaces names with
//! [`nodes::StructId`] arena indices.
//!
//! ## Examples
//!
//! ### List schema
//!
//! ```text
//! schema Books: list {
//!     __SPLIT_DOC__ = D().css_all(".card")
//!     name = D().css("h2").text()
//! }
//! ```
//!
//! ### Dict schema
//!
//! ```text
//! schema Meta: dict {
//!     __SPLIT_DOC__ = D().css_all("meta")
//!     __KEY__ = D().attr("name")
//!     __VALUE__ = D().attr("content")
//! }
//! ```
pub mod tokens;
pub mod expressions;
pub mod filters;
pub mod nodes;

pub use tokens::{Hook, StructType, Token, VariableType, EXCLUDE_SIGNATURE_MEMBER, SIGNATURE_MEMBER};
pub use expressions::{Expr, Expression, ExpressionChain, Variable};
pub use filters::{ElementPredicate, FilterPredicate, LenOp};
pub use nodes::{
    DefaultValueWrapper, HookFunction, ImportTag, JsonStruct, JsonStructField, ModuleImports,
    ModuleNode, ModuleProgram, StartParseFunction, StructFieldFunction, StructId, StructInit,
    StructMember, StructParser, TypeDef, TypeDefField, TypeRef, TypeShape,
};

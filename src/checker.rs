//! Static checks over linearised schemas.
//!
//! Every chain is re-verified even though the builder already checks as it
//! goes: chains can be assembled by hand from [`Expression`]s, and schema
//! level rules (hooks, field terminals) only make sense once inheritance is
//! resolved. Errors are aggregated per module; warnings never block.

use tracing::{debug, warn};

use crate::ast::{ElementPredicate, Expr, Expression, ExpressionChain, Hook, StructType, VariableType};
use crate::error::{AssembleError, BuildError, CheckError, CheckErrorKind, CheckFailure, Warning, WarningKind};
use crate::pattern;
use crate::schema::{Resolved, SchemaRegistry};
use crate::selector;
use crate::value::Literal;

/// Outcome of checking one or more schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub errors: Vec<CheckError>,
    pub warnings: Vec<Warning>,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: Report) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Warnings on success, every diagnostic otherwise
    pub fn into_result(self) -> Result<Vec<Warning>, CheckFailure> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(CheckFailure {
                errors: self.errors,
            })
        }
    }
}

/// Checks every registered schema in declaration order.
pub fn check(registry: &SchemaRegistry) -> Result<Report, AssembleError> {
    let mut report = Report::default();
    for name in registry.names() {
        report.merge(check_schema(registry, name)?);
    }
    Ok(report)
}

/// Checks one schema after linearising it.
///
/// Fails only when the schema or one of its parents is unknown; check
/// failures are collected in the report.
pub fn check_schema(registry: &SchemaRegistry, name: &str) -> Result<Report, AssembleError> {
    let schema = registry.resolve(name, name)?;
    let resolved = registry.linearise(name)?;
    let mut checker = SchemaChecker {
        registry,
        name,
        kind: schema.kind,
        report: Report::default(),
    };
    checker.run(&resolved);
    debug!(
        schema = name,
        errors = checker.report.errors.len(),
        warnings = checker.report.warnings.len(),
        "schema checked"
    );
    Ok(checker.report)
}

struct SchemaChecker<'a> {
    registry: &'a SchemaRegistry,
    name: &'a str,
    kind: StructType,
    report: Report,
}

impl SchemaChecker<'_> {
    fn error(&mut self, error: CheckError) {
        self.report.errors.push(error);
    }

    fn warning(&mut self, kind: WarningKind, field: Option<&str>, message: String) {
        let warning = Warning::new(kind, self.name, field, message);
        warn!("{}", warning);
        self.report.warnings.push(warning);
    }

    fn run(&mut self, resolved: &Resolved) {
        for hook in self.kind.required_hooks() {
            if resolved.hook(*hook).is_none() {
                self.error(
                    CheckError::new(
                        CheckErrorKind::HookMissing,
                        self.name,
                        format!("{} schema requires {}", self.kind, hook),
                    )
                    .field(hook.name()),
                );
            }
        }

        for (hook, chain) in resolved.hooks() {
            if !self.kind.allows_hook(hook) {
                self.warning(
                    WarningKind::UnusedHook,
                    Some(hook.name()),
                    format!("{} is not used by {} schemas and is skipped", hook, self.kind),
                );
                continue;
            }
            let errors = check_chain(self.name, hook.name(), chain);
            let clean = errors.is_empty();
            self.report.errors.extend(errors);
            if clean {
                self.check_hook(hook, chain);
            }
            self.check_chain_warnings(hook.name(), chain);
        }

        for (field, chain) in resolved.named() {
            if !self.kind.has_named_fields() {
                self.error(
                    CheckError::new(
                        CheckErrorKind::UnexpectedField,
                        self.name,
                        format!("{} schemas only take reserved hooks", self.kind),
                    )
                    .field(field)
                    .tip("move the field into a nested item schema"),
                );
                continue;
            }
            let errors = check_chain(self.name, field, chain);
            let clean = errors.is_empty();
            self.report.errors.extend(errors);
            if clean {
                self.check_field(field, chain);
            }
            self.check_chain_warnings(field, chain);
        }

        if let Some(excluded) = &resolved.exclude_signature {
            for name in excluded {
                if !resolved.fields.contains_key(name) {
                    self.warning(
                        WarningKind::UnmatchedExcludeSignature,
                        None,
                        format!("__EXCLUDE_SIGNATURE__ names '{}', which is not a field", name),
                    );
                }
            }
        }
    }

    fn check_hook(&mut self, hook: Hook, chain: &ExpressionChain) {
        let ret = chain.cursor();
        if hook.forbids_default() && chain.has_default() {
            self.error(
                CheckError::new(
                    CheckErrorKind::DefaultMisplaced,
                    self.name,
                    format!("{} cannot have a default", hook),
                )
                .field(hook.name())
                .at(0),
            );
        }

        let expected = match hook {
            Hook::PreValidate => return,
            Hook::SplitDoc if ret != VariableType::ListDocument => Some("LIST_DOCUMENT"),
            Hook::Key if ret != VariableType::String => Some("STRING"),
            Hook::Value | Hook::Item
                if matches!(ret, VariableType::Document | VariableType::ListDocument) =>
            {
                Some("a scalar, list, nested or json type")
            }
            _ => None,
        };
        if let Some(expected) = expected {
            let mut error = CheckError::new(
                CheckErrorKind::HookReturnType,
                self.name,
                format!("{} returns the wrong type", hook),
            )
            .field(hook.name())
            .types(expected, ret.name());
            if matches!(ret, VariableType::Document | VariableType::ListDocument) && hook != Hook::SplitDoc {
                error = error.tip("extract text/attribute after selector");
            }
            self.error(error);
            return;
        }

        if hook == Hook::Key && chain.default_value().is_some_and(Literal::is_null) {
            self.error(
                CheckError::new(
                    CheckErrorKind::DefaultTypeMismatch,
                    self.name,
                    "__KEY__ default must be a string",
                )
                .field(hook.name())
                .at(0)
                .types("str", "null"),
            );
            return;
        }
        if !hook.forbids_default() {
            self.check_default(hook.name(), chain);
        }
    }

    fn check_field(&mut self, field: &str, chain: &ExpressionChain) {
        let ret = chain.cursor();
        if self.kind == StructType::AccUniqueList && ret != VariableType::ListString {
            self.error(
                CheckError::new(
                    CheckErrorKind::InvalidFieldType,
                    self.name,
                    "accumulating schemas only collect lists of strings",
                )
                .field(field)
                .types("LIST_STRING", ret.name()),
            );
            return;
        }
        if !ret.is_field_terminal() {
            let mut error = CheckError::new(
                CheckErrorKind::InvalidFieldType,
                self.name,
                format!("field cannot return {}", ret),
            )
            .field(field)
            .types("STRING, INT, FLOAT, BOOL, a list of them, NESTED, JSON or ANY", ret.name());
            if matches!(ret, VariableType::Document | VariableType::ListDocument) {
                error = error.tip("extract text/attribute after selector, or use sub_parser()");
            }
            self.error(error);
            return;
        }
        self.check_default(field, chain);
    }

    /// Default literal against the chain's terminal type
    fn check_default(&mut self, field: &str, chain: &ExpressionChain) {
        let Some(value) = chain.default_value() else {
            return;
        };
        let ret = chain.cursor();
        if matches!(ret, VariableType::Json | VariableType::Any) {
            let method = chain.exprs().last().map_or("jsonify", |e| e.expr.method_name());
            self.error(
                CheckError::new(
                    CheckErrorKind::JsonifyWithDefault,
                    self.name,
                    format!("{}() cannot be combined with default()", method),
                )
                .field(field)
                .at(0),
            );
            return;
        }
        if default_fits(value, ret) {
            return;
        }
        self.error(
            CheckError::new(
                CheckErrorKind::DefaultTypeMismatch,
                self.name,
                format!("default {} does not fit the chain result", value),
            )
            .field(field)
            .at(0)
            .types(ret.name(), value.type_name()),
        );
    }

    fn check_chain_warnings(&mut self, field: &str, chain: &ExpressionChain) {
        if chain.has_default() && chain.iter().any(|e| e.expr.is_assertion()) {
            self.warning(
                WarningKind::DefaultWithAssertion,
                Some(field),
                "default() swallows the assertion failures of this chain".to_string(),
            );
        }

        let Some(child) = chain.nested_ref() else {
            return;
        };
        let Some(last_query) = chain
            .iter()
            .rev()
            .find(|e| matches!(e.expr, Expr::Css { .. } | Expr::Xpath { .. }))
            .and_then(|e| e.expr.query())
        else {
            return;
        };
        let Ok(resolved) = self.registry.linearise(child) else {
            return;
        };
        let split_query = resolved
            .hook(Hook::SplitDoc)
            .and_then(|c| c.iter().next())
            .and_then(|e| e.expr.query());
        if split_query == Some(last_query) {
            self.warning(
                WarningKind::UnreachableNested,
                Some(field),
                format!(
                    "'{}' selects '{}' and {} splits on the same query inside it; the split finds nothing",
                    field, last_query, child
                ),
            );
        }
    }
}

fn default_fits(value: &Literal, ret: VariableType) -> bool {
    match value {
        Literal::Null => !matches!(
            ret,
            VariableType::Document | VariableType::ListDocument | VariableType::Bool
        ),
        Literal::List(items) => items.is_empty() && ret.is_list() && ret != VariableType::ListDocument,
        other => other.variable_type() == Some(ret),
    }
}

fn from_build_error(schema: &str, field: &str, position: usize, error: BuildError) -> CheckError {
    let kind = match &error {
        BuildError::SelectorSyntax { .. } => CheckErrorKind::SelectorSyntax,
        BuildError::RegexSyntax { .. } => CheckErrorKind::RegexSyntax,
        BuildError::FormatTemplateMissingSlot { .. } => CheckErrorKind::FormatTemplateMissingSlot,
        BuildError::TypeMismatch { .. } => CheckErrorKind::TypeMismatch,
        BuildError::DefaultMisplaced { .. } => CheckErrorKind::DefaultMisplaced,
        BuildError::InvalidArgument { .. } => CheckErrorKind::TypeMismatch,
    };
    let mut check = CheckError::new(kind, schema, error.to_string())
        .field(field)
        .at(position);
    if let BuildError::SelectorSyntax { hint: Some(hint), .. } = error {
        check = check.tip(hint);
    }
    check
}

/// Per-chain checks: emptiness, default placement, type-state, templates,
/// regex patterns and selector queries.
pub fn check_chain(schema: &str, field: &str, chain: &ExpressionChain) -> Vec<CheckError> {
    let mut errors = Vec::new();
    if chain.is_empty() {
        errors.push(CheckError::new(CheckErrorKind::EmptyChain, schema, "chain has no expressions").field(field));
        return errors;
    }

    let mut state = VariableType::Document;
    let mut nested_at = None;
    for (position, expression) in chain.iter().enumerate() {
        if let Some(at) = nested_at {
            errors.push(
                CheckError::new(
                    CheckErrorKind::NestedNotLast,
                    schema,
                    format!(
                        "{}() follows sub_parser() at {}; sub_parser() must end the chain",
                        expression.expr.method_name(),
                        at
                    ),
                )
                .field(field)
                .at(position),
            );
        }
        if matches!(expression.expr, Expr::Nested { .. }) {
            nested_at = Some(position);
        }

        if expression.is_default() {
            if position != 0 {
                errors.push(
                    CheckError::new(
                        CheckErrorKind::DefaultMisplaced,
                        schema,
                        "default() must be the first expression, and appear once",
                    )
                    .field(field)
                    .at(position),
                );
            }
            continue;
        }

        let untyped_input = state == VariableType::Any && expression.accept_type != VariableType::Any;
        if untyped_input || !expression.accept_type.accepts(state) {
            errors.push(
                CheckError::new(
                    CheckErrorKind::TypeMismatch,
                    schema,
                    format!("{}() does not accept the previous result", expression.expr.method_name()),
                )
                .field(field)
                .at(position)
                .types(expression.accept_type.name(), state.name()),
            );
        }
        state = expression.ret_type;

        if let Err(error) = check_arguments(expression) {
            errors.push(from_build_error(schema, field, position, error));
        }
    }
    errors
}

fn check_arguments(expression: &Expression) -> Result<(), BuildError> {
    let expr = &expression.expr;
    if let Expr::Format { template } = expr
        && !template.contains("{{}}")
    {
        return Err(BuildError::FormatTemplateMissingSlot {
            template: template.clone(),
        });
    }

    match expr {
        Expr::Regex {
            pattern,
            group,
            ignore_case,
            dotall,
        } => {
            let re = pattern::compile(pattern, *ignore_case, *dotall)?;
            pattern::check_group(pattern, pattern::capture_groups(&re), *group)?;
        }
        Expr::RegexAll {
            pattern,
            ignore_case,
            dotall,
        } => {
            let re = pattern::compile(pattern, *ignore_case, *dotall)?;
            pattern::check_findall(pattern, pattern::capture_groups(&re))?;
        }
        other => {
            for p in other.patterns() {
                pattern::compile(p, false, false)?;
            }
        }
    }

    if let Some(query) = expr.query() {
        if expr.is_css() {
            selector::validate_css(query)?;
        } else {
            selector::validate_xpath(query)?;
        }
    }
    if let Expr::DocumentFilter { predicate } = expr {
        for leaf in predicate.selectors() {
            match leaf {
                ElementPredicate::Css { query } => selector::validate_css(query)?,
                ElementPredicate::Xpath { query } => selector::validate_xpath(query)?,
                _ => {}
            }
        }
    }
    Ok(())
}

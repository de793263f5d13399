//! CSS ↔ XPath rewriting over expression chains.
//!
//! Kinds map one to one (`CSS` ↔ `XPATH`, `CSS_ALL` ↔ `XPATH_ALL`,
//! `CSS_REMOVE` ↔ `XPATH_REMOVE`, `IS_CSS` ↔ `IS_XPATH`) and accept/return
//! types are untouched, so a round trip keeps the chain's shape even when
//! the query text changes. Selector leaves inside `DOCUMENT_FILTER`
//! predicates are rewritten the same way.

use tracing::{debug, warn};

use crate::ast::{ElementPredicate, Expr, ExpressionChain};
use crate::config::BuildOptions;
use crate::error::BuildError;
use crate::schema::SchemaRegistry;
use crate::selector::{css_to_xpath, validate_css, validate_xpath, xpath_to_css};

/// Direction of the query rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    CssToXpath { prefix: String },
    XpathToCss,
}

impl Conversion {
    /// Requested rewrite, if any. Options are expected to be validated.
    pub fn from_options(options: &BuildOptions) -> Option<Conversion> {
        if options.css_to_xpath {
            Some(Conversion::CssToXpath {
                prefix: options.xpath_prefix.clone(),
            })
        } else if options.xpath_to_css {
            Some(Conversion::XpathToCss)
        } else {
            None
        }
    }
}

/// Rewrites one node; `Ok(None)` when the node is not affected.
pub fn convert_expr(expr: &Expr, conversion: &Conversion) -> Result<Option<Expr>, BuildError> {
    let converted = match conversion {
        Conversion::CssToXpath { prefix } => {
            let to_xpath = |query: &str| -> Result<String, BuildError> {
                let xpath = css_to_xpath(query, prefix)?;
                validate_xpath(&xpath)?;
                Ok(xpath)
            };
            match expr {
                Expr::Css { query } => Expr::Xpath {
                    query: to_xpath(query)?,
                },
                Expr::CssAll { query } => Expr::XpathAll {
                    query: to_xpath(query)?,
                },
                Expr::CssRemove { query } => Expr::XpathRemove {
                    query: to_xpath(query)?,
                },
                Expr::IsCss { query, msg } => Expr::IsXpath {
                    query: to_xpath(query)?,
                    msg: msg.clone(),
                },
                Expr::DocumentFilter { predicate }
                    if predicate.selectors().iter().any(|p| matches!(p, ElementPredicate::Css { .. })) =>
                {
                    let predicate = predicate.map_selectors(
                        &mut |leaf: &ElementPredicate| -> Result<ElementPredicate, BuildError> {
                            match leaf {
                                ElementPredicate::Css { query } => Ok(ElementPredicate::Xpath {
                                    query: to_xpath(query)?,
                                }),
                                other => Ok(other.clone()),
                            }
                        },
                    )?;
                    Expr::DocumentFilter { predicate }
                }
                _ => return Ok(None),
            }
        }
        Conversion::XpathToCss => {
            let to_css = |query: &str| -> Result<String, BuildError> {
                let css = xpath_to_css(query)?;
                validate_css(&css)?;
                Ok(css)
            };
            match expr {
                Expr::Xpath { query } => Expr::Css {
                    query: to_css(query)?,
                },
                Expr::XpathAll { query } => Expr::CssAll {
                    query: to_css(query)?,
                },
                Expr::XpathRemove { query } => Expr::CssRemove {
                    query: to_css(query)?,
                },
                Expr::IsXpath { query, msg } => Expr::IsCss {
                    query: to_css(query)?,
                    msg: msg.clone(),
                },
                Expr::DocumentFilter { predicate }
                    if predicate.selectors().iter().any(|p| matches!(p, ElementPredicate::Xpath { .. })) =>
                {
                    let predicate = predicate.map_selectors(
                        &mut |leaf: &ElementPredicate| -> Result<ElementPredicate, BuildError> {
                            match leaf {
                                ElementPredicate::Xpath { query } => Ok(ElementPredicate::Css {
                                    query: to_css(query)?,
                                }),
                                other => Ok(other.clone()),
                            }
                        },
                    )?;
                    Expr::DocumentFilter { predicate }
                }
                _ => return Ok(None),
            }
        }
    };
    Ok(Some(converted))
}

/// Rewrites every query of the chain, failing on the first query the
/// converter cannot handle.
pub fn convert_chain(chain: &ExpressionChain, conversion: &Conversion) -> Result<ExpressionChain, BuildError> {
    let mut out = chain.clone();
    for expression in out.exprs_mut() {
        if let Some(expr) = convert_expr(&expression.expr, conversion)? {
            expression.expr = expr;
        }
    }
    Ok(out)
}

/// ```
/// use ssc_gen::document::D;
/// use ssc_gen::transform::convert_css_to_xpath;
///
/// let chain = D().css("ul > li::text").unwrap().into_chain();
/// let xpath = convert_css_to_xpath(&chain, "descendant-or-self::").unwrap();
/// assert_eq!(xpath.kinds(), ["XPATH", "TEXT"]);
/// ```
pub fn convert_css_to_xpath(chain: &ExpressionChain, prefix: &str) -> Result<ExpressionChain, BuildError> {
    convert_chain(
        chain,
        &Conversion::CssToXpath {
            prefix: prefix.to_string(),
        },
    )
}

pub fn convert_xpath_to_css(chain: &ExpressionChain) -> Result<ExpressionChain, BuildError> {
    convert_chain(chain, &Conversion::XpathToCss)
}

/// Applies the rewrite to every chain of every schema, hooks included.
///
/// Best effort: a query the converter cannot translate, or whose
/// translation does not validate, is kept as written and logged. Returns
/// the number of rewritten nodes.
pub fn convert_registry(registry: &mut SchemaRegistry, conversion: &Conversion) -> usize {
    let mut rewritten = 0;
    for schema in registry.iter_mut() {
        let schema_name = schema.name.clone();
        for (field, chain) in schema.chains_mut() {
            for (position, expression) in chain.exprs_mut().iter_mut().enumerate() {
                match convert_expr(&expression.expr, conversion) {
                    Ok(Some(expr)) => {
                        debug!(
                            schema = %schema_name,
                            field,
                            position,
                            from = expression.expr.query().unwrap_or_default(),
                            to = expr.query().unwrap_or_default(),
                            "query rewritten"
                        );
                        expression.expr = expr;
                        rewritten += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("{}.{}[{}]: query kept as written: {}", schema_name, field, position, e);
                    }
                }
            }
        }
    }
    rewritten
}

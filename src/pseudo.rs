//! Pseudo-selector suffixes.
//!
//! A query may end with an extraction suffix that is not part of the
//! selector language:
//!
//! ```text
//! CSS:    a::text    a::raw    a::attr(href, src)
//! XPath:  //a/text() //a/raw() //a/@href
//! ```
//!
//! The suffix is cut off before the query reaches a validator and becomes a
//! separate extraction expression.

use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoAction {
    Text,
    Raw,
    Attr(Vec<String>),
}

/// Query with its trailing pseudo-selector removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitQuery {
    pub query: String,
    pub action: Option<PseudoAction>,
}

impl SplitQuery {
    fn plain(query: &str) -> Self {
        SplitQuery {
            query: query.to_string(),
            action: None,
        }
    }

    fn with(query: &str, action: PseudoAction) -> Self {
        SplitQuery {
            query: query.trim_end().to_string(),
            action: Some(action),
        }
    }
}

pub fn split_css(query: &str) -> Result<SplitQuery, BuildError> {
    let query = query.trim();

    if let Some(rest) = query.strip_suffix("::text") {
        return Ok(SplitQuery::with(rest, PseudoAction::Text));
    }
    if let Some(rest) = query.strip_suffix("::raw") {
        return Ok(SplitQuery::with(rest, PseudoAction::Raw));
    }
    if query.ends_with(')')
        && let Some(start) = query.rfind("::attr(")
    {
        let args = &query[start + "::attr(".len()..query.len() - 1];
        let keys: Vec<String> = args
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if keys.is_empty() {
            return Err(BuildError::InvalidArgument {
                method: "css",
                message: format!("'{}' has an empty ::attr() list", query),
            });
        }
        return Ok(SplitQuery::with(&query[..start], PseudoAction::Attr(keys)));
    }
    Ok(SplitQuery::plain(query))
}

pub fn split_xpath(query: &str) -> SplitQuery {
    let query = query.trim();

    if let Some(rest) = query.strip_suffix("/text()") {
        return SplitQuery::with(rest, PseudoAction::Text);
    }
    if let Some(rest) = query.strip_suffix("/raw()") {
        return SplitQuery::with(rest, PseudoAction::Raw);
    }
    if let Some(start) = query.rfind("/@") {
        let name = &query[start + 2..];
        let is_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == ':' || c == '-');
        if is_name {
            return SplitQuery::with(
                &query[..start],
                PseudoAction::Attr(vec![name.to_string()]),
            );
        }
    }
    SplitQuery::plain(query)
}

/// Rejects queries carrying any pseudo-selector (`css_remove`, `is_css`, ...)
pub fn reject_css(method: &'static str, query: &str) -> Result<(), BuildError> {
    if split_css(query)?.action.is_some() {
        return Err(BuildError::InvalidArgument {
            method,
            message: format!("pseudo-selectors are not allowed here: '{}'", query),
        });
    }
    Ok(())
}

pub fn reject_xpath(method: &'static str, query: &str) -> Result<(), BuildError> {
    if split_xpath(query).action.is_some() {
        return Err(BuildError::InvalidArgument {
            method,
            message: format!("pseudo-selectors are not allowed here: '{}'", query),
        });
    }
    Ok(())
}

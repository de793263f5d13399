use std::fmt;

use serde::Serialize;

/// Comparison used by [`FilterPredicate::LenCmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LenOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for LenOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            LenOp::Eq => "==",
            LenOp::Ne => "!=",
            LenOp::Lt => "<",
            LenOp::Le => "<=",
            LenOp::Gt => ">",
            LenOp::Ge => ">=",
        };
        f.write_str(op)
    }
}

/// Predicate over a single string, embedded by `FILTER`.
///
/// Each variant accepts one `STRING` and yields `BOOL`; emitters render the
/// tree in the target language. Variadic value lists are disjunctions: `Eq`
/// with `["a", "b"]` holds when the value equals either.
///
/// # Examples
///
/// ```text
/// F().starts("http").len_gt(10)
/// → And(Starts(["http"]), LenCmp(Gt, 10))
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterPredicate {
    Eq {
        values: Vec<String>,
    },
    Neq {
        values: Vec<String>,
    },
    Contains {
        values: Vec<String>,
    },
    Starts {
        values: Vec<String>,
    },
    Ends {
        values: Vec<String>,
    },
    Regex {
        pattern: String,
        ignore_case: bool,
    },
    LenCmp {
        cmp: LenOp,
        len: usize,
    },
    And {
        left: Box<FilterPredicate>,
        right: Box<FilterPredicate>,
    },
    Or {
        left: Box<FilterPredicate>,
        right: Box<FilterPredicate>,
    },
    Not {
        operand: Box<FilterPredicate>,
    },
}

impl FilterPredicate {
    pub fn and(self, other: FilterPredicate) -> FilterPredicate {
        FilterPredicate::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: FilterPredicate) -> FilterPredicate {
        FilterPredicate::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn negate(self) -> FilterPredicate {
        FilterPredicate::Not {
            operand: Box::new(self),
        }
    }

    /// Regex patterns used anywhere in the tree, in visiting order.
    pub fn patterns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterPredicate::Regex { pattern, .. } => out.push(pattern),
            FilterPredicate::And { left, right } | FilterPredicate::Or { left, right } => {
                left.collect_patterns(out);
                right.collect_patterns(out);
            }
            FilterPredicate::Not { operand } => operand.collect_patterns(out),
            _ => {}
        }
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPredicate::Eq { values } => write!(f, "eq({:?})", values),
            FilterPredicate::Neq { values } => write!(f, "ne({:?})", values),
            FilterPredicate::Contains { values } => write!(f, "contains({:?})", values),
            FilterPredicate::Starts { values } => write!(f, "starts({:?})", values),
            FilterPredicate::Ends { values } => write!(f, "ends({:?})", values),
            FilterPredicate::Regex { pattern, .. } => write!(f, "re({:?})", pattern),
            FilterPredicate::LenCmp { cmp, len } => write!(f, "len {} {}", cmp, len),
            FilterPredicate::And { left, right } => write!(f, "({} & {})", left, right),
            FilterPredicate::Or { left, right } => write!(f, "({} | {})", left, right),
            FilterPredicate::Not { operand } => write!(f, "!{}", operand),
        }
    }
}

/// Predicate over a single element, embedded by `DOCUMENT_FILTER`.
///
/// Each variant accepts one `DOCUMENT` and yields `BOOL`. `Css`/`Xpath`
/// hold when the element has a match for the query; the text and raw
/// variants look at the element's text and outer HTML. Value lists are
/// disjunctions, as in [`FilterPredicate`].
///
/// # Examples
///
/// ```text
/// FE().css("a").attr_starts("href", "https")
/// → And(And(Css("a"), HasAttr(["href"])), AttrStarts(href, ["https"]))
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementPredicate {
    Css {
        query: String,
    },
    Xpath {
        query: String,
    },
    HasText {
        values: Vec<String>,
    },
    HasRaw {
        values: Vec<String>,
    },
    TextRegex {
        pattern: String,
        ignore_case: bool,
    },
    RawRegex {
        pattern: String,
        ignore_case: bool,
    },
    HasAttr {
        keys: Vec<String>,
    },
    AttrEq {
        key: String,
        values: Vec<String>,
    },
    AttrContains {
        key: String,
        values: Vec<String>,
    },
    AttrStarts {
        key: String,
        values: Vec<String>,
    },
    AttrEnds {
        key: String,
        values: Vec<String>,
    },
    AttrRegex {
        key: String,
        pattern: String,
        ignore_case: bool,
    },
    And {
        left: Box<ElementPredicate>,
        right: Box<ElementPredicate>,
    },
    Or {
        left: Box<ElementPredicate>,
        right: Box<ElementPredicate>,
    },
    Not {
        operand: Box<ElementPredicate>,
    },
}

impl ElementPredicate {
    pub fn and(self, other: ElementPredicate) -> ElementPredicate {
        ElementPredicate::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: ElementPredicate) -> ElementPredicate {
        ElementPredicate::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn negate(self) -> ElementPredicate {
        ElementPredicate::Not {
            operand: Box::new(self),
        }
    }

    /// Whether the conjunction already guarantees attribute `key` exists.
    pub fn requires_attr(&self, key: &str) -> bool {
        match self {
            ElementPredicate::HasAttr { keys } => keys.len() == 1 && keys[0] == key,
            ElementPredicate::And { left, right } => {
                left.requires_attr(key) || right.requires_attr(key)
            }
            _ => false,
        }
    }

    pub fn patterns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |p| match p {
            ElementPredicate::TextRegex { pattern, .. }
            | ElementPredicate::RawRegex { pattern, .. }
            | ElementPredicate::AttrRegex { pattern, .. } => out.push(pattern.as_str()),
            _ => {}
        });
        out
    }

    /// `Css` and `Xpath` leaves, in visiting order.
    pub fn selectors(&self) -> Vec<&ElementPredicate> {
        let mut out = Vec::new();
        self.visit(&mut |p| {
            if matches!(p, ElementPredicate::Css { .. } | ElementPredicate::Xpath { .. }) {
                out.push(p);
            }
        });
        out
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ElementPredicate)) {
        match self {
            ElementPredicate::And { left, right } | ElementPredicate::Or { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            ElementPredicate::Not { operand } => operand.visit(f),
            leaf => f(leaf),
        }
    }

    /// Rebuilds the tree with every selector leaf passed through `convert`.
    pub fn map_selectors<E>(
        &self,
        convert: &mut impl FnMut(&ElementPredicate) -> Result<ElementPredicate, E>,
    ) -> Result<ElementPredicate, E> {
        Ok(match self {
            ElementPredicate::And { left, right } => {
                left.map_selectors(convert)?.and(right.map_selectors(convert)?)
            }
            ElementPredicate::Or { left, right } => {
                left.map_selectors(convert)?.or(right.map_selectors(convert)?)
            }
            ElementPredicate::Not { operand } => operand.map_selectors(convert)?.negate(),
            ElementPredicate::Css { .. } | ElementPredicate::Xpath { .. } => convert(self)?,
            leaf => leaf.clone(),
        })
    }
}

impl fmt::Display for ElementPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementPredicate::Css { query } => write!(f, "css({:?})", query),
            ElementPredicate::Xpath { query } => write!(f, "xpath({:?})", query),
            ElementPredicate::HasText { values } => write!(f, "has_text({:?})", values),
            ElementPredicate::HasRaw { values } => write!(f, "has_raw({:?})", values),
            ElementPredicate::TextRegex { pattern, .. } => write!(f, "re_text({:?})", pattern),
            ElementPredicate::RawRegex { pattern, .. } => write!(f, "re_raw({:?})", pattern),
            ElementPredicate::HasAttr { keys } => write!(f, "has_attr({:?})", keys),
            ElementPredicate::AttrEq { key, values } => write!(f, "attr_eq({:?}, {:?})", key, values),
            ElementPredicate::AttrContains { key, values } => {
                write!(f, "attr_contains({:?}, {:?})", key, values)
            }
            ElementPredicate::AttrStarts { key, values } => {
                write!(f, "attr_starts({:?}, {:?})", key, values)
            }
            ElementPredicate::AttrEnds { key, values } => {
                write!(f, "attr_ends({:?}, {:?})", key, values)
            }
            ElementPredicate::AttrRegex { key, pattern, .. } => {
                write!(f, "attr_re({:?}, {:?})", key, pattern)
            }
            ElementPredicate::And { left, right } => write!(f, "({} & {})", left, right),
            ElementPredicate::Or { left, right } => write!(f, "({} | {})", left, right),
            ElementPredicate::Not { operand } => write!(f, "!{}", operand),
        }
    }
}

//! Selector validation and the CSS/XPath bridge.
//!
//! CSS is validated with `scraper`'s selector parser, XPath with the
//! grammar checker in [`xpath`]. The converters are best-effort: they
//! cover the selectors schemas use in practice (type, class, id, attribute
//! and structural pseudo-classes) and report anything else as unsupported.

pub mod xpath;

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::Selector;

use crate::error::BuildError;

pub const DEFAULT_XPATH_PREFIX: &str = "descendant-or-self::";

fn css_error(query: &str, message: String, hint: Option<&str>) -> BuildError {
    BuildError::SelectorSyntax {
        dialect: "CSS",
        query: query.to_string(),
        message,
        hint: hint.map(str::to_string),
    }
}

fn xpath_error(query: &str, message: String, hint: Option<&str>) -> BuildError {
    BuildError::SelectorSyntax {
        dialect: "XPath",
        query: query.to_string(),
        message,
        hint: hint.map(str::to_string),
    }
}

/// Pseudo-classes that only mean something in a live browser. `scraper`
/// has no notion of them, but they are valid CSS and never match.
const DYNAMIC_PSEUDO_CLASSES: &[&str] = &[
    "link",
    "visited",
    "any-link",
    "hover",
    "active",
    "focus",
    "focus-within",
    "focus-visible",
    "target",
    "enabled",
    "disabled",
    "checked",
    "indeterminate",
    "default",
    "valid",
    "invalid",
    "in-range",
    "out-of-range",
    "required",
    "optional",
    "read-only",
    "read-write",
    "placeholder-shown",
];

const FUNCTIONAL_PSEUDO_CLASSES: &[&str] = &["lang", "dir"];

const PSEUDO_ELEMENTS: &[&str] = &[
    "first-line",
    "first-letter",
    "before",
    "after",
    "selection",
    "placeholder",
    "marker",
];

/// CSS2 spelling of pseudo-elements with a single colon.
const LEGACY_PSEUDO_ELEMENTS: &[&str] = &["first-line", "first-letter", "before", "after"];

/// Replaces the pseudo-classes and pseudo-elements `scraper` cannot parse
/// with `:root` so the rest of the selector still gets checked.
fn with_stand_ins(query: &str) -> String {
    let chars: Vec<char> = query.chars().collect();
    let mut out = String::with_capacity(query.len());
    let mut quote: Option<char> = None;
    let mut brackets = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            i += 1;
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' => brackets += 1,
            ']' => brackets = brackets.saturating_sub(1),
            ':' if brackets == 0 => {
                if let Some(end) = stand_in_end(&chars, i) {
                    out.push_str(":root");
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// End offset of a known pseudo starting at the colon at `start`.
fn stand_in_end(chars: &[char], start: usize) -> Option<usize> {
    let double = chars.get(start + 1) == Some(&':');
    let name_start = if double { start + 2 } else { start + 1 };
    let mut end = name_start;
    while chars
        .get(end)
        .is_some_and(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
    {
        end += 1;
    }
    let name = chars[name_start..end]
        .iter()
        .collect::<String>()
        .to_ascii_lowercase();

    let is_element = if double {
        PSEUDO_ELEMENTS.contains(&name.as_str())
    } else {
        LEGACY_PSEUDO_ELEMENTS.contains(&name.as_str())
    };
    if is_element {
        let mut rest = end;
        while chars.get(rest).is_some_and(|c| c.is_whitespace()) {
            rest += 1;
        }
        return matches!(chars.get(rest), None | Some(',' | ':')).then_some(end);
    }
    if double {
        return None;
    }

    let opens = chars.get(end) == Some(&'(');
    if DYNAMIC_PSEUDO_CLASSES.contains(&name.as_str()) && !opens {
        return Some(end);
    }
    if FUNCTIONAL_PSEUDO_CLASSES.contains(&name.as_str()) && opens {
        let close = chars[end..].iter().position(|c| *c == ')')?;
        return Some(end + close + 1);
    }
    None
}

fn parse_css(query: &str) -> Result<(), String> {
    Selector::parse(&with_stand_ins(query))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn parses_as_css(query: &str) -> bool {
    parse_css(query).is_ok()
}

pub fn validate_css(query: &str) -> Result<(), BuildError> {
    match parse_css(query) {
        Ok(()) => Ok(()),
        Err(message) => {
            let hint = xpath::parse(query)
                .is_ok()
                .then_some("looks like XPath query, not CSS");
            Err(css_error(query, message, hint))
        }
    }
}

/// A query that is valid XPath but also parses as CSS (`div`, `a`) is
/// rejected: in an XPath slot it is almost always a mistake.
pub fn validate_xpath(query: &str) -> Result<(), BuildError> {
    if let Err(e) = xpath::parse(query) {
        return Err(xpath_error(query, e.to_string(), None));
    }
    if parses_as_css(query) {
        return Err(xpath_error(
            query,
            "query is ambiguous".to_string(),
            Some("looks like CSS query, not XPath"),
        ));
    }
    Ok(())
}

// ============================================================================
// CSS → XPath
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Default)]
struct Compound {
    element: Option<String>,
    conditions: Vec<String>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.element.is_none() && self.conditions.is_empty()
    }

    fn element(&self) -> &str {
        self.element.as_deref().unwrap_or("*")
    }

    fn conditions(&self) -> String {
        self.conditions
            .iter()
            .map(|c| format!("[{}]", c))
            .collect()
    }
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

fn contains_word(attr: &str, word: &str) -> String {
    format!(
        "@{attr} and contains(concat(' ', normalize-space(@{attr}), ' '), {})",
        quote(&format!(" {} ", word))
    )
}

struct CssReader<'a> {
    query: &'a str,
    input: Vec<char>,
    position: usize,
}

impl<'a> CssReader<'a> {
    fn new(query: &'a str) -> Self {
        CssReader {
            query,
            input: query.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn unsupported(&self, what: &str) -> BuildError {
        css_error(
            self.query,
            format!("cannot convert to XPath: {} at offset {}", what, self.position),
            None,
        )
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.position;
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
        self.position > start
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
                ident.push(ch);
                self.advance();
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char() {
                    ident.push(escaped);
                    self.advance();
                }
            } else {
                break;
            }
        }
        ident
    }

    fn read_until(&mut self, end: char) -> Result<String, BuildError> {
        let mut out = String::new();
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == end {
                return Ok(out);
            }
            out.push(ch);
        }
        Err(self.unsupported(&format!("missing '{}'", end)))
    }

    fn read_value(&mut self) -> Result<String, BuildError> {
        self.skip_whitespace();
        match self.current_char() {
            Some(q @ ('"' | '\'')) => {
                self.advance();
                self.read_until(q)
            }
            _ => Ok(self.read_ident()),
        }
    }

    fn read_attribute(&mut self) -> Result<String, BuildError> {
        self.skip_whitespace();
        let name = self.read_ident();
        if name.is_empty() {
            return Err(self.unsupported("empty attribute name"));
        }
        self.skip_whitespace();

        let op = match self.current_char() {
            Some(']') => {
                self.advance();
                return Ok(format!("@{}", name));
            }
            Some('=') => {
                self.advance();
                "="
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.advance();
                if self.current_char() != Some('=') {
                    return Err(self.unsupported("attribute operator"));
                }
                self.advance();
                match c {
                    '~' => "~=",
                    '|' => "|=",
                    '^' => "^=",
                    '$' => "$=",
                    _ => "*=",
                }
            }
            _ => return Err(self.unsupported("attribute operator")),
        };

        let value = self.read_value()?;
        self.skip_whitespace();
        if self.current_char() != Some(']') {
            return Err(self.unsupported("attribute flags"));
        }
        self.advance();

        let cond = match op {
            "=" => format!("@{} = {}", name, quote(&value)),
            "~=" => contains_word(&name, &value),
            "|=" => format!(
                "@{n} and (@{n} = {} or starts-with(@{n}, {}))",
                quote(&value),
                quote(&format!("{}-", value)),
                n = name
            ),
            "^=" => format!("@{n} and starts-with(@{n}, {})", quote(&value), n = name),
            "$=" => format!(
                "@{n} and substring(@{n}, string-length(@{n})-{}) = {}",
                value.chars().count().saturating_sub(1),
                quote(&value),
                n = name
            ),
            _ => format!("@{n} and contains(@{n}, {})", quote(&value), n = name),
        };
        Ok(cond)
    }

    fn read_pseudo(&mut self) -> Result<String, BuildError> {
        if self.current_char() == Some(':') {
            return Err(self.unsupported("pseudo-element"));
        }
        let name = self.read_ident().to_ascii_lowercase();
        let arg = if self.current_char() == Some('(') {
            self.advance();
            Some(self.read_until(')')?.trim().to_string())
        } else {
            None
        };

        let cond = match (name.as_str(), arg.as_deref()) {
            ("first-child", None) => "count(preceding-sibling::*) = 0".to_string(),
            ("last-child", None) => "count(following-sibling::*) = 0".to_string(),
            ("only-child", None) => {
                "count(preceding-sibling::*) = 0 and count(following-sibling::*) = 0"
                    .to_string()
            }
            ("empty", None) => "not(*) and not(string-length())".to_string(),
            ("nth-child", Some(n)) => match n.parse::<usize>() {
                Ok(n) if n > 0 => format!("count(preceding-sibling::*) = {}", n - 1),
                _ => return Err(self.unsupported("nth-child argument")),
            },
            _ => return Err(self.unsupported(&format!("pseudo-class ':{}'", name))),
        };
        Ok(cond)
    }

    fn read_compound(&mut self) -> Result<Compound, BuildError> {
        let mut compound = Compound::default();
        loop {
            match self.current_char() {
                Some('*') if compound.is_empty() => {
                    self.advance();
                    compound.element = Some("*".to_string());
                }
                Some(c) if compound.is_empty() && (c.is_alphabetic() || c == '_') => {
                    compound.element = Some(self.read_ident());
                }
                Some('.') => {
                    self.advance();
                    let class = self.read_ident();
                    compound.conditions.push(contains_word("class", &class));
                }
                Some('#') => {
                    self.advance();
                    let id = self.read_ident();
                    compound.conditions.push(format!("@id = {}", quote(&id)));
                }
                Some('[') => {
                    self.advance();
                    let cond = self.read_attribute()?;
                    compound.conditions.push(cond);
                }
                Some(':') => {
                    self.advance();
                    let cond = self.read_pseudo()?;
                    compound.conditions.push(cond);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.unsupported("expected selector"));
        }
        Ok(compound)
    }

    fn read_combinator(&mut self) -> Option<Combinator> {
        let spaced = self.skip_whitespace();
        let combinator = match self.current_char() {
            Some('>') => Combinator::Child,
            Some('+') => Combinator::Adjacent,
            Some('~') => Combinator::Sibling,
            Some(',') | None => return None,
            Some(_) if spaced => return Some(Combinator::Descendant),
            Some(_) => return None,
        };
        self.advance();
        self.skip_whitespace();
        Some(combinator)
    }

    fn read_selector(&mut self, prefix: &str) -> Result<String, BuildError> {
        self.skip_whitespace();
        let first = self.read_compound()?;
        let mut xpath = format!("{}{}{}", prefix, first.element(), first.conditions());

        while let Some(combinator) = self.read_combinator() {
            let next = self.read_compound()?;
            let step = match combinator {
                Combinator::Descendant => {
                    format!("/descendant-or-self::*/{}{}", next.element(), next.conditions())
                }
                Combinator::Child => format!("/{}{}", next.element(), next.conditions()),
                Combinator::Sibling => {
                    format!("/following-sibling::{}{}", next.element(), next.conditions())
                }
                Combinator::Adjacent => match next.element.as_deref() {
                    Some(name) if name != "*" => format!(
                        "/following-sibling::*[(name() = {}) and (position() = 1)]{}",
                        quote(name),
                        next.conditions()
                    ),
                    _ => format!("/following-sibling::*[position() = 1]{}", next.conditions()),
                },
            };
            xpath.push_str(&step);
        }
        Ok(xpath)
    }
}

/// Translates a CSS selector group into XPath, each selector rooted at
/// `prefix` (`descendant-or-self::` by default).
///
/// ```
/// use ssc_gen::selector::css_to_xpath;
///
/// let xpath = css_to_xpath("ul > li#main", "descendant-or-self::").unwrap();
/// assert_eq!(xpath, "descendant-or-self::ul/li[@id = 'main']");
/// ```
pub fn css_to_xpath(query: &str, prefix: &str) -> Result<String, BuildError> {
    let mut reader = CssReader::new(query.trim());
    let mut parts = Vec::new();
    loop {
        parts.push(reader.read_selector(prefix)?);
        reader.skip_whitespace();
        match reader.current_char() {
            Some(',') => reader.advance(),
            None => break,
            Some(_) => return Err(reader.unsupported("unexpected character")),
        }
    }
    Ok(parts.join(" | "))
}

// ============================================================================
// XPath → CSS
// ============================================================================

const QUOTED: &str = r#"('[^']*'|"[^"]*")"#;

fn rule(pattern: &str) -> Regex {
    Regex::new(&format!("^{}$", pattern.replace("Q", QUOTED))).unwrap()
}

static CLASS_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    rule(r"@([\w-]+) and contains\(concat\(' ', normalize-space\(@([\w-]+)\), ' '\), Q\)")
});
static DASH_MATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    rule(r"@([\w-]+) and \(@([\w-]+)\s*=\s*Q or starts-with\(@([\w-]+), Q\)\)")
});
static STARTS_RE: LazyLock<Regex> =
    LazyLock::new(|| rule(r"(?:@([\w-]+) and )?starts-with\(@([\w-]+),\s*Q\)"));
static ENDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    rule(r"@([\w-]+) and substring\(@([\w-]+), string-length\(@([\w-]+)\)\s*-\s*\d+\)\s*=\s*Q")
});
static CONTAINS_RE: LazyLock<Regex> =
    LazyLock::new(|| rule(r"(?:@([\w-]+) and )?contains\(@([\w-]+),\s*Q\)"));
static ATTR_EQ_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"@([\w-]+)\s*=\s*Q"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"@([\w-]+)"));
static ONLY_CHILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    rule(r"count\(preceding-sibling::\*\)\s*=\s*0 and count\(following-sibling::\*\)\s*=\s*0")
});
static PRECEDING_RE: LazyLock<Regex> =
    LazyLock::new(|| rule(r"count\(preceding-sibling::\*\)\s*=\s*(\d+)"));
static LAST_CHILD_RE: LazyLock<Regex> =
    LazyLock::new(|| rule(r"count\(following-sibling::\*\)\s*=\s*0"));
static EMPTY_RE: LazyLock<Regex> =
    LazyLock::new(|| rule(r"not\(\*\) and not\(string-length\(\)\)"));
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"(?:position\(\)\s*=\s*)?(\d+)"));
static ADJACENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    rule(r"(?:\(name\(\)\s*=\s*Q\) and )?\(?position\(\)\s*=\s*1\)?")
});
static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| rule(r"-?[A-Za-z_][\w-]*"));

fn group<'h>(caps: &Captures<'h>, i: usize) -> Option<&'h str> {
    caps.get(i).map(|m| m.as_str())
}

fn unquote(quoted: &str) -> &str {
    &quoted[1..quoted.len() - 1]
}

fn css_value(value: &str) -> String {
    if value.contains('"') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}

/// Splits on `sep` outside brackets, parentheses and string literals.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                c if c == sep && depth == 0 => {
                    parts.push(&input[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&input[start..]);
    parts
}

struct CssWriter<'a> {
    query: &'a str,
}

impl CssWriter<'_> {
    fn unsupported(&self, what: &str) -> BuildError {
        xpath_error(self.query, format!("cannot convert to CSS: {}", what), None)
    }

    fn path(&self, path: &str) -> Result<String, BuildError> {
        let path = path.trim();
        let path = path.strip_prefix('.').filter(|p| p.starts_with('/')).unwrap_or(path);
        let (mut pending, rest) = match path.strip_prefix("//") {
            Some(rest) => (Combinator::Descendant, rest),
            None => (Combinator::Child, path.strip_prefix('/').unwrap_or(path)),
        };

        let steps = split_top_level(rest, '/');
        let mut css = String::new();
        for (i, step) in steps.iter().enumerate() {
            let step = step.trim();
            let is_last = i + 1 == steps.len();
            if step.is_empty() && !is_last {
                pending = Combinator::Descendant;
                continue;
            }
            if !is_last && matches!(step, "descendant-or-self::*" | "descendant-or-self::node()") {
                pending = Combinator::Descendant;
                continue;
            }
            let (combinator, compound) = self.step(step, pending)?;
            if !css.is_empty() {
                css.push_str(match combinator {
                    Combinator::Descendant => " ",
                    Combinator::Child => " > ",
                    Combinator::Adjacent => " + ",
                    Combinator::Sibling => " ~ ",
                });
            }
            css.push_str(&compound);
            pending = Combinator::Child;
        }
        if css.is_empty() {
            return Err(self.unsupported("empty path"));
        }
        Ok(css)
    }

    fn step(&self, step: &str, pending: Combinator) -> Result<(Combinator, String), BuildError> {
        let (head, tail) = step.split_at(step.find('[').unwrap_or(step.len()));
        let (axis, test) = head.split_once("::").unwrap_or(("child", head));
        let mut predicates = self.predicates(tail)?;

        let mut element = match test.trim() {
            "*" | "node()" => None,
            name if IDENT_RE.is_match(name) => Some(name.to_string()),
            other => return Err(self.unsupported(&format!("node test '{}'", other))),
        };

        let combinator = match axis.trim() {
            "child" => pending,
            "descendant" | "descendant-or-self" => Combinator::Descendant,
            "following-sibling" => {
                let adjacent = predicates
                    .first()
                    .copied()
                    .and_then(|first| ADJACENT_RE.captures(first));
                match adjacent {
                    Some(caps) => {
                        if let Some(name) = caps.get(1) {
                            element = Some(unquote(name.as_str()).to_string());
                        }
                        predicates.remove(0);
                        Combinator::Adjacent
                    }
                    None => Combinator::Sibling,
                }
            }
            other => return Err(self.unsupported(&format!("axis '{}'", other))),
        };

        let mut compound = String::new();
        for predicate in predicates {
            compound.push_str(&self.predicate(predicate)?);
        }
        let compound = match element {
            Some(name) if name != "*" => format!("{}{}", name, compound),
            _ if compound.is_empty() => "*".to_string(),
            _ => compound,
        };
        Ok((combinator, compound))
    }

    fn predicates<'s>(&self, tail: &'s str) -> Result<Vec<&'s str>, BuildError> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut start = 0;
        for (i, ch) in tail.char_indices() {
            match quote {
                Some(q) if ch == q => quote = None,
                Some(_) => {}
                None => match ch {
                    '\'' | '"' => quote = Some(ch),
                    '[' => {
                        if depth == 0 {
                            start = i + 1;
                        }
                        depth += 1;
                    }
                    ']' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            out.push(tail[start..i].trim());
                        }
                    }
                    c if depth == 0 && !c.is_whitespace() => {
                        return Err(self.unsupported(&format!("unexpected '{}'", c)));
                    }
                    _ => {}
                },
            }
        }
        if depth != 0 {
            return Err(self.unsupported("unclosed predicate"));
        }
        Ok(out)
    }

    /// All captured attribute names of one predicate must agree.
    fn same_attribute<'c>(&self, names: &[Option<&'c str>]) -> Result<&'c str, BuildError> {
        let mut names = names.iter().flatten();
        let first = names
            .next()
            .copied()
            .ok_or_else(|| self.unsupported("missing attribute"))?;
        if names.any(|n| *n != first) {
            return Err(self.unsupported("predicate mixes attributes"));
        }
        Ok(first)
    }

    fn predicate(&self, predicate: &str) -> Result<String, BuildError> {
        if let Some(caps) = CLASS_WORD_RE.captures(predicate) {
            let attr = self.same_attribute(&[group(&caps, 1), group(&caps, 2)])?;
            let word = unquote(&caps[3]).trim();
            return Ok(if attr == "class" && IDENT_RE.is_match(word) {
                format!(".{}", word)
            } else {
                format!("[{}~={}]", attr, css_value(word))
            });
        }
        if let Some(caps) = DASH_MATCH_RE.captures(predicate) {
            let attr =
                self.same_attribute(&[group(&caps, 1), group(&caps, 2), group(&caps, 4)])?;
            return Ok(format!("[{}|={}]", attr, css_value(unquote(&caps[3]))));
        }
        if let Some(caps) = STARTS_RE.captures(predicate) {
            let attr = self.same_attribute(&[group(&caps, 1), group(&caps, 2)])?;
            return Ok(format!("[{}^={}]", attr, css_value(unquote(&caps[3]))));
        }
        if let Some(caps) = ENDS_RE.captures(predicate) {
            let attr =
                self.same_attribute(&[group(&caps, 1), group(&caps, 2), group(&caps, 3)])?;
            return Ok(format!("[{}$={}]", attr, css_value(unquote(&caps[4]))));
        }
        if let Some(caps) = CONTAINS_RE.captures(predicate) {
            let attr = self.same_attribute(&[group(&caps, 1), group(&caps, 2)])?;
            return Ok(format!("[{}*={}]", attr, css_value(unquote(&caps[3]))));
        }
        if let Some(caps) = ATTR_EQ_RE.captures(predicate) {
            let value = unquote(&caps[2]);
            return Ok(if &caps[1] == "id" && IDENT_RE.is_match(value) {
                format!("#{}", value)
            } else {
                format!("[{}={}]", &caps[1], css_value(value))
            });
        }
        if let Some(caps) = ATTR_RE.captures(predicate) {
            return Ok(format!("[{}]", &caps[1]));
        }
        if ONLY_CHILD_RE.is_match(predicate) {
            return Ok(":only-child".to_string());
        }
        if let Some(caps) = PRECEDING_RE.captures(predicate) {
            return Ok(match caps[1].parse::<usize>() {
                Ok(0) => ":first-child".to_string(),
                Ok(n) => format!(":nth-child({})", n + 1),
                Err(_) => return Err(self.unsupported("sibling count")),
            });
        }
        if LAST_CHILD_RE.is_match(predicate) {
            return Ok(":last-child".to_string());
        }
        if EMPTY_RE.is_match(predicate) {
            return Ok(":empty".to_string());
        }
        if let Some(caps) = POSITION_RE.captures(predicate) {
            return Ok(format!(":nth-of-type({})", &caps[1]));
        }
        if predicate == "last()" {
            return Ok(":last-of-type".to_string());
        }
        Err(self.unsupported(&format!("predicate '{}'", predicate)))
    }
}

/// Translates an XPath union into a CSS selector group.
///
/// Understands the location paths [`css_to_xpath`] produces (with or
/// without the `descendant-or-self::` prefix) and plain `//a/b[@x]`
/// paths. Functions and axes with no CSS counterpart are reported as
/// unsupported.
///
/// ```
/// use ssc_gen::selector::xpath_to_css;
///
/// let css = xpath_to_css("descendant-or-self::ul/li[@id = 'main']").unwrap();
/// assert_eq!(css, "ul > li#main");
/// ```
pub fn xpath_to_css(query: &str) -> Result<String, BuildError> {
    let writer = CssWriter { query };
    let selectors = split_top_level(query.trim(), '|')
        .into_iter()
        .map(|path| writer.path(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(selectors.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_validation() {
        assert!(validate_css("div.price > span").is_ok());
        assert!(validate_css("a[href^='http']").is_ok());

        let err = validate_css("//div[@id='x']").unwrap_err();
        match err {
            BuildError::SelectorSyntax { hint, .. } => {
                assert_eq!(hint.as_deref(), Some("looks like XPath query, not CSS"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn xpath_validation() {
        assert!(validate_xpath("//div[@id='x']").is_ok());
        assert!(validate_xpath("//p/text()").is_ok());

        let err = validate_xpath("div").unwrap_err();
        match err {
            BuildError::SelectorSyntax { hint, .. } => {
                assert_eq!(hint.as_deref(), Some("looks like CSS query, not XPath"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(validate_xpath("//div[").is_err());
    }

    #[test]
    fn css_to_xpath_combinators() {
        let p = DEFAULT_XPATH_PREFIX;
        assert_eq!(css_to_xpath("div p", p).unwrap(), "descendant-or-self::div/descendant-or-self::*/p");
        assert_eq!(css_to_xpath("div > p", p).unwrap(), "descendant-or-self::div/p");
        assert_eq!(
            css_to_xpath("h1 + p", p).unwrap(),
            "descendant-or-self::h1/following-sibling::*[(name() = 'p') and (position() = 1)]"
        );
        assert_eq!(css_to_xpath("h1 ~ p", p).unwrap(), "descendant-or-self::h1/following-sibling::p");
        assert_eq!(css_to_xpath("h1, h2", p).unwrap(), "descendant-or-self::h1 | descendant-or-self::h2");
    }

    #[test]
    fn css_to_xpath_conditions() {
        let p = DEFAULT_XPATH_PREFIX;
        assert_eq!(
            css_to_xpath(".price", p).unwrap(),
            "descendant-or-self::*[@class and contains(concat(' ', normalize-space(@class), ' '), ' price ')]"
        );
        assert_eq!(css_to_xpath("a[href]", p).unwrap(), "descendant-or-self::a[@href]");
        assert_eq!(
            css_to_xpath("a[href^=\"http\"]", p).unwrap(),
            "descendant-or-self::a[@href and starts-with(@href, 'http')]"
        );
        assert_eq!(
            css_to_xpath("li:nth-child(3)", p).unwrap(),
            "descendant-or-self::li[count(preceding-sibling::*) = 2]"
        );
        assert!(css_to_xpath("a:hover", p).is_err());
    }

    #[test]
    fn xpath_to_css_simple_paths() {
        assert_eq!(xpath_to_css("//div/p").unwrap(), "div > p");
        assert_eq!(xpath_to_css("//div//p").unwrap(), "div p");
        assert_eq!(
            xpath_to_css("//div[@class=\"product_price\"]/p").unwrap(),
            "div[class=\"product_price\"] > p"
        );
        assert_eq!(xpath_to_css("//ul/li[2]").unwrap(), "ul > li:nth-of-type(2)");
        assert_eq!(xpath_to_css("//ul/li[last()]").unwrap(), "ul > li:last-of-type");
    }

    #[test]
    fn xpath_to_css_reverses_prefixed_output() {
        let p = DEFAULT_XPATH_PREFIX;
        let cases = [
            ("div > p", "div > p"),
            ("p", "p"),
            ("div.price", "div.price"),
            ("a#main", "a#main"),
            (".price", ".price"),
            ("div p", "div p"),
            ("h1 + p", "h1 + p"),
            ("h1 ~ p", "h1 ~ p"),
            ("a[href]", "a[href]"),
            ("a[href='x']", "a[href=\"x\"]"),
            ("a[href^='http']", "a[href^=\"http\"]"),
            ("a[href$='.pdf']", "a[href$=\".pdf\"]"),
            ("a[href*='shop']", "a[href*=\"shop\"]"),
            ("a[rel~='next']", "a[rel~=\"next\"]"),
            ("p[lang|='en']", "p[lang|=\"en\"]"),
            ("li:first-child", "li:first-child"),
            ("li:last-child", "li:last-child"),
            ("li:only-child", "li:only-child"),
            ("li:nth-child(3)", "li:nth-child(3)"),
            ("td:empty", "td:empty"),
            ("h1, h2", "h1, h2"),
        ];
        for (css, expected) in cases {
            let xpath = css_to_xpath(css, p).unwrap();
            let back = xpath_to_css(&xpath).unwrap();
            assert_eq!(back, expected, "via {}", xpath);
            assert!(validate_css(&back).is_ok(), "invalid css {}", back);
        }
    }

    #[test]
    fn xpath_to_css_rejects_functions() {
        assert!(xpath_to_css("//p/text()").is_err());
        assert!(xpath_to_css("//a[contains(text(), 'x')]").is_err());
        assert!(xpath_to_css("//a/ancestor::div").is_err());
    }

    #[test]
    fn browser_pseudo_classes_validate() {
        let queries = [
            "a:hover",
            "a:focus",
            "a:visited",
            "a:link",
            "input:checked",
            "input:disabled",
            "p::first-line",
            "p:first-letter",
            "p::before, p::after",
            "p:lang(en)",
            "p:first-of-type",
            "li:not(:hover) > a",
        ];
        for query in queries {
            assert!(validate_css(query).is_ok(), "rejected {}", query);
        }
        assert!(validate_css("p::first-line span").is_err());
        assert!(validate_css("a:hovering").is_err());
        assert!(validate_css("a[title=':hover']").is_ok());
    }
}

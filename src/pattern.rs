//! Regex pattern normalisation and compile checks.

use regex::{Regex, RegexBuilder};

use crate::error::BuildError;

/// Pattern with inline flags lifted out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub pattern: String,
    pub ignore_case: bool,
    pub dotall: bool,
}

/// Lifts a leading `(?i)`/`(?s)`/`(?x)` group into flags.
///
/// Verbose (`x`) patterns are flattened: unescaped whitespace and `#`
/// comments outside character classes are dropped. Flags the core does not
/// track (`m`, `u`, ...) stay in the pattern.
pub fn normalize(pattern: &str, ignore_case: bool, dotall: bool) -> Pattern {
    let mut out = Pattern {
        pattern: pattern.to_string(),
        ignore_case,
        dotall,
    };

    let Some((flags, rest)) = leading_flags(pattern) else {
        return out;
    };

    let mut kept = String::new();
    let mut verbose = false;
    for flag in flags.chars() {
        match flag {
            'i' => out.ignore_case = true,
            's' => out.dotall = true,
            'x' => verbose = true,
            other => kept.push(other),
        }
    }

    let body = if verbose {
        strip_verbose(rest)
    } else {
        rest.to_string()
    };
    out.pattern = if kept.is_empty() {
        body
    } else {
        format!("(?{}){}", kept, body)
    };
    out
}

fn leading_flags(pattern: &str) -> Option<(&str, &str)> {
    let inner = pattern.strip_prefix("(?")?;
    let end = inner.find(')')?;
    let flags = &inner[..end];
    if flags.is_empty() || !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((flags, &inner[end + 1..]))
}

fn strip_verbose(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    let mut in_class = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                // escaped whitespace and hash are literal outside verbose mode
                Some(next) if next == '#' || next == ' ' => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '[' if !in_class => {
                in_class = true;
                out.push(ch);
            }
            ']' if in_class => {
                in_class = false;
                out.push(ch);
            }
            '#' if !in_class => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() && !in_class => {}
            c => out.push(c),
        }
    }
    out
}

pub fn compile(pattern: &str, ignore_case: bool, dotall: bool) -> Result<Regex, BuildError> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .dot_matches_new_line(dotall)
        .build()
        .map_err(|e| BuildError::RegexSyntax {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Number of capturing groups, not counting the implicit whole match
pub fn capture_groups(re: &Regex) -> usize {
    re.captures_len().saturating_sub(1)
}

/// Group rules for `REGEX`.
///
/// `group == 1` needs exactly one capturing group; a higher group needs at
/// least that many.
pub fn check_group(pattern: &str, groups: usize, group: usize) -> Result<(), BuildError> {
    let message = match group {
        0 => Some("group index must be at least 1".to_string()),
        1 if groups != 1 => Some(format!(
            "expected exactly one capturing group, found {}",
            groups
        )),
        n if n > 1 && groups < n => Some(format!(
            "group {} requested but pattern has {} capturing group(s)",
            n, groups
        )),
        _ => None,
    };
    match message {
        Some(message) => Err(BuildError::RegexSyntax {
            pattern: pattern.to_string(),
            message,
        }),
        None => Ok(()),
    }
}

/// `REGEX_ALL` returns whole matches or the single group
pub fn check_findall(pattern: &str, groups: usize) -> Result<(), BuildError> {
    if groups > 1 {
        return Err(BuildError::RegexSyntax {
            pattern: pattern.to_string(),
            message: format!(
                "findall supports at most one capturing group, found {}",
                groups
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_inline_flags() {
        let p = normalize(r"(?is)a.b", false, false);
        assert_eq!(p.pattern, "a.b");
        assert!(p.ignore_case);
        assert!(p.dotall);
    }

    #[test]
    fn keeps_untracked_flags() {
        let p = normalize(r"(?im)^a$", false, false);
        assert_eq!(p.pattern, "(?m)^a$");
        assert!(p.ignore_case);
    }

    #[test]
    fn flattens_verbose_pattern() {
        let p = normalize("(?x)\n  (\\d+)  # digits\n  \\s* [a b]\n", false, false);
        assert_eq!(p.pattern, r"(\d+)\s*[a b]");
    }

    #[test]
    fn plain_pattern_untouched() {
        let p = normalize(r"(\d+)", true, false);
        assert_eq!(p.pattern, r"(\d+)");
        assert!(p.ignore_case);
        assert!(!p.dotall);
    }

    #[test]
    fn non_flag_group_is_not_lifted() {
        let p = normalize(r"(?:a|b)", false, false);
        assert_eq!(p.pattern, r"(?:a|b)");
    }

    #[test]
    fn counts_groups() {
        let re = compile(r"(a)(?:b)(c)", false, false).unwrap();
        assert_eq!(capture_groups(&re), 2);
    }

    #[test]
    fn group_rules() {
        assert!(check_group("p", 1, 1).is_ok());
        assert!(check_group("p", 2, 1).is_err());
        assert!(check_group("p", 0, 1).is_err());
        assert!(check_group("p", 3, 2).is_ok());
        assert!(check_group("p", 1, 2).is_err());
        assert!(check_group("p", 1, 0).is_err());
    }

    #[test]
    fn findall_rules() {
        assert!(check_findall("p", 0).is_ok());
        assert!(check_findall("p", 1).is_ok());
        assert!(check_findall("p", 2).is_err());
    }

    #[test]
    fn bad_pattern_reports_regex_syntax() {
        let err = compile("(", false, false).unwrap_err();
        assert!(matches!(err, BuildError::RegexSyntax { .. }));
    }
}

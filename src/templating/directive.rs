//! Directive syntax, keyword classification and block header parsing.

use serde::{Deserialize, Serialize};

use crate::core::TemplateError;
use crate::templating::program::{Clause, Param};

/// Every block keyword the executor knows how to run.
pub const KNOWN_BLOCKS: &[&str] =
    &["if", "elif", "else", "try", "except", "finally", "for", "while", "with", "def", "class"];

/// Block keywords that continue the construct above them.
pub const KNOWN_DEDENT_BLOCKS: &[&str] = &["elif", "else", "except", "finally"];

/// Directive markers and keyword lists.
///
/// The defaults are `%%`, `{%`, `%}` and `\`. The keyword lists may be
/// narrowed (a keyword left out is treated as a plain statement) but not
/// extended beyond [`KNOWN_BLOCKS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Syntax {
    /// Prefix of a single-line directive
    pub single_line: String,
    /// Opens a directive tag
    pub block_start: String,
    /// Closes a directive tag
    pub block_end: String,
    /// Trailing marker joining a directive with the following line
    pub continuation: String,
    pub blocks: Vec<String>,
    pub dedent_blocks: Vec<String>,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            single_line: "%%".to_string(),
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            continuation: "\\".to_string(),
            blocks: KNOWN_BLOCKS.iter().map(ToString::to_string).collect(),
            dedent_blocks: KNOWN_DEDENT_BLOCKS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Syntax {
    /// Reject empty markers and unknown keywords.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let markers = [
            ("single_line", &self.single_line),
            ("block_start", &self.block_start),
            ("block_end", &self.block_end),
            ("continuation", &self.continuation),
        ];
        for (field, marker) in markers {
            if marker.trim().is_empty() {
                return Err(TemplateError::Config {
                    message: format!("syntax.{field} must not be empty"),
                });
            }
        }
        if self.block_start == self.block_end {
            return Err(TemplateError::Config {
                message: "syntax.block_start and syntax.block_end must differ".to_string(),
            });
        }
        for keyword in &self.blocks {
            if !KNOWN_BLOCKS.contains(&keyword.as_str()) {
                return Err(TemplateError::Config {
                    message: format!(
                        "unknown block keyword '{keyword}' (known: {})",
                        KNOWN_BLOCKS.join(", ")
                    ),
                });
            }
        }
        for keyword in &self.dedent_blocks {
            if !KNOWN_DEDENT_BLOCKS.contains(&keyword.as_str()) {
                return Err(TemplateError::Config {
                    message: format!("'{keyword}' cannot be a dedent keyword"),
                });
            }
            if !self.blocks.contains(keyword) {
                return Err(TemplateError::Config {
                    message: format!("dedent keyword '{keyword}' is missing from syntax.blocks"),
                });
            }
        }
        Ok(())
    }

    /// Classify a directive statement by its leading keyword.
    #[must_use]
    pub fn classify(&self, statement: &str) -> DirectiveKind {
        let word = keyword(statement);
        if self.dedent_blocks.iter().any(|k| k == word) {
            DirectiveKind::Dedent
        } else if self.blocks.iter().any(|k| k == word) {
            DirectiveKind::BlockOpening
        } else if is_end_marker(statement, word) {
            DirectiveKind::EndMarker
        } else {
            DirectiveKind::Plain
        }
    }

    /// Strip a trailing continuation marker, if present.
    #[must_use]
    pub fn strip_continuation<'a>(&self, line: &'a str) -> (&'a str, bool) {
        match line.trim_end().strip_suffix(self.continuation.as_str()) {
            Some(content) => (content.trim_end(), true),
            None => (line.trim_end(), false),
        }
    }
}

/// How a directive affects the block stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Opens a construct (`if`, `for`, ...)
    BlockOpening,
    /// Continues the open construct (`elif`, `else`, ...)
    Dedent,
    /// `end…`
    EndMarker,
    /// Any other statement
    Plain,
}

/// The leading identifier of a directive.
#[must_use]
pub fn keyword(statement: &str) -> &str {
    let statement = statement.trim_start();
    let end = statement
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(statement.len());
    &statement[..end]
}

// `endpoint = 1` and `end_of(x)` stay plain statements.
fn is_end_marker(statement: &str, word: &str) -> bool {
    if !word.starts_with("end") {
        return false;
    }
    let rest = statement.trim_start()[word.len()..].trim_start();
    !rest.starts_with(['=', '(', '[', '.', '+', '-', '*', '/', '%'])
}

/// A parsed block header and its optional one-liner body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub clause: Clause,
    pub inline: Option<String>,
}

/// Parse a block-opening or dedent directive.
///
/// The trailing `:` is optional. Text after a top-level `:` is returned as
/// the inline body of a one-liner.
pub fn parse_header(statement: &str) -> Result<Header, String> {
    let statement = statement.trim();
    let word = keyword(statement);
    let rest = statement[word.len()..].trim_start();
    let (head, inline) = match find_top_level(rest, |s| s.starts_with(':')) {
        Some(at) => {
            let body = rest[at + 1..].trim();
            (rest[..at].trim(), (!body.is_empty()).then(|| body.to_string()))
        }
        None => (rest.trim(), None),
    };

    let clause = match word {
        "if" => Clause::If {
            cond: required(word, head, "a condition")?,
        },
        "elif" => Clause::Elif {
            cond: required(word, head, "a condition")?,
        },
        "while" => Clause::While {
            cond: required(word, head, "a condition")?,
        },
        "else" | "try" | "finally" => {
            if !head.is_empty() {
                return Err(format!("'{word}' takes no arguments, found '{head}'"));
            }
            match word {
                "else" => Clause::Else,
                "try" => Clause::Try,
                _ => Clause::Finally,
            }
        }
        "for" => parse_for(head)?,
        "except" => Clause::Except {
            binding: split_binding(head)?.1,
        },
        "with" => {
            let (expr, binding) = split_binding(head)?;
            Clause::With {
                expr: required(word, expr, "an expression")?,
                binding,
            }
        }
        "def" => parse_def(head)?,
        "class" => {
            let name = keyword(head);
            if name.is_empty() {
                return Err("'class' requires a name".to_string());
            }
            Clause::Class {
                name: name.to_string(),
            }
        }
        other => return Err(format!("'{other}' is not a block keyword")),
    };

    Ok(Header {
        clause,
        inline,
    })
}

fn required(word: &str, text: &str, what: &str) -> Result<String, String> {
    if text.is_empty() {
        Err(format!("'{word}' requires {what}"))
    } else {
        Ok(text.to_string())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn identifier(name: &str) -> Result<String, String> {
    let name = name.trim();
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(format!("'{name}' is not a valid name"))
    }
}

/// `targets in iterable`, with optional parentheses around the targets.
fn parse_for(head: &str) -> Result<Clause, String> {
    let at = find_top_level(head, |s| {
        s.starts_with("in") && s[2..].starts_with(|c: char| c.is_whitespace() || c == '(' || c == '[')
    })
    .filter(|&at| at > 0 && head[..at].ends_with(char::is_whitespace))
    .ok_or_else(|| format!("expected 'for <names> in <iterable>', found 'for {head}'"))?;

    let targets = head[..at].trim();
    let targets = targets
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(targets);
    let targets = targets
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .map(identifier)
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err("'for' requires at least one loop variable".to_string());
    }
    let iterable = head[at + 2..].trim();
    Ok(Clause::For {
        targets,
        iterable: required("for", iterable, "an iterable")?,
    })
}

/// `expr as name`; either side may be missing.
fn split_binding(head: &str) -> Result<(&str, Option<String>), String> {
    let at = find_top_level(head, |s| s.starts_with("as") && s[2..].starts_with(char::is_whitespace))
        .filter(|&at| at == 0 || head[..at].ends_with(char::is_whitespace));
    match at {
        Some(at) => Ok((head[..at].trim(), Some(identifier(&head[at + 2..])?))),
        None => Ok((head, None)),
    }
}

fn parse_def(head: &str) -> Result<Clause, String> {
    let (name, params) = match head.find('(') {
        Some(open) => {
            let params = head[open + 1..]
                .trim_end()
                .strip_suffix(')')
                .ok_or_else(|| format!("unclosed parameter list in 'def {head}'"))?;
            (&head[..open], params)
        }
        None => (head, ""),
    };
    let name = identifier(name)?;

    let mut parsed = Vec::new();
    let mut rest = params;
    while !rest.trim().is_empty() {
        let (param, tail) = match find_top_level(rest, |s| s.starts_with(',')) {
            Some(at) => (&rest[..at], &rest[at + 1..]),
            None => (rest, ""),
        };
        let param = match param.split_once('=') {
            Some((pname, default)) if !default.trim().is_empty() => Param {
                name: identifier(pname)?,
                default: Some(default.trim().to_string()),
            },
            Some(_) => return Err(format!("missing default value in 'def {head}'")),
            None => Param {
                name: identifier(param)?,
                default: None,
            },
        };
        if parsed.iter().any(|p: &Param| p.name == param.name) {
            return Err(format!("duplicate parameter '{}' in 'def {name}'", param.name));
        }
        parsed.push(param);
        rest = tail;
    }

    Ok(Clause::Def {
        name,
        params: parsed,
    })
}

/// Byte offset of the first position outside strings and brackets where
/// `matches` holds. Positions in the middle of an identifier are skipped.
fn find_top_level(text: &str, matches: impl Fn(&str) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;

    for (at, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            prev = Some(c);
            continue;
        }
        let in_word = c.is_ascii_alphanumeric() && prev.is_some_and(|p| p.is_ascii_alphanumeric() || p == '_');
        if depth == 0 && !in_word && matches(&text[at..]) {
            return Some(at);
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        prev = Some(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_extraction() {
        assert_eq!(keyword("  if x > 1:"), "if");
        assert_eq!(keyword("endfor"), "endfor");
        assert_eq!(keyword("x=1"), "x");
        assert_eq!(keyword("(a)"), "");
    }

    #[test]
    fn test_classify_defaults() {
        let syntax = Syntax::default();
        assert_eq!(syntax.classify("if x"), DirectiveKind::BlockOpening);
        assert_eq!(syntax.classify("for i in xs:"), DirectiveKind::BlockOpening);
        assert_eq!(syntax.classify("else:"), DirectiveKind::Dedent);
        assert_eq!(syntax.classify("except ValueError as e"), DirectiveKind::Dedent);
        assert_eq!(syntax.classify("end"), DirectiveKind::EndMarker);
        assert_eq!(syntax.classify("endif"), DirectiveKind::EndMarker);
        assert_eq!(syntax.classify("end if"), DirectiveKind::EndMarker);
        assert_eq!(syntax.classify("endpoint = 3"), DirectiveKind::Plain);
        assert_eq!(syntax.classify("ending(x)"), DirectiveKind::Plain);
        assert_eq!(syntax.classify("x = 1"), DirectiveKind::Plain);
        assert_eq!(syntax.classify("iffy = 2"), DirectiveKind::Plain);
    }

    #[test]
    fn test_narrowed_keyword_list() {
        let syntax = Syntax {
            blocks: vec!["if".into(), "else".into()],
            dedent_blocks: vec!["else".into()],
            ..Syntax::default()
        };
        syntax.validate().unwrap();
        assert_eq!(syntax.classify("for x in y"), DirectiveKind::Plain);
    }

    #[test]
    fn test_validate_rejects_bad_syntax() {
        let unknown = Syntax {
            blocks: vec!["foreach".into()],
            dedent_blocks: vec![],
            ..Syntax::default()
        };
        assert!(unknown.validate().is_err());

        let missing = Syntax {
            blocks: vec!["if".into()],
            ..Syntax::default()
        };
        assert!(missing.validate().is_err());

        let empty = Syntax {
            single_line: String::new(),
            ..Syntax::default()
        };
        assert!(empty.validate().is_err());
        assert!(Syntax::default().validate().is_ok());
    }

    #[test]
    fn test_strip_continuation() {
        let syntax = Syntax::default();
        assert_eq!(syntax.strip_continuation("x = 1 + \\  "), ("x = 1 +", true));
        assert_eq!(syntax.strip_continuation("x = 1"), ("x = 1", false));
    }

    #[test]
    fn test_parse_conditions_and_one_liners() {
        let header = parse_header("if x > 1:").unwrap();
        assert_eq!(
            header.clause,
            Clause::If {
                cond: "x > 1".into()
            }
        );
        assert_eq!(header.inline, None);

        let header = parse_header("if show").unwrap();
        assert_eq!(
            header.clause,
            Clause::If {
                cond: "show".into()
            }
        );

        let header = parse_header("if admin: include('badge')").unwrap();
        assert_eq!(header.inline.as_deref(), Some("include('badge')"));

        // colons inside strings and brackets do not split
        let header = parse_header("if d['a:b'] == x[1:]:").unwrap();
        assert_eq!(
            header.clause,
            Clause::If {
                cond: "d['a:b'] == x[1:]".into()
            }
        );
        assert!(parse_header("if:").is_err());
        assert!(parse_header("else x").is_err());
    }

    #[test]
    fn test_parse_for() {
        let header = parse_header("for k, v in d.items():").unwrap();
        assert_eq!(
            header.clause,
            Clause::For {
                targets: vec!["k".into(), "v".into()],
                iterable: "d.items()".into(),
            }
        );
        let header = parse_header("for (a, b) in pairs").unwrap();
        assert_eq!(
            header.clause,
            Clause::For {
                targets: vec!["a".into(), "b".into()],
                iterable: "pairs".into(),
            }
        );
        let header = parse_header("for index in indexes").unwrap();
        assert_eq!(
            header.clause,
            Clause::For {
                targets: vec!["index".into()],
                iterable: "indexes".into(),
            }
        );
        assert!(parse_header("for x").is_err());
        assert!(parse_header("for 1 in xs").is_err());
    }

    #[test]
    fn test_parse_bindings() {
        assert_eq!(
            parse_header("except ValueError as err:").unwrap().clause,
            Clause::Except {
                binding: Some("err".into())
            }
        );
        assert_eq!(
            parse_header("except:").unwrap().clause,
            Clause::Except {
                binding: None
            }
        );
        assert_eq!(
            parse_header("with user.name as alias").unwrap().clause,
            Clause::With {
                expr: "user.name".into(),
                binding: Some("alias".into()),
            }
        );
        assert_eq!(
            parse_header("with 'has as inside'").unwrap().clause,
            Clause::With {
                expr: "'has as inside'".into(),
                binding: None,
            }
        );
    }

    #[test]
    fn test_parse_def() {
        assert_eq!(
            parse_header("def greet(who, punct='!'):").unwrap().clause,
            Clause::Def {
                name: "greet".into(),
                params: vec![
                    Param {
                        name: "who".into(),
                        default: None
                    },
                    Param {
                        name: "punct".into(),
                        default: Some("'!'".into())
                    },
                ],
            }
        );
        assert_eq!(
            parse_header("def rule").unwrap().clause,
            Clause::Def {
                name: "rule".into(),
                params: vec![],
            }
        );
        assert!(parse_header("def f(a, a)").is_err());
        assert!(parse_header("def f(a").is_err());
        assert!(parse_header("def (a)").is_err());
    }
}

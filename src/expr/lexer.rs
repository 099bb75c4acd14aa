//! Tokenizer for the default expression language.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    /// Operators and punctuation, longest match first.
    Punct(&'static str),
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ident(name) => f.write_str(name),
            Self::Punct(p) => f.write_str(p),
        }
    }
}

const PUNCTUATION: &[&str] = &[
    "//", "==", "!=", "<=", ">=", "+=", "-=", "(", ")", "[", "]", ",", ".", ":", "=", "<", ">",
    "+", "-", "*", "/", "%",
];

/// Split `source` into tokens. Newlines and `#` comments count as whitespace.
pub(crate) fn lex(source: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == '\\' {
            i += 1;
        } else if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            if is_float {
                tokens.push(Tok::Float(text.parse().map_err(|_| format!("invalid number '{text}'"))?));
            } else {
                tokens.push(Tok::Int(text.parse().map_err(|_| format!("integer '{text}' is too large"))?));
            }
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Tok::Ident(chars[start..i].iter().collect()));
        } else if c == '\'' || c == '"' {
            let (text, next) = lex_string(&chars, i)?;
            tokens.push(Tok::Str(text));
            i = next;
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let punct = PUNCTUATION
                .iter()
                .find(|p| rest.starts_with(**p))
                .ok_or_else(|| format!("unexpected character '{c}'"))?;
            tokens.push(Tok::Punct(*punct));
            i += punct.len();
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((text, i + 1)),
            '\\' if i + 1 < chars.len() => {
                text.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err("unterminated string literal".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_mixed() {
        let tokens = lex("items[0].name != 'x\\'y' and n >= 1.5").unwrap();
        assert_eq!(
            tokens,
            vec![
                Tok::Ident("items".into()),
                Tok::Punct("["),
                Tok::Int(0),
                Tok::Punct("]"),
                Tok::Punct("."),
                Tok::Ident("name".into()),
                Tok::Punct("!="),
                Tok::Str("x'y".into()),
                Tok::Ident("and".into()),
                Tok::Ident("n".into()),
                Tok::Punct(">="),
                Tok::Float(1.5),
            ]
        );
    }

    #[test]
    fn test_lex_floor_div_and_comment() {
        let tokens = lex("a // 2 # trailing").unwrap();
        assert_eq!(tokens, vec![Tok::Ident("a".into()), Tok::Punct("//"), Tok::Int(2)]);
    }

    #[test]
    fn test_lex_errors() {
        assert!(lex("'open").is_err());
        assert!(lex("a $ b").is_err());
    }
}

//! Splitting literal template text into text and `{{ }}` expression tokens.

use regex::Regex;
use std::sync::LazyLock;

/// `{{ … }}` pair, non-greedy and confined to one line.
static EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("expression pattern is valid"));

/// One piece of a text fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Literal text, written verbatim.
    Text(&'a str),
    /// `{{! expr }}`; the `!` is stripped.
    RawExpr(&'a str),
    /// `{{ expr }}`
    EscapedExpr(&'a str),
}

/// Lazy token iterator over one fragment of template text.
///
/// Cloning restarts from the clone point. Empty text and empty expressions are
/// skipped; an unterminated `{{` leaves the rest of the fragment as text.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
    pending: Option<Token<'a>>,
}

/// Tokenize `text`.
///
/// # Examples
///
/// ```
/// use swinf_template::templating::{Token, tokenize};
///
/// let tokens: Vec<_> = tokenize("Hi {{ name }}{{! html }}").collect();
/// assert_eq!(
///     tokens,
///     vec![Token::Text("Hi "), Token::EscapedExpr("name"), Token::RawExpr("html")]
/// );
/// ```
#[must_use]
pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens {
        text,
        pos: 0,
        pending: None,
    }
}

/// Position of the first `marker` at or after `from` that is not inside a
/// `{{ … }}` pair.
pub(crate) fn find_outside_expressions(text: &str, from: usize, marker: &str) -> Option<usize> {
    let mut pos = from;
    loop {
        let at = pos + text[pos..].find(marker)?;
        match EXPRESSION.find_at(text, pos) {
            Some(expr) if expr.start() <= at => pos = expr.end(),
            _ => return Some(at),
        }
    }
}

fn expression_token(inner: &str) -> Option<Token<'_>> {
    let inner = inner.trim();
    match inner.strip_prefix('!') {
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => Some(Token::RawExpr(raw.trim())),
        None if inner.is_empty() => None,
        None => Some(Token::EscapedExpr(inner)),
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.pending.take() {
                return Some(token);
            }
            if self.pos >= self.text.len() {
                return None;
            }

            let (literal, next) = match EXPRESSION.captures_at(self.text, self.pos) {
                Some(captures) => {
                    let whole = captures.get(0)?;
                    self.pending = captures.get(1).and_then(|inner| expression_token(inner.as_str()));
                    (&self.text[self.pos..whole.start()], whole.end())
                }
                None => (&self.text[self.pos..], self.text.len()),
            };
            self.pos = next;
            if !literal.is_empty() {
                return Some(Token::Text(literal));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str) -> Vec<Token<'_>> {
        tokenize(text).collect()
    }

    #[test]
    fn test_text_only() {
        assert_eq!(collect("plain <p> text\n"), vec![Token::Text("plain <p> text\n")]);
        assert!(collect("").is_empty());
    }

    #[test]
    fn test_expressions_and_empty_segments() {
        assert_eq!(
            collect("{{a}}{{ !b }}c{{   }}"),
            vec![Token::EscapedExpr("a"), Token::RawExpr("b"), Token::Text("c")]
        );
    }

    #[test]
    fn test_non_greedy_pairs() {
        assert_eq!(
            collect("{{ x }} and {{ y }}"),
            vec![Token::EscapedExpr("x"), Token::Text(" and "), Token::EscapedExpr("y")]
        );
    }

    #[test]
    fn test_find_outside_expressions() {
        assert_eq!(find_outside_expressions("a {% b %}", 0, "{%"), Some(2));
        assert_eq!(find_outside_expressions("{{ '{%' }} {%", 0, "{%"), Some(11));
        assert_eq!(find_outside_expressions("{{ '{%' }}", 0, "{%"), None);
        assert_eq!(find_outside_expressions("{{ open {%", 0, "{%"), Some(8));
        assert_eq!(find_outside_expressions("{% x %} {% y %}", 2, "{%"), Some(8));
    }

    #[test]
    fn test_unterminated_delimiter_is_literal() {
        assert_eq!(collect("a {{ b"), vec![Token::Text("a {{ b")]);
        assert_eq!(
            collect("{{ok}} then {{ broken"),
            vec![Token::EscapedExpr("ok"), Token::Text(" then {{ broken")]
        );
    }

    #[test]
    fn test_tokens_are_restartable() {
        let mut tokens = tokenize("x{{y}}z");
        assert_eq!(tokens.next(), Some(Token::Text("x")));
        let rest = tokens.clone();
        assert_eq!(tokens.collect::<Vec<_>>(), rest.collect::<Vec<_>>());
    }
}

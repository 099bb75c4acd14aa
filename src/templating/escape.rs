//! HTML escaping and the escaped/raw output formatter.

use serde_json::Value;

use crate::expr::to_text;

/// Signature of an escape function.
pub type EscapeFn = fn(&str) -> String;

/// Escape HTML special characters `& < > " '`.
///
/// # Examples
///
/// ```
/// use swinf_template::templating::html_escape;
///
/// assert_eq!(html_escape("<a href='x'>"), "&lt;a href=&#039;x&#039;&gt;");
/// ```
#[must_use]
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Decides how `{{ e }}` and `{{! e }}` values become text.
///
/// Built once by [`Formatter::prepare`]; immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    escape: EscapeFn,
    noescape: bool,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::prepare(false, html_escape)
    }
}

impl Formatter {
    /// With `noescape` set, unmarked expressions are written raw and `!`-marked
    /// ones are escaped.
    #[must_use]
    pub const fn prepare(noescape: bool, escape: EscapeFn) -> Self {
        Self {
            escape,
            noescape,
        }
    }

    /// Text for an unmarked `{{ e }}` expression.
    #[must_use]
    pub fn unmarked(&self, value: &Value) -> String {
        if self.noescape { to_text(value) } else { (self.escape)(&to_text(value)) }
    }

    /// Text for a `{{! e }}` expression.
    #[must_use]
    pub fn marked(&self, value: &Value) -> String {
        if self.noescape { (self.escape)(&to_text(value)) } else { to_text(value) }
    }

    /// Apply the escape function regardless of mode.
    #[must_use]
    pub fn escape(&self, text: &str) -> String {
        (self.escape)(text)
    }
}

//! Compiled template programs.
//!
//! A [`Program`] is a flat list of [`Instruction`]s. Each instruction records
//! the block depth it was emitted at, so the list reads like indented code
//! (see [`Program::listing`]). Block headers ([`Op::Clause`]) also carry the
//! index of the instruction that ends their body: the next clause of the same
//! construct (`elif`, `else`, ...) or its [`Op::End`] marker. The renderer
//! follows these links instead of re-deriving structure from depths.

use std::fmt;

/// One piece of a `Print` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal text
    Text(String),
    /// Expression whose value is written; `raw` for `{{! }}`. `line` is
    /// where the expression itself sits, which may follow the line of the
    /// `Print` that holds it.
    Expr {
        raw: bool,
        source: String,
        line: usize,
    },
}

/// A `def` parameter with its optional default expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub default: Option<String>,
}

/// A parsed block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    If {
        cond: String,
    },
    Elif {
        cond: String,
    },
    Else,
    For {
        targets: Vec<String>,
        iterable: String,
    },
    While {
        cond: String,
    },
    Try,
    Except {
        binding: Option<String>,
    },
    Finally,
    With {
        expr: String,
        binding: Option<String>,
    },
    Def {
        name: String,
        params: Vec<Param>,
    },
    Class {
        name: String,
    },
}

impl Clause {
    /// The directive keyword that introduces this clause.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::If {
                ..
            } => "if",
            Self::Elif {
                ..
            } => "elif",
            Self::Else => "else",
            Self::For {
                ..
            } => "for",
            Self::While {
                ..
            } => "while",
            Self::Try => "try",
            Self::Except {
                ..
            } => "except",
            Self::Finally => "finally",
            Self::With {
                ..
            } => "with",
            Self::Def {
                ..
            } => "def",
            Self::Class {
                ..
            } => "class",
        }
    }

    /// Whether this clause continues the construct above it.
    #[must_use]
    pub const fn is_dedent(&self) -> bool {
        matches!(
            self,
            Self::Elif { .. } | Self::Else | Self::Except { .. } | Self::Finally
        )
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::If {
                cond,
            }
            | Self::Elif {
                cond,
            }
            | Self::While {
                cond,
            } => write!(f, "{} {cond}:", self.keyword()),
            Self::Else | Self::Try | Self::Finally => write!(f, "{}:", self.keyword()),
            Self::For {
                targets,
                iterable,
            } => write!(f, "for {} in {iterable}:", targets.join(", ")),
            Self::Except {
                binding: Some(name),
            } => write!(f, "except as {name}:"),
            Self::Except {
                binding: None,
            } => write!(f, "except:"),
            Self::With {
                expr,
                binding,
            } => match binding {
                Some(name) => write!(f, "with {expr} as {name}:"),
                None => write!(f, "with {expr}:"),
            },
            Self::Def {
                name,
                params,
            } => {
                let params: Vec<String> = params
                    .iter()
                    .map(|p| match &p.default {
                        Some(default) => format!("{}={default}", p.name),
                        None => p.name.clone(),
                    })
                    .collect();
                write!(f, "def {name}({}):", params.join(", "))
            }
            Self::Class {
                name,
            } => write!(f, "class {name}:"),
        }
    }
}

/// What an instruction does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Append every fragment, in order, to the output.
    Print(Vec<Fragment>),
    /// Run a plain statement through the evaluator.
    Exec(String),
    /// Block header. `next` is the index where its body ends.
    Clause {
        clause: Clause,
        next: usize,
    },
    /// End marker; no runtime effect.
    End(String),
}

/// One emitted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Number of open blocks when the instruction was emitted
    pub depth: usize,
    /// 1-based source line
    pub line: usize,
    pub op: Op,
}

/// An immutable compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: String,
    instructions: Vec<Instruction>,
}

impl Program {
    pub(crate) const fn new(name: String, instructions: Vec<Instruction>) -> Self {
        Self {
            name,
            instructions,
        }
    }

    /// Identity of the template this program was compiled from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Human-readable listing: one instruction per line, indented by depth and
    /// prefixed with its source line.
    #[must_use]
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for instruction in &self.instructions {
            let indent = "    ".repeat(instruction.depth);
            let body = match &instruction.op {
                Op::Print(fragments) => {
                    let parts: Vec<String> = fragments
                        .iter()
                        .map(|fragment| match fragment {
                            Fragment::Text(text) => format!("{text:?}"),
                            Fragment::Expr {
                                raw: true,
                                source,
                                ..
                            } => format!("raw({source})"),
                            Fragment::Expr {
                                raw: false,
                                source,
                                ..
                            } => format!("escape({source})"),
                        })
                        .collect();
                    format!("print({})", parts.join(", "))
                }
                Op::Exec(statement) => statement.replace('\n', " "),
                Op::Clause {
                    clause,
                    next,
                } => format!("{clause}  # -> {next}"),
                Op::End(marker) => format!("# {marker}"),
            };
            out.push_str(&format!("{:>4} | {indent}{body}\n", instruction.line));
        }
        out
    }
}

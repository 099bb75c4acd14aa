//! Block-stack compiler: template source to [`Program`].
//!
//! The compiler walks the source one physical line at a time. Literal text is
//! tokenized into a pending `Print` buffer; a directive (a `%%` line or the
//! body of a `{% %}` tag) flushes that buffer and is then classified:
//!
//! - block openers (`if`, `for`, `def`, ...) are emitted at the current depth
//!   and push a [`Frame`];
//! - dedent clauses (`elif`, `else`, `except`, `finally`) pop the frame they
//!   continue, are emitted at the popped depth and push a new frame;
//! - end markers (`end`, `endif`, ...) pop and emit an `End` instruction;
//! - anything else is a plain statement.
//!
//! Whenever a frame is popped, the header it belonged to is back-patched with
//! the index of the instruction that ended it, which is how the executor finds
//! `else` branches and loop ends without scanning.
//!
//! A directive line ending in `\` is joined with the following physical lines
//! until one does not; those lines never touch the block stack.

use std::mem;

use crate::core::TemplateError;
use crate::expr::Evaluator;
use crate::templating::directive::{DirectiveKind, Syntax, keyword, parse_header};
use crate::templating::program::{Clause, Fragment, Instruction, Op, Program};
use crate::templating::tokenizer::{Token, find_outside_expressions, tokenize};

/// An open construct on the block stack.
#[derive(Debug)]
struct Frame {
    /// Clause currently open (`if`, `elif`, `else`, ...)
    keyword: &'static str,
    /// Clause that opened the construct
    opener: &'static str,
    line: usize,
    /// Index of the header to patch when the frame is popped
    header: usize,
}

/// A logical directive collected from several physical lines.
#[derive(Debug)]
struct Continuation {
    line: usize,
    parts: Vec<String>,
}

/// Compile `source` into a program named `name`.
///
/// Expressions and statements are validated with `evaluator` so that syntax
/// errors are reported with a line number before anything runs.
///
/// # Errors
///
/// - [`TemplateError::UnbalancedBlock`] for a dedent or end marker without an
///   open block, or a block left open at the end of the source
/// - [`TemplateError::Syntax`] for malformed headers, misplaced clauses and
///   expressions the evaluator rejects
pub fn compile(
    name: &str,
    source: &str,
    syntax: &Syntax,
    evaluator: &dyn Evaluator,
) -> Result<Program, TemplateError> {
    Compiler {
        name,
        source,
        syntax,
        evaluator,
        instructions: Vec::new(),
        stack: Vec::new(),
        pending: Vec::new(),
        pending_line: 0,
        continuation: None,
        in_tag: false,
    }
    .run()
}

struct Compiler<'a> {
    name: &'a str,
    source: &'a str,
    syntax: &'a Syntax,
    evaluator: &'a dyn Evaluator,
    instructions: Vec<Instruction>,
    stack: Vec<Frame>,
    pending: Vec<Fragment>,
    pending_line: usize,
    continuation: Option<Continuation>,
    /// Inside a `{% %}` tag that spans lines
    in_tag: bool,
}

impl Compiler<'_> {
    fn run(mut self) -> Result<Program, TemplateError> {
        let mut offset = 0;
        for (index, line) in self.source.split_inclusive('\n').enumerate() {
            self.physical_line(line, offset, index + 1)?;
            offset += line.len();
        }
        self.finish_continuation()?;
        self.flush();

        if let Some(frame) = self.stack.last() {
            return Err(TemplateError::UnbalancedBlock {
                template: self.name.to_string(),
                line: frame.line,
                message: format!("'{}' block is never closed", frame.opener),
            });
        }

        tracing::debug!(
            "Compiled template '{}' into {} instruction(s)",
            self.name,
            self.instructions.len()
        );
        Ok(Program::new(self.name.to_string(), self.instructions))
    }

    fn physical_line(&mut self, line: &str, offset: usize, lineno: usize) -> Result<(), TemplateError> {
        if self.in_tag {
            return self.tag_line(line, offset, lineno);
        }
        let trimmed = line.trim();
        let directive = trimmed.strip_prefix(self.syntax.single_line.as_str());
        if self.continuation.is_some() {
            return self.directive_line(directive.unwrap_or(trimmed), lineno);
        }
        match directive {
            Some(directive) => self.directive_line(directive, lineno),
            None => self.fragment(line, offset, lineno),
        }
    }

    /// Text that may contain `{% %}` tags. `offset` is its position in the
    /// source, used to look ahead for the end of a multi-line tag.
    fn fragment(&mut self, text: &str, offset: usize, lineno: usize) -> Result<(), TemplateError> {
        let syntax = self.syntax;
        let (start, end) = (syntax.block_start.as_str(), syntax.block_end.as_str());
        let standalone = self.is_standalone(text, offset);
        let mut pos = 0;

        while let Some(open) = find_outside_expressions(text, pos, start) {
            let body = open + start.len();
            if !standalone {
                self.text(&text[pos..open], lineno)?;
            }
            match text[body..].find(end) {
                Some(found) => {
                    let close = body + found;
                    self.directive_line(&text[body..close], lineno)?;
                    self.finish_continuation()?;
                    pos = close + end.len();
                }
                None if self.source[offset + body..].contains(end) => {
                    self.in_tag = true;
                    return self.directive_line(&text[body..], lineno);
                }
                None => return self.text(&text[open..], lineno),
            }
        }

        if standalone { Ok(()) } else { self.text(&text[pos..], lineno) }
    }

    /// A line holding only tags and whitespace is consumed whole.
    fn is_standalone(&self, text: &str, offset: usize) -> bool {
        let (start, end) = (self.syntax.block_start.as_str(), self.syntax.block_end.as_str());
        if !text.trim_start().starts_with(start) {
            return false;
        }
        let mut pos = 0;
        loop {
            let Some(open) = find_outside_expressions(text, pos, start) else {
                return text[pos..].trim().is_empty();
            };
            if !text[pos..open].trim().is_empty() {
                return false;
            }
            let body = open + start.len();
            match text[body..].find(end) {
                Some(found) => pos = body + found + end.len(),
                None => return self.source[offset + body..].contains(end),
            }
        }
    }

    /// A physical line inside a multi-line tag.
    fn tag_line(&mut self, line: &str, offset: usize, lineno: usize) -> Result<(), TemplateError> {
        let syntax = self.syntax;
        let end = syntax.block_end.as_str();
        let Some(close) = line.find(end) else {
            return self.directive_line(self.strip_single_line(line), lineno);
        };

        self.directive_line(self.strip_single_line(&line[..close]), lineno)?;
        self.finish_continuation()?;
        self.in_tag = false;

        let rest_at = close + end.len();
        let rest = &line[rest_at..];
        if rest.trim().is_empty() {
            return Ok(());
        }
        self.fragment(rest, offset + rest_at, lineno)
    }

    fn strip_single_line<'s>(&self, line: &'s str) -> &'s str {
        let line = line.trim();
        line.strip_prefix(self.syntax.single_line.as_str()).unwrap_or(line)
    }

    /// Literal text: tokenized into the pending `Print` buffer.
    fn text(&mut self, text: &str, lineno: usize) -> Result<(), TemplateError> {
        for token in tokenize(text) {
            if self.pending.is_empty() {
                self.pending_line = lineno;
            }
            match token {
                Token::Text(literal) => {
                    if let Some(Fragment::Text(previous)) = self.pending.last_mut() {
                        previous.push_str(literal);
                    } else {
                        self.pending.push(Fragment::Text(literal.to_string()));
                    }
                }
                Token::RawExpr(source) | Token::EscapedExpr(source) => {
                    self.check_expression(source, lineno)?;
                    self.pending.push(Fragment::Expr {
                        raw: matches!(token, Token::RawExpr(_)),
                        source: source.to_string(),
                        line: lineno,
                    });
                }
            }
        }
        Ok(())
    }

    /// One physical directive line; joins continuation lines.
    fn directive_line(&mut self, content: &str, lineno: usize) -> Result<(), TemplateError> {
        let (content, continues) = self.syntax.strip_continuation(content.trim());
        let mut pending = self.continuation.take().unwrap_or(Continuation {
            line: lineno,
            parts: Vec::new(),
        });
        pending.parts.push(content.to_string());
        if continues {
            self.continuation = Some(pending);
            return Ok(());
        }
        self.complete(pending)
    }

    fn finish_continuation(&mut self) -> Result<(), TemplateError> {
        match self.continuation.take() {
            Some(pending) => self.complete(pending),
            None => Ok(()),
        }
    }

    fn complete(&mut self, pending: Continuation) -> Result<(), TemplateError> {
        let statement = pending.parts.join("\n");
        let statement = statement.trim();
        if statement.is_empty() {
            return Ok(());
        }
        self.directive(statement, pending.line)
    }

    fn directive(&mut self, statement: &str, line: usize) -> Result<(), TemplateError> {
        self.flush();
        match self.syntax.classify(statement) {
            DirectiveKind::Plain => {
                self.evaluator
                    .check_statement(statement)
                    .map_err(|message| self.syntax_error(line, message))?;
                self.emit(line, Op::Exec(statement.to_string()));
            }
            DirectiveKind::EndMarker => {
                let frame = self.pop(line, keyword(statement))?;
                if frame.opener == "try" && frame.keyword == "try" {
                    return Err(self.syntax_error(
                        line,
                        "'try' block needs an 'except' or 'finally' clause".to_string(),
                    ));
                }
                self.warn_on_mismatch(statement, &frame, line);
                let index = self.emit(line, Op::End(statement.to_string()));
                self.link(frame.header, index);
            }
            DirectiveKind::Dedent => {
                let frame = self.pop(line, keyword(statement))?;
                let header = parse_header(statement).map_err(|message| self.syntax_error(line, message))?;
                let word = header.clause.keyword();
                if !continues(frame.keyword, frame.opener, word) {
                    return Err(self.syntax_error(
                        line,
                        format!("'{word}' cannot follow '{}'", frame.keyword),
                    ));
                }
                self.check_clause(&header.clause, line)?;
                let index = self.emit(line, clause_op(header.clause));
                self.link(frame.header, index);
                self.open(word, frame.opener, line, index, header.inline)?;
            }
            DirectiveKind::BlockOpening => {
                let header = parse_header(statement).map_err(|message| self.syntax_error(line, message))?;
                let word = header.clause.keyword();
                self.check_clause(&header.clause, line)?;
                let index = self.emit(line, clause_op(header.clause));
                self.open(word, word, line, index, header.inline)?;
            }
        }
        Ok(())
    }

    /// Push a frame for `header`, or emit a one-liner body in place.
    fn open(
        &mut self,
        keyword: &'static str,
        opener: &'static str,
        line: usize,
        header: usize,
        inline: Option<String>,
    ) -> Result<(), TemplateError> {
        let frame = Frame {
            keyword,
            opener,
            line,
            header,
        };
        match inline {
            None => self.stack.push(frame),
            Some(body) => {
                self.evaluator
                    .check_statement(&body)
                    .map_err(|message| self.syntax_error(line, message))?;
                self.stack.push(frame);
                self.emit(line, Op::Exec(body));
                self.stack.pop();
                self.link(header, self.instructions.len());
            }
        }
        Ok(())
    }

    fn pop(&mut self, line: usize, word: &str) -> Result<Frame, TemplateError> {
        self.stack.pop().ok_or_else(|| TemplateError::UnbalancedBlock {
            template: self.name.to_string(),
            line,
            message: format!("'{word}' without an open block"),
        })
    }

    fn warn_on_mismatch(&self, statement: &str, frame: &Frame, line: usize) {
        let word = keyword(statement);
        let named = match &word["end".len()..] {
            "" => keyword(statement.trim_start()[word.len()..].trim_start()),
            suffix => suffix,
        };
        if !named.is_empty() && named != frame.opener && named != frame.keyword {
            tracing::warn!(
                "{}:{}: '{}' closes a '{}' block opened at line {}",
                self.name,
                line,
                statement,
                frame.opener,
                frame.line
            );
        }
    }

    fn check_clause(&self, clause: &Clause, line: usize) -> Result<(), TemplateError> {
        match clause {
            Clause::If {
                cond,
            }
            | Clause::Elif {
                cond,
            }
            | Clause::While {
                cond,
            } => self.check_expression(cond, line),
            Clause::For {
                iterable,
                ..
            } => self.check_expression(iterable, line),
            Clause::With {
                expr,
                ..
            } => self.check_expression(expr, line),
            Clause::Def {
                params,
                ..
            } => params
                .iter()
                .filter_map(|param| param.default.as_deref())
                .try_for_each(|default| self.check_expression(default, line)),
            Clause::Else
            | Clause::Try
            | Clause::Except {
                ..
            }
            | Clause::Finally
            | Clause::Class {
                ..
            } => Ok(()),
        }
    }

    fn check_expression(&self, source: &str, line: usize) -> Result<(), TemplateError> {
        self.evaluator
            .check_expression(source)
            .map_err(|message| self.syntax_error(line, format!("{message} in '{source}'")))
    }

    fn syntax_error(&self, line: usize, message: String) -> TemplateError {
        TemplateError::Syntax {
            template: self.name.to_string(),
            line,
            message,
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let fragments = mem::take(&mut self.pending);
            self.emit(self.pending_line, Op::Print(fragments));
        }
    }

    fn emit(&mut self, line: usize, op: Op) -> usize {
        self.instructions.push(Instruction {
            depth: self.stack.len(),
            line,
            op,
        });
        self.instructions.len() - 1
    }

    fn link(&mut self, header: usize, target: usize) {
        if let Some(Instruction {
            op: Op::Clause {
                next,
                ..
            },
            ..
        }) = self.instructions.get_mut(header)
        {
            *next = target;
        }
    }
}

/// A header whose `next` link is patched when its block closes.
fn clause_op(clause: Clause) -> Op {
    Op::Clause {
        clause,
        next: 0,
    }
}

/// Whether `next` may follow the open clause `previous` of a construct
/// opened by `opener`.
fn continues(previous: &str, opener: &str, next: &str) -> bool {
    match next {
        "elif" => matches!(previous, "if" | "elif"),
        "else" => matches!(previous, "if" | "elif" | "for" | "while" | "except"),
        "except" => matches!(previous, "try" | "except"),
        "finally" => matches!(previous, "try" | "except") || (previous == "else" && opener == "try"),
        _ => false,
    }
}

//! Pratt parser for the default expression language.
//!
//! Binding powers are `(left, right)` pairs: left-associative operators use
//! `right = left + 1`.

use serde_json::Value;

use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::lexer::{Tok, lex};

const CONDITIONAL: (u8, u8) = (2, 1);
const OR: (u8, u8) = (3, 4);
const AND: (u8, u8) = (5, 6);
const NOT_PREFIX: u8 = 7;
const COMPARE: (u8, u8) = (9, 10);
const SUM: (u8, u8) = (11, 12);
const PRODUCT: (u8, u8) = (13, 14);
const NEG_PREFIX: u8 = 15;

/// Parse a complete expression.
pub(crate) fn parse_expression(source: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(source)?;
    if parser.tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let expr = parser.expr(0)?;
    parser.finish()?;
    Ok(expr)
}

/// Parse an expression statement or an assignment.
pub(crate) fn parse_statement(source: &str) -> Result<Stmt, String> {
    let mut parser = Parser::new(source)?;
    if let [Tok::Ident(target), Tok::Punct(op @ ("=" | "+=" | "-=")), ..] = parser.tokens.as_slice() {
        let target = target.clone();
        let op = match *op {
            "+=" => Some(BinaryOp::Add),
            "-=" => Some(BinaryOp::Sub),
            _ => None,
        };
        parser.pos = 2;
        let value = parser.expr(0)?;
        parser.finish()?;
        return Ok(Stmt::Assign {
            target,
            op,
            value,
        });
    }
    if parser.tokens.is_empty() {
        return Err("empty statement".to_string());
    }
    let expr = parser.expr(0)?;
    parser.finish()?;
    Ok(Stmt::Expr(expr))
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: lex(source)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Tok::Punct(p)) if *p == punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(name)) if name == keyword)
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), String> {
        if self.at_punct(punct) {
            self.pos += 1;
            Ok(())
        } else {
            Err(match self.peek() {
                Some(tok) => format!("expected '{punct}', found '{tok}'"),
                None => format!("expected '{punct}', found end of input"),
            })
        }
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!("unexpected '{tok}'")),
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<Expr, String> {
        let mut lhs = self.prefix()?;

        loop {
            match self.postfix(lhs)? {
                Ok(expr) => lhs = expr,
                Err(expr) => {
                    lhs = expr;
                    break;
                }
            }
        }

        loop {
            if self.at_keyword("if") {
                if CONDITIONAL.0 < min_bp {
                    break;
                }
                self.pos += 1;
                let cond = self.expr(OR.0)?;
                if !self.at_keyword("else") {
                    return Err("conditional expression is missing 'else'".to_string());
                }
                self.pos += 1;
                let otherwise = self.expr(CONDITIONAL.1)?;
                lhs = Expr::Conditional {
                    then: Box::new(lhs),
                    cond: Box::new(cond),
                    otherwise: Box::new(otherwise),
                };
                continue;
            }

            let Some((op, (left_bp, right_bp), width)) = self.infix_op() else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.pos += width;
            let rhs = self.expr(right_bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    /// Operator at the cursor with its binding power and token width.
    fn infix_op(&self) -> Option<(BinaryOp, (u8, u8), usize)> {
        let op = match self.peek()? {
            Tok::Ident(word) => match word.as_str() {
                "or" => (BinaryOp::Or, OR, 1),
                "and" => (BinaryOp::And, AND, 1),
                "in" => (BinaryOp::In, COMPARE, 1),
                "not" if matches!(self.peek_at(1), Some(Tok::Ident(next)) if next == "in") => {
                    (BinaryOp::NotIn, COMPARE, 2)
                }
                _ => return None,
            },
            Tok::Punct(p) => match *p {
                "==" => (BinaryOp::Eq, COMPARE, 1),
                "!=" => (BinaryOp::Ne, COMPARE, 1),
                "<" => (BinaryOp::Lt, COMPARE, 1),
                "<=" => (BinaryOp::Le, COMPARE, 1),
                ">" => (BinaryOp::Gt, COMPARE, 1),
                ">=" => (BinaryOp::Ge, COMPARE, 1),
                "+" => (BinaryOp::Add, SUM, 1),
                "-" => (BinaryOp::Sub, SUM, 1),
                "*" => (BinaryOp::Mul, PRODUCT, 1),
                "/" => (BinaryOp::Div, PRODUCT, 1),
                "//" => (BinaryOp::FloorDiv, PRODUCT, 1),
                "%" => (BinaryOp::Mod, PRODUCT, 1),
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn prefix(&mut self) -> Result<Expr, String> {
        let tok = self.next().ok_or_else(|| "unexpected end of expression".to_string())?;
        match tok {
            Tok::Int(i) => Ok(Expr::Literal(Value::from(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::from(f))),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Ident(word) => match word.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "None" | "null" => Ok(Expr::Literal(Value::Null)),
                "not" => Ok(Expr::Unary(UnaryOp::Not, Box::new(self.expr(NOT_PREFIX)?))),
                _ => Ok(Expr::Name(word)),
            },
            Tok::Punct("-") => Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.expr(NEG_PREFIX)?))),
            Tok::Punct("+") => self.expr(NEG_PREFIX),
            Tok::Punct("(") => {
                let inner = self.expr(0)?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Tok::Punct("[") => {
                let mut items = Vec::new();
                while !self.at_punct("]") {
                    items.push(self.expr(0)?);
                    if !self.at_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                self.pos += 1;
                Ok(Expr::List(items))
            }
            other => Err(format!("unexpected '{other}'")),
        }
    }

    /// Apply one postfix operation (call, attribute, index) if present.
    ///
    /// Returns `Err(expr)` unchanged when there is nothing to apply.
    fn postfix(&mut self, lhs: Expr) -> Result<Result<Expr, Expr>, String> {
        if self.at_punct("(") {
            self.pos += 1;
            let (args, kwargs) = self.arguments()?;
            return Ok(Ok(Expr::Call {
                callee: Box::new(lhs),
                args,
                kwargs,
            }));
        }
        if self.at_punct(".") {
            self.pos += 1;
            return match self.next() {
                Some(Tok::Ident(name)) => Ok(Ok(Expr::Attr(Box::new(lhs), name))),
                Some(Tok::Int(index)) => {
                    Ok(Ok(Expr::Index(Box::new(lhs), Box::new(Expr::Literal(Value::from(index))))))
                }
                _ => Err("expected attribute name after '.'".to_string()),
            };
        }
        if self.at_punct("[") {
            self.pos += 1;
            let index = self.expr(0)?;
            self.expect_punct("]")?;
            return Ok(Ok(Expr::Index(Box::new(lhs), Box::new(index))));
        }
        Ok(Err(lhs))
    }

    fn arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), String> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.at_punct(")") {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Some(Tok::Ident(name)), Some(Tok::Punct("="))) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.pos += 2;
                kwargs.push((name, self.expr(0)?));
            } else if kwargs.is_empty() {
                args.push(self.expr(0)?);
            } else {
                return Err("positional argument follows keyword argument".to_string());
            }
            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }
        self.pos += 1;
        Ok((args, kwargs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a or b and not c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                name("a"),
                Box::new(Expr::Binary(
                    BinaryOp::And,
                    name("b"),
                    Box::new(Expr::Unary(UnaryOp::Not, name("c")))
                ))
            )
        );
    }

    #[test]
    fn test_arithmetic_is_left_associative() {
        let expr = parse_expression("10 - 4 - 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(
                    BinaryOp::Sub,
                    Box::new(Expr::Literal(json!(10))),
                    Box::new(Expr::Literal(json!(4)))
                )),
                Box::new(Expr::Literal(json!(3)))
            )
        );
    }

    #[test]
    fn test_call_with_keywords() {
        let expr = parse_expression("include('footer', year=2024)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                callee: name("include"),
                args: vec![Expr::Literal(json!("footer"))],
                kwargs: vec![("year".to_string(), Expr::Literal(json!(2024)))],
            }
        );
    }

    #[test]
    fn test_postfix_chain_and_not_in() {
        let expr = parse_expression("user.tags[0] not in banned").unwrap();
        let Expr::Binary(BinaryOp::NotIn, lhs, _) = expr else {
            panic!("expected not in");
        };
        assert!(matches!(*lhs, Expr::Index(..)));
    }

    #[test]
    fn test_conditional() {
        let expr = parse_expression("'yes' if ok else 'no'").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_statements() {
        assert_eq!(
            parse_statement("count += 1").unwrap(),
            Stmt::Assign {
                target: "count".to_string(),
                op: Some(BinaryOp::Add),
                value: Expr::Literal(json!(1)),
            }
        );
        assert!(matches!(parse_statement("x == 1").unwrap(), Stmt::Expr(_)));
    }

    #[test]
    fn test_errors() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("a +").is_err());
        assert!(parse_expression("(a").is_err());
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("f(x=1, 2)").is_err());
        assert!(parse_expression("a if b").is_err());
    }
}

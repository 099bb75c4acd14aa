//! Tree-walking interpreter for parsed expressions.

use serde_json::{Map, Value};
use strsim::levenshtein;

use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::value::{Num, compare, contains, is_truthy, length, to_text, type_name, values_equal};
use super::{EvalError, Scope};

/// Maximum Levenshtein distance, as a percentage of the name length, for
/// "did you mean" suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

pub(crate) struct Interpreter<'a> {
    scope: &'a mut dyn Scope,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(scope: &'a mut dyn Scope) -> Self {
        Self {
            scope,
        }
    }

    pub(crate) fn execute(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Assign {
                target,
                op,
                value,
            } => {
                let rhs = self.eval(value)?;
                let result = match op {
                    Some(op) => {
                        let current = self.name(target)?;
                        arithmetic(*op, &current, &rhs)?
                    }
                    None => rhs,
                };
                self.scope.assign(target, result);
            }
        }
        Ok(())
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => {
                Ok(Value::Array(items.iter().map(|item| self.eval(item)).collect::<Result<_, _>>()?))
            }
            Expr::Name(name) => self.name(name),
            Expr::Attr(target, attr) => {
                let target = self.eval(target)?;
                attribute(&target, attr)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(&target, &index)
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => self.call(callee, args, kwargs),
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!is_truthy(&self.eval(operand)?))),
            Expr::Unary(UnaryOp::Neg, operand) => {
                let value = self.eval(operand)?;
                match Num::of(&value) {
                    Some(Num::Int(i)) => Ok(Value::from(i.checked_neg().ok_or("integer overflow")?)),
                    Some(Num::Float(f)) => Ok(Num::Float(-f).into_value()),
                    None => Err(format!("bad operand type for unary -: '{}'", type_name(&value)).into()),
                }
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if is_truthy(&left) { self.eval(rhs) } else { Ok(left) }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if is_truthy(&left) { Ok(left) } else { self.eval(rhs) }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                binary(*op, &left, &right)
            }
            Expr::Conditional {
                then,
                cond,
                otherwise,
            } => {
                if is_truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn name(&self, name: &str) -> Result<Value, EvalError> {
        self.scope.lookup(name).ok_or_else(|| {
            let mut message = format!("name '{name}' is not defined");
            let suggestions = similar_names(name, &self.scope.names());
            if !suggestions.is_empty() {
                message.push_str(&format!("; did you mean '{}'?", suggestions.join("', '")));
            }
            EvalError::Message(message)
        })
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> Result<Value, EvalError> {
        let args: Vec<Value> = args.iter().map(|arg| self.eval(arg)).collect::<Result<_, _>>()?;
        let kwargs: Vec<(String, Value)> = kwargs
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.eval(value)?)))
            .collect::<Result<_, EvalError>>()?;

        match callee {
            Expr::Name(name) => {
                if let Some(result) = self.scope.call(name, &args, &kwargs)? {
                    return Ok(result);
                }
                match builtin(name, &args)? {
                    Some(result) => Ok(result),
                    None => Err(self.name(name).err().unwrap_or_else(|| {
                        EvalError::Message(format!("'{name}' is not callable"))
                    })),
                }
            }
            Expr::Attr(target, method_name) => {
                let target = self.eval(target)?;
                method(&target, method_name, &args)
            }
            other => {
                let value = self.eval(other)?;
                Err(format!("'{}' object is not callable", type_name(&value)).into())
            }
        }
    }
}

fn similar_names(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> = available.iter().map(|name| (name, levenshtein(target, name))).collect();
    scored.sort_by_key(|(_, distance)| *distance);
    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name.clone())
        .collect()
}

fn attribute(target: &Value, attr: &str) -> Result<Value, EvalError> {
    match target {
        Value::Object(map) => map
            .get(attr)
            .cloned()
            .ok_or_else(|| format!("'dict' object has no attribute '{attr}'").into()),
        other => Err(format!("'{}' object has no attribute '{attr}'", type_name(other)).into()),
    }
}

fn subscript(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Object(map), Value::String(key)) => {
            map.get(key).cloned().ok_or_else(|| format!("key '{key}' not found").into())
        }
        (Value::Array(items), _) => {
            let position = resolve_index(index, items.len())?;
            Ok(items[position].clone())
        }
        (Value::String(s), _) => {
            let chars: Vec<char> = s.chars().collect();
            let position = resolve_index(index, chars.len())?;
            Ok(Value::String(chars[position].to_string()))
        }
        (other, index) => Err(format!(
            "'{}' object is not subscriptable with '{}'",
            type_name(other),
            type_name(index)
        )
        .into()),
    }
}

fn resolve_index(index: &Value, len: usize) -> Result<usize, EvalError> {
    let Some(Num::Int(i)) = Num::of(index) else {
        return Err(format!("indices must be integers, not {}", type_name(index)).into());
    };
    let position = if i < 0 { i + len as i64 } else { i };
    if position < 0 || position >= len as i64 {
        return Err(format!("index {i} out of range").into());
    }
    Ok(position as usize)
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let ordered = |wanted: &[Ordering]| -> Result<Value, EvalError> {
        Ok(Value::Bool(wanted.contains(&compare(left, right)?)))
    };
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Lt => ordered(&[Ordering::Less]),
        BinaryOp::Le => ordered(&[Ordering::Less, Ordering::Equal]),
        BinaryOp::Gt => ordered(&[Ordering::Greater]),
        BinaryOp::Ge => ordered(&[Ordering::Greater, Ordering::Equal]),
        BinaryOp::In => Ok(Value::Bool(contains(right, left)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!contains(right, left)?)),
        _ => arithmetic(op, left, right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (op, left, right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => return Ok(Value::String(format!("{a}{b}"))),
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            return Ok(Value::Array(a.iter().chain(b).cloned().collect()));
        }
        (BinaryOp::Mul, Value::String(s), count) | (BinaryOp::Mul, count, Value::String(s))
            if matches!(Num::of(count), Some(Num::Int(_))) =>
        {
            let Some(Num::Int(n)) = Num::of(count) else { unreachable!() };
            return Ok(Value::String(s.repeat(usize::try_from(n).unwrap_or(0))));
        }
        _ => {}
    }

    let unsupported = || -> EvalError {
        format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            type_name(left),
            type_name(right)
        )
        .into()
    };
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(unsupported());
    };

    let result = match (a, b) {
        (Num::Int(x), Num::Int(y)) => match op {
            BinaryOp::Add => Num::Int(x.checked_add(y).ok_or("integer overflow")?),
            BinaryOp::Sub => Num::Int(x.checked_sub(y).ok_or("integer overflow")?),
            BinaryOp::Mul => Num::Int(x.checked_mul(y).ok_or("integer overflow")?),
            BinaryOp::Div if y == 0 => return Err("division by zero".into()),
            BinaryOp::Div => Num::Float(x as f64 / y as f64),
            BinaryOp::FloorDiv | BinaryOp::Mod if y == 0 => return Err("integer division or modulo by zero".into()),
            BinaryOp::FloorDiv => {
                let quotient = x.checked_div(y).ok_or("integer overflow")?;
                Num::Int(quotient - i64::from(x % y != 0 && (x < 0) != (y < 0)))
            }
            // `i64::MIN % -1` has no overflow-free remainder in Rust but is 0.
            BinaryOp::Mod => match x.checked_rem(y).unwrap_or(0) {
                r if r != 0 && (r < 0) != (y < 0) => Num::Int(r + y),
                r => Num::Int(r),
            },
            _ => return Err(unsupported()),
        },
        (a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            match op {
                BinaryOp::Add => Num::Float(x + y),
                BinaryOp::Sub => Num::Float(x - y),
                BinaryOp::Mul => Num::Float(x * y),
                BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => {
                    return Err("float division by zero".into());
                }
                BinaryOp::Div => Num::Float(x / y),
                BinaryOp::FloorDiv => Num::Float((x / y).floor()),
                BinaryOp::Mod => Num::Float(x - y * (x / y).floor()),
                _ => return Err(unsupported()),
            }
        }
    };
    Ok(result.into_value())
}

/// Pure builtins that need nothing from the render environment.
fn builtin(name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
    let result = match (name, args) {
        ("len", [value]) => Value::from(length(value)?),
        ("str", [value]) => Value::String(to_text(value)),
        ("int", [value]) => match (Num::of(value), value) {
            (Some(Num::Int(i)), _) => Value::from(i),
            (Some(Num::Float(f)), _) => Value::from(f.trunc() as i64),
            (None, Value::String(s)) => Value::from(
                s.trim().parse::<i64>().map_err(|_| format!("invalid literal for int(): '{s}'"))?,
            ),
            _ => return Err(format!("int() argument must be a string or a number, not '{}'", type_name(value)).into()),
        },
        ("range", bounds @ ([_] | [_, _] | [_, _, _])) => range(bounds)?,
        ("len" | "str" | "int" | "range", _) => {
            return Err(format!("{name}() got an unexpected number of arguments ({})", args.len()).into());
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn range(bounds: &[Value]) -> Result<Value, EvalError> {
    let ints: Vec<i64> = bounds
        .iter()
        .map(|value| match Num::of(value) {
            Some(Num::Int(i)) => Ok(i),
            _ => Err(EvalError::from(format!("range() expects integers, not {}", type_name(value)))),
        })
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("arity checked by caller"),
    };
    if step == 0 {
        return Err("range() arg 3 must not be zero".into());
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::from(current));
        // Overflowing means the next value lies past `stop`.
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::Array(items))
}

fn method(target: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let result = match (target, name, args) {
        (Value::Object(map), "items", []) => Value::Array(
            map.iter().map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()])).collect(),
        ),
        (Value::Object(map), "keys", []) => Value::Array(map.keys().cloned().map(Value::String).collect()),
        (Value::Object(map), "values", []) => Value::Array(map.values().cloned().collect()),
        (Value::Object(map), "get", [key]) => lookup_key(map, key).unwrap_or(Value::Null),
        (Value::Object(map), "get", [key, default]) => lookup_key(map, key).unwrap_or_else(|| default.clone()),
        (Value::String(s), "upper", []) => Value::String(s.to_uppercase()),
        (Value::String(s), "lower", []) => Value::String(s.to_lowercase()),
        (Value::String(s), "strip", []) => Value::String(s.trim().to_string()),
        (Value::String(s), "startswith", [Value::String(prefix)]) => Value::Bool(s.starts_with(prefix.as_str())),
        (Value::String(s), "endswith", [Value::String(suffix)]) => Value::Bool(s.ends_with(suffix.as_str())),
        (Value::String(s), "replace", [Value::String(from), Value::String(to)]) => {
            Value::String(s.replace(from.as_str(), to))
        }
        (Value::String(s), "split", []) => {
            Value::Array(s.split_whitespace().map(|part| Value::String(part.to_string())).collect())
        }
        (Value::String(s), "split", [Value::String(separator)]) => {
            Value::Array(s.split(separator.as_str()).map(|part| Value::String(part.to_string())).collect())
        }
        (Value::String(separator), "join", [Value::Array(items)]) => {
            Value::String(items.iter().map(to_text).collect::<Vec<_>>().join(separator))
        }
        (other, name, _) => {
            return Err(format!("'{}' object has no method '{name}' for these arguments", type_name(other)).into());
        }
    };
    Ok(result)
}

fn lookup_key(map: &Map<String, Value>, key: &Value) -> Option<Value> {
    key.as_str().and_then(|key| map.get(key)).cloned()
}

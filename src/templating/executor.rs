//! Program execution.
//!
//! [`RenderEnv`] walks a [`Program`] front to back. Text and expressions are
//! appended to the shared [`Output`]; plain statements go to the evaluator.
//! A block header starts a clause chain: the header, each `elif`/`else`/
//! `except`/`finally` that continues it (linked through `next`), and the
//! optional end marker. The whole chain is dispatched at once, then execution
//! resumes after it.
//!
//! `RenderEnv` is also the [`Scope`] the evaluator sees, which is where the
//! template builtins (`get`, `setdefault`, `defined`, `include`, `escape`),
//! macros and host helpers are called from.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::TemplateError;
use crate::expr::value::iterate;
use crate::expr::{EvalError, Evaluator, Scope, is_truthy, to_text, type_name};
use crate::templating::engine::TemplateEngine;
use crate::templating::env::{Binding, Macro, Namespace, Output};
use crate::templating::escape::Formatter;
use crate::templating::program::{Clause, Fragment, Instruction, Op, Program};

/// Builtins every template can call.
pub const BUILTINS: &[&str] = &["get", "setdefault", "defined", "include", "escape"];

/// Nested macro calls allowed before a call fails.
const MAX_MACRO_DEPTH: usize = 64;

/// Per-call settings shared by a render and every template it includes.
#[derive(Clone, Copy)]
pub(crate) struct ExecContext<'a> {
    pub engine: &'a TemplateEngine,
    pub evaluator: &'a dyn Evaluator,
    pub formatter: Formatter,
    pub lookup: &'a [PathBuf],
}

/// Run `program` from start to end with a namespace of `values` plus the
/// engine's extensions. `depth` counts enclosing includes.
pub(crate) fn run(
    ctx: ExecContext<'_>,
    program: &Arc<Program>,
    output: &mut Output,
    values: Map<String, Value>,
    depth: usize,
) -> Result<(), TemplateError> {
    let mut env = RenderEnv {
        ctx,
        output,
        namespace: Namespace::new(ctx.engine.extensions(), values),
        depth,
        macro_depth: 0,
    };
    env.run(program, 0, program.len())
}

/// One clause of a chain with its body range.
struct Branch<'p> {
    clause: &'p Clause,
    line: usize,
    body: (usize, usize),
}

/// Collect the clause chain starting at `header`; returns it with the index
/// execution resumes at.
fn chain(program: &Program, header: usize) -> (Vec<Branch<'_>>, usize) {
    let instructions = program.instructions();
    let depth = instructions[header].depth;
    let mut branches = Vec::new();
    let mut at = header;
    loop {
        let instruction = &instructions[at];
        let Op::Clause {
            clause,
            next,
        } = &instruction.op
        else {
            return (branches, at);
        };
        let next = *next;
        branches.push(Branch {
            clause,
            line: instruction.line,
            body: (at + 1, next),
        });
        match instructions.get(next) {
            Some(Instruction {
                depth: d,
                op: Op::Clause {
                    clause,
                    ..
                },
                ..
            }) if *d == depth && clause.is_dedent() => at = next,
            Some(Instruction {
                depth: d,
                op: Op::End(_),
                ..
            }) if *d == depth => return (branches, next + 1),
            _ => return (branches, next),
        }
    }
}

fn expression_failed(program: &Program, line: usize, expression: &str, message: String) -> TemplateError {
    TemplateError::ExpressionFailed {
        template: program.name().to_string(),
        line,
        expression: expression.to_string(),
        message,
    }
}

/// Evaluator failures become `ExpressionFailed` at this line; nested template
/// failures pass through unchanged.
fn failure(program: &Program, line: usize, expression: &str, error: EvalError) -> TemplateError {
    match error {
        EvalError::Template(inner) => *inner,
        EvalError::Message(message) => expression_failed(program, line, expression, message),
    }
}

/// Text bound by `except ... as name`.
fn error_text(error: &TemplateError) -> String {
    match error {
        TemplateError::ExpressionFailed {
            message,
            ..
        } => message.clone(),
        other => other.to_string(),
    }
}

/// Mutable state of one template execution.
pub(crate) struct RenderEnv<'a> {
    ctx: ExecContext<'a>,
    output: &'a mut Output,
    namespace: Namespace,
    depth: usize,
    macro_depth: usize,
}

impl RenderEnv<'_> {
    fn run(&mut self, program: &Arc<Program>, start: usize, end: usize) -> Result<(), TemplateError> {
        let instructions = program.instructions();
        let mut pc = start;
        while pc < end {
            let instruction = &instructions[pc];
            pc = match &instruction.op {
                Op::Print(fragments) => {
                    self.print(program, fragments)?;
                    pc + 1
                }
                Op::Exec(statement) => {
                    self.exec(program, instruction.line, statement)?;
                    pc + 1
                }
                Op::End(_) => pc + 1,
                Op::Clause {
                    ..
                } => self.construct(program, pc)?,
            };
        }
        Ok(())
    }

    fn print(&mut self, program: &Program, fragments: &[Fragment]) -> Result<(), TemplateError> {
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => self.output.push(text.as_str()),
                Fragment::Expr {
                    raw,
                    source,
                    line,
                } => {
                    let value = self.evaluate(program, *line, source)?;
                    let text = if *raw {
                        self.ctx.formatter.marked(&value)
                    } else {
                        self.ctx.formatter.unmarked(&value)
                    };
                    self.output.push(text);
                }
            }
        }
        Ok(())
    }

    fn evaluate(&mut self, program: &Program, line: usize, source: &str) -> Result<Value, TemplateError> {
        let evaluator = self.ctx.evaluator;
        evaluator.evaluate(source, self).map_err(|e| failure(program, line, source, e))
    }

    fn exec(&mut self, program: &Program, line: usize, statement: &str) -> Result<(), TemplateError> {
        let evaluator = self.ctx.evaluator;
        evaluator.execute(statement, self).map_err(|e| failure(program, line, statement, e))
    }

    /// Run the clause chain headed at `header`; returns the next index.
    fn construct(&mut self, program: &Arc<Program>, header: usize) -> Result<usize, TemplateError> {
        let (branches, resume) = chain(program, header);
        let Some(first) = branches.first() else {
            return Ok(resume);
        };

        match first.clause {
            Clause::If {
                ..
            } => self.run_if(program, &branches)?,
            Clause::For {
                targets,
                iterable,
            } => self.run_for(program, &branches, targets, iterable)?,
            Clause::While {
                cond,
            } => self.run_while(program, &branches, cond)?,
            Clause::Try => self.run_try(program, &branches)?,
            Clause::With {
                expr,
                binding,
            } => {
                let value = self.evaluate(program, first.line, expr)?;
                if let Some(name) = binding {
                    self.namespace.insert(name.as_str(), Binding::Value(value));
                }
                self.run(program, first.body.0, first.body.1)?;
            }
            Clause::Def {
                name,
                params,
            } => {
                let definition = Macro {
                    name: name.clone(),
                    params: params.clone(),
                    program: Arc::clone(program),
                    body: first.body,
                };
                self.namespace.insert(name.as_str(), Binding::Macro(Arc::new(definition)));
            }
            Clause::Class {
                ..
            } => {
                return Err(expression_failed(
                    program,
                    first.line,
                    &first.clause.to_string(),
                    "class blocks are not supported".to_string(),
                ));
            }
            Clause::Elif {
                ..
            }
            | Clause::Else
            | Clause::Except {
                ..
            }
            | Clause::Finally => {
                return Err(TemplateError::Syntax {
                    template: program.name().to_string(),
                    line: first.line,
                    message: format!("'{}' without a block to continue", first.clause.keyword()),
                });
            }
        }
        Ok(resume)
    }

    fn run_if(&mut self, program: &Arc<Program>, branches: &[Branch<'_>]) -> Result<(), TemplateError> {
        for branch in branches {
            let taken = match branch.clause {
                Clause::If {
                    cond,
                }
                | Clause::Elif {
                    cond,
                } => is_truthy(&self.evaluate(program, branch.line, cond)?),
                _ => true,
            };
            if taken {
                return self.run(program, branch.body.0, branch.body.1);
            }
        }
        Ok(())
    }

    fn run_for(
        &mut self,
        program: &Arc<Program>,
        branches: &[Branch<'_>],
        targets: &[String],
        iterable: &str,
    ) -> Result<(), TemplateError> {
        let line = branches[0].line;
        let value = self.evaluate(program, line, iterable)?;
        let items = match (&value, targets.len()) {
            (Value::Object(map), 2) => map
                .iter()
                .map(|(key, value)| Value::Array(vec![Value::String(key.clone()), value.clone()]))
                .collect(),
            _ => iterate(&value).map_err(|message| expression_failed(program, line, iterable, message))?,
        };

        let (start, end) = branches[0].body;
        for item in &items {
            self.bind_targets(program, line, targets, item)?;
            self.run(program, start, end)?;
        }
        if items.is_empty()
            && let Some(otherwise) = branches.get(1)
        {
            self.run(program, otherwise.body.0, otherwise.body.1)?;
        }
        Ok(())
    }

    fn bind_targets(
        &mut self,
        program: &Program,
        line: usize,
        targets: &[String],
        item: &Value,
    ) -> Result<(), TemplateError> {
        if let [target] = targets {
            self.namespace.insert(target.as_str(), Binding::Value(item.clone()));
            return Ok(());
        }
        let message = match item {
            Value::Array(values) if values.len() == targets.len() => {
                for (target, value) in targets.iter().zip(values) {
                    self.namespace.insert(target.as_str(), Binding::Value(value.clone()));
                }
                return Ok(());
            }
            Value::Array(values) => {
                format!("expected {} values to unpack, got {}", targets.len(), values.len())
            }
            other => format!("cannot unpack '{}' into {} names", type_name(other), targets.len()),
        };
        Err(expression_failed(program, line, &targets.join(", "), message))
    }

    fn run_while(&mut self, program: &Arc<Program>, branches: &[Branch<'_>], cond: &str) -> Result<(), TemplateError> {
        let (line, (start, end)) = (branches[0].line, branches[0].body);
        let mut iterations = 0usize;
        while is_truthy(&self.evaluate(program, line, cond)?) {
            self.run(program, start, end)?;
            iterations += 1;
        }
        if iterations == 0
            && let Some(otherwise) = branches.get(1)
        {
            self.run(program, otherwise.body.0, otherwise.body.1)?;
        }
        Ok(())
    }

    fn run_try(&mut self, program: &Arc<Program>, branches: &[Branch<'_>]) -> Result<(), TemplateError> {
        let handler = branches.iter().find(|b| matches!(b.clause, Clause::Except { .. }));
        let otherwise = branches.iter().find(|b| matches!(b.clause, Clause::Else));
        let cleanup = branches.iter().find(|b| matches!(b.clause, Clause::Finally));

        let (start, end) = branches[0].body;
        let outcome = match self.run(program, start, end) {
            Ok(()) => match otherwise {
                Some(branch) => self.run(program, branch.body.0, branch.body.1),
                None => Ok(()),
            },
            Err(error) => match handler {
                Some(branch) => {
                    tracing::debug!("Handled error in {}: {}", program.name(), error);
                    if let Clause::Except {
                        binding: Some(name),
                    } = branch.clause
                    {
                        self.namespace.insert(name.as_str(), Binding::Value(Value::String(error_text(&error))));
                    }
                    self.run(program, branch.body.0, branch.body.1)
                }
                None => Err(error),
            },
        };

        if let Some(branch) = cleanup {
            self.run(program, branch.body.0, branch.body.1)?;
        }
        outcome
    }

    fn call_macro(
        &mut self,
        definition: &Macro,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> Result<Value, EvalError> {
        let name = &definition.name;
        if args.len() > definition.params.len() {
            return Err(format!(
                "{name}() takes {} positional argument(s) but {} were given",
                definition.params.len(),
                args.len()
            )
            .into());
        }
        if let Some((key, _)) = kwargs.iter().find(|(key, _)| !definition.params.iter().any(|p| &p.name == key)) {
            return Err(format!("{name}() got an unexpected keyword argument '{key}'").into());
        }
        if self.macro_depth >= MAX_MACRO_DEPTH {
            return Err(format!("maximum macro depth of {MAX_MACRO_DEPTH} exceeded calling {name}()").into());
        }

        let mut bound = Vec::with_capacity(definition.params.len());
        for (index, param) in definition.params.iter().enumerate() {
            let keyword = kwargs.iter().find(|(key, _)| key == &param.name).map(|(_, v)| v.clone());
            let value = match (args.get(index), keyword, &param.default) {
                (Some(_), Some(_), _) => {
                    return Err(format!("{name}() got multiple values for argument '{}'", param.name).into());
                }
                (Some(value), None, _) => value.clone(),
                (None, Some(value), _) => value,
                (None, None, Some(default)) => {
                    let evaluator = self.ctx.evaluator;
                    evaluator.evaluate(default, self)?
                }
                (None, None, None) => {
                    return Err(format!("{name}() missing required argument '{}'", param.name).into());
                }
            };
            bound.push((param.name.clone(), value));
        }

        let saved: Vec<(String, Option<Binding>)> = bound
            .into_iter()
            .map(|(param, value)| {
                let previous = self.namespace.insert(param.as_str(), Binding::Value(value));
                (param, previous)
            })
            .collect();

        self.macro_depth += 1;
        let result = self.run(&definition.program, definition.body.0, definition.body.1);
        self.macro_depth -= 1;

        for (param, previous) in saved.into_iter().rev() {
            match previous {
                Some(binding) => {
                    self.namespace.insert(param, binding);
                }
                None => {
                    self.namespace.remove(&param);
                }
            }
        }
        result?;
        Ok(Value::Null)
    }

    fn builtin(&mut self, name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<Option<Value>, EvalError> {
        let keyword = |key: &str| kwargs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        let result = match name {
            "get" => {
                let key = name_argument(name, args)?;
                let default = args.get(1).cloned().or_else(|| keyword("default")).unwrap_or(Value::Null);
                self.namespace.value(&key).cloned().unwrap_or(default)
            }
            "setdefault" => {
                let key = name_argument(name, args)?;
                if !self.namespace.contains(&key) {
                    let value = args.get(1).cloned().or_else(|| keyword("value")).unwrap_or(Value::Null);
                    self.namespace.insert(key.as_str(), Binding::Value(value));
                }
                self.namespace.value(&key).cloned().unwrap_or(Value::Null)
            }
            "defined" => Value::Bool(self.namespace.contains(&name_argument(name, args)?)),
            "include" => {
                let template = name_argument(name, args)?;
                if args.len() > 1 {
                    return Err("include() takes the template name and keyword arguments only".into());
                }
                let values: Map<String, Value> = kwargs.iter().cloned().collect();
                self.ctx.engine.include_nested(self.ctx, &template, values, self.output, self.depth + 1)?;
                Value::Null
            }
            "escape" => match args {
                [value] => Value::String(self.ctx.formatter.escape(&to_text(value))),
                _ => return Err(format!("escape() takes exactly one argument ({} given)", args.len()).into()),
            },
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}

fn name_argument(function: &str, args: &[Value]) -> Result<String, EvalError> {
    match args.first() {
        Some(Value::String(name)) => Ok(name.clone()),
        Some(other) => Err(format!("{function}() expects a name string, got '{}'", type_name(other)).into()),
        None => Err(format!("{function}() missing required argument 'name'").into()),
    }
}

impl Scope for RenderEnv<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.namespace.value(name).cloned()
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.namespace.insert(name, Binding::Value(value));
    }

    fn call(&mut self, name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<Option<Value>, EvalError> {
        match self.namespace.get(name).cloned() {
            Some(Binding::Macro(definition)) => self.call_macro(&definition, args, kwargs).map(Some),
            Some(Binding::Helper(helper)) => {
                if !kwargs.is_empty() {
                    return Err(format!("helper '{name}' does not take keyword arguments").into());
                }
                helper(self.output, args).map_err(|message| EvalError::Message(format!("{name}(): {message}")))?;
                Ok(Some(Value::Null))
            }
            Some(Binding::Value(_)) => Ok(None),
            None => self.builtin(name, args, kwargs),
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.namespace.names();
        names.extend(BUILTINS.iter().map(ToString::to_string));
        names
    }
}

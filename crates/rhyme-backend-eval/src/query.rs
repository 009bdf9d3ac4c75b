//! Executable loop tree built from a schedule.

use std::borrow::Cow;
use std::cmp::Ordering;

use rhyme_backend_core::{BackendError, Renderer};
use rhyme_ir::{AssignOp, BinaryOp, Expr, GeneratorGroup, Statement, StmtId, Symbol};
use serde_json::{Map, Value};

use crate::EvalError;
use crate::value;

static NULL: Value = Value::Null;

#[derive(Clone, Debug)]
enum Node {
    Statement(Statement),
    Loop {
        var: Symbol,
        source: Expr,
        guards: Vec<Expr>,
        body: Vec<Node>,
    },
}

/// A scheduled program ready to run against input documents.
#[derive(Clone, Debug)]
pub struct Query {
    body: Vec<Node>,
    result: Expr,
}

/// Mutable state of one run.
struct Env<'i> {
    input: &'i Value,
    vars: Vec<(Symbol, Value)>,
    tmp: Map<String, Value>,
}

impl Env<'_> {
    fn var(&self, symbol: &Symbol) -> Result<&Value, EvalError> {
        self.vars
            .iter()
            .rev()
            .find(|(s, _)| s == symbol)
            .map(|(_, v)| v)
            .ok_or_else(|| EvalError::UnboundVariable(symbol.clone()))
    }

    fn eval<'a>(&'a self, e: &'a Expr) -> Result<Cow<'a, Value>, EvalError> {
        Ok(match e {
            Expr::Input => Cow::Borrowed(self.input),
            Expr::Var(s) => Cow::Borrowed(self.var(s)?),
            Expr::Tmp(s) => Cow::Borrowed(self.tmp.get(s.as_str()).unwrap_or(&NULL)),
            Expr::Const(v) => Cow::Borrowed(v),
            Expr::Get(base, key) => {
                let key = self.eval(key)?;
                match self.eval(base)? {
                    Cow::Borrowed(b) => Cow::Borrowed(value::index(b, &key)?.unwrap_or(&NULL)),
                    Cow::Owned(b) => {
                        Cow::Owned(value::index(&b, &key)?.cloned().unwrap_or(Value::Null))
                    }
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                Cow::Owned(value::binary(*op, &*self.eval(lhs)?, &*self.eval(rhs)?)?)
            }
        })
    }

    /// The slot `write[path...]`, creating intermediate objects.
    fn slot(&mut self, write: &Symbol, keys: &[String]) -> Result<&mut Value, EvalError> {
        let mut slot = self.tmp.entry(write.as_str()).or_insert(Value::Null);
        for key in keys {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            slot = match slot {
                Value::Object(map) => map.entry(key.as_str()).or_insert(Value::Null),
                other => {
                    return Err(EvalError::NotAnObject {
                        write: write.clone(),
                        found: other.to_string(),
                    });
                }
            };
        }
        Ok(slot)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<(), EvalError> {
        let keys = stmt
            .path
            .iter()
            .map(|k| Ok(value::key_string(&*self.eval(k)?)?.into_owned()))
            .collect::<Result<Vec<_>, EvalError>>()?;
        let v = self.eval(&stmt.value)?.into_owned();
        let slot = self.slot(&stmt.write, &keys)?;
        match stmt.op {
            AssignOp::Init => {
                if slot.is_null() {
                    *slot = v;
                }
            }
            AssignOp::Assign => *slot = v,
            AssignOp::Add => {
                let sum = value::binary(BinaryOp::Add, slot, &v)?;
                *slot = sum;
            }
            AssignOp::Max => value::extremum(slot, v, Ordering::Greater),
            AssignOp::Min => value::extremum(slot, v, Ordering::Less),
            AssignOp::Count => {
                let step = Value::from(u8::from(!v.is_null()));
                let sum = value::binary(BinaryOp::Add, slot, &step)?;
                *slot = sum;
            }
            AssignOp::Push => {
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                match slot {
                    Value::Array(items) => items.push(v),
                    other => {
                        return Err(EvalError::NotAnArray {
                            write: stmt.write.clone(),
                            found: other.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, nodes: &[Node]) -> Result<(), EvalError> {
        for node in nodes {
            match node {
                Node::Statement(stmt) => self.execute(stmt)?,
                Node::Loop {
                    var,
                    source,
                    guards,
                    body,
                } => {
                    let keys = value::keys(&*self.eval(source)?)?;
                    self.vars.push((var.clone(), Value::Null));
                    for key in keys {
                        if let Some((_, slot)) = self.vars.last_mut() {
                            *slot = key;
                        }
                        if self.guarded(var, guards)? {
                            self.run(body)?;
                        }
                    }
                    self.vars.pop();
                }
            }
        }
        Ok(())
    }

    /// Every guard source has the current key of `var`.
    fn guarded(&self, var: &Symbol, guards: &[Expr]) -> Result<bool, EvalError> {
        let key = self.var(var)?;
        for guard in guards {
            let source = self.eval(guard)?;
            if value::index(&*source, key)?.is_none_or(Value::is_null) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Query {
    /// Runs the query against `input`.
    pub fn run(&self, input: &Value) -> Result<Value, EvalError> {
        let mut env = Env {
            input,
            vars: Vec::new(),
            tmp: Map::new(),
        };
        env.run(&self.body)?;
        let result = env.eval(&self.result)?.into_owned();
        log::debug!("evaluated query: {} accumulator(s)", env.tmp.len());
        Ok(result)
    }
}

struct Frame {
    var: Symbol,
    source: Expr,
    guards: Vec<Expr>,
    body: Vec<Node>,
}

/// Builds a [`Query`] from renderer callbacks.
#[derive(Default)]
pub struct QueryBuilder {
    top: Vec<Node>,
    frames: Vec<Frame>,
    result: Option<Expr>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn body(&mut self) -> &mut Vec<Node> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.body,
            None => &mut self.top,
        }
    }

    /// Returns the finished query.
    pub fn finish(self) -> Result<Query, BackendError> {
        if let Some(frame) = self.frames.last() {
            return Err(BackendError::Other(format!(
                "loop '{}' is never closed",
                frame.var
            )));
        }
        let result = self
            .result
            .ok_or_else(|| BackendError::Other("schedule has no return".into()))?;
        Ok(Query {
            body: self.top,
            result,
        })
    }
}

impl Renderer for QueryBuilder {
    fn render_statement(&mut self, _id: StmtId, stmt: &Statement) -> Result<(), BackendError> {
        self.body().push(Node::Statement(stmt.clone()));
        Ok(())
    }

    fn render_loop_open(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
        self.frames.push(Frame {
            var: group.symbol.clone(),
            source: group.iterate.source.clone(),
            guards: group.guards.iter().map(|g| g.source.clone()).collect(),
            body: Vec::new(),
        });
        Ok(())
    }

    fn render_loop_close(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
        let frame = self
            .frames
            .pop()
            .filter(|f| &f.var == group.symbol)
            .ok_or_else(|| {
                BackendError::Other(format!("unbalanced close of '{}'", group.symbol))
            })?;
        self.body().push(Node::Loop {
            var: frame.var,
            source: frame.source,
            guards: frame.guards,
            body: frame.body,
        });
        Ok(())
    }

    fn render_final_return(&mut self, result: &Expr) -> Result<(), BackendError> {
        self.result = Some(result.clone());
        Ok(())
    }
}

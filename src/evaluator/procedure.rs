//! Procedure values: native operations and user-defined closures.

use std::fmt;

use gc::{Finalize, GcCell, Trace};

use crate::Error;
use crate::ast::Value;
use crate::builtinops::BuiltinOp;
use crate::evaluator::{Environment, eval};

/// Anything that can be applied to a list of unevaluated operand forms.
///
/// `args` is the operand list exactly as written at the call site and `env`
/// is the environment of the caller.
pub trait Callable {
    fn call(&self, args: &Value, env: &Environment) -> Result<Value, Error>;
}

/// A user-defined procedure created by `lambda` or `define` sugar
#[derive(Trace, Finalize)]
pub struct Closure {
    params: Vec<String>,
    /// A single `(begin ...)` form wrapping the body expressions
    body: Value,
    env: Environment,
}

impl Callable for Closure {
    fn call(&self, args: &Value, env: &Environment) -> Result<Value, Error> {
        let operands = args.list_to_vec().ok_or_else(|| {
            Error::EvalError("invalid syntax: improper argument list".to_owned())
        })?;
        if operands.len() != self.params.len() {
            return Err(Error::arity_error(self.params.len(), operands.len()));
        }

        tracing::trace!(params = ?self.params, "closure call");

        // Arguments are evaluated in the caller's environment, then bound in a
        // fresh frame whose parent is the environment the closure captured.
        let frame = Environment::with_parent(&self.env);
        for (param, operand) in self.params.iter().zip(&operands) {
            let value = eval(operand, env)?;
            frame.define(param.clone(), value);
        }

        eval(&self.body, &frame)
    }
}

#[derive(Trace, Finalize)]
pub enum ProcedureKind {
    Native(#[unsafe_ignore_trace] &'static BuiltinOp),
    Closure(Closure),
}

/// A first-class procedure value.
///
/// The name is filled in the first time the procedure is bound by `define`
/// and never changes afterwards.
#[derive(Trace, Finalize)]
pub struct Procedure {
    name: GcCell<Option<String>>,
    kind: ProcedureKind,
}

impl Procedure {
    pub fn native(op: &'static BuiltinOp) -> Self {
        Procedure {
            name: GcCell::new(None),
            kind: ProcedureKind::Native(op),
        }
    }

    pub fn closure(params: Vec<String>, body: Value, env: Environment) -> Self {
        Procedure {
            name: GcCell::new(None),
            kind: ProcedureKind::Closure(Closure { params, body, env }),
        }
    }

    pub fn name(&self) -> Option<String> {
        Option::clone(&self.name.borrow())
    }

    pub fn kind(&self) -> &ProcedureKind {
        &self.kind
    }

    /// Record `name` unless the procedure already has one
    pub(crate) fn name_if_unnamed(&self, name: &str) {
        let mut slot = self.name.borrow_mut();
        if slot.is_none() {
            *slot = Some(name.to_owned());
        }
    }
}

impl Callable for Procedure {
    fn call(&self, args: &Value, env: &Environment) -> Result<Value, Error> {
        match &self.kind {
            ProcedureKind::Native(op) => op.call(args, env),
            ProcedureKind::Closure(closure) => closure.call(args, env),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.borrow().as_deref() {
            Some(name) => write!(f, "#<procedure:{name}>"),
            None => write!(f, "#<procedure>"),
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ProcedureKind::Native(op) => write!(f, "Native({})", op.scheme_id),
            ProcedureKind::Closure(closure) => {
                write!(f, "Closure({self}, params={:?})", closure.params)
            }
        }
    }
}

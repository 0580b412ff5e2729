use std::collections::HashMap;
use std::fmt;

use gc::{Finalize, Gc, GcCell, Trace};

use crate::Error;
use crate::ast::{Keyword, Value, list_from, list_with_tail, sym};
use crate::builtinops::get_builtin_ops;

pub mod procedure;

use procedure::{Callable, Procedure};

/// Environment for variable bindings.
///
/// An environment is a handle to a frame of bindings plus an optional link to
/// its enclosing environment. Cloning the handle shares the frame, so a
/// closure and the scope that created it see each other's definitions.
#[derive(Clone, Trace, Finalize)]
pub struct Environment {
    frame: Gc<Frame>,
}

#[derive(Trace, Finalize)]
struct Frame {
    bindings: GcCell<HashMap<String, Value>>,
    enclosing: Option<Environment>,
}

impl Environment {
    pub fn new() -> Self {
        Self::from_frame(None)
    }

    /// Create an empty frame whose lookups fall back to `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Self::from_frame(Some(parent.clone()))
    }

    fn from_frame(enclosing: Option<Environment>) -> Self {
        Environment {
            frame: Gc::new(Frame {
                bindings: GcCell::new(HashMap::new()),
                enclosing,
            }),
        }
    }

    /// Bind or rebind `name` in this frame only.
    ///
    /// Binding an unnamed procedure gives it `name` as its display name.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Value::Procedure(procedure) = &value {
            procedure.name_if_unnamed(&name);
        }
        self.frame.bindings.borrow_mut().insert(name, value);
    }

    /// Look `name` up in this frame, then in each enclosing frame in turn
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        self.lookup(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.frame.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.frame.enclosing.as_ref()?;
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Check whether two handles refer to the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Gc::ptr_eq(&self.frame, &other.frame)
    }

    /// Get all bindings in this environment and its parents
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        let mut env = Some(self);

        // Inner frames shadow outer ones, so keep the first binding seen
        while let Some(current) = env {
            for (name, value) in current.frame.bindings.borrow().iter() {
                bindings
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            env = current.frame.enclosing.as_ref();
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut env = self.frame.enclosing.as_ref();
        while let Some(parent) = env {
            depth += 1;
            env = parent.frame.enclosing.as_ref();
        }
        depth
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.frame.bindings.borrow().len())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Evaluate an expression in `env`
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    match expr {
        Value::Nil => Err(Error::EvalError(
            "invalid syntax: cannot evaluate ()".to_owned(),
        )),

        // Self-evaluating forms
        Value::Number(_)
        | Value::Bool(_)
        | Value::Character(_)
        | Value::Procedure(_)
        | Value::Unspecified => Ok(expr.clone()),

        // Variable lookup
        Value::Symbol(name) => env.get(name),

        // Special form or procedure application
        Value::Pair(form) => {
            eval_compound(&form.car(), &form.cdr(), env).map_err(|err| add_context(err, expr))
        }
    }
}

/// Helper function to add expression context to errors.
///
/// Only the innermost form is recorded.
fn add_context(error: Error, expr: &Value) -> Error {
    const MARKER: &str = "\n  Context: ";
    match error {
        Error::EvalError(msg) if !msg.contains(MARKER) => {
            Error::EvalError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        Error::TypeError(msg) if !msg.contains(MARKER) => {
            Error::TypeError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        // Parse errors, unbound variables and arity errors carry their own context
        other => other,
    }
}

fn eval_compound(head: &Value, operands: &Value, env: &Environment) -> Result<Value, Error> {
    if let Value::Symbol(name) = head
        && let Some(keyword) = Keyword::from_name(name)
    {
        let args = special_form_operands(operands, keyword)?;
        return match keyword {
            Keyword::Quote => eval_quote(&args, env),
            Keyword::Define => eval_define(&args, env),
            Keyword::Begin => eval_begin(&args, env),
            Keyword::Lambda => eval_lambda(&args, env),
            Keyword::If => eval_if(&args, env),
            Keyword::Quasiquote => eval_quasiquote(&args, env),
            Keyword::Unquote | Keyword::UnquoteSplicing => Err(Error::EvalError(format!(
                "invalid syntax: improper context for {}",
                keyword.name()
            ))),
        };
    }

    let callee = eval(head, env)?;
    match &callee {
        Value::Procedure(procedure) => procedure.call(operands, env),
        other => Err(Error::TypeError(format!(
            "invalid procedure: {other} is not callable"
        ))),
    }
}

fn special_form_operands(operands: &Value, keyword: Keyword) -> Result<Vec<Value>, Error> {
    operands.list_to_vec().ok_or_else(|| {
        Error::EvalError(format!(
            "invalid syntax: improper operand list in {} form",
            keyword.name()
        ))
    })
}

/// Evaluate quote special form
pub(crate) fn eval_quote(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [datum] => Ok(datum.clone()),
        _ => Err(Error::arity_error_with_expr(
            1,
            args.len(),
            "quote".to_owned(),
        )),
    }
}

/// Evaluate define special form, including the `(define (name . params) body...)` sugar
pub(crate) fn eval_define(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            tracing::debug!(name = %name, kind = value.type_name(), "define");
            env.define(name.clone(), value);
            Ok(Value::Unspecified)
        }
        [Value::Symbol(_), ..] => Err(Error::arity_error_with_expr(
            2,
            args.len(),
            "define".to_owned(),
        )),
        [Value::Pair(signature), body @ ..] => {
            let target = signature.car();
            let Value::Symbol(name) = &target else {
                return Err(Error::TypeError(format!(
                    "invalid definition target: {target}"
                )));
            };
            let procedure = make_closure(&signature.cdr(), body, env)?;
            tracing::debug!(name = %name, "define procedure");
            env.define(name.clone(), procedure);
            Ok(Value::Unspecified)
        }
        [] => Err(Error::arity_error_with_expr(2, 0, "define".to_owned())),
        [target, ..] => Err(Error::TypeError(format!(
            "invalid definition target: {target}"
        ))),
    }
}

/// Evaluate begin special form
pub(crate) fn eval_begin(args: &[Value], env: &Environment) -> Result<Value, Error> {
    let Some((last, init)) = args.split_last() else {
        return Err(Error::EvalError(
            "invalid syntax: begin requires at least one expression".to_owned(),
        ));
    };
    for expr in init {
        eval(expr, env)?;
    }
    eval(last, env)
}

/// Evaluate lambda special form
pub(crate) fn eval_lambda(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [params, body @ ..] => make_closure(params, body, env),
        [] => Err(Error::arity_error_with_expr(2, 0, "lambda".to_owned())),
    }
}

/// Build a closure over `env`. `params` must be `()` or a proper list of
/// symbols and `body` must hold at least one expression.
fn make_closure(params: &Value, body: &[Value], env: &Environment) -> Result<Value, Error> {
    let names = params
        .list_to_vec()
        .and_then(|params| {
            params
                .iter()
                .map(|param| match param {
                    Value::Symbol(name) => Some(name.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<String>>>()
        })
        .ok_or_else(|| {
            Error::TypeError(format!(
                "lambda parameters must be a list of symbols, got {params}"
            ))
        })?;

    if body.is_empty() {
        return Err(Error::EvalError(
            "invalid syntax: procedure body must contain at least one expression".to_owned(),
        ));
    }

    let body = Value::cons(sym(Keyword::Begin.name()), list_from(body.to_vec()));
    Ok(Value::Procedure(Gc::new(Procedure::closure(
        names,
        body,
        env.clone(),
    ))))
}

/// Evaluate if special form. Every value except `#f` selects the consequent.
pub(crate) fn eval_if(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [test, consequent, alternative] => {
            if eval(test, env)?.is_false() {
                eval(alternative, env)
            } else {
                eval(consequent, env)
            }
        }
        _ => Err(Error::arity_error_with_expr(
            3,
            args.len(),
            "if".to_owned(),
        )),
    }
}

/// Evaluate quasiquote special form
pub(crate) fn eval_quasiquote(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [template] => expand_template(template, env),
        _ => Err(Error::arity_error_with_expr(
            1,
            args.len(),
            "quasiquote".to_owned(),
        )),
    }
}

/// True when `form` is a list headed by the symbol for `keyword`
fn is_tagged(form: &Value, keyword: Keyword) -> bool {
    form.as_pair()
        .is_some_and(|pair| matches!(&pair.car(), Value::Symbol(name) if name == keyword.name()))
}

/// The single operand of an `unquote` or `unquote-splicing` form
fn unquoted_expr(form: &Value, keyword: Keyword) -> Result<Value, Error> {
    let operands = form
        .as_pair()
        .and_then(|pair| pair.cdr().list_to_vec())
        .unwrap_or_default();
    match operands.as_slice() {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error_with_expr(
            1,
            operands.len(),
            keyword.name().to_owned(),
        )),
    }
}

/// Build a fresh copy of a quasiquote template with every unquoted part
/// replaced by its value. The template itself is never modified.
fn expand_template(template: &Value, env: &Environment) -> Result<Value, Error> {
    if is_tagged(template, Keyword::Unquote) {
        return eval(&unquoted_expr(template, Keyword::Unquote)?, env);
    }
    if is_tagged(template, Keyword::UnquoteSplicing) {
        return Err(Error::EvalError(
            "invalid syntax: improper context for unquote-splicing".to_owned(),
        ));
    }
    if !matches!(template, Value::Pair(_)) {
        return Ok(template.clone());
    }

    let mut items = Vec::new();
    let mut rest = template.clone();
    let tail = loop {
        // `(a . ,b)` reads as `(a unquote b)`
        if is_tagged(&rest, Keyword::Unquote) || is_tagged(&rest, Keyword::UnquoteSplicing) {
            break expand_template(&rest, env)?;
        }
        let Value::Pair(pair) = &rest else {
            break rest.clone();
        };

        let item = pair.car();
        if is_tagged(&item, Keyword::UnquoteSplicing) {
            let spliced = eval(&unquoted_expr(&item, Keyword::UnquoteSplicing)?, env)?;
            let elements = spliced.list_to_vec().ok_or_else(|| {
                Error::TypeError(format!(
                    "unquote-splicing must produce a list, got {spliced}"
                ))
            })?;
            items.extend(elements);
        } else {
            items.push(expand_template(&item, env)?);
        }

        let next = pair.cdr();
        rest = next;
    };

    Ok(list_with_tail(items, tail))
}

/// Create a global environment with the native procedures bound
pub fn create_global_env() -> Environment {
    let env = Environment::new();

    for builtin_op in get_builtin_ops() {
        let procedure = Procedure::native(builtin_op);
        env.define(builtin_op.scheme_id, Value::Procedure(Gc::new(procedure)));
    }

    env
}

//! Native procedure library.
//!
//! Every native receives its operands *unevaluated*, together with the
//! environment of the call site, and evaluates them itself. Operand counts are
//! checked against the operation's [`Arity`] before anything is evaluated.
//!
//! ```scheme
//! (+ 1 2 3)          ; => 6
//! (- 5)              ; => -5
//! (eq? 'a 'a)        ; => #t
//! (cons 1 2)         ; => (1 . 2)
//! (println (* 2 21)) ; prints 42
//! ```
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the [`NativeFn`] signature
//! 2. **Add it to `BUILTIN_OPS`** with its name and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::io::{self, Write};

use gc::Gc;

use crate::Error;
use crate::ast::{Pair, Value};
use crate::evaluator::procedure::Callable;
use crate::evaluator::{Environment, eval};

/// Signature of a native procedure: unevaluated operand forms and the
/// environment they must be evaluated in.
pub type NativeFn = fn(&[Value], &Environment) -> Result<Value, Error>;

/// Number of operands a native procedure accepts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
}

impl Arity {
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if count != n => Err(Error::arity_error(n, count)),
            Arity::AtLeast(n) if count < n => Err(Error::arity_error(n, count)),
            Arity::Range(min, _) if count < min => Err(Error::arity_error(min, count)),
            Arity::Range(_, max) if count > max => Err(Error::arity_error(max, count)),
            _ => Ok(()),
        }
    }
}

/// Definition of a native procedure
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name the procedure is bound to in the global environment
    pub scheme_id: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
    }
}

impl Callable for BuiltinOp {
    fn call(&self, args: &Value, env: &Environment) -> Result<Value, Error> {
        let operands = args.list_to_vec().ok_or_else(|| {
            Error::EvalError(format!(
                "invalid syntax: improper argument list in call to {}",
                self.scheme_id
            ))
        })?;

        if let Err(Error::ArityError { expected, got, .. }) = self.arity.validate(operands.len()) {
            return Err(Error::arity_error_with_expr(
                expected,
                got,
                self.scheme_id.to_owned(),
            ));
        }

        tracing::trace!(op = self.scheme_id, operands = operands.len(), "native call");
        (self.func)(&operands, env)
    }
}

//
// Operand helpers
//

fn eval_number(operand: &Value, env: &Environment, op_name: &str) -> Result<f64, Error> {
    match eval(operand, env)? {
        Value::Number(n) => Ok(n),
        other => Err(Error::TypeError(format!(
            "arguments to {op_name} must be numbers, got {other}"
        ))),
    }
}

fn check_divisor(divisor: f64) -> Result<f64, Error> {
    if divisor == 0.0 {
        Err(Error::EvalError("division by zero".to_owned()))
    } else {
        Ok(divisor)
    }
}

/// Evaluate the single operand of `car`/`cdr` to a pair.
///
/// The operand must be written as a compound form (a pair) in the source,
/// not only evaluate to one: `(car '(1 2))` is accepted, `(car xs)` is not.
fn pair_operand(operands: &[Value], env: &Environment, op_name: &str) -> Result<Gc<Pair>, Error> {
    let [operand] = operands else {
        return Err(Error::arity_error(1, operands.len()));
    };

    let value = eval(operand, env)?;
    match (operand, &value) {
        (Value::Pair(_), Value::Pair(pair)) => Ok(pair.clone()),
        _ => Err(Error::TypeError(format!(
            "argument to {op_name} must be a pair"
        ))),
    }
}

fn write_value(value: &Value, newline: bool) -> Result<Value, Error> {
    let mut out = io::stdout().lock();
    let written = if newline {
        writeln!(out, "{value}")
    } else {
        write!(out, "{value}")
    };
    written
        .and_then(|()| out.flush())
        .map_err(|e| Error::EvalError(format!("could not write to standard output: {e}")))?;
    Ok(Value::Unspecified)
}

//
// Builtin Function Implementations
//

fn builtin_add(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let mut sum = 0.0;
    for operand in operands {
        sum += eval_number(operand, env, "+")?;
    }
    Ok(Value::Number(sum))
}

fn builtin_sub(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [first, rest @ ..] = operands else {
        return Err(Error::arity_error(1, 0));
    };

    let first = eval_number(first, env, "-")?;
    if rest.is_empty() {
        return Ok(Value::Number(-first));
    }

    let mut result = first;
    for operand in rest {
        result -= eval_number(operand, env, "-")?;
    }
    Ok(Value::Number(result))
}

fn builtin_mul(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [first, rest @ ..] = operands else {
        return Err(Error::arity_error(1, 0));
    };

    let mut product = eval_number(first, env, "*")?;
    for operand in rest {
        product *= eval_number(operand, env, "*")?;
    }
    Ok(Value::Number(product))
}

fn builtin_div(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [first, rest @ ..] = operands else {
        return Err(Error::arity_error(1, 0));
    };

    let mut quotient = eval_number(first, env, "/")?;
    for operand in rest {
        quotient /= check_divisor(eval_number(operand, env, "/")?)?;
    }
    Ok(Value::Number(quotient))
}

fn builtin_mod(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [first, rest @ ..] = operands else {
        return Err(Error::arity_error(1, 0));
    };

    let mut remainder = eval_number(first, env, "mod")?;
    for operand in rest {
        remainder %= check_divisor(eval_number(operand, env, "mod")?)?;
    }
    Ok(Value::Number(remainder))
}

// Macro to generate two-operand numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(operands: &[Value], env: &Environment) -> Result<Value, Error> {
            let [left, right] = operands else {
                return Err(Error::arity_error(2, operands.len()));
            };
            let left = eval_number(left, env, $op_str)?;
            let right = eval_number(right, env, $op_str)?;
            Ok(Value::Bool(left $op right))
        }
    };
}

numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_ge, >=, ">=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_le, <=, "<=");

fn builtin_eq(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [left, right] = operands else {
        return Err(Error::arity_error(2, operands.len()));
    };
    let left = eval(left, env)?;
    let right = eval(right, env)?;
    Ok(Value::Bool(left.is_eq(&right)))
}

fn builtin_cons(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [car, cdr] = operands else {
        return Err(Error::arity_error(2, operands.len()));
    };
    let car = eval(car, env)?;
    let cdr = eval(cdr, env)?;
    Ok(Value::cons(car, cdr))
}

fn builtin_car(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    Ok(pair_operand(operands, env, "car")?.car())
}

fn builtin_cdr(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    Ok(pair_operand(operands, env, "cdr")?.cdr())
}

// Macro to generate single-operand type predicates
macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(operands: &[Value], env: &Environment) -> Result<Value, Error> {
            let [operand] = operands else {
                return Err(Error::arity_error(1, operands.len()));
            };
            Ok(Value::Bool(matches!(eval(operand, env)?, $pattern)))
        }
    };
}

type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_bool, Value::Bool(_));
type_predicate!(builtin_is_symbol, Value::Symbol(_));
type_predicate!(builtin_is_null, Value::Nil);

fn builtin_print(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [operand] = operands else {
        return Err(Error::arity_error(1, operands.len()));
    };
    write_value(&eval(operand, env)?, false)
}

fn builtin_println(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let [operand] = operands else {
        return Err(Error::arity_error(1, operands.len()));
    };
    write_value(&eval(operand, env)?, true)
}

/// Unwinds to the driver with the requested status instead of terminating here
fn builtin_exit(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    let status = match operands {
        [] => 0,
        [operand] => match eval(operand, env)? {
            Value::Number(n) => n as i32,
            other => {
                return Err(Error::TypeError(format!(
                    "invalid argument to exit: {other}"
                )));
            }
        },
        _ => return Err(Error::arity_error(1, operands.len())),
    };
    Err(Error::Exit(status))
}

/// Global registry of all native procedures
static BUILTIN_OPS: &[BuiltinOp] = &[
    // Arithmetic operations
    BuiltinOp {
        scheme_id: "+",
        arity: Arity::AtLeast(0),
        func: builtin_add,
    },
    BuiltinOp {
        scheme_id: "-",
        arity: Arity::AtLeast(1),
        func: builtin_sub,
    },
    BuiltinOp {
        scheme_id: "*",
        arity: Arity::AtLeast(1),
        func: builtin_mul,
    },
    BuiltinOp {
        scheme_id: "/",
        arity: Arity::AtLeast(1),
        func: builtin_div,
    },
    BuiltinOp {
        scheme_id: "mod",
        arity: Arity::AtLeast(1),
        func: builtin_mod,
    },
    // Comparison operations
    BuiltinOp {
        scheme_id: "eq?",
        arity: Arity::Exact(2),
        func: builtin_eq,
    },
    BuiltinOp {
        scheme_id: ">",
        arity: Arity::Exact(2),
        func: builtin_gt,
    },
    BuiltinOp {
        scheme_id: ">=",
        arity: Arity::Exact(2),
        func: builtin_ge,
    },
    BuiltinOp {
        scheme_id: "<",
        arity: Arity::Exact(2),
        func: builtin_lt,
    },
    BuiltinOp {
        scheme_id: "<=",
        arity: Arity::Exact(2),
        func: builtin_le,
    },
    // Pair operations
    BuiltinOp {
        scheme_id: "cons",
        arity: Arity::Exact(2),
        func: builtin_cons,
    },
    BuiltinOp {
        scheme_id: "car",
        arity: Arity::Exact(1),
        func: builtin_car,
    },
    BuiltinOp {
        scheme_id: "cdr",
        arity: Arity::Exact(1),
        func: builtin_cdr,
    },
    // Type predicates
    BuiltinOp {
        scheme_id: "isNumber?",
        arity: Arity::Exact(1),
        func: builtin_is_number,
    },
    BuiltinOp {
        scheme_id: "isBool?",
        arity: Arity::Exact(1),
        func: builtin_is_bool,
    },
    BuiltinOp {
        scheme_id: "isSymbol?",
        arity: Arity::Exact(1),
        func: builtin_is_symbol,
    },
    BuiltinOp {
        scheme_id: "null?",
        arity: Arity::Exact(1),
        func: builtin_is_null,
    },
    // I/O and process control
    BuiltinOp {
        scheme_id: "print",
        arity: Arity::Exact(1),
        func: builtin_print,
    },
    BuiltinOp {
        scheme_id: "println",
        arity: Arity::Exact(1),
        func: builtin_println,
    },
    BuiltinOp {
        scheme_id: "exit",
        arity: Arity::Range(0, 1),
        func: builtin_exit,
    },
];

pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_OPS.iter().find(|op| op.scheme_id == name)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;
    use crate::ast::{nil, sym, val};
    use crate::evaluator::create_global_env;
    use crate::scheme::parse_scheme;

    /// Test result variants for native procedure tests
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        Error,                       // Evaluation should fail (any error)
    }
    use TestResult::*;

    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(value.into())
    }

    fn run_builtin_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let env = create_global_env();
            let test_id = format!("Builtin test #{} '{input}'", i + 1);
            let expr = parse_scheme(input).unwrap();

            match (eval(&expr, &env), expected) {
                (Ok(actual), EvalResult(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");
                }
                (Err(_), Error) => {}
                (Err(e), SpecificError(expected_text)) => {
                    let error_msg = format!("{e}");
                    assert!(
                        error_msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                    );
                }
                (Ok(actual), _) => panic!("{test_id}: expected error, got {actual:?}"),
                (Err(err), EvalResult(expected_val)) => {
                    panic!("{test_id}: expected {expected_val:?}, got error {err:?}")
                }
            }
        }
    }

    #[test]
    fn test_arity_validation() {
        assert!(Arity::Exact(2).validate(2).is_ok());
        assert!(Arity::Exact(2).validate(1).is_err());
        assert!(Arity::AtLeast(1).validate(5).is_ok());
        assert!(Arity::AtLeast(1).validate(0).is_err());
        assert!(Arity::Range(0, 1).validate(0).is_ok());
        assert!(Arity::Range(0, 1).validate(1).is_ok());
        assert_eq!(
            Arity::Range(0, 1).validate(2),
            Err(Error::arity_error(1, 2))
        );
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!(find_builtin_op("car").map(|op| op.arity), Some(Arity::Exact(1)));
        assert!(find_builtin_op("set!").is_none());
        for op in get_builtin_ops() {
            assert_eq!(find_builtin_op(op.scheme_id), Some(op));
        }
    }

    #[test]
    fn test_builtins_data_driven() {
        let test_cases = vec![
            // === ARITHMETIC ===
            ("(+)", success(0)),
            ("(+ 1 2 3)", success(6)),
            ("(+ 1.5 2.25)", success(3.75)),
            ("(+ 1 'a)", SpecificError("must be numbers")),
            ("(+ 1 #t)", Error),
            ("(- 5)", success(-5)),
            ("(- 10 3 2)", success(5)),
            ("(- 0.5 1)", success(-0.5)),
            ("(-)", SpecificError("ArityError")),
            ("(- 'x 1)", SpecificError("must be numbers")),
            ("(* 7)", success(7)),
            ("(* 2 3 4)", success(24)),
            ("(*)", SpecificError("ArityError")),
            ("(/ 10 4)", success(2.5)),
            ("(/ 8 2 2)", success(2)),
            ("(/ 4)", success(4)),
            ("(/ 1 0)", SpecificError("division by zero")),
            ("(/ 1 'a)", SpecificError("must be numbers")),
            ("(mod 7 3)", success(1)),
            ("(mod 7 0)", SpecificError("division by zero")),
            ("(+ (* 2 3) (- 8 2))", success(12)),
            // === COMPARISON ===
            ("(> 5 3)", success(true)),
            ("(> 3 5)", success(false)),
            ("(>= 5 5)", success(true)),
            ("(< -5 -3)", success(true)),
            ("(<= 5 3)", success(false)),
            ("(< 1 2 3)", SpecificError("ArityError")),
            ("(< 1)", SpecificError("ArityError")),
            ("(< 'a 1)", SpecificError("must be numbers")),
            // === EQUALITY ===
            ("(eq? 'a 'a)", success(true)),
            ("(eq? 'a 'b)", success(false)),
            ("(eq? 1 1.0)", success(true)),
            ("(eq? 1 2)", success(false)),
            ("(eq? #t #t)", success(true)),
            ("(eq? #t #f)", success(false)),
            ("(eq? '() '())", success(true)),
            ("(eq? (cons 1 2) (cons 1 2))", success(false)),
            ("(eq? 0 #f)", success(false)),
            ("(eq? #\\a #\\a)", success(true)),
            ("(eq? #\\a #\\b)", success(false)),
            ("(eq? car car)", success(true)),
            ("(eq? 1)", SpecificError("ArityError")),
            // === PAIRS ===
            ("(cons 1 2)", success(Value::cons(val(1), val(2)))),
            ("(cons 1 '())", success([1])),
            ("(cons 1 '(2 3))", success([1, 2, 3])),
            ("(car '(1 2))", success(1)),
            ("(cdr '(1 2))", success([2])),
            ("(cdr '(1 . 2))", success(2)),
            ("(car (cons 'a 'b))", success(sym("a"))),
            ("(car (cdr '(1 2 3)))", success(2)),
            ("(car 5)", SpecificError("argument to car must be a pair")),
            ("(cdr 5)", SpecificError("argument to cdr must be a pair")),
            ("(car '())", SpecificError("argument to car must be a pair")),
            ("(car '(1) '(2))", SpecificError("ArityError")),
            // === PREDICATES ===
            ("(isNumber? 4)", success(true)),
            ("(isNumber? 'a)", success(false)),
            ("(isBool? #f)", success(true)),
            ("(isBool? 0)", success(false)),
            ("(isSymbol? 'a)", success(true)),
            ("(isSymbol? 1)", success(false)),
            ("(null? '())", success(true)),
            ("(null? '(1))", success(false)),
            ("(null? (cdr '(1)))", success(true)),
            ("(isNumber?)", SpecificError("ArityError")),
            // === I/O ===
            ("(print 1)", EvalResult(Value::Unspecified)),
            ("(println '(1 . 2))", EvalResult(Value::Unspecified)),
            ("(print)", SpecificError("ArityError")),
            ("(print undefined-name)", SpecificError("unbound variable")),
            // === EXIT ===
            ("(exit 'now)", SpecificError("invalid argument to exit")),
            ("(exit 1 2)", SpecificError("ArityError")),
            // Operands are only evaluated after the count is validated
            ("(cons (exit 3))", SpecificError("ArityError")),
            ("(quote ())", success(nil())),
        ];

        run_builtin_tests(test_cases);
    }

    #[test]
    fn test_exit_unwinds_with_status() {
        let env = create_global_env();
        let cases = [("(exit)", 0), ("(exit 3)", 3), ("(exit (+ 1 1))", 2)];
        for (input, status) in cases {
            let expr = parse_scheme(input).unwrap();
            assert_eq!(eval(&expr, &env), Err(Error::Exit(status)), "{input}");
        }
    }

    #[test]
    fn test_car_checks_operand_form_not_only_value() {
        let env = create_global_env();
        eval(&parse_scheme("(define xs '(1 2))").unwrap(), &env).unwrap();

        let err = eval(&parse_scheme("(car xs)").unwrap(), &env).unwrap_err();
        assert!(format!("{err}").contains("argument to car must be a pair"));

        // Nested cdr still rejects the bare symbol
        let err = eval(&parse_scheme("(car (cdr xs))").unwrap(), &env).unwrap_err();
        assert!(format!("{err}").contains("argument to cdr must be a pair"));

        let expr = parse_scheme("(car (cdr (cons 0 xs)))").unwrap();
        assert_eq!(eval(&expr, &env).unwrap(), val(1));
    }

    #[test]
    fn test_builtins_evaluate_operands_in_calling_environment() {
        let env = create_global_env();
        let local = Environment::with_parent(&env);
        local.define("x", val(41));

        let expr = parse_scheme("(+ x 1)").unwrap();
        assert_eq!(eval(&expr, &local).unwrap(), val(42));
        assert!(matches!(
            eval(&expr, &env),
            Err(Error::UnboundVariable(name)) if name == "x"
        ));
    }
}

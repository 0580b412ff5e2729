//! This module defines the runtime value model of the interpreter. The main enum,
//! [`Value`], is the closed set of things the reader produces and the evaluator
//! manipulates: the empty list, mutable pairs, symbols, double-precision numbers,
//! booleans, characters and procedures. Pairs and procedures live on the garbage
//! collected heap so that quoted literals can be shared between evaluations and
//! cyclic structures are reclaimed. Ergonomic helper functions such as [`val`],
//! [`sym`] and [`nil`] are provided for building values in code and tests, and
//! conversion traits turn Rust literals, arrays and vectors into proper lists.

use gc::{Finalize, Gc, GcCell, Trace};

use crate::evaluator::procedure::Procedure;

/// Operator characters allowed in symbol names besides ASCII letters and digits
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/!@$%^&_=<>?";

/// Check whether `c` may appear in a symbol
pub(crate) fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Symbols that introduce special forms instead of procedure application.
///
/// The reader produces ordinary [`Value::Symbol`]s for these names; the
/// evaluator recognizes them in operator position, ahead of any binding of
/// the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Quote,
    Define,
    Begin,
    Lambda,
    If,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
}

impl Keyword {
    pub fn from_name(name: &str) -> Option<Keyword> {
        match name {
            "quote" => Some(Keyword::Quote),
            "define" => Some(Keyword::Define),
            "begin" => Some(Keyword::Begin),
            "lambda" => Some(Keyword::Lambda),
            "if" => Some(Keyword::If),
            "quasiquote" => Some(Keyword::Quasiquote),
            "unquote" => Some(Keyword::Unquote),
            "unquote-splicing" => Some(Keyword::UnquoteSplicing),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Keyword::Quote => "quote",
            Keyword::Define => "define",
            Keyword::Begin => "begin",
            Keyword::Lambda => "lambda",
            Keyword::If => "if",
            Keyword::Quasiquote => "quasiquote",
            Keyword::Unquote => "unquote",
            Keyword::UnquoteSplicing => "unquote-splicing",
        }
    }
}

/// Core value type of the interpreter
#[derive(Clone, Trace, Finalize)]
pub enum Value {
    /// The empty list, also used as list terminator
    Nil,
    /// A mutable cons cell
    Pair(Gc<Pair>),
    /// Identifiers, compared by name
    Symbol(String),
    /// Numbers (double precision only)
    Number(f64),
    /// `#t` and `#f`
    Bool(bool),
    /// Character literals such as `#\a`
    Character(char),
    /// Native procedures and closures
    Procedure(Gc<Procedure>),
    /// The "no value" result of `define`, `print` and friends
    Unspecified,
}

/// A two-slot cell. Both slots may be reassigned after construction.
#[derive(Trace, Finalize)]
pub struct Pair {
    car: GcCell<Value>,
    cdr: GcCell<Value>,
}

impl Pair {
    pub fn new(car: Value, cdr: Value) -> Self {
        Pair {
            car: GcCell::new(car),
            cdr: GcCell::new(cdr),
        }
    }

    pub fn car(&self) -> Value {
        Value::clone(&self.car.borrow())
    }

    pub fn cdr(&self) -> Value {
        Value::clone(&self.cdr.borrow())
    }

    pub fn set_car(&self, value: Value) {
        *self.car.borrow_mut() = value;
    }

    pub fn set_cdr(&self, value: Value) {
        *self.cdr.borrow_mut() = value;
    }
}

impl Value {
    /// Allocate a new pair
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Gc::new(Pair::new(car, cdr)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only the `#f` value is false
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn as_pair(&self) -> Option<&Gc<Pair>> {
        match self {
            Value::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::Symbol(_) => "symbol",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Character(_) => "character",
            Value::Procedure(_) => "procedure",
            Value::Unspecified => "unspecified",
        }
    }

    /// Iterate over the elements of a list. Iteration stops at the first
    /// non-pair tail; use [`ListIter::into_tail`] to inspect it.
    pub fn iter(&self) -> ListIter {
        ListIter { rest: self.clone() }
    }

    /// Collect a proper list into a vector, or `None` if the list is improper
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut iter = self.iter();
        let items: Vec<Value> = iter.by_ref().collect();
        iter.into_tail().is_nil().then_some(items)
    }

    /// Identity-based equality used by `eq?`.
    ///
    /// Numbers compare by value and symbols by name. Pairs and procedures are
    /// equal only when they are the same heap object.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Character(a), Value::Character(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Gc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Gc::ptr_eq(a, b),
            (Value::Unspecified, Value::Unspecified) => true,
            _ => false,
        }
    }
}

/// Iterator over the cars of a chain of pairs
pub struct ListIter {
    rest: Value,
}

impl ListIter {
    /// The value left after the last pair: `Nil` for a proper list
    pub fn into_tail(self) -> Value {
        self.rest
    }
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let pair = self.rest.as_pair()?.clone();
        self.rest = pair.cdr();
        Some(pair.car())
    }
}

/// Build a proper list from a sequence of values
pub fn list_from<I>(items: I) -> Value
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: DoubleEndedIterator,
{
    list_with_tail(items, Value::Nil)
}

/// Build a list ending in `tail` instead of `Nil`
pub fn list_with_tail<I>(items: I, tail: Value) -> Value
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: DoubleEndedIterator,
{
    items
        .into_iter()
        .rev()
        .fold(tail, |rest, item| Value::cons(item, rest))
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Pair(_) => write!(f, "Pair({self})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Character(c) => write!(f, "Character({c:?})"),
            Value::Procedure(p) => write!(f, "Procedure({p})"),
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Pair(pair) => {
                write!(f, "({}", pair.car())?;
                let mut rest = pair.cdr();
                loop {
                    match &rest {
                        Value::Nil => break,
                        Value::Pair(next) => {
                            write!(f, " {}", next.car())?;
                            let following = next.cdr();
                            rest = following;
                        }
                        tail => {
                            write!(f, " . {tail}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Symbol(s) => write!(f, "{s}"),
            // f64's Display already omits a trailing ".0" for integral values
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Character('\n') => write!(f, "#\\newline"),
            Value::Character('\t') => write!(f, "#\\tab"),
            Value::Character(c) => write!(f, "#\\{c}"),
            Value::Procedure(p) => write!(f, "{p}"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

/// Structural equality, used by tests and the Rust API.
///
/// Pairs compare by contents, procedures by identity. The language-level
/// `eq?` uses [`Value::is_eq`] instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let (mut left, mut right) = (self.clone(), other.clone());
        loop {
            match (&left, &right) {
                (Value::Pair(a), Value::Pair(b)) => {
                    if Gc::ptr_eq(a, b) {
                        return true;
                    }
                    if a.car() != b.car() {
                        return false;
                    }
                    let (next_left, next_right) = (a.cdr(), b.cdr());
                    left = next_left;
                    right = next_right;
                }
                (Value::Procedure(a), Value::Procedure(b)) => return Gc::ptr_eq(a, b),
                (Value::Unspecified, Value::Unspecified) => return true,
                _ => return left.is_eq(&right),
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Character(c)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(f64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        list_from(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        list_from(arr.into_iter().map(Into::into))
    }
}

/// Helper for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for creating values from anything convertible into a [`Value`]
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper for the empty list
pub fn nil() -> Value {
    Value::Nil
}

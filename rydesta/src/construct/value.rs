//! Runtime values (§3's value table) and the composite records that back
//! them: variations/functions, objects, routeables, excerpts, builtins.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use super::node::{Body, NodeRef};
use super::pattern::PatternRef;
use super::Env;
use crate::common::Number;
use crate::eval::error::RuntimeError;
use crate::eval::state::State;

#[derive(Clone)]
pub enum Value {
    Num(Number),
    Str(Rc<str>),
    Bool(bool),
    Vec(Rc<Vec<Value>>),
    Nothing,
    /// Result of `type v`; also a cast target (`num`, `str`, `vec`, `type`).
    Type(&'static str),
    Variations(Rc<RefCell<Variations>>),
    Object(Rc<RyObject>),
    Routeable(Rc<Routeable>),
    Excerpt(Rc<Excerpt>),
    Builtin(Rc<Builtin>),
}

impl Value {
    /// The tag reflected back to the language by `type v`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Num(_) => "num",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::Vec(_) => "vec",
            Value::Nothing => "nothing",
            Value::Type(_) => "type",
            Value::Variations(_) => "variations",
            Value::Object(_) => "object",
            Value::Routeable(_) => "routeable",
            Value::Excerpt(_) => "excerpt",
            Value::Builtin(_) => "builtin",
        }
    }

    /// Structural equality per §4.2: booleans and other boxed primitives
    /// compare by value, vectors compare pairwise and recursively,
    /// everything else (objects go through the extract path, not here)
    /// is unequal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Vec(a), Value::Vec(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Strings print raw; everything else prints through its repr
    /// (`#:print`, §6).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            other => write!(f, "{:?}", other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Vec(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                write!(f, "]")
            }
            Value::Nothing => write!(f, "nothing"),
            Value::Type(tag) => write!(f, "[type {}]", tag),
            Value::Variations(v) => write!(f, "[variations {}]", v.borrow().name),
            Value::Object(o) => write!(f, "[object {}]", o.name),
            Value::Routeable(r) => write!(f, "[routeable {}]", r.name),
            Value::Excerpt(_) => write!(f, "[excerpt]"),
            Value::Builtin(b) => write!(f, "[builtin #:{}]", b.name),
        }
    }
}

/// A named overload set. Kept sorted in descending aggregate-signature
/// order (I1) so dispatch always tries the most specific variation first.
pub struct Variations {
    pub name: String,
    pub quoting: bool,
    pub naked: bool,
    pub variations: Vec<Rc<Function>>,
}

impl Variations {
    pub fn new(quoting: bool, naked: bool, name: String) -> Variations {
        Variations {
            name,
            quoting,
            naked,
            variations: Vec::new(),
        }
    }

    /// Inserts, keeping the list sorted descending by signature. Ties keep
    /// insertion order (a stable sort), matching the source's append-then-
    /// resort-descending behaviour.
    pub fn add(&mut self, function: Rc<Function>) {
        self.variations.push(function);
        self.variations
            .sort_by(|a, b| b.signature.cmp(&a.signature));
    }
}

pub struct Function {
    pub name: String,
    pub signature: i128,
    pub params: Vec<PatternRef>,
    pub body: Body,
    pub header: String,
    /// Captured defining environment. A `RefCell` because the closure
    /// self-reference trick (§9) re-captures it *after* the function's own
    /// name has been installed, so recursive calls can see the binding.
    pub captured: RefCell<Env>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// A variation with exactly one parameter pattern is "slurpy": it may
    /// absorb the whole argument vector as one `vec` value (glossary).
    pub fn is_slurpy(&self) -> bool {
        self.params.len() == 1
    }
}

pub struct RyObject {
    pub name: String,
    pub secret: bool,
    pub props: Vec<String>,
    pub block: Body,
    pub captured: Env,
}

/// An instantiated object, or a non-exposed module namespace. Members are
/// reached by dot-path.
pub struct Routeable {
    pub name: String,
    pub env: Env,
    pub extractable: Vec<Value>,
}

/// A quoted, unevaluated expression plus the environment it was quoted in.
pub struct Excerpt {
    pub node: NodeRef,
    pub filename: Rc<Path>,
    pub line: usize,
    pub env: Env,
}

pub type NativeFn = Rc<dyn Fn(&mut State, Vec<Value>) -> Result<Value, RuntimeError>>;

pub struct Builtin {
    pub name: String,
    pub func: NativeFn,
}

impl Builtin {
    pub fn call(&self, state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.func)(state, args)
    }
}

//! Datatypes the reader, parser, pattern engine, and evaluator all share:
//! parse nodes, patterns, and runtime values. Mirrors the teacher's own
//! `construct` module (its `tree.rs` holds the analogous AST/Pattern enums).

pub mod node;
pub mod pattern;
pub mod value;

use std::collections::HashMap;

pub use node::{Case, Node};
pub use pattern::Pattern;
pub use value::Value;

/// An item tagged with the source line it came from. Rydesta's error model
/// is line-only (no column spans), so this is deliberately thinner than
/// the teacher's `Spanned<T>`/byte-range `Span`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub line: usize,
    pub item: T,
}

impl<T> Spanned<T> {
    pub fn new(line: usize, item: T) -> Spanned<T> {
        Spanned { line, item }
    }
}

/// A binding environment. Copied wholesale on function/object entry, per
/// the language's "no scope chain, closures capture a snapshot" model.
pub type Env = HashMap<String, Value>;

//! Rydesta: a small dynamically typed language with pattern-matching
//! function dispatch, user-extensible syntax, object constructors with
//! destructuring, a module system, and quote/unquote metaprogramming.
//!
//! `reader` lexes and parses source text while exposing the switch tables
//! the evaluator mutates as it processes operator/keyword-defining
//! `Function` nodes (§4.1). `pattern` ranks and matches the structural
//! patterns both function dispatch and `Assign`/`Cases` rely on (§4.2).
//! `eval` is the tree-walking evaluator, including the explicit-loop
//! tail-call elimination that keeps self-tail recursion in bounded stack
//! depth (§4.3). `kernel` bootstraps the root environment and drives a
//! source string through reader and evaluator (§4.4).

pub mod common;
pub mod construct;
pub mod error;
pub mod eval;
pub mod kernel;
pub mod pattern;
pub mod reader;

pub use error::{ErrorKind, RydestaError};
pub use kernel::Master;

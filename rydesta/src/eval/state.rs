use std::path::Path;
use std::rc::Rc;

use crate::construct::Env;
use crate::reader::Reader;

/// The evaluator's working state: current environment, current line, the
/// file being evaluated, and the reader (so the evaluator can mutate its
/// switch tables when it processes a quoted function definition).
///
/// `State::copy` is the "environment is copied, not shared" rule (§3, §5)
/// made concrete: every function call, object instantiation, and `quote`
/// captures a `copy()` of the state it closed over.
pub struct State {
    pub filename: Rc<Path>,
    pub line: usize,
    pub env: Env,
    pub reader: Reader,
}

impl State {
    pub fn new(filename: Rc<Path>, reader: Reader) -> State {
        State {
            filename,
            line: 0,
            env: Env::new(),
            reader,
        }
    }

    /// Shallow-copies the environment; the reader is not duplicated since a
    /// capsule never needs to re-lex anything, only to evaluate already-
    /// parsed nodes.
    pub fn capsule(&self) -> Env {
        self.env.clone()
    }
}

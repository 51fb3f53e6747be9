//! Datastructures shared by the reader, the pattern engine, and the evaluator.

pub mod number;
pub mod source;

pub use number::Number;
pub use source::Source;

//! The tree-walking evaluator (§4.3): special forms, multi-variation call
//! dispatch, and the explicit-loop tail-call elimination that lets
//! self-tail-recursive Rydesta programs run in bounded Rust stack depth.

pub mod error;
pub mod state;
pub mod visit;

pub use error::RuntimeError;
pub use state::State;
pub use visit::{eval_flow, eval_node, Flow};

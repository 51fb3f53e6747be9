//! Pattern nodes: both a parse-time product of the reader's pattern grammar
//! (§4.1) and the runtime input to the matcher in `crate::pattern` (§4.2).

use std::rc::Rc;

use super::{node::Node, Spanned};

pub type PatternRef = Rc<Spanned<Pattern>>;
pub type NodeRef = Rc<Spanned<Node>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Binds `name` unconditionally.
    Identifier(String),
    /// Matches anything, binds nothing.
    Discard,
    /// Evaluates the expression and requires equality with the value.
    Compare(NodeRef),
    /// Binds `name`, then requires the guard expression to evaluate true.
    Guard(String, NodeRef),
    /// `(ObjName field...)` — structural/object destructuring.
    Extract(String, Vec<PatternRef>),
    /// `[member...]` — vector/string unpacking.
    Unpack(Vec<PatternRef>),
    /// `name*` inside an unpack: zero-or-more, binds the captured slice.
    NamedMany(String),
    /// `name+` inside an unpack: one-or-more, binds the captured slice.
    NamedMulti(String),
    /// `(*)` inside an unpack: zero-or-more, discards.
    DiscardMany,
    /// `(+)` inside an unpack: one-or-more, discards.
    DiscardMulti,
}

impl Pattern {
    /// True for the "variable-length" member kinds the unpack algorithm
    /// treats specially (§4.2 unpack rules).
    pub fn is_variadic(&self) -> bool {
        matches!(
            self,
            Pattern::NamedMany(_)
                | Pattern::NamedMulti(_)
                | Pattern::DiscardMany
                | Pattern::DiscardMulti
        )
    }

    /// True for the delimiter-eligible kinds a variable-length member can
    /// scan forward to find (§4.2: "If the next member is a delimiting
    /// single-value pattern").
    pub fn is_delimiter(&self) -> bool {
        matches!(
            self,
            Pattern::Compare(_) | Pattern::Guard(_, _) | Pattern::Extract(_, _)
        )
    }

    pub fn requires_at_least_one(&self) -> bool {
        matches!(self, Pattern::NamedMulti(_) | Pattern::DiscardMulti)
    }
}

//! Parse nodes. One enum variant per tag in §3's node table, rather than
//! the source's generic tagged-record-with-property-bag — the systems-
//! language rendition §9 calls for.

use std::rc::Rc;

use super::pattern::PatternRef;
use super::Spanned;

pub type NodeRef = Rc<Spanned<Node>>;
pub type Body = Rc<[Spanned<Node>]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw numeric literal text, parsed into a `Number` at evaluation time.
    Number(String),
    /// Raw string literal text (escapes and `$name` interpolations still
    /// literal); both are resolved together at evaluation time (§4.3).
    String(String),
    Vector(Vec<NodeRef>),
    /// `#:name` — a host-native builtin reference.
    Builtin(String),
    /// A (possibly dotted) name reference. An empty `path` is a bare
    /// identifier reference.
    Path { parent: String, path: Vec<String> },
    Call { callee: NodeRef, args: Vec<NodeRef> },
    /// `new Name arg...` — object instantiation.
    Instance { callee: NodeRef, args: Vec<NodeRef> },
    Assign { pattern: PatternRef, value: NodeRef },
    Function {
        name: String,
        quoting: bool,
        naked: bool,
        params: Vec<PatternRef>,
        body: Body,
    },
    Object {
        name: String,
        secret: bool,
        props: Vec<String>,
        block: Body,
    },
    Ret(NodeRef),
    If {
        cond: NodeRef,
        body: Body,
        other: Option<Body>,
    },
    Cases {
        head: NodeRef,
        cases: Vec<Spanned<Case>>,
    },
    Expect(NodeRef),
    Needs {
        hidden: bool,
        module: String,
        exposed: bool,
    },
    Umbrella { name: String, members: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Case {
    /// `pattern -> body`
    Match { pattern: PatternRef, body: Body },
    /// `infix => body`
    Value { expr: NodeRef, body: Body },
}

//! Recursive-descent term grammar plus a Pratt infix parser, combined into
//! one incremental `Reader` the way the source's own reader interleaves
//! lexing and parsing a single top-level form at a time (§4.1).

use std::rc::Rc;

use super::error::ReaderError;
use super::lexer::Lexer;
use super::switches::{Assoc, Switches};
use super::token::{self, Token};
use crate::construct::node::{Body, Node, NodeRef};
use crate::construct::pattern::{Pattern, PatternRef};
use crate::construct::{Case, Spanned};

/// Keyword token kinds, as the lexer uppercases them.
mod kw {
    pub const DIVISION: &str = "DIVISION";
    pub const IF: &str = "IF";
    pub const ELSE: &str = "ELSE";
    pub const CASE: &str = "CASE";
    pub const EXPECT: &str = "EXPECT";
    pub const NEEDS: &str = "NEEDS";
    pub const HIDDEN: &str = "HIDDEN";
    pub const EXPOSED: &str = "EXPOSED";
    pub const RET: &str = "RET";
    pub const SECRET: &str = "SECRET";
    pub const OBJ: &str = "OBJ";
    pub const UMBRELLA: &str = "UMBRELLA";
    pub const FOR: &str = "FOR";
    pub const NEW: &str = "NEW";
}

/// A checkpoint of lexer/parser position, used to backtrack between the
/// grammar's ambiguous top-level alternatives (function / assign / bare
/// expression all start with the same token classes).
struct Checkpoint {
    pos: usize,
    line: usize,
    token: Token,
}

pub struct Reader {
    switches: Switches,
    source: String,
    pos: usize,
    line: usize,
    token: Token,
}

impl Reader {
    pub fn new() -> Reader {
        Reader {
            switches: Switches::new(),
            source: String::new(),
            pos: 0,
            line: 1,
            token: Token::new(token::EOF, "", 1),
        }
    }

    pub fn switches(&self) -> &Switches {
        &self.switches
    }

    pub fn switches_mut(&mut self) -> &mut Switches {
        &mut self.switches
    }

    /// Union-updates this reader's switch tables from another's (§4.1
    /// `merge`), used when a `needs` import defines new grammar.
    pub fn merge(&mut self, other: &Reader) {
        self.switches.merge(&other.switches);
    }

    /// Replaces the text buffer and resets position; switch tables (the
    /// grammar extensions accumulated so far) are left untouched, so a
    /// REPL's operator definitions keep working on the next line fed in.
    pub fn update(&mut self, source: &str) -> Result<(), ReaderError> {
        self.source = source.to_string();
        self.pos = 0;
        self.line = 1;
        self.advance()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
            token: self.token.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.line = checkpoint.line;
        self.token = checkpoint.token;
    }

    fn advance(&mut self) -> Result<(), ReaderError> {
        let mut lexer = Lexer::new(&self.source);
        lexer.pos = self.pos;
        lexer.line = self.line;
        let token = lexer.next_token(&self.switches)?;
        self.pos = lexer.pos;
        self.line = lexer.line;
        self.token = token;
        Ok(())
    }

    fn check(&self, kind: &str) -> bool {
        self.token.kind == kind
    }

    fn expect(&mut self, kind: &str) -> Result<Token, ReaderError> {
        if self.check(kind) {
            let token = self.token.clone();
            self.advance()?;
            Ok(token)
        } else {
            Err(ReaderError::new(
                self.line,
                format!("expected {}, found '{}'", kind, self.token.text),
            ))
        }
    }

    fn try_parse<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ReaderError>) -> Option<T> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.restore(checkpoint);
                None
            }
        }
    }

    fn starts_pattern_or_value(&self) -> bool {
        matches!(
            self.token.kind.as_str(),
            t if t == token::ID
                || t == token::NUM
                || t == token::STR
                || t == token::BUILTIN
                || t == "_"
                || t == "["
                || t == "("
        )
    }

    // ---- top-level driver -------------------------------------------------

    /// Yields the next top-level form(s), or `None` at `stopper` (`"EOF"`
    /// unless parsing a nested block, which stops at `"}"`). Block-
    /// expanding forms (`for`, `division`) yield more than one node.
    pub fn next(&mut self, stopper: &str) -> Result<Option<Vec<Spanned<Node>>>, ReaderError> {
        loop {
            if self.check(token::NL) {
                self.advance()?;
                continue;
            }
            if self.check(stopper) {
                return Ok(None);
            }
            break;
        }
        let terms = self.parse_term(true)?;
        if self.check(token::NL) {
            self.advance()?;
        } else if !self.check(stopper) {
            return Err(ReaderError::new(
                self.line,
                "strange text follows term (or two terms in a row)",
            ));
        }
        Ok(Some(terms))
    }

    fn parse_block_terms(&mut self) -> Result<Body, ReaderError> {
        self.expect("{")?;
        let mut out = Vec::new();
        loop {
            while self.check(token::NL) {
                self.advance()?;
            }
            if self.check("}") {
                break;
            }
            let terms = self.parse_term(false)?;
            out.extend(terms);
            if self.check(token::NL) {
                self.advance()?;
            } else if !self.check("}") {
                return Err(ReaderError::new(
                    self.line,
                    "strange text follows term inside block",
                ));
            }
        }
        self.expect("}")?;
        Ok(Rc::from(out))
    }

    fn parse_term(&mut self, top_level: bool) -> Result<Vec<Spanned<Node>>, ReaderError> {
        if let Some(terms) = self.try_parse(|r| r.division()) {
            return Ok(terms);
        }
        match self.token.kind.as_str() {
            kw::IF => return Ok(vec![self.if_term()?]),
            kw::CASE => return Ok(vec![self.case_term()?]),
            kw::EXPECT => return Ok(vec![self.expect_term()?]),
            kw::NEEDS => return Ok(vec![self.needs_term()?]),
            kw::RET => return Ok(vec![self.ret_term()?]),
            kw::SECRET | kw::OBJ => return Ok(vec![self.obj_term()?]),
            kw::UMBRELLA => return Ok(vec![self.umbrella_term()?]),
            kw::FOR => return self.for_term(),
            _ => {}
        }
        if let Some(node) = self.try_parse(|r| r.function_term(top_level)) {
            return Ok(vec![node]);
        }
        if let Some(node) = self.try_parse(|r| r.assign_term(top_level)) {
            return Ok(vec![node]);
        }
        let expr = self.infix(0)?;
        Ok(vec![(*expr).clone()])
    }

    // ---- term productions --------------------------------------------------

    fn division(&mut self) -> Result<Vec<Spanned<Node>>, ReaderError> {
        if self.check(token::ID) {
            self.advance()?;
        }
        self.expect(kw::DIVISION)?;
        let body = self.parse_block_terms()?;
        Ok(body.to_vec())
    }

    fn if_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        self.expect(kw::IF)?;
        let cond = self.infix(0)?;
        let body = self.parse_block_terms()?;
        let other = if self.check(kw::ELSE) {
            self.advance()?;
            Some(self.parse_block_terms()?)
        } else {
            None
        };
        Ok(Spanned::new(line, Node::If { cond, body, other }))
    }

    fn case_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        self.expect(kw::CASE)?;
        let head = self.infix(0)?;
        self.expect("{")?;
        let mut cases = Vec::new();
        loop {
            while self.check(token::NL) {
                self.advance()?;
            }
            if self.check("}") {
                break;
            }
            let case_line = self.line;
            let case = if let Some(case) = self.try_parse(|r| r.match_case()) {
                case
            } else {
                self.value_case()?
            };
            cases.push(Spanned::new(case_line, case));
            if self.check(token::NL) {
                self.advance()?;
            } else if !self.check("}") {
                return Err(ReaderError::new(self.line, "strange text follows case arm"));
            }
        }
        self.expect("}")?;
        Ok(Spanned::new(line, Node::Cases { head, cases }))
    }

    fn match_case(&mut self) -> Result<Case, ReaderError> {
        let pattern = self.pattern()?;
        self.expect("->")?;
        let body = self.case_body()?;
        Ok(Case::Match { pattern, body })
    }

    fn value_case(&mut self) -> Result<Case, ReaderError> {
        let expr = self.infix(0)?;
        self.expect("=>")?;
        let body = self.case_body()?;
        Ok(Case::Value { expr, body })
    }

    fn case_body(&mut self) -> Result<Body, ReaderError> {
        if self.check("{") {
            self.parse_block_terms()
        } else {
            let expr = self.infix(0)?;
            Ok(Rc::from(vec![(*expr).clone()]))
        }
    }

    fn expect_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        self.expect(kw::EXPECT)?;
        let expr = self.infix(0)?;
        Ok(Spanned::new(line, Node::Expect(expr)))
    }

    fn needs_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        self.expect(kw::NEEDS)?;
        let hidden = if self.check(kw::HIDDEN) {
            self.advance()?;
            true
        } else {
            false
        };
        let module = if self.check(token::ID) || self.check(token::STR) {
            let text = self.token.text.clone();
            self.advance()?;
            text
        } else {
            return Err(ReaderError::new(self.line, "expected a module name"));
        };
        let exposed = if self.check(kw::EXPOSED) {
            self.advance()?;
            true
        } else {
            false
        };
        Ok(Spanned::new(
            line,
            Node::Needs {
                hidden,
                module,
                exposed,
            },
        ))
    }

    fn ret_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        self.expect(kw::RET)?;
        let expr = self.infix(0)?;
        Ok(Spanned::new(line, Node::Ret(expr)))
    }

    fn obj_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        let secret = if self.check(kw::SECRET) {
            self.advance()?;
            true
        } else {
            false
        };
        self.expect(kw::OBJ)?;
        let name = self.expect(token::ID)?.text;
        let mut props = Vec::new();
        while self.check(token::ID) {
            props.push(self.token.text.clone());
            self.advance()?;
        }
        let block = if self.check("{") {
            self.parse_block_terms()?
        } else {
            Rc::from(Vec::new())
        };
        Ok(Spanned::new(
            line,
            Node::Object {
                name,
                secret,
                props,
                block,
            },
        ))
    }

    fn umbrella_term(&mut self) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        self.expect(kw::UMBRELLA)?;
        let name = self.expect(token::ID)?.text;
        self.expect(kw::FOR)?;
        let mut members = vec![self.expect(token::ID)?.text];
        while self.check(token::ID) {
            members.push(self.token.text.clone());
            self.advance()?;
        }
        Ok(Spanned::new(line, Node::Umbrella { name, members }))
    }

    fn for_term(&mut self) -> Result<Vec<Spanned<Node>>, ReaderError> {
        self.expect(kw::FOR)?;
        let mut shared = Vec::new();
        while self.starts_pattern_or_value() {
            shared.push(self.pattern()?);
        }
        self.expect("{")?;
        let mut functions = Vec::new();
        loop {
            while self.check(token::NL) {
                self.advance()?;
            }
            if self.check("}") {
                break;
            }
            let spanned = self.function_term(true)?;
            if let Spanned {
                line,
                item:
                    Node::Function {
                        name,
                        quoting,
                        naked,
                        mut params,
                        body,
                    },
            } = spanned
            {
                let mut full = shared.clone();
                full.append(&mut params);
                functions.push(Spanned::new(
                    line,
                    Node::Function {
                        name,
                        quoting,
                        naked,
                        params: full,
                        body,
                    },
                ));
            } else {
                unreachable!("function_term always returns Node::Function")
            }
            if self.check(token::NL) {
                self.advance()?;
            } else if !self.check("}") {
                return Err(ReaderError::new(self.line, "strange text follows function"));
            }
        }
        self.expect("}")?;
        Ok(functions)
    }

    fn function_term(&mut self, top_level: bool) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        let name_token = self.expect(token::ID)?;
        let mut params = Vec::new();
        while !self.check("->") {
            if !self.starts_pattern_or_value() {
                return Err(ReaderError::new(self.line, "expected '->' or a parameter"));
            }
            params.push(self.pattern()?);
        }
        self.expect("->")?;
        let body = if self.check("{") {
            self.parse_block_terms()?
        } else {
            let expr = self.infix(0)?;
            Rc::from(vec![(*expr).clone()])
        };
        Ok(Spanned::new(
            line,
            Node::Function {
                name: name_token.text,
                quoting: false,
                naked: top_level,
                params,
                body,
            },
        ))
    }

    fn assign_term(&mut self, top_level: bool) -> Result<Spanned<Node>, ReaderError> {
        let line = self.line;
        let pattern = self.pattern()?;
        if top_level && matches!(pattern.item, Pattern::Guard(_, _)) {
            return Err(ReaderError::new(
                line,
                "guard patterns are forbidden at the top level",
            ));
        }
        self.expect("=")?;
        let value = self.infix(0)?;
        Ok(Spanned::new(line, Node::Assign { pattern, value }))
    }

    // ---- pattern grammar ----------------------------------------------------

    fn pattern(&mut self) -> Result<PatternRef, ReaderError> {
        let line = self.line;
        match self.token.kind.as_str() {
            "_" => {
                self.advance()?;
                Ok(Rc::new(Spanned::new(line, Pattern::Discard)))
            }
            t if t == token::ID => {
                let name = self.token.text.clone();
                self.advance()?;
                if name == "_" {
                    Ok(Rc::new(Spanned::new(line, Pattern::Discard)))
                } else {
                    Ok(Rc::new(Spanned::new(line, Pattern::Identifier(name))))
                }
            }
            t if t == token::NUM => {
                let text = self.token.text.clone();
                self.advance()?;
                let node = Rc::new(Spanned::new(line, Node::Number(text)));
                Ok(Rc::new(Spanned::new(line, Pattern::Compare(node))))
            }
            t if t == token::STR => {
                let text = self.token.text.clone();
                self.advance()?;
                let node = Rc::new(Spanned::new(line, Node::String(text)));
                Ok(Rc::new(Spanned::new(line, Pattern::Compare(node))))
            }
            "[" => self.pattern_unpack(),
            "(" => self.pattern_parenthesized(),
            _ => Err(ReaderError::new(
                self.line,
                format!("expected a pattern, found '{}'", self.token.text),
            )),
        }
    }

    fn pattern_unpack(&mut self) -> Result<PatternRef, ReaderError> {
        let line = self.line;
        self.expect("[")?;
        let mut members = Vec::new();
        while !self.check("]") {
            members.push(self.pattern_multi()?);
        }
        self.expect("]")?;
        Ok(Rc::new(Spanned::new(line, Pattern::Unpack(members))))
    }

    /// A member of an unpack pattern: the `*`/`+` variadic forms, or a
    /// plain pattern for a fixed-position member.
    fn pattern_multi(&mut self) -> Result<PatternRef, ReaderError> {
        let line = self.line;
        if self.check("(") {
            if let Some(p) = self.try_parse(|r| {
                r.advance()?; // (
                if r.check("*") {
                    r.advance()?;
                    r.expect(")")?;
                    Ok(Pattern::DiscardMany)
                } else if r.check("+") {
                    r.advance()?;
                    r.expect(")")?;
                    Ok(Pattern::DiscardMulti)
                } else {
                    Err(ReaderError::new(r.line, "not a multi-capture marker"))
                }
            }) {
                return Ok(Rc::new(Spanned::new(line, p)));
            }
        }
        if self.check(token::ID) {
            let name = self.token.text.clone();
            if let Some(p) = self.try_parse(|r| {
                r.advance()?; // ID
                if r.check("*") {
                    r.advance()?;
                    Ok(Pattern::NamedMany(name.clone()))
                } else if r.check("+") {
                    r.advance()?;
                    Ok(Pattern::NamedMulti(name.clone()))
                } else {
                    Err(ReaderError::new(r.line, "not a variadic member"))
                }
            }) {
                return Ok(Rc::new(Spanned::new(line, p)));
            }
        }
        self.pattern()
    }

    /// `(Name field...)` extraction, `(name, guard-expr)` guard, or a
    /// "nuclear guard" `(name <op> value)` where `<op>` binds at exactly
    /// `guard_precedence` — sugar for `(name, name <op> value)`.
    fn pattern_parenthesized(&mut self) -> Result<PatternRef, ReaderError> {
        let line = self.line;
        self.expect("(")?;
        let name = self.expect(token::ID)?.text;
        if self.check(",") {
            self.advance()?;
            let expr = self.infix(0)?;
            self.expect(")")?;
            return Ok(Rc::new(Spanned::new(line, Pattern::Guard(name, expr))));
        }
        if let Some((_, prec)) = self.switches.precedence_of(&self.token.kind) {
            if prec == self.switches.guard_precedence {
                let op_kind = self.token.kind.clone();
                self.advance()?;
                let rhs = self.value()?;
                self.expect(")")?;
                let lhs = Rc::new(Spanned::new(
                    line,
                    Node::Path {
                        parent: name.clone(),
                        path: Vec::new(),
                    },
                ));
                let callee = Rc::new(Spanned::new(
                    line,
                    Node::Path {
                        parent: format!("'{}", op_kind.to_lowercase()),
                        path: Vec::new(),
                    },
                ));
                let guard = Rc::new(Spanned::new(
                    line,
                    Node::Call {
                        callee,
                        args: vec![lhs, rhs],
                    },
                ));
                return Ok(Rc::new(Spanned::new(line, Pattern::Guard(name, guard))));
            }
        }
        let mut fields = Vec::new();
        while !self.check(")") {
            fields.push(self.pattern()?);
        }
        self.expect(")")?;
        Ok(Rc::new(Spanned::new(line, Pattern::Extract(name, fields))))
    }

    // ---- expression grammar --------------------------------------------------

    fn infix(&mut self, depth: i64) -> Result<NodeRef, ReaderError> {
        let mut left = self.prefix()?;
        loop {
            let kind = self.token.kind.clone();
            let (assoc, prec) = match self.switches.precedence_of(&kind) {
                Some(entry) if entry.1 > depth => entry,
                _ => break,
            };
            let line = self.line;
            self.advance()?;
            let next_depth = match assoc {
                Assoc::Left => prec,
                Assoc::Right => prec - 1,
            };
            let right = self.infix(next_depth)?;
            let callee = Rc::new(Spanned::new(
                line,
                Node::Path {
                    parent: format!("'{}", kind.to_lowercase()),
                    path: Vec::new(),
                },
            ));
            left = Rc::new(Spanned::new(
                line,
                Node::Call {
                    callee,
                    args: vec![left, right],
                },
            ));
        }
        Ok(left)
    }

    fn prefix(&mut self) -> Result<NodeRef, ReaderError> {
        let line = self.line;
        if self.switches.is_prefix(&self.token.kind) {
            let kind = self.token.kind.clone();
            self.advance()?;
            let operand = self.prefix()?;
            let callee = Rc::new(Spanned::new(
                line,
                Node::Path {
                    parent: format!("'{}", kind.to_lowercase()),
                    path: Vec::new(),
                },
            ));
            return Ok(Rc::new(Spanned::new(
                line,
                Node::Call {
                    callee,
                    args: vec![operand],
                },
            )));
        }
        self.call()
    }

    fn call(&mut self) -> Result<NodeRef, ReaderError> {
        let line = self.line;
        let is_callish = self.check(token::ID)
            || self.check(kw::NEW)
            || self.check(token::BUILTIN)
            || self.check("(");
        if !is_callish {
            return self.value();
        }
        let instantiating = self.check(kw::NEW);
        if instantiating {
            self.advance()?;
        }
        let callee = self.value()?;
        if self.check("!") {
            self.advance()?;
            return Ok(Rc::new(Spanned::new(
                line,
                Node::Call {
                    callee,
                    args: Vec::new(),
                },
            )));
        }
        let mut args = Vec::new();
        while let Some(v) = self.try_parse(|r| r.value()) {
            args.push(v);
        }
        if !instantiating && args.is_empty() {
            return Ok(callee);
        }
        if instantiating {
            Ok(Rc::new(Spanned::new(line, Node::Instance { callee, args })))
        } else {
            Ok(Rc::new(Spanned::new(line, Node::Call { callee, args })))
        }
    }

    fn value(&mut self) -> Result<NodeRef, ReaderError> {
        let line = self.line;
        match self.token.kind.as_str() {
            t if t == token::ID => {
                let parent = self.token.text.clone();
                self.advance()?;
                let mut path = Vec::new();
                while self.check(".") {
                    self.advance()?;
                    path.push(self.expect(token::ID)?.text);
                }
                Ok(Rc::new(Spanned::new(line, Node::Path { parent, path })))
            }
            t if t == token::BUILTIN => {
                let name = self.token.text.clone();
                self.advance()?;
                Ok(Rc::new(Spanned::new(line, Node::Builtin(name))))
            }
            t if t == token::STR => {
                let text = self.token.text.clone();
                self.advance()?;
                Ok(Rc::new(Spanned::new(line, Node::String(text))))
            }
            t if t == token::NUM => {
                let text = self.token.text.clone();
                self.advance()?;
                Ok(Rc::new(Spanned::new(line, Node::Number(text))))
            }
            "[" => {
                self.advance()?;
                let mut items = Vec::new();
                loop {
                    while self.check(token::NL) {
                        self.advance()?;
                    }
                    if self.check("]") {
                        break;
                    }
                    items.push(self.value()?);
                }
                self.expect("]")?;
                Ok(Rc::new(Spanned::new(line, Node::Vector(items))))
            }
            "(" => {
                self.advance()?;
                let expr = self.infix(0)?;
                self.expect(")")?;
                Ok(expr)
            }
            _ => Err(ReaderError::new(
                self.line,
                format!("expected a value, found '{}'", self.token.text),
            )),
        }
    }
}

impl Default for Reader {
    fn default() -> Reader {
        Reader::new()
    }
}

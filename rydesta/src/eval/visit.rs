//! The tree-walking evaluator proper (§4.3).
//!
//! `eval_flow` is written as a single `loop` rather than as ordinary mutual
//! recursion: every tail position (a function call that is the last
//! statement of a body, an `if`/`case` arm's last statement) is handled by
//! rewriting the loop's `current` node and `continue`-ing, instead of by a
//! recursive Rust call. That is what makes `loop 100000` (self-tail
//! recursion through a `Cases` variation) run in bounded stack depth (§5).
//!
//! Because `State` is threaded as `&mut State` rather than copied per call
//! frame (as the source's `RyState.copy()` is), entering a function's own
//! captured environment has to be undone by hand: `saved_env` remembers the
//! caller's environment the first time this `eval_flow` invocation swaps in
//! a callee's capsule, and is restored exactly once, when the loop finally
//! breaks. Every further tail hop within the same invocation just overwrites
//! `state.env` again without touching `saved_env`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::construct::node::{Body, Node, NodeRef};
use crate::construct::pattern::Pattern;
use crate::construct::value::{Excerpt, Function, Routeable, RyObject, Value, Variations};
use crate::construct::{Case, Env, Spanned};
use crate::common::Number;
use crate::eval::error::RuntimeError;
use crate::eval::state::State;
use crate::reader::Assoc;

/// What a body produced: an ordinary value, or an early `ret`.
#[derive(Debug, Clone)]
pub enum Flow {
    Value(Value),
    Return(Value),
}

/// Evaluates one node for its value, discarding whether it was reached via
/// an explicit `ret`. Used everywhere a `ret` would be meaningless: operand
/// positions, conditions, pattern-match subjects.
pub fn eval_node(node: &NodeRef, state: &mut State) -> Result<Value, RuntimeError> {
    match eval_flow(node, state)? {
        Flow::Value(v) => Ok(v),
        Flow::Return(v) => Ok(v),
    }
}

fn bare_path_name(node: &Node) -> Option<&str> {
    match node {
        Node::Path { parent, path } if path.is_empty() => Some(parent.as_str()),
        _ => None,
    }
}

fn expect_unary(args: &[NodeRef], name: &str, line: usize) -> Result<(), RuntimeError> {
    if args.len() != 1 {
        Err(RuntimeError::new(
            line,
            format!("`{}` takes exactly one argument", name),
        ))
    } else {
        Ok(())
    }
}

fn function_header(name: &str, arity: usize) -> String {
    format!("{} ({} parameter{})", name, arity, if arity == 1 { "" } else { "s" })
}

/// Either a body finished early (an inner `ret`, or an error) or it fell
/// through to its last statement, which the caller should hop into.
enum BodyStep {
    Done(Result<Flow, RuntimeError>),
    Tail(NodeRef),
}

fn run_prefix(body: &Body, state: &mut State) -> BodyStep {
    for stmt in body[..body.len() - 1].iter() {
        let node: NodeRef = Rc::new(stmt.clone());
        match eval_flow(&node, state) {
            Ok(Flow::Value(_)) => {}
            Ok(Flow::Return(v)) => return BodyStep::Done(Ok(Flow::Return(v))),
            Err(e) => return BodyStep::Done(Err(e)),
        }
    }
    BodyStep::Tail(Rc::new(body[body.len() - 1].clone()))
}

fn case_rank(case: &Spanned<Case>) -> (u8, i128) {
    match &case.item {
        Case::Value { .. } => (2, 0),
        Case::Match { pattern, .. } => {
            if matches!(pattern.item, Pattern::Discard) {
                (1, i128::MAX)
            } else {
                (1, crate::pattern::signature(&pattern.item))
            }
        }
    }
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Manual `$name`/`$name!`/`$name?` scan, since a regex lookbehind (to keep
/// a trailing `-` out of the bound name) isn't available on stable `regex`.
fn interpolate(text: &str, env: &Env, line: usize) -> Result<String, RuntimeError> {
    let mut out = String::new();
    let mut i = 0usize;
    while i < text.len() {
        let c = text[i..].chars().next().unwrap();
        if c != '$' {
            out.push(c);
            i += c.len_utf8();
            continue;
        }
        let rest = &text[i + 1..];
        let mut name_end = 0usize;
        for (pos, ch) in rest.char_indices() {
            if pos == 0 {
                if !ch.is_ascii_alphabetic() {
                    break;
                }
            } else if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
                break;
            }
            name_end = pos + ch.len_utf8();
        }
        if name_end == 0 {
            out.push(c);
            i += c.len_utf8();
            continue;
        }
        if rest.as_bytes()[name_end - 1] == b'-' {
            name_end -= 1;
        }
        let mut consumed = name_end;
        if let Some(suffix) = rest[name_end..].chars().next() {
            if suffix == '!' || suffix == '?' {
                consumed += suffix.len_utf8();
            }
        }
        let name = &rest[..consumed];
        let bound = env.get(name).ok_or_else(|| {
            RuntimeError::new(line, format!("interpolated name \"{}\" is not defined", name))
        })?;
        match bound {
            Value::Str(s) => out.push_str(s),
            other => out.push_str(&format!("{:?}", other)),
        }
        i += 1 + consumed;
    }
    Ok(out)
}

/// Decodes the escape set the lexer itself accepts (§4.1's string grammar:
/// `\n \r \t \v \\ \$ \" \' \0`); anything else is left as a literal
/// backslash followed by the character.
fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0B}'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push('$'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn render_string(text: &str, state: &State) -> Result<String, RuntimeError> {
    let interpolated = interpolate(text, &state.env, state.line)?;
    Ok(decode_escapes(&interpolated))
}

/// Drives one top-level node (or any sub-node reached in a tail position)
/// through to a `Flow`, looping in place instead of recursing for every
/// tail hop.
pub fn eval_flow(node: &NodeRef, state: &mut State) -> Result<Flow, RuntimeError> {
    let mut current = Rc::clone(node);
    let mut saved_env: Option<Env> = None;

    let outcome: Result<Flow, RuntimeError> = 'step: loop {
        state.line = current.line;
        match &current.item {
            Node::Number(text) => match Number::parse_literal(text) {
                Ok(n) => break 'step Ok(Flow::Value(Value::Num(n))),
                Err(reason) => break 'step Err(RuntimeError::new(current.line, reason)),
            },

            Node::String(text) => match render_string(text, state) {
                Ok(s) => break 'step Ok(Flow::Value(Value::Str(Rc::from(s.as_str())))),
                Err(e) => break 'step Err(e),
            },

            Node::Vector(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match eval_node(item, state) {
                        Ok(v) => values.push(v),
                        Err(e) => break 'step Err(e),
                    }
                }
                break 'step Ok(Flow::Value(Value::Vec(Rc::new(values))));
            }

            Node::Builtin(name) => {
                let key = format!("#:{}", name);
                match state.env.get(&key).cloned() {
                    Some(v @ Value::Builtin(_)) => break 'step Ok(Flow::Value(v)),
                    Some(_) => {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            format!("\"{}\" is not a builtin", key),
                        ))
                    }
                    None => {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            format!("builtin \"{}\" is not known", key),
                        ))
                    }
                }
            }

            Node::Path { parent, path } => {
                let mut value = match state.env.get(parent) {
                    Some(v) => v.clone(),
                    None => {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            format!("\"{}\" is not defined", parent),
                        ))
                    }
                };
                for piece in path {
                    value = match value {
                        Value::Routeable(r) => match r.env.get(piece) {
                            Some(v) => v.clone(),
                            None => {
                                break 'step Err(RuntimeError::new(
                                    current.line,
                                    format!("\"{}\" has no member \"{}\"", r.name, piece),
                                ))
                            }
                        },
                        other => {
                            break 'step Err(RuntimeError::new(
                                current.line,
                                format!("a value of type '{}' is not routeable", other.type_tag()),
                            ))
                        }
                    };
                }
                break 'step Ok(Flow::Value(value));
            }

            Node::Ret(expr) => match eval_node(expr, state) {
                Ok(v) => break 'step Ok(Flow::Return(v)),
                Err(e) => break 'step Err(e),
            },

            Node::Expect(guard) => {
                let v = match eval_node(guard, state) {
                    Ok(v) => v,
                    Err(e) => break 'step Err(e),
                };
                if matches!(v, Value::Bool(false)) {
                    break 'step Err(RuntimeError::new(current.line, "expectation failed"));
                }
                break 'step Ok(Flow::Value(Value::Nothing));
            }

            Node::Umbrella { .. } => break 'step Ok(Flow::Value(Value::Nothing)),

            Node::Needs {
                hidden,
                module,
                exposed,
            } => match crate::kernel::needs_load(state, module, *hidden, *exposed, current.line) {
                Ok(()) => break 'step Ok(Flow::Value(Value::Nothing)),
                Err(e) => break 'step Err(e),
            },

            Node::Assign { pattern, value } => {
                let v = match eval_node(value, state) {
                    Ok(v) => v,
                    Err(e) => break 'step Err(e),
                };
                let matched = {
                    let mut eval_cb = |n: &NodeRef, s: &mut State| eval_node(n, s);
                    crate::pattern::match_pattern(pattern, &v, state, &mut eval_cb)
                };
                match matched {
                    Ok(true) => break 'step Ok(Flow::Value(v)),
                    Ok(false) => {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            "the assigned value does not match its pattern",
                        ))
                    }
                    Err(e) => break 'step Err(e),
                }
            }

            Node::Object {
                name,
                secret,
                props,
                block,
            } => {
                let object = RyObject {
                    name: name.clone(),
                    secret: *secret,
                    props: props.clone(),
                    block: Rc::clone(block),
                    captured: state.env.clone(),
                };
                state.env.insert(name.clone(), Value::Object(Rc::new(object)));
                break 'step Ok(Flow::Value(Value::Nothing));
            }

            Node::Instance { callee, args } => {
                let obj = match eval_node(callee, state) {
                    Ok(Value::Object(o)) => o,
                    Ok(other) => {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            format!("a value of type '{}' cannot be instantiated", other.type_tag()),
                        ))
                    }
                    Err(e) => break 'step Err(e),
                };
                if obj.props.len() != args.len() {
                    break 'step Err(RuntimeError::new(
                        current.line,
                        format!(
                            "\"{}\" expects {} propert{}, got {}",
                            obj.name,
                            obj.props.len(),
                            if obj.props.len() == 1 { "y" } else { "ies" },
                            args.len()
                        ),
                    ));
                }
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    match eval_node(a, state) {
                        Ok(v) => arg_values.push(v),
                        Err(e) => break 'step Err(e),
                    }
                }
                let mut capsule_env = obj.captured.clone();
                for (prop, val) in obj.props.iter().zip(arg_values.iter()) {
                    capsule_env.insert(prop.clone(), val.clone());
                }
                let caller_env = std::mem::replace(&mut state.env, capsule_env);
                let mut failure = None;
                for stmt in obj.block.iter() {
                    let n: NodeRef = Rc::new(stmt.clone());
                    if let Err(e) = eval_node(&n, state) {
                        failure = Some(e);
                        break;
                    }
                }
                let instance_env = std::mem::replace(&mut state.env, caller_env);
                if let Some(e) = failure {
                    break 'step Err(e);
                }
                break 'step Ok(Flow::Value(Value::Routeable(Rc::new(Routeable {
                    name: obj.name.clone(),
                    env: instance_env,
                    extractable: arg_values,
                }))));
            }

            Node::Function {
                name,
                quoting,
                naked,
                params,
                body,
            } => {
                let signature = crate::pattern::variation_signature(params);
                if let Some(op_name) = name.strip_prefix('\'') {
                    let arity = params.len();
                    if arity != 1 && arity != 2 {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            format!(
                                "a quoted definition must take 1 (prefix) or 2 (infix) parameters, got {}",
                                arity
                            ),
                        ));
                    }
                    if op_name.contains('_') {
                        let joined = op_name.split('_').collect::<Vec<_>>().join("[ \\t]+");
                        if let Err(reason) = state
                            .reader
                            .switches_mut()
                            .add_token(op_name.to_uppercase(), &joined)
                        {
                            break 'step Err(RuntimeError::new(current.line, reason));
                        }
                    } else if op_name.chars().next().is_some_and(|c| c.is_alphabetic()) {
                        state.reader.switches_mut().add_keyword(op_name);
                    }
                    if arity == 2 {
                        let prec = match state.env.get("*PREC*") {
                            Some(Value::Num(n)) => n.to_f64().unwrap_or(0.0) as i64,
                            _ => {
                                break 'step Err(RuntimeError::new(
                                    current.line,
                                    "*PREC* is not defined; cannot register an infix operator",
                                ))
                            }
                        };
                        state
                            .reader
                            .switches_mut()
                            .add_operator(op_name.to_uppercase(), Assoc::Left, prec);
                    } else {
                        state.reader.switches_mut().add_prefix(op_name.to_uppercase());
                    }
                }

                let function = Rc::new(Function {
                    name: name.clone(),
                    signature,
                    params: params.clone(),
                    body: Rc::clone(body),
                    header: function_header(name, params.len()),
                    captured: RefCell::new(state.env.clone()),
                });

                match state.env.get(name).cloned() {
                    Some(Value::Variations(existing)) => {
                        let (existing_quoting, existing_naked) = {
                            let b = existing.borrow();
                            (b.quoting, b.naked)
                        };
                        if existing_quoting != *quoting {
                            break 'step Err(RuntimeError::new(
                                current.line,
                                format!("\"{}\" is already defined with a different quoting-ness", name),
                            ));
                        }
                        if existing_naked != *naked {
                            break 'step Err(RuntimeError::new(
                                current.line,
                                format!("\"{}\" is already defined with a different naked-ness", name),
                            ));
                        }
                        existing.borrow_mut().add(Rc::clone(&function));
                    }
                    _ => {
                        let mut variations = Variations::new(*quoting, *naked, name.clone());
                        variations.add(Rc::clone(&function));
                        state
                            .env
                            .insert(name.clone(), Value::Variations(Rc::new(RefCell::new(variations))));
                    }
                }

                // Re-capture after installing the binding so recursive self-
                // calls can see it (§9's closure self-reference trick).
                *function.captured.borrow_mut() = state.env.clone();

                break 'step Ok(Flow::Value(Value::Nothing));
            }

            Node::If { cond, body, other } => {
                let cond_val = match eval_node(cond, state) {
                    Ok(v) => v,
                    Err(e) => break 'step Err(e),
                };
                if !matches!(cond_val, Value::Bool(false)) {
                    if body.is_empty() {
                        break 'step Ok(Flow::Value(Value::Bool(true)));
                    }
                    match run_prefix(body, state) {
                        BodyStep::Done(res) => break 'step res,
                        BodyStep::Tail(node) => {
                            current = node;
                            continue 'step;
                        }
                    }
                }
                let should_run_other = other.as_ref().is_some_and(|b| !b.is_empty());
                if !should_run_other {
                    break 'step Ok(Flow::Value(Value::Bool(false)));
                }
                let other_body = other.as_ref().unwrap();
                match run_prefix(other_body, state) {
                    BodyStep::Done(res) => break 'step res,
                    BodyStep::Tail(node) => {
                        current = node;
                        continue 'step;
                    }
                }
            }

            Node::Cases { head, cases } => {
                let head_val = match eval_node(head, state) {
                    Ok(v) => v,
                    Err(e) => break 'step Err(e),
                };
                let mut ranked: Vec<&Spanned<Case>> = cases.iter().collect();
                ranked.sort_by(|a, b| case_rank(b).cmp(&case_rank(a)));
                let mut matched_body: Option<Body> = None;
                for case in ranked {
                    match &case.item {
                        Case::Match { pattern, body } => {
                            let hit = if matches!(pattern.item, Pattern::Discard) {
                                true
                            } else {
                                let mut eval_cb = |n: &NodeRef, s: &mut State| eval_node(n, s);
                                match crate::pattern::match_pattern(pattern, &head_val, state, &mut eval_cb) {
                                    Ok(b) => b,
                                    Err(e) => break 'step Err(e),
                                }
                            };
                            if hit {
                                matched_body = Some(Rc::clone(body));
                                break;
                            }
                        }
                        Case::Value { expr, body } => {
                            let v = match eval_node(expr, state) {
                                Ok(v) => v,
                                Err(e) => break 'step Err(e),
                            };
                            if v.equals(&head_val) {
                                matched_body = Some(Rc::clone(body));
                                break;
                            }
                        }
                    }
                }
                match matched_body {
                    None => break 'step Ok(Flow::Value(Value::Bool(false))),
                    Some(body) => {
                        if body.is_empty() {
                            break 'step Ok(Flow::Value(Value::Bool(true)));
                        }
                        match run_prefix(&body, state) {
                            BodyStep::Done(res) => break 'step res,
                            BodyStep::Tail(node) => {
                                current = node;
                                continue 'step;
                            }
                        }
                    }
                }
            }

            Node::Call { callee, args } => {
                if let Some(name) = bare_path_name(&callee.item) {
                    if name == "quote" {
                        if let Err(e) = expect_unary(args, "quote", current.line) {
                            break 'step Err(e);
                        }
                        let excerpt = Excerpt {
                            node: Rc::clone(&args[0]),
                            filename: Rc::clone(&state.filename),
                            line: current.line,
                            env: state.capsule(),
                        };
                        break 'step Ok(Flow::Value(Value::Excerpt(Rc::new(excerpt))));
                    }
                    if name == "unquote" {
                        if let Err(e) = expect_unary(args, "unquote", current.line) {
                            break 'step Err(e);
                        }
                        let quoted = match eval_node(&args[0], state) {
                            Ok(v) => v,
                            Err(e) => break 'step Err(e),
                        };
                        let excerpt = match quoted {
                            Value::Excerpt(e) => e,
                            other => {
                                break 'step Err(RuntimeError::new(
                                    current.line,
                                    format!("cannot unquote a value of type '{}'", other.type_tag()),
                                ))
                            }
                        };
                        let saved = std::mem::replace(&mut state.env, excerpt.env.clone());
                        let result = eval_node(&excerpt.node, state);
                        state.env = saved;
                        match result {
                            Ok(v) => break 'step Ok(Flow::Value(v)),
                            Err(e) => break 'step Err(e),
                        }
                    }
                    if matches!(name, "num" | "str" | "vec" | "type") {
                        if let Some(Value::Type(_)) = state.env.get(name) {
                            if let Err(e) = expect_unary(args, name, current.line) {
                                break 'step Err(e);
                            }
                            let v = match eval_node(&args[0], state) {
                                Ok(v) => v,
                                Err(e) => break 'step Err(e),
                            };
                            let result = match (name, &v) {
                                ("num", Value::Str(s)) => Number::parse_literal(s)
                                    .map(Value::Num)
                                    .map_err(|r| RuntimeError::new(current.line, r)),
                                ("num", Value::Num(_)) => Ok(v.clone()),
                                ("str", Value::Num(n)) => Ok(Value::Str(Rc::from(n.to_string().as_str()))),
                                ("str", Value::Str(_)) => Ok(v.clone()),
                                ("vec", Value::Str(s)) => Ok(Value::Vec(Rc::new(
                                    s.chars()
                                        .map(|c| Value::Str(Rc::from(c.to_string().as_str())))
                                        .collect(),
                                ))),
                                ("type", _) => Ok(Value::Type(v.type_tag())),
                                (cast, other) => Err(RuntimeError::new(
                                    current.line,
                                    format!("cannot cast a value of type '{}' to '{}'", other.type_tag(), cast),
                                )),
                            };
                            match result {
                                Ok(v) => break 'step Ok(Flow::Value(v)),
                                Err(e) => break 'step Err(e),
                            }
                        }
                    }
                }

                let callee_val = match eval_node(callee, state) {
                    Ok(v) => v,
                    Err(e) => break 'step Err(e),
                };
                match callee_val {
                    Value::Variations(var_rc) => {
                        let (quoting, snapshot) = {
                            let v = var_rc.borrow();
                            (v.quoting, v.variations.clone())
                        };
                        let mut arg_values = Vec::with_capacity(args.len());
                        for a in args {
                            if quoting {
                                arg_values.push(Value::Excerpt(Rc::new(Excerpt {
                                    node: Rc::clone(a),
                                    filename: Rc::clone(&state.filename),
                                    line: current.line,
                                    env: state.capsule(),
                                })));
                            } else {
                                match eval_node(a, state) {
                                    Ok(v) => arg_values.push(v),
                                    Err(e) => break 'step Err(e),
                                }
                            }
                        }

                        let mut chosen: Option<(Rc<Function>, Env)> = None;
                        for f in &snapshot {
                            let direct = f.arity() == arg_values.len();
                            let slurpy = f.is_slurpy() && arg_values.len() != 1;
                            if !direct && !slurpy {
                                continue;
                            }
                            let trial_env = f.captured.borrow().clone();
                            let caller_env = std::mem::replace(&mut state.env, trial_env);
                            let mut ok = true;
                            if direct {
                                for (p, a) in f.params.iter().zip(arg_values.iter()) {
                                    let mut eval_cb = |n: &NodeRef, s: &mut State| eval_node(n, s);
                                    match crate::pattern::match_pattern(p, a, state, &mut eval_cb) {
                                        Ok(true) => {}
                                        Ok(false) => {
                                            ok = false;
                                            break;
                                        }
                                        Err(e) => {
                                            state.env = caller_env;
                                            break 'step Err(e);
                                        }
                                    }
                                }
                            } else {
                                let whole = Value::Vec(Rc::new(arg_values.clone()));
                                let mut eval_cb = |n: &NodeRef, s: &mut State| eval_node(n, s);
                                match crate::pattern::match_pattern(&f.params[0], &whole, state, &mut eval_cb) {
                                    Ok(b) => ok = b,
                                    Err(e) => {
                                        state.env = caller_env;
                                        break 'step Err(e);
                                    }
                                }
                            }
                            if ok {
                                let bound_env = std::mem::replace(&mut state.env, caller_env);
                                chosen = Some((Rc::clone(f), bound_env));
                                break;
                            } else {
                                state.env = caller_env;
                            }
                        }

                        let (function, bound_env) = match chosen {
                            Some(pair) => pair,
                            None => {
                                let dump = snapshot
                                    .iter()
                                    .map(|f| format!("  {}", f.header))
                                    .collect::<Vec<_>>()
                                    .join("\n");
                                break 'step Err(RuntimeError::new(
                                    current.line,
                                    format!(
                                        "no variation of \"{}\" matches {} argument(s):\n{}",
                                        var_rc.borrow().name,
                                        arg_values.len(),
                                        dump
                                    ),
                                ));
                            }
                        };

                        if saved_env.is_none() {
                            saved_env = Some(std::mem::replace(&mut state.env, bound_env));
                        } else {
                            state.env = bound_env;
                        }

                        if function.body.is_empty() {
                            break 'step Ok(Flow::Value(Value::Nothing));
                        }
                        match run_prefix(&function.body, state) {
                            BodyStep::Done(res) => break 'step res,
                            BodyStep::Tail(node) => {
                                current = node;
                                continue 'step;
                            }
                        }
                    }
                    Value::Builtin(b) => {
                        let mut arg_values = Vec::with_capacity(args.len());
                        for a in args {
                            match eval_node(a, state) {
                                Ok(v) => arg_values.push(v),
                                Err(e) => break 'step Err(e),
                            }
                        }
                        match b.call(state, arg_values) {
                            Ok(v) => break 'step Ok(Flow::Value(v)),
                            Err(e) => break 'step Err(e),
                        }
                    }
                    other => {
                        break 'step Err(RuntimeError::new(
                            current.line,
                            format!("a value of type '{}' is not callable", other.type_tag()),
                        ))
                    }
                }
            }
        }
    };

    if let Some(caller_env) = saved_env {
        state.env = caller_env;
    }
    outcome
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::Reader;
    use std::path::PathBuf;

    fn fresh_state() -> State {
        State::new(Rc::from(PathBuf::from("test.ry")), Reader::new())
    }

    fn num_node(text: &str) -> NodeRef {
        Rc::new(Spanned::new(1, Node::Number(text.to_string())))
    }

    #[test]
    fn evaluates_a_number_literal() {
        let mut state = fresh_state();
        let v = eval_node(&num_node("42"), &mut state).unwrap();
        match v {
            Value::Num(n) => assert_eq!(n.to_string(), "42"),
            _ => panic!("expected a number"),
        }
    }

    #[test]
    fn undefined_path_is_a_runtime_error() {
        let mut state = fresh_state();
        let node: NodeRef = Rc::new(Spanned::new(
            1,
            Node::Path {
                parent: "missing".to_string(),
                path: vec![],
            },
        ));
        assert!(eval_node(&node, &mut state).is_err());
    }

    #[test]
    fn assign_binds_into_the_environment() {
        let mut state = fresh_state();
        let pattern = Rc::new(Spanned::new(1, Pattern::Identifier("x".to_string())));
        let node: NodeRef = Rc::new(Spanned::new(
            1,
            Node::Assign {
                pattern,
                value: num_node("7"),
            },
        ));
        eval_node(&node, &mut state).unwrap();
        assert!(matches!(state.env.get("x"), Some(Value::Num(_))));
    }

    #[test]
    fn if_with_false_condition_and_no_else_is_false() {
        let mut state = fresh_state();
        let node: NodeRef = Rc::new(Spanned::new(
            1,
            Node::If {
                cond: Rc::new(Spanned::new(1, Node::Path { parent: "f".to_string(), path: vec![] })),
                body: Rc::from(vec![num_node("1").as_ref().clone()]),
                other: None,
            },
        ));
        state.env.insert("f".to_string(), Value::Bool(false));
        let v = eval_node(&node, &mut state).unwrap();
        assert!(matches!(v, Value::Bool(false)));
    }

    #[test]
    fn capitalize_handles_empty_and_ascii() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("module"), "Module");
    }

    #[test]
    fn string_interpolation_substitutes_bound_names() {
        let mut state = fresh_state();
        state.env.insert("name".to_string(), Value::Str(Rc::from("world")));
        let rendered = render_string("hello $name!", &state).unwrap();
        assert_eq!(rendered, "hello world");
    }

    #[test]
    fn escape_decoding_handles_the_accepted_set() {
        assert_eq!(decode_escapes("a\\nb"), "a\nb");
        assert_eq!(decode_escapes("\\$5"), "$5");
    }
}

//! The host-native surface (§6): a fixed table of `#:name` builtins
//! installed into the kernel environment. Grounded in the teacher's
//! `core::ffi::FFI` — a `HashMap<String, FFIFunction>` registry resolved
//! against a fixed set, no arbitrary dynamic loading — and `core::inject`'s
//! `from_data!`/`into_data!` shape for the `#:to-py`/`#:wraps` pair.

use std::rc::Rc;

use crate::common::Number;
use crate::construct::value::{Builtin, NativeFn, Value};
use crate::eval::error::RuntimeError;
use crate::eval::state::State;
use crate::eval::visit::{eval_flow, eval_node, Flow};

use super::Master;

pub fn install(master: &mut Master) {
    register(master, "precedence", builtin_precedence);
    register(master, "set-precedence", builtin_precedence);
    register(master, "set-guard-precedence", builtin_set_guard_precedence);
    register(master, "getattr", builtin_getattr);
    register(master, "equals?", builtin_equals);
    register(master, "state", builtin_state);
    register(master, "print", builtin_print);
    register(master, "builtin", builtin_builtin);
    register(master, "call", builtin_call);
    register(master, "to-py", builtin_to_py);
    register(master, "wraps", builtin_wraps);
    register(master, "import", builtin_import);
    register(master, "from-operator", builtin_from_operator);
    register(master, "kernel-builtin-call", builtin_kernel_builtin_call);
    register(master, "kernel-glob-call", builtin_kernel_glob_call);
}

fn register(master: &mut Master, name: &str, func: fn(&mut State, Vec<Value>) -> Result<Value, RuntimeError>) {
    let native: NativeFn = Rc::new(func);
    master.define(
        format!("#:{}", name),
        Value::Builtin(Rc::new(Builtin {
            name: name.to_string(),
            func: native,
        })),
    );
}

fn expect_arity(args: &[Value], name: &str, line: usize, lo: usize, hi: usize) -> Result<(), RuntimeError> {
    if args.len() < lo || args.len() > hi {
        Err(RuntimeError::new(
            line,
            format!("`#:{}` expects between {} and {} argument(s), got {}", name, lo, hi, args.len()),
        ))
    } else {
        Ok(())
    }
}

fn expect_num(v: &Value, line: usize) -> Result<Number, RuntimeError> {
    match v {
        Value::Num(n) => Ok(n.clone()),
        other => Err(RuntimeError::new(line, format!("expected a num, got a {}", other.type_tag()))),
    }
}

fn expect_str(v: &Value, line: usize) -> Result<String, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(RuntimeError::new(line, format!("expected a str, got a {}", other.type_tag()))),
    }
}

// `#:precedence(n)` / `#:set-precedence(n)` — both set `*PREC*`. This crate
// doesn't track a separate running Reader precedence counter the way the
// source's legacy two-entry-point split implies; both builtins fold into
// the one binding `Function` definitions consult (see DESIGN.md).
fn builtin_precedence(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "precedence", state.line, 1, 1)?;
    let n = expect_num(&args[0], state.line)?;
    state.env.insert("*PREC*".to_string(), Value::Num(n));
    Ok(Value::Nothing)
}

fn builtin_set_guard_precedence(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "set-guard-precedence", state.line, 1, 1)?;
    let n = expect_num(&args[0], state.line)?;
    let prec = n.to_f64().unwrap_or(0.0) as i64;
    state.reader.switches_mut().guard_precedence = prec;
    Ok(Value::Nothing)
}

fn builtin_getattr(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "getattr", state.line, 2, 3)?;
    let name = expect_str(&args[1], state.line)?;
    match &args[0] {
        Value::Routeable(r) => match r.env.get(&name) {
            Some(v) => Ok(v.clone()),
            None => args
                .get(2)
                .cloned()
                .ok_or_else(|| RuntimeError::new(state.line, format!("no attribute \"{}\"", name))),
        },
        _ => args
            .get(2)
            .cloned()
            .ok_or_else(|| RuntimeError::new(state.line, "value has no attributes")),
    }
}

fn builtin_equals(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "equals?", state.line, 2, 2)?;
    Ok(Value::Bool(args[0].equals(&args[1])))
}

fn builtin_state(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "state", state.line, 0, 0)?;
    Ok(Value::Str(Rc::from(
        format!("<state line={} bindings={}>", state.line, state.env.len()).as_str(),
    )))
}

fn builtin_print(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "print", state.line, 1, 1)?;
    println!("{}", args[0]);
    Ok(Value::Nothing)
}

fn builtin_builtin(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "builtin", state.line, 1, 1)?;
    let name = expect_str(&args[0], state.line)?;
    let key = format!("#:{}", name);
    state
        .env
        .get(&key)
        .cloned()
        .ok_or_else(|| RuntimeError::new(state.line, format!("builtin \"{}\" is not known", key)))
}

fn builtin_call(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "call", state.line, 2, 2)?;
    let callable = args[0].clone();
    let call_args = match &args[1] {
        Value::Vec(v) => v.as_ref().clone(),
        other => return Err(RuntimeError::new(state.line, format!("expected a vec of arguments, got a {}", other.type_tag()))),
    };
    apply_value(state, &callable, call_args)
}

fn builtin_to_py(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "to-py", state.line, 1, 1)?;
    match &args[0] {
        v @ (Value::Bool(_) | Value::Str(_) | Value::Num(_)) => Ok(v.clone()),
        other => Err(RuntimeError::new(
            state.line,
            format!("a value of type '{}' has no host representation", other.type_tag()),
        )),
    }
}

fn builtin_wraps(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "wraps", state.line, 2, 2)?;
    let target = expect_str(&args[0], state.line)?;
    match (target.as_str(), &args[1]) {
        ("num", Value::Str(s)) => Number::parse_literal(s)
            .map(Value::Num)
            .map_err(|r| RuntimeError::new(state.line, r)),
        ("num", Value::Num(_)) => Ok(args[1].clone()),
        ("str", Value::Num(n)) => Ok(Value::Str(Rc::from(n.to_string().as_str()))),
        ("str", Value::Str(_)) => Ok(args[1].clone()),
        ("bool", Value::Bool(_)) => Ok(args[1].clone()),
        (other, v) => Err(RuntimeError::new(
            state.line,
            format!("cannot wrap a '{}' as '{}'", v.type_tag(), other),
        )),
    }
}

// A fixed, small registry: no arbitrary dynamic loading (§6).
fn builtin_import(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "import", state.line, 1, 1)?;
    let name = expect_str(&args[0], state.line)?;
    match name.as_str() {
        "host" => {
            let mut env = crate::construct::Env::new();
            env.insert("version".to_string(), Value::Str(Rc::from(env!("CARGO_PKG_VERSION"))));
            Ok(Value::Routeable(Rc::new(crate::construct::value::Routeable {
                name: "Host".to_string(),
                env,
                extractable: Vec::new(),
            })))
        }
        other => Err(RuntimeError::new(state.line, format!("host module \"{}\" is not registered", other))),
    }
}

fn builtin_from_operator(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "from-operator", state.line, 2, 2)?;
    let sym = expect_str(&args[0], state.line)?;
    let operands = match &args[1] {
        Value::Vec(v) => v.as_ref().clone(),
        other => return Err(RuntimeError::new(state.line, format!("expected a vec of operands, got a {}", other.type_tag()))),
    };
    from_operator(&sym, &operands, state.line)
}

fn builtin_kernel_builtin_call(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "kernel-builtin-call", state.line, 2, 2)?;
    let name = expect_str(&args[0], state.line)?;
    let call_args = match &args[1] {
        Value::Vec(v) => v.as_ref().clone(),
        other => return Err(RuntimeError::new(state.line, format!("expected a vec of arguments, got a {}", other.type_tag()))),
    };
    let key = format!("#:{}", name);
    let callee = state
        .env
        .get(&key)
        .cloned()
        .ok_or_else(|| RuntimeError::new(state.line, format!("builtin \"{}\" is not known", key)))?;
    apply_value(state, &callee, call_args)
}

// A fixed table of host globals, not arbitrary process introspection.
fn builtin_kernel_glob_call(state: &mut State, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_arity(&args, "kernel-glob-call", state.line, 1, 2)?;
    let name = expect_str(&args[0], state.line)?;
    match name.as_str() {
        "argv" => Ok(Value::Vec(Rc::new(Vec::new()))),
        other => Err(RuntimeError::new(state.line, format!("unknown host global \"{}\"", other))),
    }
}

fn from_operator(sym: &str, args: &[Value], line: usize) -> Result<Value, RuntimeError> {
    match (sym, args) {
        ("+", [Value::Num(a), Value::Num(b)]) => Ok(Value::Num(a.clone() + b.clone())),
        ("+", [Value::Str(a), Value::Str(b)]) => Ok(Value::Str(Rc::from(format!("{}{}", a, b).as_str()))),
        ("+", [Value::Vec(a), Value::Vec(b)]) => {
            let mut merged = a.as_ref().clone();
            merged.extend(b.as_ref().iter().cloned());
            Ok(Value::Vec(Rc::new(merged)))
        }
        ("-", [Value::Num(a), Value::Num(b)]) => Ok(Value::Num(a.clone() - b.clone())),
        ("-", [Value::Num(a)]) => Ok(Value::Num(-a.clone())),
        ("*", [Value::Num(a), Value::Num(b)]) => Ok(Value::Num(a.clone() * b.clone())),
        ("/", [Value::Num(a), Value::Num(b)]) => a
            .checked_div(b)
            .map(Value::Num)
            .ok_or_else(|| RuntimeError::new(line, "division by zero")),
        ("%", [Value::Num(a), Value::Num(b)]) => a
            .checked_rem(b)
            .map(Value::Num)
            .ok_or_else(|| RuntimeError::new(line, "division by zero")),
        ("<", [Value::Num(a), Value::Num(b)]) => Ok(Value::Bool(a < b)),
        (">", [Value::Num(a), Value::Num(b)]) => Ok(Value::Bool(a > b)),
        ("<=", [Value::Num(a), Value::Num(b)]) => Ok(Value::Bool(a <= b)),
        (">=", [Value::Num(a), Value::Num(b)]) => Ok(Value::Bool(a >= b)),
        ("==", [a, b]) => Ok(Value::Bool(a.equals(b))),
        ("!=", [a, b]) => Ok(Value::Bool(!a.equals(b))),
        ("!", [Value::Bool(b)]) => Ok(Value::Bool(!b)),
        ("&&", [Value::Bool(a), Value::Bool(b)]) => Ok(Value::Bool(*a && *b)),
        ("||", [Value::Bool(a), Value::Bool(b)]) => Ok(Value::Bool(*a || *b)),
        (op, operands) => Err(RuntimeError::new(
            line,
            format!("operator \"{}\" is not defined for {} operand(s) of this shape", op, operands.len()),
        )),
    }
}

/// Applies an already-evaluated `Value` to already-evaluated arguments --
/// the reflective counterpart to `Node::Call` dispatch used by `#:call`
/// and `#:kernel-builtin-call`. Not written as an explicit loop: these
/// reflective paths aren't the self-tail-recursion hot path a `Cases`/
/// `Call` tail position is, so plain recursion through `eval_flow` for a
/// matched variation's body is an acceptable, much smaller, rendition.
fn apply_value(state: &mut State, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Builtin(b) => b.call(state, args),
        Value::Variations(var_rc) => {
            let (quoting, snapshot) = {
                let v = var_rc.borrow();
                (v.quoting, v.variations.clone())
            };
            if quoting {
                return Err(RuntimeError::new(state.line, "cannot host-call a quoting variation"));
            }
            for f in &snapshot {
                let direct = f.arity() == args.len();
                let slurpy = f.is_slurpy() && args.len() != 1;
                if !direct && !slurpy {
                    continue;
                }
                let trial_env = f.captured.borrow().clone();
                let caller_env = std::mem::replace(&mut state.env, trial_env);
                let mut ok = true;
                if direct {
                    for (p, a) in f.params.iter().zip(args.iter()) {
                        let mut eval_cb = |n: &crate::construct::node::NodeRef, s: &mut State| eval_node(n, s);
                        match crate::pattern::match_pattern(p, a, state, &mut eval_cb) {
                            Ok(true) => {}
                            Ok(false) => {
                                ok = false;
                                break;
                            }
                            Err(e) => {
                                state.env = caller_env;
                                return Err(e);
                            }
                        }
                    }
                } else {
                    let whole = Value::Vec(Rc::new(args.clone()));
                    let mut eval_cb = |n: &crate::construct::node::NodeRef, s: &mut State| eval_node(n, s);
                    match crate::pattern::match_pattern(&f.params[0], &whole, state, &mut eval_cb) {
                        Ok(b) => ok = b,
                        Err(e) => {
                            state.env = caller_env;
                            return Err(e);
                        }
                    }
                }
                if !ok {
                    state.env = caller_env;
                    continue;
                }
                let mut result = Ok(Value::Nothing);
                for stmt in f.body.iter() {
                    let node: crate::construct::node::NodeRef = Rc::new(stmt.clone());
                    match eval_flow(&node, state) {
                        Ok(Flow::Value(v)) => result = Ok(v),
                        Ok(Flow::Return(v)) => {
                            result = Ok(v);
                            break;
                        }
                        Err(e) => {
                            result = Err(e);
                            break;
                        }
                    }
                }
                state.env = caller_env;
                return result;
            }
            Err(RuntimeError::new(
                state.line,
                format!("no variation of \"{}\" matches {} argument(s)", var_rc.borrow().name, args.len()),
            ))
        }
        other => Err(RuntimeError::new(state.line, format!("a value of type '{}' is not callable", other.type_tag()))),
    }
}

//! The Master (§4.4): bootstraps the kernel environment, loads the boot
//! prelude, and drives the reader/evaluator pair over a source string.
//! Also owns module loading (`needs`), since that's the one place the
//! evaluator has to stand up a whole second `Master`.

mod builtins;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::common::Number;
use crate::construct::node::NodeRef;
use crate::construct::value::{Routeable, Value};
use crate::error::RydestaError;
use crate::eval::error::RuntimeError;
use crate::eval::state::State;
use crate::eval::visit::{eval_flow, Flow};
use crate::reader::Reader;

/// The built-in boot prelude: defines the arithmetic/comparison infix
/// operators on top of `#:from-operator`, so ordinary scripts never see
/// the host builtins directly.
const BOOT_SOURCE: &str = include_str!("../../basis/boot.ry");

pub struct Master {
    pub state: State,
}

impl Master {
    pub fn new(filename: Rc<Path>) -> Master {
        Master {
            state: State::new(filename, Reader::new()),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.state.env.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.state.env.get(name)
    }

    /// Installs the constants and native builtins §6 lists: `true`/
    /// `false`, `*PREC*`, `PATH`, `MODULE-CACHE`, one `type` binding per
    /// known tag, and the `#:name` host functions.
    pub fn kernel(&mut self) {
        self.define("true", Value::Bool(true));
        self.define("false", Value::Bool(false));
        self.define("*PREC*", Value::Num(Number::from_i64(0)));
        self.define("PATH", Value::Str(Rc::from(".")));
        self.define("MODULE-CACHE", Value::Vec(Rc::new(Vec::new())));
        for tag in [
            "num",
            "str",
            "bool",
            "vec",
            "nothing",
            "type",
            "variations",
            "object",
            "routeable",
            "excerpt",
            "builtin",
        ] {
            self.define(tag, Value::Type(tag));
        }
        builtins::install(self);
    }

    /// Feeds the boot prelude. Recorded into `MODULE-CACHE` under its own
    /// synthetic path so a later `needs` can't accidentally reload it.
    pub fn load_init(&mut self) -> Result<(), RydestaError> {
        let boot_path = PathBuf::from("<boot>");
        if let Some(Value::Vec(cache)) = self.state.env.get("MODULE-CACHE").cloned() {
            let mut updated = cache.as_ref().clone();
            updated.push(Value::Str(Rc::from(boot_path.to_string_lossy().as_ref())));
            self.state.env.insert("MODULE-CACHE".to_string(), Value::Vec(Rc::new(updated)));
        }
        self.feed(BOOT_SOURCE).map(|_| ())
    }

    /// Replaces the reader's source buffer and drives it to exhaustion,
    /// evaluating every top-level node (and every node a `for`/`division`
    /// group expands to) in order. Returns the last value produced, or
    /// `None` if the source produced nothing.
    pub fn feed(&mut self, source: &str) -> Result<Option<Value>, RydestaError> {
        self.state
            .reader
            .update(source)
            .map_err(|e| RydestaError::reader(&self.state.filename, e))?;
        let mut last = None;
        loop {
            let group = self
                .state
                .reader
                .next("EOF")
                .map_err(|e| RydestaError::reader(&self.state.filename, e))?;
            let Some(nodes) = group else { break };
            for node in nodes {
                let node_ref: NodeRef = Rc::new(node);
                match eval_flow(&node_ref, &mut self.state) {
                    Ok(Flow::Value(v)) => last = Some(v),
                    Ok(Flow::Return(_)) => {
                        return Err(RydestaError::runtime_at(
                            &self.state.filename,
                            self.state.line,
                            "attempted `ret` outside of a function",
                        ))
                    }
                    Err(e) => return Err(RydestaError::runtime(&self.state.filename, e)),
                }
            }
        }
        Ok(last)
    }
}

/// `needs` (§4.3's module-load algorithm). A cache hit is a silent no-op:
/// neither the grammar merge nor the binding happens again, matching the
/// source's own `return None` on a repeat import -- the first `needs`
/// clause for a path is the only one with any effect (§8 scenario 6).
pub fn needs_load(
    state: &mut State,
    module: &str,
    hidden: bool,
    exposed: bool,
    line: usize,
) -> Result<(), RuntimeError> {
    let path_value = match state.env.get("PATH") {
        Some(Value::Str(s)) => s.to_string(),
        _ => ".".to_string(),
    };
    let filename = format!("{}{}.ry", if hidden { "_" } else { "" }, module);

    let mut found: Option<PathBuf> = None;
    for dir in path_value.split(';') {
        let candidate = Path::new(dir).join(&filename);
        if candidate.is_file() {
            found = Some(candidate);
            break;
        }
    }
    let candidate = found.ok_or_else(|| {
        RuntimeError::new(
            line,
            format!("{}module not found: \"{}\"", if hidden { "hidden " } else { "" }, module),
        )
    })?;
    let absolute = candidate
        .canonicalize()
        .map_err(|e| RuntimeError::new(line, format!("could not resolve module \"{}\": {}", module, e)))?;
    let absolute_str = absolute.to_string_lossy().to_string();

    let already_loaded = match state.env.get("MODULE-CACHE") {
        Some(Value::Vec(v)) => v.iter().any(|item| matches!(item, Value::Str(s) if s.as_ref() == absolute_str)),
        _ => false,
    };
    if already_loaded {
        return Ok(());
    }

    let source = std::fs::read_to_string(&absolute)
        .map_err(|e| RuntimeError::new(line, format!("could not read module \"{}\": {}", module, e)))?;

    let mut child = Master::new(Rc::from(absolute.as_path()));
    child.kernel();
    child.load_init().map_err(|e| RuntimeError::new(line, e.to_string()))?;
    child.feed(&source).map_err(|e| RuntimeError::new(line, e.to_string()))?;

    state.reader.merge(&child.state.reader);

    if let Some(Value::Vec(cache)) = state.env.get("MODULE-CACHE").cloned() {
        let mut updated = cache.as_ref().clone();
        updated.push(Value::Str(Rc::from(absolute_str.as_str())));
        state.env.insert("MODULE-CACHE".to_string(), Value::Vec(Rc::new(updated)));
    }

    if exposed {
        for (key, value) in child.state.env.iter() {
            if key == "MODULE-CACHE" || key == "PATH" || key.starts_with('_') {
                continue;
            }
            state.env.entry(key.clone()).or_insert_with(|| value.clone());
        }
    } else {
        let stem = module.rsplit('/').next().unwrap_or(module);
        let name = crate::eval::visit::capitalize(stem);
        state.env.insert(
            name.clone(),
            Value::Routeable(Rc::new(Routeable {
                name,
                env: child.state.env.clone(),
                extractable: Vec::new(),
            })),
        );
    }
    Ok(())
}

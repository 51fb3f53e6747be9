//! The pattern engine (§4.2): signature computation for ranking overloaded
//! variations, and the structural matcher that binds names into an
//! environment.
//!
//! Matching needs to evaluate sub-expressions (`P_Compare`'s expression,
//! `P_Guard`'s guard) but must not depend on the evaluator module directly
//! -- that dependency runs the other way, since `crate::eval` calls into
//! this module for every function call, `If`/`Cases`, and `Assign`. The
//! caller instead hands in an `Evaluator` callback.

use std::rc::Rc;

use crate::construct::node::NodeRef;
use crate::construct::pattern::{Pattern, PatternRef};
use crate::construct::value::Value;
use crate::eval::error::RuntimeError;
use crate::eval::state::State;

/// Disjoint-band separator between pattern kinds (§4.2, "Resolved open
/// question — signature scheme"). Large enough that no realistic nesting
/// depth's `children_scalar` crosses into a neighboring band.
const BAND: i128 = 1i128 << 80;

fn kind_rank(pattern: &Pattern) -> i128 {
    match pattern {
        Pattern::Compare(_) => 6,
        Pattern::Guard(_, _) => 5,
        Pattern::Extract(_, _) => 4,
        Pattern::Unpack(_) => 3,
        Pattern::Identifier(_) | Pattern::Discard => 2,
        Pattern::NamedMulti(_) | Pattern::NamedMany(_) => 1,
        Pattern::DiscardMulti | Pattern::DiscardMany => 0,
    }
}

/// Within-kind tie-breaker for the two recursive kinds; zero for leaves.
///
/// Deliberately recurses on this *local* weight rather than on each
/// child's full `signature()` — a child's signature already carries its
/// own `kind_rank * BAND` term, and summing those back up would blow the
/// scalar past neighboring bands within a handful of nesting levels,
/// defeating the whole point of banding. Accumulating only the
/// structural weight keeps the scalar many orders of magnitude below
/// `BAND` for any nesting depth a real program would write.
fn children_scalar(pattern: &Pattern) -> i128 {
    match pattern {
        Pattern::Extract(_, fields) => {
            let sum: i128 = fields.iter().map(|f| 1 + children_scalar(&f.item)).sum();
            sum * (fields.len() as i128 + 1)
        }
        Pattern::Unpack(members) => {
            let sum: i128 = members.iter().map(|m| 1 + children_scalar(&m.item)).sum();
            sum * (members.len() as i128 + 1)
        }
        _ => 0,
    }
}

/// A single pattern's contribution to a variation's aggregate signature.
pub fn signature(pattern: &Pattern) -> i128 {
    kind_rank(pattern) * BAND + children_scalar(pattern)
}

/// A variation's aggregate signature: the sum of its parameter signatures
/// (§4.2, §9 — preserved from the source's own "sum of parameters" rule).
pub fn variation_signature(params: &[PatternRef]) -> i128 {
    params.iter().map(|p| signature(&p.item)).sum()
}

/// Called back into by the matcher to evaluate a sub-expression node
/// against the current (possibly partially-bound) state.
pub type Evaluator<'a> = dyn FnMut(&NodeRef, &mut State) -> Result<Value, RuntimeError> + 'a;

/// Attempts to match `pattern` against `value`, binding names into
/// `state.env` as it succeeds. A `false` result is an ordinary failed
/// match (the caller tries the next variation/case); an `Err` is a
/// structural violation of the language (§4.2, §7: "referenced object
/// name undefined, illegal arrangement of variable-length captures").
pub fn match_pattern(
    pattern: &PatternRef,
    value: &Value,
    state: &mut State,
    eval: &mut Evaluator,
) -> Result<bool, RuntimeError> {
    match &pattern.item {
        Pattern::Identifier(name) => {
            state.env.insert(name.clone(), value.clone());
            Ok(true)
        }
        Pattern::Discard => Ok(true),
        Pattern::Compare(node) => {
            let expected = eval(node, state)?;
            Ok(value.equals(&expected))
        }
        Pattern::Guard(name, expr) => {
            state.env.insert(name.clone(), value.clone());
            let result = eval(expr, state)?;
            Ok(matches!(result, Value::Bool(true)))
        }
        Pattern::Extract(obj_name, fields) => {
            match_extract(obj_name, fields, value, state, eval, pattern.line)
        }
        Pattern::Unpack(members) => match_unpack(members, value, state, eval),
        Pattern::NamedMany(_) | Pattern::NamedMulti(_) | Pattern::DiscardMany | Pattern::DiscardMulti => {
            Err(RuntimeError::new(
                pattern.line,
                "variadic capture pattern used outside of an unpack",
            ))
        }
    }
}

fn match_extract(
    obj_name: &str,
    fields: &[PatternRef],
    value: &Value,
    state: &mut State,
    eval: &mut Evaluator,
    line: usize,
) -> Result<bool, RuntimeError> {
    let looked_up = state.env.get(obj_name).cloned().ok_or_else(|| {
        RuntimeError::new(line, format!("'{}' is undefined in an extract pattern", obj_name))
    })?;
    match looked_up {
        Value::Object(obj) => {
            let routeable = match value {
                Value::Routeable(r) if r.name == obj.name => Rc::clone(r),
                _ => return Ok(false),
            };
            if routeable.extractable.len() != fields.len() {
                return Ok(false);
            }
            for (field, extracted) in fields.iter().zip(routeable.extractable.iter()) {
                if !match_pattern(field, extracted, state, eval)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        // `(num n)`, `(str s)`, etc: the looked-up name is a bare type
        // tag rather than an object or object instance, so the fields
        // that follow bind against the value itself rather than being
        // checked against an extractable list -- there is nothing to
        // extract from a `num`, only a type to confirm.
        Value::Type(tag) => {
            if value.type_tag() != tag {
                return Ok(false);
            }
            match fields {
                [] => Ok(true),
                [single] => match_pattern(single, value, state, eval),
                _ => Ok(false),
            }
        }
        other => Ok(value.equals(&other)),
    }
}

fn match_unpack(
    members: &[PatternRef],
    value: &Value,
    state: &mut State,
    eval: &mut Evaluator,
) -> Result<bool, RuntimeError> {
    let (elements, is_string): (Vec<Value>, bool) = match value {
        Value::Vec(v) => (v.as_ref().clone(), false),
        Value::Str(s) => (
            s.chars()
                .map(|c| Value::Str(Rc::from(c.to_string().as_str())))
                .collect(),
            true,
        ),
        _ => return Ok(false),
    };

    let total = elements.len();
    let variadic_count = members.iter().filter(|m| m.item.is_variadic()).count();
    if variadic_count > 2 && variadic_count * 3 > members.len() * 2 {
        return Err(RuntimeError::new(
            members.first().map(|m| m.line).unwrap_or(0),
            "several multi-item captures must be delimited",
        ));
    }
    if variadic_count == 0 && members.len() != total {
        return Ok(false);
    }

    let mut pos = 0usize;
    let mut i = 0usize;
    while i < members.len() {
        let member = &members[i];
        if member.item.is_variadic() {
            let delimiter = members.get(i + 1).filter(|d| d.item.is_delimiter());
            if let Some(delimiter) = delimiter {
                let mut found = None;
                for j in pos..total {
                    let snapshot = state.env.clone();
                    let hit = match_pattern(delimiter, &elements[j], state, eval)?;
                    state.env = snapshot;
                    if hit {
                        found = Some(j);
                        break;
                    }
                }
                let j = match found {
                    Some(j) => j,
                    None => return Ok(false),
                };
                if member.item.requires_at_least_one() && j == pos {
                    return Ok(false);
                }
                bind_capture(&member.item, &elements[pos..j], is_string, state);
                if !match_pattern(delimiter, &elements[j], state, eval)? {
                    return Ok(false);
                }
                pos = j + 1;
                i += 2;
            } else {
                let remaining_members = members.len() - (i + 1);
                if total < pos + remaining_members {
                    return Ok(false);
                }
                let count = total - pos - remaining_members;
                if member.item.requires_at_least_one() && count == 0 {
                    return Ok(false);
                }
                bind_capture(&member.item, &elements[pos..pos + count], is_string, state);
                pos += count;
                i += 1;
            }
        } else {
            if pos >= total {
                return Ok(false);
            }
            if !match_pattern(member, &elements[pos], state, eval)? {
                return Ok(false);
            }
            pos += 1;
            i += 1;
        }
    }
    Ok(pos == total)
}

fn bind_capture(pattern: &Pattern, slice: &[Value], is_string: bool, state: &mut State) {
    let name = match pattern {
        Pattern::NamedMany(name) | Pattern::NamedMulti(name) => Some(name.clone()),
        Pattern::DiscardMany | Pattern::DiscardMulti => None,
        _ => unreachable!("bind_capture called on a non-variadic pattern"),
    };
    let Some(name) = name else { return };
    let captured = if is_string {
        let joined: String = slice
            .iter()
            .map(|v| match v {
                Value::Str(s) => s.as_ref(),
                _ => "",
            })
            .collect();
        Value::Str(Rc::from(joined.as_str()))
    } else {
        Value::Vec(Rc::new(slice.to_vec()))
    };
    state.env.insert(name, captured);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::construct::node::Node;
    use crate::construct::Spanned;

    fn ident(name: &str) -> PatternRef {
        Rc::new(Spanned::new(1, Pattern::Identifier(name.to_string())))
    }

    fn discard() -> PatternRef {
        Rc::new(Spanned::new(1, Pattern::Discard))
    }

    #[test]
    fn signature_ranks_compare_above_identifier() {
        let compare = Pattern::Compare(Rc::new(Spanned::new(1, Node::Number("1".to_string()))));
        assert!(signature(&compare) > signature(&Pattern::Identifier("x".to_string())));
    }

    #[test]
    fn signature_ranks_guard_above_extract() {
        let guard = Pattern::Guard(
            "x".to_string(),
            Rc::new(Spanned::new(1, Node::Number("1".to_string()))),
        );
        let extract = Pattern::Extract("Obj".to_string(), vec![ident("a")]);
        assert!(signature(&guard) > signature(&extract));
    }

    #[test]
    fn variation_signature_sums_parameters() {
        let params = vec![ident("a"), discard()];
        assert_eq!(
            variation_signature(&params),
            signature(&Pattern::Identifier("a".to_string())) + signature(&Pattern::Discard)
        );
    }

    #[test]
    fn deeply_nested_extract_stays_in_its_band() {
        let mut inner = discard();
        for _ in 0..5 {
            inner = Rc::new(Spanned::new(1, Pattern::Extract("Obj".to_string(), vec![inner])));
        }
        let identifier_signature = signature(&Pattern::Identifier("x".to_string()));
        assert!(signature(&inner.item) > identifier_signature);
        let compare = Pattern::Compare(Rc::new(Spanned::new(1, Node::Number("1".to_string()))));
        assert!(signature(&compare) > signature(&inner.item));
    }

    fn nested_extract(depth: u32, width: usize) -> Pattern {
        let mut inner = discard();
        for _ in 0..depth {
            let fields = std::iter::repeat_with(|| inner.clone()).take(width.max(1)).collect();
            inner = Rc::new(Spanned::new(1, Pattern::Extract("Obj".to_string(), fields)));
        }
        match Rc::try_unwrap(inner) {
            Ok(spanned) => spanned.item,
            Err(rc) => rc.item.clone(),
        }
    }

    proptest::proptest! {
        /// However deeply an `Extract` pattern nests, its signature never
        /// crosses into a neighboring kind's band -- the whole point of
        /// banding the encoding rather than summing bare powers of two.
        #[test]
        fn extract_signature_stays_in_its_band(depth in 0u32..40, width in 1usize..6) {
            let pattern = nested_extract(depth, width);
            let sig = signature(&pattern);
            let lo = kind_rank(&Pattern::Extract(String::new(), vec![])) * BAND;
            let hi = lo + BAND;
            proptest::prop_assert!(sig >= lo);
            proptest::prop_assert!(sig < hi);
        }

        /// Every `Extract`/`Unpack` signature, however deeply nested, still
        /// ranks above every `Identifier`/`Discard` signature -- the
        /// cross-kind ordering §8 scenario 1 depends on.
        #[test]
        fn extract_always_outranks_identifier(depth in 0u32..40, width in 1usize..6) {
            let pattern = nested_extract(depth, width);
            proptest::prop_assert!(signature(&pattern) > signature(&Pattern::Identifier("x".to_string())));
        }
    }
}

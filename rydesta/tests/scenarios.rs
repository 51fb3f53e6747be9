///! End-to-end snippet tests matching the six concrete scenarios the
///! evaluator, pattern matcher, and reader switch tables jointly have to
///! get right.

use std::path::Path;
use std::rc::Rc;

use rydesta::construct::Value;
use rydesta::Master;

fn booted() -> Master {
    let mut master = Master::new(Rc::from(Path::new("<test>")));
    master.kernel();
    master.load_init().expect("boot prelude must load");
    master
}

fn feed_str(master: &mut Master, source: &str) -> String {
    match master.feed(source) {
        Ok(Some(v)) => v.to_string(),
        Ok(None) => String::new(),
        Err(e) => panic!("unexpected error: {}", e),
    }
}

#[test]
fn overload_dispatch_by_pattern_specificity() {
    let mut master = booted();
    feed_str(
        &mut master,
        r#"
        f 0 -> "zero"
        f (num n) -> "num"
        f _ -> "other"
        "#,
    );
    assert_eq!(feed_str(&mut master, "f 0"), "zero");
    assert_eq!(feed_str(&mut master, "f 5"), "num");
    assert_eq!(feed_str(&mut master, "f \"hi\""), "other");
}

#[test]
fn operator_injection_mid_file() {
    let mut master = booted();
    // `@` does not exist as an operator until this line runs; the reader
    // only accepts it as an infix symbol on the next line because the
    // evaluator registers it into the switch tables as it evaluates this
    // `Function` node.
    feed_str(&mut master, "'@ a b -> (a * 10) + b");
    assert_eq!(feed_str(&mut master, "3 @ 4"), "34");
}

#[test]
fn string_unpack_with_delimiter() {
    let mut master = booted();
    feed_str(&mut master, r#"[head+ "," tail*] = "abc,defg""#);
    assert_eq!(feed_str(&mut master, "head"), "abc");
    assert_eq!(feed_str(&mut master, "tail"), "defg");
}

#[test]
fn self_tail_recursion_does_not_overflow() {
    let mut master = booted();
    feed_str(
        &mut master,
        r#"
        loop 0 -> "done"
        loop (num n) -> loop (n - 1)
        "#,
    );
    assert_eq!(feed_str(&mut master, "loop 100000"), "done");
}

#[test]
fn object_extraction() {
    let mut master = booted();
    feed_str(&mut master, "obj Pair a b");
    feed_str(&mut master, "p = new Pair 1 2");
    let result = feed_str(&mut master, "case p { (Pair x y) -> x + y }");
    assert_eq!(result, "3");
}

#[test]
fn empty_function_body_returns_nothing() {
    let mut master = booted();
    feed_str(&mut master, "empty -> {}");
    let result = master.feed("empty").unwrap();
    assert!(matches!(result, Some(Value::Nothing)));
}

#[test]
fn case_with_no_matching_arm_returns_false() {
    let mut master = booted();
    let result = feed_str(&mut master, r#"case 5 { 1 -> "one" }"#);
    assert_eq!(result, "false");
}

#[test]
fn if_with_no_else_and_false_condition_returns_false() {
    let mut master = booted();
    assert_eq!(feed_str(&mut master, "if false { \"yes\" }"), "false");
}

#[test]
fn module_idempotence() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("m.ry"), "shared = 1\n").expect("write module");

    let mut master = booted();
    master.define("PATH", Value::Str(Rc::from(dir.path().to_str().unwrap())));

    let cache_len = |m: &Master| match m.get("MODULE-CACHE") {
        Some(Value::Vec(v)) => v.len(),
        _ => panic!("MODULE-CACHE missing"),
    };
    let before = cache_len(&master);

    feed_str(&mut master, "needs \"m\"");
    feed_str(&mut master, "needs \"m\" exposed");

    assert_eq!(cache_len(&master), before + 1);
}

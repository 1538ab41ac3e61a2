//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use gplist::mutate::{add, get, remove, update};
use gplist::value::{Dict, Value};
use gplist::{Error, PathSegment};

fn path(segments: &[&str]) -> Vec<PathSegment> {
    segments.iter().map(|s| PathSegment::from(*s)).collect()
}

fn starting_document() -> Value {
    let mut inner = Dict::new();
    inner.insert("a".to_owned(), Value::Int(1));
    let mut outer = Dict::new();
    outer.insert("foo".to_owned(), Value::Dict(inner));
    Value::Dict(outer)
}

#[test]
fn add_existing_nested_value_fails_with_path_exists() {
    let mut root = starting_document();
    let p = path(&["foo", "a"]);
    let err = add(&mut root, &p, Value::Int(1)).unwrap_err();
    assert!(matches!(err, Error::PathExists(_)));
}

#[test]
fn update_then_remove_matches_spec_scenario() {
    let mut root = starting_document();

    update(&mut root, &path(&["foo", "a"]), Value::Int(2)).unwrap();
    assert_eq!(get(&root, &path(&["foo", "a"])).unwrap(), &Value::Int(2));

    remove(&mut root, &path(&["foo", "a"])).unwrap();
    assert!(root.as_dict().unwrap().get("foo").unwrap().as_dict().unwrap().is_empty());
}

#[test]
fn adding_through_a_missing_intermediate_reports_unresolved_tail() {
    let mut root = starting_document();
    let err = add(&mut root, &path(&["foo", "b", "c"]), Value::Int(1)).unwrap_err();
    match err {
        Error::PathNotFound { tail, prefix } => {
            assert_eq!(tail, "b/c");
            assert_eq!(prefix, "foo");
        }
        other => panic!("expected PathNotFound, got {:?}", other),
    }
}

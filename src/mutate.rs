//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Path-addressed `add`/`update`/`remove`/`get` over a [`Value`] tree.
//!
//! A path is a sequence of [`PathSegment`]s: a `Key` descends into a `Dict`,
//! an `Index` descends into an `Array`. Navigation to the parent of the
//! final segment fails closed, reporting exactly which suffix of the path
//! could not be resolved and against what prefix it was attempted.

use crate::error::{Error, Result};
use crate::value::Value;

/// One step of a mutation path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn as_text(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_owned())
    }
}
impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}
impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

fn join_path(path: &[PathSegment]) -> String {
    path.iter().map(PathSegment::as_text).collect::<Vec<_>>().join("/")
}

/// Walks every segment but the last, returning a mutable reference to the
/// parent container and the final, unresolved segment.
fn navigate_parent<'a>(root: &'a mut Value, path: &'a [PathSegment]) -> Result<(&'a mut Value, &'a PathSegment)> {
    if path.is_empty() {
        return Err(Error::EmptyPath);
    }
    let (parents, last) = path.split_at(path.len() - 1);

    let mut current = root;
    for (count, seg) in parents.iter().enumerate() {
        let stepped = match seg {
            PathSegment::Key(k) => match current {
                Value::Dict(d) => d.get_mut(k),
                _ => None,
            },
            PathSegment::Index(i) => match current {
                Value::Array(a) => a.get_mut(*i),
                _ => None,
            },
        };
        current = match stepped {
            Some(value) => value,
            None => {
                return Err(Error::PathNotFound {
                    tail: join_path(&path[count..]),
                    prefix: join_path(&path[..count]),
                });
            }
        };
    }

    Ok((current, &last[0]))
}

/// Reads the value at `path`, failing the same way navigation to a parent
/// would if any segment along the way cannot be resolved.
pub fn get<'a>(root: &'a Value, path: &[PathSegment]) -> Result<&'a Value> {
    if path.is_empty() {
        return Err(Error::EmptyPath);
    }
    let mut current = root;
    for (count, seg) in path.iter().enumerate() {
        let stepped = match seg {
            PathSegment::Key(k) => match current {
                Value::Dict(d) => d.get(k),
                _ => None,
            },
            PathSegment::Index(i) => match current {
                Value::Array(a) => a.get(*i),
                _ => None,
            },
        };
        current = match stepped {
            Some(value) => value,
            None => {
                return Err(Error::PathNotFound {
                    tail: join_path(&path[count..]),
                    prefix: join_path(&path[..count]),
                });
            }
        };
    }
    Ok(current)
}

/// Inserts `value` at `path`. Fails if the parent cannot be navigated to, or
/// if the final key/index is already occupied.
pub fn add(root: &mut Value, path: &[PathSegment], value: Value) -> Result<()> {
    let (parent, last) = navigate_parent(root, path)?;
    let prefix = || join_path(&path[..path.len() - 1]);
    match last {
        PathSegment::Key(k) => match parent {
            Value::Dict(d) => {
                if d.contains_key(k) {
                    return Err(Error::PathExists(join_path(path)));
                }
                d.insert(k.clone(), value);
                Ok(())
            }
            _ => Err(Error::PathNotFound { tail: k.clone(), prefix: prefix() }),
        },
        PathSegment::Index(i) => match parent {
            Value::Array(a) => {
                if *i < a.len() {
                    return Err(Error::PathExists(join_path(path)));
                }
                if *i > a.len() {
                    return Err(Error::PathNotFound { tail: i.to_string(), prefix: prefix() });
                }
                a.push(value);
                Ok(())
            }
            _ => Err(Error::PathNotFound { tail: i.to_string(), prefix: prefix() }),
        },
    }
}

/// Replaces the value at `path`. Fails if the final key/index does not
/// already exist.
pub fn update(root: &mut Value, path: &[PathSegment], value: Value) -> Result<()> {
    let (parent, last) = navigate_parent(root, path)?;
    let prefix = || join_path(&path[..path.len() - 1]);
    match last {
        PathSegment::Key(k) => match parent {
            Value::Dict(d) => {
                if !d.contains_key(k) {
                    return Err(Error::PathNotFound { tail: k.clone(), prefix: prefix() });
                }
                d.insert(k.clone(), value);
                Ok(())
            }
            _ => Err(Error::PathNotFound { tail: k.clone(), prefix: prefix() }),
        },
        PathSegment::Index(i) => match parent {
            Value::Array(a) => {
                if *i >= a.len() {
                    return Err(Error::PathNotFound { tail: i.to_string(), prefix: prefix() });
                }
                a[*i] = value;
                Ok(())
            }
            _ => Err(Error::PathNotFound { tail: i.to_string(), prefix: prefix() }),
        },
    }
}

/// Removes and returns the value at `path`. Fails if the final key/index
/// does not exist.
pub fn remove(root: &mut Value, path: &[PathSegment]) -> Result<Value> {
    let (parent, last) = navigate_parent(root, path)?;
    let prefix = || join_path(&path[..path.len() - 1]);
    match last {
        PathSegment::Key(k) => match parent {
            Value::Dict(d) => d
                .shift_remove(k)
                .ok_or_else(|| Error::PathNotFound { tail: k.clone(), prefix: prefix() }),
            _ => Err(Error::PathNotFound { tail: k.clone(), prefix: prefix() }),
        },
        PathSegment::Index(i) => match parent {
            Value::Array(a) => {
                if *i >= a.len() {
                    return Err(Error::PathNotFound { tail: i.to_string(), prefix: prefix() });
                }
                Ok(a.remove(*i))
            }
            _ => Err(Error::PathNotFound { tail: i.to_string(), prefix: prefix() }),
        },
    }
}

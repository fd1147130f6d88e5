//! Total lookups into decoded JSON documents.
//!
//! A lookup path is a slice of [`Selector`]s. Applying it never fails: any
//! missing node, out-of-range index or wrongly shaped intermediate value turns
//! the whole lookup into `None`.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    /// Field of an object.
    Key(&'a str),
    /// Element of an array.
    Index(usize),
    /// First array element that is an object owning at least one of these keys.
    Member(&'a [&'a str]),
}

impl<'a> From<&'a str> for Selector<'a> {
    fn from(key: &'a str) -> Self {
        Selector::Key(key)
    }
}

impl From<usize> for Selector<'_> {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

/// One lookup in a layout table: the first alternative that resolves wins.
pub type Layout<'a> = &'a [&'a [Selector<'a>]];

impl Selector<'_> {
    fn apply<'v>(&self, node: &'v Value) -> Option<&'v Value> {
        match (self, node) {
            (Selector::Key(key), Value::Object(map)) => map.get(*key),
            (Selector::Index(index), Value::Array(items)) => items.get(*index),
            (Selector::Member(keys), Value::Array(items)) => find_by_member(items, keys),
            _ => None,
        }
    }
}

/// Returns the first element that is an object containing one of `keys`.
pub fn find_by_member<'v>(items: &'v [Value], keys: &[&str]) -> Option<&'v Value> {
    items.iter().find(|item| {
        item.as_object()
            .is_some_and(|map| keys.iter().any(|key| map.contains_key(*key)))
    })
}

/// Follows `path` from `doc`.
pub fn get<'v>(doc: &'v Value, path: &[Selector<'_>]) -> Option<&'v Value> {
    path.iter().try_fold(doc, |node, selector| selector.apply(node))
}

/// Tries each alternative path in order and returns the first node found.
pub fn first_of<'v>(doc: &'v Value, layout: Layout<'_>) -> Option<&'v Value> {
    layout.iter().find_map(|path| get(doc, path))
}

pub fn get_str<'v>(doc: &'v Value, path: &[Selector<'_>]) -> Option<&'v str> {
    get(doc, path).and_then(Value::as_str)
}

/// Numbers arrive either as JSON numbers or as decimal strings.
pub fn get_u64(doc: &Value, path: &[Selector<'_>]) -> Option<u64> {
    match get(doc, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

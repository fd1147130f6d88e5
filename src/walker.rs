//! Depth-first walk over a whole document, dispatching on renderer nodes.
//!
//! Upstream documents carry no explicit type tags. A node is a renderer when
//! the key it is stored under matches [`RENDERER_KEYS`]. While walking, the
//! nesting of continuation structures is checked against [`NESTING_RULES`];
//! violations are reported as [`Drift`] and never stop the walk.

use std::fmt::{self, Write as _};

use serde_json::{Map, Value};

use crate::text::text_value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Matches one path segment.
#[derive(Debug, Clone, Copy)]
pub enum Pattern<'a> {
    Key(&'a str),
    Suffix(&'a str),
    Index(usize),
    AnyIndex,
}

impl Pattern<'_> {
    pub fn matches(&self, segment: &Segment) -> bool {
        match (self, segment) {
            (_, Segment::Key(key)) => self.matches_key(key),
            (Pattern::Index(want), Segment::Index(index)) => index == want,
            (Pattern::AnyIndex, Segment::Index(_)) => true,
            _ => false,
        }
    }

    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            Pattern::Key(want) => key == *want,
            Pattern::Suffix(suffix) => key.ends_with(suffix),
            Pattern::Index(_) | Pattern::AnyIndex => false,
        }
    }
}

/// True when the last segments of `path` match `end`, pairwise.
pub fn path_ends_with(path: &[Segment], end: &[Pattern<'_>]) -> bool {
    end.len() <= path.len()
        && path[path.len() - end.len()..]
            .iter()
            .zip(end)
            .all(|(segment, pattern)| pattern.matches(segment))
}

/// Keys under which a renderer node is stored.
pub const RENDERER_KEYS: &[Pattern<'static>] = &[Pattern::Suffix("Renderer"), Pattern::Suffix("ViewModel")];

pub fn is_renderer_key(key: &str) -> bool {
    RENDERER_KEYS.iter().any(|pattern| pattern.matches_key(key))
}

fn is_renderer_path(path: &[Segment]) -> bool {
    match path.last() {
        Some(Segment::Key(key)) => is_renderer_key(key),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    RendererNotObject,
    ContinuationsWithoutRenderer,
    ContinuationDataWithoutContinuations,
    ContinuationWithoutContinuationData,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Drift::RendererNotObject => "renderer without object",
            Drift::ContinuationsWithoutRenderer => "continuations without renderer",
            Drift::ContinuationDataWithoutContinuations => "continuation data without continuations",
            Drift::ContinuationWithoutContinuationData => "continuation without continuation data",
        })
    }
}

/// A key that may only appear at the end of one of `allowed` ancestor chains.
pub struct NestingRule {
    pub key: &'static str,
    pub allowed: &'static [&'static [Pattern<'static>]],
    pub drift: Drift,
}

pub const NESTING_RULES: &[NestingRule] = &[
    NestingRule {
        key: "continuations",
        allowed: &[&[Pattern::Suffix("Renderer"), Pattern::Key("continuations")]],
        drift: Drift::ContinuationsWithoutRenderer,
    },
    NestingRule {
        key: "nextContinuationData",
        allowed: &[&[Pattern::Key("continuations"), Pattern::AnyIndex, Pattern::Key("nextContinuationData")]],
        drift: Drift::ContinuationDataWithoutContinuations,
    },
    NestingRule {
        key: "continuation",
        allowed: &[
            &[Pattern::Key("nextContinuationData"), Pattern::Key("continuation")],
            &[Pattern::Key("reloadContinuationData"), Pattern::Key("continuation")],
            &[Pattern::Key("liveChatReplayContinuationData"), Pattern::Key("continuation")],
            &[Pattern::Key("timedContinuationData"), Pattern::Key("continuation")],
            &[Pattern::Key("invalidationContinuationData"), Pattern::Key("continuation")],
        ],
        drift: Drift::ContinuationWithoutContinuationData,
    },
];

/// Checks the node at `path` against the nesting rules.
pub fn check_nesting(path: &[Segment]) -> Option<Drift> {
    let Some(Segment::Key(key)) = path.last() else {
        return None;
    };
    let rule = NESTING_RULES.iter().find(|rule| rule.key == key.as_str())?;
    if rule.allowed.iter().any(|chain| path_ends_with(path, chain)) {
        None
    } else {
        Some(rule.drift)
    }
}

pub trait Visitor {
    fn renderer(&mut self, path: &[Segment], node: &Map<String, Value>);

    fn drift(&mut self, drift: Drift, path: &[Segment]) {
        log::warn!("{drift}: {}", display_path(path));
    }
}

/// Walks `doc` depth first, fields in document order.
pub fn walk(doc: &Value, visitor: &mut impl Visitor) {
    let mut path = Vec::new();
    walk_node(doc, &mut path, visitor);
}

fn walk_node(node: &Value, path: &mut Vec<Segment>, visitor: &mut impl Visitor) {
    if is_renderer_path(path) {
        match node {
            Value::Object(map) => visitor.renderer(path, map),
            _ => visitor.drift(Drift::RendererNotObject, path),
        }
    } else if let Some(drift) = check_nesting(path) {
        visitor.drift(drift, path);
    }

    match node {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(Segment::Index(index));
                walk_node(item, path, visitor);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                path.push(Segment::Key(key.clone()));
                walk_node(item, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Innermost segment first.
pub fn display_path(path: &[Segment]) -> String {
    path.iter()
        .rev()
        .map(Segment::to_string)
        .collect::<Vec<_>>()
        .join(" < ")
}

/// Renders every renderer with its scalar and text fields, indented by depth.
#[derive(Debug, Default)]
pub struct RendererDump {
    out: String,
}

impl RendererDump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl Visitor for RendererDump {
    fn renderer(&mut self, path: &[Segment], node: &Map<String, Value>) {
        let indent = "  ".repeat(path.len());
        let _ = writeln!(self.out, "{indent} ==== {}", display_path(path));
        for (key, value) in node {
            let shown = match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Object(_) => text_value(value),
                Value::Array(_) | Value::Null => None,
            };
            if let Some(shown) = shown {
                let _ = writeln!(self.out, "{indent} |    {key:<20} : {shown}");
            }
        }
    }
}

/// Text dump of every renderer in `doc`; drift goes to the log.
pub fn dump_renderers(doc: &Value) -> String {
    let mut dump = RendererDump::new();
    walk(doc, &mut dump);
    dump.into_string()
}

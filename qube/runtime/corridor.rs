use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Adjacency table keyed by canonical corridor strings.
pub type CorridorGraph = IndexMap<String, Vec<String>>;

const UNKNOWN: &str = "UNKNOWN";

/// Structured corridor address.
///
/// Only produced by [`CorridorNavigator::parse`]; unparsable input maps to
/// [`Corridor::unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Corridor {
    /// District number.
    pub district: u64,
    /// Chamber segment.
    pub chamber: String,
    /// Node segment.
    pub node: String,
}

impl Corridor {
    /// Sentinel for unparsable addresses.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            district: 0,
            chamber: UNKNOWN.into(),
            node: UNKNOWN.into(),
        }
    }

    /// Whether this is the sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.district == 0 && self.chamber == UNKNOWN && self.node == UNKNOWN
    }

    /// Canonical `DISTRICT_<d>.<chamber>.<node>` key.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Corridor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DISTRICT_{}.{}.{}", self.district, self.chamber, self.node)
    }
}

/// Parses corridor strings and answers reachability from a fixed graph.
#[derive(Debug, Clone, Default)]
pub struct CorridorNavigator {
    graph: Arc<CorridorGraph>,
}

impl CorridorNavigator {
    /// Creates a navigator over an immutable graph snapshot.
    #[must_use]
    pub fn new(graph: Arc<CorridorGraph>) -> Self {
        Self { graph }
    }

    /// Parses `<PREFIX>_<district>.<chamber>.<node>`.
    ///
    /// The district is the token between the first and second `_` of the
    /// first segment. Never fails.
    #[must_use]
    pub fn parse(&self, raw: &str) -> Corridor {
        parse_corridor(raw).unwrap_or_else(Corridor::unknown)
    }

    /// Corridors reachable from `corridor`; empty when it is not in the graph.
    #[must_use]
    pub fn neighbors(&self, corridor: &Corridor) -> &[String] {
        self.graph
            .get(&corridor.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of corridors with outgoing edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Whether the graph has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Requires exactly three segments and a non-negative district that fits in
/// a `u64`; anything else is unparseable.
fn parse_corridor(raw: &str) -> Option<Corridor> {
    let mut segments = raw.split('.');
    let (head, chamber, node) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let district = head.split('_').nth(1)?.trim().parse().ok()?;
    Some(Corridor {
        district,
        chamber: chamber.to_string(),
        node: node.to_string(),
    })
}

//! Teleport graph between spots
//!
//! Edges are declared one direction at a time by teleport hotspots; the graph
//! is never made symmetric automatically. The exit from a camp back to the
//! trail is its own edge, declared inside the camp's catalog entry.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::spot::SpotId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeleportEdge {
    pub from: SpotId,
    pub to: SpotId,
    pub caption: Option<String>,
}

/// Directed spot-to-spot links, adjacency kept in declaration order
#[derive(Debug, Clone, Default)]
pub struct TeleportGraph {
    edges: Vec<TeleportEdge>,
    outgoing: BTreeMap<SpotId, Vec<usize>>,
}

impl TeleportGraph {
    pub fn from_edges(edges: impl IntoIterator<Item = TeleportEdge>) -> Self {
        let mut graph = Self::default();
        for edge in edges {
            if graph.has_edge(&edge.from, &edge.to) {
                debug!(from = %edge.from, to = %edge.to, "Ignoring repeated teleport edge");
                continue;
            }
            graph
                .outgoing
                .entry(edge.from.clone())
                .or_default()
                .push(graph.edges.len());
            graph.edges.push(edge);
        }
        graph
    }

    pub fn edges(&self) -> &[TeleportEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Spots reachable in one hop from `from`
    pub fn neighbors(&self, from: &SpotId) -> Vec<&SpotId> {
        self.outgoing
            .get(from)
            .map(|idx| idx.iter().map(|&i| &self.edges[i].to).collect())
            .unwrap_or_default()
    }

    pub fn has_edge(&self, from: &SpotId, to: &SpotId) -> bool {
        self.outgoing
            .get(from)
            .is_some_and(|idx| idx.iter().any(|&i| &self.edges[i].to == to))
    }

    /// The edge leading back along `edge`, if one was declared
    pub fn reverse_of(&self, edge: &TeleportEdge) -> Option<&TeleportEdge> {
        self.outgoing
            .get(&edge.to)?
            .iter()
            .map(|&i| &self.edges[i])
            .find(|e| e.to == edge.from)
    }

    /// Edges with no declared way back
    pub fn unpaired(&self) -> Vec<&TeleportEdge> {
        self.edges
            .iter()
            .filter(|e| self.reverse_of(e).is_none())
            .collect()
    }

    /// Edges whose target is not a known spot
    pub fn dangling<'a>(&'a self, known: &HashSet<SpotId>) -> Vec<&'a TeleportEdge> {
        self.edges.iter().filter(|e| !known.contains(&e.to)).collect()
    }
}

/// Delayed, fire-once environment reset following a teleport.
///
/// Arming while a reset is already pending keeps the original deadline, so a
/// burst of teleports produces a single reset.
#[derive(Debug, Clone)]
pub struct ResetScheduler {
    enabled: bool,
    delay: Duration,
    remaining: Option<Duration>,
    fired: u64,
}

impl ResetScheduler {
    pub fn new(delay: Duration, enabled: bool) -> Self {
        Self {
            enabled,
            delay,
            remaining: None,
            fired: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true when this call scheduled a new reset
    pub fn arm(&mut self) -> bool {
        if !self.enabled || self.remaining.is_some() {
            return false;
        }
        self.remaining = Some(self.delay);
        true
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    pub fn is_pending(&self) -> bool {
        self.remaining.is_some()
    }

    /// Number of resets that have fired so far
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Advance the clock. Returns true exactly once per armed reset.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let Some(remaining) = self.remaining else {
            return false;
        };
        if dt < remaining {
            self.remaining = Some(remaining - dt);
            return false;
        }
        self.remaining = None;
        self.fired += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: &str, to: &str) -> TeleportEdge {
        TeleportEdge {
            from: SpotId::new(from),
            to: SpotId::new(to),
            caption: None,
        }
    }

    #[test]
    fn test_graph_queries() {
        let graph = TeleportGraph::from_edges([
            edge("camp3", "camp-iii"),
            edge("camp-iii", "camp3"),
            edge("camp4", "camp-iv"),
        ]);
        assert_eq!(graph.len(), 3);
        assert!(graph.has_edge(&"camp3".into(), &"camp-iii".into()));
        assert!(!graph.has_edge(&"camp-iii".into(), &"camp4".into()));
        assert_eq!(graph.neighbors(&"camp3".into()), vec![&SpotId::new("camp-iii")]);
        assert!(graph.neighbors(&"peak".into()).is_empty());

        let back = graph.reverse_of(&graph.edges()[0]).unwrap();
        assert_eq!(back.to.as_str(), "camp3");

        let unpaired = graph.unpaired();
        assert_eq!(unpaired.len(), 1);
        assert_eq!(unpaired[0].from.as_str(), "camp4");
    }

    #[test]
    fn test_repeated_edge_collapsed() {
        let graph = TeleportGraph::from_edges([edge("a", "b"), edge("a", "b")]);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_dangling() {
        let graph = TeleportGraph::from_edges([edge("a", "b"), edge("b", "gone")]);
        let known: HashSet<SpotId> = ["a", "b"].into_iter().map(SpotId::from).collect();
        let dangling = graph.dangling(&known);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].to.as_str(), "gone");
    }

    #[test]
    fn test_builtin_camps_are_paired() {
        let graph = crate::Catalog::builtin().unwrap().teleport_graph();
        assert_eq!(graph.len(), 4);
        assert!(graph.unpaired().is_empty());
    }

    #[test]
    fn test_reset_fires_once() {
        let mut reset = ResetScheduler::new(Duration::from_millis(100), true);
        assert!(reset.arm());
        assert!(!reset.arm());
        assert!(!reset.advance(Duration::from_millis(60)));
        assert!(reset.is_pending());
        assert!(reset.advance(Duration::from_millis(60)));
        assert!(!reset.advance(Duration::from_millis(500)));
        assert_eq!(reset.fired(), 1);
    }

    #[test]
    fn test_reset_disabled() {
        let mut reset = ResetScheduler::disabled();
        assert!(!reset.arm());
        assert!(!reset.advance(Duration::from_secs(1)));
        assert_eq!(reset.fired(), 0);
    }
}

//! Discovers predecessor/successor relationships between road segments from
//! shared node ids, and computes one consistent heading per node. Feeding
//! those headings back into the curve fitter is what forces tangent
//! continuity across the whole network instead of pairwise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use geom::Angle;

/// When the resultant vector of a heading set is shorter than this, the
/// naive circular mean is meaningless (antipodal clustering).
const DEGENERATE_RESULTANT: f64 = 1e-6;

/// Registers segments and their node metadata, then builds an immutable
/// `ConnectionGraph` snapshot. Re-register and rebuild after any segment
/// changes; the graph is never incrementally maintained.
#[derive(Default)]
pub struct RoadNetworkConnectionManager {
    segments: BTreeMap<String, SegmentStub>,
}

/// The endpoint metadata a segment contributes before it's fully fit: its
/// node ids and the raw headings of its first and last edge.
#[derive(Clone, Debug)]
pub struct SegmentStub {
    pub s_node_id: Option<String>,
    pub e_node_id: Option<String>,
    pub start_heading: Option<Angle>,
    pub end_heading: Option<Angle>,
}

/// Node-indexed connectivity, plus the derived per-segment lookups and
/// per-node unified headings. Write-once: built by
/// `RoadNetworkConnectionManager::build_connections` and read-only after,
/// so the parallel fitting pass can share it freely.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionGraph {
    pub nodes: BTreeMap<String, NodeConnections>,
    pub predecessors: BTreeMap<String, Vec<String>>,
    pub successors: BTreeMap<String, Vec<String>>,
    unified_headings: BTreeMap<String, Angle>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConnections {
    /// Segments whose end node is this node.
    pub incoming: Vec<String>,
    /// Segments whose start node is this node.
    pub outgoing: Vec<String>,
}

impl RoadNetworkConnectionManager {
    pub fn new() -> RoadNetworkConnectionManager {
        RoadNetworkConnectionManager::default()
    }

    pub fn add_segment(
        &mut self,
        id: &str,
        s_node_id: Option<String>,
        e_node_id: Option<String>,
        start_heading: Option<Angle>,
        end_heading: Option<Angle>,
    ) {
        self.segments.insert(
            id.to_string(),
            SegmentStub {
                s_node_id,
                e_node_id,
                start_heading,
                end_heading,
            },
        );
    }

    /// Rebuilds all derived structures from scratch. Segments missing either
    /// node id are left out of every connection structure (they're still fit
    /// independently; the pipeline records that as a diagnostic).
    pub fn build_connections(&self) -> ConnectionGraph {
        let mut graph = ConnectionGraph::default();

        for (id, stub) in &self.segments {
            let (Some(s_node), Some(e_node)) = (&stub.s_node_id, &stub.e_node_id) else {
                info!("segment {} has incomplete node ids, skipping connections", id);
                continue;
            };
            graph
                .nodes
                .entry(s_node.clone())
                .or_default()
                .outgoing
                .push(id.clone());
            graph
                .nodes
                .entry(e_node.clone())
                .or_default()
                .incoming
                .push(id.clone());
        }

        for (id, stub) in &self.segments {
            if let Some(s_node) = &stub.s_node_id {
                if let Some(conns) = graph.nodes.get(s_node) {
                    let preds: Vec<String> = conns
                        .incoming
                        .iter()
                        .filter(|other| *other != id)
                        .cloned()
                        .collect();
                    if !preds.is_empty() {
                        graph.predecessors.insert(id.clone(), preds);
                    }
                }
            }
            if let Some(e_node) = &stub.e_node_id {
                if let Some(conns) = graph.nodes.get(e_node) {
                    let succs: Vec<String> = conns
                        .outgoing
                        .iter()
                        .filter(|other| *other != id)
                        .cloned()
                        .collect();
                    if !succs.is_empty() {
                        graph.successors.insert(id.clone(), succs);
                    }
                }
            }
        }

        for (node, conns) in &graph.nodes {
            let mut headings = Vec::new();
            for id in &conns.incoming {
                if let Some(h) = self.segments[id].end_heading {
                    headings.push(h);
                }
            }
            for id in &conns.outgoing {
                if let Some(h) = self.segments[id].start_heading {
                    headings.push(h);
                }
            }
            if let Some(unified) = unify_headings(&headings) {
                graph.unified_headings.insert(node.clone(), unified);
            }
        }

        graph
    }
}

impl ConnectionGraph {
    pub fn unified_heading(&self, node_id: &str) -> Option<Angle> {
        self.unified_headings.get(node_id).copied()
    }

    pub fn predecessors(&self, segment_id: &str) -> &[String] {
        self.predecessors
            .get(segment_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn successors(&self, segment_id: &str) -> &[String] {
        self.successors
            .get(segment_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The headings a segment must honor at its start and end, if its nodes
    /// resolved one.
    pub fn constraints_for(&self, stub: &SegmentStub) -> (Option<Angle>, Option<Angle>) {
        let start = stub
            .s_node_id
            .as_deref()
            .and_then(|n| self.unified_heading(n));
        let end = stub
            .e_node_id
            .as_deref()
            .and_then(|n| self.unified_heading(n));
        (start, end)
    }
}

/// Circular mean of a heading set, with a fallback for the antipodal case.
///
/// The resultant vector `(sum cos, sum sin)` handles well-clustered
/// headings. When it's near zero (headings cancel, e.g. 0 and 180 degrees),
/// every input heading becomes a candidate reference: the others are
/// unwrapped to within half a turn of it, and the reference whose deviations
/// have minimum wrapped variance wins. That always returns one of the
/// inputs, never a meaningless average.
pub fn unify_headings(headings: &[Angle]) -> Option<Angle> {
    match headings {
        [] => None,
        [single] => Some(*single),
        _ => {
            let sum_cos: f64 = headings.iter().map(|h| h.radians().cos()).sum();
            let sum_sin: f64 = headings.iter().map(|h| h.radians().sin()).sum();
            if sum_cos.hypot(sum_sin) > DEGENERATE_RESULTANT {
                return Some(Angle::new_rads(sum_sin.atan2(sum_cos)));
            }

            let mut best: Option<(f64, Angle)> = None;
            for reference in headings {
                let variance = headings
                    .iter()
                    .map(|h| h.shortest_rotation_towards(*reference).powi(2))
                    .sum::<f64>()
                    / (headings.len() as f64);
                if best.map(|(v, _)| variance < v).unwrap_or(true) {
                    best = Some((variance, *reference));
                }
            }
            best.map(|(_, h)| h)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_heading_normalized() {
        let h = unify_headings(&[Angle::degrees(365.0)]).unwrap();
        assert!((h.to_degrees() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn clustered_mean() {
        let h = unify_headings(&[Angle::degrees(10.0), Angle::degrees(20.0)]).unwrap();
        assert!((h.to_degrees() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn mean_across_wraparound() {
        let h = unify_headings(&[Angle::degrees(170.0), Angle::degrees(-170.0)]).unwrap();
        assert!((h.to_degrees().abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn antipodal_picks_an_input() {
        let inputs = [Angle::ZERO, Angle::degrees(180.0)];
        let h = unify_headings(&inputs).unwrap();
        assert!(
            inputs.iter().any(|i| i.approx_eq(h, 1e-12)),
            "unified heading {} isn't one of the inputs",
            h
        );
    }

    #[test]
    fn collinear_segments_share_heading() {
        let mut manager = RoadNetworkConnectionManager::new();
        manager.add_segment(
            "A",
            Some("N0".to_string()),
            Some("N1".to_string()),
            Some(Angle::ZERO),
            Some(Angle::ZERO),
        );
        manager.add_segment(
            "B",
            Some("N1".to_string()),
            Some("N2".to_string()),
            Some(Angle::ZERO),
            Some(Angle::ZERO),
        );
        let graph = manager.build_connections();

        assert!(graph
            .unified_heading("N1")
            .unwrap()
            .approx_eq(Angle::ZERO, 1e-12));
        assert_eq!(graph.predecessors("B"), &["A".to_string()]);
        assert_eq!(graph.successors("A"), &["B".to_string()]);
        assert!(graph.predecessors("A").is_empty());
    }

    #[test]
    fn missing_node_ids_excluded() {
        let mut manager = RoadNetworkConnectionManager::new();
        manager.add_segment(
            "A",
            Some("N1".to_string()),
            None,
            Some(Angle::ZERO),
            Some(Angle::ZERO),
        );
        let graph = manager.build_connections();
        assert!(graph.nodes.is_empty());
        assert!(graph.unified_heading("N1").is_none());
    }
}

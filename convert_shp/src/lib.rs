//! Converts GIS road boundary polylines into OpenDRIVE-style parametric
//! geometry: simplified reference lines fit as lines, arcs, and cubic
//! parametric polynomials, with lane widths expressed as cubic records.

#[macro_use]
extern crate log;

mod connections;
mod constraints;
mod diagnostics;
mod fit;
mod options;
mod simplify;
mod width;

pub use connections::{
    unify_headings, ConnectionGraph, NodeConnections, RoadNetworkConnectionManager, SegmentStub,
};
pub use diagnostics::{Diagnostics, FitDiagnostic, FitIssue};
pub use fit::{CurveFitter, FitConstraints};
pub use options::{CurveFittingMode, Options};
pub use simplify::{adaptive_simplify, simplify};
pub use width::WidthProfileCalculator;

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use geom::{PolyLine, Pt2D};
use odr_model::{ConvertedRoad, LaneWidthProfile, PrimitiveKind, RoadSegment, CONTINUITY_GAP};

/// One road as read from the source data: an optional explicit center line,
/// per-lane boundary polylines, and freeform attributes carrying (at least)
/// the network node ids.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadInput {
    pub id: String,
    #[serde(default)]
    pub center: Option<Vec<Pt2D>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub lanes: Vec<LaneBoundaries>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaneBoundaries {
    pub index: i32,
    pub left: Vec<Pt2D>,
    pub right: Vec<Pt2D>,
}

/// Everything a conversion produces: fitted roads, the degrade-and-continue
/// record, and summary counters.
#[derive(Clone, Debug, Serialize)]
pub struct Conversion {
    pub roads: Vec<ConvertedRoad>,
    pub diagnostics: Diagnostics,
    pub stats: ConversionStats,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionStats {
    pub roads_in: usize,
    pub roads_converted: usize,
    pub line_primitives: usize,
    pub arc_primitives: usize,
    pub parampoly3_primitives: usize,
    pub width_profiles: usize,
    pub total_length: f64,
    pub fallback_events: usize,
    pub max_continuity_gap: f64,
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "converted {} / {} roads ({:.1}m total)",
            self.roads_converted, self.roads_in, self.total_length
        )?;
        writeln!(
            f,
            "  {} lines, {} arcs, {} parametric cubics, {} width profiles",
            self.line_primitives,
            self.arc_primitives,
            self.parampoly3_primitives,
            self.width_profiles
        )?;
        write!(
            f,
            "  {} fallback events, worst continuity gap {:.4}m",
            self.fallback_events, self.max_continuity_gap
        )
    }
}

/// The whole pipeline. Three passes: register every road's endpoint metadata,
/// snapshot the connection graph, then fit geometry and width profiles for
/// each road in parallel. Individual bad roads degrade or get skipped with a
/// diagnostic; only an empty result is an error.
pub fn convert(inputs: Vec<RoadInput>, opts: Options) -> Result<Conversion> {
    let opts = opts.clamped();
    if inputs.is_empty() {
        bail!("no input roads");
    }
    let mut stats = ConversionStats {
        roads_in: inputs.len(),
        ..Default::default()
    };
    let mut diagnostics = Diagnostics::new();

    // Pass 1: reference lines and node registration.
    let mut manager = RoadNetworkConnectionManager::new();
    let mut prepared = Vec::new();
    for road in inputs {
        let Some(points) = reference_points(&road) else {
            diagnostics.record(
                &road.id,
                FitIssue::DegenerateGeometry("no usable reference line".to_string()),
                "road skipped",
            );
            continue;
        };
        let reference = match PolyLine::new(Pt2D::dedupe(points)) {
            Ok(pl) => pl,
            Err(err) => {
                diagnostics.record(
                    &road.id,
                    FitIssue::DegenerateGeometry(err.to_string()),
                    "road skipped",
                );
                continue;
            }
        };
        let s_node_id = node_id(&road.attributes, "snodeid");
        let e_node_id = node_id(&road.attributes, "enodeid");
        if s_node_id.is_none() || e_node_id.is_none() {
            diagnostics.record(&road.id, FitIssue::MissingNodeIds, "fit without network constraints");
        }
        let stub = SegmentStub {
            s_node_id: s_node_id.clone(),
            e_node_id: e_node_id.clone(),
            start_heading: Some(reference.first_angle()),
            end_heading: Some(reference.last_angle()),
        };
        manager.add_segment(
            &road.id,
            s_node_id,
            e_node_id,
            Some(reference.first_angle()),
            Some(reference.last_angle()),
        );
        prepared.push(PreparedRoad {
            input: road,
            reference,
            stub,
        });
    }
    if prepared.is_empty() {
        bail!("every input road was degenerate");
    }

    // Pass 2: one immutable connectivity snapshot, shared by all workers.
    let graph = manager.build_connections();

    // Pass 3: per-road fitting is independent once the graph is frozen.
    let opts_ref = &opts;
    let graph_ref = &graph;
    let outcomes = parallelize(prepared, |road| convert_road(road, opts_ref, graph_ref));

    let mut roads = Vec::new();
    for outcome in outcomes {
        diagnostics.extend(outcome.diagnostics);
        stats.max_continuity_gap = stats.max_continuity_gap.max(outcome.continuity_gap);
        if let Some(road) = outcome.road {
            for prim in &road.segment.primitives {
                match prim.kind {
                    PrimitiveKind::Line => stats.line_primitives += 1,
                    PrimitiveKind::Arc { .. } => stats.arc_primitives += 1,
                    PrimitiveKind::ParamPoly3(_) => stats.parampoly3_primitives += 1,
                }
            }
            stats.total_length += road.segment.length;
            stats.width_profiles += road.lanes.len();
            roads.push(road);
        }
    }
    if roads.is_empty() {
        bail!("couldn't fit geometry for any road");
    }
    stats.roads_converted = roads.len();
    stats.fallback_events = diagnostics.events.len();
    info!("{}", stats);

    Ok(Conversion {
        roads,
        diagnostics,
        stats,
    })
}

struct PreparedRoad {
    input: RoadInput,
    reference: PolyLine,
    stub: SegmentStub,
}

struct RoadOutcome {
    road: Option<ConvertedRoad>,
    continuity_gap: f64,
    diagnostics: Diagnostics,
}

fn convert_road(road: PreparedRoad, opts: &Options, graph: &ConnectionGraph) -> RoadOutcome {
    let mut diagnostics = Diagnostics::new();
    let (start_heading, end_heading) = graph.constraints_for(&road.stub);
    let fitter = CurveFitter::new(opts);
    let primitives = fitter.fit(
        &road.input.id,
        road.reference.points(),
        FitConstraints {
            start_heading,
            end_heading,
        },
        &mut diagnostics,
    );
    if primitives.is_empty() {
        return RoadOutcome {
            road: None,
            continuity_gap: 0.0,
            diagnostics,
        };
    }

    let segment = RoadSegment::new(
        road.input.id.clone(),
        road.stub.s_node_id.clone(),
        road.stub.e_node_id.clone(),
        primitives,
    );
    let continuity_gap = segment.max_continuity_gap();
    if continuity_gap > CONTINUITY_GAP {
        warn!(
            "{}: primitives have a {:.3}m continuity gap",
            road.input.id, continuity_gap
        );
    }

    let calc = WidthProfileCalculator::new(opts.max_segments_per_road);
    let mut lanes = Vec::new();
    for lane in &road.input.lanes {
        let (Ok(left), Ok(right)) = (
            PolyLine::new(Pt2D::dedupe(lane.left.clone())),
            PolyLine::new(Pt2D::dedupe(lane.right.clone())),
        ) else {
            diagnostics.record(
                &road.input.id,
                FitIssue::DegenerateGeometry(format!("lane {} boundary too short", lane.index)),
                "lane width profile skipped",
            );
            continue;
        };
        let (_, widths) = calc.profile(&left, &right, &segment);
        lanes.push(LaneWidthProfile {
            index: lane.index,
            widths: widths
                .iter()
                .map(|w| w.rounded(opts.coordinate_precision))
                .collect(),
        });
    }

    RoadOutcome {
        road: Some(ConvertedRoad {
            id: road.input.id,
            segment: segment.emit(opts.coordinate_precision),
            lanes,
        }),
        continuity_gap,
        diagnostics,
    }
}

/// Case-insensitive attribute lookup; empty values count as missing.
fn node_id(attributes: &BTreeMap<String, String>, name: &str) -> Option<String> {
    attributes.iter().find_map(|(key, value)| {
        if key.eq_ignore_ascii_case(name) && !value.trim().is_empty() {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// The polyline the geometry gets fit to: the explicit center line when the
/// source has one, else the index-0 lane boundary, else the average of every
/// lane's center line.
fn reference_points(road: &RoadInput) -> Option<Vec<Pt2D>> {
    if let Some(center) = &road.center {
        if center.len() >= 2 {
            return Some(center.clone());
        }
    }
    for lane in &road.lanes {
        if lane.index == 0 {
            let boundary = if lane.left.len() >= 2 {
                &lane.left
            } else {
                &lane.right
            };
            if boundary.len() >= 2 {
                return Some(boundary.clone());
            }
        }
    }
    averaged_center(road)
}

fn averaged_center(road: &RoadInput) -> Option<Vec<Pt2D>> {
    let mut centers = Vec::new();
    for lane in &road.lanes {
        if let Some(center) = lane_center(&lane.left, &lane.right) {
            centers.push(center);
        }
    }
    if centers.is_empty() {
        return None;
    }
    let count = centers.iter().map(|c| c.len()).max()?;
    let resampled: Vec<Vec<Pt2D>> = centers
        .into_iter()
        .filter_map(|c| Some(PolyLine::new(c).ok()?.interpolate_points(count)))
        .collect();
    if resampled.is_empty() {
        return None;
    }
    let mut result = Vec::with_capacity(count);
    for i in 0..count {
        let (mut x, mut y) = (0.0, 0.0);
        for c in &resampled {
            x += c[i].x();
            y += c[i].y();
        }
        let n = resampled.len() as f64;
        result.push(Pt2D::new(x / n, y / n));
    }
    Some(result)
}

/// Midpoints of the two boundaries resampled to a common count.
fn lane_center(left: &[Pt2D], right: &[Pt2D]) -> Option<Vec<Pt2D>> {
    let left = PolyLine::new(Pt2D::dedupe(left.to_vec())).ok()?;
    let right = PolyLine::new(Pt2D::dedupe(right.to_vec())).ok()?;
    let count = left.points().len().max(right.points().len());
    let left = left.interpolate_points(count);
    let right = right.interpolate_points(count);
    Some(
        left.into_iter()
            .zip(right)
            .map(|(l, r)| Pt2D::new((l.x() + r.x()) / 2.0, (l.y() + r.y()) / 2.0))
            .collect(),
    )
}

/// Fan requests out over all cores and reassemble results in order.
fn parallelize<I, O, F: Fn(I) -> O>(requests: Vec<I>, cb: F) -> Vec<O>
where
    I: Send,
    O: Send,
    F: Send + Copy,
{
    scoped_threadpool::Pool::new(num_cpus::get() as u32).scoped(|scope| {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut results: Vec<Option<O>> = std::iter::repeat_with(|| None)
            .take(requests.len())
            .collect();
        for (idx, req) in requests.into_iter().enumerate() {
            let tx = tx.clone();
            scope.execute(move || {
                tx.send((idx, cb(req))).unwrap();
            });
        }
        drop(tx);
        for _ in 0..results.len() {
            let (idx, result) = rx.recv().unwrap();
            results[idx] = Some(result);
        }
        results.into_iter().flatten().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_lookup_is_case_insensitive() {
        let mut attrs = BTreeMap::new();
        attrs.insert("SNodeID".to_string(), "N1".to_string());
        attrs.insert("eNoDeId".to_string(), " N2 ".to_string());
        attrs.insert("name".to_string(), "main st".to_string());
        assert_eq!(node_id(&attrs, "snodeid"), Some("N1".to_string()));
        assert_eq!(node_id(&attrs, "enodeid"), Some("N2".to_string()));
        assert_eq!(node_id(&attrs, "zlevel"), None);

        attrs.insert("blank".to_string(), "  ".to_string());
        assert_eq!(node_id(&attrs, "blank"), None);
    }

    #[test]
    fn reference_prefers_center_then_zero_lane() {
        let center = vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)];
        let road = RoadInput {
            id: "r".to_string(),
            center: Some(center.clone()),
            attributes: BTreeMap::new(),
            lanes: vec![LaneBoundaries {
                index: 0,
                left: vec![Pt2D::new(0.0, 5.0), Pt2D::new(10.0, 5.0)],
                right: vec![],
            }],
        };
        assert_eq!(reference_points(&road), Some(center));

        let road = RoadInput {
            center: None,
            ..road
        };
        assert_eq!(
            reference_points(&road),
            Some(vec![Pt2D::new(0.0, 5.0), Pt2D::new(10.0, 5.0)])
        );
    }

    #[test]
    fn reference_averages_lane_centers() {
        let road = RoadInput {
            id: "r".to_string(),
            center: None,
            attributes: BTreeMap::new(),
            lanes: vec![
                LaneBoundaries {
                    index: 1,
                    left: vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)],
                    right: vec![Pt2D::new(0.0, 2.0), Pt2D::new(10.0, 2.0)],
                },
                LaneBoundaries {
                    index: 2,
                    left: vec![Pt2D::new(0.0, 2.0), Pt2D::new(10.0, 2.0)],
                    right: vec![Pt2D::new(0.0, 4.0), Pt2D::new(10.0, 4.0)],
                },
            ],
        };
        let pts = reference_points(&road).unwrap();
        assert_eq!(pts.first().unwrap(), &Pt2D::new(0.0, 2.0));
        assert_eq!(pts.last().unwrap(), &Pt2D::new(10.0, 2.0));
    }

    #[test]
    fn parallelize_preserves_order() {
        let results = parallelize((0..100).collect::<Vec<usize>>(), |i| i * 2);
        assert_eq!(results, (0..100).map(|i| i * 2).collect::<Vec<usize>>());
    }
}

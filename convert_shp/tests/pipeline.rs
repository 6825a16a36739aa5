use std::collections::BTreeMap;

use geom::Pt2D;
use odr_model::PrimitiveKind;

use convert_shp::{convert, CurveFittingMode, LaneBoundaries, Options, RoadInput};

fn attrs(s_node: &str, e_node: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("SNodeID".to_string(), s_node.to_string());
    map.insert("ENodeID".to_string(), e_node.to_string());
    map
}

fn road(id: &str, pts: Vec<Pt2D>, s_node: &str, e_node: &str) -> RoadInput {
    RoadInput {
        id: id.to_string(),
        center: Some(pts),
        attributes: attrs(s_node, e_node),
        lanes: Vec::new(),
    }
}

#[test]
fn connected_roads_share_tangents() {
    let r1 = road(
        "r1",
        (0..=5).map(|i| Pt2D::new(10.0 * i as f64, 0.0)).collect(),
        "N0",
        "N1",
    );
    let r2 = road(
        "r2",
        (5..=10).map(|i| Pt2D::new(10.0 * i as f64, 0.0)).collect(),
        "N1",
        "N2",
    );

    let conversion = convert(vec![r1, r2], Options::default()).unwrap();
    assert_eq!(conversion.stats.roads_converted, 2);

    let end = conversion.roads[0].segment.end_state().unwrap();
    let start = conversion.roads[1]
        .segment
        .eval(0.0)
        .unwrap();
    assert!(end.0.dist_to(start.0) < 1e-6);
    assert!(end.1.approx_eq(start.1, 1e-6), "{:?} vs {:?}", end.1, start.1);
}

#[test]
fn right_angle_in_polyline_mode() {
    let mut pts: Vec<Pt2D> = (0..=10).map(|i| Pt2D::new(i as f64, 0.0)).collect();
    pts.extend((1..=10).map(|i| Pt2D::new(10.0, i as f64)));

    let opts = Options {
        curve_fitting_mode: CurveFittingMode::Polyline,
        tolerance: 0.01,
        ..Options::default()
    };
    let conversion = convert(vec![road("corner", pts, "N0", "N1")], opts).unwrap();
    let segment = &conversion.roads[0].segment;
    assert_eq!(segment.primitives.len(), 2);
    for prim in &segment.primitives {
        assert!(matches!(prim.kind, PrimitiveKind::Line));
        assert!((prim.length - 10.0).abs() < 1e-9);
    }
}

#[test]
fn lane_widths_measure_the_corridor() {
    let mut input = road(
        "wide",
        vec![
            Pt2D::new(0.0, 1.5),
            Pt2D::new(50.0, 1.5),
            Pt2D::new(100.0, 1.5),
        ],
        "N0",
        "N1",
    );
    input.lanes.push(LaneBoundaries {
        index: 1,
        left: vec![Pt2D::new(0.0, 0.0), Pt2D::new(100.0, 0.0)],
        right: vec![Pt2D::new(0.0, 3.0), Pt2D::new(100.0, 3.0)],
    });

    let conversion = convert(vec![input], Options::default()).unwrap();
    let lanes = &conversion.roads[0].lanes;
    assert_eq!(lanes.len(), 1);
    assert!(!lanes[0].widths.is_empty());
    for poly in &lanes[0].widths {
        for ds in [0.0, poly.length / 2.0, poly.length] {
            assert!((poly.eval(ds) - 3.0).abs() < 0.01, "width {}", poly.eval(ds));
        }
    }
    assert_eq!(conversion.stats.width_profiles, 1);
}

#[test]
fn missing_node_ids_still_convert() {
    let input = RoadInput {
        id: "orphan".to_string(),
        center: Some(vec![Pt2D::new(0.0, 0.0), Pt2D::new(30.0, 0.0)]),
        attributes: BTreeMap::new(),
        lanes: Vec::new(),
    };
    let conversion = convert(vec![input], Options::default()).unwrap();
    assert_eq!(conversion.stats.roads_converted, 1);
    assert!(!conversion.diagnostics.is_empty());
}

#[test]
fn empty_input_is_an_error() {
    assert!(convert(Vec::new(), Options::default()).is_err());
}

#[test]
fn degenerate_roads_are_skipped_not_fatal() {
    let good = road(
        "good",
        vec![Pt2D::new(0.0, 0.0), Pt2D::new(20.0, 0.0)],
        "N0",
        "N1",
    );
    let bad = road(
        "bad",
        vec![Pt2D::new(5.0, 5.0), Pt2D::new(5.0, 5.0)],
        "N1",
        "N2",
    );
    let conversion = convert(vec![good, bad], Options::default()).unwrap();
    assert_eq!(conversion.stats.roads_in, 2);
    assert_eq!(conversion.stats.roads_converted, 1);
    assert!(conversion
        .diagnostics
        .events
        .iter()
        .any(|event| event.road_id == "bad"));
}

use floorscape_core::document::{CadEntity, DEFAULT_LAYER, Line, Polyline};
use floorscape_core::geometry::{Bounds2D, Point2};
use floorscape_core::plan::{Device, FloorId, Zone};
use floorscape_core::transform::CanvasSize;
use floorscape_engine::adjacency::{AdjacencyIndex, DEFAULT_EPSILON, Side};
use floorscape_engine::bounds::{compute_bounds, normalize};
use floorscape_engine::scene::{SceneReconstructor, WallKind};
use floorscape_engine::tessellate::tessellate;
use floorscape_engine::zones::ZoneModel;
use proptest::prelude::*;

/// 网格布局：每个格子可能为空，相邻列/行之间可能留出明显间隙，因此区域两两不重叠。
fn grid_layout() -> impl Strategy<Value = Vec<Zone>> {
    (
        prop::collection::vec(10u32..80, 1..5),
        prop::collection::vec(10u32..60, 1..4),
        prop::collection::vec(any::<bool>(), 4),
        prop::collection::vec(any::<bool>(), 3),
        prop::collection::vec(any::<bool>(), 20),
    )
        .prop_map(|(widths, heights, col_gaps, row_gaps, present)| {
            let mut zones = Vec::new();
            let mut y = 0.0;
            for (row, height) in heights.iter().enumerate() {
                let mut x = 0.0;
                for (col, width) in widths.iter().enumerate() {
                    if present[row * 5 + col] {
                        zones.push(Zone::new(
                            format!("z{row}-{col}"),
                            FloorId(0),
                            x,
                            y,
                            f64::from(*width),
                            f64::from(*height),
                        ));
                    }
                    x += f64::from(*width);
                    if col_gaps[col] {
                        x += 5.0;
                    }
                }
                y += f64::from(*height);
                if row_gaps[row] {
                    y += 5.0;
                }
            }
            zones
        })
}

/// 不规则布局：反复切分一个矩形得到互不重叠、边界错位的区域，再随机内缩部分边。
/// 内缩量覆盖 0、略小于、等于和略大于默认容差的情况。
fn sliced_layout() -> impl Strategy<Value = Vec<Zone>> {
    (
        prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), 0.2..0.8f64), 0..10),
        prop::collection::vec(
            (
                any::<bool>(),
                0usize..4,
                prop::sample::select(vec![0.0, 0.05, 0.09, 0.1, 0.11, 0.2, 4.0]),
            ),
            11,
        ),
    )
        .prop_map(|(cuts, tweaks)| {
            let mut cells: Vec<(f64, f64, f64, f64)> = vec![(0.0, 0.0, 400.0, 300.0)];
            for (index, vertical, ratio) in cuts {
                let i = index.index(cells.len());
                let (x, y, w, h) = cells[i];
                if (vertical && w < 10.0) || (!vertical && h < 10.0) {
                    continue;
                }
                if vertical {
                    let left = (w * ratio).round();
                    cells[i] = (x, y, left, h);
                    cells.push((x + left, y, w - left, h));
                } else {
                    let lower = (h * ratio).round();
                    cells[i] = (x, y, w, lower);
                    cells.push((x, y + lower, w, h - lower));
                }
            }

            let mut zones = Vec::new();
            for (i, (x, y, w, h)) in cells.into_iter().enumerate() {
                let (dropped, side, inset) = tweaks[i];
                if dropped {
                    continue;
                }
                let (mut x, mut y, mut w, mut h) = (x, y, w, h);
                if w > 2.0 * inset && h > 2.0 * inset {
                    match side {
                        0 => h -= inset,
                        1 => {
                            y += inset;
                            h -= inset;
                        }
                        2 => w -= inset,
                        _ => {
                            x += inset;
                            w -= inset;
                        }
                    }
                }
                zones.push(Zone::new(format!("s{i}"), FloorId(0), x, y, w, h));
            }
            zones
        })
}

fn assert_walls_match_adjacency(zones: &[Zone]) -> Result<(), TestCaseError> {
    let mut model = ZoneModel::new();
    for zone in zones {
        model.add_zone(zone.clone()).expect("unique ids");
    }
    let view = model.floor_view(FloorId(0));
    let catalog: Vec<Device> = Vec::new();
    let scene = SceneReconstructor::default().build(&view, &catalog, None);

    for (index, zone) in view.zones.iter().enumerate() {
        let contacts = view.adjacency.get(index).expect("contacts");
        for side in Side::ALL {
            let has_wall = scene
                .walls
                .iter()
                .any(|wall| wall.kind == WallKind::Zone { zone_id: zone.id.clone(), side });
            prop_assert_eq!(has_wall, !contacts.is_adjacent(side));
        }
    }
    let expected_perimeter = if zones.is_empty() { 0 } else { 4 };
    prop_assert_eq!(scene.perimeter_walls().count(), expected_perimeter);
    Ok(())
}

fn finite_point() -> impl Strategy<Value = Point2> {
    (-1.0e6..1.0e6f64, -1.0e6..1.0e6f64).prop_map(|(x, y)| Point2::new(x, y))
}

proptest! {
    #[test]
    fn adjacency_is_symmetric_for_grid_layouts(zones in grid_layout()) {
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        prop_assert_eq!(index.len(), zones.len());
        prop_assert!(index.is_symmetric());
    }

    #[test]
    fn walls_exist_exactly_on_non_adjacent_edges(zones in grid_layout()) {
        assert_walls_match_adjacency(&zones)?;
    }

    #[test]
    fn adjacency_is_symmetric_for_sliced_layouts(zones in sliced_layout()) {
        let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
        prop_assert_eq!(index.len(), zones.len());
        prop_assert!(index.is_symmetric());
    }

    #[test]
    fn walls_follow_adjacency_for_sliced_layouts(zones in sliced_layout()) {
        assert_walls_match_adjacency(&zones)?;
    }

    #[test]
    fn bounds_are_ordered_for_valid_entities(
        points in prop::collection::vec(finite_point(), 2..12),
    ) {
        prop_assume!(points.iter().any(|point| !point.is_origin()));
        let entities = vec![CadEntity::Polyline(Polyline {
            vertices: points,
            closed: false,
            layer: DEFAULT_LAYER.to_string(),
        })];
        let bounds = compute_bounds(&entities);
        prop_assert!(bounds.min_x() <= bounds.max_x());
        prop_assert!(bounds.min_y() <= bounds.max_y());
    }

    #[test]
    fn normalize_scale_is_positive(
        x in -1.0e6..1.0e6f64,
        y in -1.0e6..1.0e6f64,
        w in 0.0..1.0e6f64,
        h in 0.0..1.0e6f64,
    ) {
        let transform = normalize(&Bounds2D::from_rect(x, y, w, h), CanvasSize::default());
        prop_assert!(transform.scale > 0.0);
        prop_assert!(transform.scale.is_finite());
    }

    #[test]
    fn tessellation_is_idempotent(start in finite_point(), end in finite_point()) {
        let line = CadEntity::Line(Line {
            start,
            end,
            layer: DEFAULT_LAYER.to_string(),
        });
        prop_assert_eq!(tessellate(&line), tessellate(&line));
    }
}

#[test]
fn two_adjacent_rooms_share_one_edge_and_emit_six_zone_walls() {
    let mut model = ZoneModel::new();
    model
        .add_zone(Zone::new("A", FloorId(0), 0.0, 0.0, 100.0, 100.0))
        .expect("A");
    model
        .add_zone(Zone::new("B", FloorId(0), 100.0, 0.0, 100.0, 100.0))
        .expect("B");

    let adjacency = model.adjacency(FloorId(0));
    let a = adjacency.get(0).expect("A contacts");
    let b = adjacency.get(1).expect("B contacts");
    assert_eq!(a.east, vec![1]);
    assert_eq!(b.west, vec![0]);
    assert_eq!(adjacency.contacts(0).count(), 1);
    assert_eq!(adjacency.contacts(1).count(), 1);

    let catalog: Vec<Device> = Vec::new();
    let scene = SceneReconstructor::default().build(&model.floor_view(FloorId(0)), &catalog, None);
    assert_eq!(scene.zone_walls().count(), 6);
}

#[test]
fn assign_then_move_leaves_one_position() {
    let mut model = ZoneModel::new();
    model
        .add_zone(Zone::new("lab", FloorId(1), 0.0, 0.0, 50.0, 50.0))
        .expect("lab");
    assert!(model.assign_device("sensor-7", "lab", None));
    model.move_device("sensor-7", 400.0, 300.0, FloorId(2));

    let positions: Vec<_> = model
        .device_positions()
        .filter(|position| position.device_id == "sensor-7")
        .collect();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].floor, FloorId(2));
}

#[test]
fn export_import_round_trip_preserves_adjacency() {
    let mut model = ZoneModel::new();
    let layout = [
        ("hall", 0.0, 0.0, 300.0, 40.0),
        ("r1", 0.0, 40.0, 100.0, 80.0),
        ("r2", 100.0, 40.0, 100.0, 80.0),
        ("r3", 200.0, 40.0, 100.0, 80.0),
    ];
    for (id, x, y, w, h) in layout {
        model
            .add_zone(Zone::new(id, FloorId(0), x, y, w, h))
            .expect("zone");
    }
    model.move_device("ap-1", 150.0, 20.0, FloorId(0));

    let json = serde_json::to_string(&model.export()).expect("serialize");
    let state = serde_json::from_str(&json).expect("deserialize");
    let mut restored = ZoneModel::new();
    restored.import(&state).expect("import");

    assert_eq!(restored.adjacency(FloorId(0)), model.adjacency(FloorId(0)));
    assert!(restored.adjacency(FloorId(0)).is_symmetric());
    assert_eq!(restored.device_position("ap-1"), model.device_position("ap-1"));
}

#[test]
fn offset_neighbors_and_near_misses_at_epsilon() {
    let zones = vec![
        Zone::new("a", FloorId(0), 0.0, 0.0, 100.0, 100.0),
        // 间隙 0.05，竖向错开 40
        Zone::new("b", FloorId(0), 100.05, 40.0, 100.0, 100.0),
        // 间隙 0.2，超出容差
        Zone::new("c", FloorId(0), 20.0, 100.2, 60.0, 50.0),
        // 贴边但投影重叠只有 0.05
        Zone::new("d", FloorId(0), -50.0, 99.95, 50.0, 50.0),
    ];
    let index = AdjacencyIndex::recompute(&zones, DEFAULT_EPSILON);
    assert!(index.is_symmetric());

    let a = index.get(0).expect("a");
    assert_eq!(a.east, vec![1]);
    assert!(a.north.is_empty());
    assert!(a.west.is_empty());
    assert_eq!(index.contacts(2).count(), 0);
    assert_eq!(index.contacts(3).count(), 0);
}

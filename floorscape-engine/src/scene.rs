//! 三维场景重建：楼板、区域面片、墙体、设备标记与底图轮廓。
//!
//! 场景图是纯派生数据，每次重建整体生成，不做增量修改。

use floorscape_core::geometry::{Bounds2D, Point2, Point3};
use floorscape_core::plan::{DeviceCatalog, FloorId, ZoneKind};
use floorscape_core::transform::{
    CanvasSize, Footprint, NormalizationTransform, OutlineTransform, SceneTransform,
};
use serde::Serialize;
use tracing::debug;

use crate::adjacency::Side;
use crate::tessellate::segment_pairs;
use crate::zones::FloorView;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneOptions {
    pub canvas: CanvasSize,
    pub footprint: Footprint,
    pub floor_height: f64,
    pub wall_height: f64,
    pub wall_thickness: f64,
    pub perimeter_padding: f64,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            footprint: Footprint::default(),
            floor_height: 3.0,
            wall_height: 2.5,
            wall_thickness: 0.1,
            perimeter_padding: 0.5,
        }
    }
}

impl SceneOptions {
    #[inline]
    pub fn scene_transform(&self) -> SceneTransform {
        SceneTransform::new(self.canvas, self.footprint)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorSlab {
    pub floor: FloorId,
    pub center: Point3,
    pub width: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSurface {
    pub zone_id: String,
    pub name: String,
    pub kind: ZoneKind,
    pub center: Point3,
    pub width: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WallKind {
    Perimeter,
    Zone { zone_id: String, side: Side },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wall {
    pub kind: WallKind,
    pub start: Point3,
    pub end: Point3,
    pub height: f64,
    pub thickness: f64,
}

impl Wall {
    #[inline]
    pub fn length(&self) -> f64 {
        self.start.as_vec3().distance(self.end.as_vec3())
    }

    #[inline]
    pub fn is_perimeter(&self) -> bool {
        matches!(self.kind, WallKind::Perimeter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceMarker {
    pub device_id: String,
    pub label: String,
    /// 设备是否能在目录中找到。
    pub known: bool,
    pub position: Point3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlineSegment {
    pub start: Point3,
    pub end: Point3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneGraph {
    pub floor: FloorId,
    pub elevation: f64,
    pub floor_slabs: Vec<FloorSlab>,
    pub zone_patches: Vec<ZoneSurface>,
    pub walls: Vec<Wall>,
    pub device_markers: Vec<DeviceMarker>,
    pub outline_segments: Vec<OutlineSegment>,
}

impl SceneGraph {
    pub fn zone_walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls.iter().filter(|wall| !wall.is_perimeter())
    }

    pub fn perimeter_walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls.iter().filter(|wall| wall.is_perimeter())
    }
}

/// 底图轮廓：文档空间的扁平线段及其归一化变换。
#[derive(Debug, Clone, Copy)]
pub struct OutlineOverlay<'a> {
    pub segments: &'a [f64],
    pub normalization: NormalizationTransform,
}

#[derive(Debug, Clone, Default)]
pub struct SceneReconstructor {
    options: SceneOptions,
}

impl SceneReconstructor {
    pub fn new(options: SceneOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// 楼层高度按楼层编号计算，地下层为负高度。
    pub fn build<C>(
        &self,
        view: &FloorView<'_>,
        catalog: &C,
        outline: Option<&OutlineOverlay<'_>>,
    ) -> SceneGraph
    where
        C: DeviceCatalog + ?Sized,
    {
        let transform = self.options.scene_transform();
        let elevation = f64::from(view.floor.get()) * self.options.floor_height;

        let floor_slabs = vec![FloorSlab {
            floor: view.floor,
            center: Point3::new(0.0, elevation, 0.0),
            width: self.options.footprint.width,
            depth: self.options.footprint.depth,
        }];

        let zone_patches = view
            .zones
            .iter()
            .map(|zone| {
                let bounds = zone.bounds();
                ZoneSurface {
                    zone_id: zone.id.clone(),
                    name: zone.name.clone(),
                    kind: zone.kind.clone(),
                    center: transform.apply(bounds.center(), elevation),
                    width: transform.width(bounds.width()),
                    depth: transform.depth(bounds.height()),
                }
            })
            .collect();

        let mut walls = self.perimeter_walls(view, &transform, elevation);
        walls.extend(self.zone_walls(view, &transform, elevation));

        let device_markers = view
            .positions
            .iter()
            .map(|position| {
                let device = catalog.device(&position.device_id);
                DeviceMarker {
                    device_id: position.device_id.clone(),
                    label: device
                        .map(|device| device.name.clone())
                        .unwrap_or_else(|| position.device_id.clone()),
                    known: device.is_some(),
                    position: transform.apply(position.point(), elevation),
                }
            })
            .collect();

        let outline_segments = match outline {
            Some(overlay) => {
                let composed = OutlineTransform::compose(overlay.normalization, transform);
                segment_pairs(overlay.segments)
                    .map(|(start, end)| OutlineSegment {
                        start: composed.apply(start, elevation),
                        end: composed.apply(end, elevation),
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let scene = SceneGraph {
            floor: view.floor,
            elevation,
            floor_slabs,
            zone_patches,
            walls,
            device_markers,
            outline_segments,
        };
        debug!(
            floor = %scene.floor,
            zones = scene.zone_patches.len(),
            walls = scene.walls.len(),
            devices = scene.device_markers.len(),
            outline = scene.outline_segments.len(),
            "场景重建完成"
        );
        scene
    }

    fn perimeter_walls(
        &self,
        view: &FloorView<'_>,
        transform: &SceneTransform,
        elevation: f64,
    ) -> Vec<Wall> {
        if view.zones.is_empty() {
            return Vec::new();
        }
        let mut union = Bounds2D::empty();
        for zone in &view.zones {
            union.include_bounds(&zone.bounds());
        }

        let low = transform.apply(union.min(), elevation);
        let high = transform.apply(union.max(), elevation);
        let pad = self.options.perimeter_padding;
        let (x0, x1) = (low.x().min(high.x()) - pad, low.x().max(high.x()) + pad);
        let (z0, z1) = (low.z().min(high.z()) - pad, low.z().max(high.z()) + pad);

        let corners = [
            Point3::new(x0, elevation, z0),
            Point3::new(x1, elevation, z0),
            Point3::new(x1, elevation, z1),
            Point3::new(x0, elevation, z1),
        ];
        (0..corners.len())
            .map(|i| self.wall(WallKind::Perimeter, corners[i], corners[(i + 1) % corners.len()]))
            .collect()
    }

    fn zone_walls(
        &self,
        view: &FloorView<'_>,
        transform: &SceneTransform,
        elevation: f64,
    ) -> Vec<Wall> {
        let mut walls = Vec::new();
        for (index, zone) in view.zones.iter().enumerate() {
            let contacts = view.adjacency.get(index);
            let bounds = zone.bounds();
            for side in Side::ALL {
                if contacts.map(|entry| entry.is_adjacent(side)).unwrap_or(false) {
                    continue;
                }
                let (start, end) = edge(&bounds, side);
                walls.push(self.wall(
                    WallKind::Zone {
                        zone_id: zone.id.clone(),
                        side,
                    },
                    transform.apply(start, elevation),
                    transform.apply(end, elevation),
                ));
            }
        }
        walls
    }

    #[inline]
    fn wall(&self, kind: WallKind, start: Point3, end: Point3) -> Wall {
        Wall {
            kind,
            start,
            end,
            height: self.options.wall_height,
            thickness: self.options.wall_thickness,
        }
    }
}

fn edge(bounds: &Bounds2D, side: Side) -> (Point2, Point2) {
    let (x0, y0, x1, y1) = (bounds.min_x(), bounds.min_y(), bounds.max_x(), bounds.max_y());
    match side {
        Side::North => (Point2::new(x0, y1), Point2::new(x1, y1)),
        Side::South => (Point2::new(x0, y0), Point2::new(x1, y0)),
        Side::East => (Point2::new(x1, y0), Point2::new(x1, y1)),
        Side::West => (Point2::new(x0, y0), Point2::new(x0, y1)),
    }
}

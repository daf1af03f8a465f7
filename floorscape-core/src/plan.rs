//! 楼层空间模型的数据类型：区域、设备与导出状态。

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds2D, Point2};

/// 楼层标识，允许负数表示地下层。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FloorId(pub i32);

impl FloorId {
    #[inline]
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    #[default]
    Room,
    Office,
    Meeting,
    Corridor,
    Storage,
    Server,
    Restroom,
    Kitchen,
    Lobby,
    #[serde(other)]
    Other,
}

impl ZoneKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "room" => ZoneKind::Room,
            "office" => ZoneKind::Office,
            "meeting" => ZoneKind::Meeting,
            "corridor" => ZoneKind::Corridor,
            "storage" => ZoneKind::Storage,
            "server" => ZoneKind::Server,
            "restroom" => ZoneKind::Restroom,
            "kitchen" => ZoneKind::Kitchen,
            "lobby" => ZoneKind::Lobby,
            _ => ZoneKind::Other,
        }
    }
}

/// 用户在画布上绘制的矩形区域，坐标位于画布空间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ZoneKind,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub floor: FloorId,
    #[serde(default)]
    pub is_defined: bool,
}

impl Zone {
    pub fn new(id: impl Into<String>, floor: FloorId, x: f64, y: f64, w: f64, h: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: ZoneKind::default(),
            x,
            y,
            w,
            h,
            floor,
            is_defined: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: ZoneKind) -> Self {
        self.kind = kind;
        self
    }

    /// 负宽高（反向拖拽产生）在这里被规整为正向矩形。
    #[inline]
    pub fn bounds(&self) -> Bounds2D {
        let (x0, x1) = ordered(self.x, self.x + self.w);
        let (y0, y1) = ordered(self.y, self.y + self.h);
        Bounds2D::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[inline]
    pub fn centroid(&self) -> Point2 {
        self.bounds().center()
    }

    #[inline]
    pub fn contains(&self, point: Point2) -> bool {
        self.bounds().contains(point)
    }

    /// 合并局部修改，返回几何或楼层是否发生变化。
    pub fn apply(&mut self, patch: &ZonePatch) -> bool {
        let before = (self.x, self.y, self.w, self.h, self.floor);
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(kind) = &patch.kind {
            self.kind = kind.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.w {
            self.w = w;
        }
        if let Some(h) = patch.h {
            self.h = h;
        }
        if let Some(floor) = patch.floor {
            self.floor = floor;
        }
        if let Some(is_defined) = patch.is_defined {
            self.is_defined = is_defined;
        }
        before != (self.x, self.y, self.w, self.h, self.floor)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// 区域的局部更新，未设置的字段保持原值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ZoneKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<FloorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_defined: Option<bool>,
}

impl ZonePatch {
    pub fn moved_to(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn resized(w: f64, h: f64) -> Self {
        Self {
            w: Some(w),
            h: Some(h),
            ..Self::default()
        }
    }
}

/// 外部设备目录中的条目，本模块只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// 设备在某一楼层画布上的位置，每台设备至多一条。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePosition {
    pub device_id: String,
    pub floor: FloorId,
    pub x: f64,
    pub y: f64,
}

impl DevicePosition {
    #[inline]
    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// 设备目录协作方的只读接口。
pub trait DeviceCatalog {
    fn device(&self, id: &str) -> Option<&Device>;
}

impl DeviceCatalog for HashMap<String, Device> {
    fn device(&self, id: &str) -> Option<&Device> {
        self.get(id)
    }
}

impl DeviceCatalog for [Device] {
    fn device(&self, id: &str) -> Option<&Device> {
        self.iter().find(|device| device.id == id)
    }
}

impl DeviceCatalog for Vec<Device> {
    fn device(&self, id: &str) -> Option<&Device> {
        self.as_slice().device(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Parsed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub floor: FloorId,
    pub file_ref: String,
    pub status: UploadStatus,
}

/// 对外导出的平面状态，由外部负责持久化。邻接关系不在其中。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlanState {
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub device_positions: BTreeMap<String, DevicePosition>,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFile>,
}

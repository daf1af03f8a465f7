use std::collections::{BTreeMap, BTreeSet};

use floorscape_core::geometry::Point2;
use floorscape_core::plan::{DevicePosition, FloorId, FloorPlanState, Zone, ZonePatch};
use tracing::debug;

use crate::adjacency::{AdjacencyIndex, DEFAULT_EPSILON};
use crate::errors::EngineError;

/// 单个楼层的只读视图，`adjacency` 中的下标与 `zones` 顺序一致。
#[derive(Debug, Clone)]
pub struct FloorView<'a> {
    pub floor: FloorId,
    pub zones: Vec<&'a Zone>,
    pub adjacency: &'a AdjacencyIndex,
    pub positions: Vec<&'a DevicePosition>,
}

/// 区域与设备位置的权威模型。每次改动后同步重算受影响楼层的邻接关系。
#[derive(Debug, Clone)]
pub struct ZoneModel {
    zones: Vec<Zone>,
    positions: BTreeMap<String, DevicePosition>,
    adjacency: BTreeMap<FloorId, AdjacencyIndex>,
    epsilon: f64,
    touched: BTreeSet<FloorId>,
    empty_index: AdjacencyIndex,
}

impl Default for ZoneModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneModel {
    pub fn new() -> Self {
        Self::with_epsilon(DEFAULT_EPSILON)
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            zones: Vec::new(),
            positions: BTreeMap::new(),
            adjacency: BTreeMap::new(),
            epsilon,
            touched: BTreeSet::new(),
            empty_index: AdjacencyIndex::default(),
        }
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[inline]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.id == id)
    }

    pub fn zones_on_floor(&self, floor: FloorId) -> impl Iterator<Item = &Zone> + '_ {
        self.zones.iter().filter(move |zone| zone.floor == floor)
    }

    pub fn add_zone(&mut self, zone: Zone) -> Result<(), EngineError> {
        if self.zone(&zone.id).is_some() {
            return Err(EngineError::DuplicateZone(zone.id));
        }
        let floor = zone.floor;
        debug!(zone = %zone.id, %floor, "新增区域");
        self.zones.push(zone);
        self.refresh_floor(floor);
        Ok(())
    }

    /// 局部更新区域。未知 id 视为空操作并返回 `false`。
    pub fn update_zone(&mut self, id: &str, patch: &ZonePatch) -> bool {
        let Some(zone) = self.zones.iter_mut().find(|zone| zone.id == id) else {
            let err = EngineError::unknown_zone(id);
            debug!(error = %err, "忽略对未知区域的更新");
            return false;
        };
        let previous_floor = zone.floor;
        let geometry_changed = zone.apply(patch);
        let current_floor = zone.floor;

        if geometry_changed {
            self.refresh_floor(previous_floor);
            if current_floor != previous_floor {
                self.refresh_floor(current_floor);
            }
        } else {
            // 名称、类型变化仍需刷新场景标签
            self.touched.insert(current_floor);
        }
        true
    }

    pub fn remove_zone(&mut self, id: &str) -> bool {
        let Some(position) = self.zones.iter().position(|zone| zone.id == id) else {
            let err = EngineError::unknown_zone(id);
            debug!(error = %err, "忽略对未知区域的删除");
            return false;
        };
        let removed = self.zones.remove(position);
        self.refresh_floor(removed.floor);
        true
    }

    /// 将设备放入区域：默认放在区域中心，可指定落点。未知区域为空操作。
    pub fn assign_device(&mut self, device_id: &str, zone_id: &str, at: Option<Point2>) -> bool {
        let Some(zone) = self.zone(zone_id) else {
            let err = EngineError::unknown_zone(zone_id);
            debug!(device = device_id, error = %err, "设备指派目标不存在");
            return false;
        };
        let floor = zone.floor;
        let point = at.unwrap_or_else(|| zone.centroid());
        self.move_device(device_id, point.x(), point.y(), floor);
        true
    }

    /// 新建或覆盖设备位置，每台设备只保留一条记录。
    pub fn move_device(&mut self, device_id: &str, x: f64, y: f64, floor: FloorId) {
        let position = DevicePosition {
            device_id: device_id.to_string(),
            floor,
            x,
            y,
        };
        if let Some(previous) = self.positions.insert(device_id.to_string(), position) {
            self.touched.insert(previous.floor);
        }
        self.touched.insert(floor);
    }

    pub fn remove_device(&mut self, device_id: &str) -> bool {
        match self.positions.remove(device_id) {
            Some(previous) => {
                self.touched.insert(previous.floor);
                true
            }
            None => {
                let err = EngineError::unknown_device(device_id);
                debug!(error = %err, "忽略对未放置设备的移除");
                false
            }
        }
    }

    #[inline]
    pub fn device_position(&self, device_id: &str) -> Option<&DevicePosition> {
        self.positions.get(device_id)
    }

    #[inline]
    pub fn device_positions(&self) -> impl Iterator<Item = &DevicePosition> {
        self.positions.values()
    }

    pub fn positions_on_floor(&self, floor: FloorId) -> impl Iterator<Item = &DevicePosition> + '_ {
        self.positions
            .values()
            .filter(move |position| position.floor == floor)
    }

    /// 位于区域包围盒内（含边界）且同楼层的设备。成员关系完全由位置推导。
    pub fn devices_for_zone(&self, zone_id: &str) -> Vec<&DevicePosition> {
        let Some(zone) = self.zone(zone_id) else {
            let err = EngineError::unknown_zone(zone_id);
            debug!(error = %err, "查询未知区域的设备");
            return Vec::new();
        };
        self.positions_on_floor(zone.floor)
            .filter(|position| zone.contains(position.point()))
            .collect()
    }

    /// 拖放命中测试，重叠时后添加的区域在上层。
    pub fn zone_at(&self, floor: FloorId, point: Point2) -> Option<&Zone> {
        self.zones
            .iter()
            .rev()
            .find(|zone| zone.floor == floor && zone.contains(point))
    }

    /// 存在区域或设备的楼层，升序。
    pub fn floors(&self) -> BTreeSet<FloorId> {
        self.zones
            .iter()
            .map(|zone| zone.floor)
            .chain(self.positions.values().map(|position| position.floor))
            .collect()
    }

    pub fn adjacency(&self, floor: FloorId) -> &AdjacencyIndex {
        self.adjacency.get(&floor).unwrap_or(&self.empty_index)
    }

    pub fn floor_view(&self, floor: FloorId) -> FloorView<'_> {
        FloorView {
            floor,
            zones: self.zones_on_floor(floor).collect(),
            adjacency: self.adjacency(floor),
            positions: self.positions_on_floor(floor).collect(),
        }
    }

    /// 自上次调用以来内容发生变化的楼层。
    pub fn take_touched_floors(&mut self) -> BTreeSet<FloorId> {
        std::mem::take(&mut self.touched)
    }

    pub fn export(&self) -> FloorPlanState {
        FloorPlanState {
            zones: self.zones.clone(),
            device_positions: self.positions.clone(),
            uploaded_files: Vec::new(),
        }
    }

    /// 用导出状态整体替换模型。邻接关系总是重新计算。
    pub fn import(&mut self, state: &FloorPlanState) -> Result<(), EngineError> {
        let mut seen = BTreeSet::new();
        for zone in &state.zones {
            if !seen.insert(zone.id.as_str()) {
                return Err(EngineError::DuplicateZone(zone.id.clone()));
            }
        }

        let previous = self.floors();
        self.zones = state.zones.clone();
        self.positions = state
            .device_positions
            .values()
            .map(|position| (position.device_id.clone(), position.clone()))
            .collect();
        self.adjacency.clear();
        for floor in self.floors() {
            self.refresh_floor(floor);
        }
        self.touched.extend(previous);
        Ok(())
    }

    fn refresh_floor(&mut self, floor: FloorId) {
        let index = AdjacencyIndex::recompute(self.zones_on_floor(floor), self.epsilon);
        if index.is_empty() {
            self.adjacency.remove(&floor);
        } else {
            self.adjacency.insert(floor, index);
        }
        self.touched.insert(floor);
    }
}

//! 渲染桥：把会话状态翻译成二维绘制命令和三维场景提交，本身不做任何绘制决策。

use floorscape_core::geometry::{Bounds2D, Point2, Point3};
use floorscape_engine::scene::SceneGraph;
use floorscape_engine::session::EditorSession;
use glam::DVec3;
use serde::Serialize;
use tracing::debug;

/// 提交给二维绘制面的命令，坐标均为画布空间。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RenderCommand {
    Clear,
    /// 底图线段，每 4 个数为一条 `[x1, y1, x2, y2]`。
    Backdrop { segments: Vec<f64> },
    ZoneRect {
        id: String,
        label: String,
        rect: Bounds2D,
        selected: bool,
    },
    /// 拖拽设备时悬停的区域。
    DropTarget { rect: Bounds2D },
    Notice { text: String },
}

pub trait DrawingSurface {
    fn submit(&mut self, commands: &[RenderCommand]);
}

pub trait SceneViewport {
    fn present(&mut self, scene: &SceneGraph, camera: &CameraRig, lights: &[Light]);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraRig {
    pub position: Point3,
    pub target: Point3,
    pub fov_degrees: f64,
}

impl CameraRig {
    /// 以楼层中心为目标的默认斜视机位。
    pub fn looking_at(target: Point3) -> Self {
        let offset = DVec3::new(15.0, 20.0, 15.0);
        Self {
            position: Point3(target.as_vec3() + offset),
            target,
            fov_degrees: 50.0,
        }
    }

    #[inline]
    pub fn direction(&self) -> DVec3 {
        (self.target.as_vec3() - self.position.as_vec3()).normalize_or_zero()
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::looking_at(Point3::new(0.0, 0.0, 0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Light {
    Ambient { intensity: f64 },
    Directional { direction: DVec3, intensity: f64 },
}

impl Light {
    pub fn default_rig() -> Vec<Light> {
        vec![
            Light::Ambient { intensity: 0.6 },
            Light::Directional {
                direction: DVec3::new(-10.0, -20.0, -10.0).normalize(),
                intensity: 0.8,
            },
        ]
    }
}

#[derive(Debug, Clone)]
pub struct RenderBridge {
    lights: Vec<Light>,
}

impl Default for RenderBridge {
    fn default() -> Self {
        Self {
            lights: Light::default_rig(),
        }
    }
}

impl RenderBridge {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// 当前楼层的二维绘制命令。`drop_hint` 为拖拽中的设备位置。
    pub fn commands_2d(
        &self,
        session: &EditorSession,
        drop_hint: Option<Point2>,
    ) -> Vec<RenderCommand> {
        let floor = session.current_floor();
        let model = session.model();
        let selected = session.context().selected_zone.as_deref();

        let mut commands = vec![RenderCommand::Clear];
        if let Some(outline) = session.outline(floor) {
            commands.push(RenderCommand::Backdrop {
                segments: outline.canvas_segments(),
            });
        }
        for zone in model.zones_on_floor(floor) {
            commands.push(RenderCommand::ZoneRect {
                id: zone.id.clone(),
                label: zone.name.clone(),
                rect: zone.bounds(),
                selected: selected == Some(zone.id.as_str()),
            });
        }
        if let Some(zone) = drop_hint.and_then(|point| model.zone_at(floor, point)) {
            commands.push(RenderCommand::DropTarget { rect: zone.bounds() });
        }
        if let Some(text) = session.notice(floor) {
            commands.push(RenderCommand::Notice {
                text: text.to_string(),
            });
        }
        commands
    }

    pub fn push_2d<S>(&self, session: &EditorSession, drop_hint: Option<Point2>, surface: &mut S)
    where
        S: DrawingSurface + ?Sized,
    {
        let commands = self.commands_2d(session, drop_hint);
        debug!(count = commands.len(), "提交二维绘制命令");
        surface.submit(&commands);
    }

    /// 提交当前楼层的场景；尚未重建过的楼层返回 `false`。
    pub fn push_3d<V>(&self, session: &EditorSession, viewport: &mut V) -> bool
    where
        V: SceneViewport + ?Sized,
    {
        let Some(scene) = session.scene(session.current_floor()) else {
            return false;
        };
        let camera = CameraRig::looking_at(Point3::new(0.0, scene.elevation, 0.0));
        viewport.present(scene, &camera, &self.lights);
        true
    }
}

use std::fs;
use std::path::PathBuf;

use floorscape_config::AppConfig;
use floorscape_core::geometry::Bounds2D;
use floorscape_core::plan::FloorId;
use floorscape_engine::command::{CommandBus, CommandContext, CommandRequest};
use floorscape_engine::scene::SceneGraph;
use floorscape_io::FileFormat;
use serde::Serialize;
use tracing::{info, warn};

use crate::bridge::{CameraRig, DrawingSurface, Light, RenderBridge, RenderCommand, SceneViewport};
use crate::errors::FrontendError;
use crate::loader::{PlanSource, load_plan};

/// 一次 CLI 运行的输入。
#[derive(Debug, Clone, Default)]
pub struct CliRequest {
    pub drawing: Option<PathBuf>,
    pub format: Option<FileFormat>,
    pub floor: FloorId,
    pub script: Option<PathBuf>,
    pub json: bool,
}

/// 把二维绘制命令渲染成逐行文本。
#[derive(Debug, Default)]
pub struct TextSurface {
    lines: Vec<String>,
}

impl TextSurface {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl DrawingSurface for TextSurface {
    fn submit(&mut self, commands: &[RenderCommand]) {
        for command in commands {
            let line = match command {
                RenderCommand::Clear => "画布已清空".to_string(),
                RenderCommand::Backdrop { segments } => {
                    format!("底图: {} 条线段", segments.len() / 4)
                }
                RenderCommand::ZoneRect {
                    id,
                    label,
                    rect,
                    selected,
                } => format!(
                    "区域 {id} \"{label}\" {}{}",
                    format_rect(rect),
                    if *selected { " [选中]" } else { "" }
                ),
                RenderCommand::DropTarget { rect } => {
                    format!("放置目标 {}", format_rect(rect))
                }
                RenderCommand::Notice { text } => format!("提示: {text}"),
            };
            self.lines.push(line);
        }
    }
}

/// 三维场景的文本概览。
#[derive(Debug, Default)]
pub struct TextViewport {
    lines: Vec<String>,
}

impl TextViewport {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl SceneViewport for TextViewport {
    fn present(&mut self, scene: &SceneGraph, camera: &CameraRig, lights: &[Light]) {
        self.lines.push(format!(
            "楼层 {} 标高={:.2}: 区域面片 {}, 墙体 {} (外墙 {}), 设备 {}, 轮廓线段 {}",
            scene.floor,
            scene.elevation,
            scene.zone_patches.len(),
            scene.walls.len(),
            scene.perimeter_walls().count(),
            scene.device_markers.len(),
            scene.outline_segments.len()
        ));
        for marker in &scene.device_markers {
            self.lines.push(format!(
                "  - 设备 {} \"{}\" ({:.2}, {:.2}, {:.2}){}",
                marker.device_id,
                marker.label,
                marker.position.x(),
                marker.position.y(),
                marker.position.z(),
                if marker.known { "" } else { " [未登记]" }
            ));
        }
        self.lines.push(format!(
            "相机 ({:.1}, {:.1}, {:.1}) 视角={:.0}°, 光源 {}",
            camera.position.x(),
            camera.position.y(),
            camera.position.z(),
            camera.fov_degrees,
            lights.len()
        ));
    }
}

#[derive(Serialize)]
struct ScenePayload<'a> {
    scene: &'a SceneGraph,
    camera: &'a CameraRig,
    lights: &'a [Light],
}

/// 以 JSON 导出场景、相机与光源。
#[derive(Debug, Default)]
pub struct JsonViewport {
    output: Option<Result<String, serde_json::Error>>,
}

impl JsonViewport {
    pub fn take(&mut self) -> Option<Result<String, serde_json::Error>> {
        self.output.take()
    }
}

impl SceneViewport for JsonViewport {
    fn present(&mut self, scene: &SceneGraph, camera: &CameraRig, lights: &[Light]) {
        let payload = ScenePayload {
            scene,
            camera,
            lights,
        };
        self.output = Some(serde_json::to_string_pretty(&payload));
    }
}

/// 加载图纸、执行编辑脚本并输出当前楼层。
pub fn run(config: &AppConfig, request: &CliRequest) -> Result<String, FrontendError> {
    let loaded = load_plan(
        config,
        request.drawing.as_deref(),
        request.format,
        request.floor,
    )?;
    let catalog = loaded.catalog;
    let mut session = loaded.session;
    session.tick(&catalog);

    let mut responses = Vec::new();
    if let Some(path) = &request.script {
        let script = fs::read_to_string(path).map_err(|source| FrontendError::Script {
            path: path.clone(),
            source,
        })?;
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        for line in script.lines() {
            let Some(command) = CommandRequest::parse_line(line) else {
                continue;
            };
            let response = bus.dispatch(&command, &mut context);
            let message = response.message.unwrap_or_default();
            if response.success {
                responses.push(format!("> {}: {message}", command.name));
            } else {
                warn!(command = %command.name, %message, "脚本命令执行失败");
                responses.push(format!("> {} 失败: {message}", command.name));
            }
        }
        let summary = session.tick(&catalog);
        info!(
            commands = responses.len(),
            rebuilt = summary.rebuilt_floors.len(),
            "脚本执行完毕"
        );
    }

    let bridge = RenderBridge::new();
    if request.json {
        let mut viewport = JsonViewport::default();
        if !bridge.push_3d(&session, &mut viewport) {
            return Err(FrontendError::NoScene(session.current_floor().get()));
        }
        let json = viewport
            .take()
            .ok_or(FrontendError::NoScene(session.current_floor().get()))??;
        return Ok(json);
    }

    let mut out = Vec::new();
    out.push("floorscape 平面预览".to_string());
    match &loaded.source {
        PlanSource::Drawing(path) => out.push(format!("图纸: {}", path.display())),
        PlanSource::Demo => out.push("未指定图纸，使用内置示例布局".to_string()),
    }
    out.extend(responses);

    let mut surface = TextSurface::default();
    bridge.push_2d(&session, None, &mut surface);
    out.extend(surface.lines().iter().cloned());

    let mut viewport = TextViewport::default();
    if bridge.push_3d(&session, &mut viewport) {
        out.extend(viewport.lines().iter().cloned());
    }

    let bus = CommandBus::new();
    let mut commands: Vec<&str> = bus.available_commands().copied().collect();
    commands.sort_unstable();
    out.push(format!("支持的命令: {}", commands.join(", ")));
    Ok(out.join("\n"))
}

fn format_rect(rect: &Bounds2D) -> String {
    format!(
        "({:.1}, {:.1}) {:.1}x{:.1}",
        rect.min_x(),
        rect.min_y(),
        rect.width(),
        rect.height()
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn demo_text_lists_zones_and_scene_summary() {
        let output = run(&AppConfig::default(), &CliRequest::default()).expect("run");
        assert!(output.contains("内置示例布局"));
        assert!(output.contains("区域 hall \"Hall\""));
        assert!(output.contains("底图:"));
        assert!(output.contains("外墙 4"));
        assert!(output.contains("add_zone"));
    }

    #[test]
    fn json_dump_contains_scene_graph() {
        let request = CliRequest {
            json: true,
            ..CliRequest::default()
        };
        let output = run(&AppConfig::default(), &request).expect("run");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["scene"]["zone_patches"].as_array().map(Vec::len), Some(4));
        assert_eq!(value["lights"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn script_commands_apply_before_render() {
        let mut script = tempfile::NamedTempFile::new().expect("script");
        writeln!(script, "# 新增一个储藏间").unwrap();
        writeln!(script, "add_zone store 0 700 100 80 200 Store storage").unwrap();
        writeln!(script, "select_zone store").unwrap();
        writeln!(script, "remove_zone nowhere").unwrap();
        writeln!(script, "bogus").unwrap();

        let request = CliRequest {
            script: Some(script.path().to_path_buf()),
            ..CliRequest::default()
        };
        let output = run(&AppConfig::default(), &request).expect("run");
        assert!(output.contains("> add_zone: 已添加区域 store"));
        assert!(output.contains("区域 store \"Store\""));
        assert!(output.contains("[选中]"));
        assert!(output.contains("> bogus 失败"));
        assert!(output.contains("区域面片 5"));
    }

    #[test]
    fn json_drawing_outline_reaches_scene() {
        let mut drawing = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("drawing");
        write!(
            drawing,
            r#"[{{"type":"LINE","startPoint":[0,0],"endPoint":[100,50]}}]"#
        )
        .unwrap();

        let request = CliRequest {
            drawing: Some(drawing.path().to_path_buf()),
            floor: FloorId(1),
            json: true,
            ..CliRequest::default()
        };
        let output = run(&AppConfig::default(), &request).expect("run");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["scene"]["floor"], 1);
        assert_eq!(value["scene"]["outline_segments"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["scene"]["walls"].as_array().map(Vec::len), Some(0));
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use floorscape_config::AppConfig;
use floorscape_core::plan::{Device, FloorId, Zone, ZoneKind};
use floorscape_core::transform::{CanvasSize, Footprint};
use floorscape_engine::scene::SceneOptions;
use floorscape_engine::session::EditorSession;
use floorscape_engine::tessellate::Tessellator;
use floorscape_engine::zones::ZoneModel;
use floorscape_io::{CadIngestor, CommandConverter, FileFormat};
use tracing::info;

use crate::errors::FrontendError;

/// 底图来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    Drawing(PathBuf),
    Demo,
}

/// 加载完成的会话与设备目录。
pub struct LoadedPlan {
    pub session: EditorSession,
    pub source: PlanSource,
    pub catalog: Vec<Device>,
}

/// 内置示例底图：外墙轮廓、一道内隔墙和一扇门的开启弧线。
const DEMO_OUTLINE: &str = r#"{"entities":[
    {"type":"LWPOLYLINE","closed":true,"vertices":[[0,0],[3000,0],[3000,1800],[0,1800]]},
    {"type":"LINE","start":{"x":0,"y":1200},"end":{"x":3000,"y":1200}},
    {"type":"LINE","start":{"x":1000,"y":0},"end":{"x":1000,"y":1200}},
    {"type":"LINE","start":{"x":2000,"y":0},"end":{"x":2000,"y":1200}},
    {"type":"ARC","center":{"x":1500,"y":1200},"radius":90,"startAngle":3.141592653589793,"endAngle":4.71238898038469}
]}"#;

pub fn scene_options(config: &AppConfig) -> SceneOptions {
    SceneOptions {
        canvas: CanvasSize {
            width: config.canvas.width,
            height: config.canvas.height,
        },
        footprint: Footprint {
            width: config.scene.footprint_width,
            depth: config.scene.footprint_depth,
        },
        floor_height: config.scene.floor_height,
        wall_height: config.scene.wall_height,
        wall_thickness: config.scene.wall_thickness,
        perimeter_padding: config.scene.perimeter_padding,
    }
}

/// 按配置装配摄取器；配置了外部转换程序时才支持 DWG。
pub fn build_ingestor(config: &AppConfig) -> CadIngestor {
    match &config.converter.program {
        Some(program) => {
            info!(program = %program.display(), "启用外部 DWG 转换程序");
            CadIngestor::with_converter(Box::new(CommandConverter::new(
                program.clone(),
                config.converter.args.clone(),
            )))
        }
        None => CadIngestor::new(),
    }
}

pub fn build_session(config: &AppConfig) -> EditorSession {
    EditorSession::new(
        scene_options(config),
        ZoneModel::with_epsilon(config.scene.adjacency_epsilon),
        build_ingestor(config),
    )
    .with_tessellator(Tessellator::new(config.tessellation.arc_segments))
}

/// 加载图纸到指定楼层；未给出路径时构建内置示例布局。
pub fn load_plan(
    config: &AppConfig,
    path: Option<&Path>,
    format: Option<FileFormat>,
    floor: FloorId,
) -> Result<LoadedPlan, FrontendError> {
    let mut session = build_session(config);
    session.select_floor(floor);

    let Some(path) = path else {
        populate_demo(&mut session, floor)?;
        info!(%floor, "已构建内置示例布局");
        return Ok(LoadedPlan {
            session,
            source: PlanSource::Demo,
            catalog: demo_catalog(),
        });
    };

    let format = format
        .or_else(|| FileFormat::from_path(path))
        .ok_or_else(|| FrontendError::UnknownFormat(path.to_path_buf()))?;
    let bytes = fs::read(path).map_err(|source| FrontendError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file_ref = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(path = %path.display(), %floor, format = ?format, "加载图纸");
    session.upload(floor, file_ref, bytes, format);

    Ok(LoadedPlan {
        session,
        source: PlanSource::Drawing(path.to_path_buf()),
        catalog: Vec::new(),
    })
}

fn populate_demo(session: &mut EditorSession, floor: FloorId) -> Result<(), FrontendError> {
    session.upload(
        floor,
        "demo-outline.json",
        DEMO_OUTLINE.as_bytes().to_vec(),
        FileFormat::EntityJson,
    );

    // 画布坐标：一条走廊加三间并排的房间
    let zones = [
        ("office-a", "Office A", ZoneKind::Office, 100.0, 100.0, 200.0, 200.0),
        ("office-b", "Office B", ZoneKind::Office, 300.0, 100.0, 200.0, 200.0),
        ("meeting", "Meeting", ZoneKind::Meeting, 500.0, 100.0, 200.0, 200.0),
        ("hall", "Hall", ZoneKind::Corridor, 100.0, 300.0, 600.0, 100.0),
    ];
    for (id, name, kind, x, y, w, h) in zones {
        session.add_zone(
            Zone::new(id, floor, x, y, w, h)
                .with_name(name)
                .with_kind(kind),
        )?;
    }
    session.assign_device("ap-01", "hall", None);
    session.assign_device("cam-01", "meeting", None);
    Ok(())
}

fn demo_catalog() -> Vec<Device> {
    vec![
        Device {
            id: "ap-01".to_string(),
            name: "Access Point".to_string(),
            kind: "network".to_string(),
        },
        Device {
            id: "cam-01".to_string(),
            name: "Camera".to_string(),
            kind: "camera".to_string(),
        },
    ]
}

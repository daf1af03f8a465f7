//! 编辑会话：把区域模型、底图摄取、场景重建串起来，界面状态通过 `SessionContext` 显式传递。

use std::collections::BTreeMap;

use floorscape_core::geometry::{Bounds2D, Point2, Vector2};
use floorscape_core::plan::{
    DeviceCatalog, FloorId, FloorPlanState, UploadStatus, UploadedFile, Zone, ZonePatch,
};
use floorscape_core::transform::NormalizationTransform;
use floorscape_io::{
    CadIngestor, FileFormat, IngestJob, IngestOutcome, IngestReport, IngestWorker,
};
use tracing::{debug, info, warn};

use crate::bounds::{compute_bounds, normalize};
use crate::errors::EngineError;
use crate::scene::{OutlineOverlay, SceneGraph, SceneOptions, SceneReconstructor};
use crate::scheduler::RebuildScheduler;
use crate::tessellate::{Tessellator, map_segments};
use crate::zones::ZoneModel;

const DEFAULT_ZOOM: f64 = 1.0;
const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 20.0;

/// 二维画布的视图状态（缩放与平移）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    pub pan: Vector2,
}

impl ViewState {
    #[inline]
    fn clamp_zoom(value: f64) -> f64 {
        value.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            pan: Vector2::new(0.0, 0.0),
        }
    }
}

/// 当前楼层、视图与选中区域。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub current_floor: FloorId,
    pub view: ViewState,
    pub selected_zone: Option<String>,
}

impl SessionContext {
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.view.zoom = ViewState::clamp_zoom(zoom);
        }
    }

    pub fn pan(&mut self, delta: Vector2) {
        let pan = self.view.pan;
        self.view.pan = Vector2::new(pan.x() + delta.x(), pan.y() + delta.y());
    }
}

/// 解析成功后的底图：文档空间线段、包围盒与归一化变换。
#[derive(Debug, Clone, PartialEq)]
pub struct FloorOutline {
    pub file_ref: String,
    pub segments: Vec<f64>,
    pub bounds: Bounds2D,
    pub normalization: NormalizationTransform,
    pub skipped: usize,
}

impl FloorOutline {
    /// 画布空间线段，供二维底图使用。
    pub fn canvas_segments(&self) -> Vec<f64> {
        map_segments(&self.segments, &self.normalization)
    }

    fn overlay(&self) -> OutlineOverlay<'_> {
        OutlineOverlay {
            segments: &self.segments,
            normalization: self.normalization,
        }
    }
}

/// 两次 tick 之间发生的事情。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub merged_uploads: usize,
    pub discarded_uploads: usize,
    pub rebuilt_floors: Vec<FloorId>,
}

enum Ingest {
    Background(IngestWorker),
    Inline(CadIngestor),
}

pub struct EditorSession {
    model: ZoneModel,
    context: SessionContext,
    tessellator: Tessellator,
    reconstructor: SceneReconstructor,
    scheduler: RebuildScheduler,
    ingest: Ingest,
    scenes: BTreeMap<FloorId, SceneGraph>,
    outlines: BTreeMap<FloorId, FloorOutline>,
    uploads: BTreeMap<FloorId, UploadedFile>,
    generations: BTreeMap<FloorId, u64>,
    notices: BTreeMap<FloorId, String>,
}

impl EditorSession {
    /// 在当前线程同步解析上传文件。
    pub fn new(options: SceneOptions, model: ZoneModel, ingestor: CadIngestor) -> Self {
        Self::with_ingest(options, model, Ingest::Inline(ingestor))
    }

    /// 上传文件交给后台线程解析，结果在 `tick` 中合并。
    pub fn with_worker(options: SceneOptions, model: ZoneModel, worker: IngestWorker) -> Self {
        Self::with_ingest(options, model, Ingest::Background(worker))
    }

    fn with_ingest(options: SceneOptions, model: ZoneModel, ingest: Ingest) -> Self {
        let mut session = Self {
            model,
            context: SessionContext::default(),
            tessellator: Tessellator::default(),
            reconstructor: SceneReconstructor::new(options),
            scheduler: RebuildScheduler::new(),
            ingest,
            scenes: BTreeMap::new(),
            outlines: BTreeMap::new(),
            uploads: BTreeMap::new(),
            generations: BTreeMap::new(),
            notices: BTreeMap::new(),
        };
        session.scheduler.mark_dirty(session.context.current_floor);
        session
    }

    pub fn with_tessellator(mut self, tessellator: Tessellator) -> Self {
        self.tessellator = tessellator;
        self
    }

    #[inline]
    pub fn model(&self) -> &ZoneModel {
        &self.model
    }

    #[inline]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    #[inline]
    pub fn options(&self) -> &SceneOptions {
        self.reconstructor.options()
    }

    #[inline]
    pub fn current_floor(&self) -> FloorId {
        self.context.current_floor
    }

    pub fn add_zone(&mut self, zone: Zone) -> Result<(), EngineError> {
        self.model.add_zone(zone)?;
        self.absorb_model_changes();
        Ok(())
    }

    pub fn update_zone(&mut self, id: &str, patch: &ZonePatch) -> bool {
        let changed = self.model.update_zone(id, patch);
        self.absorb_model_changes();
        changed
    }

    pub fn remove_zone(&mut self, id: &str) -> bool {
        let removed = self.model.remove_zone(id);
        if removed && self.context.selected_zone.as_deref() == Some(id) {
            self.context.selected_zone = None;
        }
        self.absorb_model_changes();
        removed
    }

    pub fn assign_device(&mut self, device_id: &str, zone_id: &str, at: Option<Point2>) -> bool {
        let assigned = self.model.assign_device(device_id, zone_id, at);
        self.absorb_model_changes();
        assigned
    }

    pub fn move_device(&mut self, device_id: &str, x: f64, y: f64, floor: FloorId) {
        self.model.move_device(device_id, x, y, floor);
        self.absorb_model_changes();
    }

    pub fn remove_device(&mut self, device_id: &str) -> bool {
        let removed = self.model.remove_device(device_id);
        self.absorb_model_changes();
        removed
    }

    /// 选中区域；未知或不在当前楼层的区域会清空选择。
    pub fn select_zone(&mut self, id: Option<&str>) -> bool {
        let floor = self.context.current_floor;
        let selected = id
            .and_then(|id| self.model.zone(id))
            .filter(|zone| zone.floor == floor)
            .map(|zone| zone.id.clone());
        let found = selected.is_some();
        if let (Some(id), false) = (id, found) {
            let err = EngineError::unknown_zone(id);
            debug!(error = %err, "选中目标不存在");
        }
        self.context.selected_zone = selected;
        found
    }

    /// 切换楼层。仍在解析中的上传会被作废，迟到的结果不会覆盖新楼层。
    pub fn select_floor(&mut self, floor: FloorId) {
        let previous = self.context.current_floor;
        if previous == floor {
            return;
        }
        let pending = self
            .uploads
            .get(&previous)
            .map(|upload| upload.status == UploadStatus::Pending)
            .unwrap_or(false);
        if pending {
            self.bump_generation(previous);
            if let Some(upload) = self.uploads.get_mut(&previous) {
                upload.status = UploadStatus::Failed;
            }
            debug!(floor = %previous, "离开楼层，作废未完成的底图解析");
        }
        self.context.current_floor = floor;
        self.context.selected_zone = None;
        if !self.scenes.contains_key(&floor) {
            self.scheduler.mark_dirty(floor);
        }
    }

    /// 提交底图。新的上传会作废同楼层尚未完成的解析。
    pub fn upload(
        &mut self,
        floor: FloorId,
        file_ref: impl Into<String>,
        bytes: Vec<u8>,
        format: FileFormat,
    ) {
        let file_ref = file_ref.into();
        let generation = self.bump_generation(floor);
        self.outlines.remove(&floor);
        self.notices.remove(&floor);
        self.uploads.insert(
            floor,
            UploadedFile {
                floor,
                file_ref: file_ref.clone(),
                status: UploadStatus::Pending,
            },
        );
        self.scheduler.mark_dirty(floor);
        info!(%floor, file = %file_ref, generation, format = ?format, "提交底图解析");

        let job = IngestJob {
            floor,
            generation,
            file_ref,
            bytes,
            format,
        };
        match &mut self.ingest {
            Ingest::Background(worker) => {
                if !worker.submit(job) {
                    warn!(%floor, "后台解析线程不可用");
                    self.fail_upload(floor, "后台解析不可用".to_string());
                }
            }
            Ingest::Inline(ingestor) => {
                let result = ingestor.ingest(&job.bytes, job.format);
                let outcome = IngestOutcome {
                    floor: job.floor,
                    generation: job.generation,
                    file_ref: job.file_ref,
                    result,
                };
                self.merge_outcome(outcome);
            }
        }
    }

    /// 合并解析结果。没有对应上传记录或代次过期的结果被丢弃并返回 `false`。
    fn merge_outcome(&mut self, outcome: IngestOutcome) -> bool {
        if !self.uploads.contains_key(&outcome.floor) {
            debug!(floor = %outcome.floor, file = %outcome.file_ref, "丢弃无上传记录的解析结果");
            return false;
        }
        let current = self.generations.get(&outcome.floor).copied().unwrap_or(0);
        if outcome.generation != current {
            debug!(
                floor = %outcome.floor,
                generation = outcome.generation,
                current,
                "丢弃过期的底图解析结果"
            );
            return false;
        }

        match outcome.result {
            Ok(report) => {
                let outline = self.build_outline(&outcome.file_ref, &report);
                info!(
                    floor = %outcome.floor,
                    file = %outcome.file_ref,
                    segments = outline.segments.len() / 4,
                    skipped = outline.skipped,
                    "底图已就绪"
                );
                self.outlines.insert(outcome.floor, outline);
                self.notices.remove(&outcome.floor);
                self.set_upload_status(outcome.floor, UploadStatus::Parsed);
                self.scheduler.mark_dirty(outcome.floor);
            }
            Err(err) => {
                warn!(floor = %outcome.floor, file = %outcome.file_ref, error = %err, "底图不可用");
                self.fail_upload(outcome.floor, err.notice());
            }
        }
        true
    }

    fn build_outline(&self, file_ref: &str, report: &IngestReport) -> FloorOutline {
        let bounds = compute_bounds(report.document.visible_entities());
        FloorOutline {
            file_ref: file_ref.to_string(),
            segments: self.tessellator.tessellate_document(&report.document),
            bounds,
            normalization: normalize(&bounds, self.options().canvas),
            skipped: report.skipped.len(),
        }
    }

    fn fail_upload(&mut self, floor: FloorId, notice: String) {
        self.outlines.remove(&floor);
        self.set_upload_status(floor, UploadStatus::Failed);
        self.notices.insert(floor, notice);
        self.scheduler.mark_dirty(floor);
    }

    fn set_upload_status(&mut self, floor: FloorId, status: UploadStatus) {
        if let Some(upload) = self.uploads.get_mut(&floor) {
            upload.status = status;
        }
    }

    fn bump_generation(&mut self, floor: FloorId) -> u64 {
        let generation = self.generations.entry(floor).or_insert(0);
        *generation += 1;
        *generation
    }

    #[inline]
    pub fn generation(&self, floor: FloorId) -> u64 {
        self.generations.get(&floor).copied().unwrap_or(0)
    }

    fn absorb_model_changes(&mut self) {
        let touched = self.model.take_touched_floors();
        self.scheduler.mark_all(touched);
    }

    /// 收取后台结果并重建所有脏楼层，每层至多一次。
    pub fn tick<C>(&mut self, catalog: &C) -> TickSummary
    where
        C: DeviceCatalog + Sync + ?Sized,
    {
        let mut summary = TickSummary::default();
        let outcomes = match &self.ingest {
            Ingest::Background(worker) => worker.drain(),
            Ingest::Inline(_) => Vec::new(),
        };
        for outcome in outcomes {
            if self.merge_outcome(outcome) {
                summary.merged_uploads += 1;
            } else {
                summary.discarded_uploads += 1;
            }
        }
        self.absorb_model_changes();

        let model = &self.model;
        let outlines = &self.outlines;
        let reconstructor = &self.reconstructor;
        let rebuilt = self.scheduler.run(|floor| {
            let view = model.floor_view(floor);
            let overlay = outlines.get(&floor).map(FloorOutline::overlay);
            reconstructor.build(&view, catalog, overlay.as_ref())
        });
        for (floor, scene) in rebuilt {
            summary.rebuilt_floors.push(floor);
            self.scenes.insert(floor, scene);
        }
        if !summary.rebuilt_floors.is_empty() {
            debug!(floors = ?summary.rebuilt_floors, "场景已更新");
        }
        summary
    }

    #[inline]
    pub fn scene(&self, floor: FloorId) -> Option<&SceneGraph> {
        self.scenes.get(&floor)
    }

    #[inline]
    pub fn outline(&self, floor: FloorId) -> Option<&FloorOutline> {
        self.outlines.get(&floor)
    }

    #[inline]
    pub fn upload_state(&self, floor: FloorId) -> Option<&UploadedFile> {
        self.uploads.get(&floor)
    }

    /// 某楼层底图不可用时的提示，重新上传或解析成功后清除。
    #[inline]
    pub fn notice(&self, floor: FloorId) -> Option<&str> {
        self.notices.get(&floor).map(String::as_str)
    }

    pub fn export(&self) -> FloorPlanState {
        let mut state = self.model.export();
        state.uploaded_files = self.uploads.values().cloned().collect();
        state
    }

    /// 恢复导出状态。底图字节不在状态内，已恢复楼层的轮廓保持不可用直到重新上传；
    /// 导出时仍在解析的上传没有对应任务，恢复为失败。
    pub fn import(&mut self, state: &FloorPlanState) -> Result<(), EngineError> {
        self.model.import(state)?;
        self.uploads = state
            .uploaded_files
            .iter()
            .map(|upload| {
                let mut upload = upload.clone();
                if upload.status == UploadStatus::Pending {
                    upload.status = UploadStatus::Failed;
                }
                (upload.floor, upload)
            })
            .collect();
        self.outlines.clear();
        self.notices.clear();
        self.scenes.clear();
        self.context.selected_zone = None;
        self.absorb_model_changes();
        self.scheduler.mark_dirty(self.context.current_floor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use floorscape_core::plan::Device;

    use super::*;

    const PLAN: &[u8] = br#"{"entities":[
        {"type":"LWPOLYLINE","closed":true,"vertices":[[0,0],[1000,0],[1000,600],[0,600]]},
        {"type":"CIRCLE","center":{"x":500,"y":300},"radius":50}
    ]}"#;

    fn session() -> EditorSession {
        EditorSession::new(SceneOptions::default(), ZoneModel::new(), CadIngestor::new())
    }

    fn no_devices() -> Vec<Device> {
        Vec::new()
    }

    #[test]
    fn edits_between_ticks_rebuild_once() {
        let mut session = session();
        session
            .add_zone(Zone::new("a", FloorId(0), 0.0, 0.0, 100.0, 100.0))
            .expect("a");
        session.update_zone("a", &ZonePatch::moved_to(10.0, 10.0));
        session.update_zone("a", &ZonePatch::moved_to(20.0, 20.0));

        let summary = session.tick(&no_devices());
        assert_eq!(summary.rebuilt_floors, vec![FloorId(0)]);
        let scene = session.scene(FloorId(0)).expect("scene");
        assert_eq!(scene.zone_patches.len(), 1);

        assert!(session.tick(&no_devices()).rebuilt_floors.is_empty());
    }

    #[test]
    fn inline_upload_produces_outline() {
        let mut session = session();
        session.upload(FloorId(0), "plan.json", PLAN.to_vec(), FileFormat::EntityJson);
        session.tick(&no_devices());

        let upload = session.upload_state(FloorId(0)).expect("upload");
        assert_eq!(upload.status, UploadStatus::Parsed);
        let outline = session.outline(FloorId(0)).expect("outline");
        assert_eq!(outline.bounds.width(), 1000.0);
        let scene = session.scene(FloorId(0)).expect("scene");
        assert!(!scene.outline_segments.is_empty());
    }

    #[test]
    fn failed_upload_degrades_with_notice() {
        let mut session = session();
        session.upload(FloorId(0), "plan.dwg", b"AC1032".to_vec(), FileFormat::Dwg);
        session.tick(&no_devices());

        assert_eq!(
            session.upload_state(FloorId(0)).map(|upload| upload.status),
            Some(UploadStatus::Failed)
        );
        assert!(session.notice(FloorId(0)).is_some());
        let scene = session.scene(FloorId(0)).expect("scene still produced");
        assert!(scene.outline_segments.is_empty());
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut session = session();
        session.upload(FloorId(1), "old.json", b"[]".to_vec(), FileFormat::EntityJson);
        session.upload(FloorId(1), "new.json", PLAN.to_vec(), FileFormat::EntityJson);
        assert_eq!(session.generation(FloorId(1)), 2);

        let late = IngestOutcome {
            floor: FloorId(1),
            generation: 1,
            file_ref: "old.json".to_string(),
            result: Ok(IngestReport {
                document: Default::default(),
                skipped: Vec::new(),
                fingerprint: String::new(),
                format: FileFormat::EntityJson,
            }),
        };
        assert!(!session.merge_outcome(late));
        assert_eq!(
            session.outline(FloorId(1)).map(|outline| outline.file_ref.as_str()),
            Some("new.json")
        );
    }

    #[test]
    fn zoom_is_clamped() {
        let mut session = session();
        session.context_mut().set_zoom(1000.0);
        assert_eq!(session.context().view.zoom, MAX_ZOOM);
        session.context_mut().set_zoom(f64::NAN);
        assert_eq!(session.context().view.zoom, MAX_ZOOM);
        session.context_mut().set_zoom(0.0);
        assert_eq!(session.context().view.zoom, MIN_ZOOM);
    }

    #[test]
    fn export_includes_uploaded_files() {
        let mut session = session();
        session
            .add_zone(Zone::new("a", FloorId(0), 0.0, 0.0, 10.0, 10.0))
            .expect("a");
        session.upload(FloorId(0), "plan.json", PLAN.to_vec(), FileFormat::EntityJson);
        let state = session.export();
        assert_eq!(state.zones.len(), 1);
        assert_eq!(state.uploaded_files.len(), 1);

        let mut restored = super::EditorSession::new(
            SceneOptions::default(),
            ZoneModel::new(),
            CadIngestor::new(),
        );
        restored.import(&state).expect("import");
        assert_eq!(restored.export(), state);
    }

    /// 后台解析是异步的，反复 tick 直到条件满足或超时。
    fn tick_until<F>(session: &mut EditorSession, done: F) -> TickSummary
    where
        F: Fn(&TickSummary) -> bool,
    {
        let mut total = TickSummary::default();
        for _ in 0..500 {
            let summary = session.tick(&no_devices());
            total.merged_uploads += summary.merged_uploads;
            total.discarded_uploads += summary.discarded_uploads;
            total.rebuilt_floors.extend(summary.rebuilt_floors);
            if done(&total) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        total
    }

    fn worker_session() -> EditorSession {
        let worker = IngestWorker::spawn(CadIngestor::new()).expect("spawn worker");
        EditorSession::with_worker(SceneOptions::default(), ZoneModel::new(), worker)
    }

    #[test]
    fn notices_are_per_floor_and_cleared_by_recovery() {
        let mut session = session();
        session.upload(FloorId(0), "a.dwg", b"AC1032".to_vec(), FileFormat::Dwg);
        assert!(session.notice(FloorId(0)).is_some());

        session.select_floor(FloorId(3));
        assert_eq!(session.notice(FloorId(3)), None);

        session.upload(FloorId(0), "a.json", PLAN.to_vec(), FileFormat::EntityJson);
        session.tick(&no_devices());
        assert_eq!(
            session.upload_state(FloorId(0)).map(|upload| upload.status),
            Some(UploadStatus::Parsed)
        );
        assert!(session.outline(FloorId(0)).is_some());
        assert_eq!(session.notice(FloorId(0)), None);
    }

    #[test]
    fn background_parse_is_merged_on_tick() {
        let mut session = worker_session();
        session.upload(FloorId(0), "plan.json", PLAN.to_vec(), FileFormat::EntityJson);
        assert_eq!(
            session.upload_state(FloorId(0)).map(|upload| upload.status),
            Some(UploadStatus::Pending)
        );

        let summary = tick_until(&mut session, |total| total.merged_uploads > 0);
        assert_eq!(summary.merged_uploads, 1);
        assert_eq!(summary.discarded_uploads, 0);
        assert!(session.outline(FloorId(0)).is_some());
        let scene = session.scene(FloorId(0)).expect("scene");
        assert!(!scene.outline_segments.is_empty());
    }

    #[test]
    fn navigating_away_discards_background_parse() {
        let mut session = worker_session();
        session.upload(FloorId(0), "plan.json", PLAN.to_vec(), FileFormat::EntityJson);
        session.select_floor(FloorId(1));

        let summary = tick_until(&mut session, |total| total.discarded_uploads > 0);
        assert_eq!(summary.discarded_uploads, 1);
        assert_eq!(summary.merged_uploads, 0);
        assert_eq!(
            session.upload_state(FloorId(0)).map(|upload| upload.status),
            Some(UploadStatus::Failed)
        );
        assert!(session.outline(FloorId(0)).is_none());
    }

    #[test]
    fn outcome_without_upload_record_is_rejected() {
        let mut session = session();
        let ghost = IngestOutcome {
            floor: FloorId(9),
            generation: 0,
            file_ref: "ghost.json".to_string(),
            result: Ok(IngestReport {
                document: Default::default(),
                skipped: Vec::new(),
                fingerprint: String::new(),
                format: FileFormat::EntityJson,
            }),
        };
        assert!(!session.merge_outcome(ghost));
        assert!(session.outline(FloorId(9)).is_none());
        assert!(session.upload_state(FloorId(9)).is_none());
    }

    #[test]
    fn import_fails_uploads_that_were_still_pending() {
        let state = FloorPlanState {
            uploaded_files: vec![
                UploadedFile {
                    floor: FloorId(0),
                    file_ref: "done.dxf".to_string(),
                    status: UploadStatus::Parsed,
                },
                UploadedFile {
                    floor: FloorId(1),
                    file_ref: "half.dxf".to_string(),
                    status: UploadStatus::Pending,
                },
            ],
            ..FloorPlanState::default()
        };
        let mut session = session();
        session.import(&state).expect("import");
        assert_eq!(
            session.upload_state(FloorId(0)).map(|upload| upload.status),
            Some(UploadStatus::Parsed)
        );
        assert_eq!(
            session.upload_state(FloorId(1)).map(|upload| upload.status),
            Some(UploadStatus::Failed)
        );
    }
}

//! Takeoff session
//!
//! Owns the committed annotations, the scale registry and at most one armed
//! drawing tool. Tool drafts become annotations here: the session assigns
//! ids, item label and color, count numbers and stroke defaults, and checks
//! the geometry invariants before storing anything.

use crate::annotation::{
    Annotation, AnnotationError, AnnotationId, AnnotationStore, CountMarker, PolygonAnnotation,
    PolylineAnnotation, Scaled,
};
use crate::config::{ConfigError, TakeoffConfig, TakeoffItemConfig};
use crate::coordinates::{find_page, to_scaled, ViewerContext, ViewportRect};
use crate::export::TakeoffExport;
use crate::measurement::{self, Measurement};
use crate::scale::{ScaleError, ScalePreset, ScaleRegistry};
use crate::summary::{self, MeasurementSummary};
use crate::tools::{self, Draft, DrawingTool, Key, PointerPress, ToolOutput, ToolState};

/// Selection tolerance around annotation edges, in viewport pixels
const SELECT_TOLERANCE_PX: f64 = 5.0;

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown takeoff item: {0}")]
    UnknownItem(String),

    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),

    #[error("refusing invalid annotation: {0}")]
    Invariant(#[from] AnnotationError),

    #[error(transparent)]
    Scale(#[from] ScaleError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Outcome of feeding an input event to the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionEvent {
    #[default]
    None,
    /// A new annotation was stored
    Committed(AnnotationId),
    /// The armed tool was cancelled and released
    Cancelled,
}

struct ActiveTool {
    item_id: String,
    tool: Box<dyn DrawingTool>,
}

/// A takeoff over one PDF document
pub struct TakeoffSession {
    config: TakeoffConfig,
    scales: ScaleRegistry,
    annotations: AnnotationStore,
    active: Option<ActiveTool>,
    pdf_name: Option<String>,
}

impl TakeoffSession {
    /// Start an empty session from a validated configuration
    pub fn new(config: TakeoffConfig) -> SessionResult<Self> {
        config.validate()?;
        let scales = config.scale_registry()?;
        Ok(Self {
            config,
            scales,
            annotations: AnnotationStore::new(),
            active: None,
            pdf_name: None,
        })
    }

    pub fn with_pdf_name(mut self, pdf_name: impl Into<String>) -> Self {
        self.pdf_name = Some(pdf_name.into());
        self
    }

    pub fn config(&self) -> &TakeoffConfig {
        &self.config
    }

    pub fn scales(&self) -> &ScaleRegistry {
        &self.scales
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.annotations.all()
    }

    pub fn annotation(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    // Tool arming

    /// Arm the drawing tool for a catalog item, cancelling any armed tool first
    pub fn arm(&mut self, item_id: &str) -> SessionResult<()> {
        let item = self
            .config
            .item(item_id)
            .ok_or_else(|| SessionError::UnknownItem(item_id.to_owned()))?;
        let kind = item.measurement.tool_kind();

        self.disarm();

        let mut tool = tools::tool_for(kind, self.config.marker_size);
        tool.activate();
        log::debug!("armed {kind} tool for item {item_id}");
        self.active = Some(ActiveTool {
            item_id: item_id.to_owned(),
            tool,
        });
        Ok(())
    }

    /// Release the armed tool, cancelling its draft
    pub fn disarm(&mut self) -> SessionEvent {
        let Some(mut active) = self.active.take() else {
            return SessionEvent::None;
        };
        log::debug!("disarmed {} tool", active.tool.kind());
        match active.tool.cancel() {
            ToolOutput::Cancel => SessionEvent::Cancelled,
            _ => SessionEvent::None,
        }
    }

    pub fn armed_item(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.item_id.as_str())
    }

    pub fn tool_state(&self) -> ToolState {
        self.active
            .as_ref()
            .map_or(ToolState::Idle, |a| a.tool.state())
    }

    /// Points of the draft in progress
    pub fn draft_points(&self) -> &[Scaled] {
        self.active
            .as_ref()
            .map(|a| a.tool.points())
            .unwrap_or(&[])
    }

    pub fn preview_point(&self) -> Option<&Scaled> {
        self.active.as_ref().and_then(|a| a.tool.preview_point())
    }

    // Input events

    pub fn press(
        &mut self,
        press: PointerPress,
        viewer: &dyn ViewerContext,
    ) -> SessionResult<SessionEvent> {
        let Some(active) = self.active.as_mut() else {
            log::trace!("press with no armed tool");
            return Ok(SessionEvent::None);
        };
        let output = active.tool.handle_press(press, viewer);
        self.apply(output)
    }

    pub fn move_to(&mut self, client_x: f64, client_y: f64, viewer: &dyn ViewerContext) {
        if let Some(active) = self.active.as_mut() {
            active.tool.handle_move(client_x, client_y, viewer);
        }
    }

    pub fn key(&mut self, key: Key) -> SessionResult<SessionEvent> {
        let Some(active) = self.active.as_mut() else {
            return Ok(SessionEvent::None);
        };
        let output = active.tool.handle_key(key);
        self.apply(output)
    }

    /// Finish the armed tool's draft
    pub fn finish(&mut self) -> SessionResult<SessionEvent> {
        let Some(active) = self.active.as_mut() else {
            return Ok(SessionEvent::None);
        };
        let output = active.tool.finish();
        self.apply(output)
    }

    /// Cancel the armed tool's interaction
    pub fn cancel(&mut self) -> SessionEvent {
        self.disarm()
    }

    fn apply(&mut self, output: ToolOutput) -> SessionResult<SessionEvent> {
        match output {
            ToolOutput::None => Ok(SessionEvent::None),
            ToolOutput::Cancel => {
                if let Some(active) = self.active.take() {
                    log::debug!("{} tool cancelled", active.tool.kind());
                }
                Ok(SessionEvent::Cancelled)
            }
            ToolOutput::Commit(draft) => {
                let result = self.commit(draft);
                self.after_commit();
                result.map(SessionEvent::Committed)
            }
        }
    }

    fn after_commit(&mut self) {
        if self.config.keep_tool_armed {
            if let Some(active) = self.active.as_mut() {
                active.tool.activate();
            }
        } else {
            self.active = None;
        }
    }

    fn commit(&mut self, draft: Draft) -> SessionResult<AnnotationId> {
        let item_id = self
            .active
            .as_ref()
            .map(|a| a.item_id.clone())
            .ok_or_else(|| SessionError::UnknownItem(String::new()))?;
        let item = self
            .config
            .item(&item_id)
            .cloned()
            .ok_or(SessionError::UnknownItem(item_id))?;

        let mut annotation = self.build_annotation(draft, &item);
        if let Err(e) = annotation.validate() {
            log::error!("refusing {} annotation for item {}: {e}", annotation.kind(), item.id);
            return Err(e.into());
        }

        if let Annotation::Count(marker) = &mut annotation {
            marker.number = self.annotations.take_number(&item.id).inspect_err(|e| {
                log::error!("refusing count marker for item {}: {e}", item.id);
            })?;
        }

        let id = annotation.id().clone();
        let page_number = annotation.page_number();
        self.annotations.add(annotation)?;
        log::debug!("committed {} for item {} on page {}", id, item.id, page_number);
        Ok(id)
    }

    fn build_annotation(&self, draft: Draft, item: &TakeoffItemConfig) -> Annotation {
        let id = AnnotationId::generate(draft.kind());
        let item_id = item.id.clone();
        let label = item.label.clone();
        let color = item.color;

        match draft {
            Draft::Count { position } => Annotation::Count(CountMarker {
                id,
                position,
                item_id,
                label,
                color,
                number: 0,
            }),
            Draft::Polyline { points } => Annotation::Polyline(PolylineAnnotation {
                id,
                points,
                item_id,
                label,
                color,
                stroke_width: self.config.default_stroke_width,
            }),
            Draft::Polygon { points } => Annotation::Polygon(PolygonAnnotation {
                id,
                points,
                item_id,
                label,
                color,
                stroke_width: self.config.polygon_stroke_width,
                fill_opacity: self.config.default_fill_opacity,
            }),
        }
    }

    // Annotation operations

    pub fn delete(&mut self, id: &AnnotationId) -> SessionResult<Annotation> {
        let removed = self
            .annotations
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        log::debug!("deleted {id}");
        Ok(removed)
    }

    /// Topmost annotation under a client point
    pub fn annotation_at(
        &self,
        client_x: f64,
        client_y: f64,
        viewer: &dyn ViewerContext,
    ) -> Option<&Annotation> {
        let hit = find_page(viewer, client_x, client_y)?;
        let (x, y) = hit.local(client_x, client_y);
        let viewport = &hit.view.viewport;
        let point = to_scaled(&ViewportRect::point(x, y, hit.page_number), viewport);
        let tolerance = SELECT_TOLERANCE_PX / viewport.scale;

        self.annotations
            .hit_test(hit.page_number, point.x(), point.y(), tolerance)
            .into_iter()
            .next()
    }

    /// Measurement of an annotation under its page's active scale
    pub fn measurement_of(&self, id: &AnnotationId) -> Option<Measurement> {
        let annotation = self.annotations.get(id)?;
        let scale = self.scales.resolve(annotation.page_number());
        Some(measurement::measurement_of(annotation, scale))
    }

    // Scales

    pub fn set_page_scale(&mut self, page_number: u32, id: &str) -> SessionResult<()> {
        Ok(self.scales.set_page_scale(page_number, id)?)
    }

    /// Calibrate a page from two scaled points a known distance apart
    pub fn calibrate(&mut self, p1: &Scaled, p2: &Scaled, real_feet: f64) -> SessionResult<ScalePreset> {
        Ok(self.scales.calibrate(p1, p2, real_feet)?.clone())
    }

    // Summary and export

    /// Per-item totals under the page 1 scale, as exported
    pub fn summary(&self) -> Vec<MeasurementSummary> {
        summary::summarize(self.annotations.all(), self.scales.resolve(1), &self.config.items)
    }

    /// Per-item totals measuring each annotation under its own page's scale
    pub fn summary_by_page_scale(&self) -> Vec<MeasurementSummary> {
        summary::summarize_by_page_scale(self.annotations.all(), &self.scales, &self.config.items)
    }

    pub fn export(&self) -> TakeoffExport {
        TakeoffExport::build(
            self.annotations.all(),
            &self.scales,
            &self.config.items,
            self.pdf_name.as_deref(),
        )
    }

    /// Replace the session contents with an imported export
    ///
    /// Annotations that break a geometry invariant are skipped with a
    /// warning. Returns the number of annotations loaded.
    pub fn import(&mut self, export: TakeoffExport) -> usize {
        self.disarm();
        self.annotations.clear();
        self.scales.load_page_scales(export.page_scales);
        if export.pdf_name.is_some() {
            self.pdf_name = export.pdf_name;
        }

        let total = export.annotations.len();
        for annotation in export.annotations {
            let id = annotation.id().clone();
            if let Err(e) = annotation.validate().and_then(|()| self.annotations.add(annotation)) {
                log::warn!("skipping imported annotation {id}: {e}");
            }
        }

        let loaded = self.annotations.len();
        log::debug!("imported {loaded} of {total} annotations");
        loaded
    }

    /// Discard every annotation and release the armed tool
    pub fn clear(&mut self) {
        self.disarm();
        self.annotations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Color;
    use crate::config::MeasurementType;
    use crate::coordinates::{PageViewport, StaticViewer};
    use std::time::Duration;

    fn config() -> TakeoffConfig {
        TakeoffConfig::default().with_items(vec![
            TakeoffItemConfig::new("inlet", "Curb Inlet", Color::COUNT_GREEN, MeasurementType::Count),
            TakeoffItemConfig::new("manhole", "Manhole", Color::rgb(0, 0, 255), MeasurementType::Count),
            TakeoffItemConfig::new("fence", "Silt Fence", Color::POLYLINE_RED, MeasurementType::Linear),
            TakeoffItemConfig::new("sod", "Sod", Color::POLYGON_VIOLET, MeasurementType::Area),
        ])
    }

    fn session() -> TakeoffSession {
        TakeoffSession::new(config()).unwrap()
    }

    fn viewer() -> StaticViewer {
        StaticViewer::stacked(2, PageViewport::new(612.0, 792.0, 1.0), 10.0)
    }

    fn press(x: f64, y: f64, ms: u64) -> PointerPress {
        PointerPress::new(x, y, Duration::from_millis(ms))
    }

    fn committed(event: SessionResult<SessionEvent>) -> AnnotationId {
        match event {
            Ok(SessionEvent::Committed(id)) => id,
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut bad = config();
        bad.scale_presets.clear();
        assert!(matches!(TakeoffSession::new(bad), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_arm_unknown_item() {
        let mut session = session();
        assert!(matches!(session.arm("nope"), Err(SessionError::UnknownItem(_))));
        assert_eq!(session.armed_item(), None);
    }

    #[test]
    fn test_arming_cancels_previous_tool() {
        let viewer = viewer();
        let mut session = session();
        session.arm("fence").unwrap();
        session.press(press(10.0, 10.0, 0), &viewer).unwrap();
        assert_eq!(session.draft_points().len(), 1);

        session.arm("sod").unwrap();
        assert_eq!(session.armed_item(), Some("sod"));
        assert_eq!(session.tool_state(), ToolState::Armed);
        assert!(session.draft_points().is_empty());
        assert!(session.annotations().is_empty());
    }

    #[test]
    fn test_count_numbers_increment_per_item() {
        let viewer = viewer();
        let mut session = session();

        session.arm("inlet").unwrap();
        let a = committed(session.press(press(100.0, 100.0, 0), &viewer));
        let b = committed(session.press(press(200.0, 100.0, 1000), &viewer));
        session.arm("manhole").unwrap();
        let c = committed(session.press(press(300.0, 100.0, 2000), &viewer));

        let number = |id: &AnnotationId| match session.annotation(id) {
            Some(Annotation::Count(m)) => m.number,
            other => panic!("expected count marker, got {other:?}"),
        };
        assert_eq!(number(&a), 1);
        assert_eq!(number(&b), 2);
        assert_eq!(number(&c), 1);
        assert!(a.as_str().starts_with("count-"));
    }

    #[test]
    fn test_commit_applies_item_and_defaults() {
        let viewer = viewer();
        let mut session = session();
        session.arm("fence").unwrap();
        session.press(press(0.0, 0.0, 0), &viewer).unwrap();
        session.press(press(72.0, 0.0, 1000), &viewer).unwrap();
        let id = committed(session.finish());

        let Some(Annotation::Polyline(line)) = session.annotation(&id) else {
            panic!("expected polyline");
        };
        assert_eq!(line.label, "Silt Fence");
        assert_eq!(line.color, Color::POLYLINE_RED);
        assert_eq!(line.stroke_width, 3.0);

        let measurement = session.measurement_of(&id).unwrap();
        assert_eq!(measurement.formatted, "20 LF");
        // Tool stays armed for the next run
        assert_eq!(session.tool_state(), ToolState::Armed);
        assert_eq!(session.armed_item(), Some("fence"));
    }

    #[test]
    fn test_tool_released_when_not_kept_armed() {
        let viewer = viewer();
        let mut config = config();
        config.keep_tool_armed = false;
        let mut session = TakeoffSession::new(config).unwrap();

        session.arm("inlet").unwrap();
        committed(session.press(press(100.0, 100.0, 0), &viewer));
        assert_eq!(session.armed_item(), None);
        assert_eq!(session.press(press(100.0, 100.0, 500), &viewer).unwrap(), SessionEvent::None);
        assert_eq!(session.annotations().len(), 1);
    }

    #[test]
    fn test_polygon_two_points_enter_creates_nothing() {
        let viewer = viewer();
        let mut session = session();
        session.arm("sod").unwrap();
        session.press(press(100.0, 100.0, 0), &viewer).unwrap();
        session.press(press(200.0, 100.0, 1000), &viewer).unwrap();

        assert_eq!(session.key(Key::Enter).unwrap(), SessionEvent::None);
        assert!(session.annotations().is_empty());
        assert_eq!(session.tool_state(), ToolState::Armed);
    }

    #[test]
    fn test_polygon_close_and_area() {
        let viewer = viewer();
        let mut session = session();
        session.arm("sod").unwrap();
        session.press(press(0.0, 0.0, 0), &viewer).unwrap();
        session.press(press(72.0, 0.0, 1000), &viewer).unwrap();
        session.press(press(72.0, 72.0, 2000), &viewer).unwrap();
        session.press(press(0.0, 72.0, 3000), &viewer).unwrap();
        let id = committed(session.press(press(3.0, 3.0, 4000), &viewer));

        let Some(Annotation::Polygon(polygon)) = session.annotation(&id) else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.points.len(), 4);
        assert_eq!(polygon.fill_opacity, 0.2);
        assert_eq!(session.measurement_of(&id).unwrap().formatted, "400 SF");
    }

    #[test]
    fn test_escape_cancels_and_releases() {
        let viewer = viewer();
        let mut session = session();
        session.arm("fence").unwrap();
        session.press(press(10.0, 10.0, 0), &viewer).unwrap();

        assert_eq!(session.key(Key::Escape).unwrap(), SessionEvent::Cancelled);
        assert_eq!(session.armed_item(), None);
        assert!(session.annotations().is_empty());

        // Moves and presses after the cancel are no-ops
        session.move_to(40.0, 40.0, &viewer);
        assert_eq!(session.press(press(10.0, 10.0, 100), &viewer).unwrap(), SessionEvent::None);
    }

    #[test]
    fn test_delete_and_annotation_at() {
        let viewer = viewer();
        let mut session = session();
        session.arm("inlet").unwrap();
        let id = committed(session.press(press(100.0, 802.0 + 50.0, 0), &viewer));

        let hit = session.annotation_at(105.0, 802.0 + 55.0, &viewer).unwrap();
        assert_eq!(hit.id(), &id);
        assert!(session.annotation_at(300.0, 300.0, &viewer).is_none());

        let removed = session.delete(&id).unwrap();
        assert_eq!(removed.page_number(), 2);
        assert!(matches!(session.delete(&id), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_page_scales_drive_measurement() {
        let viewer = viewer();
        let mut session = session();
        assert!(matches!(
            session.set_page_scale(2, "1_999"),
            Err(SessionError::Scale(ScaleError::UnknownPreset(_)))
        ));
        session.set_page_scale(2, "1_40").unwrap();

        session.arm("fence").unwrap();
        session.press(press(0.0, 802.0, 0), &viewer).unwrap();
        session.press(press(72.0, 802.0, 1000), &viewer).unwrap();
        let id = committed(session.finish());

        assert_eq!(session.measurement_of(&id).unwrap().formatted, "40 LF");
        assert_eq!(session.summary_by_page_scale()[0].formatted, "40 LF");
        // Export summary follows page 1, which falls back to the default 1" = 20'
        assert_eq!(session.summary()[0].formatted, "20 LF");
    }

    #[test]
    fn test_calibrate_page() {
        let mut session = session();
        let p1 = Scaled::point(0.0, 0.0, 612.0, 792.0, 1);
        let p2 = Scaled::point(144.0, 0.0, 612.0, 792.0, 1);

        let preset = session.calibrate(&p1, &p2, 50.0).unwrap();
        assert_eq!(preset.id, "custom_page_1");
        assert_eq!(session.scales().resolve(1).id, "custom_page_1");
    }

    #[test]
    fn test_export_import_round_trip() {
        let viewer = viewer();
        let mut session = session().with_pdf_name("site.pdf");
        session.arm("inlet").unwrap();
        committed(session.press(press(100.0, 100.0, 0), &viewer));
        committed(session.press(press(150.0, 100.0, 1000), &viewer));
        session.set_page_scale(1, "1_30").unwrap();

        let export = session.export();
        assert_eq!(export.pdf_name.as_deref(), Some("site.pdf"));
        assert_eq!(export.summary[0].formatted, "2");

        let mut restored = TakeoffSession::new(config()).unwrap();
        assert_eq!(restored.import(export), 2);
        assert_eq!(restored.scales().resolve(1).id, "1_30");

        // Numbering continues after imported markers
        restored.arm("inlet").unwrap();
        let id = committed(restored.press(press(200.0, 100.0, 0), &viewer));
        let Some(Annotation::Count(marker)) = restored.annotation(&id) else {
            panic!("expected count marker");
        };
        assert_eq!(marker.number, 3);
    }

    #[test]
    fn test_import_skips_invalid_annotations() {
        let mut export = session().export();
        export.annotations.push(Annotation::Polyline(PolylineAnnotation {
            id: AnnotationId::from("broken"),
            points: vec![Scaled::point(0.0, 0.0, 612.0, 792.0, 1)],
            item_id: "fence".to_owned(),
            label: "Silt Fence".to_owned(),
            color: Color::POLYLINE_RED,
            stroke_width: 3.0,
        }));

        let mut session = session();
        assert_eq!(session.import(export), 0);
    }

    #[test]
    fn test_import_skips_count_marker_numbered_at_limit() {
        let export = crate::export::import_from_json(&format!(
            r##"{{"annotations": [{{
                "type": "count",
                "id": "count-max",
                "position": {{"boundingRect": {{"x1": 1, "y1": 2, "x2": 25, "y2": 26, "width": 612, "height": 792, "pageNumber": 1}}}},
                "itemId": "inlet",
                "label": "Curb Inlet",
                "color": "#22c55e",
                "number": {}
            }}]}}"##,
            u32::MAX
        ))
        .expect("export should parse");

        let mut session = session();
        assert_eq!(session.import(export), 0);

        // Numbering is unaffected by the refused marker
        let viewer = viewer();
        session.arm("inlet").unwrap();
        let id = committed(session.press(press(100.0, 100.0, 0), &viewer));
        let Some(Annotation::Count(marker)) = session.annotation(&id) else {
            panic!("expected count marker");
        };
        assert_eq!(marker.number, 1);
    }
}

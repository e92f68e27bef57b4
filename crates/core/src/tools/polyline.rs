use super::{locate, Draft, DrawingTool, PathDraft, PointerPress, ToolOutput, ToolState};
use crate::annotation::{AnnotationKind, Scaled};
use crate::coordinates::ViewerContext;

/// Open chain of points for linear takeoff
///
/// `Idle -> Armed -> Drawing -> Commit | Cancel`. The draft is finished
/// explicitly (`finish` or Enter); a double press only adds another point.
#[derive(Debug, Clone, Default)]
pub struct PolylineTool {
    state: ToolState,
    draft: PathDraft,
}

impl PolylineTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawingTool for PolylineTool {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::Polyline
    }

    fn state(&self) -> ToolState {
        self.state
    }

    fn activate(&mut self) {
        self.draft.clear();
        self.state = ToolState::Armed;
    }

    fn handle_press(&mut self, press: PointerPress, viewer: &dyn ViewerContext) -> ToolOutput {
        if !matches!(self.state, ToolState::Armed | ToolState::Drawing) {
            return ToolOutput::None;
        }

        let Some(located) = locate(viewer, press.client_x, press.client_y) else {
            log::trace!("polyline press off page");
            return ToolOutput::None;
        };
        if !self.draft.accepts(located.hit.page_number) {
            log::trace!(
                "polyline press on page {} ignored; draft is on page {:?}",
                located.hit.page_number,
                self.draft.page_number()
            );
            return ToolOutput::None;
        }

        self.draft.push(located.point);
        self.state = ToolState::Drawing;
        ToolOutput::None
    }

    fn handle_move(&mut self, client_x: f64, client_y: f64, viewer: &dyn ViewerContext) {
        if self.state != ToolState::Drawing {
            return;
        }
        let located = locate(viewer, client_x, client_y);
        self.draft.set_preview(located.as_ref());
    }

    fn finish(&mut self) -> ToolOutput {
        if !matches!(self.state, ToolState::Armed | ToolState::Drawing) {
            return ToolOutput::None;
        }

        let points = self.draft.take();
        if points.len() < AnnotationKind::Polyline.min_points() {
            log::trace!("polyline discarded with {} point(s)", points.len());
            self.state = ToolState::Armed;
            return ToolOutput::None;
        }

        log::debug!("polyline finished with {} points", points.len());
        self.state = ToolState::Idle;
        ToolOutput::Commit(Draft::Polyline { points })
    }

    fn cancel(&mut self) -> ToolOutput {
        if self.state == ToolState::Idle {
            return ToolOutput::None;
        }
        self.draft.clear();
        self.state = ToolState::Idle;
        ToolOutput::Cancel
    }

    fn points(&self) -> &[Scaled] {
        &self.draft.points
    }

    fn preview_point(&self) -> Option<&Scaled> {
        self.draft.preview.as_ref()
    }
}

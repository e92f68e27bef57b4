use super::{locate, Draft, DrawingTool, PointerPress, ToolOutput, ToolState};
use crate::annotation::{AnnotationKind, ScaledPosition};
use crate::coordinates::{to_scaled, ViewerContext, ViewportRect};

/// Places one count marker per activation
///
/// `Idle -> Armed -> (press on a page) -> Commit -> Idle`
#[derive(Debug, Clone)]
pub struct CountTool {
    state: ToolState,
    /// Marker box side in viewport pixels
    marker_size: f64,
}

impl CountTool {
    pub fn new(marker_size: f64) -> Self {
        Self {
            state: ToolState::Idle,
            marker_size,
        }
    }

    pub fn marker_size(&self) -> f64 {
        self.marker_size
    }
}

impl DrawingTool for CountTool {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::Count
    }

    fn state(&self) -> ToolState {
        self.state
    }

    fn activate(&mut self) {
        self.state = ToolState::Armed;
    }

    fn handle_press(&mut self, press: PointerPress, viewer: &dyn ViewerContext) -> ToolOutput {
        if self.state != ToolState::Armed {
            return ToolOutput::None;
        }

        let Some(located) = locate(viewer, press.client_x, press.client_y) else {
            log::trace!("count press off page at ({}, {})", press.client_x, press.client_y);
            return ToolOutput::None;
        };

        let (x, y) = located.local;
        let page_number = located.hit.page_number;
        let rect = ViewportRect::centered(x, y, self.marker_size, page_number);
        let scaled = to_scaled(&rect, &located.hit.view.viewport);

        self.state = ToolState::Idle;
        log::debug!("count marker placed on page {page_number}");
        ToolOutput::Commit(Draft::Count {
            position: ScaledPosition::new(scaled),
        })
    }

    fn handle_move(&mut self, _client_x: f64, _client_y: f64, _viewer: &dyn ViewerContext) {}

    /// A count marker commits on press; there is never a draft to finish
    fn finish(&mut self) -> ToolOutput {
        ToolOutput::None
    }

    fn cancel(&mut self) -> ToolOutput {
        if self.state == ToolState::Idle {
            return ToolOutput::None;
        }
        self.state = ToolState::Idle;
        ToolOutput::Cancel
    }
}

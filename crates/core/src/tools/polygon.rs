use super::{
    locate, Draft, DrawingTool, Located, PathDraft, PointerPress, ToolOutput, ToolState,
    CLOSE_DISTANCE_PX, DOUBLE_PRESS_WINDOW,
};
use crate::annotation::{AnnotationKind, Scaled};
use crate::coordinates::{to_viewport, ViewerContext};
use std::time::Duration;

/// Closed ring of points for area takeoff
///
/// `Idle -> Armed -> Drawing -> (Closing) -> Commit | Cancel`. With three or
/// more points placed, a double press or a press next to the first point
/// closes the ring; the closing press itself is not added.
#[derive(Debug, Clone, Default)]
pub struct PolygonTool {
    state: ToolState,
    draft: PathDraft,
    last_press: Option<Duration>,
}

impl PolygonTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn can_close(&self) -> bool {
        self.draft.points.len() >= AnnotationKind::Polygon.min_points()
    }

    /// Whether a located point lies within the close radius of the first point,
    /// measured in the page's current viewport pixels
    fn near_start(&self, located: &Located) -> bool {
        let Some(first) = self.draft.points.first() else {
            return false;
        };
        if first.page_number != located.hit.page_number {
            return false;
        }

        let start = to_viewport(first, &located.hit.view.viewport);
        let (x, y) = located.local;
        ((x - start.left).powi(2) + (y - start.top).powi(2)).sqrt() < CLOSE_DISTANCE_PX
    }

    fn close(&mut self) -> ToolOutput {
        let points = self.draft.take();
        log::debug!("polygon closed with {} points", points.len());
        self.state = ToolState::Idle;
        ToolOutput::Commit(Draft::Polygon { points })
    }
}

impl DrawingTool for PolygonTool {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::Polygon
    }

    fn state(&self) -> ToolState {
        self.state
    }

    fn activate(&mut self) {
        self.draft.clear();
        self.last_press = None;
        self.state = ToolState::Armed;
    }

    fn handle_press(&mut self, press: PointerPress, viewer: &dyn ViewerContext) -> ToolOutput {
        if self.state == ToolState::Idle {
            return ToolOutput::None;
        }

        // Every press restarts the double-press window, even off the page
        let is_double = self
            .last_press
            .and_then(|last| press.time.checked_sub(last))
            .is_some_and(|elapsed| elapsed < DOUBLE_PRESS_WINDOW);
        self.last_press = Some(press.time);

        let Some(located) = locate(viewer, press.client_x, press.client_y) else {
            log::trace!("polygon press off page");
            return ToolOutput::None;
        };
        if !self.draft.accepts(located.hit.page_number) {
            log::trace!(
                "polygon press on page {} ignored; draft is on page {:?}",
                located.hit.page_number,
                self.draft.page_number()
            );
            return ToolOutput::None;
        }

        if self.can_close() && (is_double || self.near_start(&located)) {
            return self.close();
        }

        self.draft.push(located.point);
        self.state = ToolState::Drawing;
        ToolOutput::None
    }

    fn handle_move(&mut self, client_x: f64, client_y: f64, viewer: &dyn ViewerContext) {
        if !matches!(self.state, ToolState::Drawing | ToolState::Closing) {
            return;
        }

        let located = locate(viewer, client_x, client_y);
        self.draft.set_preview(located.as_ref());

        let closing = self.can_close() && located.is_some_and(|l| self.near_start(&l));
        self.state = if closing {
            ToolState::Closing
        } else {
            ToolState::Drawing
        };
    }

    fn finish(&mut self) -> ToolOutput {
        if self.state == ToolState::Idle {
            return ToolOutput::None;
        }
        if self.can_close() {
            return self.close();
        }

        log::trace!("polygon discarded with {} point(s)", self.draft.points.len());
        self.draft.clear();
        self.state = ToolState::Armed;
        ToolOutput::None
    }

    fn cancel(&mut self) -> ToolOutput {
        if self.state == ToolState::Idle {
            return ToolOutput::None;
        }
        self.draft.clear();
        self.last_press = None;
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

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Key;
    use super::*;
    use crate::coordinates::{PageViewport, StaticViewer};

    fn armed() -> PolygonTool {
        let mut tool = PolygonTool::new();
        tool.activate();
        tool
    }

    /// Three corners of a 100 px square, pressed a second apart
    fn three_corners(tool: &mut PolygonTool, viewer: &dyn ViewerContext) {
        tool.handle_press(press(100.0, 100.0, 0), viewer);
        tool.handle_press(press(200.0, 100.0, 1000), viewer);
        tool.handle_press(press(200.0, 200.0, 2000), viewer);
    }

    fn committed_points(output: ToolOutput) -> Vec<Scaled> {
        match output {
            ToolOutput::Commit(Draft::Polygon { points }) => points,
            other => panic!("expected polygon commit, got {other:?}"),
        }
    }

    #[test]
    fn test_press_near_start_closes() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);
        tool.handle_press(press(100.0, 200.0, 3000), &viewer);

        let points = committed_points(tool.handle_press(press(105.0, 104.0, 4000), &viewer));
        assert_eq!(points.len(), 4);
        assert_eq!(crate::measurement::area(&points), 10_000.0);
        assert_eq!(tool.state(), ToolState::Idle);
    }

    #[test]
    fn test_double_press_closes_without_adding_point() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        tool.handle_press(press(100.0, 200.0, 3000), &viewer);
        let points = committed_points(tool.handle_press(press(100.0, 200.0, 3200), &viewer));
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn test_double_press_window_is_exclusive() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        tool.handle_press(press(300.0, 300.0, 3000), &viewer);
        assert_eq!(tool.handle_press(press(300.0, 400.0, 3300), &viewer), ToolOutput::None);
        assert_eq!(tool.points().len(), 5);
    }

    #[test]
    fn test_close_signals_need_three_points() {
        let viewer = viewer();
        let mut tool = armed();
        tool.handle_press(press(100.0, 100.0, 0), &viewer);
        tool.handle_press(press(200.0, 100.0, 1000), &viewer);

        // Quick press and near-start press both just add points
        tool.handle_press(press(200.0, 150.0, 1100), &viewer);
        assert_eq!(tool.points().len(), 3);
        assert_eq!(tool.state(), ToolState::Drawing);

        let mut tool = armed();
        tool.handle_press(press(100.0, 100.0, 0), &viewer);
        tool.handle_press(press(103.0, 100.0, 1000), &viewer);
        assert_eq!(tool.points().len(), 2);
    }

    #[test]
    fn test_off_page_press_updates_double_press_clock() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        // Off-page press at 2900 ms, then an on-page press 200 ms later
        assert_eq!(tool.handle_press(press(900.0, 100.0, 2900), &viewer), ToolOutput::None);
        let points = committed_points(tool.handle_press(press(150.0, 300.0, 3100), &viewer));
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn test_cross_page_press_ignored_even_when_double() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        assert_eq!(
            tool.handle_press(press(100.0, page2(100.0), 2100), &viewer),
            ToolOutput::None
        );
        assert_eq!(tool.points().len(), 3);
        assert_eq!(tool.state(), ToolState::Drawing);
    }

    #[test]
    fn test_enter_with_two_points_discards_and_rearms() {
        let viewer = viewer();
        let mut tool = armed();
        tool.handle_press(press(100.0, 100.0, 0), &viewer);
        tool.handle_press(press(200.0, 100.0, 1000), &viewer);

        assert_eq!(tool.handle_key(Key::Enter), ToolOutput::None);
        assert_eq!(tool.state(), ToolState::Armed);
        assert!(tool.points().is_empty());
    }

    #[test]
    fn test_enter_with_three_points_commits() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        let points = committed_points(tool.handle_key(Key::Enter));
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn test_hover_near_start_enters_closing() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        tool.handle_move(108.0, 108.0, &viewer);
        assert_eq!(tool.state(), ToolState::Closing);

        tool.handle_move(150.0, 150.0, &viewer);
        assert_eq!(tool.state(), ToolState::Drawing);
        assert_eq!(tool.preview_point().map(|p| p.x()), Some(150.0));
    }

    #[test]
    fn test_near_start_measured_at_current_zoom() {
        let mut viewer = StaticViewer::stacked(1, PageViewport::new(612.0, 792.0, 1.0), 0.0);
        let mut tool = armed();
        three_corners(&mut tool, &viewer);

        // At 200% the first point renders at (200, 200); 20 px away is too far
        viewer.set_viewport(PageViewport::new(612.0, 792.0, 2.0), 0.0);
        assert_eq!(tool.handle_press(press(220.0, 200.0, 5000), &viewer), ToolOutput::None);
        assert_eq!(tool.points().len(), 4);

        let points = committed_points(tool.handle_press(press(210.0, 200.0, 6000), &viewer));
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn test_escape_cancels_and_clears_preview() {
        let viewer = viewer();
        let mut tool = armed();
        three_corners(&mut tool, &viewer);
        tool.handle_move(150.0, 150.0, &viewer);

        assert_eq!(tool.handle_key(Key::Escape), ToolOutput::Cancel);
        assert_eq!(tool.state(), ToolState::Idle);
        assert!(tool.points().is_empty());
        assert!(tool.preview_point().is_none());
        assert_eq!(tool.handle_press(press(100.0, 100.0, 9000), &viewer), ToolOutput::None);
    }
}

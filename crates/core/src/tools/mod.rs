//! Interactive drawing tools
//!
//! Each tool is an explicit state machine fed with pointer, move and key
//! events. Tools do no I/O: they return a [`ToolOutput`] telling the owner
//! (normally [`crate::session::TakeoffSession`]) whether a draft was
//! committed or the interaction cancelled.
//!
//! Points are converted to scaled space as they are placed, so zooming
//! between presses never distorts a draft.

mod count;
mod polygon;
mod polyline;

pub use count::CountTool;
pub use polygon::PolygonTool;
pub use polyline::PolylineTool;

use crate::annotation::{AnnotationKind, Scaled, ScaledPosition};
use crate::coordinates::{find_page, to_scaled, PageHit, ViewerContext, ViewportRect};
use std::time::Duration;

/// Two presses closer together than this close a polygon
pub const DOUBLE_PRESS_WINDOW: Duration = Duration::from_millis(300);

/// A press this close to the first polygon point (viewport pixels) closes it
pub const CLOSE_DISTANCE_PX: f64 = 15.0;

/// Lifecycle of a drawing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolState {
    /// Not accepting input
    #[default]
    Idle,
    /// Waiting for the first press
    Armed,
    /// At least one point placed
    Drawing,
    /// Polygon cursor is over the first point; the next press closes the ring
    Closing,
}

/// A pointer or touch press in window client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPress {
    pub client_x: f64,
    pub client_y: f64,
    /// Monotonic event timestamp
    pub time: Duration,
}

impl PointerPress {
    pub fn new(client_x: f64, client_y: f64, time: Duration) -> Self {
        Self {
            client_x,
            client_y,
            time,
        }
    }
}

/// Keys the tools react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
}

/// Geometry produced by a successful tool commit
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Count { position: ScaledPosition },
    Polyline { points: Vec<Scaled> },
    Polygon { points: Vec<Scaled> },
}

impl Draft {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Draft::Count { .. } => AnnotationKind::Count,
            Draft::Polyline { .. } => AnnotationKind::Polyline,
            Draft::Polygon { .. } => AnnotationKind::Polygon,
        }
    }
}

/// What a tool event produced
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolOutput {
    #[default]
    None,
    Commit(Draft),
    Cancel,
}

/// Shared contract of the count, polyline and polygon tools
///
/// One activation emits at most one `Commit` or `Cancel`, after which the
/// tool is idle until activated again.
pub trait DrawingTool {
    fn kind(&self) -> AnnotationKind;

    fn state(&self) -> ToolState;

    /// Arm the tool, discarding any draft
    fn activate(&mut self);

    fn handle_press(&mut self, press: PointerPress, viewer: &dyn ViewerContext) -> ToolOutput;

    /// Update the preview point; never changes the placed points
    fn handle_move(&mut self, client_x: f64, client_y: f64, viewer: &dyn ViewerContext);

    fn handle_key(&mut self, key: Key) -> ToolOutput {
        match key {
            Key::Escape => self.cancel(),
            Key::Enter => self.finish(),
        }
    }

    /// Commit the draft if it has enough points, otherwise discard it and stay armed
    fn finish(&mut self) -> ToolOutput;

    /// Abandon the interaction; emits `Cancel` unless already idle
    fn cancel(&mut self) -> ToolOutput;

    /// Points placed so far
    fn points(&self) -> &[Scaled] {
        &[]
    }

    /// Non-persisted point following the cursor
    fn preview_point(&self) -> Option<&Scaled> {
        None
    }
}

/// Create the tool for an annotation kind
pub fn tool_for(kind: AnnotationKind, marker_size: f64) -> Box<dyn DrawingTool> {
    match kind {
        AnnotationKind::Count => Box::new(CountTool::new(marker_size)),
        AnnotationKind::Polyline => Box::new(PolylineTool::new()),
        AnnotationKind::Polygon => Box::new(PolygonTool::new()),
    }
}

/// Client point resolved to a page, in page-local pixels and scaled space
#[derive(Debug, Clone, Copy)]
struct Located {
    hit: PageHit,
    local: (f64, f64),
    point: Scaled,
}

fn locate(viewer: &dyn ViewerContext, client_x: f64, client_y: f64) -> Option<Located> {
    let hit = find_page(viewer, client_x, client_y)?;
    let (x, y) = hit.local(client_x, client_y);
    let point = to_scaled(&ViewportRect::point(x, y, hit.page_number), &hit.view.viewport);
    Some(Located {
        hit,
        local: (x, y),
        point,
    })
}

/// Points and preview of a multi-point draft confined to one page
#[derive(Debug, Clone, Default)]
struct PathDraft {
    points: Vec<Scaled>,
    preview: Option<Scaled>,
}

impl PathDraft {
    fn page_number(&self) -> Option<u32> {
        self.points.first().map(|p| p.page_number)
    }

    /// Whether a point on `page_number` may join this draft
    fn accepts(&self, page_number: u32) -> bool {
        self.page_number().map_or(true, |page| page == page_number)
    }

    fn push(&mut self, point: Scaled) {
        self.points.push(point);
    }

    fn set_preview(&mut self, located: Option<&Located>) {
        self.preview = located
            .filter(|l| !self.points.is_empty() && self.accepts(l.hit.page_number))
            .map(|l| l.point);
    }

    fn take(&mut self) -> Vec<Scaled> {
        self.preview = None;
        std::mem::take(&mut self.points)
    }

    fn clear(&mut self) {
        self.points.clear();
        self.preview = None;
    }
}

//! Viewport and scaled coordinate spaces
//!
//! *Viewport* coordinates are pixels relative to a rendered page element and
//! depend on zoom and rotation. *Scaled* coordinates are expressed in the
//! page's intrinsic PDF point space (72 points per inch, origin at the
//! top-left of the unrotated page) and stay valid across zoom, resize and
//! page navigation.
//!
//! The external PDF viewer is consumed through [`ViewerContext`], which
//! exposes each page's current viewport transform and on-screen rectangle.

use crate::annotation::{Scaled, ScaledPosition};

/// Clockwise page rotation applied by the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse a rotation in degrees (any multiple of 90, negative allowed)
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            _ => Some(Rotation::Cw270),
        }
    }

    fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

/// Current rendering transform of one page
///
/// Maps intrinsic page points to rendered pixels: `scale` pixels per point,
/// then the clockwise rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageViewport {
    /// Intrinsic page width in PDF points
    pub page_width: f64,
    /// Intrinsic page height in PDF points
    pub page_height: f64,
    /// Rendered pixels per PDF point (zoom)
    pub scale: f64,
    pub rotation: Rotation,
}

impl PageViewport {
    pub fn new(page_width: f64, page_height: f64, scale: f64) -> Self {
        Self {
            page_width,
            page_height,
            scale,
            rotation: Rotation::None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Rendered width in pixels
    pub fn width(&self) -> f64 {
        if self.rotation.is_quarter_turn() {
            self.page_height * self.scale
        } else {
            self.page_width * self.scale
        }
    }

    /// Rendered height in pixels
    pub fn height(&self) -> f64 {
        if self.rotation.is_quarter_turn() {
            self.page_width * self.scale
        } else {
            self.page_height * self.scale
        }
    }

    /// Map a page-relative pixel to intrinsic page points
    pub fn to_page_point(&self, vx: f64, vy: f64) -> (f64, f64) {
        let (u, v) = (vx / self.scale, vy / self.scale);
        match self.rotation {
            Rotation::None => (u, v),
            Rotation::Cw90 => (v, self.page_height - u),
            Rotation::Cw180 => (self.page_width - u, self.page_height - v),
            Rotation::Cw270 => (self.page_width - v, u),
        }
    }

    /// Map intrinsic page points to a page-relative pixel
    pub fn to_viewport_point(&self, px: f64, py: f64) -> (f64, f64) {
        let s = self.scale;
        match self.rotation {
            Rotation::None => (px * s, py * s),
            Rotation::Cw90 => ((self.page_height - py) * s, px * s),
            Rotation::Cw180 => ((self.page_width - px) * s, (self.page_height - py) * s),
            Rotation::Cw270 => (py * s, (self.page_width - px) * s),
        }
    }
}

/// A page element's rectangle in window client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ClientRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Inclusive point-in-rect test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }
}

/// Rectangle in viewport space (page-relative pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    /// 1-based page number
    pub page_number: u32,
}

impl ViewportRect {
    /// Zero-size rectangle at a point
    pub fn point(x: f64, y: f64, page_number: u32) -> Self {
        Self {
            left: x,
            top: y,
            width: 0.0,
            height: 0.0,
            page_number,
        }
    }

    /// Square of side `size` centered on a point
    pub fn centered(x: f64, y: f64, size: f64, page_number: u32) -> Self {
        Self {
            left: x - size / 2.0,
            top: y - size / 2.0,
            width: size,
            height: size,
            page_number,
        }
    }
}

/// One page as seen by the viewer right now
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageView {
    pub viewport: PageViewport,
    pub bounding_rect: ClientRect,
}

/// Page geometry collaborator provided by the PDF viewer
pub trait ViewerContext {
    fn pages_count(&self) -> usize;

    /// View of the page at 0-based `index`, if it is laid out
    fn page_view(&self, index: usize) -> Option<PageView>;
}

/// Fixed page layout, for headless sessions and tests
#[derive(Debug, Clone, Default)]
pub struct StaticViewer {
    pages: Vec<PageView>,
}

impl StaticViewer {
    pub fn new(pages: Vec<PageView>) -> Self {
        Self { pages }
    }

    /// `count` identical pages stacked vertically with `gap` pixels between them
    pub fn stacked(count: usize, viewport: PageViewport, gap: f64) -> Self {
        let mut top = 0.0;
        let pages = (0..count)
            .map(|_| {
                let rect = ClientRect::new(0.0, top, viewport.width(), viewport.height());
                top += viewport.height() + gap;
                PageView {
                    viewport,
                    bounding_rect: rect,
                }
            })
            .collect();
        Self { pages }
    }

    /// Replace the viewport of every page (zoom), re-stacking the layout
    pub fn set_viewport(&mut self, viewport: PageViewport, gap: f64) {
        *self = Self::stacked(self.pages.len(), viewport, gap);
    }
}

impl ViewerContext for StaticViewer {
    fn pages_count(&self) -> usize {
        self.pages.len()
    }

    fn page_view(&self, index: usize) -> Option<PageView> {
        self.pages.get(index).copied()
    }
}

/// Result of resolving a client point to a page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHit {
    /// 1-based page number
    pub page_number: u32,
    pub view: PageView,
}

impl PageHit {
    /// Convert a client point into page-relative pixels
    pub fn local(&self, client_x: f64, client_y: f64) -> (f64, f64) {
        (
            client_x - self.view.bounding_rect.left,
            client_y - self.view.bounding_rect.top,
        )
    }
}

/// Find the page under a client point
///
/// Linear scan over the page rectangles; the first match wins since pages
/// never overlap.
pub fn find_page(viewer: &dyn ViewerContext, client_x: f64, client_y: f64) -> Option<PageHit> {
    (0..viewer.pages_count()).find_map(|index| {
        let view = viewer.page_view(index)?;
        view.bounding_rect.contains(client_x, client_y).then(|| PageHit {
            page_number: index as u32 + 1,
            view,
        })
    })
}

/// Convert a viewport rectangle into scaled space
pub fn to_scaled(rect: &ViewportRect, viewport: &PageViewport) -> Scaled {
    let (ax, ay) = viewport.to_page_point(rect.left, rect.top);
    let (bx, by) = viewport.to_page_point(rect.left + rect.width, rect.top + rect.height);

    Scaled {
        x1: ax.min(bx),
        y1: ay.min(by),
        x2: ax.max(bx),
        y2: ay.max(by),
        width: viewport.page_width,
        height: viewport.page_height,
        page_number: rect.page_number,
    }
}

/// Convert a scaled box back into viewport space
///
/// Boxes recorded against a different reference size (`width`/`height`)
/// are rescaled proportionally to the page's intrinsic size first.
pub fn to_viewport(scaled: &Scaled, viewport: &PageViewport) -> ViewportRect {
    let sx = if scaled.width > 0.0 {
        viewport.page_width / scaled.width
    } else {
        1.0
    };
    let sy = if scaled.height > 0.0 {
        viewport.page_height / scaled.height
    } else {
        1.0
    };

    let (ax, ay) = viewport.to_viewport_point(scaled.x1 * sx, scaled.y1 * sy);
    let (bx, by) = viewport.to_viewport_point(scaled.x2 * sx, scaled.y2 * sy);

    ViewportRect {
        left: ax.min(bx),
        top: ay.min(by),
        width: (bx - ax).abs(),
        height: (by - ay).abs(),
        page_number: scaled.page_number,
    }
}

fn page_viewport(viewer: &dyn ViewerContext, page_number: u32) -> Option<PageViewport> {
    let index = (page_number as usize).checked_sub(1)?;
    viewer.page_view(index).map(|view| view.viewport)
}

/// Convert a viewport rectangle to a scaled position using the viewer's current transform
pub fn position_to_scaled(rect: &ViewportRect, viewer: &dyn ViewerContext) -> Option<ScaledPosition> {
    let viewport = page_viewport(viewer, rect.page_number)?;
    Some(ScaledPosition::new(to_scaled(rect, &viewport)))
}

/// Convert a scaled position back to the viewer's current viewport space
pub fn position_to_viewport(
    position: &ScaledPosition,
    viewer: &dyn ViewerContext,
) -> Option<ViewportRect> {
    let viewport = page_viewport(viewer, position.page_number())?;
    Some(to_viewport(&position.bounding_rect, &viewport))
}

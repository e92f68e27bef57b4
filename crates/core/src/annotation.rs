//! Takeoff annotation data model
//!
//! Count markers, polylines and polygons committed by the drawing tools.
//! All geometry is stored in scaled page space (see [`crate::coordinates`]),
//! so annotations stay valid across zoom, resize and page navigation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Errors raised when an annotation breaks a geometry invariant
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnnotationError {
    #[error("{kind} annotation needs at least {min} points, got {actual}")]
    TooFewPoints {
        kind: AnnotationKind,
        min: usize,
        actual: usize,
    },

    #[error("annotation spans pages {first} and {other}")]
    CrossPage { first: u32, other: u32 },

    #[error("page numbers are 1-based, got 0")]
    PageZero,

    #[error("count number {number} for item {item_id} is out of range")]
    CountNumberOutOfRange { item_id: String, number: u32 },
}

/// Stable annotation identifier
///
/// Generated ids look like `polygon-<uuid>`. Imported ids are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    /// Generate a fresh id for an annotation of `kind`
    pub fn generate(kind: AnnotationKind) -> Self {
        Self(format!("{}-{}", kind.as_str(), uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for AnnotationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A box in scaled page space
///
/// A single point is a degenerate box with `x1 == x2` and `y1 == y2`.
/// `width`/`height` give the reference page size the coordinates are
/// expressed against (the page's intrinsic size in PDF points for data this
/// crate produces). Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaled {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub height: f64,
    pub page_number: u32,
}

impl Scaled {
    /// Create a degenerate (point) box
    pub fn point(x: f64, y: f64, width: f64, height: f64, page_number: u32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x,
            y2: y,
            width,
            height,
            page_number,
        }
    }

    /// Anchor x coordinate used by the geometry kernel
    pub fn x(&self) -> f64 {
        self.x1
    }

    /// Anchor y coordinate used by the geometry kernel
    pub fn y(&self) -> f64 {
        self.y1
    }

    /// Center of the box
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Euclidean distance between the anchors of two boxes
    pub fn distance_to(&self, other: &Scaled) -> f64 {
        let dx = self.x1 - other.x1;
        let dy = self.y1 - other.y1;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Position of a box-style annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledPosition {
    pub bounding_rect: Scaled,
    #[serde(default)]
    pub rects: Vec<Scaled>,
}

impl ScaledPosition {
    pub fn new(bounding_rect: Scaled) -> Self {
        Self {
            bounding_rect,
            rects: Vec::new(),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.bounding_rect.page_number
    }
}

/// RGBA color, serialized as a `#rrggbb` or `#rrggbbaa` hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Hex representation, alpha included only when not opaque
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Default tool colors
impl Color {
    pub const COUNT_GREEN: Color = Color::rgb(0x22, 0xc5, 0x5e);
    pub const POLYLINE_RED: Color = Color::rgb(0xef, 0x44, 0x44);
    pub const POLYGON_VIOLET: Color = Color::rgb(0x8b, 0x5c, 0xf6);
}

/// Error parsing a hex color string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color: {0:?}")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());

        match hex.len() {
            3 => {
                let short = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| err())
                };
                Ok(Color::rgb(short(0)?, short(1)?, short(2)?))
            }
            6 => Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Color::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Annotation variant discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Count,
    Polyline,
    Polygon,
}

impl AnnotationKind {
    /// Minimum number of points a committed annotation of this kind holds
    pub fn min_points(self) -> usize {
        match self {
            AnnotationKind::Count => 1,
            AnnotationKind::Polyline => 2,
            AnnotationKind::Polygon => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Count => "count",
            AnnotationKind::Polyline => "polyline",
            AnnotationKind::Polygon => "polygon",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single counted item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountMarker {
    pub id: AnnotationId,
    pub position: ScaledPosition,
    pub item_id: String,
    pub label: String,
    pub color: Color,
    /// 1-based sequence number, unique within `item_id`
    pub number: u32,
}

/// Open chain of points for linear measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineAnnotation {
    pub id: AnnotationId,
    pub points: Vec<Scaled>,
    pub item_id: String,
    pub label: String,
    pub color: Color,
    pub stroke_width: f64,
}

/// Closed ring for area measurements
///
/// The first point is not repeated at the end; the ring closes implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonAnnotation {
    pub id: AnnotationId,
    pub points: Vec<Scaled>,
    pub item_id: String,
    pub label: String,
    pub color: Color,
    pub stroke_width: f64,
    pub fill_opacity: f64,
}

/// A committed takeoff annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Annotation {
    Count(CountMarker),
    Polyline(PolylineAnnotation),
    Polygon(PolygonAnnotation),
}

impl Annotation {
    pub fn id(&self) -> &AnnotationId {
        match self {
            Annotation::Count(m) => &m.id,
            Annotation::Polyline(p) => &p.id,
            Annotation::Polygon(p) => &p.id,
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Count(_) => AnnotationKind::Count,
            Annotation::Polyline(_) => AnnotationKind::Polyline,
            Annotation::Polygon(_) => AnnotationKind::Polygon,
        }
    }

    pub fn item_id(&self) -> &str {
        match self {
            Annotation::Count(m) => &m.item_id,
            Annotation::Polyline(p) => &p.item_id,
            Annotation::Polygon(p) => &p.item_id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Annotation::Count(m) => &m.label,
            Annotation::Polyline(p) => &p.label,
            Annotation::Polygon(p) => &p.label,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Annotation::Count(m) => m.color,
            Annotation::Polyline(p) => p.color,
            Annotation::Polygon(p) => p.color,
        }
    }

    /// Geometry points; a count marker exposes its bounding box
    pub fn points(&self) -> &[Scaled] {
        match self {
            Annotation::Count(m) => std::slice::from_ref(&m.position.bounding_rect),
            Annotation::Polyline(p) => &p.points,
            Annotation::Polygon(p) => &p.points,
        }
    }

    /// Page the annotation lives on (page of its first point)
    pub fn page_number(&self) -> u32 {
        self.points().first().map(|p| p.page_number).unwrap_or(0)
    }

    /// Check the point-count and single-page invariants
    pub fn validate(&self) -> Result<(), AnnotationError> {
        let kind = self.kind();
        let points = self.points();
        if points.len() < kind.min_points() {
            return Err(AnnotationError::TooFewPoints {
                kind,
                min: kind.min_points(),
                actual: points.len(),
            });
        }

        let first = points[0].page_number;
        if first == 0 {
            return Err(AnnotationError::PageZero);
        }
        if let Some(other) = points.iter().find(|p| p.page_number != first) {
            return Err(AnnotationError::CrossPage {
                first,
                other: other.page_number,
            });
        }

        Ok(())
    }

    /// Bounding box as (min_x, min_y, max_x, max_y) in scaled space
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        if let Annotation::Count(m) = self {
            let r = &m.position.bounding_rect;
            return (r.x1.min(r.x2), r.y1.min(r.y2), r.x1.max(r.x2), r.y1.max(r.y2));
        }

        let points = self.points();
        let Some(first) = points.first() else {
            return (0.0, 0.0, 0.0, 0.0);
        };
        points.iter().skip(1).fold(
            (first.x(), first.y(), first.x(), first.y()),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x()), min_y.min(p.y()), max_x.max(p.x()), max_y.max(p.y()))
            },
        )
    }

    /// Check if a scaled point hits this annotation (for selection)
    ///
    /// Count markers hit inside their box; polylines and polygons hit within
    /// `tolerance` of an edge.
    pub fn hit_test(&self, page_number: u32, x: f64, y: f64, tolerance: f64) -> bool {
        if self.page_number() != page_number {
            return false;
        }

        match self {
            Annotation::Count(_) => {
                let (min_x, min_y, max_x, max_y) = self.bounding_box();
                x >= min_x - tolerance
                    && x <= max_x + tolerance
                    && y >= min_y - tolerance
                    && y <= max_y + tolerance
            }
            Annotation::Polyline(p) => p
                .points
                .windows(2)
                .any(|w| point_near_segment((x, y), &w[0], &w[1], tolerance)),
            Annotation::Polygon(p) => {
                let n = p.points.len();
                (0..n).any(|i| {
                    point_near_segment((x, y), &p.points[i], &p.points[(i + 1) % n], tolerance)
                })
            }
        }
    }
}

fn point_near_segment(point: (f64, f64), start: &Scaled, end: &Scaled, tolerance: f64) -> bool {
    let dx = end.x() - start.x();
    let dy = end.y() - start.y();
    let length_sq = dx * dx + dy * dy;
    let distance = |cx: f64, cy: f64| ((point.0 - cx).powi(2) + (point.1 - cy).powi(2)).sqrt();

    if length_sq < 1e-12 {
        return distance(start.x(), start.y()) <= tolerance;
    }

    let t = (((point.0 - start.x()) * dx + (point.1 - start.y()) * dy) / length_sq).clamp(0.0, 1.0);
    distance(start.x() + t * dx, start.y() + t * dy) <= tolerance
}

/// Annotations owned by one takeoff session, in commit order
#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    /// Next count-marker number per item id
    next_numbers: HashMap<String, u32>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation, keeping count numbering ahead of imported markers
    ///
    /// Count markers numbered 0, or so high that no number is left after
    /// them, are refused.
    pub fn add(&mut self, annotation: Annotation) -> Result<(), AnnotationError> {
        if let Annotation::Count(marker) = &annotation {
            let following = marker
                .number
                .checked_add(1)
                .filter(|_| marker.number > 0)
                .ok_or_else(|| AnnotationError::CountNumberOutOfRange {
                    item_id: marker.item_id.clone(),
                    number: marker.number,
                })?;
            let next = self.next_numbers.entry(marker.item_id.clone()).or_insert(1);
            *next = (*next).max(following);
        }
        self.annotations.push(annotation);
        Ok(())
    }

    /// Reserve the next 1-based count number for `item_id`
    pub fn take_number(&mut self, item_id: &str) -> Result<u32, AnnotationError> {
        let next = self.next_numbers.entry(item_id.to_owned()).or_insert(1);
        let number = *next;
        *next = number
            .checked_add(1)
            .ok_or_else(|| AnnotationError::CountNumberOutOfRange {
                item_id: item_id.to_owned(),
                number,
            })?;
        Ok(number)
    }

    /// Remove an annotation by id
    pub fn remove(&mut self, id: &AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id() == id)?;
        Some(self.annotations.remove(index))
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn all(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations on one page, in commit order
    pub fn for_page(&self, page_number: u32) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.page_number() == page_number)
            .collect()
    }

    /// Topmost-first annotations hit at a scaled point
    pub fn hit_test(&self, page_number: u32, x: f64, y: f64, tolerance: f64) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .rev()
            .filter(|a| a.hit_test(page_number, x, y, tolerance))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.next_numbers.clear();
    }
}

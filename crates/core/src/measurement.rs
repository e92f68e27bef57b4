//! Geometry kernel and unit conversion
//!
//! Pure functions over scaled points. Lengths and areas come out in PDF
//! points (and points squared) and are converted to feet through a
//! [`ScalePreset`].

use crate::annotation::{Annotation, Scaled};
use crate::scale::ScalePreset;
use serde::{Deserialize, Serialize};

/// Unit for counted items
pub const UNIT_EACH: &str = "EA";
/// Unit for linear measurements
pub const UNIT_LINEAR_FEET: &str = "LF";
/// Unit for area measurements
pub const UNIT_SQUARE_FEET: &str = "SF";

/// Sum of consecutive Euclidean distances; 0 for fewer than 2 points
pub fn length(points: &[Scaled]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Polygon area by the Shoelace formula over the implicitly closed ring
///
/// Winding direction does not matter. 0 for fewer than 3 points.
pub fn area(points: &[Scaled]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let twice_signed: f64 = (0..n)
        .map(|i| {
            let curr = &points[i];
            let next = &points[(i + 1) % n];
            curr.x() * next.y() - next.x() * curr.y()
        })
        .sum();

    twice_signed.abs() / 2.0
}

/// Length of the ring closed back to its first point; 0 for fewer than 3 points
pub fn perimeter(points: &[Scaled]) -> f64 {
    match points {
        [first, .., last] if points.len() >= 3 => length(points) + last.distance_to(first),
        _ => 0.0,
    }
}

/// Vertex average, used to anchor area labels
pub fn centroid(points: &[Scaled]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x(), sy + p.y()));
    Some((sx / n, sy / n))
}

/// Point halfway along a polyline's length, used to anchor length labels
pub fn midpoint_along(points: &[Scaled]) -> Option<(f64, f64)> {
    let first = points.first()?;
    let half = length(points) / 2.0;

    let mut accumulated = 0.0;
    for w in points.windows(2) {
        let segment = w[0].distance_to(&w[1]);
        if segment > 0.0 && accumulated + segment >= half {
            let t = (half - accumulated) / segment;
            return Some((
                w[0].x() + t * (w[1].x() - w[0].x()),
                w[0].y() + t * (w[1].y() - w[0].y()),
            ));
        }
        accumulated += segment;
    }

    Some((first.x(), first.y()))
}

/// Convert a length in PDF points to feet
pub fn points_to_feet(value: f64, scale: &ScalePreset) -> f64 {
    value / scale.pixels_per_foot
}

/// Convert an area in PDF points squared to square feet
pub fn points_squared_to_square_feet(value: f64, scale: &ScalePreset) -> f64 {
    value / (scale.pixels_per_foot * scale.pixels_per_foot)
}

/// Format a value with its unit
///
/// `decimals == 0` rounds to the nearest whole number; otherwise the value
/// is printed with that many fixed decimals.
pub fn format_measurement(value: f64, unit: &str, decimals: usize) -> String {
    if decimals > 0 {
        format!("{value:.decimals$} {unit}")
    } else {
        // Avoid printing "-0" for tiny negative noise
        let rounded = value.round() + 0.0;
        format!("{rounded:.0} {unit}")
    }
}

/// Derived real-world measurement of one annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
    pub formatted: String,
}

impl Measurement {
    fn new(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_owned(),
            formatted: format_measurement(value, unit, 0),
        }
    }
}

/// Real-world measurement of an annotation under a scale
///
/// Count markers are always one each, whatever their geometry.
pub fn measurement_of(annotation: &Annotation, scale: &ScalePreset) -> Measurement {
    match annotation {
        Annotation::Count(_) => Measurement::new(1.0, UNIT_EACH),
        Annotation::Polyline(p) => {
            Measurement::new(points_to_feet(length(&p.points), scale), UNIT_LINEAR_FEET)
        }
        Annotation::Polygon(p) => Measurement::new(
            points_squared_to_square_feet(area(&p.points), scale),
            UNIT_SQUARE_FEET,
        ),
    }
}

/// Perimeter of a polygon annotation in feet; `None` for other kinds
pub fn perimeter_feet(annotation: &Annotation, scale: &ScalePreset) -> Option<f64> {
    match annotation {
        Annotation::Polygon(p) => Some(points_to_feet(perimeter(&p.points), scale)),
        Annotation::Count(_) | Annotation::Polyline(_) => None,
    }
}

/// Where an overlay should draw the annotation's measurement label
pub fn label_position(annotation: &Annotation) -> Option<(f64, f64)> {
    match annotation {
        Annotation::Count(m) => Some(m.position.bounding_rect.center()),
        Annotation::Polyline(p) => midpoint_along(&p.points),
        Annotation::Polygon(p) => centroid(&p.points),
    }
}

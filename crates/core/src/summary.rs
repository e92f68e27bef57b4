//! Per-item measurement totals
//!
//! Summaries are derived on demand from the annotation list and never
//! stored as a source of truth.

use crate::annotation::{Annotation, Color};
use crate::config::{MeasurementType, TakeoffItemConfig};
use crate::measurement::{area, format_measurement, length, points_squared_to_square_feet, points_to_feet};
use crate::scale::{ScalePreset, ScaleRegistry};
use serde::{Deserialize, Serialize};

/// Aggregated takeoff quantity for one catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementSummary {
    pub item_id: String,
    pub label: String,
    pub color: Color,
    /// Number of annotations tagged with the item
    pub count: usize,
    pub total_value: f64,
    pub unit: String,
    pub formatted: String,
}

/// Summarize annotations per item under a single scale
///
/// Items appear in catalog order; items without annotations are omitted.
/// Linear items only total polylines and area items only total polygons,
/// but `count` includes every annotation tagged with the item.
pub fn summarize(
    annotations: &[Annotation],
    scale: &ScalePreset,
    items: &[TakeoffItemConfig],
) -> Vec<MeasurementSummary> {
    summarize_with(annotations, items, |_| scale)
}

/// Summarize annotations per item, measuring each one under its own page's scale
pub fn summarize_by_page_scale(
    annotations: &[Annotation],
    registry: &ScaleRegistry,
    items: &[TakeoffItemConfig],
) -> Vec<MeasurementSummary> {
    summarize_with(annotations, items, |annotation| {
        registry.resolve(annotation.page_number())
    })
}

fn summarize_with<'a>(
    annotations: &[Annotation],
    items: &[TakeoffItemConfig],
    scale_for: impl Fn(&Annotation) -> &'a ScalePreset,
) -> Vec<MeasurementSummary> {
    items
        .iter()
        .filter_map(|item| {
            let matching: Vec<&Annotation> = annotations
                .iter()
                .filter(|a| a.item_id() == item.id)
                .collect();
            if matching.is_empty() {
                return None;
            }

            let total_value = match item.measurement {
                MeasurementType::Count => matching.len() as f64,
                MeasurementType::Linear => matching
                    .iter()
                    .filter_map(|&a| match a {
                        Annotation::Polyline(p) => {
                            Some(points_to_feet(length(&p.points), scale_for(a)))
                        }
                        _ => None,
                    })
                    .sum(),
                MeasurementType::Area => matching
                    .iter()
                    .filter_map(|&a| match a {
                        Annotation::Polygon(p) => Some(points_squared_to_square_feet(
                            area(&p.points),
                            scale_for(a),
                        )),
                        _ => None,
                    })
                    .sum(),
            };

            let unit = item.measurement.default_unit();
            let formatted = match item.measurement {
                MeasurementType::Count => format!("{total_value}"),
                MeasurementType::Linear | MeasurementType::Area => {
                    format_measurement(total_value, unit, 0)
                }
            };

            Some(MeasurementSummary {
                item_id: item.id.clone(),
                label: item.label.clone(),
                color: item.color,
                count: matching.len(),
                total_value,
                unit: unit.to_owned(),
                formatted,
            })
        })
        .collect()
}

/// Derive an item catalog from the annotations themselves
///
/// Used when summarizing an export without its configuration: one item per
/// distinct `itemId` in first-appearance order, taking label and color from
/// that first annotation and the measurement type from its kind.
pub fn infer_item_configs(annotations: &[Annotation]) -> Vec<TakeoffItemConfig> {
    let mut items: Vec<TakeoffItemConfig> = Vec::new();
    for annotation in annotations {
        if items.iter().any(|item| item.id == annotation.item_id()) {
            continue;
        }
        items.push(TakeoffItemConfig::new(
            annotation.item_id(),
            annotation.label(),
            annotation.color(),
            MeasurementType::for_kind(annotation.kind()),
        ));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{
        AnnotationId, CountMarker, PolygonAnnotation, PolylineAnnotation, Scaled, ScaledPosition,
    };

    fn pt(x: f64, y: f64, page: u32) -> Scaled {
        Scaled::point(x, y, 612.0, 792.0, page)
    }

    fn polyline(id: &str, item: &str, points: Vec<Scaled>) -> Annotation {
        Annotation::Polyline(PolylineAnnotation {
            id: AnnotationId::from(id),
            points,
            item_id: item.to_owned(),
            label: "Silt Fence".to_owned(),
            color: Color::POLYLINE_RED,
            stroke_width: 3.0,
        })
    }

    fn polygon(id: &str, item: &str, side: f64, page: u32) -> Annotation {
        Annotation::Polygon(PolygonAnnotation {
            id: AnnotationId::from(id),
            points: vec![
                pt(0.0, 0.0, page),
                pt(side, 0.0, page),
                pt(side, side, page),
                pt(0.0, side, page),
            ],
            item_id: item.to_owned(),
            label: "Sod".to_owned(),
            color: Color::POLYGON_VIOLET,
            stroke_width: 2.0,
            fill_opacity: 0.2,
        })
    }

    fn marker(id: &str, item: &str, number: u32) -> Annotation {
        Annotation::Count(CountMarker {
            id: AnnotationId::from(id),
            position: ScaledPosition::new(pt(10.0, 10.0, 1)),
            item_id: item.to_owned(),
            label: "Inlet".to_owned(),
            color: Color::COUNT_GREEN,
            number,
        })
    }

    fn catalog() -> Vec<TakeoffItemConfig> {
        vec![
            TakeoffItemConfig::new("inlet", "Curb Inlet", Color::COUNT_GREEN, MeasurementType::Count),
            TakeoffItemConfig::new("fence", "Silt Fence", Color::POLYLINE_RED, MeasurementType::Linear),
            TakeoffItemConfig::new("sod", "Sod", Color::POLYGON_VIOLET, MeasurementType::Area),
        ]
    }

    fn scale_1_20() -> ScalePreset {
        ScalePreset::feet_per_inch(20.0).unwrap()
    }

    #[test]
    fn test_linear_totals_sum_in_feet() {
        // 72 pt = 20 ft and 36 pt = 10 ft at 1" = 20'
        let annotations = vec![
            polyline("a", "fence", vec![pt(0.0, 0.0, 1), pt(72.0, 0.0, 1)]),
            polyline("b", "fence", vec![pt(0.0, 0.0, 1), pt(0.0, 36.0, 1)]),
        ];

        let summary = summarize(&annotations, &scale_1_20(), &catalog());
        assert_eq!(summary.len(), 1);
        let fence = &summary[0];
        assert_eq!(fence.item_id, "fence");
        assert_eq!(fence.label, "Silt Fence");
        assert_eq!(fence.count, 2);
        assert!((fence.total_value - 30.0).abs() < 1e-9);
        assert_eq!(fence.unit, "LF");
        assert_eq!(fence.formatted, "30 LF");
    }

    #[test]
    fn test_count_formatted_is_bare_total() {
        let annotations = vec![marker("m1", "inlet", 1), marker("m2", "inlet", 2), marker("m3", "inlet", 3)];

        let summary = summarize(&annotations, &scale_1_20(), &catalog());
        assert_eq!(summary[0].total_value, 3.0);
        assert_eq!(summary[0].unit, "EA");
        assert_eq!(summary[0].formatted, "3");
    }

    #[test]
    fn test_catalog_order_and_empty_items_omitted() {
        let annotations = vec![
            polygon("p", "sod", 72.0, 1),
            marker("m", "inlet", 1),
            polyline("orphan", "unknown", vec![pt(0.0, 0.0, 1), pt(10.0, 0.0, 1)]),
        ];

        let summary = summarize(&annotations, &scale_1_20(), &catalog());
        let ids: Vec<&str> = summary.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, ["inlet", "sod"]);
        assert!((summary[1].total_value - 400.0).abs() < 1e-9);
        assert_eq!(summary[1].formatted, "400 SF");
    }

    #[test]
    fn test_mismatched_kinds_count_but_do_not_total() {
        // A marker tagged with a linear item adds to count only
        let annotations = vec![
            polyline("a", "fence", vec![pt(0.0, 0.0, 1), pt(72.0, 0.0, 1)]),
            marker("m", "fence", 1),
        ];

        let summary = summarize(&annotations, &scale_1_20(), &catalog());
        assert_eq!(summary[0].count, 2);
        assert!((summary[0].total_value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(summarize(&[], &scale_1_20(), &catalog()).is_empty());
        assert!(summarize(&[marker("m", "inlet", 1)], &scale_1_20(), &[]).is_empty());
    }

    #[test]
    fn test_summarize_by_page_scale() {
        let mut registry = ScaleRegistry::default();
        registry.set_page_scale(1, "1_20").unwrap();
        registry.set_page_scale(2, "1_40").unwrap();

        // 72 pt square: 400 SF at 1" = 20', 1600 SF at 1" = 40'
        let annotations = vec![polygon("p1", "sod", 72.0, 1), polygon("p2", "sod", 72.0, 2)];

        let summary = summarize_by_page_scale(&annotations, &registry, &catalog());
        assert!((summary[0].total_value - 2000.0).abs() < 1e-6);

        let single = summarize(&annotations, registry.resolve(1), &catalog());
        assert!((single[0].total_value - 800.0).abs() < 1e-6);
    }

    #[test]
    fn test_infer_item_configs_first_appearance() {
        let annotations = vec![
            polyline("a", "fence", vec![pt(0.0, 0.0, 1), pt(72.0, 0.0, 1)]),
            marker("m", "inlet", 1),
            polyline("b", "fence", vec![pt(0.0, 0.0, 1), pt(36.0, 0.0, 1)]),
        ];

        let items = infer_item_configs(&annotations);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "fence");
        assert_eq!(items[0].measurement, MeasurementType::Linear);
        assert_eq!(items[1].label, "Inlet");
        assert_eq!(items[1].measurement, MeasurementType::Count);
    }
}

//! Takeoff Core Library
//!
//! Annotation and measurement engine for quantity takeoff on construction
//! PDFs: coordinate transforms between the rendered viewport and scaled page
//! space, drawing tools for counts, lengths and areas, and unit conversion
//! against page scales.

pub mod annotation;
pub mod config;
pub mod coordinates;
pub mod export;
pub mod measurement;
pub mod scale;
pub mod session;
pub mod summary;
pub mod tools;

pub use annotation::{
    Annotation, AnnotationError, AnnotationId, AnnotationKind, AnnotationStore, Color,
    CountMarker, PolygonAnnotation, PolylineAnnotation, Scaled, ScaledPosition,
};
pub use config::{ConfigError, MeasurementType, TakeoffConfig, TakeoffItemConfig};
pub use coordinates::{
    find_page, to_scaled, to_viewport, ClientRect, PageView, PageViewport, Rotation,
    StaticViewer, ViewerContext, ViewportRect,
};
pub use export::{import_from_json, ExportError, ExportResult, TakeoffExport};
pub use measurement::{format_measurement, measurement_of, Measurement};
pub use scale::{default_presets, ScaleError, ScalePreset, ScaleRegistry};
pub use session::{SessionError, SessionEvent, SessionResult, TakeoffSession};
pub use summary::{infer_item_configs, summarize, summarize_by_page_scale, MeasurementSummary};
pub use tools::{DrawingTool, Key, PointerPress, ToolOutput, ToolState};

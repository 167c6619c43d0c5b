// Data model shared by the detection and translation stages

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A 2D point in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Detector quadrilateral, clockwise from the top-left corner.
///
/// Index 0 is the top-left point and index 2 the bottom-right one. The shape is
/// not required to be axis-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Build a quad from `[[x, y]; 4]`, the layout most OCR engines emit
    pub fn from_array(points: [[f32; 2]; 4]) -> Self {
        Self(points.map(|[x, y]| Point::new(x, y)))
    }

    /// Axis-aligned quad covering `width` x `height` pixels at `(x, y)`
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn bottom_right(&self) -> Point {
        self.0[2]
    }
}

/// Raw output of the external text detector. Produced per call, never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    pub quad: Quad,
    pub confidence: f32,
}

/// Axis-aligned rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Derive the rectangle from a quad's top-left and bottom-right points.
    ///
    /// Coordinates are truncated toward zero; width and height are absolute
    /// differences so a mirrored quad still yields a non-negative size.
    pub fn from_quad(quad: &Quad) -> Self {
        let top_left = quad.top_left();
        let bottom_right = quad.bottom_right();

        Self {
            x: top_left.x as i32,
            y: top_left.y as i32,
            width: (bottom_right.x - top_left.x).abs() as u32,
            height: (bottom_right.y - top_left.y).abs() as u32,
        }
    }

    /// `(x1, y1, x2, y2)` corner form. The far corner saturates at `i32::MAX`.
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        (
            self.x,
            self.y,
            self.x.saturating_add(width),
            self.y.saturating_add(height),
        )
    }
}

/// A detection that survived the noise filter, reduced to text and rectangle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub bbox: BoundingBox,
}

impl Fragment {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

impl From<&Detection> for Fragment {
    fn from(detection: &Detection) -> Self {
        Self {
            text: detection.text.clone(),
            bbox: BoundingBox::from_quad(&detection.quad),
        }
    }
}

/// A translated string carrying the bounding box of the fragment it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedFragment {
    pub text: String,
    pub bbox: BoundingBox,
}

/// What gets sent to the translator: target language plus ordered texts.
/// Bounding boxes stay local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRequest {
    pub target_language: String,
    pub items: Vec<String>,
}

impl TranslationRequest {
    pub fn from_fragments(fragments: &[Fragment], target_language: &str) -> Self {
        Self {
            target_language: target_language.to_string(),
            items: fragments.iter().map(|f| f.text.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One element of the translator's structured response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedItem {
    pub text: String,
    /// Echoed request position. Only consulted in indexed pairing mode.
    #[serde(default)]
    pub index: Option<usize>,
}

impl TranslatedItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            index: None,
        }
    }

    pub fn with_index(text: impl Into<String>, index: usize) -> Self {
        Self {
            text: text.into(),
            index: Some(index),
        }
    }
}

/// Where the pipeline reads its image from
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Arc<Vec<u8>>),
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Arc::new(bytes))
    }
}

/// Per-invocation summary returned alongside the translations
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub translations: Vec<TranslatedFragment>,
    pub detections: usize,
    pub fragments: usize,
    pub cache_hit: bool,
    pub detection_time_ms: f64,
    pub translation_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_axis_aligned_quad() {
        let quad = Quad::from_array([[10.0, 20.0], [50.0, 20.0], [50.0, 40.0], [10.0, 40.0]]);
        assert_eq!(BoundingBox::from_quad(&quad), BoundingBox::new(10, 20, 40, 20));
    }

    #[test]
    fn test_bbox_from_mirrored_quad_is_non_negative() {
        // Bottom-right lies up and to the left of top-left
        let quad = Quad::from_array([[50.0, 40.0], [10.0, 40.0], [10.0, 20.0], [50.0, 20.0]]);
        let bbox = BoundingBox::from_quad(&quad);
        assert_eq!(bbox, BoundingBox::new(50, 40, 40, 20));
    }

    #[test]
    fn test_bbox_truncates_fractional_coordinates() {
        let quad = Quad::from_array([[10.7, 20.2], [50.1, 21.0], [50.9, 40.6], [9.5, 39.9]]);
        let bbox = BoundingBox::from_quad(&quad);
        assert_eq!(bbox.x, 10);
        assert_eq!(bbox.y, 20);
        assert_eq!(bbox.width, 40);
        assert_eq!(bbox.height, 20);
        assert_eq!(bbox.corners(), (10, 20, 50, 40));
    }

    #[test]
    fn test_corners_saturate_for_extreme_quads() {
        // Float to int casts saturate, so a huge quad yields i32::MAX / u32::MAX values
        let quad = Quad::from_array([[1.0e12, 1.0e12], [3.0e12, 1.0e12], [3.0e12, 2.0e12], [1.0e12, 2.0e12]]);
        let bbox = BoundingBox::from_quad(&quad);
        assert_eq!(bbox.corners(), (i32::MAX, i32::MAX, i32::MAX, i32::MAX));

        let bbox = BoundingBox::new(-10, 5, u32::MAX, 20);
        assert_eq!(bbox.corners(), (-10, 5, i32::MAX - 10, 25));
    }

    #[test]
    fn test_request_carries_texts_only() {
        let fragments = vec![
            Fragment::new("Press Start", BoundingBox::new(0, 0, 10, 10)),
            Fragment::new("Options", BoundingBox::new(0, 20, 10, 10)),
        ];
        let request = TranslationRequest::from_fragments(&fragments, "German");
        assert_eq!(request.target_language, "German");
        assert_eq!(request.items, vec!["Press Start", "Options"]);
    }

    #[test]
    fn test_translated_item_index_is_optional() {
        let item: TranslatedItem = serde_json::from_str(r#"{"text":"Hallo"}"#).unwrap();
        assert_eq!(item, TranslatedItem::new("Hallo"));

        let item: TranslatedItem = serde_json::from_str(r#"{"text":"Hallo","index":3}"#).unwrap();
        assert_eq!(item.index, Some(3));
    }
}

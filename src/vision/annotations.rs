//! Response model for `images:annotate`.
//!
//! The service omits empty collections and zero-valued coordinates, so every
//! field here is either optional or defaulted. Keys this model doesn't know
//! about are kept in [`AnnotateImageResponse::extra`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Annotations for a single image, one element of the `responses` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_annotations: Vec<EntityAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_annotations: Vec<EntityAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub face_annotations: Vec<FaceAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub landmark_annotations: Vec<EntityAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logo_annotations: Vec<EntityAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_search_annotation: Option<SafeSearchAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_properties_annotation: Option<ImagePropertiesAnnotation>,
    /// Set when the service failed to process this particular image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotateImageResponse {
    /// `true` when no annotation of any kind came back for the image.
    pub fn is_empty(&self) -> bool {
        self.label_annotations.is_empty()
            && self.text_annotations.is_empty()
            && self.face_annotations.is_empty()
            && self.landmark_annotations.is_empty()
            && self.logo_annotations.is_empty()
            && self.safe_search_annotation.is_none()
            && self.image_properties_annotation.is_none()
    }
}

/// Label, text, landmark and logo results share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topicality: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_poly: Option<BoundingPoly>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<LocationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_lng: Option<LatLng>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uint64_value: Option<String>,
}

/// A detected face with its pose, landmarks and emotion likelihoods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_poly: Option<BoundingPoly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fd_bounding_poly: Option<BoundingPoly>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub landmarks: Vec<FaceLandmark>,
    #[serde(default)]
    pub roll_angle: f32,
    #[serde(default)]
    pub pan_angle: f32,
    #[serde(default)]
    pub tilt_angle: f32,
    #[serde(default)]
    pub detection_confidence: f32,
    #[serde(default)]
    pub landmarking_confidence: f32,
    #[serde(default)]
    pub joy_likelihood: Likelihood,
    #[serde(default)]
    pub sorrow_likelihood: Likelihood,
    #[serde(default)]
    pub anger_likelihood: Likelihood,
    #[serde(default)]
    pub surprise_likelihood: Likelihood,
    #[serde(default)]
    pub under_exposed_likelihood: Likelihood,
    #[serde(default)]
    pub blurred_likelihood: Likelihood,
    #[serde(default)]
    pub headwear_likelihood: Likelihood,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmark {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Bucketed likelihood used by face and safe-search results.
/// Values the service doesn't document map to `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Likelihood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::VeryUnlikely => "VERY_UNLIKELY",
            Self::Unlikely => "UNLIKELY",
            Self::Possible => "POSSIBLE",
            Self::Likely => "LIKELY",
            Self::VeryLikely => "VERY_LIKELY",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SafeSearchAnnotation {
    #[serde(default)]
    pub adult: Likelihood,
    #[serde(default)]
    pub spoof: Likelihood,
    #[serde(default)]
    pub medical: Likelihood,
    #[serde(default)]
    pub violence: Likelihood,
    #[serde(default)]
    pub racy: Likelihood,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePropertiesAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_colors: Option<DominantColorsAnnotation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DominantColorsAnnotation {
    #[serde(default)]
    pub colors: Vec<ColorInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub pixel_fraction: f32,
}

/// RGB channels are in `0.0..=255.0`; `alpha` is omitted for opaque colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub red: f32,
    #[serde(default)]
    pub green: f32,
    #[serde(default)]
    pub blue: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
}

/// Per-image error reported inside an otherwise successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Annotation results keyed by image identifier, in registration order.
///
/// Identifiers are the raw-image name, the filename, or the URL that was
/// passed when the image was added to the client.
///
/// ```rust
/// use cloud_vision::vision::{Annotations, AnnotateImageResponse};
///
/// let mut annotations = Annotations::default();
/// annotations.push("cat.jpg", AnnotateImageResponse::default());
/// assert_eq!(annotations.ids().collect::<Vec<_>>(), ["cat.jpg"]);
/// assert!(annotations.get("cat.jpg").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    entries: Vec<(String, AnnotateImageResponse)>,
}

impl Annotations {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, id: impl Into<String>, response: AnnotateImageResponse) {
        self.entries.push((id.into(), response));
    }

    pub fn get(&self, id: &str) -> Option<&AnnotateImageResponse> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, response)| response)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotateImageResponse)> {
        self.entries.iter().map(|(id, response)| (id.as_str(), response))
    }

    /// Images whose response carries an error status.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &Status)> {
        self.entries
            .iter()
            .filter_map(|(id, response)| response.error.as_ref().map(|e| (id.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Annotations {
    type Item = (String, AnnotateImageResponse);
    type IntoIter = std::vec::IntoIter<(String, AnnotateImageResponse)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Extend<(String, AnnotateImageResponse)> for Annotations {
    fn extend<T: IntoIterator<Item = (String, AnnotateImageResponse)>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

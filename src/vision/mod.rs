pub mod annotations;
pub mod batch;
mod client;

pub use annotations::{
    AnnotateImageResponse, Annotations, BoundingPoly, Color, ColorInfo, DominantColorsAnnotation,
    EntityAnnotation, FaceAnnotation, FaceLandmark, ImagePropertiesAnnotation, LatLng, Likelihood,
    LocationInfo, Position, Property, SafeSearchAnnotation, Status, Vertex,
};
pub use client::{DEFAULT_ENDPOINT, VisionClient};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Annotation types understood by the `images:annotate` endpoint.
///
/// Serializes to the wire name (`"LABEL_DETECTION"`, ...). Parsing accepts
/// either the wire name or the short CLI name (`"label"`, `"safe-search"`),
/// case-insensitively.
///
/// ```rust
/// use cloud_vision::vision::Feature;
///
/// assert_eq!("label".parse::<Feature>().unwrap(), Feature::LabelDetection);
/// assert_eq!("FACE_DETECTION".parse::<Feature>().unwrap(), Feature::FaceDetection);
/// assert_eq!(Feature::SafeSearchDetection.as_str(), "SAFE_SEARCH_DETECTION");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    LabelDetection,
    TextDetection,
    FaceDetection,
    LandmarkDetection,
    LogoDetection,
    SafeSearchDetection,
    ImageProperties,
}

impl Feature {
    /// Every feature, in wire-declaration order.
    pub const ALL: [Feature; 7] = [
        Feature::LabelDetection,
        Feature::TextDetection,
        Feature::FaceDetection,
        Feature::LandmarkDetection,
        Feature::LogoDetection,
        Feature::SafeSearchDetection,
        Feature::ImageProperties,
    ];

    /// The wire name sent in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LabelDetection => "LABEL_DETECTION",
            Self::TextDetection => "TEXT_DETECTION",
            Self::FaceDetection => "FACE_DETECTION",
            Self::LandmarkDetection => "LANDMARK_DETECTION",
            Self::LogoDetection => "LOGO_DETECTION",
            Self::SafeSearchDetection => "SAFE_SEARCH_DETECTION",
            Self::ImageProperties => "IMAGE_PROPERTIES",
        }
    }

    /// The short name accepted on the command line.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::LabelDetection => "label",
            Self::TextDetection => "text",
            Self::FaceDetection => "face",
            Self::LandmarkDetection => "landmark",
            Self::LogoDetection => "logo",
            Self::SafeSearchDetection => "safe-search",
            Self::ImageProperties => "image-properties",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| {
                f.as_str().eq_ignore_ascii_case(wanted) || f.short_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| VisionError::UnknownFeature(wanted.to_string()))
    }
}

/// One entry of the `features` array: a feature type and its result bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequest {
    #[serde(rename = "type")]
    pub feature: Feature,
    #[serde(rename = "maxResults")]
    pub max_results: u32,
}

impl FeatureRequest {
    pub fn new(feature: Feature, max_results: u32) -> Self {
        Self { feature, max_results }
    }
}

/// Parses `NAME` or `NAME:MAX`. Without an explicit bound, `maxResults` is 1.
impl FromStr for FeatureRequest {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, max) = match s.split_once(':') {
            Some((name, max)) => {
                let max = max
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| VisionError::InvalidMaxResults(s.to_string()))?;
                (name, max)
            }
            None => (s, 1),
        };
        Ok(Self::new(name.parse()?, max))
    }
}

/// Failures detected locally, before (or instead of) talking to the API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisionError {
    #[error("API key cannot be empty")]
    MissingApiKey,
    #[error("Features cannot be empty")]
    MissingFeatures,
    #[error("Images cannot be empty")]
    MissingImages,
    #[error("Image '{0}' already added")]
    DuplicateImage(String),
    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),
    #[error("Feature '{0}' does not exist")]
    UnknownFeature(String),
    #[error("Invalid max results in '{0}', expected NAME:NUMBER")]
    InvalidMaxResults(String),
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
    #[error("Malformed batch token: {0}")]
    InvalidBatchToken(String),
    #[error("Batch of {expected} image(s) returned {actual} response(s)")]
    ResponseMismatch { expected: usize, actual: usize },
}

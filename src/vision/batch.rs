//! Request batching and response demultiplexing.
//!
//! Images are split into batches of at most `batch_size` requests. Each batch
//! carries a correlation token, the base64-encoded JSON array of the image
//! identifiers it contains, in request order. The service answers with a
//! `responses` array in the same order, so the token is all that's needed to
//! route every response back to its image.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::{AnnotateImageResponse, FeatureRequest, VisionError};

/// An image ready to be sent: its identifier and base64-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub id: String,
    pub content: String,
}

impl EncodedImage {
    /// Encode raw bytes under the given identifier.
    pub fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            id: id.into(),
            content: STANDARD.encode(bytes),
        }
    }
}

/// Body of one `images:annotate` POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateImageRequest {
    pub image: ImageContent,
    pub features: Vec<FeatureRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    pub content: String,
}

/// Body returned by `images:annotate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

/// A request body paired with the token that identifies its images.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub token: String,
    pub body: BatchRequest,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.body.requests.len()
    }
}

/// Split `images` into batches of at most `batch_size` requests.
///
/// Every request carries the full `features` list. Image order is kept both
/// across and within batches. No images means no batches.
pub fn build_batches(
    images: &[EncodedImage],
    features: &[FeatureRequest],
    batch_size: usize,
) -> Result<Vec<Batch>, VisionError> {
    if batch_size == 0 {
        return Err(VisionError::InvalidBatchSize);
    }

    images
        .chunks(batch_size)
        .map(|chunk| {
            let ids: Vec<&str> = chunk.iter().map(|image| image.id.as_str()).collect();
            let requests = chunk
                .iter()
                .map(|image| AnnotateImageRequest {
                    image: ImageContent {
                        content: image.content.clone(),
                    },
                    features: features.to_vec(),
                })
                .collect();

            Ok(Batch {
                token: encode_token(&ids)?,
                body: BatchRequest { requests },
            })
        })
        .collect()
}

/// Encode image identifiers as a base64 JSON array.
pub fn encode_token<S: AsRef<str>>(ids: &[S]) -> Result<String, VisionError> {
    let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    let json =
        serde_json::to_vec(&ids).map_err(|e| VisionError::InvalidBatchToken(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a token produced by [`encode_token`].
pub fn decode_token(token: &str) -> Result<Vec<String>, VisionError> {
    let json = STANDARD
        .decode(token)
        .map_err(|e| VisionError::InvalidBatchToken(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| VisionError::InvalidBatchToken(e.to_string()))
}

/// Pair each response of a batch with the identifier it belongs to.
pub fn correlate(
    token: &str,
    response: BatchResponse,
) -> Result<Vec<(String, AnnotateImageResponse)>, VisionError> {
    let ids = decode_token(token)?;
    if ids.len() != response.responses.len() {
        return Err(VisionError::ResponseMismatch {
            expected: ids.len(),
            actual: response.responses.len(),
        });
    }
    Ok(ids.into_iter().zip(response.responses).collect())
}

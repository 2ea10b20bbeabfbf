//! Face detection capability module
//!
//! Defines the capability interface the gateway delegates to, plus the
//! Watson Visual Recognition v3 client that implements it in production.
//! The interface exists so tests can supply deterministic results and
//! errors without network access.

mod error;
mod types;
mod watson;

pub use error::VisionError;
pub use types::{DetectFacesResult, DetectedImage, Face};
pub use watson::WatsonVisualRecognition;

use async_trait::async_trait;

/// External face-detection capability
///
/// One operation: hand over raw image bytes and a credential, get back the
/// service's detection result. How detection happens is the collaborator's
/// business; this crate only forwards and narrows the answer.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect_faces(
        &self,
        image: &[u8],
        api_key: &str,
    ) -> Result<DetectFacesResult, VisionError>;
}

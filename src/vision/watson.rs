// Watson Visual Recognition v3 client
// POSTs image bytes to the detect_faces endpoint with IAM basic auth

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use super::error::VisionError;
use super::types::DetectFacesResult;
use super::FaceDetector;
use crate::config::WatsonConfig;

pub struct WatsonVisualRecognition {
    client: Client,
    endpoint: String,
    version: String,
}

impl WatsonVisualRecognition {
    pub fn new(config: &WatsonConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            version: config.version.clone(),
        })
    }
}

#[async_trait]
impl FaceDetector for WatsonVisualRecognition {
    async fn detect_faces(
        &self,
        image: &[u8],
        api_key: &str,
    ) -> Result<DetectFacesResult, VisionError> {
        // The service identifies the payload from the part content, so no
        // filename or content type is required beyond the part name.
        let form = Form::new().part("images_file", Part::bytes(image.to_vec()).file_name("image"));

        let resp = self
            .client
            .post(format!("{}/v3/detect_faces", self.endpoint))
            .query(&[("version", self.version.as_str())])
            .basic_auth("apikey", Some(api_key))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            // Keep the service's error body verbatim when it is JSON; wrap
            // plain-text bodies so the client still receives a JSON object.
            let body = serde_json::from_str(&text).unwrap_or_else(|_| {
                serde_json::json!({
                    "status": "err",
                    "message": text,
                })
            });
            return Err(VisionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| VisionError::InvalidResponse(format!("{e}: {text}")))
    }
}

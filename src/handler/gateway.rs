//! Gateway function module
//!
//! Entry point for HTTP request processing. Validates the inbound request,
//! decodes the image payload, delegates to the face-detection capability,
//! and maps the outcome to a JSON response.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body as _, Bytes};
use hyper::header::HeaderValue;
use hyper::{Method, Request, Response, StatusCode, Version};

use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::logger::AccessLogEntry;

const EXPECTED_CONTENT_TYPE: &str = "application/json";
const EXPECTED_METHOD: &str = "post";

const MISSING_KEY_MESSAGE: &str =
    "The parameter \"WATSON_VISUAL_RECOGNITION_KEY\" has not been set.";
const MISSING_IMAGE_MESSAGE: &str = "Required parameter \"image\" is missing.";

/// Inbound request as seen by the gateway function
///
/// Constructed once per call from the raw HTTP request, then dropped when
/// the response is built.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method, lowercased
    pub method: String,
    /// Content-Type header value exactly as received, if any
    pub content_type: Option<String>,
    /// Base64 image payload from the JSON body's `image` field, if any
    pub image: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let http_version = version_label(req.version());

    let access_log = state
        .cached_access_log
        .load(std::sync::atomic::Ordering::Relaxed);

    let mut entry = AccessLogEntry::new(peer_addr.to_string(), method.to_string(), path.clone());
    entry.http_version = http_version.to_string();
    entry.user_agent = header_string(&req, "user-agent");
    entry.referer = header_string(&req, "referer");

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let mut response = dispatch(req, &state, &method, &path).await;

    decorate_response(&mut response, &state);

    if access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.request_time_us =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route between health probes, CORS preflight, and the gateway function
async fn dispatch(
    req: Request<hyper::body::Incoming>,
    state: &Arc<AppState>,
    method: &Method,
    path: &str,
) -> Response<Full<Bytes>> {
    // Health probes answer before the gateway ladder
    let health = &state.config.health;
    if health.enabled
        && *method == Method::GET
        && (path == health.liveness_path || path == health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    // Browsers preflight cross-origin POSTs; only meaningful with CORS on
    if state.config.http.enable_cors && *method == Method::OPTIONS {
        return http::build_options_response(true);
    }

    // Reject oversized bodies before reading them
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    let inbound = extract_inbound(req).await;
    respond(inbound, state).await
}

/// The gateway function: validation ladder, then delegation
///
/// Checks run in a fixed order and the first failure wins: credential,
/// Content-Type, verb, image presence. Every outcome is a JSON response;
/// nothing propagates as an error to the server layer.
pub async fn respond(req: InboundRequest, state: &AppState) -> Response<Full<Bytes>> {
    let Some(credential) = state.config.watson.credential() else {
        return http::err_response(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY_MESSAGE);
    };

    let content_type = req.content_type.as_deref().unwrap_or("none");
    if content_type != EXPECTED_CONTENT_TYPE {
        return http::err_response(
            StatusCode::BAD_REQUEST,
            &format!(
                "Invalid Content-Type headers. Got {content_type}, expected \"{EXPECTED_CONTENT_TYPE}\""
            ),
        );
    }

    if req.method != EXPECTED_METHOD {
        return http::err_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid HTTP request verb. Got {}, expected POST", req.method),
        );
    }

    let Some(image) = req.image else {
        return http::err_response(StatusCode::BAD_REQUEST, MISSING_IMAGE_MESSAGE);
    };

    let image_bytes = match BASE64.decode(image.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            return http::err_response(
                StatusCode::BAD_REQUEST,
                &format!("The \"image\" parameter is not valid base64: {e}"),
            );
        }
    };

    match state.detector.detect_faces(&image_bytes, credential).await {
        Ok(result) => {
            let faces = result.first_image_locations();
            http::json_response(StatusCode::OK, &serde_json::json!({ "faces": faces }))
        }
        Err(e) => {
            logger::log_error(&format!("Face detection failed: {e}"));
            http::passthrough_response(StatusCode::BAD_GATEWAY, &e.payload())
        }
    }
}

/// Build the gateway's view of the request
///
/// Body read or JSON parse failures leave `image` absent rather than
/// short-circuiting, so the validation ladder stays authoritative about
/// which error the client sees.
async fn extract_inbound(req: Request<hyper::body::Incoming>) -> InboundRequest {
    let method = req.method().as_str().to_ascii_lowercase();
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let image = match req.collect().await {
        Ok(collected) => extract_image(&collected.to_bytes()),
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            None
        }
    };

    InboundRequest {
        method,
        content_type,
        image,
    }
}

/// Pull the `image` parameter out of a JSON request body
fn extract_image(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("image")?.as_str().map(ToString::to_string)
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(
    req: &Request<hyper::body::Incoming>,
    max_body_size: u64,
) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response(max_body_size))
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Stamp ambient headers on every outgoing response
fn decorate_response(response: &mut Response<Full<Bytes>>, state: &AppState) {
    if let Ok(name) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert("Server", name);
    }
    if state.config.http.enable_cors {
        response
            .headers_mut()
            .insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    }
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else {
        "1.1"
    }
}

fn header_string(req: &Request<hyper::body::Incoming>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
        WatsonConfig,
    };
    use crate::vision::{DetectFacesResult, DetectedImage, Face, FaceDetector, VisionError};
    use async_trait::async_trait;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Scripted detector: replays a fixed outcome and records its inputs
    struct FakeDetector {
        outcome: Outcome,
        calls: Mutex<Vec<(Vec<u8>, String)>>,
    }

    enum Outcome {
        Faces(Vec<Value>),
        NoImages,
        Upstream { status: u16, body: Value },
    }

    impl FakeDetector {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FaceDetector for FakeDetector {
        async fn detect_faces(
            &self,
            image: &[u8],
            api_key: &str,
        ) -> Result<DetectFacesResult, VisionError> {
            self.calls
                .lock()
                .unwrap()
                .push((image.to_vec(), api_key.to_string()));
            match &self.outcome {
                Outcome::Faces(locations) => Ok(DetectFacesResult {
                    images: vec![DetectedImage {
                        faces: locations
                            .iter()
                            .map(|l| Face {
                                face_location: l.clone(),
                            })
                            .collect(),
                    }],
                }),
                Outcome::NoImages => Ok(DetectFacesResult { images: vec![] }),
                Outcome::Upstream { status, body } => Err(VisionError::Upstream {
                    status: *status,
                    body: body.clone(),
                }),
            }
        }
    }

    fn test_config(api_key: Option<&str>) -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                access_log: false,
                show_headers: false,
                access_log_format: "combined".to_string(),
                access_log_file: None,
                error_log_file: None,
            },
            performance: PerformanceConfig {
                keep_alive_timeout: 75,
                read_timeout: 30,
                write_timeout: 30,
                max_connections: None,
            },
            http: HttpConfig {
                server_name: "face-gateway/test".to_string(),
                enable_cors: false,
                max_body_size: 10_485_760,
            },
            health: HealthConfig::default(),
            watson: WatsonConfig {
                endpoint: "https://example.com/api".to_string(),
                version: "2018-03-19".to_string(),
                timeout_secs: 1,
                api_key: api_key.map(ToString::to_string),
            },
        }
    }

    fn state_with(api_key: Option<&str>, detector: Arc<FakeDetector>) -> AppState {
        AppState::new(test_config(api_key), detector)
    }

    fn valid_request(image: Option<&str>) -> InboundRequest {
        InboundRequest {
            method: "post".to_string(),
            content_type: Some("application/json".to_string()),
            image: image.map(ToString::to_string),
        }
    }

    async fn body_of(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn message_of(body: &str) -> String {
        let value: Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["status"], "err");
        value["message"].as_str().unwrap().to_string()
    }

    // A one-pixel PNG; any bytes would do, the gateway never inspects them
    const IMAGE_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[tokio::test]
    async fn test_missing_credential_returns_500() {
        let state = state_with(None, Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let resp = respond(valid_request(Some(IMAGE_B64)), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(resp).await,
            r#"{"status":"err","message":"The parameter \"WATSON_VISUAL_RECOGNITION_KEY\" has not been set."}"#
        );
    }

    #[tokio::test]
    async fn test_empty_credential_returns_500() {
        let state = state_with(Some(""), Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let resp = respond(valid_request(Some(IMAGE_B64)), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message_of(&body_of(resp).await), MISSING_KEY_MESSAGE);
    }

    #[tokio::test]
    async fn test_wrong_content_type_echoes_actual() {
        let state = state_with(Some("key"), Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let mut req = valid_request(Some(IMAGE_B64));
        req.content_type = Some("text/plain".to_string());
        let resp = respond(req, &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            message_of(&body_of(resp).await),
            "Invalid Content-Type headers. Got text/plain, expected \"application/json\""
        );
    }

    #[tokio::test]
    async fn test_missing_content_type_renders_none() {
        let state = state_with(Some("key"), Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let mut req = valid_request(Some(IMAGE_B64));
        req.content_type = None;
        let resp = respond(req, &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            message_of(&body_of(resp).await),
            "Invalid Content-Type headers. Got none, expected \"application/json\""
        );
    }

    #[tokio::test]
    async fn test_content_type_with_charset_is_rejected() {
        let state = state_with(Some("key"), Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let mut req = valid_request(Some(IMAGE_B64));
        req.content_type = Some("application/json; charset=utf-8".to_string());
        let resp = respond(req, &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_verb_echoes_actual() {
        let state = state_with(Some("key"), Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let mut req = valid_request(Some(IMAGE_B64));
        req.method = "get".to_string();
        let resp = respond(req, &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            message_of(&body_of(resp).await),
            "Invalid HTTP request verb. Got get, expected POST"
        );
    }

    #[tokio::test]
    async fn test_credential_check_wins_over_content_type() {
        let state = state_with(None, Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let mut req = valid_request(Some(IMAGE_B64));
        req.content_type = Some("text/plain".to_string());
        req.method = "get".to_string();
        let resp = respond(req, &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_content_type_check_wins_over_verb() {
        let state = state_with(Some("key"), Arc::new(FakeDetector::new(Outcome::Faces(vec![]))));
        let mut req = valid_request(Some(IMAGE_B64));
        req.content_type = Some("text/plain".to_string());
        req.method = "get".to_string();
        let resp = respond(req, &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(message_of(&body_of(resp).await).starts_with("Invalid Content-Type headers."));
    }

    #[tokio::test]
    async fn test_missing_image_returns_400() {
        let detector = Arc::new(FakeDetector::new(Outcome::Faces(vec![])));
        let state = state_with(Some("key"), Arc::clone(&detector));
        let resp = respond(valid_request(None), &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(message_of(&body_of(resp).await), MISSING_IMAGE_MESSAGE);
        assert!(detector.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_base64_returns_400() {
        let detector = Arc::new(FakeDetector::new(Outcome::Faces(vec![])));
        let state = state_with(Some("key"), Arc::clone(&detector));
        let resp = respond(valid_request(Some("not base64!!!")), &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(message_of(&body_of(resp).await)
            .starts_with("The \"image\" parameter is not valid base64"));
        assert!(detector.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_narrows_to_face_locations() {
        let locations = vec![
            json!({"top": 1, "left": 2, "width": 3, "height": 4}),
            json!({"top": 5, "left": 6, "width": 7, "height": 8}),
        ];
        let detector = Arc::new(FakeDetector::new(Outcome::Faces(locations.clone())));
        let state = state_with(Some("key"), Arc::clone(&detector));
        let resp = respond(valid_request(Some(IMAGE_B64)), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_of(resp).await).unwrap();
        assert_eq!(body["faces"].as_array().unwrap().len(), 2);
        assert_eq!(body["faces"], json!(locations));
    }

    #[tokio::test]
    async fn test_detector_receives_decoded_bytes_and_credential() {
        let detector = Arc::new(FakeDetector::new(Outcome::Faces(vec![])));
        let state = state_with(Some("key"), Arc::clone(&detector));
        respond(valid_request(Some(IMAGE_B64)), &state).await;

        let calls = detector.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (bytes, key) = &calls[0];
        assert_eq!(*bytes, BASE64.decode(IMAGE_B64).unwrap());
        assert_eq!(key, "key");
    }

    #[tokio::test]
    async fn test_no_images_yields_empty_faces() {
        let detector = Arc::new(FakeDetector::new(Outcome::NoImages));
        let state = state_with(Some("key"), detector);
        let resp = respond(valid_request(Some(IMAGE_B64)), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, r#"{"faces":[]}"#);
    }

    #[tokio::test]
    async fn test_upstream_error_passes_through_unwrapped() {
        let upstream_body = json!({"code": 403, "error": "Forbidden", "description": "bad key"});
        let detector = Arc::new(FakeDetector::new(Outcome::Upstream {
            status: 403,
            body: upstream_body.clone(),
        }));
        let state = state_with(Some("key"), detector);
        let resp = respond(valid_request(Some(IMAGE_B64)), &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_of(resp).await,
            serde_json::to_string(&upstream_body).unwrap()
        );
    }

    #[tokio::test]
    async fn test_idempotence_of_valid_request() {
        let locations = vec![json!({"top": 1, "left": 2, "width": 3, "height": 4})];
        let detector = Arc::new(FakeDetector::new(Outcome::Faces(locations)));
        let state = state_with(Some("key"), detector);

        let first = body_of(respond(valid_request(Some(IMAGE_B64)), &state).await).await;
        let second = body_of(respond(valid_request(Some(IMAGE_B64)), &state).await).await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_image_present() {
        let body = format!(r#"{{"image":"{IMAGE_B64}"}}"#);
        assert_eq!(extract_image(body.as_bytes()), Some(IMAGE_B64.to_string()));
    }

    #[test]
    fn test_extract_image_field_missing() {
        assert_eq!(extract_image(br#"{"other":"value"}"#), None);
    }

    #[test]
    fn test_extract_image_invalid_json() {
        assert_eq!(extract_image(b"not json"), None);
        assert_eq!(extract_image(b""), None);
    }

    #[test]
    fn test_extract_image_non_string() {
        assert_eq!(extract_image(br#"{"image":42}"#), None);
    }
}

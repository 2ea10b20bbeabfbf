//! HTTP response building module
//!
//! Every response this service produces is JSON with an explicit status
//! code. Builders fall back to a bare response instead of panicking when
//! header assembly fails.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Build a JSON response from any serializable body
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(body) {
        Ok(json) => build_json(status, Bytes::from(json)),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            build_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from(r#"{"status":"err","message":"Internal server error"}"#),
            )
        }
    }
}

/// Error body shared by every validation and configuration failure
#[derive(Serialize)]
struct ErrBody<'a> {
    status: &'a str,
    message: &'a str,
}

/// Build an error response with the standard `{"status":"err",...}` body
pub fn err_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrBody {
            status: "err",
            message,
        },
    )
}

/// Build a response whose body is a pre-shaped JSON value, unwrapped
///
/// Used for the delegated-error path: the upstream error payload becomes
/// the response body exactly as the collaborator reported it.
pub fn passthrough_response(
    status: StatusCode,
    payload: &serde_json::Value,
) -> Response<Full<Bytes>> {
    json_response(status, payload)
}

/// Build a health probe response
pub fn build_health_response(status_text: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "status": status_text });
    json_response(StatusCode::OK, &body)
}

/// Build 413 Payload Too Large response
pub fn build_413_response(max_body_size: u64) -> Response<Full<Bytes>> {
    err_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("Request body exceeds the {max_body_size} byte limit"),
    )
}

/// Build OPTIONS response (CORS preflight)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "POST, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

fn build_json(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from(
                r#"{"status":"err","message":"Internal server error"}"#,
            )))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

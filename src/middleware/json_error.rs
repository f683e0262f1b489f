use axum::{
    body::{Bytes, to_bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    response::{JsonApiResponse, log_app_error},
};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

/// Rewrites non-JSON error responses (extractor rejections, unmatched
/// routes) into the JSON envelope.
pub async fn json_error_middleware(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    if !response.status().is_client_error() && !response.status().is_server_error() {
        return response;
    }

    if is_json_response(&response) {
        return response;
    }

    let status = response.status();
    let (parts, body) = response.into_parts();
    let message = match to_bytes(body, MAX_ERROR_BODY_BYTES).await {
        Ok(bytes) => body_bytes_to_message(status, bytes),
        Err(_) => default_message(status),
    };
    let app_error = app_error_from_status(status, message);
    if status.is_server_error() {
        log_app_error(&app_error);
    }

    let mut new_response = JsonApiResponse::from_error(&app_error).into_response();
    copy_headers(&parts.headers, &mut new_response);
    new_response
}

fn is_json_response(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let value = value.to_ascii_lowercase();
            value.contains("application/json") || value.contains("+json")
        })
        .unwrap_or(false)
}

fn body_bytes_to_message(status: StatusCode, bytes: Bytes) -> String {
    let message = String::from_utf8_lossy(&bytes).trim().to_string();
    if message.is_empty() {
        return default_message(status);
    }
    message
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

fn app_error_from_status(status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::unauthorized("unauthorized", message),
        StatusCode::FORBIDDEN => AppError::forbidden(message),
        StatusCode::NOT_FOUND => AppError::not_found(message),
        StatusCode::CONFLICT => AppError::conflict(message),
        _ if status.is_client_error() => AppError::new(status, "bad_request", message),
        _ => AppError::new(status, "internal", message),
    }
}

fn copy_headers(src: &HeaderMap, dest: &mut Response) {
    for (name, value) in src {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        dest.headers_mut().insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::app_error_from_status;

    #[test]
    fn keeps_rejection_status_and_assigns_code() {
        let err = app_error_from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing field `email`".to_string(),
        );

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "bad_request");
        assert_eq!(err.message, "missing field `email`");
        assert_eq!(
            app_error_from_status(StatusCode::NOT_FOUND, String::new()).code,
            "not_found"
        );
    }
}

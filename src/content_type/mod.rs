//! Content-Type enforcement for routes that accept a JSON body.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;

/// Reject requests whose body is not declared as `application/json`.
///
/// Parameters such as `charset` are accepted.
pub async fn enforce_json(request: Request, next: Next) -> Response {
    match check(request.headers().get(header::CONTENT_TYPE)) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

fn check(value: Option<&header::HeaderValue>) -> Result<(), AppError> {
    let value = value
        .ok_or_else(|| AppError::BadRequest("Content-Type header is missing".into()))?
        .to_str()
        .map_err(|_| AppError::BadRequest("Content-Type header is not valid ASCII".into()))?;

    let parsed: mime::Mime = value
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Malformed Content-Type {value:?}: {e}")))?;

    if parsed.essence_str() != mime::APPLICATION_JSON.essence_str() {
        return Err(AppError::UnsupportedMediaType(format!(
            "Content-Type must be application/json, was {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn status(value: Option<&'static str>) -> Option<StatusCode> {
        let header = value.map(HeaderValue::from_static);
        check(header.as_ref()).err().map(|e| e.status_code())
    }

    #[test]
    fn test_json_accepted() {
        assert_eq!(status(Some("application/json")), None);
        assert_eq!(status(Some("application/json; charset=utf-8")), None);
    }

    #[test]
    fn test_missing_or_malformed_is_bad_request() {
        assert_eq!(status(None), Some(StatusCode::BAD_REQUEST));
        assert_eq!(status(Some("json")), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_other_media_type_unsupported() {
        assert_eq!(status(Some("text/plain")), Some(StatusCode::UNSUPPORTED_MEDIA_TYPE));
        assert_eq!(
            status(Some("application/xml")),
            Some(StatusCode::UNSUPPORTED_MEDIA_TYPE)
        );
    }
}

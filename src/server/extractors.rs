//! Custom extractors for the HTTP server.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Extractor for JSON request bodies.
///
/// Unlike `axum::Json`, every rejection (wrong content type, unreadable body,
/// malformed JSON) is reported as an [`AppError::BadRequest`] so clients get
/// the usual `{"error": ...}` body.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.contains("json") {
            return Err(AppError::BadRequest(format!(
                "Invalid content type: expected application/json, got '{content_type}'"
            )));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {e}")))?;

        decode(&bytes).map(JsonBody)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptionRequest;

    #[test]
    fn test_decode_caption_request() {
        let req: CaptionRequest = decode(br#"{"caption": "a dog on a beach"}"#).unwrap();
        assert_eq!(req.caption, "a dog on a beach");
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode::<CaptionRequest>(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(err.to_string().starts_with("Invalid JSON body"));
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(decode::<CaptionRequest>(b"").is_err());
    }
}

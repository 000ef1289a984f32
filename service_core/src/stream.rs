use crate::error::{InferenceError, ServiceError};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream;
use std::convert::Infallible;

pub const PNG_MEDIA_TYPE: &str = "image/png";
pub const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

const CHUNK_SIZE: usize = 64 * 1024;

/// A fully produced inference result, streamed to the client in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct ResponseStream {
    body: Bytes,
    media_type: &'static str,
    filename: Option<String>,
    headers: Vec<(HeaderName, String)>,
}

impl ResponseStream {
    pub fn new(body: impl Into<Bytes>, media_type: &'static str) -> Self {
        Self {
            body: body.into(),
            media_type,
            filename: None,
            headers: Vec::new(),
        }
    }

    pub fn png(body: impl Into<Bytes>) -> Self {
        Self::new(body, PNG_MEDIA_TYPE)
    }

    pub fn attachment(body: impl Into<Bytes>, filename: &str) -> Self {
        let mut response = Self::new(body, OCTET_STREAM_MEDIA_TYPE);
        response.filename = Some(filename.to_string());
        response
    }

    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn chunks(&self) -> Vec<Bytes> {
        (0..self.body.len())
            .step_by(CHUNK_SIZE)
            .map(|start| {
                let end = (start + CHUNK_SIZE).min(self.body.len());
                self.body.slice(start..end)
            })
            .collect()
    }

    fn build(self) -> Result<Response, axum::http::Error> {
        let chunks = self.chunks();

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, self.media_type)
            .header(header::CONTENT_LENGTH, self.body.len());
        if let Some(filename) = &self.filename {
            builder = builder.header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            );
        }
        for (name, value) in self.headers {
            builder = builder.header(name, HeaderValue::try_from(value)?);
        }

        let body = Body::from_stream(stream::iter(chunks.into_iter().map(Ok::<_, Infallible>)));
        builder.body(body)
    }
}

impl IntoResponse for ResponseStream {
    fn into_response(self) -> Response {
        match self.build() {
            Ok(response) => response,
            Err(e) => ServiceError::from(InferenceError::Encode(format!(
                "failed to build response: {}",
                e
            )))
            .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[test]
    fn test_chunks_cover_body() {
        let payload: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let response = ResponseStream::png(payload.clone());

        let chunks = response.chunks();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 17);
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn test_png_response_headers() {
        let response = ResponseStream::png(vec![1u8, 2, 3]).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
        assert_eq!(body_bytes(response).await.as_ref(), &[1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_attachment_response_headers() {
        let response = ResponseStream::attachment(vec![0u8; 10], "embedding.npy")
            .with_header(HeaderName::from_static("x-input-size"), "1024,768")
            .into_response();

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=embedding.npy"
        );
        assert_eq!(response.headers()["x-input-size"], "1024,768");
        assert_eq!(body_bytes(response).await.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_body_has_zero_length() {
        let stream = ResponseStream::attachment(Bytes::new(), "embedding.npy");
        assert!(stream.chunks().is_empty());

        let response = stream.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_header_becomes_internal_error() {
        let response = ResponseStream::png(vec![1u8])
            .with_header(HeaderName::from_static("x-bad"), "line\nbreak")
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Json;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Deserialize a request body that may arrive as JSON or as a multipart
/// form. Multipart text fields become JSON strings; file parts are encoded
/// into inline `data:` URLs under their field name, so "avatar" and "image"
/// land in the same struct field whichever way the client sends them.
pub async fn read_body<T: DeserializeOwned>(req: Request) -> AppResult<T> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?;

        let mut fields = serde_json::Map::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if field.file_name().is_some() {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;
                fields.insert(name, Value::String(to_data_url(&mime, &data)));
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid multipart field: {e}")))?;
                fields.insert(name, Value::String(text));
            }
        }

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::BadRequest(format!("Invalid form: {e}")))
    } else {
        let Json(body) = Json::<T>::from_request(req, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(body)
    }
}

/// Encode uploaded bytes as an inline data URL, the canonical image form.
pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct SampleForm {
        title: String,
        image: Option<String>,
    }

    #[test]
    fn data_url_encodes_mime_and_payload() {
        let url = to_data_url("image/png", b"abc");
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn json_body_deserializes() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Hi"}"#))
            .unwrap();

        let form: SampleForm = read_body(req).await.unwrap();
        assert_eq!(form.title, "Hi");
        assert!(form.image.is_none());
    }

    #[tokio::test]
    async fn multipart_body_deserializes_with_file_as_data_url() {
        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             Hi\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             abc\r\n\
             --{boundary}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let form: SampleForm = read_body(req).await.unwrap();
        assert_eq!(form.title, "Hi");
        assert_eq!(form.image.as_deref(), Some("data:image/png;base64,YWJj"));
    }

    #[tokio::test]
    async fn missing_required_field_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"image":null}"#))
            .unwrap();

        let err = read_body::<SampleForm>(req).await.unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }
}

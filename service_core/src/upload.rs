use crate::error::ClientError;
use axum::extract::Multipart;
use bytes::Bytes;

/// A file read from a multipart request. The file name is as the client declared it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub data: Bytes,
}

/// Buffers the first multipart field named `field_name`. Other fields are skipped.
pub async fn read_upload(
    mut multipart: Multipart,
    field_name: &'static str,
) -> Result<Upload, ClientError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await?;

        return Ok(Upload { file_name, data });
    }

    Err(ClientError::MissingField(field_name))
}

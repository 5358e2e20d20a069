use crate::http::build_client;
use crate::market::config::ROOT;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Request(String),
    #[error("image processing failed: {0}")]
    Processing(String),
}

/// Completed upload as the server reports it: processing has finished for at
/// least one size variant. Raw upload progress never reaches the wizard.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedUpload {
    pub id: String,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

pub async fn upload_image(
    bytes: Vec<u8>,
    content_type: &str,
    access_token: &str,
) -> Result<CompletedUpload, UploadError> {
    let client = build_client();
    let url = format!("{}/market/v1/images", *ROOT);
    let response = client
        .post(url)
        .bearer_auth(access_token)
        .header("Content-Type", content_type)
        .body(bytes)
        .send()
        .await
        .map_err(|err| UploadError::Request(err.to_string()))?;

    if response.status() == 422 {
        return Err(UploadError::Processing("unsupported image".into()));
    }
    if !response.status().is_success() {
        return Err(UploadError::Request(format!("HTTP {}", response.status())));
    }

    let payload: CompletedUpload = response
        .json()
        .await
        .map_err(|err| UploadError::Request(err.to_string()))?;
    if payload.variants.is_empty() {
        return Err(UploadError::Processing("no variants produced".into()));
    }
    Ok(payload)
}

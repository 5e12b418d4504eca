//! Asset storage: presigned upload URLs for images and 3D models

pub mod presign;

pub use presign::Presigner;

use chrono::Utc;
use ensayo_common::{Error, Result};
use serde::Serialize;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 10;

/// A presigned upload and the permanent URL of the uploaded asset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// URL to `PUT` the asset body to
    pub url: String,
    /// `url` without its query string
    pub asset_url: String,
    pub key: String,
    pub expires_in: u64,
}

/// `images/<hex>`
pub fn image_key() -> String {
    format!("images/{}", Uuid::new_v4().simple())
}

/// `objects/<hex>.<ext>`
///
/// The extension is limited to a short alphanumeric suffix such as `glb`.
pub fn object_key(extension: &str) -> Result<String> {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(Error::Validation(format!(
            "invalid object extension '{}'",
            extension
        )));
    }
    Ok(format!(
        "objects/{}.{}",
        Uuid::new_v4().simple(),
        extension.to_ascii_lowercase()
    ))
}

/// Presign an upload for `key` valid from now
pub fn presign_upload(presigner: &Presigner, key: String) -> Result<PresignedUpload> {
    let url = presigner.presign_put(&key, Utc::now())?;
    let asset_url = strip_query(&url).to_string();
    Ok(PresignedUpload {
        url,
        asset_url,
        key,
        expires_in: presigner.expiry_secs(),
    })
}

/// Permanent asset URL of a presigned URL
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

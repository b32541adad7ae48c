/// Supabase Storage client for recipe images
///
/// Objects are uploaded with the service-role key and served through the
/// bucket's public URL.

use bytes::Bytes;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::http::{build_client, ensure_success, ClientError};

const SERVICE: &str = "supabase-storage";

/// Largest recipe image accepted
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image content types accepted for recipes, with their file extension
pub const IMAGE_TYPES: [(&str, &str); 3] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// File extension for an accepted image content type
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    IMAGE_TYPES
        .iter()
        .find(|(ty, _)| ty.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// Object key for a recipe image: `{user_id}/{recipe_id}-{random}.{ext}`
pub fn recipe_image_path(user_id: Uuid, recipe_id: Uuid, extension: &str) -> String {
    format!("{}/{}-{}.{}", user_id, recipe_id, Uuid::new_v4(), extension)
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    /// Public URL of an object in the bucket
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    /// Uploads (or replaces) an object and returns its public URL
    pub async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, ClientError> {
        let size = data.len();

        let response = self
            .http
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, self.bucket, path
            ))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| ClientError::network(SERVICE, e))?;

        let uploaded: UploadResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse {
                service: SERVICE,
                message: e.to_string(),
            })?;

        info!(
            bucket = %self.bucket,
            path,
            size,
            key = uploaded.key.as_deref().unwrap_or(""),
            "Uploaded object to storage"
        );

        Ok(self.public_url(path))
    }
}

//! Blob store trait and implementations

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use echolens_core::audio::{self, MIN_AUDIO_BYTES};
use echolens_core::config::StorageConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Interface to the bucket holding call recordings
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check whether an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Download an object's raw bytes
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Download an object and reject payloads that cannot be a recording
    ///
    /// Applies the size floor and masquerade checks so every implementation
    /// enforces the same rules.
    async fn fetch_recording(&self, key: &str) -> StorageResult<Vec<u8>> {
        let bytes = self.download(key).await?;

        if bytes.len() < MIN_AUDIO_BYTES {
            warn!(key, size = bytes.len(), "Downloaded object below size floor");
            return Err(StorageError::TooSmall {
                key: key.to_string(),
                size: bytes.len(),
                min: MIN_AUDIO_BYTES,
            });
        }

        if let Some(kind) = audio::detect_masquerade(&bytes) {
            warn!(key, kind, "Downloaded object is not audio");
            return Err(StorageError::NotAudio {
                key: key.to_string(),
                kind: kind.to_string(),
            });
        }

        debug!(key, size = bytes.len(), "Downloaded recording");
        Ok(bytes)
    }
}

/// Blob store backed by an S3-compatible HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    access_token: String,
}

impl HttpBlobStore {
    /// Create a store from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let response = self
            .client
            .head(self.object_url(key))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        match response.status().as_u16() {
            200..=299 => Ok(true),
            404 => Ok(false),
            status => Err(StorageError::rejected(
                status,
                response.status().canonical_reason().unwrap_or("unknown"),
            )),
        }
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(StorageError::not_found(key));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::rejected(status.as_u16(), message));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// In-memory blob store for tests
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an object into the store
    pub fn put(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.write().insert(key.into(), bytes);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().contains_key(key))
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn wav_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[..4].copy_from_slice(b"RIFF");
        bytes[8..12].copy_from_slice(b"WAVE");
        bytes
    }

    fn test_config(endpoint: &str) -> StorageConfig {
        StorageConfig {
            endpoint: endpoint.to_string(),
            bucket: "echolens-call-recordings".to_string(),
            access_token: "test-token".to_string(),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryBlobStore::new();
        store.put("uploads/a.wav", wav_bytes(2048));

        assert!(store.exists("uploads/a.wav").await.unwrap());
        assert!(!store.exists("uploads/b.wav").await.unwrap());

        let bytes = store.fetch_recording("uploads/a.wav").await.unwrap();
        assert_eq!(bytes.len(), 2048);
    }

    #[tokio::test]
    async fn test_fetch_rejects_tiny_objects() {
        let store = MemoryBlobStore::new();
        store.put("uploads/tiny.wav", wav_bytes(16));

        let result = store.fetch_recording("uploads/tiny.wav").await;
        assert!(matches!(result, Err(StorageError::TooSmall { size: 16, .. })));
    }

    #[tokio::test]
    async fn test_fetch_rejects_html_masquerade() {
        let store = MemoryBlobStore::new();
        let mut body = b"<html><body>Access denied</body></html>".to_vec();
        body.resize(2048, b' ');
        store.put("uploads/error.wav", body);

        let result = store.fetch_recording("uploads/error.wav").await;
        assert!(matches!(result, Err(StorageError::NotAudio { .. })));
    }

    #[tokio::test]
    async fn test_http_store_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/echolens-call-recordings/uploads/a.wav"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes(4096)))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(&test_config(&server.uri())).unwrap();
        let bytes = store.fetch_recording("uploads/a.wav").await.unwrap();
        assert_eq!(bytes.len(), 4096);
    }

    #[tokio::test]
    async fn test_http_store_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(&test_config(&server.uri())).unwrap();
        let result = store.download("uploads/gone.wav").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_http_store_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/echolens-call-recordings/uploads/a.wav"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpBlobStore::new(&test_config(&server.uri())).unwrap();
        assert!(store.exists("uploads/a.wav").await.unwrap());
        assert!(!store.exists("uploads/b.wav").await.unwrap());
    }
}

//! Object-store upload client.
//!
//! The object store itself is an external blob sink — out of scope for this
//! crate beyond its URL contract: PUT the bytes, get back a public URL. On
//! any failure the recording URL is simply empty; the completion event is
//! still dispatched (see the failure semantics in §4.10 of the bridge's
//! design).

use async_trait::async_trait;
use tracing::warn;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_wav(&self, call_id: &str, bytes: Vec<u8>) -> String;
}

pub struct HttpUploader {
    client: reqwest::Client,
    base_url: Option<String>,
    service_key: Option<String>,
}

impl HttpUploader {
    pub fn new(base_url: Option<String>, service_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url, service_key }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload_wav(&self, call_id: &str, bytes: Vec<u8>) -> String {
        let Some(base_url) = &self.base_url else {
            warn!("upload: no object store configured, recordingUrl will be empty");
            return String::new();
        };

        let object_url = format!("{}/{}.wav", base_url.trim_end_matches('/'), call_id);
        let mut req = self.client.put(&object_url).header("content-type", "audio/wav").body(bytes);
        if let Some(key) = &self.service_key {
            req = req.bearer_auth(key);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => object_url,
            Ok(resp) => {
                warn!("upload: object store responded with {}", resp.status());
                String::new()
            }
            Err(e) => {
                warn!("upload: request failed: {e}");
                String::new()
            }
        }
    }
}

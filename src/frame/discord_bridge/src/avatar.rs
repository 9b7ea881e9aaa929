use crate::ids::ContentUri;
use crate::intent::Intent;
use anyhow::{bail, Context, Result as AnyResult};
use async_trait::async_trait;
use log::*;
use reqwest::Client as HttpClient;
use std::time::Duration;

const AVATAR_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_MIME: &str = "application/octet-stream";

#[async_trait]
pub trait AvatarFetcher: Send + Sync {
    /// Downloads an image, returning the bytes and their mime type.
    async fn fetch(&self, url: &str) -> AnyResult<(Vec<u8>, String)>;
}

pub struct HttpAvatarFetcher {
    http: HttpClient,
}

impl HttpAvatarFetcher {
    pub fn new() -> AnyResult<Self> {
        let http = HttpClient::builder()
            .timeout(AVATAR_FETCH_TIMEOUT)
            .build()
            .context("failed to build avatar http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl AvatarFetcher for HttpAvatarFetcher {
    async fn fetch(&self, url: &str) -> AnyResult<(Vec<u8>, String)> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned {}", url, status);
        }
        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        let data = resp.bytes().await?.to_vec();
        Ok((data, mime))
    }
}

/// Downloads a remote avatar and re-hosts it on the homeserver as `intent`.
pub async fn reupload_avatar(
    intent: &dyn Intent,
    fetcher: &dyn AvatarFetcher,
    url: &str,
) -> AnyResult<ContentUri> {
    let (data, mime) = fetcher.fetch(url).await?;
    debug!("uploading avatar {} ({} bytes, {})", url, data.len(), mime);
    let uri = intent
        .upload_media(data, &mime)
        .await
        .with_context(|| format!("upload avatar {} as {}", url, intent.user_id()))?;
    if uri.is_empty() {
        bail!("homeserver returned an empty content uri for {}", url);
    }
    Ok(uri)
}

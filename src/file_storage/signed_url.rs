//! # Signed URL Generation
//!
//! URLs have the form
//!
//! ```text
//! <base>/<bucket>/<folder>/<key>/<filename>?md5=<sig>&expires=<secs>[&shardkey=<k>]&filename=<filename>
//! ```
//!
//! where `sig` is the unpadded URL-safe base64 MD5 of
//! `expires + percent_decode(uri) + secret`. Expiry snaps to a window grid
//! anchored at the creation time, so repeated issuance for the same creation
//! time yields the same URL until the grid advances.

use std::borrow::Cow;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::config::StorageConfig;
use super::errors::{StorageError, StorageResult};
use super::path::validate_key;

/// Query parameter carrying the caller's shard key
pub const SHARD_KEY_PARAM: &str = "shardkey";

/// Which validity window a URL is signed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    /// Lives as long as an editing session
    Session,
    /// Everything else
    Temporary,
}

/// Per-call context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub shard_key: Option<String>,
}

impl RequestContext {
    pub fn with_shard_key(shard_key: impl Into<String>) -> Self {
        Self {
            shard_key: Some(shard_key.into()),
        }
    }
}

/// Input to [`SignedUrlIssuer::issue`]
#[derive(Debug, Clone)]
pub struct SignedUrlRequest {
    pub base_url: String,
    pub key: String,
    pub url_type: UrlType,
    /// Name shown to the user; defaults to the last key segment
    pub filename: Option<String>,
    /// Anchor of the expiry grid, in Unix milliseconds; defaults to now
    pub created_at_ms: Option<i64>,
}

impl SignedUrlRequest {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>, url_type: UrlType) -> Self {
        Self {
            base_url: base_url.into(),
            key: key.into(),
            url_type,
            filename: None,
            created_at_ms: None,
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn created_at(mut self, created_at_ms: i64) -> Self {
        self.created_at_ms = Some(created_at_ms);
        self
    }
}

/// Signed URL issuer
#[derive(Debug, Clone)]
pub struct SignedUrlIssuer {
    bucket_name: String,
    storage_folder_name: String,
    secret: String,
    general_window_secs: u64,
    session_window_secs: u64,
}

impl SignedUrlIssuer {
    /// Create an issuer, rejecting configuration that fails validation
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self {
            bucket_name: config.bucket_name.clone(),
            storage_folder_name: config.storage_folder_name.clone(),
            secret: config.shared_secret.clone(),
            general_window_secs: config.general_window_secs(),
            session_window_secs: config.session_window_secs(),
        })
    }

    /// Window length for a URL type, in seconds
    pub fn window_secs(&self, url_type: UrlType) -> u64 {
        match url_type {
            UrlType::Session => self.session_window_secs,
            UrlType::Temporary => self.general_window_secs,
        }
    }

    /// Issue a URL using the current wall clock
    pub fn issue(&self, ctx: &RequestContext, request: &SignedUrlRequest) -> StorageResult<String> {
        self.issue_at(ctx, request, Utc::now().timestamp_millis())
    }

    /// Issue a URL as if the current time were `now_ms`
    pub fn issue_at(
        &self,
        ctx: &RequestContext,
        request: &SignedUrlRequest,
        now_ms: i64,
    ) -> StorageResult<String> {
        validate_key(&request.key)?;

        let filename = display_filename(&request.key, request.filename.as_deref());
        let uri = self.canonical_uri(&request.key, &filename);

        let window = self.window_secs(request.url_type);
        let created_at_ms = request.created_at_ms.unwrap_or(now_ms);
        let expires = expires_at(created_at_ms, now_ms, window);
        let signature = self.signature_for(expires, &uri);

        let mut url = request.base_url.trim_end_matches('/').replace('_', "%5f");
        url.push_str(&uri);
        url.push_str("?md5=");
        url.push_str(&urlencoding::encode(&signature));
        url.push_str("&expires=");
        url.push_str(&expires.to_string());
        if let Some(shard_key) = ctx.shard_key.as_deref() {
            url.push('&');
            url.push_str(SHARD_KEY_PARAM);
            url.push('=');
            url.push_str(&urlencoding::encode(shard_key));
        }
        url.push_str("&filename=");
        url.push_str(&filename);

        tracing::debug!(
            key = %request.key,
            url_type = ?request.url_type,
            expires,
            "issued signed url"
        );

        Ok(url)
    }

    /// `/<bucket>/<folder>/<key>/<filename>`, in transport encoding
    pub fn canonical_uri(&self, key: &str, display_filename: &str) -> String {
        format!(
            "/{}/{}/{}/{}",
            self.bucket_name, self.storage_folder_name, key, display_filename
        )
    }

    /// Signature over an expiry and a transport-encoded canonical URI
    pub fn signature_for(&self, expires: i64, uri: &str) -> String {
        let decoded = percent_decode(uri);
        let digest = md5::compute(format!("{}{}{}", expires, decoded, self.secret));
        URL_SAFE_NO_PAD.encode(digest.0)
    }

    /// Check a presented URI, expiry and signature at `now_secs`
    pub fn verify(
        &self,
        uri: &str,
        expires: i64,
        signature: &str,
        now_secs: i64,
    ) -> StorageResult<()> {
        if now_secs > expires {
            return Err(StorageError::UrlExpired);
        }
        if self.signature_for(expires, uri) != signature {
            return Err(StorageError::InvalidSignature);
        }
        Ok(())
    }
}

/// Filename segment for a URL. Slashes in an explicit name are pre-escaped so
/// a proxy that decodes `%2f` cannot split the name into path segments.
pub fn display_filename(key: &str, filename: Option<&str>) -> String {
    match filename {
        Some(name) => urlencoding::encode(&name.replace('/', "%2f")).into_owned(),
        None => key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Expiry in Unix seconds for a URL created at `created_at_ms` and issued at
/// `now_ms`.
///
/// The creation time is advanced by whole windows until it reaches `now_ms`,
/// rounded up to a second, and pushed out by one more window.
pub fn expires_at(created_at_ms: i64, now_ms: i64, window_secs: u64) -> i64 {
    let window_secs = i64::try_from(window_secs).unwrap_or(i64::MAX / 1000);
    let window_ms = window_secs.saturating_mul(1000).max(1);

    let elapsed = now_ms.abs_diff(created_at_ms);
    let windows = elapsed.div_ceil(window_ms as u64);
    let boundary_ms = created_at_ms
        .saturating_add(i64::try_from(windows).unwrap_or(i64::MAX).saturating_mul(window_ms));

    let boundary_secs = boundary_ms.div_euclid(1000) + i64::from(boundary_ms.rem_euclid(1000) != 0);
    boundary_secs.saturating_add(window_secs)
}

fn percent_decode(uri: &str) -> Cow<'_, str> {
    match urlencoding::decode_binary(uri.as_bytes()) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

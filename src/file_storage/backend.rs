//! # Storage Backend Trait
//!
//! Object-storage facade shared by every backend. Callers address objects by
//! slash-delimited keys and never see physical paths.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use super::errors::StorageResult;
use super::signed_url::{RequestContext, SignedUrlRequest};

/// Boxed byte source, owned by whoever holds it
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Result of a head request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_length: u64,
}

/// An open object. The stream must be consumed or dropped to release the handle.
pub struct ObjectStream {
    pub content_length: u64,
    pub stream: ByteReader,
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Content for a put: an in-memory buffer or a stream
pub enum ObjectBody {
    Bytes(Bytes),
    Stream(ByteReader),
}

impl ObjectBody {
    /// Wrap any async reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        ObjectBody::Stream(Box::new(reader))
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ObjectBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for ObjectBody {
    fn from(data: Bytes) -> Self {
        ObjectBody::Bytes(data)
    }
}

impl From<Vec<u8>> for ObjectBody {
    fn from(data: Vec<u8>) -> Self {
        ObjectBody::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for ObjectBody {
    fn from(data: &'static [u8]) -> Self {
        ObjectBody::Bytes(Bytes::from_static(data))
    }
}

/// Backend trait for object storage
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Size of an object
    async fn head_object(&self, key: &str) -> StorageResult<ObjectMetadata>;

    /// Full content of an object
    async fn get_object(&self, key: &str) -> StorageResult<Bytes>;

    /// Open an object for streamed reading
    async fn create_read_stream(&self, key: &str) -> StorageResult<ObjectStream>;

    /// Create or replace an object. Parent "directories" are implicit.
    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        content_length: Option<u64>,
    ) -> StorageResult<()>;

    /// Copy a local file or directory tree into storage under `key`
    async fn upload_object(&self, key: &str, source: &Path) -> StorageResult<()>;

    /// Copy an object or tree to another key, overwriting
    async fn copy_object(&self, source_key: &str, dest_key: &str) -> StorageResult<()>;

    /// Every key stored under `prefix`, sorted
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Delete an object or tree. A missing key is not an error.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Delete everything under a key prefix
    async fn delete_path(&self, key: &str) -> StorageResult<()> {
        self.delete_object(key).await
    }

    /// Issue a time-limited URL for `request.key`. Performs no I/O.
    fn get_signed_url(
        &self,
        ctx: &RequestContext,
        request: &SignedUrlRequest,
    ) -> StorageResult<String>;
}

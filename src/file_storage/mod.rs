//! # AeroStore File Storage Module
//!
//! Object-storage interface (head, get, put, copy, list, delete, signed URLs)
//! persisted as plain files under a configured root directory.

pub mod errors;
pub mod config;
pub mod path;
pub mod backend;
pub mod local;
pub mod signed_url;

pub use errors::{StorageError, StorageResult};
pub use config::StorageConfig;
pub use path::{validate_key, PathResolver};
pub use backend::{ByteReader, ObjectBody, ObjectMetadata, ObjectStream, StorageBackend};
pub use local::LocalBackend;
pub use signed_url::{
    RequestContext, SignedUrlIssuer, SignedUrlRequest, UrlType, SHARD_KEY_PARAM,
};

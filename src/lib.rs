//! aerostore - object storage semantics on a plain filesystem
//!
//! Keys are slash-delimited paths under a configured root. Objects can be
//! read, written atomically, copied, listed and deleted, and handed out via
//! time-limited signed URLs that an external server verifies with a shared
//! secret.

pub mod cli;
pub mod file_storage;
pub mod observability;

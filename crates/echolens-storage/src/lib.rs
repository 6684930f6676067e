//! Blob storage access for `EchoLens` call recordings

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod blob;
pub mod error;

pub use blob::{BlobStore, HttpBlobStore, MemoryBlobStore};
pub use error::{StorageError, StorageResult};

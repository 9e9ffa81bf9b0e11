//! Blob storage for attachment payloads

mod local;

pub use local::LocalBlobStore;

//! Sitehook-Store: resource and content storage for the build pipeline
//!
//! Two narrow interfaces sit between the pipeline and object storage:
//!
//! - `ResourceStore`: read-only fetch of named toolchain artifacts
//! - `ContentStore`: the publish destination (list, put, delete by relative key)
//!
//! Backends are a local directory (`FsObjectStore`), an HTTP artifact
//! mirror (`HttpResourceStore`), and in-memory fakes for tests.

mod error;
pub mod fakes;
pub mod fs;
pub mod http;
mod location;
pub mod storage_traits;

pub use error::StoreError;
pub use fs::FsObjectStore;
pub use http::HttpResourceStore;
pub use location::StoreLocation;
pub use storage_traits::{
    ContentDigest, ContentStore, ObjectEntry, ObjectKey, PutOptions, ResourceStore, StoreResult,
};

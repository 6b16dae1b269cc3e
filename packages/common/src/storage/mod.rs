mod error;
mod key;
mod traits;

pub mod filesystem;
pub mod presign;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use key::ObjectRef;
pub use traits::{BlobStore, PutOptions};

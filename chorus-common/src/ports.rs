//! Collaborator ports
//!
//! Authentication and media storage live outside the core. The service
//! supplies implementations; the core only calls through these traits.

use crate::Result;
use async_trait::async_trait;

/// Admin capability check
///
/// `Ok(())` grants the operation; `Err(Error::Forbidden)` denies it.
pub trait AdminGate: Send + Sync {
    fn require_admin(&self, user_id: &str) -> Result<()>;
}

/// Binary storage for uploaded media
///
/// The returned URL is stored on versions opaquely.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String>;
}

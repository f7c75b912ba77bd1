//! Service-side implementations of the core collaborator ports

use async_trait::async_trait;
use chorus_common::ports::{AdminGate, BlobStore};
use chorus_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// URL prefix under which the local blob store is served
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Admin gate backed by the `admin_users` config list
#[derive(Debug, Clone, Default)]
pub struct StaticAdminList {
    admins: HashSet<String>,
}

impl StaticAdminList {
    pub fn new(admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            admins: admins.into_iter().map(|a| a.trim().to_string()).collect(),
        }
    }
}

impl AdminGate for StaticAdminList {
    fn require_admin(&self, user_id: &str) -> Result<()> {
        if self.admins.contains(user_id) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{} is not an admin", user_id)))
        }
    }
}

/// Content-addressed media files under the root folder
///
/// Files land at `<root>/<hh>/<digest16>-<name>` where `hh` is the first
/// byte of the SHA-256 digest; identical uploads resolve to the same URL.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Keep the final path component and replace anything outside `[A-Za-z0-9._-]`
fn sanitize_file_name(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path).trim();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let name = sanitize_file_name(path)
            .ok_or_else(|| Error::invalid("filename", "must contain a usable file name"))?;

        let digest = format!("{:x}", Sha256::digest(bytes));
        let shard = &digest[..2];
        let file_name = format!("{}-{}", &digest[..16], name);

        let dir = self.root.join(shard);
        let target = dir.join(&file_name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!("Media {} already stored", target.display());
        } else {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::Dependency(format!("media directory {}: {}", dir.display(), e)))?;
            tokio::fs::write(&target, bytes)
                .await
                .map_err(|e| Error::Dependency(format!("media write {}: {}", target.display(), e)))?;
            info!("Stored {} bytes of media at {}", bytes.len(), target.display());
        }

        Ok(format!("{}/{}/{}", MEDIA_URL_PREFIX, shard, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_list() {
        let gate = StaticAdminList::new(vec!["director".to_string()]);
        assert!(gate.require_admin("director").is_ok());
        assert!(matches!(gate.require_admin("ann"), Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("my take (1).mp3").as_deref(), Some("my_take__1_.mp3"));
        assert_eq!(sanitize_file_name("C:\\music\\lead.mp3").as_deref(), Some("lead.mp3"));
        assert!(sanitize_file_name("..").is_none());
        assert!(sanitize_file_name("dir/").is_none());
    }

    #[tokio::test]
    async fn test_identical_uploads_share_a_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf());

        let first = store.put("lead.mp3", b"audio bytes").await.unwrap();
        let second = store.put("lead.mp3", b"audio bytes").await.unwrap();
        let other = store.put("lead.mp3", b"other bytes").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with("/media/"));
        assert!(first.ends_with("-lead.mp3"));

        let relative = first.trim_start_matches("/media/");
        let stored = std::fs::read(dir.path().join(relative)).unwrap();
        assert_eq!(stored, b"audio bytes");
    }
}

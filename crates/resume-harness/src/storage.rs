//! Durable object storage for original resume files.
//!
//! After extraction succeeds, the pipeline uploads the original bytes here
//! under a per-owner key and records the key on the document. The default
//! backend is a filesystem tree below a configured root; the [`ObjectStore`]
//! trait keeps the seam narrow enough that an S3-style backend can replace
//! it without touching the pipeline.
//!
//! Signed URLs use hex HMAC-SHA256 over `key\nexpires` with a configured
//! secret. For the filesystem backend they are `file://` URLs; the signature
//! exists so handing one out never means handing out the root path and
//! secret-free access in a multi-tenant deployment.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use tokio::fs;

use resume_harness_core::error::PipelineError;

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `key`, creating parent directories as needed.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PipelineError>;

    /// Remove the object at `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), PipelineError>;

    /// Produce a time-limited signed URL for the object at `key`.
    fn signed_url(&self, key: &str, ttl_secs: u64) -> String;
}

/// Filesystem-backed [`ObjectStore`].
pub struct FsObjectStore {
    root: PathBuf,
    secret: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            secret: secret.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| PipelineError::Storage(format!("write {}: {e}", path.display())))
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        let path = self.object_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::Storage(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }

    fn signed_url(&self, key: &str, ttl_secs: u64) -> String {
        let expires = Utc::now().timestamp() + ttl_secs as i64;
        let signature = sign(&self.secret, key, expires);
        format!(
            "file://{}?expires={expires}&signature={signature}",
            self.object_path(key).display()
        )
    }
}

/// Storage key for an uploaded original: `resumes/{owner}/{ts}-{filename}`.
pub fn object_key(owner_id: &str, file_name: &str, now: i64) -> String {
    format!("resumes/{owner_id}/{now}-{file_name}")
}

/// Hex HMAC-SHA256 over `key\nexpires`.
fn sign(secret: &str, key: &str, expires: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(key.as_bytes());
    mac.update(b"\n");
    mac.update(expires.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature produced by [`sign`] for the same secret and expiry.
pub fn verify_signature(secret: &str, key: &str, expires: i64, signature: &str) -> bool {
    sign(secret, key, expires) == signature
}

/// Split `file://path?expires=..&signature=..` back into its parts.
/// Used by tests and by `status` output checks.
pub fn parse_signed_url(url: &str) -> Option<(&str, i64, &str)> {
    let rest = url.strip_prefix("file://")?;
    let (path, query) = rest.split_once('?')?;
    let mut expires = None;
    let mut signature = None;
    for pair in query.split('&') {
        match pair.split_once('=')? {
            ("expires", v) => expires = v.parse::<i64>().ok(),
            ("signature", v) => signature = Some(v),
            _ => {}
        }
    }
    Some((path, expires?, signature?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path(), "secret");

        store
            .put("resumes/owner-1/1700000000-cv.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        let on_disk = dir.path().join("resumes/owner-1/1700000000-cv.pdf");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"%PDF-1.4");

        store.delete("resumes/owner-1/1700000000-cv.pdf").await.unwrap();
        assert!(!on_disk.exists());

        // Deleting again is a no-op, not an error.
        store.delete("resumes/owner-1/1700000000-cv.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_url_verifies() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path(), "secret");

        let url = store.signed_url("resumes/o/1-cv.pdf", 3600);
        let (path, expires, signature) = parse_signed_url(&url).unwrap();
        assert!(path.ends_with("resumes/o/1-cv.pdf"));
        assert!(expires > Utc::now().timestamp());
        assert!(verify_signature("secret", "resumes/o/1-cv.pdf", expires, signature));
        assert!(!verify_signature("wrong", "resumes/o/1-cv.pdf", expires, signature));
        assert!(!verify_signature("secret", "resumes/o/other.pdf", expires, signature));
    }

    #[test]
    fn test_object_key_shape() {
        assert_eq!(
            object_key("owner-1", "Jane Doe CV.pdf", 1700000000),
            "resumes/owner-1/1700000000-Jane Doe CV.pdf"
        );
    }
}

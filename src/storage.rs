use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Metadata of a file written by `MediaStorage`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub url: String,
    pub media_type: String,
    pub filename: String,
    pub size: i64,
}

/// Writes uploads to a local directory that the router serves under `/uploads`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    dir: PathBuf,
    public_url: String,
}

impl MediaStorage {
    pub fn new(dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        MediaStorage {
            dir: dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores `bytes` under a fresh uuid name, keeping the original extension.
    ///
    /// `filename` is the client's name and is only reported back, never used
    /// as a path.
    pub async fn store(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, std::io::Error> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stored_name = match extension(filename) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let mut file = tokio::fs::File::create(self.dir.join(&stored_name)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(StoredFile {
            url: format!("{}/uploads/{}", self.public_url, stored_name),
            media_type: content_type
                .unwrap_or("application/octet-stream")
                .to_string(),
            filename: filename.to_string(),
            size: bytes.len() as i64,
        })
    }
}

// Alphanumeric extensions only, lowercased
fn extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("social_backend_storage_{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn stores_file_under_fresh_name() {
        let dir = temp_dir();
        let storage = MediaStorage::new(&dir, "http://localhost:8000/");

        let stored = storage
            .store("../../etc/Cat.PNG", Some("image/png"), b"not really a png")
            .await
            .unwrap();

        assert_eq!(stored.media_type, "image/png");
        assert_eq!(stored.filename, "../../etc/Cat.PNG");
        assert_eq!(stored.size, 16);
        assert!(stored.url.starts_with("http://localhost:8000/uploads/"));
        assert!(stored.url.ends_with(".png"));

        let name = stored.url.rsplit('/').next().unwrap();
        let written = tokio::fs::read(dir.join(name)).await.unwrap();
        assert_eq!(written, b"not really a png");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn odd_extensions_are_dropped() {
        assert_eq!(extension("a.JPG"), Some("jpg".to_string()));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("a.tar gz"), None);
    }
}

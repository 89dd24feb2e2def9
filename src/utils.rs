use log::info;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "epw_comfort_cache";

/// The crate's directory inside the system cache directory, if the platform
/// has one.
pub fn get_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join(CACHE_DIR_NAME))
}

pub async fn ensure_cache_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Cache path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_is_namespaced() {
        if let Some(dir) = get_cache_dir() {
            assert!(dir.ends_with(CACHE_DIR_NAME));
        }
    }

    #[tokio::test]
    async fn creates_missing_cache_dir() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        ensure_cache_dir_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_cache_dir_exists(&nested).await.unwrap();

        let file = root.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_cache_dir_exists(&file).await.is_err());
    }
}

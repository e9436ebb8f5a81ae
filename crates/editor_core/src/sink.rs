use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

/// Destination for exported image bytes.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes exports into a directory, replacing any previous file of the same name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = Path::new(file_name);
        if name.file_name().map(|n| n != name.as_os_str()).unwrap_or(true) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{file_name}' is not a plain file name"),
            ));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

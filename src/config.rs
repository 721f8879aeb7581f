use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    File,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage: StorageKind,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let host = std::env::var("QUIZ_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("QUIZ_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let data_dir = std::env::var("QUIZ_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}/local_data", env!("CARGO_MANIFEST_DIR"))));
        let storage = match std::env::var("QUIZ_STORAGE").as_deref() {
            Ok("memory") => StorageKind::Memory,
            Ok("file") | Err(_) => StorageKind::File,
            Ok(other) => {
                warn!("unknown QUIZ_STORAGE {:?}, falling back to file storage", other);
                StorageKind::File
            }
        };
        let catalog_path = std::env::var("QUIZ_CATALOG_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            host,
            port,
            data_dir,
            storage,
            catalog_path,
        }
    }

    /// Volatile configuration with the embedded catalog; nothing touches the disk.
    pub fn in_memory() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: std::env::temp_dir(),
            storage: StorageKind::Memory,
            catalog_path: None,
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_binds_ephemeral_port() {
        let config = Config::in_memory();
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.bind_addr().unwrap().port(), 0);
    }

    #[test]
    fn bad_host_is_an_error() {
        let config = Config {
            host: "not a host".into(),
            ..Config::in_memory()
        };
        assert!(config.bind_addr().is_err());
    }
}

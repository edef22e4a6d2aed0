use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::crypto::{KeyError, SecretKey};

use super::Identity;

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("private key file not found: {0}")]
    NotFound(PathBuf),

    #[error("could not access private key storage at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("private key in {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: KeyError,
    },

    #[error("could not generate private key: {0}")]
    Generate(#[from] KeyError),
}

/// Whether the identity in use was read from disk or created on this start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Loaded,
    Generated,
}

/// On-disk home of the private key: `<dir>/<file_name>`, holding the scalar
///  as lowercase hex with no trailing newline.
///
/// Single writer: the file is written at most once per process, at generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    dir: PathBuf,
    file_name: String,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Both the directory and the key file exist
    pub fn is_present(&self) -> bool {
        if self.file_name.is_empty() || self.dir.as_os_str().is_empty() {
            return false;
        }
        self.dir.is_dir() && self.path().is_file()
    }

    /// Write the key, creating the directory (owner-only) when missing
    pub fn persist(&self, key: &SecretKey) -> Result<(), KeyStoreError> {
        if !self.dir.exists() {
            tracing::info!(dir = %self.dir.display(), "creating private key directory");
            create_private_dir(&self.dir).map_err(|source| KeyStoreError::Storage {
                path: self.dir.clone(),
                source,
            })?;
        }

        let path = self.path();
        write_private_file(&path, key.to_hex().as_bytes())
            .map_err(|source| KeyStoreError::Storage { path, source })
    }

    /// Read and decode the key file
    pub fn load(&self) -> Result<SecretKey, KeyStoreError> {
        let path = self.path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyStoreError::NotFound(path))
            }
            Err(source) => return Err(KeyStoreError::Storage { path, source }),
        };

        SecretKey::from_hex(&contents).map_err(|source| KeyStoreError::Format { path, source })
    }

    /// Load the persisted identity, or generate and persist a fresh one.
    ///
    /// Call once at startup; the decision is not revisited while running.
    pub fn load_or_generate(&self) -> Result<(Identity, KeyOrigin), KeyStoreError> {
        if self.is_present() {
            let key = self.load()?;
            tracing::debug!(path = %self.path().display(), "loaded private key");
            return Ok((Identity::from_secret(key), KeyOrigin::Loaded));
        }

        tracing::info!("generating private key");
        let key = SecretKey::generate()?;
        self.persist(&key)?;
        tracing::info!(path = %self.path().display(), "private key written");
        Ok((Identity::from_secret(key), KeyOrigin::Generated))
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation; tighten a pre-existing file too
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

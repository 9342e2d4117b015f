//! File-backed position record.
//!
//! The record is a one-key TOML document so it can be read (and fixed) by hand
//! in the field:
//!
//! ```toml
//! piston_position = 1250
//! ```
//!
//! Saves go through a temp file, fsync and rename, so a power cut during a save
//! leaves either the old record or the new one, never a torn file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use nanofloat_traits::{BoxError, PositionStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("{path}: '{key}' is not an integer")]
    NotInteger { path: String, key: String },
    #[error("encode position record: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FilePositionStore {
    path: PathBuf,
    key: String,
    default_position: i64,
}

impl FilePositionStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>, default_position: i64) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            default_position,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

impl PositionStore for FilePositionStore {
    fn load(&mut self) -> Result<i64, BoxError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no position record yet; using default");
                return Ok(self.default_position);
            }
            Err(source) => {
                return Err(Box::new(StoreError::Read {
                    path: self.display_path(),
                    source,
                }));
            }
        };
        let table: toml::Table = toml::from_str(&text).map_err(|source| StoreError::Parse {
            path: self.display_path(),
            source,
        })?;
        match table.get(&self.key) {
            None => Ok(self.default_position),
            Some(toml::Value::Integer(v)) => Ok(*v),
            Some(_) => Err(Box::new(StoreError::NotInteger {
                path: self.display_path(),
                key: self.key.clone(),
            })),
        }
    }

    fn save(&mut self, position: i64) -> Result<(), BoxError> {
        let mut table = toml::Table::new();
        table.insert(self.key.clone(), toml::Value::Integer(position));
        let body = toml::to_string(&table).map_err(StoreError::from)?;
        let text = format!("# piston position in encoder counts\n{body}");
        write_atomic(&self.path, text.as_bytes()).map_err(|source| StoreError::Write {
            path: self.display_path(),
            source,
        })?;
        tracing::debug!(position, path = %self.path.display(), "position saved");
        Ok(())
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    // Persist the rename itself; not every platform lets a directory be opened.
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty())
        && let Ok(d) = fs::File::open(dir)
    {
        let _ = d.sync_all();
    }
    Ok(())
}

//! Session store: the persisted bearer token that gates the chat view.
//!
//! A [`Session`] pairs an in-memory token with a durable [`TokenStorage`]
//! backend. Both change together or not at all: the backend is written first
//! and the in-memory copy is only updated once that succeeds.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};

/// Storage key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "jwt_token";

/// Durable string key-value storage.
pub trait TokenStorage: Send {
    /// Reads the value stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn store(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Key-value storage kept in a single JSON object on disk.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// original, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates storage backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<config dir>/parley/storage.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parley").join("storage.json"))
    }

    /// The file this storage reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(Error::io("failed to open session storage", err)),
        };
        from_reader(BufReader::new(file)).map_err(|err| {
            Error::serialization("failed to parse session storage", Some(Box::new(err)))
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io("failed to create session storage directory", err))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let file = File::create(&tmp)
            .map_err(|err| Error::io("failed to create session storage file", err))?;
        let written = write_json(file, values).and_then(|()| {
            fs::rename(&tmp, &self.path)
                .map_err(|err| Error::io("failed to replace session storage", err))
        });
        if written.is_err() {
            // The old file, if any, is still intact.
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

fn write_json(file: File, values: &BTreeMap<String, String>) -> Result<()> {
    let mut writer = BufWriter::new(file);
    to_writer_pretty(&mut writer, values).map_err(|err| {
        Error::serialization("failed to serialize session storage", Some(Box::new(err)))
    })?;
    writer
        .flush()
        .map_err(|err| Error::io("failed to write session storage", err))
}

impl TokenStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)
        } else {
            Ok(())
        }
    }
}

/// In-process storage. Clones share the same map, which lets tests model a
/// page reload by building a second [`Session`] over a clone.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a valid map.
        self.values.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl TokenStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// The client-side record of whether the user is authenticated.
pub struct Session<S: TokenStorage> {
    storage: S,
    token: Option<String>,
}

impl<S: TokenStorage> Session<S> {
    /// Loads the session from `storage`.
    pub fn load(storage: S) -> Result<Self> {
        let token = storage.load(TOKEN_KEY)?;
        Ok(Self { storage, token })
    }

    /// Returns the current token, if any.
    pub fn get(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Persists `token` and makes it current.
    pub fn set(&mut self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.storage.store(TOKEN_KEY, &token)?;
        self.token = Some(token);
        Ok(())
    }

    /// Forgets the token, both persisted and in memory.
    pub fn clear(&mut self) -> Result<()> {
        self.storage.remove(TOKEN_KEY)?;
        self.token = None;
        Ok(())
    }

    /// True when a token is present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

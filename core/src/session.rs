//! Bearer-token storage.
//!
//! # Design
//! `TicketDesk` never touches storage directly; it goes through the
//! `SessionStore` trait so tests can use `MemorySessionStore` and the CLI can
//! persist the token with `FileSessionStore`. Reads and clears never fail:
//! a store that cannot be read behaves as if no token were stored.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Key under which the access token is stored.
pub const TOKEN_KEY: &str = "ticket_access";

pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> Result<(), ApiError>;
    fn clear(&self);
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, token: &str) -> Result<(), ApiError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Durable key-value store kept as a JSON object in a single file.
///
/// Other keys in the file are preserved; only `TOKEN_KEY` is managed.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Map<String, Value> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Map::new(),
        };
        match serde_json::from_slice(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(path = %self.path.display(), "ignoring unreadable session file");
                Map::new()
            }
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        let raw = serde_json::to_vec_pretty(entries).map_err(|e| ApiError::Storage(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| ApiError::Storage(e.to_string()))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<String> {
        self.read_entries()
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&self, token: &str) -> Result<(), ApiError> {
        let mut entries = self.read_entries();
        entries.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_entries(&entries)?;
        debug!(path = %self.path.display(), "session token stored");
        Ok(())
    }

    fn clear(&self) {
        let mut entries = self.read_entries();
        if entries.remove(TOKEN_KEY).is_none() {
            return;
        }
        if let Err(e) = self.write_entries(&entries) {
            warn!(path = %self.path.display(), error = %e, "could not clear session token");
        }
    }
}

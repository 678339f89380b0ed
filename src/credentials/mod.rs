//! Credential pool
//!
//! An ordered set of registration keys with a per-key "may still have
//! quota" flag and a current index. Rotation walks the keys cyclically. The
//! pool is owned by the orchestrator and never shared across tasks.

use crate::error::{Error, Result};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Registration keys for one keyed provider
#[derive(Debug, Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
    has_quota: Vec<bool>,
    index: usize,
}

impl CredentialPool {
    /// Create a pool starting at a random key so that concurrent runs
    /// sharing a key file spread their load.
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::EmptyKeyPool);
        }
        let index = rand::thread_rng().gen_range(0..keys.len());
        Self::with_start_index(keys, index)
    }

    /// Create a pool starting at a given key
    pub fn with_start_index(keys: Vec<String>, index: usize) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::EmptyKeyPool);
        }
        let index = index % keys.len();
        Ok(Self {
            has_quota: vec![true; keys.len()],
            keys,
            index,
        })
    }

    /// Load a pool from a key file, one key per line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(load_key_file(path)?)
    }

    /// The key the next fetch is signed with
    pub fn current(&self) -> &str {
        &self.keys[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Record whether the current key still has quota
    pub fn mark_quota(&mut self, has_quota: bool) {
        self.has_quota[self.index] = has_quota;
    }

    pub fn current_has_quota(&self) -> bool {
        self.has_quota[self.index]
    }

    /// Whether there is another key to rotate to
    pub fn can_rotate(&self) -> bool {
        self.keys.len() > 1
    }

    /// Advance to the next key, wrapping around, and return the new index
    pub fn rotate(&mut self) -> usize {
        self.index = (self.index + 1) % self.keys.len();
        self.index
    }

    /// Short, stable fingerprint of the current key, safe to log
    pub fn fingerprint(&self) -> String {
        fingerprint(self.current())
    }
}

/// First eight hex digits of the key's SHA-256
pub fn fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Read registration keys, one per line. Lines are trimmed and blank lines
/// skipped; a file with no keys is an error.
pub fn load_key_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let keys: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    if keys.is_empty() {
        return Err(Error::EmptyKeyPool);
    }
    Ok(keys)
}

//! In-Memory Key-Value Adapter
//!
//! One region of string and set values held in an ordered map. Used by the
//! `memory` backend and by tests.
//!
//! # Design
//!
//! - Ordered keys make scans resumable: a cursor token maps to the last key
//!   examined, so keys deleted between pages never cause others to be skipped
//! - At most [`MAX_OPEN_CURSORS`] tokens are kept; abandoned scans age out
//! - Pipelines apply under a single write lock
//! - Fault injection via [`InMemoryKeyValueStore::set_available`] and
//!   [`InMemoryKeyValueStore::fail_pipelines`]

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::{Command, KeyValueStore, Pipeline, Reply, ScanPage};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Value {
    Str(Bytes),
    Set(HashSet<String>),
}

/// Cursor tokens kept alive at once; older tokens become invalid.
pub const MAX_OPEN_CURSORS: usize = 1024;

/// Region statistics
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreStats {
    pub keys: usize,
    pub commands: u64,
    pub pipelines: u64,
    pub open_cursors: usize,
}

/// In-memory key-value region
pub struct InMemoryKeyValueStore {
    region: String,
    data: RwLock<BTreeMap<String, Value>>,
    /// Scan cursor token -> last key examined
    cursors: DashMap<u64, String>,
    next_cursor: AtomicU64,
    available: AtomicBool,
    fail_pipelines: AtomicBool,
    commands: AtomicU64,
    pipelines: AtomicU64,
}

impl InMemoryKeyValueStore {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            data: RwLock::new(BTreeMap::new()),
            cursors: DashMap::new(),
            next_cursor: AtomicU64::new(1),
            available: AtomicBool::new(true),
            fail_pipelines: AtomicBool::new(false),
            commands: AtomicU64::new(0),
            pipelines: AtomicU64::new(0),
        }
    }

    /// Simulate the region going down (`false`) or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Reject every pipeline while still serving single commands.
    pub fn fail_pipelines(&self, fail: bool) {
        self.fail_pipelines.store(fail, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    pub fn stats(&self) -> InMemoryStoreStats {
        InMemoryStoreStats {
            keys: self.len(),
            commands: self.commands.load(Ordering::Relaxed),
            pipelines: self.pipelines.load(Ordering::Relaxed),
            open_cursors: self.cursors.len(),
        }
    }

    fn check_available(&self) -> Result<()> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable {
                region: self.region.clone(),
                reason: "connection refused".to_string(),
            })
        }
    }

    fn wrong_type(&self, key: &str) -> Error {
        Error::Store(format!(
            "WRONGTYPE operation against key '{}' holding the wrong kind of value in {}",
            key, self.region
        ))
    }

    fn get_in(&self, data: &BTreeMap<String, Value>, key: &str) -> Result<Option<Bytes>> {
        match data.get(key) {
            None => Ok(None),
            Some(Value::Str(v)) => Ok(Some(v.clone())),
            Some(Value::Set(_)) => Err(self.wrong_type(key)),
        }
    }

    fn set_add_in(&self, data: &mut BTreeMap<String, Value>, key: &str, member: &str) -> Result<bool> {
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(members) => Ok(members.insert(member.to_string())),
            Value::Str(_) => Err(self.wrong_type(key)),
        }
    }

    fn delete_in(data: &mut BTreeMap<String, Value>, keys: &[String]) -> u64 {
        keys.iter().filter(|k| data.remove(k.as_str()).is_some()).count() as u64
    }
}

impl std::fmt::Debug for InMemoryKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyValueStore")
            .field("region", &self.region)
            .field("keys", &self.len())
            .finish()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    fn region(&self) -> &str {
        &self.region
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.check_available()?;
        self.get_in(&self.data.read(), key)
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        self.check_available()?;
        self.data.write().insert(key.to_string(), Value::Str(value));
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.check_available()?;
        self.set_add_in(&mut self.data.write(), key, member)
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>> {
        self.check_available()?;
        match self.data.read().get(key) {
            None => Ok(HashSet::new()),
            Some(Value::Set(members)) => Ok(members.clone()),
            Some(Value::Str(_)) => Err(self.wrong_type(key)),
        }
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        self.check_available()?;

        let after = if cursor == 0 {
            None
        } else {
            let (_, last) = self
                .cursors
                .remove(&cursor)
                .ok_or_else(|| Error::Store(format!("invalid scan cursor {}", cursor)))?;
            Some(last)
        };

        let data = self.data.read();
        let lower = match &after {
            Some(last) => Bound::Excluded(last.as_str()),
            None => Bound::Unbounded,
        };

        let mut keys = Vec::new();
        let mut examined = 0usize;
        let mut last_examined = None;
        let mut range = data.range::<str, _>((lower, Bound::Unbounded)).peekable();

        while let Some((key, _)) = range.next() {
            examined += 1;
            if glob_match(pattern, key) {
                keys.push(key.clone());
            }
            if examined >= count.max(1) {
                if range.peek().is_some() {
                    last_examined = Some(key.clone());
                }
                break;
            }
        }

        let next = match last_examined {
            Some(last) => {
                let token = self.next_cursor.fetch_add(1, Ordering::Relaxed);
                self.cursors.insert(token, last);
                if self.cursors.len() > MAX_OPEN_CURSORS {
                    let oldest_kept = token.saturating_sub(MAX_OPEN_CURSORS as u64);
                    self.cursors.retain(|t, _| *t > oldest_kept);
                }
                token
            }
            None => 0,
        };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.check_available()?;
        Ok(Self::delete_in(&mut self.data.write(), keys))
    }

    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<Reply>> {
        self.check_available()?;
        self.pipelines.fetch_add(1, Ordering::Relaxed);
        if self.fail_pipelines.load(Ordering::Acquire) {
            return Err(Error::Store(format!(
                "pipeline rejected by {}",
                self.region
            )));
        }

        let mut data = self.data.write();
        let mut replies = Vec::with_capacity(pipeline.len());
        for command in pipeline.into_commands() {
            let reply = match command {
                Command::Set { key, value } => {
                    data.insert(key, Value::Str(value));
                    Reply::Ok
                }
                Command::SetAdd { key, member } => {
                    Reply::Count(self.set_add_in(&mut data, &key, &member)? as u64)
                }
                Command::MultiGet { keys } => {
                    // MGET yields nil for non-string values
                    let values = keys
                        .iter()
                        .map(|k| self.get_in(&data, k).ok().flatten())
                        .collect();
                    Reply::Values(values)
                }
                Command::Delete { keys } => Reply::Count(Self::delete_in(&mut data, &keys)),
            };
            replies.push(reply);
        }
        Ok(replies)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

/// Redis-style glob matching supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_ti = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

// =============================================================================
// Tests
// =============================================================================

//! In-memory [`KvStore`] implementation.
//!
//! Single-process stand-in for the shared store: the same key layout,
//! list/ordered-set/counter semantics, and TTL behavior the production
//! adapter provides, without a server. Used by tests and local runs.

use crate::adapters::KvStore;
use crate::error::DependencyError;
use crate::types::unix_now_ms;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
struct ZMember {
    score: f64,
    member: String,
}

#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    ZSet(Vec<ZMember>),
    Counter(i64),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at_ms: Option<u64>,
}

impl Entry {
    fn perpetual(value: Value) -> Self {
        Self {
            value,
            expires_at_ms: None,
        }
    }
}

/// In-memory key-value store with TTL support.
#[derive(Debug, Default)]
pub struct MemoryKv {
    state: Mutex<HashMap<String, Entry>>,
}

fn wrong_kind(key: &str) -> DependencyError {
    DependencyError::Permanent(format!("key {key} holds a different value kind"))
}

/// Drops the entry if its TTL has lapsed.
fn purge(map: &mut HashMap<String, Entry>, key: &str, now_ms: u64) {
    let expired = map
        .get(key)
        .is_some_and(|entry| entry.expires_at_ms.is_some_and(|at| now_ms >= at));
    if expired {
        map.remove(key);
    }
}

/// Drops the entry if its TTL has lapsed, then hands back whatever is left.
fn live<'a>(
    map: &'a mut HashMap<String, Entry>,
    key: &str,
    now_ms: u64,
) -> Option<&'a mut Entry> {
    purge(map, key, now_ms);
    map.get_mut(key)
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys. Test observability only.
    pub fn len(&self) -> usize {
        let now_ms = unix_now_ms();
        let state = self.state.lock().unwrap();
        state
            .values()
            .filter(|e| !e.expires_at_ms.is_some_and(|at| now_ms >= at))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn list_push_back(&self, key: &str, value: String) -> Result<(), DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        purge(&mut state, key, now_ms);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Entry::perpetual(Value::List(VecDeque::new())));
        match &mut entry.value {
            Value::List(list) => {
                list.push_back(value);
                Ok(())
            }
            _ => Err(wrong_kind(key)),
        }
    }

    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &mut entry.value {
                Value::List(list) => Ok(list.pop_front()),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(None),
        }
    }

    async fn list_front(&self, key: &str) -> Result<Option<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &entry.value {
                Value::List(list) => Ok(list.front().cloned()),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(None),
        }
    }

    async fn list_len(&self, key: &str) -> Result<usize, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &entry.value {
                Value::List(list) => Ok(list.len()),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(0),
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &entry.value {
                Value::List(list) => Ok(list.iter().cloned().collect()),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<bool, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &mut entry.value {
                Value::List(list) => match list.iter().position(|v| v == value) {
                    Some(index) => {
                        list.remove(index);
                        Ok(true)
                    }
                    None => Ok(false),
                },
                _ => Err(wrong_kind(key)),
            },
            None => Ok(false),
        }
    }

    async fn zset_add(
        &self,
        key: &str,
        member: String,
        score: f64,
    ) -> Result<(), DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        purge(&mut state, key, now_ms);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Entry::perpetual(Value::ZSet(Vec::new())));
        match &mut entry.value {
            Value::ZSet(set) => {
                // ZADD semantics: re-adding a member updates its score.
                set.retain(|m| m.member != member);
                let at = set
                    .iter()
                    .position(|m| (m.score, m.member.as_str()) > (score, member.as_str()))
                    .unwrap_or(set.len());
                set.insert(at, ZMember { score, member });
                Ok(())
            }
            _ => Err(wrong_kind(key)),
        }
    }

    async fn zset_pop_min(&self, key: &str) -> Result<Option<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &mut entry.value {
                Value::ZSet(set) => {
                    if set.is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some(set.remove(0).member))
                    }
                }
                _ => Err(wrong_kind(key)),
            },
            None => Ok(None),
        }
    }

    async fn zset_pop_min_in_range(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Option<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &mut entry.value {
                Value::ZSet(set) => {
                    match set.iter().position(|m| m.score >= min && m.score < max) {
                        Some(index) => Ok(Some(set.remove(index).member)),
                        None => Ok(None),
                    }
                }
                _ => Err(wrong_kind(key)),
            },
            None => Ok(None),
        }
    }

    async fn zset_len(&self, key: &str) -> Result<usize, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &entry.value {
                Value::ZSet(set) => Ok(set.len()),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(0),
        }
    }

    async fn zset_members(&self, key: &str) -> Result<Vec<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &entry.value {
                Value::ZSet(set) => Ok(set.iter().map(|m| m.member.clone()).collect()),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<bool, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &mut entry.value {
                Value::ZSet(set) => {
                    let before = set.len();
                    set.retain(|m| m.member != member);
                    Ok(set.len() < before)
                }
                _ => Err(wrong_kind(key)),
            },
            None => Ok(false),
        }
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        purge(&mut state, key, now_ms);
        match state.entry(key.to_string()) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                match &mut occupied.get_mut().value {
                    Value::Counter(n) => {
                        *n += 1;
                        Ok(*n)
                    }
                    _ => Err(wrong_kind(key)),
                }
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: Value::Counter(1),
                    expires_at_ms: Some(now_ms + ttl.as_millis() as u64),
                });
                Ok(1)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        match live(&mut state, key, now_ms) {
            Some(entry) => match &entry.value {
                Value::Str(value) => Ok(Some(value.clone())),
                _ => Err(wrong_kind(key)),
            },
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        state.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value),
                expires_at_ms: Some(now_ms + ttl.as_millis() as u64),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DependencyError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, DependencyError> {
        let now_ms = unix_now_ms();
        let mut state = self.state.lock().unwrap();
        state.retain(|_, entry| !entry.expires_at_ms.is_some_and(|at| now_ms >= at));
        let mut keys: Vec<String> = state
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

//! `memory`: registers the `Memory` operation backed by a shared
//! [`MemoryStore`] handle.
//!
//! Node config:
//!   mode: "read" | "write" (default "read")
//!   key: record key for writes (default: message `id`, else a timestamp)
//!   query: substring filter for reads (default "")
//!   k: max records returned (default 8)
//!   ttl: optional max age in seconds for reads; negative means no limit

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::container::Container;
use crate::error::OpError;
use crate::operation::{Message, config_int};

pub const STORE_KEY: &str = "memory";

#[derive(Debug, Clone)]
struct Record {
    value: Value,
    /// JSON text, for substring queries
    text: String,
    created_at: DateTime<Utc>,
}

/// In-process key/value store with optional TTL-aware lookups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<IndexMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, key: impl Into<String>, value: Value) {
        self.upsert_at(key.into(), value, Utc::now());
    }

    fn upsert_at(&self, key: String, value: Value, now: DateTime<Utc>) {
        let text = value.to_string();
        let mut items = self.items.lock();
        // re-insert so insertion order tracks recency
        items.shift_remove(&key);
        items.insert(
            key,
            Record {
                value,
                text,
                created_at: now,
            },
        );
    }

    /// Fetch `key`. An entry older than `ttl` is dropped and reported absent.
    pub fn get(&self, key: &str, ttl: Option<Duration>) -> Option<Value> {
        self.get_at(key, ttl, Utc::now())
    }

    fn get_at(&self, key: &str, ttl: Option<Duration>, now: DateTime<Utc>) -> Option<Value> {
        let mut items = self.items.lock();
        let record = items.get(key)?;
        if let Some(ttl) = ttl {
            if now - record.created_at > ttl {
                items.shift_remove(key);
                return None;
            }
        }
        Some(record.value.clone())
    }

    /// Up to `k` records whose JSON text contains `pattern`, newest first.
    pub fn query(&self, pattern: &str, k: usize, ttl: Option<Duration>) -> Vec<Value> {
        self.query_at(pattern, k, ttl, Utc::now())
    }

    fn query_at(&self, pattern: &str, k: usize, ttl: Option<Duration>, now: DateTime<Utc>) -> Vec<Value> {
        let items = self.items.lock();
        let mut hits: Vec<&Record> = items
            .values()
            .filter(|r| r.text.contains(pattern))
            .filter(|r| ttl.map(|ttl| now - r.created_at <= ttl).unwrap_or(true))
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.into_iter().take(k).map(|r| r.value.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

pub fn build(container: &mut Container, _settings: &Message) -> anyhow::Result<()> {
    container.get_or_insert_handle(STORE_KEY, MemoryStore::new)?;
    container.ops_mut().register_fn("Memory", op_memory);
    Ok(())
}

/// Negative, non-numeric or out-of-range `ttl` values mean no TTL.
fn ttl_from_config(config: &Message) -> Option<Duration> {
    let secs = config.get("ttl").and_then(Value::as_f64)?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_milliseconds((secs * 1000.0) as i64)
}

fn op_memory(message: Message, config: &Message, container: &Container) -> Result<Value, OpError> {
    let store = container
        .handle::<MemoryStore>(STORE_KEY)
        .ok_or_else(|| OpError::Config(format!("container has no '{STORE_KEY}' store")))?;

    let mode = config.get("mode").and_then(Value::as_str).unwrap_or("read");
    match mode {
        "write" => {
            let key = match (config.get("key"), message.get("id")) {
                (Some(Value::String(k)), _) => k.clone(),
                (Some(k), _) if !k.is_null() => k.to_string(),
                (_, Some(Value::String(id))) => id.clone(),
                (_, Some(id)) if !id.is_null() => id.to_string(),
                _ => Utc::now().timestamp_micros().to_string(),
            };
            store.upsert(key.clone(), Value::Object(message));
            Ok(json!({"stored": true, "key": key}))
        }
        "read" => {
            let query = config.get("query").and_then(Value::as_str).unwrap_or("");
            let k = config_int(config, "k", 8, 0) as usize;
            Ok(json!({"results": store.query(query, k, ttl_from_config(config))}))
        }
        other => Err(OpError::Config(format!("unknown memory mode '{other}'"))),
    }
}

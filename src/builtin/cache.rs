//! `cache`: registers the `Cache` operation, a sliding window over the values
//! a node receives on `stream_in` (and, when enabled, `opt_in`).
//!
//! Windows are keyed by `cache_id`, then `state_key`, then `_node_id`, falling
//! back to `"default"`. They live in the container's [`CacheStore`], so a
//! fresh assembly starts with empty windows.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::container::Container;
use crate::error::OpError;
use crate::operation::{Message, config_bool, config_int, truthy};

pub const STORE_KEY: &str = "cache_store";

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    tokens: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    history: VecDeque<CacheEntry>,
    passes_since_clear: usize,
    total_tokens: usize,
}

impl CacheState {
    fn clear(&mut self) {
        self.history.clear();
        self.passes_since_clear = 0;
        self.total_tokens = 0;
    }

    fn push(&mut self, payload: Value) {
        let tokens = token_count(&payload);
        self.total_tokens += tokens;
        self.history.push_back(CacheEntry { payload, tokens });
    }

    fn pop_oldest(&mut self) {
        if let Some(removed) = self.history.pop_front() {
            self.total_tokens -= removed.tokens;
        }
    }

    fn trim(&mut self, max_passes: usize, token_limit: usize) {
        while self.history.len() > max_passes {
            self.pop_oldest();
        }
        if token_limit > 0 {
            while self.total_tokens > token_limit && self.history.len() > 1 {
                self.pop_oldest();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub cache_id: String,
    pub max_passes: usize,
    /// 0 disables the token budget.
    pub token_limit: usize,
    /// 0 disables periodic clearing.
    pub clear_after: usize,
    /// Oldest first when true, newest first otherwise.
    pub prepend_mode: bool,
    pub enable_opt_in: bool,
}

impl CacheSettings {
    pub fn from_config(config: &Message) -> Self {
        let cache_id = ["cache_id", "state_key", "_node_id"]
            .iter()
            .filter_map(|k| config.get(*k))
            .find(|v| truthy(v))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "default".to_string());

        Self {
            cache_id,
            max_passes: config_int(config, "max_passes", 3, 1) as usize,
            token_limit: config_int(config, "token_limit", 0, 0) as usize,
            clear_after: config_int(config, "clear_after", 0, 0) as usize,
            prepend_mode: config_bool(config, "prepend_mode", true),
            enable_opt_in: config_bool(config, "enable_opt_in", false),
        }
    }
}

/// Whitespace-separated words in strings, one per scalar, summed through
/// arrays and objects.
pub fn token_count(payload: &Value) -> usize {
    match payload {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => 1,
        Value::String(s) => s.split_whitespace().count(),
        Value::Array(items) => items.iter().map(token_count).sum(),
        Value::Object(map) => map.values().map(token_count).sum(),
    }
}

#[derive(Debug, Default)]
pub struct CacheStore {
    states: Mutex<HashMap<String, CacheState>>,
}

impl CacheStore {
    /// Feed one message through the window named by `settings` and return the
    /// window contents.
    pub fn pass(&self, settings: &CacheSettings, message: &Message) -> Vec<Value> {
        let mut states = self.states.lock();
        let state = states.entry(settings.cache_id.clone()).or_default();

        if settings.clear_after > 0 && state.passes_since_clear >= settings.clear_after {
            state.clear();
        }

        let mut added = false;
        if let Some(payload) = message.get("stream_in") {
            state.push(payload.clone());
            added = true;
        }
        if settings.enable_opt_in {
            if let Some(payload) = message.get("opt_in") {
                state.push(payload.clone());
                added = true;
            }
        }
        if added {
            state.passes_since_clear += 1;
        }

        state.trim(settings.max_passes, settings.token_limit);

        let payloads = state.history.iter().map(|e| e.payload.clone());
        if settings.prepend_mode {
            payloads.collect()
        } else {
            payloads.rev().collect()
        }
    }
}

pub fn build(container: &mut Container, _settings: &Message) -> anyhow::Result<()> {
    container.get_or_insert_handle(STORE_KEY, CacheStore::default)?;
    container.ops_mut().register_fn("Cache", op_cache);
    Ok(())
}

fn op_cache(message: Message, config: &Message, container: &Container) -> Result<Value, OpError> {
    let store = container
        .handle::<CacheStore>(STORE_KEY)
        .ok_or_else(|| OpError::Config(format!("container has no '{STORE_KEY}' store")))?;
    let settings = CacheSettings::from_config(config);
    Ok(json!({"stream_out": store.pass(&settings, &message)}))
}

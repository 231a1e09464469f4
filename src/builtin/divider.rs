//! `divider`: registers the `DividerGate` operation.
//!
//! Node config:
//!   mode: "AND" | "OR" (default "AND")
//!   max_steps: routing budget per gate (default 100)
//!   rules: message fields that must be truthy
//!   triggers: named triggers
//!   trigger_states: trigger name -> bool
//!
//! The result holds exactly one of `pass`, `divert` or `trigger`, carrying the
//! routed message. A gate is built per call, so the step budget only matters
//! for callers that drive a [`Divider`] directly.

use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::Value;

use crate::container::Container;
use crate::error::OpError;
use crate::operation::{Message, config_int, truthy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    And,
    Or,
}

impl FromStr for GateMode {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(GateMode::And),
            "OR" => Ok(GateMode::Or),
            _ => Err(OpError::Config(format!("mode must be 'AND' or 'OR', got '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Pass,
    Divert,
    Trigger,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Pass => "pass",
            Route::Divert => "divert",
            Route::Trigger => "trigger",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Divider {
    mode: GateMode,
    rules: Vec<String>,
    triggers: IndexMap<String, bool>,
    max_steps: usize,
    steps: usize,
}

impl Divider {
    pub fn new(mode: GateMode, max_steps: usize) -> Self {
        Self {
            mode,
            rules: Vec::new(),
            triggers: IndexMap::new(),
            max_steps: max_steps.max(1),
            steps: 0,
        }
    }

    pub fn add_rule(&mut self, field: impl Into<String>) {
        self.rules.push(field.into());
    }

    pub fn add_trigger(&mut self, name: impl Into<String>) {
        self.triggers.insert(name.into(), false);
    }

    pub fn set_trigger(&mut self, name: &str, state: bool) -> Result<(), OpError> {
        match self.triggers.get_mut(name) {
            Some(slot) => {
                *slot = state;
                Ok(())
            }
            None => Err(OpError::Config(format!("unknown trigger: {name}"))),
        }
    }

    fn rules_pass(&self, packet: &Message) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let mut results = self
            .rules
            .iter()
            .map(|field| packet.get(field).map(truthy).unwrap_or(false));
        match self.mode {
            GateMode::And => results.all(|ok| ok),
            GateMode::Or => results.any(|ok| ok),
        }
    }

    /// Route one packet. Once the step budget is spent every packet is
    /// diverted with `_error: "max_steps_exceeded"`.
    pub fn route(&mut self, mut packet: Message) -> (Route, Message) {
        if self.steps >= self.max_steps {
            packet.insert("_error".into(), Value::String("max_steps_exceeded".into()));
            return (Route::Divert, packet);
        }
        self.steps += 1;

        if self.triggers.values().any(|on| *on) {
            return (Route::Trigger, packet);
        }
        if self.rules_pass(&packet) {
            (Route::Pass, packet)
        } else {
            (Route::Divert, packet)
        }
    }
}

fn string_list(config: &Message, key: &str) -> Result<Vec<String>, OpError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(OpError::Config(format!("'{key}' entries must be strings, got {other}"))),
            })
            .collect(),
        Some(_) => Err(OpError::Config(format!("'{key}' must be a list of strings"))),
    }
}

/// Configure a gate from node config.
pub fn gate_from_config(config: &Message) -> Result<Divider, OpError> {
    let mode = match config.get("mode") {
        None | Some(Value::Null) => GateMode::And,
        Some(Value::String(s)) => s.parse()?,
        Some(other) => return Err(OpError::Config(format!("mode must be a string, got {other}"))),
    };
    let mut gate = Divider::new(mode, config_int(config, "max_steps", 100, 1) as usize);

    for field in string_list(config, "rules")? {
        gate.add_rule(field);
    }
    let states = config.get("trigger_states").and_then(Value::as_object);
    for name in string_list(config, "triggers")? {
        gate.add_trigger(name.clone());
        if states.and_then(|s| s.get(&name)).map(truthy).unwrap_or(false) {
            gate.set_trigger(&name, true)?;
        }
    }
    Ok(gate)
}

pub fn build(container: &mut Container, _settings: &Message) -> anyhow::Result<()> {
    container.ops_mut().register_fn("DividerGate", op_divider_gate);
    Ok(())
}

fn op_divider_gate(message: Message, config: &Message, _container: &Container) -> Result<Value, OpError> {
    let mut gate = gate_from_config(config)?;
    let (route, packet) = gate.route(message);
    let mut out = Message::new();
    out.insert(route.as_str().to_string(), Value::Object(packet));
    Ok(Value::Object(out))
}

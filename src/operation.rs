//! Operation and tool contracts.
//!
//! Every concrete node behavior is plugged in through [`Operation`], addressed
//! by a node's `type_name` in the container's operation registry.

use serde_json::Value;

use crate::container::Container;
use crate::error::OpError;

/// A node's input or output mapping.
pub type Message = serde_json::Map<String, Value>;

pub trait Operation: Send + Sync {
    /// Run once for one node. The result must be a JSON object; anything else
    /// aborts the run.
    fn call(&self, message: Message, config: &Message, container: &Container)
    -> Result<Value, OpError>;
}

impl<F> Operation for F
where
    F: Fn(Message, &Message, &Container) -> Result<Value, OpError> + Send + Sync,
{
    fn call(
        &self,
        message: Message,
        config: &Message,
        container: &Container,
    ) -> Result<Value, OpError> {
        self(message, config, container)
    }
}

/// A named helper reachable by operations through the `tools` registry.
pub trait Tool: Send + Sync {
    fn call(&self, args: &Value) -> Result<Value, OpError>;
}

impl<F> Tool for F
where
    F: Fn(&Value) -> Result<Value, OpError> + Send + Sync,
{
    fn call(&self, args: &Value) -> Result<Value, OpError> {
        self(args)
    }
}

/// JSON type name, for diagnostics.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read an integer config entry, accepting numbers and numeric strings.
/// Falls back to `default` and clamps to `minimum`.
pub fn config_int(config: &Message, key: &str, default: i64, minimum: i64) -> i64 {
    let parsed = match config.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(Value::Bool(b)) => Some(i64::from(*b)),
        _ => None,
    };
    parsed.unwrap_or(default).max(minimum)
}

/// Read a boolean config entry using JSON truthiness.
pub fn config_bool(config: &Message, key: &str, default: bool) -> bool {
    config.get(key).map(truthy).unwrap_or(default)
}

/// JSON truthiness: null, false, 0, "", [] and {} are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(value: Value) -> Message {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn config_int_accepts_strings_and_clamps() {
        let c = cfg(json!({"a": "7", "b": -3, "c": "x"}));
        assert_eq!(config_int(&c, "a", 1, 0), 7);
        assert_eq!(config_int(&c, "b", 1, 0), 0);
        assert_eq!(config_int(&c, "c", 3, 1), 3);
        assert_eq!(config_int(&c, "missing", 5, 1), 5);
    }

    #[test]
    fn truthiness_follows_json_emptiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!("yes")));
        assert!(truthy(&json!({"k": 1})));
    }
}

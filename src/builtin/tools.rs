//! `tools`: registers the `ToolCall` operation and two stock tools.
//!
//! `ToolCall` looks up `config.tool` in the container's tool registry and calls
//! it with the message, overlaid with `config.args`. An object result is
//! returned as is; anything else is wrapped as `{"result": ...}`.

use serde_json::{Value, json};

use crate::container::Container;
use crate::error::OpError;
use crate::operation::{Message, kind_of};

use super::cache::token_count;

pub fn build(container: &mut Container, _settings: &Message) -> anyhow::Result<()> {
    let tools = container.tools_mut();
    tools.register_fn("echo", |args: &Value| Ok(args.clone()));
    tools.register_fn("word_count", |args: &Value| {
        Ok(json!({"words": token_count(args)}))
    });
    container.ops_mut().register_fn("ToolCall", op_tool_call);
    Ok(())
}

fn op_tool_call(message: Message, config: &Message, container: &Container) -> Result<Value, OpError> {
    let name = config
        .get("tool")
        .and_then(Value::as_str)
        .ok_or_else(|| OpError::Config("tool call requires 'tool' in config".into()))?;
    let tool = container.tools().get(name).ok_or_else(|| OpError::Tool {
        tool: name.to_string(),
        reason: "not registered".into(),
    })?;

    let mut args = message;
    match config.get("args") {
        None | Some(Value::Null) => {}
        Some(Value::Object(extra)) => args.extend(extra.clone()),
        Some(other) => {
            return Err(OpError::Config(format!("'args' must be an object, got {}", kind_of(other))));
        }
    }

    match tool.call(&Value::Object(args))? {
        out @ Value::Object(_) => Ok(out),
        other => Ok(json!({"result": other})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::object;
    use pretty_assertions::assert_eq;

    fn container() -> Container {
        let mut c = Container::new(Message::new());
        build(&mut c, &Message::new()).unwrap();
        c.tools_mut()
            .register_fn("double", |args: &Value| Ok(json!(args["n"].as_i64().unwrap_or(0) * 2)));
        c
    }

    fn call(c: &Container, message: Value, config: Value) -> Result<Value, OpError> {
        c.ops().get("ToolCall").unwrap().call(object(message), &object(config), c)
    }

    #[test]
    fn args_overlay_the_message() {
        let c = container();
        let out = call(&c, json!({"a": 1, "b": 1}), json!({"tool": "echo", "args": {"b": 2}})).unwrap();
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn scalar_results_are_wrapped() {
        let c = container();
        assert_eq!(call(&c, json!({"n": 4}), json!({"tool": "double"})).unwrap(), json!({"result": 8}));
        assert_eq!(
            call(&c, json!({"text": "one two three"}), json!({"tool": "word_count"})).unwrap(),
            json!({"words": 3})
        );
    }

    #[test]
    fn unknown_tool_fails() {
        let c = container();
        let err = call(&c, json!({}), json!({"tool": "nope"})).unwrap_err();
        assert!(matches!(err, OpError::Tool { ref tool, .. } if tool == "nope"));
    }
}

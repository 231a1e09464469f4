//! `prompt`: registers the `Prompt` operation.
//!
//! Renders `config.template` (default `{task}`), replacing each `{field}`
//! placeholder with the message's `field`. Strings are inserted verbatim,
//! other values as JSON, missing fields as the empty string.

use regex::{Captures, Regex};
use serde_json::{Value, json};

use crate::container::Container;
use crate::error::OpError;
use crate::operation::Message;

const PLACEHOLDER_RE: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)\}";
const DEFAULT_TEMPLATE: &str = "{task}";

pub fn build(container: &mut Container, _settings: &Message) -> anyhow::Result<()> {
    let re = Regex::new(PLACEHOLDER_RE)?;
    container
        .ops_mut()
        .register_fn("Prompt", move |message, config, _container| {
            op_prompt(&re, &message, config)
        });
    Ok(())
}

fn op_prompt(re: &Regex, message: &Message, config: &Message) -> Result<Value, OpError> {
    let template = match config.get("template") {
        None | Some(Value::Null) => DEFAULT_TEMPLATE,
        Some(Value::String(t)) => t.as_str(),
        Some(_) => return Err(OpError::Config("template must be a string".into())),
    };
    Ok(json!({ "prompt": render(re, template, message) }))
}

pub fn render(re: &Regex, template: &str, message: &Message) -> String {
    re.replace_all(template, |caps: &Captures| match message.get(&caps[1]) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
    .into_owned()
}

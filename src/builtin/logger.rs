//! `log`: registers the `Log` operation, which appends each message as one
//! JSON line to `config.path`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::container::Container;
use crate::error::OpError;
use crate::operation::Message;

/// Handle key of the append lock shared by every `Log` node.
pub const WRITER_KEY: &str = "logs";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Serializes appends so concurrent runs never interleave lines.
#[derive(Debug, Default)]
pub struct JsonLog {
    lock: Mutex<()>,
}

impl JsonLog {
    /// Append `record` to `path`, creating parent directories as needed. A
    /// `timestamp` field is added unless the record already has one.
    pub fn append(&self, path: &Path, mut record: Message) -> Result<(), OpError> {
        if !record.contains_key("timestamp") {
            let now = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();
            record.insert("timestamp".into(), Value::String(now));
        }
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.lock.lock();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

pub fn build(container: &mut Container, _settings: &Message) -> anyhow::Result<()> {
    container.get_or_insert_handle(WRITER_KEY, JsonLog::default)?;
    container.ops_mut().register_fn("Log", op_log);
    Ok(())
}

fn op_log(message: Message, config: &Message, container: &Container) -> Result<Value, OpError> {
    let path = match config.get("path") {
        Some(Value::String(p)) if !p.is_empty() => PathBuf::from(p),
        _ => return Err(OpError::Config("log op requires 'path' in config".into())),
    };
    let mut record = match config.get("extra") {
        None | Some(Value::Null) => Message::new(),
        Some(Value::Object(extra)) => extra.clone(),
        Some(_) => return Err(OpError::Config("'extra' must be an object".into())),
    };
    record.extend(message);

    let writer = container
        .handle::<JsonLog>(WRITER_KEY)
        .ok_or_else(|| OpError::Config(format!("container has no '{WRITER_KEY}' writer")))?;
    writer.append(&path, record)?;

    Ok(json!({"logged": true, "path": path.display().to_string()}))
}

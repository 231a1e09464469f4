//! `values`: a declarative chunk that publishes each of its settings as a
//! container key.

use crate::container::Container;
use crate::operation::Message;

pub fn build(container: &mut Container, settings: &Message) -> anyhow::Result<()> {
    for (key, value) in settings {
        container.insert_value(key.clone(), value.clone())?;
    }
    Ok(())
}

//! Build-order resolution over capability keys.
//!
//! Requirements are satisfied by *keys*, not by specific chunks: several chunks
//! may provide the same key and the initial container may already hold it. We
//! index the still-missing keys to the chunks waiting on them and emit ready
//! chunks in discovery-ordered passes until no pass makes progress.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::UnresolvedDependencies;

use super::ModuleDescriptor;

/// Order `descriptors` so each one's `requires` is covered by `initial_keys`
/// plus the `provides` of everything before it.
pub fn resolve<I, S>(
    descriptors: Vec<ModuleDescriptor>,
    initial_keys: I,
) -> Result<Vec<ModuleDescriptor>, UnresolvedDependencies>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut available: BTreeSet<String> = initial_keys.into_iter().map(Into::into).collect();

    // waiters[key] = chunks (by discovery index) still missing `key`
    let mut waiters: HashMap<String, Vec<usize>> = HashMap::new();
    let mut outstanding: Vec<usize> = Vec::with_capacity(descriptors.len());
    let mut ready: BTreeSet<usize> = BTreeSet::new();

    for (idx, d) in descriptors.iter().enumerate() {
        let mut count = 0;
        for key in d.requires.iter().filter(|k| !available.contains(*k)) {
            waiters.entry(key.clone()).or_default().push(idx);
            count += 1;
        }
        outstanding.push(count);
        if count == 0 {
            ready.insert(idx);
        }
    }

    // A pass walks the chunks in discovery order and emits each one that is
    // ready when the walk reaches it, including chunks unlocked earlier in the
    // same pass. Chunks unlocked behind the cursor wait for the next pass.
    let mut order: Vec<usize> = Vec::with_capacity(descriptors.len());
    let mut cursor: Option<usize> = None;
    loop {
        let Some(idx) = cursor
            .and_then(|c| ready.range(c + 1..).next().copied())
            .or_else(|| ready.first().copied())
        else {
            break;
        };
        ready.remove(&idx);
        order.push(idx);
        cursor = Some(idx);

        for key in &descriptors[idx].provides {
            if !available.insert(key.clone()) {
                continue;
            }
            for waiter in waiters.remove(key).unwrap_or_default() {
                outstanding[waiter] -= 1;
                if outstanding[waiter] == 0 {
                    ready.insert(waiter);
                }
            }
        }
    }

    if order.len() < descriptors.len() {
        let emitted: BTreeSet<usize> = order.iter().copied().collect();
        let mut missing: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (_, d) in descriptors
            .iter()
            .enumerate()
            .filter(|(idx, _)| !emitted.contains(idx))
        {
            missing
                .entry(d.name())
                .or_default()
                .extend(d.requires.difference(&available).cloned());
        }
        return Err(UnresolvedDependencies { missing });
    }

    let mut slots: Vec<Option<ModuleDescriptor>> = descriptors.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}

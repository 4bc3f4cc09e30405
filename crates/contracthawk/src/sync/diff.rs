//! Identity-keyed diff between a stored endpoint set and an incoming snapshot.

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::model::{index_by_identity, EndpointField, EndpointRecord};

/// An endpoint present on both sides whose observable attributes differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedEndpoint {
    pub current: EndpointRecord,
    pub proposed: EndpointRecord,
    pub changed_fields: Vec<EndpointField>,
    /// Human-readable form of `changed_fields`, e.g. `Changed: description, deprecated`.
    pub change_description: String,
}

impl ChangedEndpoint {
    fn new(
        current: EndpointRecord,
        proposed: EndpointRecord,
        changed_fields: Vec<EndpointField>,
    ) -> Self {
        let names: Vec<&str> = changed_fields.iter().map(EndpointField::as_str).collect();
        Self {
            current,
            proposed,
            change_description: format!("Changed: {}", names.join(", ")),
            changed_fields,
        }
    }
}

/// Output of [`diff`].
///
/// `added` and `changed` follow the order of the incoming snapshot,
/// `removed` follows the order of the current set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    #[serde(rename = "addedEndpoints")]
    pub added: Vec<EndpointRecord>,
    #[serde(rename = "removedEndpoints")]
    pub removed: Vec<EndpointRecord>,
    #[serde(rename = "changedEndpoints")]
    pub changed: Vec<ChangedEndpoint>,
}

impl DiffResult {
    /// True when both sides describe the same endpoints with the same attributes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Computes added, removed and changed endpoints between `current` and `incoming`.
///
/// Pure: nothing is read from or written to storage. Fails only when either
/// side repeats an identity.
pub fn diff(current: &[EndpointRecord], incoming: &[EndpointRecord]) -> Result<DiffResult> {
    let current_by_id = index_by_identity(current)?;
    let incoming_by_id = index_by_identity(incoming)?;

    let mut result = DiffResult::default();

    for proposed in incoming {
        match current_by_id.get(&proposed.identity()) {
            None => result.added.push(proposed.clone()),
            Some(existing) => {
                let fields = existing.changed_fields(proposed);
                if !fields.is_empty() {
                    result.changed.push(ChangedEndpoint::new(
                        (*existing).clone(),
                        proposed.clone(),
                        fields,
                    ));
                }
            }
        }
    }

    result.removed = current
        .iter()
        .filter(|existing| !incoming_by_id.contains_key(&existing.identity()))
        .cloned()
        .collect();

    Ok(result)
}

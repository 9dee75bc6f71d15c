use serde::{Deserialize, Serialize};

/// A registered probe. Every field is populated once the record exists.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Probe {
    pub(crate) identifier: String,
    pub(crate) endpoint: String,
    pub(crate) keys: Vec<String>,
    pub(crate) versions: Vec<String>,
}

impl Probe {
    pub fn new(
        identifier: String,
        endpoint: String,
        keys: Vec<String>,
        versions: Vec<String>,
    ) -> Probe {
        Probe {
            identifier,
            endpoint,
            keys,
            versions,
        }
    }

    pub fn get_identifier(&self) -> &str {
        &self.identifier
    }

    /// Overwrites the fields set on `update`, leaving the rest untouched.
    /// The identifier is never part of an update.
    pub fn merge(&mut self, update: ProbeUpdate) {
        if let Some(endpoint) = update.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(keys) = update.keys {
            self.keys = keys;
        }
        if let Some(versions) = update.versions {
            self.versions = versions;
        }
    }
}

/// Partial update of a probe. `None` means the field was not supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeUpdate {
    pub(crate) endpoint: Option<String>,
    pub(crate) keys: Option<Vec<String>>,
    pub(crate) versions: Option<Vec<String>>,
}

impl ProbeUpdate {
    /// True when nothing usable was supplied. An empty endpoint alone does not
    /// count as input, but it is still applied when another field is present.
    pub fn is_empty(&self) -> bool {
        self.endpoint.as_deref().map_or(true, str::is_empty)
            && self.keys.as_ref().map_or(true, Vec::is_empty)
            && self.versions.as_ref().map_or(true, Vec::is_empty)
    }
}

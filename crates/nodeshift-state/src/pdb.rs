//! Pod disruption budget limits.
//!
//! The disruption engine does not compute PDB status itself; it consumes
//! a snapshot of "how many disruptions each PDB still allows" and asks
//! whether a set of pods could be evicted right now.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::pod;
use crate::types::Pod;

/// A pod disruption budget as observed at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdbSpec {
    pub namespace: String,
    pub name: String,
    /// Label selector. Empty selects every pod in the namespace.
    #[serde(default)]
    pub selector: HashMap<String, String>,
    pub disruptions_allowed: u32,
}

impl PdbSpec {
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    fn selects(&self, pod: &Pod) -> bool {
        pod.namespace == self.namespace
            && self
                .selector
                .iter()
                .all(|(k, v)| pod.labels.get(k).is_some_and(|pv| pv == v))
    }
}

/// Evaluates pods against eviction budgets.
pub trait PdbLimits: Send + Sync {
    /// `Err(pdb_key)` names the first budget that would block an eviction.
    fn can_evict_pods(&self, pods: &[Pod]) -> Result<(), String>;
}

/// PDB limits backed by a fixed list of budgets.
#[derive(Debug, Clone, Default)]
pub struct Limits {
    pdbs: Vec<PdbSpec>,
}

impl Limits {
    pub fn new(pdbs: Vec<PdbSpec>) -> Self {
        Self { pdbs }
    }
}

impl PdbLimits for Limits {
    fn can_evict_pods(&self, pods: &[Pod]) -> Result<(), String> {
        for p in pods {
            // Pods that skip the eviction API are not subject to PDBs.
            if !pod::is_evictable(p) {
                continue;
            }
            if let Some(pdb) = self
                .pdbs
                .iter()
                .find(|pdb| pdb.selects(p) && pdb.disruptions_allowed == 0)
            {
                return Err(pdb.key());
            }
        }
        Ok(())
    }
}

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use waygate_core::authority::{DelegationConstraints, PublicJwk};

/// Separator for the `(subject, agent_id, tool_id)` composite key.
const KEY_SEPARATOR: char = '\x1f';

/// A stored delegation: one per `(subject, agent_id, tool_id)`, newest write
/// wins. The raw signed envelope and its verification key are retained for
/// audit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegationRecord {
    #[allow(missing_docs)]
    pub subject: String,
    #[allow(missing_docs)]
    pub agent_id: String,
    #[allow(missing_docs)]
    pub tool_id: String,
    /// The scopes this delegation authorizes
    pub scopes: Vec<String>,
    /// Absolute expiry, unix seconds
    pub not_after: u64,
    /// Who minted the credential
    pub issuer: String,
    /// The compact JWS as submitted
    pub envelope: String,
    /// The key the envelope verifies under
    pub jwk: PublicJwk,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<DelegationConstraints>,
}

impl DelegationRecord {
    /// Composite key for this record.
    pub fn key(&self) -> String {
        delegation_key(&self.subject, &self.agent_id, &self.tool_id)
    }

    /// Whether this delegation has lapsed.
    pub fn is_expired(&self, now: u64) -> bool {
        self.not_after < now
    }
}

/// Render the composite key for a `(subject, agent_id, tool_id)` triple.
pub fn delegation_key(subject: &str, agent_id: &str, tool_id: &str) -> String {
    format!(
        "{}{}{}{}{}",
        subject, KEY_SEPARATOR, agent_id, KEY_SEPARATOR, tool_id
    )
}

/// The sled-backed delegation store. Reads go straight to the tree; writes
/// are serialized through a single mutex.
#[derive(Clone)]
pub struct DelegationStore {
    tree: sled::Tree,
    write_lock: Arc<Mutex<()>>,
}

impl DelegationStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(DelegationStore {
            tree: db.open_tree("delegations")?,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// An ephemeral store for tests and demos.
    pub fn ephemeral() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(DelegationStore {
            tree: db.open_tree("delegations")?,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Insert or replace the record for its `(subject, agent_id, tool_id)`.
    pub async fn upsert(&self, record: &DelegationRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.tree
            .insert(record.key().as_bytes(), serde_json::to_vec(record)?)?;
        self.tree.flush()?;
        Ok(())
    }

    /// Fetch one record, expired or not.
    pub fn get(&self, subject: &str, agent_id: &str, tool_id: &str) -> Result<Option<DelegationRecord>> {
        let key = delegation_key(subject, agent_id, tool_id);
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every stored record, in key order.
    pub fn list(&self) -> Result<Vec<DelegationRecord>> {
        let mut records = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }

    /// Remove one record; true when something was there.
    pub async fn remove(&self, subject: &str, agent_id: &str, tool_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = delegation_key(subject, agent_id, tool_id);
        let removed = self.tree.remove(key.as_bytes())?.is_some();
        self.tree.flush()?;
        Ok(removed)
    }
}

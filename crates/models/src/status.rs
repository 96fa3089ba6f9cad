use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum MerkletreeType {
    #[serde(rename = "UTXO")]
    Utxo,
    #[serde(rename = "TXID")]
    Txid,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MerkletreeScanStatus {
    Started,
    Updated,
    Complete,
    Incomplete,
}

impl MerkletreeScanStatus {
    /// `Started` and `Updated` mean a scan is still moving.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            MerkletreeScanStatus::Started | MerkletreeScanStatus::Updated
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MerkletreeScanCurrentStatus {
    pub status: MerkletreeScanStatus,
    /// Percentage, 0 to 100.
    #[serde(default)]
    pub progress: f64,
}

impl MerkletreeScanCurrentStatus {
    pub fn new(status: MerkletreeScanStatus, progress: f64) -> Self {
        Self {
            status,
            progress: progress.clamp(0.0, 100.0),
        }
    }
}

/// Status line published by the proof batcher, e.g. `"Proving 2/5 (40.00%)"`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProofBatcherState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

pub const PROOF_BATCH_COMPLETE_MARKER: &str = "100.00%";

impl ProofBatcherState {
    pub fn is_updating(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => !status.is_empty() && !status.contains(PROOF_BATCH_COMPLETE_MARKER),
            None => false,
        }
    }

    pub fn progress_text(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_status_in_progress() {
        assert!(MerkletreeScanStatus::Started.is_in_progress());
        assert!(MerkletreeScanStatus::Updated.is_in_progress());
        assert!(!MerkletreeScanStatus::Complete.is_in_progress());
        assert!(!MerkletreeScanStatus::Incomplete.is_in_progress());
    }

    #[test]
    fn batcher_updating_rules() {
        let state = |status: Option<&str>| ProofBatcherState {
            status: status.map(str::to_string),
        };
        assert!(!state(None).is_updating());
        assert!(!state(Some("")).is_updating());
        assert!(!state(Some("Proving 5/5 (100.00%)")).is_updating());
        assert!(state(Some("Proving 2/5 (40.00%)")).is_updating());
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(
            MerkletreeScanCurrentStatus::new(MerkletreeScanStatus::Updated, 140.0).progress,
            100.0
        );
    }

    #[test]
    fn merkletree_type_wire_names() {
        assert_eq!(serde_json::to_string(&MerkletreeType::Utxo).unwrap(), "\"UTXO\"");
        assert_eq!(serde_json::to_string(&MerkletreeType::Txid).unwrap(), "\"TXID\"");
    }
}

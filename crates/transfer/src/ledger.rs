use std::collections::BTreeSet;
use std::sync::Mutex;

use vidup_protocol::{CompleteUploadRequest, PartEntry};

/// One successfully uploaded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    /// `chunk.index + 1`.
    pub part_number: u32,
    /// Server-issued integrity tag.
    pub tag: String,
}

impl PartRecord {
    pub fn new(part_number: u32, tag: impl Into<String>) -> Self {
        Self {
            part_number,
            tag: tag.into(),
        }
    }

    pub fn to_entry(&self) -> PartEntry {
        PartEntry {
            part_number: self.part_number,
            e_tag: self.tag.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PartLedger
// ---------------------------------------------------------------------------

/// Accumulates part records from concurrent workers.
///
/// Appends may arrive in any order. The ledger is drained exactly once,
/// after every worker has finished, to build the [`FinalizeManifest`].
#[derive(Debug, Default)]
pub struct PartLedger {
    records: Mutex<Vec<PartRecord>>,
}

impl PartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Safe to call from many tasks at once.
    pub fn record(&self, record: PartRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every record, sorted ascending by part number.
    pub fn drain_sorted(&self) -> Vec<PartRecord> {
        let mut records =
            std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()));
        records.sort_by_key(|r| r.part_number);
        records
    }
}

// ---------------------------------------------------------------------------
// FinalizeManifest
// ---------------------------------------------------------------------------

/// Ordered part list submitted to commit an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeManifest {
    parts: Vec<PartRecord>,
}

impl FinalizeManifest {
    /// Builds a manifest from `parts` in any order.
    pub fn new(mut parts: Vec<PartRecord>) -> Self {
        parts.sort_by_key(|r| r.part_number);
        Self { parts }
    }

    /// Drains `ledger` into a manifest.
    pub fn from_ledger(ledger: &PartLedger) -> Self {
        Self {
            parts: ledger.drain_sorted(),
        }
    }

    /// Checks that the parts are exactly `{1..=total_chunks}`, each once.
    pub fn verify(&self, total_chunks: u32) -> Result<(), LedgerError> {
        let mut seen = BTreeSet::new();
        let mut duplicates = Vec::new();
        let mut out_of_range = Vec::new();

        for part in &self.parts {
            let n = part.part_number;
            if n == 0 || n > total_chunks {
                out_of_range.push(n);
            } else if !seen.insert(n) {
                duplicates.push(n);
            }
        }

        let missing: Vec<u32> = (1..=total_chunks).filter(|n| !seen.contains(n)).collect();

        if missing.is_empty() && duplicates.is_empty() && out_of_range.is_empty() {
            return Ok(());
        }
        duplicates.dedup();
        Err(LedgerError {
            expected: total_chunks,
            missing,
            duplicates,
            out_of_range,
        })
    }

    pub fn parts(&self) -> &[PartRecord] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Request body for the finalize call.
    pub fn to_request(&self) -> CompleteUploadRequest {
        CompleteUploadRequest {
            parts: self.parts.iter().map(PartRecord::to_entry).collect(),
        }
    }
}

/// A manifest that does not cover every chunk exactly once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "manifest does not cover parts 1..={expected}{}",
    describe_gaps(.missing, .duplicates, .out_of_range)
)]
pub struct LedgerError {
    pub expected: u32,
    pub missing: Vec<u32>,
    pub duplicates: Vec<u32>,
    pub out_of_range: Vec<u32>,
}

fn describe_gaps(missing: &[u32], duplicates: &[u32], out_of_range: &[u32]) -> String {
    let mut out = String::new();
    for (label, parts) in [
        ("missing", missing),
        ("duplicated", duplicates),
        ("out of range", out_of_range),
    ] {
        if !parts.is_empty() {
            out.push_str(&format!("; {label} {parts:?}"));
        }
    }
    out
}

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use outreach_core::{LedgerEntry, LedgerView, SendStatus};
use outreach_logging::{outreach_info, outreach_warn};
use serde::{Deserialize, Serialize};

use crate::csv::encode_row;
use crate::persist::{ensure_parent_dir, write_atomic};
use crate::types::LedgerError;

/// Wire format of one ledger line. The core entry type stays free of
/// serde; this struct owns the JSON shape.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    timestamp: String,
    identity_key: String,
    user_id: String,
    full_name: String,
    company_name: String,
    account: String,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl PersistedEntry {
    fn from_entry(entry: &LedgerEntry) -> Self {
        PersistedEntry {
            timestamp: entry.timestamp.clone(),
            identity_key: entry.identity_key.clone(),
            user_id: entry.user_id.clone(),
            full_name: entry.full_name.clone(),
            company_name: entry.company_name.clone(),
            account: entry.account.clone(),
            status: entry.status.as_str().to_string(),
            template_id: entry.template_id.clone(),
            detail: entry.detail.clone(),
        }
    }

    fn into_entry(self) -> Option<LedgerEntry> {
        let status = SendStatus::parse(&self.status)?;
        Some(LedgerEntry {
            timestamp: self.timestamp,
            identity_key: self.identity_key,
            user_id: self.user_id,
            full_name: self.full_name,
            company_name: self.company_name,
            account: self.account,
            status,
            template_id: self.template_id,
            detail: self.detail,
        })
    }
}

/// Append-only campaign history, one JSON object per line.
///
/// The file is the source of truth for what has been sent; the store
/// never carries status. Appends are flushed and synced before they
/// are acknowledged so a crash cannot lose acknowledged sends.
pub struct CampaignLedger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl CampaignLedger {
    /// Opens the ledger, loading prior entries. Unparseable lines are
    /// skipped with a warning; they never abort a campaign.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut entries = Vec::new();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut skipped = 0usize;
            for (number, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let parsed = serde_json::from_str::<PersistedEntry>(line)
                    .ok()
                    .and_then(PersistedEntry::into_entry);
                match parsed {
                    Some(entry) => entries.push(entry),
                    None => {
                        skipped += 1;
                        outreach_warn!(
                            "skipping unreadable ledger line {} in {}",
                            number + 1,
                            path.display()
                        );
                    }
                }
            }
            outreach_info!(
                "loaded {} ledger entries from {} ({} skipped)",
                entries.len(),
                path.display(),
                skipped
            );
        }
        Ok(CampaignLedger { path, entries })
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Builds the read-model used by audience selection and reporting.
    pub fn view(&self) -> LedgerView {
        LedgerView::from_entries(&self.entries)
    }

    /// Appends one entry durably. The in-memory list is only extended
    /// after the write succeeds.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        ensure_parent_dir(&self.path)?;
        let line = serde_json::to_string(&PersistedEntry::from_entry(&entry))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        self.entries.push(entry);
        Ok(())
    }

    /// Writes the per-send results table next to the ledger, one row
    /// per attempt, for spreadsheet review.
    pub fn export_results(&self, path: &Path) -> Result<(), LedgerError> {
        let mut content = String::new();
        content.push_str(&encode_row(&[
            "timestamp",
            "user_id",
            "full_name",
            "message_sent",
            "account_used",
            "company_name",
            "status",
            "template_id",
            "detail",
        ]));
        content.push('\n');
        for entry in &self.entries {
            let message_sent = if entry.status.message_sent() {
                "true"
            } else {
                "false"
            };
            content.push_str(&encode_row(&[
                &entry.timestamp,
                &entry.user_id,
                &entry.full_name,
                message_sent,
                &entry.account,
                &entry.company_name,
                entry.status.as_str(),
                entry.template_id.as_deref().unwrap_or(""),
                entry.detail.as_deref().unwrap_or(""),
            ]));
            content.push('\n');
        }
        write_atomic(path, &content)?;
        Ok(())
    }
}

/// RFC 3339 timestamp with second precision, the ledger's time format.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

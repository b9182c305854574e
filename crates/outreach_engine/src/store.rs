use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use outreach_core::{ContactRecord, IdentityKey, MergeOutcome};
use outreach_logging::{outreach_info, outreach_warn};

use crate::csv::{encode_row, split_row};
use crate::persist::{ensure_parent_dir, write_atomic};
use crate::types::StoreError;

/// Column order of the store file, kept stable so external tooling can
/// rely on it.
const COLUMNS: [&str; 18] = [
    "full_name",
    "company_name",
    "position",
    "linkedin_url",
    "facebook_url",
    "x_twitter_url",
    "other_socials",
    "country",
    "responsibility",
    "gaming_vertical",
    "organization_type",
    "introduction",
    "email",
    "phone",
    "social_handles",
    "source_url",
    "profile_image_url",
    "user_id",
];

/// CSV-backed contact store with an in-memory identity index.
///
/// Inserts append a row; updates rewrite the whole file atomically so
/// a crash can never leave a half-written store behind. Every mutation
/// is durable before `merge` returns.
#[derive(Debug)]
pub struct ContactStore {
    path: PathBuf,
    records: Vec<ContactRecord>,
    index: HashMap<IdentityKey, usize>,
}

impl ContactStore {
    /// Opens the store at `path`, loading any existing records. A
    /// missing file is an empty store; the file is created on first
    /// merge.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = ContactStore {
            path,
            records: Vec::new(),
            index: HashMap::new(),
        };
        if store.path.exists() {
            store.load()?;
            outreach_info!(
                "loaded {} contacts from {}",
                store.records.len(),
                store.path.display()
            );
        }
        Ok(store)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        let content = fs::read_to_string(&self.path)?;
        for (number, line) in content.lines().enumerate() {
            if number == 0 || line.is_empty() {
                // Header row, or the trailing newline artifact.
                continue;
            }
            let fields = split_row(line).ok_or_else(|| StoreError::MalformedRow {
                line: number + 1,
                reason: "unterminated quoted field".to_string(),
            })?;
            if fields.len() != COLUMNS.len() {
                return Err(StoreError::MalformedRow {
                    line: number + 1,
                    reason: format!("{} fields, expected {}", fields.len(), COLUMNS.len()),
                });
            }
            let record = record_from_fields(fields);
            let key = record.identity_key();
            if let Some(existing) = self.index.get(&key) {
                // Legacy duplicates collapse onto the first occurrence.
                outreach_warn!("duplicate identity {key} at row {}", number + 1);
                let index = *existing;
                self.records[index].absorb(&record);
            } else {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
        Ok(())
    }

    /// Identity keys already present, for preloading dedup sets.
    pub fn known_identities(&self) -> HashSet<IdentityKey> {
        self.index.keys().cloned().collect()
    }

    pub fn records(&self) -> &[ContactRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Merges one record in and makes the change durable. Inserting
    /// appends a row, updating rewrites the file, duplicates touch
    /// nothing on disk.
    pub fn merge(&mut self, record: ContactRecord) -> Result<MergeOutcome, StoreError> {
        let key = record.identity_key();
        match self.index.get(&key).copied() {
            None => {
                self.append_row(&record)?;
                self.index.insert(key, self.records.len());
                self.records.push(record);
                Ok(MergeOutcome::Inserted)
            }
            Some(index) => {
                if self.records[index].absorb(&record) {
                    self.rewrite()?;
                    Ok(MergeOutcome::Updated)
                } else {
                    Ok(MergeOutcome::Duplicate)
                }
            }
        }
    }

    fn append_row(&mut self, record: &ContactRecord) -> Result<(), StoreError> {
        ensure_parent_dir(&self.path)?;
        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if is_new {
            writeln!(file, "{}", encode_row(&COLUMNS))?;
        }
        writeln!(file, "{}", encode_row(&record_fields(record)))?;
        file.sync_all()?;
        Ok(())
    }

    fn rewrite(&self) -> Result<(), StoreError> {
        let mut content = String::new();
        content.push_str(&encode_row(&COLUMNS));
        content.push('\n');
        for record in &self.records {
            content.push_str(&encode_row(&record_fields(record)));
            content.push('\n');
        }
        write_atomic(&self.path, &content)?;
        Ok(())
    }
}

fn record_fields(record: &ContactRecord) -> [&str; 18] {
    [
        &record.full_name,
        &record.company_name,
        &record.position,
        &record.linkedin_url,
        &record.facebook_url,
        &record.x_twitter_url,
        &record.other_socials,
        &record.country,
        &record.responsibility,
        &record.gaming_vertical,
        &record.organization_type,
        &record.introduction,
        &record.email,
        &record.phone,
        &record.social_handles,
        &record.source_url,
        &record.profile_image_url,
        &record.user_id,
    ]
}

fn record_from_fields(fields: Vec<String>) -> ContactRecord {
    let mut iter = fields.into_iter();
    let mut next = || iter.next().unwrap_or_default();
    ContactRecord {
        full_name: next(),
        company_name: next(),
        position: next(),
        linkedin_url: next(),
        facebook_url: next(),
        x_twitter_url: next(),
        other_socials: next(),
        country: next(),
        responsibility: next(),
        gaming_vertical: next(),
        organization_type: next(),
        introduction: next(),
        email: next(),
        phone: next(),
        social_handles: next(),
        source_url: next(),
        profile_image_url: next(),
        user_id: next(),
    }
}

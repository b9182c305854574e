use std::collections::HashMap;

use crate::record::IdentityKey;

/// Outcome of one outreach attempt, as recorded in the campaign ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendStatus {
    /// Selected for sending but not attempted yet. Written by external
    /// tooling; the dispatcher itself only records final outcomes.
    Pending,
    /// The message was delivered (or the platform showed it already was).
    Sent,
    /// The contact replied to an earlier message.
    SentAnswer,
    /// All attempts for this contact failed; eligible again next run.
    Failed,
    /// Skipped because a colleague at the same company replied.
    ContactedWithOtherWorker,
}

impl SendStatus {
    /// Terminal statuses take a contact out of every future audience.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SendStatus::Pending | SendStatus::Failed)
    }

    /// True when a message actually reached the contact.
    pub fn message_sent(self) -> bool {
        matches!(self, SendStatus::Sent | SendStatus::SentAnswer)
    }

    /// The ledger wire spelling, kept stable across versions.
    pub fn as_str(self) -> &'static str {
        match self {
            SendStatus::Pending => "Pending",
            SendStatus::Sent => "Sent",
            SendStatus::SentAnswer => "Sent Answer",
            SendStatus::Failed => "Failed",
            SendStatus::ContactedWithOtherWorker => "contacted with other worker",
        }
    }

    pub fn parse(raw: &str) -> Option<SendStatus> {
        match raw {
            "Pending" => Some(SendStatus::Pending),
            "Sent" => Some(SendStatus::Sent),
            "Sent Answer" => Some(SendStatus::SentAnswer),
            "Failed" => Some(SendStatus::Failed),
            "contacted with other worker" => Some(SendStatus::ContactedWithOtherWorker),
            _ => None,
        }
    }
}

/// One row of the append-only campaign ledger.
///
/// The timestamp is RFC 3339 text; this crate never touches a clock,
/// the engine stamps entries when it appends them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub timestamp: String,
    pub identity_key: String,
    pub user_id: String,
    pub full_name: String,
    pub company_name: String,
    pub account: String,
    pub status: SendStatus,
    pub template_id: Option<String>,
    pub detail: Option<String>,
}

/// Per-company aggregate derived from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompanyState {
    /// Some member's latest status is [`SendStatus::SentAnswer`].
    pub has_reply: bool,
    /// Some member has ever been messaged.
    pub has_contact: bool,
}

/// Read-model over ledger entries: latest status per identity and
/// company aggregates. Rebuilt from the full entry list; later entries
/// for the same identity supersede earlier ones.
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    latest: HashMap<String, SendStatus>,
    companies: HashMap<String, CompanyState>,
}

impl LedgerView {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut view = LedgerView::default();
        for entry in entries {
            view.apply(entry);
        }
        view
    }

    /// Folds one more entry into the view. The engine calls this as it
    /// appends so the view never lags the file.
    pub fn apply(&mut self, entry: &LedgerEntry) {
        self.latest
            .insert(entry.identity_key.clone(), entry.status);
        let company = crate::record::normalize_identity_part(&entry.company_name);
        if company.is_empty() {
            return;
        }
        let state = self.companies.entry(company).or_default();
        match entry.status {
            SendStatus::SentAnswer => {
                state.has_reply = true;
                state.has_contact = true;
            }
            SendStatus::Sent | SendStatus::Failed => state.has_contact = true,
            SendStatus::Pending | SendStatus::ContactedWithOtherWorker => {}
        }
    }

    pub fn latest_status(&self, key: &IdentityKey) -> Option<SendStatus> {
        self.latest.get(key.as_str()).copied()
    }

    /// Looks up a company by its normalized name.
    pub fn company(&self, normalized_name: &str) -> Option<&CompanyState> {
        self.companies.get(normalized_name)
    }

    pub fn identities(&self) -> impl Iterator<Item = (&str, SendStatus)> {
        self.latest.iter().map(|(key, status)| (key.as_str(), *status))
    }

    pub fn companies(&self) -> impl Iterator<Item = (&str, &CompanyState)> {
        self.companies.iter().map(|(name, state)| (name.as_str(), state))
    }
}

use crate::ledger::{LedgerView, SendStatus};
use crate::record::{normalize_identity_part, ContactRecord, IdentityKey};

/// Keyword configuration for audience selection.
///
/// Keywords are matched case-insensitively as substrings of the
/// record's `gaming_vertical`. Exclusion wins over inclusion when both
/// match; the inclusion list only feeds reporting and ordering stays
/// driven by `priority_positions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub include_verticals: Vec<String>,
    pub exclude_verticals: Vec<String>,
    pub priority_positions: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            include_verticals: to_strings(&[
                "online", "casino", "igaming", "i-gaming", "betting", "sportsbook",
                "poker", "slots", "bingo", "lottery", "esports",
            ]),
            exclude_verticals: to_strings(&[
                "land", "land-based", "landbased", "retail", "offline",
                "brick", "terrestrial",
            ]),
            priority_positions: to_strings(&[
                "ceo", "founder", "owner", "partner", "head", "director",
                "vp", "chief", "manager",
            ]),
        }
    }
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_owned()).collect()
}

/// Why a stored record was left out of the send audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    /// Name or company is missing; the record cannot be addressed.
    MissingIdentity,
    /// No platform user id, so there is nobody to message.
    MissingUserId,
    /// The ledger already shows a terminal contact status.
    AlreadyContacted,
    /// The vertical matched an exclusion keyword.
    VerticalExcluded,
    /// A colleague at the same company already replied.
    CompanyHasReply,
}

/// Output of [`select_audience`].
#[derive(Debug, Clone, Default)]
pub struct AudienceSelection {
    /// Records to message, priority positions first, store order otherwise.
    pub eligible: Vec<ContactRecord>,
    /// Records skipped because their company already has a reply and
    /// whose own ledger status does not yet say so. The caller records
    /// [`SendStatus::ContactedWithOtherWorker`] for each of these so
    /// future runs skip them without recomputing company state.
    pub company_tag_backs: Vec<ContactRecord>,
    /// Everything excluded, with the reason. Feeds the report.
    pub excluded: Vec<(IdentityKey, ExclusionReason)>,
}

/// Selects the send audience from the full store.
///
/// Records already contacted per the ledger, records in excluded
/// verticals and colleagues of anyone who replied are dropped. The
/// survivors are ordered with priority positions first, preserving
/// store order within each group.
pub fn select_audience(
    records: &[ContactRecord],
    ledger: &LedgerView,
    config: &FilterConfig,
) -> AudienceSelection {
    let mut selection = AudienceSelection::default();
    let mut priority = Vec::new();
    let mut rest = Vec::new();

    for record in records {
        if !record.has_identity() {
            selection
                .excluded
                .push((record.identity_key(), ExclusionReason::MissingIdentity));
            continue;
        }
        let key = record.identity_key();
        if record.user_id.trim().is_empty() {
            selection.excluded.push((key, ExclusionReason::MissingUserId));
            continue;
        }
        let status = ledger.latest_status(&key);
        if status.is_some_and(SendStatus::is_terminal) {
            selection.excluded.push((key, ExclusionReason::AlreadyContacted));
            continue;
        }
        if vertical_excluded(&record.gaming_vertical, config) {
            selection.excluded.push((key, ExclusionReason::VerticalExcluded));
            continue;
        }
        let company = normalize_identity_part(&record.company_name);
        if ledger.company(&company).is_some_and(|c| c.has_reply) {
            selection
                .excluded
                .push((key, ExclusionReason::CompanyHasReply));
            selection.company_tag_backs.push(record.clone());
            continue;
        }
        if position_is_priority(&record.position, config) {
            priority.push(record.clone());
        } else {
            rest.push(record.clone());
        }
    }

    selection.eligible = priority;
    selection.eligible.append(&mut rest);
    selection
}

/// True for records the campaign should treat as in-target vertical.
/// Only used for reporting; selection is driven by the exclusion list.
pub fn vertical_in_target(vertical: &str, config: &FilterConfig) -> bool {
    let vertical = vertical.to_lowercase();
    vertical.trim().is_empty()
        || config
            .include_verticals
            .iter()
            .any(|word| vertical.contains(word.to_lowercase().as_str()))
}

fn vertical_excluded(vertical: &str, config: &FilterConfig) -> bool {
    let vertical = vertical.to_lowercase();
    if vertical.trim().is_empty() {
        return false;
    }
    config
        .exclude_verticals
        .iter()
        .any(|word| vertical.contains(word.to_lowercase().as_str()))
}

fn position_is_priority(position: &str, config: &FilterConfig) -> bool {
    let position = position.to_lowercase();
    config
        .priority_positions
        .iter()
        .any(|word| position.contains(word.to_lowercase().as_str()))
}

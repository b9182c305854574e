use std::collections::BTreeMap;
use std::fmt;

use outreach_core::{select_audience, vertical_in_target, FilterConfig, SendStatus};

use crate::ledger::CampaignLedger;
use crate::store::ContactStore;

/// Point-in-time summary of the store and ledger, for operators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationalReport {
    pub contacts_total: usize,
    pub contacts_in_target: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_account: BTreeMap<String, usize>,
    pub companies_with_reply: usize,
    pub companies_contacted: usize,
    pub eligible_next_run: usize,
}

/// Builds the report by replaying the ledger and re-running audience
/// selection against the current store.
pub fn build_report(
    store: &ContactStore,
    ledger: &CampaignLedger,
    filter: &FilterConfig,
) -> OperationalReport {
    let view = ledger.view();
    let mut report = OperationalReport {
        contacts_total: store.len(),
        ..OperationalReport::default()
    };

    for record in store.records() {
        if vertical_in_target(&record.gaming_vertical, filter) {
            report.contacts_in_target += 1;
        }
    }

    for (_, status) in view.identities() {
        *report
            .by_status
            .entry(status.as_str().to_string())
            .or_insert(0) += 1;
    }
    for entry in ledger.entries() {
        if entry.status == SendStatus::Sent {
            *report
                .by_account
                .entry(entry.account.clone())
                .or_insert(0) += 1;
        }
    }
    for (_, company) in view.companies() {
        if company.has_reply {
            report.companies_with_reply += 1;
        }
        if company.has_contact {
            report.companies_contacted += 1;
        }
    }

    report.eligible_next_run = select_audience(store.records(), &view, filter)
        .eligible
        .len();
    report
}

impl fmt::Display for OperationalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "contacts stored:       {}", self.contacts_total)?;
        writeln!(f, "contacts in target:    {}", self.contacts_in_target)?;
        writeln!(f, "eligible next run:     {}", self.eligible_next_run)?;
        writeln!(f, "companies contacted:   {}", self.companies_contacted)?;
        writeln!(f, "companies with reply:  {}", self.companies_with_reply)?;
        writeln!(f, "by status:")?;
        for (status, count) in &self.by_status {
            writeln!(f, "  {status}: {count}")?;
        }
        writeln!(f, "sent by account:")?;
        for (account, count) in &self.by_account {
            writeln!(f, "  {account}: {count}")?;
        }
        Ok(())
    }
}

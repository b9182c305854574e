use std::future::Future;

use outreach_core::{
    distribute_contacts, select_audience, FilterConfig, LedgerEntry, SendStatus, ShareSpec,
};
use outreach_logging::{outreach_error, outreach_info};

use crate::clock::Scheduler;
use crate::dispatch::{DispatchSettings, DispatchSummary, MessageDispatcher, Messenger};
use crate::ledger::{format_timestamp, CampaignLedger};
use crate::store::ContactStore;
use crate::template::TemplateSet;
use crate::types::{AuthError, CampaignError, CancelFlag, StopReason};

#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub shares: Vec<ShareSpec>,
    pub filter: FilterConfig,
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignOutcome {
    /// Size of the selected audience before distribution.
    pub eligible: usize,
    /// Company-exclusion tag-backs written to the ledger.
    pub tag_backs: usize,
    /// Identities whose login failed; their share was not sent.
    pub auth_failures: Vec<String>,
    pub dispatches: Vec<DispatchSummary>,
}

/// Runs one campaign pass: select the audience, record company
/// tag-backs, split the list across identities and dispatch each
/// share in turn.
///
/// `connect` authenticates one identity by name and returns its
/// messenger. A failed login skips that identity's share rather than
/// aborting the whole campaign.
pub async fn run_campaign<M, F, Fut>(
    store: &ContactStore,
    ledger: &mut CampaignLedger,
    templates: &TemplateSet,
    settings: &CampaignSettings,
    connect: F,
    scheduler: &dyn Scheduler,
    cancel: &CancelFlag,
) -> Result<CampaignOutcome, CampaignError>
where
    M: Messenger,
    F: Fn(&str) -> Fut,
    Fut: Future<Output = Result<M, AuthError>>,
{
    let view = ledger.view();
    let selection = select_audience(store.records(), &view, &settings.filter);
    outreach_info!(
        "audience selected: {} eligible, {} excluded, {} company tag-backs",
        selection.eligible.len(),
        selection.excluded.len(),
        selection.company_tag_backs.len()
    );

    for record in &selection.company_tag_backs {
        ledger.append(LedgerEntry {
            timestamp: format_timestamp(scheduler.now()),
            identity_key: record.identity_key().as_str().to_string(),
            user_id: record.user_id.clone(),
            full_name: record.full_name.clone(),
            company_name: record.company_name.clone(),
            account: "system".to_string(),
            status: SendStatus::ContactedWithOtherWorker,
            template_id: None,
            detail: Some("company already has a reply".to_string()),
        })?;
    }

    let partitions = distribute_contacts(selection.eligible.clone(), &settings.shares)?;

    let mut outcome = CampaignOutcome {
        eligible: selection.eligible.len(),
        tag_backs: selection.company_tag_backs.len(),
        auth_failures: Vec::new(),
        dispatches: Vec::new(),
    };

    for partition in partitions {
        if cancel.is_cancelled() {
            break;
        }
        if partition.contacts.is_empty() {
            continue;
        }
        let messenger = match connect(&partition.identity).await {
            Ok(messenger) => messenger,
            Err(err) => {
                outreach_error!("login failed for {}: {err}", partition.identity);
                outcome.auth_failures.push(partition.identity.clone());
                continue;
            }
        };

        let mut dispatcher = MessageDispatcher::new(
            partition.identity.clone(),
            messenger,
            templates.clone(),
            settings.dispatch.clone(),
        );
        let summary = dispatcher
            .run(&partition.contacts, ledger, scheduler, cancel)
            .await?;
        let cancelled = summary.stop == StopReason::Cancelled;
        outcome.dispatches.push(summary);
        if cancelled {
            break;
        }
    }

    Ok(outcome)
}

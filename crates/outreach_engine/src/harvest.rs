use std::collections::HashSet;
use std::time::Duration;

use outreach_core::MergeOutcome;
use outreach_logging::{outreach_debug, outreach_info, outreach_warn};

use crate::clock::Scheduler;
use crate::extract::extract_record;
use crate::source::PaginatedSource;
use crate::store::ContactStore;
use crate::types::{CancelFlag, HarvestError, SourceError, StoreError};

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Consecutive rounds without new records before the list is
    /// considered finished.
    pub no_growth_limit: u32,
    /// Hard cap on advance rounds, guarding against a listing that
    /// re-serves items forever.
    pub max_rounds: u32,
    /// Pause between advance rounds.
    pub round_delay: Duration,
    /// How long to wait for a round's items to finish loading.
    pub load_timeout: Duration,
    /// Poll interval while waiting for loading to settle.
    pub load_poll: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            no_growth_limit: 3,
            max_rounds: 500,
            round_delay: Duration::from_secs(2),
            load_timeout: Duration::from_secs(30),
            load_poll: Duration::from_millis(250),
        }
    }
}

/// How a harvest run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStop {
    /// No growth for the configured number of rounds.
    EndOfList,
    /// The round cap fired before the list ended.
    RoundCapReached,
    /// Cooperative cancellation.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub stop: HarvestStop,
    pub rounds: u32,
    pub inserted: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub extraction_failures: usize,
}

/// Drives a [`PaginatedSource`] to exhaustion, merging every extracted
/// record into the store.
///
/// A run is idempotent: re-running against an unchanged listing only
/// produces duplicate merge outcomes. One session renewal is attempted
/// when the platform invalidates the session mid-run; a second
/// invalidation aborts.
pub struct ListHarvester<S: PaginatedSource> {
    source: S,
    settings: HarvestSettings,
}

impl<S: PaginatedSource> ListHarvester<S> {
    pub fn new(source: S, settings: HarvestSettings) -> Self {
        Self { source, settings }
    }

    pub async fn run(
        &mut self,
        store: &mut ContactStore,
        scheduler: &dyn Scheduler,
        cancel: &CancelFlag,
    ) -> Result<HarvestSummary, HarvestError> {
        let preloaded = store.known_identities().len();
        outreach_info!("harvest starting with {preloaded} known contacts");

        let mut summary = HarvestSummary {
            stop: HarvestStop::EndOfList,
            rounds: 0,
            inserted: 0,
            updated: 0,
            duplicates: 0,
            extraction_failures: 0,
        };
        // Raw items already processed this run; the listing may
        // re-serve earlier entries when it re-renders.
        let mut session_seen: HashSet<String> = HashSet::new();
        let mut no_growth = 0u32;
        let mut renewal_used = false;

        loop {
            if cancel.is_cancelled() {
                summary.stop = HarvestStop::Cancelled;
                break;
            }
            if summary.rounds >= self.settings.max_rounds {
                outreach_warn!("round cap {} reached", self.settings.max_rounds);
                summary.stop = HarvestStop::RoundCapReached;
                break;
            }
            summary.rounds += 1;

            let mut timed_out = false;
            match self.source.advance().await {
                Ok(()) => {}
                Err(SourceError::Timeout) => {
                    outreach_warn!("round {} timed out", summary.rounds);
                    timed_out = true;
                }
                Err(SourceError::SessionInvalidated) if !renewal_used => {
                    renewal_used = true;
                    self.source.renew_session().await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            if !timed_out {
                timed_out = self.settle(scheduler).await;
            }

            let session_new = self.absorb_items(store, &mut session_seen, &mut summary)?;

            if timed_out || session_new == 0 {
                no_growth += 1;
                outreach_debug!(
                    "no growth in round {} ({}/{})",
                    summary.rounds,
                    no_growth,
                    self.settings.no_growth_limit
                );
                if no_growth >= self.settings.no_growth_limit {
                    summary.stop = HarvestStop::EndOfList;
                    break;
                }
            } else {
                no_growth = 0;
            }

            scheduler.wait(self.settings.round_delay).await;
        }

        outreach_info!(
            "harvest finished after {} rounds: {} inserted, {} updated, {} duplicates, {} unextractable",
            summary.rounds,
            summary.inserted,
            summary.updated,
            summary.duplicates,
            summary.extraction_failures
        );
        Ok(summary)
    }

    /// Waits until the source stops loading. Returns true on timeout,
    /// which the caller counts as a no-growth round.
    async fn settle(&self, scheduler: &dyn Scheduler) -> bool {
        let mut waited = Duration::ZERO;
        while self.source.is_loading() {
            if waited >= self.settings.load_timeout {
                return true;
            }
            scheduler.wait(self.settings.load_poll).await;
            waited += self.settings.load_poll;
        }
        false
    }

    /// Extracts and merges every not-yet-seen item. Returns how many
    /// items were new to this session; already-stored contacts still
    /// count, growth measures the listing, not the store.
    fn absorb_items(
        &mut self,
        store: &mut ContactStore,
        session_seen: &mut HashSet<String>,
        summary: &mut HarvestSummary,
    ) -> Result<usize, StoreError> {
        let mut session_new = 0usize;
        let items: Vec<_> = self.source.current_items().to_vec();
        for raw in items {
            let seen_key = if raw.user_id.is_empty() {
                format!("{}|{}|{}", raw.first_name, raw.last_name, raw.company_name)
            } else {
                raw.user_id.clone()
            };
            if !session_seen.insert(seen_key) {
                continue;
            }
            session_new += 1;
            let record = match extract_record(&raw) {
                Ok(record) => record,
                Err(err) => {
                    outreach_debug!("dropping listing entry: {err}");
                    summary.extraction_failures += 1;
                    continue;
                }
            };
            match store.merge(record)? {
                MergeOutcome::Inserted => summary.inserted += 1,
                MergeOutcome::Updated => summary.updated += 1,
                MergeOutcome::Duplicate => summary.duplicates += 1,
            }
        }
        Ok(session_new)
    }
}

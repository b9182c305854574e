use std::collections::HashSet;
use std::time::Duration;

use chrono::{Datelike, Timelike};
use outreach_core::{
    ContactRecord, DailyQuota, LedgerEntry, RetryPolicy, SendStatus, WorkingWindow,
};
use outreach_logging::{outreach_debug, outreach_info, outreach_warn};
use rand::Rng;
use serde::Deserialize;

use crate::auth::Session;
use crate::clock::Scheduler;
use crate::ledger::{format_timestamp, CampaignLedger};
use crate::template::{render_message, TemplateSet};
use crate::types::{CancelFlag, LedgerError, SendError, StopReason};

/// What a delivered-or-skipped send call reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message went out.
    Delivered,
    /// The chat already had our message or a reply; nothing was sent.
    AlreadyContacted,
}

/// Delivery seam. The production implementation talks to the platform
/// chat API; tests substitute a scripted fake.
#[async_trait::async_trait]
pub trait Messenger: Send {
    async fn send(&mut self, user_id: &str, message: &str) -> Result<SendOutcome, SendError>;
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Max messages this identity sends per run; 0 means unlimited.
    pub daily_limit: u32,
    /// Uniform random pause between consecutive sends, in seconds.
    pub send_delay_secs: (u64, u64),
    pub window: WorkingWindow,
    pub retry: RetryPolicy,
    /// Consecutive rate-limited sends before the identity is treated
    /// as blocked and the run stops.
    pub rate_limit_stop_after: u32,
    /// Cap on contacts processed, for dry-run style smoke tests.
    pub test_contact_limit: Option<usize>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            daily_limit: 0,
            send_delay_secs: (3, 7),
            window: WorkingWindow::always_open(),
            retry: RetryPolicy::default(),
            rate_limit_stop_after: 3,
            test_contact_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub account: String,
    pub stop: StopReason,
    pub sent: usize,
    pub already_contacted: usize,
    pub failed: usize,
    /// Contacts not reached before the run stopped; they stay eligible.
    pub deferred: usize,
}

/// Sends one identity's share of the campaign, one contact at a time.
///
/// The ledger is consulted before and written after every contact, so
/// an interrupted run resumes exactly where it stopped. One entry is
/// appended per contact outcome; in-contact retries only show up in
/// the entry's detail text.
pub struct MessageDispatcher<M: Messenger> {
    account: String,
    messenger: M,
    templates: TemplateSet,
    settings: DispatchSettings,
}

impl<M: Messenger> MessageDispatcher<M> {
    pub fn new(
        account: impl Into<String>,
        messenger: M,
        templates: TemplateSet,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            account: account.into(),
            messenger,
            templates,
            settings,
        }
    }

    pub async fn run(
        &mut self,
        contacts: &[ContactRecord],
        ledger: &mut CampaignLedger,
        scheduler: &dyn Scheduler,
        cancel: &CancelFlag,
    ) -> Result<DispatchSummary, LedgerError> {
        let mut summary = DispatchSummary {
            account: self.account.clone(),
            stop: StopReason::AudienceExhausted,
            sent: 0,
            already_contacted: 0,
            failed: 0,
            deferred: 0,
        };
        let mut quota = DailyQuota::new(self.settings.daily_limit);
        let mut rate_limit_streak = 0u32;
        // Identities this run already settled, terminal ledger states
        // included, so restarted runs skip straight to new contacts.
        let mut settled: HashSet<String> = HashSet::new();
        {
            let view = ledger.view();
            for (key, status) in view.identities() {
                if status.is_terminal() {
                    settled.insert(key.to_string());
                }
            }
        }

        let limit = self
            .settings
            .test_contact_limit
            .unwrap_or(contacts.len())
            .min(contacts.len());
        outreach_info!(
            "dispatch for {} starting: {} contacts assigned, {} to process",
            self.account,
            contacts.len(),
            limit
        );

        for (index, contact) in contacts.iter().take(limit).enumerate() {
            if cancel.is_cancelled() {
                summary.stop = StopReason::Cancelled;
                summary.deferred = limit - index;
                break;
            }
            if quota.is_exhausted() {
                outreach_info!("daily limit reached for {}", self.account);
                summary.stop = StopReason::DailyLimitReached;
                summary.deferred = limit - index;
                break;
            }
            if !self.settings.window.ever_opens() {
                summary.stop = StopReason::WorkingWindowClosed;
                summary.deferred = limit - index;
                break;
            }
            let key = contact.identity_key();
            if settled.contains(key.as_str()) {
                outreach_debug!("skipping {key}, already settled");
                continue;
            }

            if self.wait_for_window(scheduler, cancel).await {
                summary.stop = StopReason::Cancelled;
                summary.deferred = limit - index;
                break;
            }

            let template_id;
            let message;
            {
                let mut rng = rand::thread_rng();
                let template = self.templates.choose(&mut rng);
                template_id = template.id.clone();
                message = render_message(template, contact);
            }

            match self
                .send_with_retries(contact, &message, scheduler, &mut rate_limit_streak)
                .await
            {
                Attempted::Delivered { attempts } => {
                    quota.record_send();
                    summary.sent += 1;
                    self.record(
                        ledger,
                        scheduler,
                        contact,
                        SendStatus::Sent,
                        Some(template_id),
                        retry_detail(attempts),
                    )?;
                    settled.insert(key.as_str().to_string());
                }
                Attempted::AlreadyContacted => {
                    summary.already_contacted += 1;
                    self.record(
                        ledger,
                        scheduler,
                        contact,
                        SendStatus::Sent,
                        None,
                        Some("already contacted on the platform".to_string()),
                    )?;
                    settled.insert(key.as_str().to_string());
                }
                Attempted::Failed { attempts, reason } => {
                    summary.failed += 1;
                    self.record(
                        ledger,
                        scheduler,
                        contact,
                        SendStatus::Failed,
                        Some(template_id),
                        Some(format!("{reason} after {attempts} attempts")),
                    )?;
                }
                Attempted::RateLimitStop => {
                    summary.failed += 1;
                    self.record(
                        ledger,
                        scheduler,
                        contact,
                        SendStatus::Failed,
                        Some(template_id),
                        Some("rate limited repeatedly".to_string()),
                    )?;
                    outreach_warn!(
                        "{} hit {} consecutive rate limits, stopping",
                        self.account,
                        self.settings.rate_limit_stop_after
                    );
                    summary.stop = StopReason::IdentityBlocked;
                    summary.deferred = limit - index - 1;
                    break;
                }
            }

            if index + 1 < limit {
                let pause = self.send_pause();
                scheduler.wait(pause).await;
            }
        }

        outreach_info!(
            "dispatch for {} done: {} sent, {} already contacted, {} failed, {} deferred",
            self.account,
            summary.sent,
            summary.already_contacted,
            summary.failed,
            summary.deferred
        );
        Ok(summary)
    }

    /// Blocks until the working window is open. Returns true when the
    /// wait was cancelled.
    async fn wait_for_window(&self, scheduler: &dyn Scheduler, cancel: &CancelFlag) -> bool {
        loop {
            let now = scheduler.now();
            let weekday = now.weekday().num_days_from_monday() as usize;
            let minute = (now.hour() * 60 + now.minute()) as u16;
            match self.settings.window.minutes_until_open(weekday, minute) {
                Some(0) | None => return false,
                Some(minutes) => {
                    outreach_info!(
                        "outside working window, waiting {minutes} minutes before sending"
                    );
                    // Re-check once a minute so cancellation stays responsive.
                    scheduler.wait(Duration::from_secs(60)).await;
                    if cancel.is_cancelled() {
                        return true;
                    }
                }
            }
        }
    }

    async fn send_with_retries(
        &mut self,
        contact: &ContactRecord,
        message: &str,
        scheduler: &dyn Scheduler,
        rate_limit_streak: &mut u32,
    ) -> Attempted {
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.messenger.send(&contact.user_id, message).await {
                Ok(SendOutcome::Delivered) => {
                    *rate_limit_streak = 0;
                    return Attempted::Delivered { attempts: attempt };
                }
                Ok(SendOutcome::AlreadyContacted) => {
                    *rate_limit_streak = 0;
                    return Attempted::AlreadyContacted;
                }
                Err(SendError::RateLimited) => {
                    *rate_limit_streak += 1;
                    if *rate_limit_streak >= self.settings.rate_limit_stop_after {
                        return Attempted::RateLimitStop;
                    }
                    if attempt >= max_attempts {
                        return Attempted::Failed {
                            attempts: attempt,
                            reason: "rate limited".to_string(),
                        };
                    }
                    let backoff = self.settings.retry.rate_limit_backoff(attempt);
                    outreach_warn!(
                        "rate limited sending to {}, backing off {:?}",
                        contact.full_name,
                        backoff
                    );
                    scheduler.wait(backoff).await;
                }
                Err(SendError::Transient(reason)) => {
                    if attempt >= max_attempts {
                        return Attempted::Failed {
                            attempts: attempt,
                            reason,
                        };
                    }
                    let backoff = self.settings.retry.backoff(attempt);
                    outreach_debug!(
                        "transient failure for {} ({reason}), retrying in {:?}",
                        contact.full_name,
                        backoff
                    );
                    scheduler.wait(backoff).await;
                }
                Err(SendError::Fatal(reason)) => {
                    return Attempted::Failed {
                        attempts: attempt,
                        reason,
                    };
                }
            }
        }
    }

    fn record(
        &self,
        ledger: &mut CampaignLedger,
        scheduler: &dyn Scheduler,
        contact: &ContactRecord,
        status: SendStatus,
        template_id: Option<String>,
        detail: Option<String>,
    ) -> Result<(), LedgerError> {
        ledger.append(LedgerEntry {
            timestamp: format_timestamp(scheduler.now()),
            identity_key: contact.identity_key().as_str().to_string(),
            user_id: contact.user_id.clone(),
            full_name: contact.full_name.clone(),
            company_name: contact.company_name.clone(),
            account: self.account.clone(),
            status,
            template_id,
            detail,
        })
    }

    fn send_pause(&self) -> Duration {
        let (low, high) = self.settings.send_delay_secs;
        let (low, high) = (low.min(high), low.max(high));
        let secs = rand::thread_rng().gen_range(low..=high);
        Duration::from_secs(secs)
    }
}

enum Attempted {
    Delivered { attempts: u32 },
    AlreadyContacted,
    Failed { attempts: u32, reason: String },
    RateLimitStop,
}

fn retry_detail(attempts: u32) -> Option<String> {
    (attempts > 1).then(|| format!("delivered after {attempts} attempts"))
}

/// Chat API client: finds or creates the direct chat with a user,
/// checks it for prior traffic from us or a reply, then posts the
/// message.
pub struct HttpMessenger {
    session: Session,
    chat_base_url: String,
    own_user_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireChat {
    id: String,
    messages: Vec<WireChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireChatMessage {
    sender_id: String,
}

impl HttpMessenger {
    pub fn new(session: Session, chat_base_url: impl Into<String>, own_user_id: impl Into<String>) -> Self {
        Self {
            session,
            chat_base_url: chat_base_url.into(),
            own_user_id: own_user_id.into(),
        }
    }

    async fn find_chat(&self, user_id: &str) -> Result<Option<WireChat>, SendError> {
        let url = format!("{}/with-user/{}", self.chat_base_url, user_id);
        let response = self
            .session
            .client()
            .get(&url)
            .send()
            .await
            .map_err(map_send_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response)?;
        let chat: WireChat = response
            .json()
            .await
            .map_err(|err| SendError::Transient(err.to_string()))?;
        Ok(Some(chat))
    }

    async fn create_chat(&self, user_id: &str) -> Result<WireChat, SendError> {
        let url = format!("{}/create", self.chat_base_url);
        let response = self
            .session
            .client()
            .post(&url)
            .json(&serde_json::json!({ "participantId": user_id }))
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response)?;
        response
            .json()
            .await
            .map_err(|err| SendError::Transient(err.to_string()))
    }
}

#[async_trait::async_trait]
impl Messenger for HttpMessenger {
    async fn send(&mut self, user_id: &str, message: &str) -> Result<SendOutcome, SendError> {
        let chat = match self.find_chat(user_id).await? {
            Some(chat) => {
                // Any prior traffic in the chat, ours or theirs, means
                // this contact was already reached.
                let has_traffic = chat
                    .messages
                    .iter()
                    .any(|m| m.sender_id == self.own_user_id || m.sender_id == user_id);
                if has_traffic {
                    return Ok(SendOutcome::AlreadyContacted);
                }
                chat
            }
            None => self.create_chat(user_id).await?,
        };

        let url = format!("{}/{}/messages", self.chat_base_url, chat.id);
        let response = self
            .session
            .client()
            .post(&url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response)?;
        Ok(SendOutcome::Delivered)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SendError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SendError::RateLimited);
    }
    if status.is_server_error() {
        return Err(SendError::Transient(status.to_string()));
    }
    if !status.is_success() {
        return Err(SendError::Fatal(status.to_string()));
    }
    Ok(response)
}

fn map_send_error(err: reqwest::Error) -> SendError {
    if err.is_timeout() {
        return SendError::Transient("request timed out".to_string());
    }
    SendError::Transient(err.to_string())
}

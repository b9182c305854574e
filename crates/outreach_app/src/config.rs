//! RON configuration for the outreach binary.
//!
//! One immutable value is loaded at startup, validated, and converted
//! into the settings structs the engine consumes. Credentials live in
//! the config file next to the account they belong to.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use outreach_core::{FilterConfig, RetryPolicy, ShareSpec, WorkingWindow};
use outreach_engine::{
    AuthSettings, CampaignSettings, Credentials, DispatchSettings, HarvestSettings, Identity,
    MessageTemplate, SearchFilter, SourceSettings, TemplateError, TemplateSet,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("no accounts configured")]
    NoAccounts,
    #[error("account shares sum to {total}, expected 100")]
    SharesDoNotSum { total: u32 },
    #[error("harvest account {0:?} is not in the accounts list")]
    UnknownHarvestAccount(String),
    #[error("working hours start {start} is not before end {end}")]
    WindowInverted { start: u16, end: u16 },
    #[error("working hours end {0} exceeds 1440 minutes")]
    WindowOutOfRange(u16),
    #[error("working day {0} is out of range (0 = Monday .. 6 = Sunday)")]
    BadWorkingDay(u8),
    #[error("send delay range ({min}, {max}) is inverted")]
    DelayInverted { min: u64, max: u64 },
    #[error(transparent)]
    Templates(#[from] TemplateError),
}

/// One platform account: sending identity plus its audience share.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub username: String,
    pub password: String,
    /// The account's own platform user id. Needed to tell our side of
    /// a chat from the contact's.
    pub user_id: String,
    pub share: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Account used for listing requests.
    pub account: String,
    pub no_growth_limit: u32,
    pub max_rounds: u32,
    pub round_delay_secs: u64,
    pub load_timeout_secs: u64,
    pub page_size: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let defaults = HarvestSettings::default();
        Self {
            account: String::new(),
            no_growth_limit: defaults.no_growth_limit,
            max_rounds: defaults.max_rounds,
            round_delay_secs: defaults.round_delay.as_secs(),
            load_timeout_secs: defaults.load_timeout.as_secs(),
            page_size: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Max messages per identity per run; 0 means unlimited.
    pub daily_limit: u32,
    pub send_delay_secs: (u64, u64),
    /// Open window as minutes of day; absent means always open.
    pub working_hours: Option<(u16, u16)>,
    /// Open days, 0 = Monday .. 6 = Sunday; absent means every day.
    pub working_days: Option<Vec<u8>>,
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub rate_limit_multiplier: u32,
    pub rate_limit_stop_after: u32,
    pub test_contact_limit: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let defaults = DispatchSettings::default();
        Self {
            daily_limit: defaults.daily_limit,
            send_delay_secs: defaults.send_delay_secs,
            working_hours: None,
            working_days: None,
            max_attempts: defaults.retry.max_attempts,
            base_backoff_secs: defaults.retry.base_backoff.as_secs(),
            rate_limit_multiplier: defaults.retry.rate_limit_multiplier,
            rate_limit_stop_after: defaults.rate_limit_stop_after,
            test_contact_limit: None,
        }
    }
}

/// Keyword overrides for audience selection. An absent list keeps the
/// built-in keywords.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub include_verticals: Option<Vec<String>>,
    pub exclude_verticals: Option<Vec<String>>,
    pub priority_positions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchFilterConfig {
    pub gaming_verticals: Vec<String>,
    pub organization_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    pub id: String,
    pub weight: u8,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub login_url: String,
    pub search_url: String,
    pub chat_url: String,
    pub store_path: PathBuf,
    pub ledger_path: PathBuf,
    pub results_path: PathBuf,
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub filter: KeywordConfig,
    #[serde(default)]
    pub search_filter: SearchFilterConfig,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // Operators write `working_hours: (540, 1080)`, not
        // `Some((540, 1080))`; optional fields accept the bare value.
        let options = ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME);
        let config: AppConfig =
            options
                .from_str(&content)
                .map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        let total: u32 = self.accounts.iter().map(|a| u32::from(a.share)).sum();
        if total != 100 {
            return Err(ConfigError::SharesDoNotSum { total });
        }
        if !self.harvest.account.is_empty() && self.identity(&self.harvest.account).is_none() {
            return Err(ConfigError::UnknownHarvestAccount(
                self.harvest.account.clone(),
            ));
        }
        if let Some((start, end)) = self.dispatch.working_hours {
            if start >= end {
                return Err(ConfigError::WindowInverted { start, end });
            }
            if end > 24 * 60 {
                return Err(ConfigError::WindowOutOfRange(end));
            }
        }
        if let Some(days) = &self.dispatch.working_days {
            if let Some(bad) = days.iter().find(|day| **day > 6) {
                return Err(ConfigError::BadWorkingDay(*bad));
            }
        }
        let (min, max) = self.dispatch.send_delay_secs;
        if min > max {
            return Err(ConfigError::DelayInverted { min, max });
        }
        if !self.templates.is_empty() {
            self.template_set()?;
        }
        Ok(())
    }

    /// The account used for harvesting; defaults to the first account.
    pub fn harvest_identity(&self) -> Identity {
        if self.harvest.account.is_empty() {
            identity_of(&self.accounts[0])
        } else {
            // validate() guarantees the lookup succeeds.
            self.identity(&self.harvest.account)
                .unwrap_or_else(|| identity_of(&self.accounts[0]))
        }
    }

    pub fn identity(&self, name: &str) -> Option<Identity> {
        self.accounts
            .iter()
            .find(|account| account.name == name)
            .map(identity_of)
    }

    pub fn share_specs(&self) -> Vec<ShareSpec> {
        self.accounts
            .iter()
            .map(|account| ShareSpec {
                identity: account.name.clone(),
                share: account.share,
            })
            .collect()
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings::new(&self.login_url)
    }

    pub fn source_settings(&self) -> SourceSettings {
        let mut settings = SourceSettings::new(&self.search_url);
        settings.page_size = self.harvest.page_size;
        settings.filter = SearchFilter {
            gaming_verticals: self.search_filter.gaming_verticals.clone(),
            organization_types: self.search_filter.organization_types.clone(),
        };
        settings
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            no_growth_limit: self.harvest.no_growth_limit,
            max_rounds: self.harvest.max_rounds,
            round_delay: Duration::from_secs(self.harvest.round_delay_secs),
            load_timeout: Duration::from_secs(self.harvest.load_timeout_secs),
            ..HarvestSettings::default()
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            daily_limit: self.dispatch.daily_limit,
            send_delay_secs: self.dispatch.send_delay_secs,
            window: self.working_window(),
            retry: RetryPolicy {
                max_attempts: self.dispatch.max_attempts,
                base_backoff: Duration::from_secs(self.dispatch.base_backoff_secs),
                rate_limit_multiplier: self.dispatch.rate_limit_multiplier,
            },
            rate_limit_stop_after: self.dispatch.rate_limit_stop_after,
            test_contact_limit: self.dispatch.test_contact_limit,
        }
    }

    pub fn filter_config(&self) -> FilterConfig {
        let mut filter = FilterConfig::default();
        if let Some(list) = &self.filter.include_verticals {
            filter.include_verticals = list.clone();
        }
        if let Some(list) = &self.filter.exclude_verticals {
            filter.exclude_verticals = list.clone();
        }
        if let Some(list) = &self.filter.priority_positions {
            filter.priority_positions = list.clone();
        }
        filter
    }

    pub fn campaign_settings(&self) -> CampaignSettings {
        CampaignSettings {
            shares: self.share_specs(),
            filter: self.filter_config(),
            dispatch: self.dispatch_settings(),
        }
    }

    pub fn template_set(&self) -> Result<TemplateSet, TemplateError> {
        TemplateSet::new(
            self.templates
                .iter()
                .map(|template| MessageTemplate {
                    id: template.id.clone(),
                    weight: template.weight,
                    text: template.text.clone(),
                })
                .collect(),
        )
    }

    fn working_window(&self) -> WorkingWindow {
        let mut window = WorkingWindow::always_open();
        if let Some((start, end)) = self.dispatch.working_hours {
            window.start_minute = start;
            window.end_minute = end;
        }
        if let Some(days) = &self.dispatch.working_days {
            window.days = [false; 7];
            for day in days {
                window.days[usize::from(*day)] = true;
            }
        }
        window
    }
}

fn identity_of(account: &AccountConfig) -> Identity {
    Identity {
        name: account.name.clone(),
        user_id: account.user_id.clone(),
        credentials: Credentials {
            username: account.username.clone(),
            password: account.password.clone(),
        },
    }
}

//! Outreach engine: IO layer for harvesting and dispatch.
mod auth;
mod campaign;
mod clock;
mod csv;
mod dispatch;
mod extract;
mod harvest;
mod ledger;
mod persist;
mod report;
mod source;
mod store;
mod template;
mod types;

pub use auth::{AuthSettings, Authenticator, Credentials, HttpAuthenticator, Identity, Session};
pub use campaign::{run_campaign, CampaignOutcome, CampaignSettings};
pub use clock::{Scheduler, TokioScheduler};
pub use dispatch::{
    DispatchSettings, DispatchSummary, HttpMessenger, MessageDispatcher, Messenger, SendOutcome,
};
pub use extract::{extract_record, ExtractionError};
pub use harvest::{HarvestSettings, HarvestStop, HarvestSummary, ListHarvester};
pub use ledger::{format_timestamp, CampaignLedger};
pub use persist::{ensure_parent_dir, write_atomic, PersistError};
pub use report::{build_report, OperationalReport};
pub use source::{
    HttpPagedSource, PaginatedSource, RawProfile, SearchFilter, SourceSettings,
};
pub use store::ContactStore;
pub use template::{render_message, MessageTemplate, TemplateError, TemplateSet};
pub use types::{
    AuthError, CampaignError, CancelFlag, HarvestError, LedgerError, SendError, SourceError,
    StopReason, StoreError,
};

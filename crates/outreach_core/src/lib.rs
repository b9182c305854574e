//! Outreach core: pure contact-record, filtering and policy logic.
//!
//! Everything in this crate is synchronous and side-effect free. The
//! engine crate owns I/O (HTTP, files, clocks) and feeds plain data in.
mod audience;
mod contact_info;
mod distribute;
mod ledger;
mod policy;
mod record;

pub use audience::{
    select_audience, vertical_in_target, AudienceSelection, ExclusionReason, FilterConfig,
};
pub use contact_info::{extract_contact_info, ContactInfo};
pub use distribute::{distribute_contacts, DistributeError, Partition, ShareSpec};
pub use ledger::{CompanyState, LedgerEntry, LedgerView, SendStatus};
pub use policy::{DailyQuota, RetryPolicy, WorkingWindow};
pub use record::{clean_text, normalize_identity_part, ContactRecord, IdentityKey, MergeOutcome};

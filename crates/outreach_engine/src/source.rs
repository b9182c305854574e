use outreach_logging::{outreach_debug, outreach_warn};
use serde::{Deserialize, Serialize};

use crate::auth::{Authenticator, Identity, Session};
use crate::types::{AuthError, SourceError};

/// One listing entry as the platform serves it, before extraction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawProfile {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub job_title: String,
    pub country: String,
    pub responsibility: String,
    pub gaming_vertical: String,
    pub organization_type: String,
    pub introduction: String,
    pub linkedin_url: String,
    pub facebook_url: String,
    pub twitter_url: String,
    pub profile_url: String,
    pub photo_url: String,
}

/// A scrollable/pageable listing. `advance` requests the next batch;
/// the accumulated items are visible through `current_items`, which
/// only ever grows within a session. Callers detect the end of the
/// list by watching for the item count to stop growing.
#[async_trait::async_trait]
pub trait PaginatedSource: Send {
    async fn advance(&mut self) -> Result<(), SourceError>;
    fn current_items(&self) -> &[RawProfile];
    /// True while a batch is still being rendered/loaded. HTTP-backed
    /// sources settle within `advance`; browser-backed ones may not.
    fn is_loading(&self) -> bool;
    /// Re-establishes the session after [`SourceError::SessionInvalidated`].
    async fn renew_session(&mut self) -> Result<(), AuthError>;
}

/// Search filter sent with every page request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchFilter {
    #[serde(rename = "gamingVerticals")]
    pub gaming_verticals: Vec<String>,
    #[serde(rename = "organizationTypes")]
    pub organization_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub search_url: String,
    pub page_size: usize,
    pub filter: SearchFilter,
}

impl SourceSettings {
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            page_size: 2000,
            filter: SearchFilter::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireProfile {
    #[serde(alias = "id")]
    user_id: String,
    first_name: String,
    last_name: String,
    company_name: String,
    job_title: String,
    country: String,
    responsibility: String,
    gaming_vertical: String,
    organization_type: String,
    introduction: String,
    linkedin_url: String,
    facebook_url: String,
    twitter_url: String,
    profile_url: String,
    photo_url: String,
}

impl From<WireProfile> for RawProfile {
    fn from(wire: WireProfile) -> Self {
        RawProfile {
            user_id: wire.user_id,
            first_name: wire.first_name,
            last_name: wire.last_name,
            company_name: wire.company_name,
            job_title: wire.job_title,
            country: wire.country,
            responsibility: wire.responsibility,
            gaming_vertical: wire.gaming_vertical,
            organization_type: wire.organization_type,
            introduction: wire.introduction,
            linkedin_url: wire.linkedin_url,
            facebook_url: wire.facebook_url,
            twitter_url: wire.twitter_url,
            profile_url: wire.profile_url,
            photo_url: wire.photo_url,
        }
    }
}

/// Paged JSON search endpoint: `POST {search_url}?from={offset}&size={n}`
/// with the filter as the body, returning an array of profiles. A batch
/// shorter than the page size marks the listing as exhausted.
pub struct HttpPagedSource<A: Authenticator> {
    settings: SourceSettings,
    authenticator: A,
    identity: Identity,
    session: Session,
    items: Vec<RawProfile>,
    offset: usize,
    exhausted: bool,
}

impl<A: Authenticator> HttpPagedSource<A> {
    pub fn new(settings: SourceSettings, authenticator: A, identity: Identity, session: Session) -> Self {
        Self {
            settings,
            authenticator,
            identity,
            session,
            items: Vec::new(),
            offset: 0,
            exhausted: false,
        }
    }
}

#[async_trait::async_trait]
impl<A: Authenticator> PaginatedSource for HttpPagedSource<A> {
    async fn advance(&mut self) -> Result<(), SourceError> {
        if self.exhausted {
            return Ok(());
        }

        let url = format!(
            "{}?from={}&size={}",
            self.settings.search_url, self.offset, self.settings.page_size
        );
        let response = self
            .session
            .client()
            .post(&url)
            .json(&self.settings.filter)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SourceError::SessionInvalidated);
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedPayload(status.to_string()));
        }

        let batch: Vec<WireProfile> = response
            .json()
            .await
            .map_err(|err| SourceError::UnexpectedPayload(err.to_string()))?;

        let received = batch.len();
        outreach_debug!(
            "search page from={} returned {} profiles",
            self.offset,
            received
        );
        self.offset += received;
        if received < self.settings.page_size {
            self.exhausted = true;
        }
        self.items.extend(batch.into_iter().map(RawProfile::from));
        Ok(())
    }

    fn current_items(&self) -> &[RawProfile] {
        &self.items
    }

    fn is_loading(&self) -> bool {
        false
    }

    async fn renew_session(&mut self) -> Result<(), AuthError> {
        outreach_warn!("session for {} invalidated, logging in again", self.identity.name);
        self.session = self.authenticator.authenticate(&self.identity).await?;
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        return SourceError::Timeout;
    }
    SourceError::Network(err.to_string())
}

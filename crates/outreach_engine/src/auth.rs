use std::time::Duration;

use outreach_logging::outreach_info;
use serde::Serialize;

use crate::types::AuthError;

/// Login credentials for one platform account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One sending/harvesting identity: a named account plus its
/// platform-side user id.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub user_id: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub login_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl AuthSettings {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// An authenticated platform session. The inner client carries the
/// session cookies; every request made through it is authenticated.
#[derive(Debug, Clone)]
pub struct Session {
    client: reqwest::Client,
    account: String,
}

impl Session {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, identity: &Identity) -> Result<Session, AuthError>;
}

#[derive(Serialize)]
struct LoginPayload<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "rememberMe")]
    remember_me: bool,
}

/// Logs in with a JSON POST and keeps the session cookie in the
/// client's jar, so the returned [`Session`] stays authenticated for
/// follow-up requests.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    settings: AuthSettings,
}

impl HttpAuthenticator {
    pub fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, AuthError> {
        reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| AuthError::Network(err.to_string()))
    }
}

#[async_trait::async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, identity: &Identity) -> Result<Session, AuthError> {
        let client = self.build_client()?;
        let payload = LoginPayload {
            username: &identity.credentials.username,
            password: &identity.credentials.password,
            remember_me: true,
        };

        let response = client
            .post(&self.settings.login_url)
            .json(&payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidCredentials {
                account: identity.name.clone(),
            });
        }
        if !status.is_success() {
            return Err(AuthError::UnexpectedResponse(status.to_string()));
        }

        outreach_info!("account {} authenticated", identity.name);
        Ok(Session {
            client,
            account: identity.name.clone(),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        return AuthError::Timeout;
    }
    AuthError::Network(err.to_string())
}

use std::sync::Once;

use outreach_engine::{
    AuthError, AuthSettings, Authenticator, Credentials, HttpAuthenticator, HttpMessenger,
    HttpPagedSource, Identity, Messenger, PaginatedSource, SendOutcome, Session, SourceError,
    SourceSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(outreach_logging::initialize_for_tests);
}

fn identity() -> Identity {
    Identity {
        name: "main".to_string(),
        user_id: "self-1".to_string(),
        credentials: Credentials {
            username: "worker@example.com".to_string(),
            password: "hunter2".to_string(),
        },
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"),
        )
        .mount(server)
        .await;
}

async fn login(server: &MockServer) -> Session {
    mount_login(server).await;
    let authenticator = HttpAuthenticator::new(AuthSettings::new(format!("{}/login", server.uri())));
    authenticator.authenticate(&identity()).await.unwrap()
}

fn wire_profile(id: &str, first: &str, company: &str) -> serde_json::Value {
    json!({
        "userId": id,
        "firstName": first,
        "lastName": "Doe",
        "companyName": company,
        "jobTitle": "CEO",
        "gamingVertical": "online casino",
    })
}

#[tokio::test]
async fn authenticator_logs_in_with_json_credentials() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({
            "username": "worker@example.com",
            "password": "hunter2",
            "rememberMe": true,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let authenticator = HttpAuthenticator::new(AuthSettings::new(format!("{}/login", server.uri())));
    let session = authenticator.authenticate(&identity()).await.unwrap();
    assert_eq!(session.account(), "main");
}

#[tokio::test]
async fn authenticator_maps_unauthorized_to_invalid_credentials() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let authenticator = HttpAuthenticator::new(AuthSettings::new(format!("{}/login", server.uri())));
    let err = authenticator.authenticate(&identity()).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidCredentials { account } if account == "main"
    ));
}

#[tokio::test]
async fn paged_source_accumulates_until_a_short_batch() {
    init_logging();
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(query_param("from", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            wire_profile("u1", "Jane", "Acme"),
            wire_profile("u2", "John", "Beta"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(query_param("from", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([wire_profile("u3", "Mary", "Gamma")])),
        )
        .mount(&server)
        .await;

    let settings = SourceSettings {
        page_size: 2,
        ..SourceSettings::new(format!("{}/search", server.uri()))
    };
    let authenticator =
        HttpAuthenticator::new(AuthSettings::new(format!("{}/login", server.uri())));
    let mut source = HttpPagedSource::new(settings, authenticator, identity(), session);

    source.advance().await.unwrap();
    assert_eq!(source.current_items().len(), 2);
    assert_eq!(source.current_items()[0].user_id, "u1");
    assert_eq!(source.current_items()[0].first_name, "Jane");

    // Short batch marks the listing exhausted.
    source.advance().await.unwrap();
    assert_eq!(source.current_items().len(), 3);

    // Further advances are no-ops, no more requests go out.
    source.advance().await.unwrap();
    assert_eq!(source.current_items().len(), 3);
}

#[tokio::test]
async fn paged_source_reports_session_invalidation() {
    init_logging();
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let authenticator =
        HttpAuthenticator::new(AuthSettings::new(format!("{}/login", server.uri())));
    let mut source = HttpPagedSource::new(
        SourceSettings::new(format!("{}/search", server.uri())),
        authenticator,
        identity(),
        session,
    );

    let err = source.advance().await.unwrap_err();
    assert!(matches!(err, SourceError::SessionInvalidated));

    // Renewal logs in again and the next advance works.
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    source.renew_session().await.unwrap();
    source.advance().await.unwrap();
}

#[tokio::test]
async fn messenger_creates_chat_and_delivers() {
    init_logging();
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat/with-user/u1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chat-9",
            "messages": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/chat-9/messages"))
        .and(body_json(json!({ "text": "Hi Jane!" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut messenger =
        HttpMessenger::new(session, format!("{}/chat", server.uri()), "self-1");
    let outcome = messenger.send("u1", "Hi Jane!").await.unwrap();
    assert_eq!(outcome, SendOutcome::Delivered);
}

#[tokio::test]
async fn messenger_detects_prior_traffic_as_already_contacted() {
    init_logging();
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat/with-user/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chat-9",
            "messages": [{ "senderId": "self-1" }],
        })))
        .mount(&server)
        .await;

    let mut messenger =
        HttpMessenger::new(session, format!("{}/chat", server.uri()), "self-1");
    let outcome = messenger.send("u1", "Hi Jane!").await.unwrap();
    assert_eq!(outcome, SendOutcome::AlreadyContacted);
}

#[tokio::test]
async fn messenger_maps_429_to_rate_limited() {
    init_logging();
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat/with-user/u1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let mut messenger =
        HttpMessenger::new(session, format!("{}/chat", server.uri()), "self-1");
    let err = messenger.send("u1", "Hi Jane!").await.unwrap_err();
    assert!(matches!(err, outreach_engine::SendError::RateLimited));
}

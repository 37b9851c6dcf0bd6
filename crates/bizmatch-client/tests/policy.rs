//! End-to-end behaviour of the client commands against a local server.

use chrono::{Duration, Utc};

use bizmatch_client::commands::connections::{
    block_account, connection_state_with, respond_to_connection, send_connection_request,
    unblock_account,
};
use bizmatch_client::commands::favorites::toggle_favorite;
use bizmatch_client::commands::messaging::message_opportunity_owner;
use bizmatch_client::commands::opportunities::{
    create_opportunity, list_my_opportunities, view_opportunity, OpportunityDraft,
};
use bizmatch_client::inflight::Action;
use bizmatch_client::{
    AppState, BackendError, ClientConfig, ClientError, LocalServer, RetryPolicy, SessionState,
};
use bizmatch_shared::constants::HIDDEN_NAME_PLACEHOLDER;
use bizmatch_shared::visibility::ConnectAffordance;
use bizmatch_shared::{
    AccountId, ConnectionId, ConnectionResponse, ConnectionStatus, ContactPreference,
    OpportunityKind, PairState, PolicyError, ValidationError,
};
use bizmatch_store::{Account, Opportunity};

fn config() -> ClientConfig {
    ClientConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
        },
        refresh_interval: None,
        ..ClientConfig::default()
    }
}

fn account(name: &str) -> Account {
    Account {
        id: AccountId::new(),
        company_name: name.to_string(),
        industry: "Logistics".into(),
        location: "Rotterdam, Netherlands".into(),
        description: String::new(),
        contact_email: format!("{}@example.com", name.to_lowercase()),
        contact_phone: "+31 10 000 0000".into(),
        avatar_url: None,
        created_at: Utc::now(),
    }
}

async fn company(server: &LocalServer, name: &str) -> (AppState, AccountId) {
    let account = account(name);
    server.register(&account).unwrap();
    let app = AppState::local(server, account.id, config()).await.unwrap();
    (app, account.id)
}

async fn private_listing(app: &AppState) -> Opportunity {
    let draft = OpportunityDraft {
        kind: OpportunityKind::Buying,
        business_name: "Harbor Freight Co".into(),
        industry: "Logistics".into(),
        description: "Looking for cold-chain partners".into(),
        contact_email: "ops@harbor.example".into(),
        contact_phone: "+31 10 123 4567".into(),
        city: "Rotterdam".into(),
        country: "Netherlands".into(),
        company_size: None,
        timeline: Some("Q3".into()),
        budget_min: None,
        budget_max: Some(250_000.0),
        requirements: None,
        preferred_contact: ContactPreference::Phone,
        name_private: true,
    };
    create_opportunity(app, draft).await.unwrap()
}

fn connection_rows(server: &LocalServer, a: AccountId, b: AccountId) -> Option<ConnectionStatus> {
    server
        .with_db(|db| db.find_connection_between(a, b))
        .unwrap()
        .unwrap()
        .map(|c| c.status)
}

fn block_rows(server: &LocalServer, a: AccountId, b: AccountId) -> usize {
    server
        .with_db(|db| db.blocks_between(a, b))
        .unwrap()
        .unwrap()
        .len()
}

#[tokio::test]
async fn private_listing_scenario() {
    let server = LocalServer::in_memory().unwrap();
    let (owner, owner_id) = company(&server, "Harbor").await;
    let (buyer, buyer_id) = company(&server, "Northwind").await;
    let listing = private_listing(&owner).await;

    let before = view_opportunity(&buyer, listing.id).await.unwrap();
    assert_eq!(before.visibility.display_name, HIDDEN_NAME_PLACEHOLDER);
    assert!(before.visibility.contact.is_none());

    let request = send_connection_request(&buyer, owner_id, "Interested in partnering.")
        .await
        .unwrap();
    assert_eq!(request.status, ConnectionStatus::Pending);
    assert_eq!(
        request.request_message.as_deref(),
        Some("Interested in partnering.")
    );
    assert_eq!(
        view_opportunity(&buyer, listing.id)
            .await
            .unwrap()
            .visibility
            .connect,
        ConnectAffordance::Pending
    );

    respond_to_connection(&owner, request.id, ConnectionResponse::Accept)
        .await
        .unwrap();
    assert_eq!(
        connection_rows(&server, owner_id, buyer_id),
        Some(ConnectionStatus::Accepted)
    );

    let after = view_opportunity(&buyer, listing.id).await.unwrap();
    assert_eq!(after.visibility.display_name, "Harbor Freight Co");
    assert!(after.visibility.name_revealed);
    let contact = after.visibility.contact.unwrap();
    assert_eq!(contact.email, "ops@harbor.example");
    assert_eq!(contact.phone, "+31 10 123 4567");

    let outcome = block_account(&owner, buyer_id, Some("spam")).await.unwrap();
    assert!(outcome.block_created);
    assert!(outcome.connection_removed);
    assert_eq!(connection_rows(&server, owner_id, buyer_id), None);
    assert_eq!(block_rows(&server, owner_id, buyer_id), 1);

    assert!(matches!(
        send_connection_request(&buyer, owner_id, "Please reconsider").await,
        Err(ClientError::Policy(PolicyError::Blocked { .. }))
    ));
    let hidden = view_opportunity(&buyer, listing.id).await.unwrap();
    assert_eq!(hidden.visibility.display_name, HIDDEN_NAME_PLACEHOLDER);
    assert_eq!(hidden.visibility.connect, ConnectAffordance::Hidden);
}

#[tokio::test]
async fn block_forbids_requests_both_ways_and_is_idempotent() {
    let server = LocalServer::in_memory().unwrap();
    let (a, a_id) = company(&server, "Acme").await;
    let (b, b_id) = company(&server, "Beta").await;

    send_connection_request(&a, b_id, "hello").await.unwrap();
    block_account(&b, a_id, None).await.unwrap();
    let again = block_account(&b, a_id, None).await.unwrap();
    assert!(!again.block_created);
    assert_eq!(block_rows(&server, a_id, b_id), 1);
    assert_eq!(connection_rows(&server, a_id, b_id), None);

    for (from, to) in [(&a, b_id), (&b, a_id)] {
        assert!(matches!(
            send_connection_request(from, to, "hi").await,
            Err(ClientError::Policy(PolicyError::Blocked { .. }))
        ));
    }
    assert_eq!(connection_rows(&server, a_id, b_id), None);

    assert_eq!(unblock_account(&b, a_id).await.unwrap(), PairState::None);
    send_connection_request(&a, b_id, "hello again").await.unwrap();
}

#[tokio::test]
async fn blocked_side_cannot_lift_the_block() {
    let server = LocalServer::in_memory().unwrap();
    let (a, a_id) = company(&server, "Acme").await;
    let (b, b_id) = company(&server, "Beta").await;

    block_account(&a, b_id, None).await.unwrap();
    assert_eq!(
        unblock_account(&b, a_id).await,
        Err(ClientError::Policy(PolicyError::NotBlocked))
    );
    assert!(connection_state_with(&b, a_id).await.unwrap().is_blocked());
}

#[tokio::test]
async fn own_listing_actions_write_nothing() {
    let server = LocalServer::in_memory().unwrap();
    let (owner, owner_id) = company(&server, "Harbor").await;
    let listing = private_listing(&owner).await;

    assert!(matches!(
        toggle_favorite(&owner, listing.id).await,
        Err(ClientError::Validation(ValidationError::SelfAction(_)))
    ));
    assert!(matches!(
        message_opportunity_owner(&owner, listing.id, "hi").await,
        Err(ClientError::Validation(ValidationError::SelfAction(_)))
    ));
    assert_eq!(
        send_connection_request(&owner, owner_id, "me").await,
        Err(ClientError::Policy(PolicyError::SelfConnection))
    );

    let favorite = server
        .with_db(|db| db.get_favorite(owner_id, listing.id))
        .unwrap()
        .unwrap();
    assert!(favorite.is_none());
    let inbox = server
        .with_db(|db| db.get_inbox(owner_id, 10, 0))
        .unwrap()
        .unwrap();
    assert!(inbox.is_empty());
}

#[tokio::test]
async fn declined_request_is_reopened_in_place() {
    let server = LocalServer::in_memory().unwrap();
    let (a, a_id) = company(&server, "Acme").await;
    let (b, b_id) = company(&server, "Beta").await;

    let first = send_connection_request(&a, b_id, "hello").await.unwrap();
    respond_to_connection(&b, first.id, ConnectionResponse::Decline)
        .await
        .unwrap();
    assert_eq!(
        connection_rows(&server, a_id, b_id),
        Some(ConnectionStatus::Declined)
    );

    let second = send_connection_request(&a, b_id, "second try").await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, ConnectionStatus::Pending);
    let rows = server
        .with_db(|db| db.list_connections_for(a_id))
        .unwrap()
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn transient_failures_are_retried_within_the_bound() {
    let server = LocalServer::in_memory().unwrap();
    let (app, _) = company(&server, "Acme").await;
    let network = || BackendError::from_response(None, "Failed to fetch");

    server.inject_failures([network(), network()]);
    let calls = server.call_count();
    list_my_opportunities(&app).await.unwrap();
    // two failed attempts, the successful current_user, then the list
    assert_eq!(server.call_count() - calls, 4);

    server.inject_failures([network(), network(), network()]);
    let calls = server.call_count();
    assert!(matches!(
        list_my_opportunities(&app).await,
        Err(ClientError::Backend(BackendError::Network(_)))
    ));
    assert_eq!(server.call_count() - calls, 3);

    server.inject_failures([BackendError::from_response(Some(500), "boom")]);
    let calls = server.call_count();
    assert!(list_my_opportunities(&app).await.is_err());
    assert_eq!(server.call_count() - calls, 1);
}

#[tokio::test]
async fn missing_single_row_reads_as_none() {
    let server = LocalServer::in_memory().unwrap();
    let (app, _) = company(&server, "Acme").await;
    let listing = private_listing(&app).await;

    server.inject_failures([BackendError::from_response(Some(406), "no rows")]);
    assert_eq!(app.backend.get_opportunity(listing.id).await, Ok(None));
    assert!(app.backend.get_opportunity(listing.id).await.unwrap().is_some());
}

#[tokio::test]
async fn expired_session_signs_out_and_redirects() {
    let server = LocalServer::in_memory().unwrap();
    let account = account("Acme");
    server.register(&account).unwrap();
    let app = AppState::new(server.sign_in_for(account.id, Duration::zero()), config());
    let mut session = app.session.subscribe();

    assert_eq!(
        list_my_opportunities(&app).await,
        Err(ClientError::SessionExpired)
    );
    session.changed().await.unwrap();
    assert_eq!(
        *session.borrow(),
        SessionState::Expired {
            redirect: "/sign-in".into()
        }
    );
}

#[tokio::test]
async fn block_rolls_back_when_connection_does_not_match() {
    let server = LocalServer::in_memory().unwrap();
    let (a, a_id) = company(&server, "Acme").await;
    let (_b, b_id) = company(&server, "Beta").await;
    send_connection_request(&a, b_id, "hello").await.unwrap();

    let result = a
        .backend
        .block_and_disconnect(b_id, Some(ConnectionId::new()), None)
        .await;
    assert!(matches!(
        result,
        Err(BackendError::Rejected { status: 400, .. })
    ));
    assert_eq!(block_rows(&server, a_id, b_id), 0);
    assert_eq!(
        connection_rows(&server, a_id, b_id),
        Some(ConnectionStatus::Pending)
    );
}

#[tokio::test]
async fn duplicate_actions_are_suppressed() {
    let server = LocalServer::in_memory().unwrap();
    let (a, a_id) = company(&server, "Acme").await;
    let (_b, b_id) = company(&server, "Beta").await;

    let ticket = a.inflight.begin(a_id, b_id.0, Action::Block).unwrap();
    assert_eq!(
        block_account(&a, b_id, None).await,
        Err(ClientError::DuplicateRequest)
    );
    drop(ticket);
    block_account(&a, b_id, None).await.unwrap();

    // Two sessions of the same account racing on one request.
    let (c, c_id) = company(&server, "Gamma").await;
    let c_twin = AppState::local(&server, c_id, config()).await.unwrap();
    let (_d, d_id) = company(&server, "Delta").await;
    let (first, second) = tokio::join!(
        send_connection_request(&c, d_id, "hi"),
        send_connection_request(&c_twin, d_id, "hi"),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| *r == Err(ClientError::Policy(PolicyError::AlreadyPending))));
}

#[tokio::test]
async fn on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        db_path: Some(dir.path().join("bizmatch.db")),
        ..config()
    };

    let account = account("Acme");
    {
        let server = LocalServer::open(&config).unwrap();
        server.register(&account).unwrap();
        let app = AppState::local(&server, account.id, config.clone())
            .await
            .unwrap();
        private_listing(&app).await;
    }

    let server = LocalServer::open(&config).unwrap();
    let app = AppState::local(&server, account.id, config).await.unwrap();
    assert_eq!(list_my_opportunities(&app).await.unwrap().len(), 1);
}

//! Connection requests, responses, blocking and unblocking.
//!
//! Every command loads the pair's current rows, asks [`Pair`] for a plan,
//! and only then writes. Connect, respond and block are deduplicated per
//! (actor, target) while a previous identical call is still running.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use bizmatch_shared::policy::{validate_intro_message, RequestPlan};
use bizmatch_shared::{
    AccountId, ConnectionId, ConnectionResponse, ConnectionStatus, OpportunityId, Pair, PairState,
    PolicyError, SelfAction, ValidationError,
};
use bizmatch_store::{Block, BlockOutcome, Connection, ProfileSummary};

use crate::backend::{ChangeFilter, Table};
use crate::commands::notifications;
use crate::error::{BackendError, ClientError, Result};
use crate::inflight::Action;
use crate::live::LiveList;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// I sent the request.
    Outgoing,
    Incoming,
}

/// A connection row with the other party's public profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    pub connection: Connection,
    pub direction: Direction,
    pub counterpart_id: AccountId,
    /// `None` when the account no longer exists.
    pub counterpart: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedAccountView {
    pub account_id: AccountId,
    pub company_name: Option<String>,
    pub reason: Option<String>,
    pub blocked_at: DateTime<Utc>,
}

/// Everything stored between `me` and `other`, as the policy sees it.
pub(crate) async fn pair_with(app: &AppState, me: AccountId, other: AccountId) -> Result<Pair> {
    let connection = app.backend.find_connection_with(other).await?;
    let blocks = app.backend.blocks_with(other).await?;
    Ok(Pair::new(
        me,
        other,
        connection.map(|c| c.fact()),
        blocks.iter().map(Block::fact).collect(),
    ))
}

async fn company_name(app: &AppState, id: AccountId) -> String {
    match app.backend.get_account(id).await {
        Ok(Some(account)) => account.company_name,
        _ => "A company".to_string(),
    }
}

/// Ask `recipient` to connect. A declined request from the same requester
/// is reopened in place.
pub async fn send_connection_request(
    app: &AppState,
    recipient: AccountId,
    message: &str,
) -> Result<Connection> {
    let me = app.require_user().await?;
    let message = validate_intro_message(message)?;
    let _ticket = app.inflight.begin(me, recipient.0, Action::Connect)?;

    let pair = pair_with(app, me, recipient).await?;
    let plan = pair.request(me)?;
    let connection = match plan {
        RequestPlan::Create => {
            let now = Utc::now();
            let connection = Connection {
                id: ConnectionId::new(),
                requester_id: me,
                recipient_id: recipient,
                status: ConnectionStatus::Pending,
                request_message: Some(message.to_string()),
                created_at: now,
                updated_at: now,
            };
            match app.backend.insert_connection(&connection).await {
                Ok(true) => connection,
                Ok(false) => return Err(refused(app, me, recipient).await),
                // Another request for the pair landed first.
                Err(BackendError::Conflict(_)) => return Err(PolicyError::AlreadyPending.into()),
                Err(e) => return Err(e.into()),
            }
        }
        RequestPlan::Reopen(id) => {
            if !app.backend.reopen_connection(id, message).await? {
                return Err(refused(app, me, recipient).await);
            }
            app.backend
                .get_connection(id)
                .await?
                .ok_or(ClientError::NotFound("Connection"))?
        }
    };

    info!(
        connection = %connection.id,
        requester = %me.short(),
        recipient = %recipient.short(),
        reopened = matches!(plan, RequestPlan::Reopen(_)),
        "Connection requested"
    );
    let my_name = company_name(app, me).await;
    notifications::connection_requested(app, recipient, &my_name, connection.id).await;
    Ok(connection)
}

/// Why a guarded connection write matched no row: a block written after
/// the pair was read, or a request that got there first.
async fn refused(app: &AppState, me: AccountId, other: AccountId) -> ClientError {
    match pair_with(app, me, other).await {
        Ok(pair) => match pair.state() {
            PairState::Blocked { blocker, blocked } => {
                PolicyError::Blocked { blocker, blocked }.into()
            }
            _ => PolicyError::AlreadyPending.into(),
        },
        Err(e) => e,
    }
}

/// Connect with the owner of a listing.
pub async fn request_connection_for_opportunity(
    app: &AppState,
    opportunity: OpportunityId,
    message: &str,
) -> Result<Connection> {
    let me = app.require_user().await?;
    let listing = app
        .backend
        .get_opportunity(opportunity)
        .await?
        .ok_or(ClientError::NotFound("Opportunity"))?;
    if listing.owner_id == me {
        return Err(ValidationError::SelfAction(SelfAction::Connect).into());
    }
    send_connection_request(app, listing.owner_id, message).await
}

/// Accept or decline a pending request addressed to me.
pub async fn respond_to_connection(
    app: &AppState,
    id: ConnectionId,
    response: ConnectionResponse,
) -> Result<Connection> {
    let me = app.require_user().await?;
    let _ticket = app.inflight.begin(me, id.0, Action::Respond)?;
    let connection = app
        .backend
        .get_connection(id)
        .await?
        .ok_or(ClientError::NotFound("Connection"))?;
    let other = connection
        .counterpart(me)
        .ok_or(PolicyError::NotParticipant)?;

    let status = pair_with(app, me, other).await?.respond(me, response)?;
    if !app.backend.update_connection_status(id, status).await? {
        // Answered from another session after the read above.
        return Err(match app.backend.get_connection(id).await? {
            Some(current) => PolicyError::NotPending(current.status).into(),
            None => ClientError::NotFound("Connection"),
        });
    }
    info!(connection = %id, status = %status, "Connection answered");

    if status == ConnectionStatus::Accepted {
        let my_name = company_name(app, me).await;
        notifications::connection_accepted(app, connection.requester_id, &my_name, id).await;
    }

    app.backend
        .get_connection(id)
        .await?
        .ok_or(ClientError::NotFound("Connection"))
}

/// Block `target`, removing any connection between us in the same
/// transaction. Repeating a block succeeds without adding a row.
pub async fn block_account(
    app: &AppState,
    target: AccountId,
    reason: Option<&str>,
) -> Result<BlockOutcome> {
    let me = app.require_user().await?;
    let _ticket = app.inflight.begin(me, target.0, Action::Block)?;
    let plan = pair_with(app, me, target).await?.block(me)?;
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());

    let outcome = app
        .backend
        .block_and_disconnect(target, plan.remove_connection, reason)
        .await?;
    info!(
        blocker = %me.short(),
        blocked = %target.short(),
        block_created = outcome.block_created,
        connection_removed = outcome.connection_removed,
        "Account blocked"
    );
    Ok(outcome)
}

/// Block the other party of a connection row.
pub async fn block_connection(
    app: &AppState,
    id: ConnectionId,
    reason: Option<&str>,
) -> Result<BlockOutcome> {
    let me = app.require_user().await?;
    let connection = app
        .backend
        .get_connection(id)
        .await?
        .ok_or(ClientError::NotFound("Connection"))?;
    let other = connection
        .counterpart(me)
        .ok_or(PolicyError::NotParticipant)?;
    block_account(app, other, reason).await
}

/// Remove my block on `target`. Returns the pair's state afterwards, which
/// stays blocked if `target` also blocks me.
pub async fn unblock_account(app: &AppState, target: AccountId) -> Result<PairState> {
    let me = app.require_user().await?;
    let _ticket = app.inflight.begin(me, target.0, Action::Unblock)?;
    let plan = pair_with(app, me, target).await?.unblock(me)?;
    if !app.backend.delete_block(target).await? {
        return Err(PolicyError::NotBlocked.into());
    }
    info!(
        blocker = %me.short(),
        blocked = %target.short(),
        still_blocked = plan.still_blocked,
        "Account unblocked"
    );
    Ok(pair_with(app, me, target).await?.state())
}

/// Both directions, newest first.
pub async fn list_connections(app: &AppState) -> Result<Vec<ConnectionView>> {
    let me = app.require_user().await?;
    let rows = app.backend.list_connections().await?;
    let mut views = Vec::with_capacity(rows.len());
    for connection in rows {
        let Some(counterpart_id) = connection.counterpart(me) else {
            continue;
        };
        let counterpart = app
            .backend
            .get_account(counterpart_id)
            .await?
            .map(|a| ProfileSummary::from(&a));
        let direction = if connection.requester_id == me {
            Direction::Outgoing
        } else {
            Direction::Incoming
        };
        views.push(ConnectionView {
            connection,
            direction,
            counterpart_id,
            counterpart,
        });
    }
    Ok(views)
}

pub async fn list_blocked(app: &AppState) -> Result<Vec<BlockedAccountView>> {
    app.require_user().await?;
    let blocks = app.backend.list_my_blocks().await?;
    let mut views = Vec::with_capacity(blocks.len());
    for block in blocks {
        let company_name = app
            .backend
            .get_account(block.blocked_id)
            .await?
            .map(|a| a.company_name);
        views.push(BlockedAccountView {
            account_id: block.blocked_id,
            company_name,
            reason: block.reason,
            blocked_at: block.created_at,
        });
    }
    Ok(views)
}

pub async fn connection_state_with(app: &AppState, other: AccountId) -> Result<PairState> {
    let me = app.require_user().await?;
    if me == other {
        return Err(PolicyError::SelfConnection.into());
    }
    Ok(pair_with(app, me, other).await?.state())
}

/// My connections, kept fresh.
pub fn watch_connections(app: &AppState) -> LiveList<ConnectionView> {
    let filter = app
        .session
        .account()
        .map_or(ChangeFilter::All, ChangeFilter::Account);
    let subscription = app.backend.subscribe(Table::Connections, filter);
    let app = app.clone();
    let interval = app.config.refresh_interval;
    LiveList::spawn("connections", Some(subscription), interval, move || {
        let app = app.clone();
        async move { list_connections(&app).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{company, config, listing, server};
    use crate::state::AppState;

    fn id(app: &AppState) -> AccountId {
        app.session.account().unwrap()
    }

    #[tokio::test]
    async fn request_accept_and_notify() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;

        let request = send_connection_request(&a, id(&b), "  Interested in partnering.  ")
            .await
            .unwrap();
        assert_eq!(request.status, ConnectionStatus::Pending);
        assert_eq!(request.request_message.as_deref(), Some("Interested in partnering."));

        let feed = notifications::notifications(&b).await.unwrap();
        assert_eq!(feed.notifications[0].title, "New Connection Request");
        assert_eq!(feed.notifications[0].body, "Acme wants to connect with you");
        assert_eq!(feed.notifications[0].action_url.as_deref(), Some("/connections"));

        // Only the recipient answers.
        assert_eq!(
            respond_to_connection(&a, request.id, ConnectionResponse::Accept)
                .await
                .unwrap_err(),
            ClientError::Policy(PolicyError::NotRecipient)
        );
        let accepted = respond_to_connection(&b, request.id, ConnectionResponse::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);

        let feed = notifications::notifications(&a).await.unwrap();
        assert_eq!(feed.notifications[0].title, "Connection Accepted");
        assert_eq!(feed.notifications[0].body, "Beta accepted your connection request");

        let views = list_connections(&a).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].direction, Direction::Outgoing);
        assert_eq!(views[0].counterpart.as_ref().unwrap().company_name, "Beta");
    }

    #[tokio::test]
    async fn empty_message_and_duplicates_are_rejected() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;

        assert_eq!(
            send_connection_request(&a, id(&b), "   ").await.unwrap_err(),
            ClientError::Validation(ValidationError::EmptyField("Introduction message"))
        );

        send_connection_request(&a, id(&b), "hello").await.unwrap();
        assert_eq!(
            send_connection_request(&a, id(&b), "hello again")
                .await
                .unwrap_err(),
            ClientError::Policy(PolicyError::AlreadyPending)
        );
        assert_eq!(
            send_connection_request(&b, id(&a), "crossing")
                .await
                .unwrap_err(),
            ClientError::Policy(PolicyError::AlreadyPending)
        );
    }

    #[tokio::test]
    async fn declined_request_is_reopened_in_place() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;

        let first = send_connection_request(&a, id(&b), "hello").await.unwrap();
        respond_to_connection(&b, first.id, ConnectionResponse::Decline)
            .await
            .unwrap();
        assert_eq!(
            send_connection_request(&b, id(&a), "my turn").await.unwrap_err(),
            ClientError::Policy(PolicyError::NotOriginalRequester)
        );

        let again = send_connection_request(&a, id(&b), "second try").await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.status, ConnectionStatus::Pending);
        assert_eq!(again.request_message.as_deref(), Some("second try"));
        assert_eq!(list_connections(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn own_listing_cannot_be_connected() {
        let server = server();
        let a = company(&server, "Acme").await;
        let opp = listing(&a, "Acme Tools", false).await;
        assert_eq!(
            request_connection_for_opportunity(&a, opp.id, "hi")
                .await
                .unwrap_err()
                .to_string(),
            "You cannot connect with your own opportunity"
        );
        assert!(list_connections(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn block_connection_and_unblock() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;

        let request = send_connection_request(&a, id(&b), "hello").await.unwrap();
        let outcome = block_connection(&b, request.id, Some("spam")).await.unwrap();
        assert!(outcome.block_created && outcome.connection_removed);

        let blocked = list_blocked(&b).await.unwrap();
        assert_eq!(blocked[0].company_name.as_deref(), Some("Acme"));
        assert_eq!(blocked[0].reason.as_deref(), Some("spam"));
        assert!(matches!(
            connection_state_with(&a, id(&b)).await.unwrap(),
            PairState::Blocked { .. }
        ));

        assert_eq!(unblock_account(&b, id(&a)).await.unwrap(), PairState::None);
        assert_eq!(
            unblock_account(&b, id(&a)).await.unwrap_err(),
            ClientError::Policy(PolicyError::NotBlocked)
        );
        // Nothing was resurrected.
        assert!(list_connections(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_device_cannot_overturn_an_answer() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;
        let b_phone = AppState::local(&server, id(&b), config()).await.unwrap();

        let request = send_connection_request(&a, id(&b), "hello").await.unwrap();
        respond_to_connection(&b, request.id, ConnectionResponse::Accept)
            .await
            .unwrap();
        assert_eq!(
            respond_to_connection(&b_phone, request.id, ConnectionResponse::Decline)
                .await
                .unwrap_err(),
            ClientError::Policy(PolicyError::NotPending(ConnectionStatus::Accepted))
        );
        assert_eq!(
            connection_state_with(&a, id(&b)).await.unwrap(),
            PairState::Accepted
        );
    }

    #[tokio::test]
    async fn request_refused_by_a_late_block_reports_the_block() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;

        // The pair read by `a` predates this block.
        block_account(&b, id(&a), None).await.unwrap();
        assert_eq!(
            refused(&a, id(&a), id(&b)).await,
            ClientError::Policy(PolicyError::Blocked {
                blocker: id(&b),
                blocked: id(&a),
            })
        );
        assert_eq!(
            refused(&a, id(&a), AccountId::new()).await,
            ClientError::Policy(PolicyError::AlreadyPending)
        );
        assert!(matches!(
            send_connection_request(&a, id(&b), "hello").await,
            Err(ClientError::Policy(PolicyError::Blocked { .. }))
        ));
        assert!(list_connections(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_connections_follow_requests() {
        let server = server();
        let a = company(&server, "Acme").await;
        let b = company(&server, "Beta").await;
        let live = watch_connections(&b);
        live.wait_for(|s| !s.loading).await;

        send_connection_request(&a, id(&b), "hello").await.unwrap();
        let state = live.wait_for(|s| s.items.len() == 1).await;
        assert_eq!(state.items[0].direction, Direction::Incoming);
    }
}

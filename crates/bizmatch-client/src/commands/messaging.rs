use chrono::Utc;
use tracing::info;

use bizmatch_shared::constants::{DEFAULT_PAGE_SIZE, MAX_MESSAGE_LEN};
use bizmatch_shared::{
    AccountId, MessageId, OpportunityId, PolicyError, SelfAction, ThreadId, ValidationError,
};
use bizmatch_store::Message;

use crate::backend::{ChangeFilter, Table};
use crate::commands::connections::pair_with;
use crate::commands::notifications;
use crate::error::{ClientError, Result};
use crate::live::LiveList;
use crate::state::AppState;

const SEARCH_RESULT_LIMIT: u32 = 100;

fn validate_content(content: &str) -> std::result::Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("Message"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::TooLong {
            field: "Message",
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(trimmed)
}

/// Send a direct message. Requires an accepted connection.
pub async fn send_message(
    app: &AppState,
    recipient: AccountId,
    content: &str,
    reply_to: Option<MessageId>,
) -> Result<Message> {
    let me = app.require_user().await?;
    if me == recipient {
        return Err(PolicyError::SelfConnection.into());
    }
    let content = validate_content(content)?;
    pair_with(app, me, recipient).await?.can_message(me)?;

    let thread_id = app
        .backend
        .thread_id_with(recipient)
        .await?
        .unwrap_or_else(ThreadId::new);
    let message = Message {
        id: MessageId::new(),
        thread_id,
        sender_id: me,
        recipient_id: recipient,
        content: content.to_string(),
        is_read: false,
        reply_to_id: reply_to,
        created_at: Utc::now(),
    };
    app.backend.insert_message(&message).await?;
    info!(msg_id = %message.id, thread = %thread_id, "Message sent");

    let my_name = match app.backend.get_account(me).await {
        Ok(Some(account)) => account.company_name,
        _ => "A company".to_string(),
    };
    notifications::message_received(app, recipient, &my_name, message.id).await;
    Ok(message)
}

/// Message the owner of a listing.
pub async fn message_opportunity_owner(
    app: &AppState,
    opportunity: OpportunityId,
    content: &str,
) -> Result<Message> {
    let me = app.require_user().await?;
    let listing = app
        .backend
        .get_opportunity(opportunity)
        .await?
        .ok_or(ClientError::NotFound("Opportunity"))?;
    if listing.owner_id == me {
        return Err(ValidationError::SelfAction(SelfAction::Message).into());
    }
    send_message(app, listing.owner_id, content, None).await
}

/// Conversation with `other`, oldest first.
pub async fn thread_with(app: &AppState, other: AccountId) -> Result<Vec<Message>> {
    app.require_user().await?;
    Ok(app.backend.thread_with(other).await?)
}

/// Everything I sent or received, newest first.
pub async fn inbox(app: &AppState, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<Message>> {
    app.require_user().await?;
    Ok(app
        .backend
        .inbox(limit.unwrap_or(DEFAULT_PAGE_SIZE), offset.unwrap_or(0))
        .await?)
}

/// Case-insensitive search over my messages, newest first.
pub async fn search_inbox(app: &AppState, term: &str) -> Result<Vec<Message>> {
    app.require_user().await?;
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    Ok(app.backend.search_messages(term, SEARCH_RESULT_LIMIT).await?)
}

/// Unread messages addressed to me, for the header badge.
pub async fn unread_message_count(app: &AppState) -> Result<u32> {
    app.require_user().await?;
    Ok(app.backend.unread_message_count().await?)
}

pub async fn mark_message_read(app: &AppState, id: MessageId) -> Result<()> {
    app.require_user().await?;
    if !app.backend.mark_message_read(id).await? {
        return Err(ClientError::NotFound("Message"));
    }
    Ok(())
}

/// Conversation with `other`, kept fresh. Only messages between the two of
/// us trigger a re-fetch.
pub fn watch_thread(app: &AppState, other: AccountId) -> LiveList<Message> {
    let filter = match app.session.account() {
        Some(me) => ChangeFilter::Pair(me, other),
        None => ChangeFilter::Account(other),
    };
    let subscription = app.backend.subscribe(Table::Messages, filter);
    let app = app.clone();
    let interval = app.config.refresh_interval;
    LiveList::spawn("thread", Some(subscription), interval, move || {
        let app = app.clone();
        async move { thread_with(&app, other).await }
    })
}

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use bizmatch_shared::constants::{ROUTE_CONNECTIONS, ROUTE_MESSAGES, ROUTE_OPPORTUNITIES};
use bizmatch_shared::visibility::derive_visibility;
use bizmatch_shared::{
    AccountId, ConnectionId, MessageId, NotificationCategory, NotificationId, NotificationPriority,
};
use bizmatch_store::{Notification, Opportunity};

use crate::backend::{ChangeFilter, Table};
use crate::commands::connections::pair_with;
use crate::error::{ClientError, Result};
use crate::live::LiveList;
use crate::state::AppState;

/// Notifications sharing a group id, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroup {
    pub id: String,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub groups: Vec<NotificationGroup>,
    pub unread_count: usize,
}

impl From<Vec<Notification>> for NotificationFeed {
    fn from(notifications: Vec<Notification>) -> Self {
        let mut groups: Vec<NotificationGroup> = Vec::new();
        for n in &notifications {
            let Some(ref group_id) = n.group_id else {
                continue;
            };
            match groups.iter_mut().find(|g| &g.id == group_id) {
                Some(group) => group.notifications.push(n.clone()),
                None => groups.push(NotificationGroup {
                    id: group_id.clone(),
                    notifications: vec![n.clone()],
                }),
            }
        }
        for group in &mut groups {
            group
                .notifications
                .sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        let unread_count = notifications.iter().filter(|n| !n.read).count();
        Self {
            notifications,
            groups,
            unread_count,
        }
    }
}

pub async fn notifications(app: &AppState) -> Result<NotificationFeed> {
    app.require_user().await?;
    Ok(app.backend.list_notifications().await?.into())
}

pub async fn mark_notification_read(app: &AppState, id: NotificationId) -> Result<()> {
    app.require_user().await?;
    if !app.backend.mark_notification_read(id).await? {
        return Err(ClientError::NotFound("Notification"));
    }
    Ok(())
}

/// Returns how many notifications changed.
pub async fn mark_all_read(app: &AppState) -> Result<usize> {
    app.require_user().await?;
    Ok(app.backend.mark_all_notifications_read().await?)
}

pub async fn archive_notification(app: &AppState, id: NotificationId) -> Result<()> {
    app.require_user().await?;
    if !app.backend.archive_notification(id).await? {
        return Err(ClientError::NotFound("Notification"));
    }
    Ok(())
}

/// Non-archived notifications of the signed-in account, kept fresh.
pub fn watch_notifications(app: &AppState) -> LiveList<Notification> {
    let filter = app
        .session
        .account()
        .map_or(ChangeFilter::All, ChangeFilter::Account);
    let subscription = app.backend.subscribe(Table::Notifications, filter);
    let app = app.clone();
    let interval = app.config.refresh_interval;
    LiveList::spawn("notifications", Some(subscription), interval, move || {
        let app = app.clone();
        async move {
            app.require_user().await?;
            Ok(app.backend.list_notifications().await?)
        }
    })
}

// -- side effects of other commands -------------------------------------

pub(crate) async fn connection_requested(
    app: &AppState,
    recipient: AccountId,
    requester_name: &str,
    connection: ConnectionId,
) {
    let n = build(
        recipient,
        NotificationCategory::Connection,
        NotificationPriority::Medium,
        "New Connection Request",
        format!("{requester_name} wants to connect with you"),
        ROUTE_CONNECTIONS.to_string(),
        connection.to_string(),
    );
    deliver(app, n).await;
}

pub(crate) async fn connection_accepted(
    app: &AppState,
    requester: AccountId,
    recipient_name: &str,
    connection: ConnectionId,
) {
    let n = build(
        requester,
        NotificationCategory::Connection,
        NotificationPriority::Medium,
        "Connection Accepted",
        format!("{recipient_name} accepted your connection request"),
        ROUTE_CONNECTIONS.to_string(),
        connection.to_string(),
    );
    deliver(app, n).await;
}

pub(crate) async fn message_received(
    app: &AppState,
    recipient: AccountId,
    sender_name: &str,
    message: MessageId,
) {
    let n = build(
        recipient,
        NotificationCategory::Message,
        NotificationPriority::Medium,
        "New Message",
        format!("You have a new message from {sender_name}"),
        ROUTE_MESSAGES.to_string(),
        message.to_string(),
    );
    deliver(app, n).await;
}

/// Tell the owners of open lead requests in the listing's industry about
/// it. The poster and anyone on either side of a block are skipped.
pub(crate) async fn opportunity_posted(app: &AppState, opportunity: &Opportunity) {
    let owners = match app.backend.requirement_owners_in(&opportunity.industry).await {
        Ok(owners) => owners,
        Err(e) => {
            warn!(opportunity = %opportunity.id, error = %e, "Failed to look up matching requests");
            return;
        }
    };
    let mut sent = 0usize;
    for user in owners {
        if user == opportunity.owner_id {
            continue;
        }
        let state = match pair_with(app, opportunity.owner_id, user).await {
            Ok(pair) => pair.state(),
            Err(e) => {
                warn!(user = %user.short(), error = %e, "Skipping match, pair lookup failed");
                continue;
            }
        };
        if state.is_blocked() {
            continue;
        }
        let name = derive_visibility(Some(user), &opportunity.listing_facts(), &state).display_name;
        opportunity_matched(app, user, &name, opportunity).await;
        sent += 1;
    }
    if sent > 0 {
        info!(opportunity = %opportunity.id, recipients = sent, "Opportunity matches sent");
    }
}

async fn opportunity_matched(
    app: &AppState,
    user: AccountId,
    display_name: &str,
    opportunity: &Opportunity,
) {
    let n = build(
        user,
        NotificationCategory::Opportunity,
        NotificationPriority::Medium,
        "Opportunity Match",
        format!("New opportunity matching your criteria: \"{display_name}\""),
        format!("{ROUTE_OPPORTUNITIES}/{}", opportunity.id),
        opportunity.id.to_string(),
    );
    deliver(app, n).await;
}

/// The triggering write already succeeded; a lost notification is logged,
/// not surfaced.
async fn deliver(app: &AppState, n: Notification) {
    if let Err(e) = app.backend.insert_notification(&n).await {
        warn!(owner = %n.owner_id.short(), title = %n.title, error = %e, "Failed to create notification");
    }
}

fn build(
    owner: AccountId,
    category: NotificationCategory,
    priority: NotificationPriority,
    title: &str,
    body: String,
    action_url: String,
    related_id: String,
) -> Notification {
    Notification {
        id: NotificationId::new(),
        owner_id: owner,
        category,
        priority,
        title: title.to_string(),
        body,
        metadata: serde_json::Value::Null,
        action_url: Some(action_url),
        related_id: Some(related_id),
        read: false,
        archived: false,
        group_id: None,
        created_at: Utc::now(),
    }
}

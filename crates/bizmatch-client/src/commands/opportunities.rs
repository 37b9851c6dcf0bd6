use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use bizmatch_shared::format::format_budget_range;
use bizmatch_shared::policy::validate_budget;
use bizmatch_shared::visibility::{derive_visibility, Visibility};
use bizmatch_shared::{
    AccountId, ContactPreference, OpportunityId, OpportunityKind, PairState, ValidationError,
};
use bizmatch_store::{Opportunity, OpportunityQuery};

use crate::backend::{ChangeFilter, Table};
use crate::commands::connections::pair_with;
use crate::commands::notifications;
use crate::error::{ClientError, Result};
use crate::live::LiveList;
use crate::state::AppState;

/// Form input for a new listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityDraft {
    pub kind: OpportunityKind,
    pub business_name: String,
    pub industry: String,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub city: String,
    pub country: String,
    pub company_size: Option<String>,
    pub timeline: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub requirements: Option<String>,
    pub preferred_contact: ContactPreference,
    pub name_private: bool,
}

impl OpportunityDraft {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        let required = [
            ("Business name", &self.business_name),
            ("Industry", &self.industry),
            ("Description", &self.description),
            ("Contact email", &self.contact_email),
            ("Contact phone", &self.contact_phone),
            ("City", &self.city),
            ("Country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField(field));
            }
        }
        validate_budget(self.budget_min, self.budget_max)
    }

    fn into_opportunity(self, owner: AccountId) -> Opportunity {
        let optional = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Opportunity {
            id: OpportunityId::new(),
            owner_id: owner,
            kind: self.kind,
            location: format!("{}, {}", self.city.trim(), self.country.trim()),
            business_name: self.business_name.trim().to_string(),
            industry: self.industry.trim().to_string(),
            description: self.description.trim().to_string(),
            contact_email: self.contact_email.trim().to_string(),
            contact_phone: self.contact_phone.trim().to_string(),
            company_size: optional(self.company_size),
            timeline: optional(self.timeline),
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            requirements: optional(self.requirements),
            preferred_contact: self.preferred_contact,
            name_private: self.name_private,
            created_at: Utc::now(),
        }
    }
}

/// A listing as a particular viewer may see it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityView {
    pub id: OpportunityId,
    pub kind: OpportunityKind,
    pub industry: String,
    pub description: String,
    pub location: String,
    pub company_size: Option<String>,
    pub timeline: Option<String>,
    pub budget: String,
    pub requirements: Option<String>,
    pub preferred_contact: ContactPreference,
    pub created_at: DateTime<Utc>,
    pub visibility: Visibility,
}

impl OpportunityView {
    pub fn new(opportunity: &Opportunity, viewer: Option<AccountId>, state: &PairState) -> Self {
        Self {
            id: opportunity.id,
            kind: opportunity.kind,
            industry: opportunity.industry.clone(),
            description: opportunity.description.clone(),
            location: opportunity.location.clone(),
            company_size: opportunity.company_size.clone(),
            timeline: opportunity.timeline.clone(),
            budget: format_budget_range(opportunity.budget_min, opportunity.budget_max),
            requirements: opportunity.requirements.clone(),
            preferred_contact: opportunity.preferred_contact,
            created_at: opportunity.created_at,
            visibility: derive_visibility(viewer, &opportunity.listing_facts(), state),
        }
    }
}

pub async fn create_opportunity(app: &AppState, draft: OpportunityDraft) -> Result<Opportunity> {
    let me = app.require_user().await?;
    draft.validate()?;
    let opportunity = draft.into_opportunity(me);
    app.backend.insert_opportunity(&opportunity).await?;
    info!(opportunity = %opportunity.id, kind = %opportunity.kind, "Opportunity created");
    notifications::opportunity_posted(app, &opportunity).await;
    Ok(opportunity)
}

/// Owner only.
pub async fn delete_opportunity(app: &AppState, id: OpportunityId) -> Result<()> {
    app.require_user().await?;
    if !app.backend.delete_opportunity(id).await? {
        return Err(ClientError::NotFound("Opportunity"));
    }
    info!(opportunity = %id, "Opportunity deleted");
    Ok(())
}

/// Owner only.
pub async fn set_name_privacy(app: &AppState, id: OpportunityId, private: bool) -> Result<()> {
    app.require_user().await?;
    if !app.backend.set_opportunity_name_private(id, private).await? {
        return Err(ClientError::NotFound("Opportunity"));
    }
    Ok(())
}

pub async fn list_my_opportunities(app: &AppState) -> Result<Vec<Opportunity>> {
    app.require_user().await?;
    Ok(app.backend.list_my_opportunities().await?)
}

/// The public board, rendered for the current viewer.
pub async fn list_opportunities(
    app: &AppState,
    query: &OpportunityQuery,
) -> Result<Vec<OpportunityView>> {
    let viewer = app.viewer().await?;
    let opportunities = app.backend.list_opportunities(query).await?;
    render(app, viewer, &opportunities).await
}

pub async fn view_opportunity(app: &AppState, id: OpportunityId) -> Result<OpportunityView> {
    let viewer = app.viewer().await?;
    let opportunity = app
        .backend
        .get_opportunity(id)
        .await?
        .ok_or(ClientError::NotFound("Opportunity"))?;
    let state = state_with_owner(app, viewer, opportunity.owner_id).await?;
    Ok(OpportunityView::new(&opportunity, viewer, &state))
}

/// Board entries kept fresh for the current viewer.
pub fn watch_opportunities(app: &AppState, query: OpportunityQuery) -> LiveList<OpportunityView> {
    let subscription = app.backend.subscribe(Table::Opportunities, ChangeFilter::All);
    let app = app.clone();
    let interval = app.config.refresh_interval;
    LiveList::spawn("opportunities", Some(subscription), interval, move || {
        let app = app.clone();
        let query = query.clone();
        async move { list_opportunities(&app, &query).await }
    })
}

async fn render(
    app: &AppState,
    viewer: Option<AccountId>,
    opportunities: &[Opportunity],
) -> Result<Vec<OpportunityView>> {
    let mut states: HashMap<AccountId, PairState> = HashMap::new();
    let mut views = Vec::with_capacity(opportunities.len());
    for opportunity in opportunities {
        let owner = opportunity.owner_id;
        if !states.contains_key(&owner) {
            let state = state_with_owner(app, viewer, owner).await?;
            states.insert(owner, state);
        }
        let state = states.get(&owner).unwrap_or(&PairState::None);
        views.push(OpportunityView::new(opportunity, viewer, state));
    }
    Ok(views)
}

async fn state_with_owner(
    app: &AppState,
    viewer: Option<AccountId>,
    owner: AccountId,
) -> Result<PairState> {
    match viewer {
        Some(me) if me != owner => Ok(pair_with(app, me, owner).await?.state()),
        _ => Ok(PairState::None),
    }
}

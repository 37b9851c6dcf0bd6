//! Lead requests: what a business is looking for, filed under industry
//! categories. Browsing is public; posting and closing need a session.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use bizmatch_shared::constants::{
    NEW_REQUIREMENT_HOURS, RECENT_REQUIREMENTS_LIMIT, RECENT_REQUIREMENTS_REFRESH_SECS,
};
use bizmatch_shared::format::format_budget_range;
use bizmatch_shared::policy::validate_budget;
use bizmatch_shared::{CategoryId, RequirementId, RequirementStatus, ValidationError};
use bizmatch_store::{IndustryCategory, Requirement};

use crate::backend::{ChangeFilter, Table};
use crate::error::{ClientError, Result};
use crate::live::LiveList;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDraft {
    pub title: String,
    pub description: String,
    pub target_customer: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub categories: Vec<CategoryId>,
}

impl RequirementDraft {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyField("Title"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyField("Description"));
        }
        validate_budget(self.budget_min, self.budget_max)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementView {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub budget: String,
    /// Posted within the last day.
    pub is_new: bool,
}

impl RequirementView {
    pub fn new(requirement: Requirement, now: DateTime<Utc>) -> Self {
        Self {
            budget: format_budget_range(requirement.budget_min, requirement.budget_max),
            is_new: is_new(requirement.created_at, now),
            requirement,
        }
    }
}

pub fn is_new(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    created_at > now - chrono::Duration::hours(NEW_REQUIREMENT_HOURS)
}

pub async fn industry_categories(app: &AppState) -> Result<Vec<IndustryCategory>> {
    Ok(app.backend.list_industry_categories().await?)
}

/// Post a lead request as the signed-in account. Every category id must
/// name a known category; repeats are ignored.
pub async fn post_requirement(app: &AppState, draft: RequirementDraft) -> Result<Requirement> {
    let me = app.require_user().await?;
    draft.validate()?;

    let known = app.backend.list_industry_categories().await?;
    let mut categories: Vec<IndustryCategory> = Vec::with_capacity(draft.categories.len());
    for id in &draft.categories {
        if categories.iter().any(|c| c.id == *id) {
            continue;
        }
        let category = known
            .iter()
            .find(|c| c.id == *id)
            .ok_or(ClientError::NotFound("Category"))?;
        categories.push(category.clone());
    }
    categories.sort_by(|a, b| a.name.cmp(&b.name));

    let requirement = Requirement {
        id: RequirementId::new(),
        owner_id: me,
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        target_customer: draft
            .target_customer
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        budget_min: draft.budget_min,
        budget_max: draft.budget_max,
        deadline: draft.deadline,
        status: RequirementStatus::Open,
        categories,
        created_at: Utc::now(),
    };
    app.backend.insert_requirement(&requirement).await?;
    info!(
        requirement = %requirement.id,
        categories = requirement.categories.len(),
        "Lead request posted"
    );
    Ok(requirement)
}

/// Every request, newest first.
pub async fn list_requirements(app: &AppState) -> Result<Vec<RequirementView>> {
    let now = Utc::now();
    Ok(app
        .backend
        .list_requirements(None)
        .await?
        .into_iter()
        .map(|r| RequirementView::new(r, now))
        .collect())
}

/// The newest few requests.
pub async fn recent_requirements(app: &AppState) -> Result<Vec<RequirementView>> {
    let now = Utc::now();
    Ok(app
        .backend
        .list_requirements(Some(RECENT_REQUIREMENTS_LIMIT))
        .await?
        .into_iter()
        .map(|r| RequirementView::new(r, now))
        .collect())
}

pub async fn get_requirement(app: &AppState, id: RequirementId) -> Result<RequirementView> {
    let requirement = app
        .backend
        .get_requirement(id)
        .await?
        .ok_or(ClientError::NotFound("Requirement"))?;
    Ok(RequirementView::new(requirement, Utc::now()))
}

/// Owner only.
pub async fn set_requirement_status(
    app: &AppState,
    id: RequirementId,
    status: RequirementStatus,
) -> Result<()> {
    app.require_user().await?;
    if !app.backend.set_requirement_status(id, status).await? {
        return Err(ClientError::NotFound("Requirement"));
    }
    info!(requirement = %id, status = %status, "Lead request updated");
    Ok(())
}

/// The "recent" panel: re-fetched on every posted request and every five
/// minutes.
pub fn watch_recent_requirements(app: &AppState) -> LiveList<RequirementView> {
    let subscription = app.backend.subscribe(Table::Requirements, ChangeFilter::All);
    let app = app.clone();
    LiveList::spawn(
        "recent_requirements",
        Some(subscription),
        Some(Duration::from_secs(RECENT_REQUIREMENTS_REFRESH_SECS)),
        move || {
            let app = app.clone();
            async move { recent_requirements(&app).await }
        },
    )
}

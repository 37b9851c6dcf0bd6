use tracing::debug;

use bizmatch_shared::{OpportunityId, PairState, PolicyError, SelfAction, ValidationError};

use crate::commands::connections::pair_with;
use crate::error::{ClientError, Result};
use crate::inflight::Action;
use crate::state::AppState;

/// Flip the star on a listing. Returns the new value.
pub async fn toggle_favorite(app: &AppState, opportunity: OpportunityId) -> Result<bool> {
    let me = app.require_user().await?;
    let listing = app
        .backend
        .get_opportunity(opportunity)
        .await?
        .ok_or(ClientError::NotFound("Opportunity"))?;
    if listing.owner_id == me {
        return Err(ValidationError::SelfAction(SelfAction::Favorite).into());
    }
    if let PairState::Blocked { blocker, blocked } = pair_with(app, me, listing.owner_id).await?.state() {
        return Err(PolicyError::Blocked { blocker, blocked }.into());
    }

    let _ticket = app.inflight.begin(me, opportunity.0, Action::Favorite)?;
    let current = app
        .backend
        .get_favorite(opportunity)
        .await?
        .is_some_and(|f| f.is_favorite);
    let favorite = app.backend.upsert_favorite(opportunity, !current).await?;
    debug!(%opportunity, is_favorite = favorite.is_favorite, "Favorite toggled");
    Ok(favorite.is_favorite)
}

pub async fn is_favorite(app: &AppState, opportunity: OpportunityId) -> Result<bool> {
    app.require_user().await?;
    Ok(app
        .backend
        .get_favorite(opportunity)
        .await?
        .is_some_and(|f| f.is_favorite))
}

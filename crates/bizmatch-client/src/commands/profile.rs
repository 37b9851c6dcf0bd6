use serde::{Deserialize, Serialize};
use tracing::info;

use bizmatch_shared::{AccountId, ValidationError};
use bizmatch_store::{Account, ProfileSummary};

use crate::error::{ClientError, Result};
use crate::state::AppState;

/// Editable profile fields. The account id, contact email and creation
/// time are not editable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub company_name: String,
    pub industry: String,
    pub description: String,
    pub city: String,
    pub country: String,
    pub contact_phone: String,
    pub avatar_url: Option<String>,
}

impl From<&Account> for ProfileUpdate {
    /// Pre-fill the edit form; `location` is split back into city and country.
    fn from(account: &Account) -> Self {
        let (city, country) = account
            .location
            .split_once(", ")
            .unwrap_or((account.location.as_str(), ""));
        Self {
            company_name: account.company_name.clone(),
            industry: account.industry.clone(),
            description: account.description.clone(),
            city: city.to_string(),
            country: country.to_string(),
            contact_phone: account.contact_phone.clone(),
            avatar_url: account.avatar_url.clone(),
        }
    }
}

impl ProfileUpdate {
    fn apply(self, account: &mut Account) -> std::result::Result<(), ValidationError> {
        let company_name = self.company_name.trim();
        if company_name.is_empty() {
            return Err(ValidationError::EmptyField("Company name"));
        }
        let (city, country) = (self.city.trim(), self.country.trim());
        account.company_name = company_name.to_string();
        account.industry = self.industry.trim().to_string();
        account.description = self.description.trim().to_string();
        // A location needs both halves.
        account.location = if city.is_empty() || country.is_empty() {
            String::new()
        } else {
            format!("{city}, {country}")
        };
        account.contact_phone = self.contact_phone.trim().to_string();
        account.avatar_url = self
            .avatar_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        Ok(())
    }
}

pub async fn my_profile(app: &AppState) -> Result<Account> {
    let me = app.require_user().await?;
    app.backend
        .get_account(me)
        .await?
        .ok_or(ClientError::NotFound("Profile"))
}

/// Public summary of any company.
pub async fn company_profile(app: &AppState, id: AccountId) -> Result<ProfileSummary> {
    let account = app
        .backend
        .get_account(id)
        .await?
        .ok_or(ClientError::NotFound("Company"))?;
    Ok(ProfileSummary::from(&account))
}

pub async fn update_profile(app: &AppState, update: ProfileUpdate) -> Result<Account> {
    let mut account = my_profile(app).await?;
    update.apply(&mut account)?;
    if !app.backend.update_my_profile(&account).await? {
        return Err(ClientError::NotFound("Profile"));
    }
    info!(account = %account.id.short(), "Profile updated");
    Ok(account)
}

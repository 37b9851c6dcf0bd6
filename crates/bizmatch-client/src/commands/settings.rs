use chrono::Utc;
use tracing::info;

use bizmatch_store::Settings;

use crate::error::Result;
use crate::state::AppState;

/// My settings, created with defaults on first read.
pub async fn load_settings(app: &AppState) -> Result<Settings> {
    let me = app.require_user().await?;
    if let Some(settings) = app.backend.get_settings().await? {
        return Ok(settings);
    }
    let defaults = Settings::defaults_for(me);
    app.backend.upsert_settings(&defaults).await?;
    info!(account = %me.short(), "Default settings created");
    Ok(defaults)
}

pub async fn save_settings(app: &AppState, mut settings: Settings) -> Result<Settings> {
    let me = app.require_user().await?;
    settings.user_id = me;
    settings.updated_at = Utc::now();
    app.backend.upsert_settings(&settings).await?;
    info!("Settings updated");
    Ok(settings)
}

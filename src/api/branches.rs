//! Branch-aware login: branch listing and OAuth2 initiation.
//!
//! Login always goes through Google with a branch code; the backend rejects
//! e-mail addresses not allowed for the chosen branch and reports that through
//! the callback `error` parameter.

use super::{ApiClient, Auth};
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use url::Url;

pub const BRANCHES_PATH: &str = "/api/branches";
pub const GOOGLE_AUTHORIZATION_PATH: &str = "/oauth2/authorization/google";

/// Shown when login is attempted without a branch.
pub const BRANCH_REQUIRED_MESSAGE: &str = "Vui lòng chọn chi nhánh trước khi đăng nhập";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub allowed_emails: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Lists branches offered on the login screen (cached until logout).
///
/// # Errors
///
/// Returns `AppError` on network failure, non-success status or an
/// undecodable body.
#[instrument(skip(api))]
pub async fn list_branches(api: &ApiClient) -> Result<Vec<Branch>, AppError> {
    api.get_json_cached(BRANCHES_PATH, Auth::Bearer).await
}

/// Remembers the branch and returns the Google authorization URL to open.
///
/// # Errors
///
/// Returns `AppError::Config` with [`BRANCH_REQUIRED_MESSAGE`] when the code is
/// blank.
pub fn initiate_google_login(api: &ApiClient, branch_code: &str) -> Result<Url, AppError> {
    let code = branch_code.trim();
    if code.is_empty() {
        return Err(AppError::Config(BRANCH_REQUIRED_MESSAGE.to_string()));
    }

    if let Err(err) = api.tokens().set_selected_branch(code) {
        // the marker is cosmetic; login proceeds without it
        warn!("Failed to remember selected branch: {err}");
    }

    google_login_url(api.base_url(), code)
}

/// `{base}/oauth2/authorization/google?branch={code}`.
///
/// # Errors
///
/// Returns `AppError::Config` if the base URL cannot carry a path.
pub fn google_login_url(base_url: &Url, branch_code: &str) -> Result<Url, AppError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| AppError::Config("Backend base URL cannot be a base.".to_string()))?
        .pop_if_empty()
        .extend(GOOGLE_AUTHORIZATION_PATH.trim_start_matches('/').split('/'));
    url.query_pairs_mut().clear().append_pair("branch", branch_code);
    Ok(url)
}

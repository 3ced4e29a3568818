// Token refresh call against the backend auth endpoint

use reqwest::Client;

use super::types::{RefreshTokenRequest, RefreshTokenResponse};
use crate::error::{extract_message, RefreshError};

/// Refresh endpoint for a backend base URL
pub fn refresh_url(base_url: &str) -> String {
    format!("{}/auth/refresh-token", base_url.trim_end_matches('/'))
}

/// Exchange a refresh token for a new access token.
///
/// Goes straight to the endpoint, never through the authenticated request
/// pipeline, so a rejected refresh cannot recurse into another refresh.
pub async fn refresh_access_token(
    client: &Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<String, RefreshError> {
    tracing::info!("Refreshing access token...");

    let url = refresh_url(base_url);
    let request = RefreshTokenRequest {
        refresh_token: refresh_token.to_string(),
    };

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, url = %url, "Refresh request failed");
            RefreshError::Network(e.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            body = %error_text,
            "Token refresh rejected"
        );
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            message: extract_message(&error_text),
        });
    }

    let data: RefreshTokenResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;

    let access_token = data
        .data
        .and_then(|d| d.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            RefreshError::MalformedResponse(
                "response does not contain data.accessToken".to_string(),
            )
        })?;

    tracing::info!("Access token refreshed");
    Ok(access_token)
}

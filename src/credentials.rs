//! Token Credentials
//!
//! Concrete token sources for the bearer authorizer:
//! - Service principal with a client secret (client credentials grant)
//! - Username/password (resource owner password grant)
//! - Managed identity via the instance metadata service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, info};

use crate::authorizer::{AccessToken, TokenCredential};
use crate::error::AuthorizerError;

/// Instance metadata token endpoint for managed identity
pub const MANAGED_IDENTITY_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const MANAGED_IDENTITY_API_VERSION: &str = "2018-02-01";

/// Shared HTTP client settings for token endpoints
pub(crate) fn http_client() -> Result<Client, AuthorizerError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(AuthorizerError::HttpClient)
}

fn token_endpoint(authority: &str, tenant_id: &str) -> String {
    format!("{}/{}/oauth2/token", authority.trim_end_matches('/'), tenant_id)
}

/// Send a token request and parse the access token out of the response
async fn request_token(request: RequestBuilder) -> Result<AccessToken, AuthorizerError> {
    let response = request.send().await.map_err(AuthorizerError::Transport)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthorizerError::TokenRequest { status, body });
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AuthorizerError::InvalidTokenResponse(e.to_string()))?;

    parse_token_response(&body)
}

fn parse_token_response(body: &serde_json::Value) -> Result<AccessToken, AuthorizerError> {
    let token = body["access_token"]
        .as_str()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthorizerError::InvalidTokenResponse("missing access_token".to_string()))?
        .to_string();

    // v1 endpoints report expires_in as a string
    let expires_in = match &body["expires_in"] {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    };

    Ok(AccessToken { token, expires_in })
}

/// Service principal authenticated with a client secret
pub struct ClientSecretCredential {
    http_client: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        http_client: Client,
        authority: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            http_client,
            authority: authority.to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, AuthorizerError> {
        let url = token_endpoint(&self.authority, &self.tenant_id);
        debug!(client_id = %self.client_id, "Requesting token with client secret");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", resource),
        ];

        let token = request_token(self.http_client.post(&url).form(&form)).await?;
        info!(client_id = %self.client_id, "Token obtained for service principal");
        Ok(token)
    }
}

/// User account authenticated with a password
pub struct UsernamePasswordCredential {
    http_client: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    username: String,
    password: String,
}

impl UsernamePasswordCredential {
    pub fn new(
        http_client: Client,
        authority: &str,
        tenant_id: &str,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            http_client,
            authority: authority.to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl TokenCredential for UsernamePasswordCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, AuthorizerError> {
        let url = token_endpoint(&self.authority, &self.tenant_id);
        debug!(username = %self.username, "Requesting token with password grant");

        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("resource", resource),
        ];

        request_token(self.http_client.post(&url).form(&form)).await
    }
}

/// Identity assigned to the host the controller runs on
pub struct ManagedIdentityCredential {
    http_client: Client,
    endpoint: String,
    /// User-assigned identity; system-assigned when unset
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            endpoint: MANAGED_IDENTITY_ENDPOINT.to_string(),
            client_id: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, AuthorizerError> {
        let mut query = vec![
            ("api-version", MANAGED_IDENTITY_API_VERSION),
            ("resource", resource),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        debug!(endpoint = %self.endpoint, "Requesting managed identity token");

        let request = self
            .http_client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query);

        request_token(request).await
    }
}

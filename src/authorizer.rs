//! Request Authorizers
//!
//! Trait-based abstractions for attaching credentials to outbound
//! management-plane requests, plus the credential selection that turns
//! ambient settings into an authorizer.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use tracing::debug;

use crate::credentials::{
    http_client, ClientSecretCredential, ManagedIdentityCredential, UsernamePasswordCredential,
};
use crate::error::AuthorizerError;
use crate::settings::{SettingKey, Settings};

/// Capability that signs outbound requests
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Attach credentials to a single request
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthorizerError>;
}

/// Access token issued by a token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Lifetime in seconds, when the endpoint reports one
    pub expires_in: Option<u64>,
}

/// Source of access tokens for a resource
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, AuthorizerError>;
}

/// Authorizer that sends `Authorization: Bearer <token>`
///
/// Tokens are fetched per request; nothing is cached.
pub struct BearerAuthorizer<C> {
    credential: C,
    resource: String,
}

impl<C: TokenCredential> BearerAuthorizer<C> {
    pub fn new(credential: C, resource: impl Into<String>) -> Self {
        Self {
            credential,
            resource: resource.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

#[async_trait]
impl<C: TokenCredential> Authorizer for BearerAuthorizer<C> {
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthorizerError> {
        let token = self.credential.get_token(&self.resource).await?;
        Ok(request.bearer_auth(token.token))
    }
}

/// Builds an authorizer from resolved settings
pub trait AuthorizerFactory {
    fn authorizer(&self, settings: &Settings) -> Result<Arc<dyn Authorizer>, AuthorizerError>;
}

impl<F> AuthorizerFactory for F
where
    F: Fn(&Settings) -> Result<Arc<dyn Authorizer>, AuthorizerError>,
{
    fn authorizer(&self, settings: &Settings) -> Result<Arc<dyn Authorizer>, AuthorizerError> {
        self(settings)
    }
}

/// Credential mechanism selected from the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ClientSecret,
    ClientCertificate,
    UsernamePassword,
    ManagedIdentity,
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CredentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKind::ClientSecret => "client secret",
            CredentialKind::ClientCertificate => "client certificate",
            CredentialKind::UsernamePassword => "username/password",
            CredentialKind::ManagedIdentity => "managed identity",
        }
    }

    /// Pick a mechanism: client secret, then certificate, then
    /// username/password, falling back to managed identity.
    pub fn select(settings: &Settings) -> Self {
        if !settings.trimmed(SettingKey::ClientSecret).is_empty() {
            CredentialKind::ClientSecret
        } else if !settings.trimmed(SettingKey::CertificatePath).is_empty() {
            CredentialKind::ClientCertificate
        } else if !settings.trimmed(SettingKey::Username).is_empty()
            && !settings.trimmed(SettingKey::Password).is_empty()
        {
            CredentialKind::UsernamePassword
        } else {
            CredentialKind::ManagedIdentity
        }
    }
}

/// Factory that builds bearer authorizers against the settings' cloud
#[derive(Debug, Clone, Default)]
pub struct DefaultAuthorizerFactory {
    /// Overrides the instance metadata token endpoint
    managed_identity_endpoint: Option<String>,
}

impl DefaultAuthorizerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_managed_identity_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.managed_identity_endpoint = Some(endpoint.into());
        self
    }
}

fn required<'a>(
    settings: &'a Settings,
    key: SettingKey,
    kind: CredentialKind,
) -> Result<&'a str, AuthorizerError> {
    let value = settings.trimmed(key);
    if value.is_empty() {
        return Err(AuthorizerError::MissingSetting {
            setting: key.env_var(),
            credential: kind.as_str(),
        });
    }
    Ok(value)
}

impl AuthorizerFactory for DefaultAuthorizerFactory {
    fn authorizer(&self, settings: &Settings) -> Result<Arc<dyn Authorizer>, AuthorizerError> {
        let kind = CredentialKind::select(settings);
        let authority = settings.environment().active_directory_endpoint.as_str();
        let resource = match settings.value(SettingKey::Resource) {
            "" => settings.environment().resource_manager_endpoint.clone(),
            resource => resource.to_string(),
        };

        debug!(credential = %kind, resource = %resource, "Building authorizer");

        let authorizer: Arc<dyn Authorizer> = match kind {
            CredentialKind::ClientSecret => {
                let credential = ClientSecretCredential::new(
                    http_client()?,
                    authority,
                    required(settings, SettingKey::TenantId, kind)?,
                    required(settings, SettingKey::ClientId, kind)?,
                    settings.trimmed(SettingKey::ClientSecret),
                );
                Arc::new(BearerAuthorizer::new(credential, resource))
            }
            CredentialKind::ClientCertificate => {
                return Err(AuthorizerError::Unsupported(format!(
                    "{kind} authentication ({} is set)",
                    SettingKey::CertificatePath.env_var()
                )));
            }
            CredentialKind::UsernamePassword => {
                let credential = UsernamePasswordCredential::new(
                    http_client()?,
                    authority,
                    required(settings, SettingKey::TenantId, kind)?,
                    required(settings, SettingKey::ClientId, kind)?,
                    settings.trimmed(SettingKey::Username),
                    settings.trimmed(SettingKey::Password),
                );
                Arc::new(BearerAuthorizer::new(credential, resource))
            }
            CredentialKind::ManagedIdentity => {
                let mut credential = ManagedIdentityCredential::new(http_client()?);
                if let Some(endpoint) = &self.managed_identity_endpoint {
                    credential = credential.with_endpoint(endpoint.clone());
                }
                match settings.trimmed(SettingKey::ClientId) {
                    "" => {}
                    client_id => credential = credential.with_client_id(client_id),
                }
                Arc::new(BearerAuthorizer::new(credential, resource))
            }
        };

        Ok(authorizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{CloudEnvironment, Environment};
    use reqwest::header::AUTHORIZATION;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken(&'static str);

    #[async_trait]
    impl TokenCredential for StaticToken {
        async fn get_token(&self, _resource: &str) -> Result<AccessToken, AuthorizerError> {
            Ok(AccessToken {
                token: self.0.to_string(),
                expires_in: None,
            })
        }
    }

    fn settings() -> Settings {
        Settings::new(CloudEnvironment::Public.descriptor())
    }

    fn token_response() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-mock",
            "expires_in": "3599"
        }))
    }

    async fn authorized_header(authorizer: &dyn Authorizer) -> String {
        let request = authorizer
            .authorize(reqwest::Client::new().get("https://management.azure.com/subscriptions"))
            .await
            .unwrap()
            .build()
            .unwrap();

        request
            .headers()
            .get(AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_credential_selection_order() {
        let all = settings()
            .with_value(SettingKey::ClientSecret, "secret")
            .with_value(SettingKey::CertificatePath, "/cert.pem")
            .with_value(SettingKey::Username, "user")
            .with_value(SettingKey::Password, "pass");
        assert_eq!(CredentialKind::select(&all), CredentialKind::ClientSecret);

        let cert = settings()
            .with_value(SettingKey::CertificatePath, "/cert.pem")
            .with_value(SettingKey::Username, "user")
            .with_value(SettingKey::Password, "pass");
        assert_eq!(CredentialKind::select(&cert), CredentialKind::ClientCertificate);

        let user = settings()
            .with_value(SettingKey::Username, "user")
            .with_value(SettingKey::Password, "pass");
        assert_eq!(CredentialKind::select(&user), CredentialKind::UsernamePassword);

        let username_only = settings().with_value(SettingKey::Username, "user");
        assert_eq!(
            CredentialKind::select(&username_only),
            CredentialKind::ManagedIdentity
        );
    }

    #[test]
    fn test_client_secret_requires_tenant() {
        let settings = settings()
            .with_value(SettingKey::ClientSecret, "secret")
            .with_value(SettingKey::ClientId, "client-1");

        let err = DefaultAuthorizerFactory::new()
            .authorizer(&settings)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AuthorizerError::MissingSetting {
                setting: "AZURE_TENANT_ID",
                ..
            }
        ));
    }

    #[test]
    fn test_certificate_is_unsupported() {
        let settings = settings().with_value(SettingKey::CertificatePath, "/cert.pem");

        let err = DefaultAuthorizerFactory::new()
            .authorizer(&settings)
            .err()
            .unwrap();
        assert!(matches!(err, AuthorizerError::Unsupported(_)));
    }

    #[test]
    fn test_builds_managed_identity_without_settings() {
        assert!(DefaultAuthorizerFactory::new().authorizer(&settings()).is_ok());
    }

    #[tokio::test]
    async fn test_bearer_authorizer_sets_header() {
        let authorizer = BearerAuthorizer::new(StaticToken("tok-123"), "https://management.azure.com/");

        let request = authorizer
            .authorize(reqwest::Client::new().get("https://management.azure.com/subscriptions"))
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer tok-123"
        );
    }

    #[tokio::test]
    async fn test_secret_mount_newlines_never_reach_token_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/token"))
            .and(body_string_contains("client_id=client-1&client_secret=s3cret&"))
            .respond_with(token_response())
            .expect(1)
            .mount(&server)
            .await;

        let environment = Environment {
            name: "AzurePublicCloud".to_string(),
            resource_manager_endpoint: "https://management.azure.com/".to_string(),
            active_directory_endpoint: format!("{}/", server.uri()),
        };
        let settings = Settings::new(environment)
            .with_value(SettingKey::TenantId, "tenant-1\n")
            .with_value(SettingKey::ClientId, "client-1\n")
            .with_value(SettingKey::ClientSecret, "s3cret\n");

        let authorizer = DefaultAuthorizerFactory::new().authorizer(&settings).unwrap();
        assert_eq!(authorized_header(authorizer.as_ref()).await, "Bearer tok-mock");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(!body.contains("%0A"), "newline leaked into {body}");
        assert!(!body.contains("%0D"), "carriage return leaked into {body}");
    }

    #[tokio::test]
    async fn test_managed_identity_through_factory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(header("Metadata", "true"))
            .and(query_param("resource", "https://management.azure.com/"))
            .and(query_param("client_id", "uami-1"))
            .respond_with(token_response())
            .expect(1)
            .mount(&server)
            .await;

        let factory = DefaultAuthorizerFactory::new().with_managed_identity_endpoint(format!(
            "{}/metadata/identity/oauth2/token",
            server.uri()
        ));
        let settings = settings()
            .with_value(SettingKey::ClientId, "uami-1\n")
            .with_value(SettingKey::Resource, "https://management.azure.com/");

        let authorizer = factory.authorizer(&settings).unwrap();
        assert_eq!(authorized_header(authorizer.as_ref()).await, "Bearer tok-mock");
    }
}

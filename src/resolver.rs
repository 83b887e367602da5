//! Identity Resolution
//!
//! Resolves the subscription, tenant and client identity a controller runs
//! as, together with the cloud it targets and an authorizer for that cloud's
//! management plane. Resolution runs once at startup; every failure is fatal.

use std::sync::Arc;

use reqwest::RequestBuilder;
use tracing::{debug, info};

use crate::authorizer::{Authorizer, AuthorizerFactory, DefaultAuthorizerFactory};
use crate::environment::{dns_zone_for_environment, CloudEnvironment};
use crate::error::{AuthorizerError, ResolveError};
use crate::settings::{EnvSettingsProvider, SettingKey, SettingsProvider};

/// Resolved cloud identity
///
/// Immutable once built. Resolving again produces a new bundle.
#[derive(Clone)]
pub struct IdentityBundle {
    authorizer: Arc<dyn Authorizer>,
    environment_name: String,
    resource_manager_endpoint: String,
    resource_manager_dns_suffix: &'static str,
    subscription_id: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl IdentityBundle {
    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    /// Attach this identity's credentials to an outbound request
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthorizerError> {
        self.authorizer.authorize(request).await
    }

    /// The cloud environment the controller runs in
    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn resource_manager_endpoint(&self) -> &str {
        &self.resource_manager_endpoint
    }

    /// DNS zone suffix for VM public addresses in the target cloud
    pub fn resource_manager_dns_suffix(&self) -> &str {
        self.resource_manager_dns_suffix
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl std::fmt::Debug for IdentityBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.client_secret.is_empty() {
            ""
        } else {
            "<redacted>"
        };

        f.debug_struct("IdentityBundle")
            .field("environment_name", &self.environment_name)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("resource_manager_dns_suffix", &self.resource_manager_dns_suffix)
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &secret)
            .finish_non_exhaustive()
    }
}

/// Single-shot resolver over a settings source and an authorizer factory
pub struct IdentityResolver<P = EnvSettingsProvider, F = DefaultAuthorizerFactory> {
    settings: P,
    authorizers: F,
}

impl IdentityResolver {
    /// Resolver over the process environment and the default credential chain
    pub fn from_env() -> Self {
        Self::new(EnvSettingsProvider::new(), DefaultAuthorizerFactory::new())
    }
}

impl<P, F> IdentityResolver<P, F>
where
    P: SettingsProvider,
    F: AuthorizerFactory,
{
    pub fn new(settings: P, authorizers: F) -> Self {
        Self {
            settings,
            authorizers,
        }
    }

    /// Resolve the controller identity.
    ///
    /// A non-empty `subscription_id_hint` wins over the ambient default.
    /// No partial bundle is returned on failure and nothing is retried.
    pub fn resolve(&self, subscription_id_hint: &str) -> Result<IdentityBundle, ResolveError> {
        let mut settings = self.settings.ambient_settings()?;

        let subscription_id = if subscription_id_hint.is_empty() {
            match settings.subscription_id() {
                "" => return Err(ResolveError::MissingSubscription),
                ambient => ambient.to_string(),
            }
        } else {
            subscription_id_hint.to_string()
        };

        let tenant_id = settings.trimmed(SettingKey::TenantId).to_string();
        let client_id = settings.trimmed(SettingKey::ClientId).to_string();
        let client_secret = settings.trimmed(SettingKey::ClientSecret).to_string();

        let environment_name = match settings.value(SettingKey::EnvironmentName) {
            "" => CloudEnvironment::Public.name().to_string(),
            name => name.to_string(),
        };

        let resource_manager_endpoint = settings.environment().resource_manager_endpoint.clone();
        let resource_manager_dns_suffix = dns_zone_for_environment(&environment_name);

        // The factory reads these from the settings, so they must be in place first.
        settings.set(SettingKey::SubscriptionId, subscription_id.clone());
        settings.set(SettingKey::TenantId, tenant_id.clone());

        debug!(
            subscription_id = %subscription_id,
            environment = %environment_name,
            "Requesting authorizer"
        );
        let authorizer = self.authorizers.authorizer(&settings)?;

        info!(
            subscription_id = %subscription_id,
            tenant_id = %tenant_id,
            environment = %environment_name,
            endpoint = %resource_manager_endpoint,
            "Resolved cloud identity"
        );

        Ok(IdentityBundle {
            authorizer,
            environment_name,
            resource_manager_endpoint,
            resource_manager_dns_suffix,
            subscription_id,
            tenant_id,
            client_id,
            client_secret,
        })
    }
}

//! Ambient Settings
//!
//! Raw identity settings pulled from the environment the controller runs in.
//! No hardcoded credentials - everything comes from:
//! - Service principal env vars (`AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET`)
//! - Secret mounts projected into env vars
//! - Nothing at all, in which case managed identity is used

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use tracing::debug;

use crate::environment::{CloudEnvironment, Environment};
use crate::error::SettingsError;

/// Env var pointing at a JSON environment descriptor that overrides the named cloud
pub const ENVIRONMENT_FILEPATH_VAR: &str = "AZURE_ENVIRONMENT_FILEPATH";

/// Well-known setting keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    SubscriptionId,
    TenantId,
    ClientId,
    ClientSecret,
    CertificatePath,
    CertificatePassword,
    Username,
    Password,
    EnvironmentName,
    Resource,
}

impl SettingKey {
    pub const ALL: [SettingKey; 10] = [
        SettingKey::SubscriptionId,
        SettingKey::TenantId,
        SettingKey::ClientId,
        SettingKey::ClientSecret,
        SettingKey::CertificatePath,
        SettingKey::CertificatePassword,
        SettingKey::Username,
        SettingKey::Password,
        SettingKey::EnvironmentName,
        SettingKey::Resource,
    ];

    /// Environment variable the key is read from
    pub fn env_var(self) -> &'static str {
        match self {
            SettingKey::SubscriptionId => "AZURE_SUBSCRIPTION_ID",
            SettingKey::TenantId => "AZURE_TENANT_ID",
            SettingKey::ClientId => "AZURE_CLIENT_ID",
            SettingKey::ClientSecret => "AZURE_CLIENT_SECRET",
            SettingKey::CertificatePath => "AZURE_CERTIFICATE_PATH",
            SettingKey::CertificatePassword => "AZURE_CERTIFICATE_PASSWORD",
            SettingKey::Username => "AZURE_USERNAME",
            SettingKey::Password => "AZURE_PASSWORD",
            SettingKey::EnvironmentName => "AZURE_ENVIRONMENT",
            SettingKey::Resource => "AZURE_AD_RESOURCE",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.env_var())
    }
}

/// Settings read from the ambient environment
///
/// A plain value: the resolver owns its copy and hands it to the
/// authorizer factory explicitly.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<SettingKey, String>,
    environment: Environment,
}

impl Settings {
    pub fn new(environment: Environment) -> Self {
        Self {
            values: BTreeMap::new(),
            environment,
        }
    }

    /// Builder-style setter
    pub fn with_value(mut self, key: SettingKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: SettingKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Value for `key`, or the empty string when absent
    pub fn value(&self, key: SettingKey) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Value for `key` without trailing newlines
    ///
    /// Secret mounts projected into env vars often end in a newline that
    /// breaks request signing.
    pub fn trimmed(&self, key: SettingKey) -> &str {
        self.value(key).trim_end_matches(['\r', '\n'])
    }

    pub fn subscription_id(&self) -> &str {
        self.value(SettingKey::SubscriptionId)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }
}

// Secrets stay out of logs and panic messages.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: BTreeMap<&str, &str> = self
            .values
            .iter()
            .map(|(key, value)| {
                let shown = match key {
                    SettingKey::ClientSecret
                    | SettingKey::CertificatePassword
                    | SettingKey::Password => "<redacted>",
                    _ => value.as_str(),
                };
                (key.env_var(), shown)
            })
            .collect();

        f.debug_struct("Settings")
            .field("values", &values)
            .field("environment", &self.environment)
            .finish()
    }
}

/// Source of ambient settings
pub trait SettingsProvider {
    fn ambient_settings(&self) -> Result<Settings, SettingsError>;
}

impl<F> SettingsProvider for F
where
    F: Fn() -> Result<Settings, SettingsError>,
{
    fn ambient_settings(&self) -> Result<Settings, SettingsError> {
        self()
    }
}

fn read_process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Settings provider backed by environment variables
///
/// The lookup function is injectable so tests never touch the process env.
pub struct EnvSettingsProvider<L = fn(&str) -> Option<String>> {
    lookup: L,
}

impl EnvSettingsProvider {
    /// Read from the process environment
    pub fn new() -> Self {
        Self {
            lookup: read_process_env,
        }
    }
}

impl Default for EnvSettingsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> EnvSettingsProvider<L>
where
    L: Fn(&str) -> Option<String>,
{
    pub fn with_lookup(lookup: L) -> Self {
        Self { lookup }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn environment(&self) -> Result<Environment, SettingsError> {
        if let Some(path) = self.lookup(ENVIRONMENT_FILEPATH_VAR) {
            return load_environment_file(PathBuf::from(path));
        }

        match self.lookup(SettingKey::EnvironmentName.env_var()) {
            Some(name) => CloudEnvironment::from_name_ignore_case(&name)
                .map(CloudEnvironment::descriptor)
                .ok_or(SettingsError::UnknownEnvironment(name)),
            None => Ok(Environment::default()),
        }
    }
}

impl<L> SettingsProvider for EnvSettingsProvider<L>
where
    L: Fn(&str) -> Option<String>,
{
    fn ambient_settings(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::new(self.environment()?);

        for key in SettingKey::ALL {
            if let Some(value) = self.lookup(key.env_var()) {
                settings.set(key, value);
            }
        }

        // Store the canonical name so it maps to the same cloud as the descriptor.
        if let Some(cloud) = settings
            .get(SettingKey::EnvironmentName)
            .and_then(CloudEnvironment::from_name_ignore_case)
        {
            settings.set(SettingKey::EnvironmentName, cloud.name());
        }

        if settings.get(SettingKey::Resource).is_none() {
            let resource = settings.environment.resource_manager_endpoint.clone();
            settings.set(SettingKey::Resource, resource);
        }

        debug!(
            environment = %settings.environment.name,
            keys = settings.values.len(),
            "Loaded ambient settings"
        );

        Ok(settings)
    }
}

fn load_environment_file(path: PathBuf) -> Result<Environment, SettingsError> {
    debug!(path = %path.display(), "Loading environment descriptor from file");

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(source) => return Err(SettingsError::EnvironmentFile { path, source }),
    };

    serde_json::from_str(&contents)
        .map_err(|source| SettingsError::InvalidEnvironmentFile { path, source })
}

//! Cloud Environments
//!
//! The closed set of known clouds and the endpoints each one exposes.
//! Adding a cloud means adding one variant and one table row.

use serde::{Deserialize, Serialize};

/// DNS suffix used when the environment name is not a known cloud
pub const DEFAULT_DNS_SUFFIX: &str = "cloudapp.azure.com";

/// Known cloud environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloudEnvironment {
    China,
    German,
    #[default]
    Public,
    UsGovernment,
}

/// One row of the cloud table
struct CloudProfile {
    name: &'static str,
    dns_suffix: &'static str,
    resource_manager_endpoint: &'static str,
    active_directory_endpoint: &'static str,
}

const CHINA: CloudProfile = CloudProfile {
    name: "AzureChinaCloud",
    dns_suffix: "cloudapp.chinacloudapi.cn",
    resource_manager_endpoint: "https://management.chinacloudapi.cn/",
    active_directory_endpoint: "https://login.chinacloudapi.cn/",
};

const GERMAN: CloudProfile = CloudProfile {
    name: "AzureGermanCloud",
    dns_suffix: "cloudapp.microsoftazure.de",
    resource_manager_endpoint: "https://management.microsoftazure.de/",
    active_directory_endpoint: "https://login.microsoftonline.de/",
};

const PUBLIC: CloudProfile = CloudProfile {
    name: "AzurePublicCloud",
    dns_suffix: DEFAULT_DNS_SUFFIX,
    resource_manager_endpoint: "https://management.azure.com/",
    active_directory_endpoint: "https://login.microsoftonline.com/",
};

const US_GOVERNMENT: CloudProfile = CloudProfile {
    name: "AzureUSGovernmentCloud",
    dns_suffix: "cloudapp.usgovcloudapi.net",
    resource_manager_endpoint: "https://management.usgovcloudapi.net/",
    active_directory_endpoint: "https://login.microsoftonline.us/",
};

impl CloudEnvironment {
    pub const ALL: [CloudEnvironment; 4] = [
        CloudEnvironment::China,
        CloudEnvironment::German,
        CloudEnvironment::Public,
        CloudEnvironment::UsGovernment,
    ];

    fn profile(self) -> &'static CloudProfile {
        match self {
            CloudEnvironment::China => &CHINA,
            CloudEnvironment::German => &GERMAN,
            CloudEnvironment::Public => &PUBLIC,
            CloudEnvironment::UsGovernment => &US_GOVERNMENT,
        }
    }

    /// Look up a cloud by its exact name (e.g. `AzureChinaCloud`)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|env| env.name() == name)
    }

    /// Case-insensitive lookup, as accepted from `AZURE_ENVIRONMENT`
    pub fn from_name_ignore_case(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|env| env.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        self.profile().name
    }

    /// DNS zone suffix for public VM addresses in this cloud
    pub fn dns_suffix(self) -> &'static str {
        self.profile().dns_suffix
    }

    /// Full endpoint descriptor for this cloud
    pub fn descriptor(self) -> Environment {
        let profile = self.profile();
        Environment {
            name: profile.name.to_string(),
            resource_manager_endpoint: profile.resource_manager_endpoint.to_string(),
            active_directory_endpoint: profile.active_directory_endpoint.to_string(),
        }
    }
}

impl std::fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Returns the DNS zone to use for the given environment name.
///
/// Total over all strings: anything that is not exactly a known cloud name
/// (including the empty string) maps to the public cloud suffix.
pub fn dns_zone_for_environment(environment_name: &str) -> &'static str {
    CloudEnvironment::from_name(environment_name)
        .unwrap_or_default()
        .dns_suffix()
}

/// Endpoints of the cloud the settings resolved to
///
/// Serialized field names match the environment override file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    pub resource_manager_endpoint: String,
    pub active_directory_endpoint: String,
}

impl Default for Environment {
    fn default() -> Self {
        CloudEnvironment::Public.descriptor()
    }
}

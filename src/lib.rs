//! Cloud Identity Library
//!
//! Resolves which cloud a controller targets and the identity it runs as,
//! producing an immutable [`IdentityBundle`] with a request authorizer and
//! the cloud's management endpoints.
//!
//! ```no_run
//! use cloud_identity::IdentityResolver;
//!
//! let bundle = IdentityResolver::from_env().resolve("")?;
//! println!("{} in {}", bundle.subscription_id(), bundle.environment_name());
//! # Ok::<(), cloud_identity::ResolveError>(())
//! ```

pub mod authorizer;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod resolver;
pub mod settings;

pub use authorizer::{Authorizer, AuthorizerFactory, DefaultAuthorizerFactory};
pub use environment::{dns_zone_for_environment, CloudEnvironment, Environment};
pub use error::{AuthorizerError, ResolveError, SettingsError};
pub use resolver::{IdentityBundle, IdentityResolver};
pub use settings::{EnvSettingsProvider, SettingKey, Settings, SettingsProvider};

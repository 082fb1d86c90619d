//! parboot configuration layer
//!
//! Every environment read lives here; the bootstrap works on captured structs.
//!
//! - `env_keys`: key constants (the `PAR_*` wire format)
//! - `loader`: env_raw, env_optional, env_bool, set/remove wrappers
//! - `namespace`: `Namespace`, `GlobalOverrides`, `EnvOverlay`
//! - `schema`: `ObservabilityConfig`

pub mod env_keys;
pub mod loader;
pub mod namespace;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_raw, is_truthy, remove_env_var, set_env_var};
pub use namespace::{EnvOverlay, GlobalOverrides, InitOutcome, Namespace, INITIALIZED_TRUE};
pub use schema::ObservabilityConfig;

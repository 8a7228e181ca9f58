//! TAXII service configuration.
//!
//! ```text
//! ServiceConfig ──owns──▶ ServerConfig (by name) ──owns──▶ FeedConfig (by id)
//!                                                          └─▶ repository source (by name)
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`model`] | Typed configuration and editing operations |
//! | [`validate`] | Service, server, and feed validation rules |
//! | [`legacy`] | Upgrade of the flat single-server shape |
//! | [`options`] | Declared options, defaults, loading, display |
//! | [`persist`] | Storage of the configuration in SQLite |

pub mod legacy;
pub mod model;
pub mod options;
pub mod persist;
pub mod validate;

pub use model::{feed_key, FeedConfig, ServerConfig, ServiceConfig};
pub use options::{display_config, load_service_config, LoadedConfig};
pub use persist::ConfigRepository;
pub use validate::{FeedForm, ServerForm, ServiceForm};

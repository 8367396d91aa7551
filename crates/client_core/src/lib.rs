//! Client-side state for the fleet maintenance backend: remote collections,
//! the search/refetch view-model bound to them, and the type-ahead and
//! dashboard helpers the entity pages use.

pub mod autocomplete;
pub mod collection;
pub mod config;
pub mod dashboard;
pub mod debounce;
pub mod error;
pub mod http;
pub mod view_model;

pub use autocomplete::Autocomplete;
pub use collection::{CollectionPayload, MutableCollection, RemoteCollection};
pub use config::{load_settings, load_settings_from, Settings};
pub use dashboard::{load_dashboard, DashboardError, DashboardSummary};
pub use debounce::Debouncer;
pub use error::CollectionError;
pub use http::HttpCollection;
pub use view_model::{CollectionState, CollectionViewModel, FetchOutcome};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

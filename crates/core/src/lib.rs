pub mod config;
pub mod fingerprint;
pub mod listing;
pub mod metrics;
pub mod notifier;
pub mod registry;
pub mod renderer;
pub mod runner;
pub mod store;
pub mod testing;
pub mod tracker;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use fingerprint::{fingerprint, SearchFingerprint, SearchKeys};
pub use listing::{Extraction, Listing, ListingExtractor};
pub use notifier::{create_notifier, Notifier, NotifyError, SearchAlert};
pub use registry::Registry;
pub use renderer::{HttpRenderer, PageRenderer, RenderError, RenderedPage};
pub use runner::{RunError, RunPolicy, RunReport, ScanRunner, SearchOutcome};
pub use store::{
    connect, connect_backend, KvBackend, ScanStatus, SearchMetadata, SearchStore, StoreError,
};
pub use tracker::{Evaluation, Tracker};

//! Shared data model, destination tables, and configuration for the Complyze
//! AI interception proxy.
//!
//! This crate has no network or filesystem-polling code of its own; it is the
//! thing every other crate in the workspace depends on so that settings,
//! classification results, and activity events all agree on one shape.

mod config;
mod domains;
mod model;
mod pinning;

pub use config::{
    load_runtime_config, ConfigError, ConfigOverrides, EnforcementMode, RuntimeConfig, Settings,
};
pub use domains::{
    classify_destination, is_api_domain, is_desktop_app_domain, is_passthrough_domain,
    is_web_ui_domain, DestinationClass, API_DOMAINS, WEB_UI_DOMAINS,
};
pub use model::{
    ActivityEvent, Category, ClassificationResult, EnforcementAction, RiskCategory,
    ACTIVITY_EVENT_SCHEMA_VERSION,
};
pub use pinning::{PinningMode, PinningRecord};

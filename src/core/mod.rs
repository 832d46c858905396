//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod log;
pub mod metric;
pub mod model;
pub mod orchestrator;
pub mod record;
pub mod scale;
pub(crate) mod serde_util;
pub mod source;
pub mod table;
pub mod view_state;

// Re-export main types for cleaner imports
pub use error::FetchError;
pub use lifecycle::{TriggerOutcome, UpdateLifecycle, UpdateStatus};
pub use model::{
    CountryMetric, DashboardSnapshot, IndustryMetric, SectorMetric, TariffMeasure, TimePoint,
};
pub use orchestrator::{DashboardState, DataOrchestrator};
pub use record::{FieldValue, Record};
pub use source::DashboardSource;
pub use table::{SortDirection, SortSpec};
pub use view_state::ViewState;

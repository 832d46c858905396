//! Prioritized lookup of quantities that upstream payloads name inconsistently.

use super::record::{FieldValue, Record};

/// Priority lists for each conceptual quantity. The first field present on a
/// record wins.
pub mod quantity {
    /// Magnitude used for map intensity and marker size.
    pub const MAGNITUDE: &[&str] = &["value", "tariff_impact", "trade_deficit"];
    /// Applied tariff rate in percent.
    pub const TARIFF_RATE: &[&str] = &["effective_tariff", "average_tariff", "initial_tariff"];
    pub const JOBS: &[&str] = &["jobs_impact"];
    /// Slice size for sector breakdowns.
    pub const SHARE: &[&str] = &["percentage", "trade_volume"];
    /// Trade balance; older payloads call it `bea_balance`.
    pub const BALANCE: &[&str] = &["balance", "bea_balance", "trade_balance"];
    pub const RISK: &[&str] = &["supply_chain_risk"];
}

/// Returns the first field in `fields` holding a finite number, or `default`.
pub fn first_present<R: Record>(record: &R, fields: &[&str], default: f64) -> f64 {
    find_present(record, fields).unwrap_or(default)
}

/// Like [`first_present`] but reports absence instead of substituting a default.
pub fn find_present<R: Record>(record: &R, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|name| match record.field(name) {
        Some(FieldValue::Number(n)) if n.is_finite() => Some(n),
        _ => None,
    })
}

//! Record schemas for the dashboard payloads and the snapshot built from them.

use super::record::{FieldValue, Record, field_from_value, number, text};
use super::serde_util::{
    lenient_f64, lenient_list, lenient_object, lenient_string, lenient_vec, number_from_value,
    records_from_value, string_list, string_or_number,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Per-country metrics, as served by the heatmap and detail-table resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryMetric {
    #[serde(alias = "code", deserialize_with = "string_or_number")]
    pub country_code: String,
    #[serde(default, alias = "name")]
    pub country_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tariff_impact: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jobs_impact: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub supply_chain_risk: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub trade_deficit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub exports: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub imports: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub initial_tariff: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub effective_tariff: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CountryMetric {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            country_code: code.to_string(),
            country_name: name.to_string(),
            ..Default::default()
        }
    }

    /// Display name, falling back to the code when the payload has no name.
    pub fn display_name(&self) -> &str {
        if self.country_name.trim().is_empty() {
            &self.country_code
        } else {
            &self.country_name
        }
    }

    /// Fills every field this record lacks from `other`. Present values win.
    pub fn fill_missing_from(&mut self, other: &CountryMetric) {
        if self.country_name.trim().is_empty() {
            self.country_name = other.country_name.clone();
        }
        if self.region.is_none() {
            self.region = other.region.clone();
        }
        for (mine, theirs) in [
            (&mut self.lat, other.lat),
            (&mut self.lng, other.lng),
            (&mut self.value, other.value),
            (&mut self.tariff_impact, other.tariff_impact),
            (&mut self.jobs_impact, other.jobs_impact),
            (&mut self.supply_chain_risk, other.supply_chain_risk),
            (&mut self.trade_deficit, other.trade_deficit),
            (&mut self.exports, other.exports),
            (&mut self.imports, other.imports),
            (&mut self.initial_tariff, other.initial_tariff),
            (&mut self.effective_tariff, other.effective_tariff),
        ] {
            if mine.is_none() {
                *mine = theirs;
            }
        }
        for (key, value) in &other.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl Record for CountryMetric {
    const SEARCH_FIELDS: &'static [&'static str] = &["country_name", "country_code", "region"];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "country_code" | "code" => Some(FieldValue::Text(&self.country_code)),
            "country_name" | "name" => Some(FieldValue::Text(self.display_name())),
            "region" => text(self.region.as_deref()),
            "lat" => number(self.lat),
            "lng" => number(self.lng),
            "value" => number(self.value),
            "tariff_impact" => number(self.tariff_impact),
            "jobs_impact" => number(self.jobs_impact),
            "supply_chain_risk" => number(self.supply_chain_risk),
            "trade_deficit" => number(self.trade_deficit),
            "exports" => number(self.exports),
            "imports" => number(self.imports),
            "initial_tariff" => number(self.initial_tariff),
            "effective_tariff" => number(self.effective_tariff),
            other => self.extra.get(other).and_then(field_from_value),
        }
    }
}

/// Per-industry metrics from the detail table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryMetric {
    #[serde(alias = "code", deserialize_with = "string_or_number")]
    pub industry_code: String,
    #[serde(default, alias = "name")]
    pub industry_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sector: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub initial_tariff: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub effective_tariff: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub trade_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gva_impact: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jobs_impact: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IndustryMetric {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            industry_code: code.to_string(),
            industry_name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        if self.industry_name.trim().is_empty() {
            &self.industry_code
        } else {
            &self.industry_name
        }
    }
}

impl Record for IndustryMetric {
    const SEARCH_FIELDS: &'static [&'static str] = &["industry_name", "sector", "industry_code"];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "industry_code" | "code" => Some(FieldValue::Text(&self.industry_code)),
            "industry_name" | "name" => Some(FieldValue::Text(self.display_name())),
            "sector" => text(self.sector.as_deref()),
            "initial_tariff" => number(self.initial_tariff),
            "effective_tariff" => number(self.effective_tariff),
            "trade_volume" => number(self.trade_volume),
            "gva_impact" => number(self.gva_impact),
            "jobs_impact" => number(self.jobs_impact),
            other => self.extra.get(other).and_then(field_from_value),
        }
    }
}

/// Aggregated metrics for one economic sector (pie chart slice).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorMetric {
    #[serde(alias = "name")]
    pub sector: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub trade_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_tariff: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub jobs_impact: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Record for SectorMetric {
    const SEARCH_FIELDS: &'static [&'static str] = &["sector"];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "sector" | "name" => Some(FieldValue::Text(&self.sector)),
            "percentage" => number(self.percentage),
            "trade_volume" => number(self.trade_volume),
            "average_tariff" => number(self.average_tariff),
            "jobs_impact" => number(self.jobs_impact),
            other => self.extra.get(other).and_then(field_from_value),
        }
    }
}

/// One year of the historical series. The series names come from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    #[serde(deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(flatten)]
    pub series: BTreeMap<String, Value>,
}

impl TimePoint {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(number_from_value)
    }

    /// Names of the series that carry a numeric value at this point.
    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series
            .iter()
            .filter(|(_, v)| number_from_value(v).is_some())
            .map(|(k, _)| k.as_str())
    }
}

impl Record for TimePoint {
    const SEARCH_FIELDS: &'static [&'static str] = &["year"];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "year" => Some(FieldValue::Text(&self.year)),
            other => self.value(other).map(FieldValue::Number),
        }
    }
}

/// A published tariff measure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffMeasure {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publication_date: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub affected_countries: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub affected_industries: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tariff_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl Record for TariffMeasure {
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "tariff_type", "status", "id"];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Text(&self.id)),
            "title" => Some(FieldValue::Text(&self.title)),
            "publication_date" => text(self.publication_date.as_deref()),
            "tariff_type" => text(self.tariff_type.as_deref()),
            "status" => text(self.status.as_deref()),
            _ => None,
        }
    }
}

/// Provenance block attached to the composite payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub generated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_updated: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub data_sources: Vec<String>,
}

/// Country and industry rows of the detail table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailTable {
    #[serde(default, deserialize_with = "lenient_list")]
    pub countries: Vec<CountryMetric>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub industries: Vec<IndustryMetric>,
}

impl DetailTable {
    /// Builds a table from either the nested `{countries, industries}` shape or
    /// a flat array of rows, split by whether a row carries an industry code.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(rows) => {
                let (industries, countries): (Vec<Value>, Vec<Value>) = rows
                    .into_iter()
                    .partition(|row| row.get("industry_code").is_some());
                DetailTable {
                    countries: records_from_value(Value::Array(countries)),
                    industries: records_from_value(Value::Array(industries)),
                }
            }
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => DetailTable::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() && self.industries.is_empty()
    }
}

fn lenient_detail_table<'de, D>(deserializer: D) -> Result<Option<DetailTable>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(DetailTable::from_value))
}

/// The single aggregate response from `/api/dashboard`. Every part is optional
/// because deployments may serve only a subset of it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompositePayload {
    #[serde(default, alias = "heatmap", deserialize_with = "lenient_vec")]
    pub heatmap_data: Option<Vec<CountryMetric>>,
    #[serde(default, alias = "sectors", deserialize_with = "lenient_vec")]
    pub sector_data: Option<Vec<SectorMetric>>,
    #[serde(default, alias = "timeseries", deserialize_with = "lenient_vec")]
    pub time_series: Option<Vec<TimePoint>>,
    #[serde(default, alias = "table", deserialize_with = "lenient_detail_table")]
    pub detail_table: Option<DetailTable>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub metadata: Option<SourceMetadata>,
}

/// Which of the four sub-collections a composite payload lacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissingCollections {
    pub heatmap: bool,
    pub sectors: bool,
    pub time_series: bool,
    pub detail_table: bool,
}

impl MissingCollections {
    pub fn all() -> Self {
        Self {
            heatmap: true,
            sectors: true,
            time_series: true,
            detail_table: true,
        }
    }

    pub fn any(&self) -> bool {
        self.heatmap || self.sectors || self.time_series || self.detail_table
    }
}

impl CompositePayload {
    pub fn missing(&self) -> MissingCollections {
        MissingCollections {
            heatmap: self.heatmap_data.is_none(),
            sectors: self.sector_data.is_none(),
            time_series: self.time_series.is_none(),
            detail_table: self.detail_table.is_none(),
        }
    }
}

/// Acknowledgement of `POST /api/update`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshAck {
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

/// Response of the service's `/health` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_data_refresh: Option<String>,
}

/// One complete, immutable set of dashboard collections.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub countries: Vec<CountryMetric>,
    pub industries: Vec<IndustryMetric>,
    pub sectors: Vec<SectorMetric>,
    pub time_series: Vec<TimePoint>,
    pub metadata: Option<SourceMetadata>,
    pub fetched_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn empty() -> Self {
        Self {
            countries: Vec::new(),
            industries: Vec::new(),
            sectors: Vec::new(),
            time_series: Vec::new(),
            metadata: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
            && self.industries.is_empty()
            && self.sectors.is_empty()
            && self.time_series.is_empty()
    }

    pub fn country(&self, code: &str) -> Option<&CountryMetric> {
        self.countries
            .iter()
            .find(|c| c.country_code.eq_ignore_ascii_case(code))
    }

    pub fn industry(&self, code: &str) -> Option<&IndustryMetric> {
        self.industries.iter().find(|i| {
            i.industry_code.eq_ignore_ascii_case(code) || i.industry_name.eq_ignore_ascii_case(code)
        })
    }

    /// Union of series names across all time points, sorted.
    pub fn series_names(&self) -> BTreeSet<String> {
        self.time_series
            .iter()
            .flat_map(|p| p.series_names().map(str::to_string))
            .collect()
    }
}

//! Fetches dashboard snapshots and owns the state derived views read from.

use super::error::FetchError;
use super::model::{
    CompositePayload, CountryMetric, DashboardSnapshot, DetailTable, HealthStatus, RefreshAck,
    TariffMeasure,
};
use super::source::DashboardSource;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

pub const LOAD_ERROR_MESSAGE: &str = "Failed to load dashboard data";
pub const MEASURES_ERROR_MESSAGE: &str = "Failed to load tariff measures";

/// Everything consumers observe about the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// Last good snapshot. Survives failed loads.
    pub snapshot: Option<Arc<DashboardSnapshot>>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub measures: Vec<TariffMeasure>,
    in_flight: usize,
    applied_snapshot: u64,
    applied_error: u64,
    applied_measures: u64,
}

/// Loads snapshots from a [`DashboardSource`] and publishes them through a
/// watch channel.
pub struct DataOrchestrator {
    source: Arc<dyn DashboardSource>,
    state: watch::Sender<DashboardState>,
    next_snapshot: AtomicU64,
    next_measures: AtomicU64,
    closed: AtomicBool,
}

impl DataOrchestrator {
    pub fn new(source: Arc<dyn DashboardSource>) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            source,
            state,
            next_snapshot: AtomicU64::new(0),
            next_measures: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn current_snapshot(&self) -> Option<Arc<DashboardSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    /// Stops applying results. Loads still running finish but leave the state alone.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fetches a fresh snapshot. With `force_refresh` the service is asked to
    /// recompute first and the read waits for that call to finish.
    ///
    /// Failures are recorded in the state as a user-facing message and the
    /// previous snapshot is kept.
    #[instrument(name = "LoadSnapshot", skip(self))]
    pub async fn load_snapshot(
        &self,
        force_refresh: bool,
    ) -> Result<Arc<DashboardSnapshot>, FetchError> {
        let request = self.begin(&self.next_snapshot);

        match self.fetch_snapshot(force_refresh).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let applied = self.finish(|state| {
                    if request <= state.applied_snapshot {
                        return false;
                    }
                    state.applied_snapshot = request;
                    state.snapshot = Some(Arc::clone(&snapshot));
                    // An error from a newer attempt still stands.
                    if request > state.applied_error {
                        state.applied_error = request;
                        state.error = None;
                    }
                    true
                });
                if applied {
                    info!(
                        countries = snapshot.countries.len(),
                        industries = snapshot.industries.len(),
                        sectors = snapshot.sectors.len(),
                        points = snapshot.time_series.len(),
                        "Dashboard snapshot loaded"
                    );
                } else {
                    debug!(request, "Discarding superseded snapshot");
                }
                Ok(snapshot)
            }
            Err(e) => {
                error!(error = %e, "Failed to load dashboard snapshot");
                self.finish(|state| {
                    if request <= state.applied_snapshot || request <= state.applied_error {
                        return false;
                    }
                    state.applied_error = request;
                    state.error = Some(LOAD_ERROR_MESSAGE.to_string());
                    true
                });
                Err(e)
            }
        }
    }

    /// Fetches the recent tariff measures into the state.
    #[instrument(name = "LoadMeasures", skip(self))]
    pub async fn load_measures(&self) -> Result<Vec<TariffMeasure>, FetchError> {
        let request = self.begin(&self.next_measures);
        match self.source.fetch_measures().await {
            Ok(measures) => {
                self.finish(|state| {
                    if request <= state.applied_measures {
                        return false;
                    }
                    state.applied_measures = request;
                    state.measures = measures.clone();
                    true
                });
                Ok(measures)
            }
            Err(e) => {
                error!(error = %e, "Failed to load tariff measures");
                self.finish(|state| {
                    if request <= state.applied_measures {
                        return false;
                    }
                    state.applied_measures = request;
                    state.error = Some(MEASURES_ERROR_MESSAGE.to_string());
                    true
                });
                Err(e)
            }
        }
    }

    /// Asks the service to recompute. Does not touch the snapshot.
    pub async fn request_update(&self) -> Result<RefreshAck, FetchError> {
        self.source.trigger_refresh().await
    }

    pub async fn health(&self) -> Result<HealthStatus, FetchError> {
        self.source.health().await
    }

    /// Enters the loading state and returns the request's place in `sequence`.
    fn begin(&self, sequence: &AtomicU64) -> u64 {
        let request = sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.in_flight += 1;
            state.is_loading = true;
        });
        request
    }

    /// Leaves the loading state and runs `update` unless the orchestrator is
    /// closed. `update` decides whether its result is still current and
    /// returns whether it changed anything.
    fn finish(&self, update: impl FnOnce(&mut DashboardState) -> bool) -> bool {
        let mut applied = false;
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.is_loading = state.in_flight > 0;
            if !self.is_closed() {
                applied = update(state);
            }
        });
        applied
    }

    async fn fetch_snapshot(&self, force_refresh: bool) -> Result<DashboardSnapshot, FetchError> {
        if force_refresh {
            let ack = self.source.trigger_refresh().await?;
            info!(message = ?ack.message, "Server-side refresh completed");
        }

        let mut first_error = None;
        let composite = match self.source.fetch_composite().await {
            Ok(Some(composite)) => Some(composite),
            Ok(None) => {
                debug!("Composite payload absent");
                None
            }
            Err(e) => {
                warn!(error = %e, "Composite fetch failed; using per-resource endpoints");
                first_error = Some(e);
                None
            }
        };
        let composite_ok = composite.is_some();
        let composite = composite.unwrap_or_default();
        let missing = composite.missing();

        if !missing.any() {
            debug!("Composite payload complete");
            return Ok(assemble(composite));
        }
        debug!(?missing, "Fetching missing collections individually");

        let (heatmap, sectors, time_series, detail) = futures::join!(
            constituent(missing.heatmap, self.source.fetch_heatmap()),
            constituent(missing.sectors, self.source.fetch_sectors()),
            constituent(missing.time_series, self.source.fetch_time_series()),
            constituent(missing.detail_table, self.fetch_detail_with_fallback()),
        );

        let mut any_succeeded = composite_ok;
        let mut merged = composite;
        if let Some(result) = heatmap {
            merged.heatmap_data = Some(settle("heatmap", result, &mut first_error, &mut any_succeeded));
        }
        if let Some(result) = sectors {
            merged.sector_data = Some(settle("sectors", result, &mut first_error, &mut any_succeeded));
        }
        if let Some(result) = time_series {
            merged.time_series = Some(settle("timeseries", result, &mut first_error, &mut any_succeeded));
        }
        if let Some(result) = detail {
            merged.detail_table = Some(settle("table", result, &mut first_error, &mut any_succeeded));
        }

        match first_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(assemble(merged)),
        }
    }

    /// `/api/table`, or the country and industry lists when that fails.
    async fn fetch_detail_with_fallback(&self) -> Result<DetailTable, FetchError> {
        let table_error = match self.source.fetch_detail_table().await {
            Ok(table) => return Ok(table),
            Err(e) => e,
        };
        warn!(error = %table_error, "Detail table fetch failed; trying country and industry lists");

        let (countries, industries) = futures::join!(
            self.source.fetch_countries(),
            self.source.fetch_industries()
        );
        if countries.is_err() && industries.is_err() {
            return Err(table_error);
        }
        Ok(DetailTable {
            countries: countries.unwrap_or_default(),
            industries: industries.unwrap_or_default(),
        })
    }
}

/// Runs `fetch` only when the collection is needed.
async fn constituent<T>(
    needed: bool,
    fetch: impl Future<Output = Result<T, FetchError>>,
) -> Option<Result<T, FetchError>> {
    if needed { Some(fetch.await) } else { None }
}

/// Unwraps a constituent result, defaulting to empty on failure.
fn settle<T: Default>(
    name: &str,
    result: Result<T, FetchError>,
    first_error: &mut Option<FetchError>,
    any_succeeded: &mut bool,
) -> T {
    match result {
        Ok(value) => {
            *any_succeeded = true;
            value
        }
        Err(e) => {
            warn!(resource = name, error = %e, "Constituent fetch failed; using empty collection");
            first_error.get_or_insert(e);
            T::default()
        }
    }
}

fn assemble(payload: CompositePayload) -> DashboardSnapshot {
    let detail = payload.detail_table.unwrap_or_default();
    DashboardSnapshot {
        countries: merge_countries(payload.heatmap_data.unwrap_or_default(), detail.countries),
        industries: detail.industries,
        sectors: payload.sector_data.unwrap_or_default(),
        time_series: payload.time_series.unwrap_or_default(),
        metadata: payload.metadata,
        fetched_at: Utc::now(),
    }
}

/// Heatmap rows form the base list; detail rows fill gaps by country code and
/// countries only the detail table knows are appended.
fn merge_countries(base: Vec<CountryMetric>, detail: Vec<CountryMetric>) -> Vec<CountryMetric> {
    let mut merged = base;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, c)| (c.country_code.to_uppercase(), i))
        .collect();

    for row in detail {
        let key = row.country_code.to_uppercase();
        match index.get(&key) {
            Some(&i) => merged[i].fill_missing_from(&row),
            None => {
                index.insert(key, merged.len());
                merged.push(row);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{IndustryMetric, SectorMetric, TimePoint};
    use crate::core::source::testing::MockSource;
    use std::sync::atomic::Ordering;

    fn country(code: &str) -> CountryMetric {
        CountryMetric::new(code, code)
    }

    fn sector(name: &str) -> SectorMetric {
        SectorMetric {
            sector: name.to_string(),
            ..Default::default()
        }
    }

    fn point(year: &str) -> TimePoint {
        TimePoint {
            year: year.to_string(),
            ..Default::default()
        }
    }

    fn full_composite() -> CompositePayload {
        CompositePayload {
            heatmap_data: Some(vec![country("CHN")]),
            sector_data: Some(vec![sector("Manufacturing")]),
            time_series: Some(vec![point("2024")]),
            detail_table: Some(DetailTable {
                countries: vec![country("MEX")],
                industries: vec![IndustryMetric::new("331", "Primary Metals")],
            }),
            metadata: None,
        }
    }

    fn constituent_calls(source: &MockSource) -> usize {
        ["heatmap", "sectors", "timeseries", "table", "countries", "industries"]
            .iter()
            .map(|name| source.calls(name))
            .sum()
    }

    #[tokio::test]
    async fn test_complete_composite_skips_constituents() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        let orchestrator = DataOrchestrator::new(source.clone());

        let snapshot = orchestrator.load_snapshot(false).await.unwrap();

        assert_eq!(source.calls("composite"), 1);
        assert_eq!(constituent_calls(&source), 0);
        assert_eq!(source.calls("refresh"), 0);
        let codes: Vec<&str> = snapshot.countries.iter().map(|c| c.country_code.as_str()).collect();
        assert_eq!(codes, vec!["CHN", "MEX"]);
        assert_eq!(snapshot.industries.len(), 1);
    }

    #[tokio::test]
    async fn test_only_missing_collections_are_fetched() {
        let source = Arc::new(MockSource {
            sectors: vec![sector("Agriculture"), sector("Energy")],
            ..Default::default()
        });
        let mut composite = full_composite();
        composite.sector_data = None;
        *source.composite.lock().unwrap() = Some(composite);
        let orchestrator = DataOrchestrator::new(source.clone());

        let snapshot = orchestrator.load_snapshot(false).await.unwrap();

        assert_eq!(source.calls("sectors"), 1);
        assert_eq!(constituent_calls(&source), 1);
        assert_eq!(snapshot.sectors.len(), 2);
        assert_eq!(snapshot.countries[0].country_code, "CHN");
    }

    #[tokio::test]
    async fn test_absent_composite_fetches_all_constituents() {
        let source = Arc::new(MockSource {
            heatmap: vec![country("CAN")],
            time_series: vec![point("2023"), point("2024")],
            ..Default::default()
        });
        let orchestrator = DataOrchestrator::new(source.clone());

        let snapshot = orchestrator.load_snapshot(false).await.unwrap();

        for name in ["heatmap", "sectors", "timeseries", "table"] {
            assert_eq!(source.calls(name), 1, "{name} should be fetched once");
        }
        assert_eq!(snapshot.countries.len(), 1);
        assert_eq!(snapshot.time_series.len(), 2);
        assert!(snapshot.sectors.is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_an_error() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(CompositePayload {
            heatmap_data: Some(vec![]),
            sector_data: Some(vec![]),
            time_series: Some(vec![]),
            detail_table: Some(DetailTable::default()),
            metadata: None,
        });
        let orchestrator = DataOrchestrator::new(source);

        let snapshot = orchestrator.load_snapshot(false).await.unwrap();

        assert!(snapshot.is_empty());
        assert!(orchestrator.state().error.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_snapshot() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        let orchestrator = DataOrchestrator::new(source.clone());
        let first = orchestrator.load_snapshot(false).await.unwrap();

        source.fail_composite.store(true, Ordering::SeqCst);
        source.fail_constituents.store(true, Ordering::SeqCst);
        let result = orchestrator.load_snapshot(false).await;

        assert!(result.is_err());
        let state = orchestrator.state();
        assert_eq!(state.error.as_deref(), Some(LOAD_ERROR_MESSAGE));
        assert!(!state.is_loading);
        assert_eq!(state.snapshot.unwrap(), first);
    }

    #[tokio::test]
    async fn test_partial_constituent_failure_defaults_to_empty() {
        let source = Arc::new(MockSource::default());
        let mut composite = full_composite();
        composite.sector_data = None;
        composite.time_series = None;
        *source.composite.lock().unwrap() = Some(composite);
        source.fail_constituents.store(true, Ordering::SeqCst);
        let orchestrator = DataOrchestrator::new(source.clone());

        let snapshot = orchestrator.load_snapshot(false).await.unwrap();

        assert!(snapshot.sectors.is_empty());
        assert!(snapshot.time_series.is_empty());
        assert_eq!(snapshot.countries.len(), 2);
        assert!(orchestrator.state().error.is_none());
    }

    #[tokio::test]
    async fn test_detail_table_falls_back_to_lists() {
        let source = Arc::new(MockSource {
            detail: DetailTable {
                countries: vec![country("JPN")],
                industries: vec![IndustryMetric::new("3361", "Motor Vehicles")],
            },
            ..Default::default()
        });
        let orchestrator = DataOrchestrator::new(source.clone());
        let table = orchestrator.fetch_detail_with_fallback().await.unwrap();
        assert_eq!(source.calls("countries"), 0);
        assert_eq!(table.industries.len(), 1);

        source.fail_constituents.store(true, Ordering::SeqCst);
        assert!(orchestrator.fetch_detail_with_fallback().await.is_err());
        assert_eq!(source.calls("countries"), 1);
        assert_eq!(source.calls("industries"), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_calls_refresh_first() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        let orchestrator = DataOrchestrator::new(source.clone());

        orchestrator.load_snapshot(true).await.unwrap();
        assert_eq!(source.calls("refresh"), 1);

        source.fail_refresh.store(true, Ordering::SeqCst);
        assert!(orchestrator.load_snapshot(true).await.is_err());
        assert_eq!(source.calls("composite"), 1);
    }

    #[tokio::test]
    async fn test_closed_orchestrator_ignores_results() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        let orchestrator = DataOrchestrator::new(source);
        orchestrator.close();

        assert!(orchestrator.load_snapshot(false).await.is_ok());
        let state = orchestrator.state();
        assert!(state.snapshot.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        let orchestrator = DataOrchestrator::new(source);
        let mut rx = orchestrator.subscribe();

        orchestrator.load_snapshot(false).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().snapshot.is_some());
    }

    #[tokio::test]
    async fn test_load_measures() {
        let source = Arc::new(MockSource {
            measures: vec![TariffMeasure {
                id: "M-1".to_string(),
                title: "Reciprocal tariffs".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let orchestrator = DataOrchestrator::new(source);

        let measures = orchestrator.load_measures().await.unwrap();

        assert_eq!(measures.len(), 1);
        assert_eq!(orchestrator.state().measures[0].id, "M-1");
    }

    #[tokio::test]
    async fn test_measures_load_does_not_discard_snapshot() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        source.gate_composite.store(true, Ordering::SeqCst);
        let orchestrator = Arc::new(DataOrchestrator::new(source.clone()));

        let snapshot_load = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.load_snapshot(false).await }
        });
        source.composite_started.notified().await;

        orchestrator.load_measures().await.unwrap();
        assert!(orchestrator.state().is_loading);

        source.composite_release.notify_one();
        let snapshot = snapshot_load.await.unwrap().unwrap();

        let state = orchestrator.state();
        assert_eq!(state.snapshot, Some(snapshot));
        assert!(state.error.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_older_success_applies_after_newer_failure() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        source.gate_composite.store(true, Ordering::SeqCst);
        let orchestrator = Arc::new(DataOrchestrator::new(source.clone()));

        let older = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.load_snapshot(false).await }
        });
        source.composite_started.notified().await;

        source.gate_composite.store(false, Ordering::SeqCst);
        source.fail_composite.store(true, Ordering::SeqCst);
        source.fail_constituents.store(true, Ordering::SeqCst);
        assert!(orchestrator.load_snapshot(false).await.is_err());
        assert_eq!(orchestrator.state().error.as_deref(), Some(LOAD_ERROR_MESSAGE));

        source.fail_composite.store(false, Ordering::SeqCst);
        source.fail_constituents.store(false, Ordering::SeqCst);
        source.composite_release.notify_one();
        let snapshot = older.await.unwrap().unwrap();

        let state = orchestrator.state();
        assert_eq!(state.snapshot, Some(snapshot));
        assert_eq!(state.error.as_deref(), Some(LOAD_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_override_newer_success() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(full_composite());
        source.gate_composite.store(true, Ordering::SeqCst);
        source.fail_composite.store(true, Ordering::SeqCst);
        source.fail_constituents.store(true, Ordering::SeqCst);
        let orchestrator = Arc::new(DataOrchestrator::new(source.clone()));

        let older = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.load_snapshot(false).await }
        });
        source.composite_started.notified().await;

        source.gate_composite.store(false, Ordering::SeqCst);
        source.fail_composite.store(false, Ordering::SeqCst);
        let snapshot = orchestrator.load_snapshot(false).await.unwrap();

        source.fail_composite.store(true, Ordering::SeqCst);
        source.composite_release.notify_one();
        assert!(older.await.unwrap().is_err());

        let state = orchestrator.state();
        assert_eq!(state.snapshot, Some(snapshot));
        assert!(state.error.is_none());
    }

    #[test]
    fn test_merge_countries_fills_and_appends() {
        let mut heat = country("CHN");
        heat.tariff_impact = Some(4.0);
        let mut detail_chn = country("chn");
        detail_chn.effective_tariff = Some(54.0);
        detail_chn.tariff_impact = Some(99.0);

        let merged = merge_countries(vec![heat], vec![detail_chn, country("VNM")]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].tariff_impact, Some(4.0));
        assert_eq!(merged[0].effective_tariff, Some(54.0));
        assert_eq!(merged[1].country_code, "VNM");
    }
}

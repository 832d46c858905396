use super::ui;
use crate::core::config::ViewConfig;
use crate::core::geo::{self, CoordinateSource};
use crate::core::metric::{find_present, first_present, quantity};
use crate::core::model::{CountryMetric, DashboardSnapshot, IndustryMetric, TariffMeasure};
use crate::core::orchestrator::{DataOrchestrator, LOAD_ERROR_MESSAGE, MEASURES_ERROR_MESSAGE};
use crate::core::scale::{self, RadiusScale};
use crate::core::table::{self, Page, SortDirection};
use crate::core::view_state::ViewState;
use anyhow::{Context, Result};
use comfy_table::Cell;
use tracing::debug;

pub const NO_DATA: &str = "No data available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    #[default]
    Countries,
    Industries,
    Sectors,
    Timeseries,
    Map,
    Measures,
}

#[derive(Debug, Clone)]
pub struct ShowOptions {
    pub view: View,
    pub query: Option<String>,
    pub sort: Option<String>,
    pub ascending: bool,
    pub page: usize,
    /// Ask the service to recompute before reading.
    pub refresh: bool,
    /// Codes to toggle, in order.
    pub select: Vec<String>,
}

impl Default for ShowOptions {
    fn default() -> Self {
        ShowOptions {
            view: View::default(),
            query: None,
            sort: None,
            ascending: false,
            page: 1,
            refresh: false,
            select: Vec::new(),
        }
    }
}

impl ShowOptions {
    pub(crate) fn view_state(&self, page_size: usize) -> ViewState {
        let mut state = ViewState::new(page_size);
        if let Some(query) = &self.query {
            state.set_query(query);
        }
        if let Some(key) = &self.sort {
            state.sort_by(key);
            if self.ascending {
                state.sort_direction = SortDirection::Ascending;
            }
        }
        state.set_page(self.page);
        state
    }

    /// Applies `select` as toggles in order. A code given twice ends up cleared.
    pub(crate) fn apply_selections(&self, state: &mut ViewState, snapshot: &DashboardSnapshot) {
        for code in &self.select {
            match self.view {
                View::Industries => {
                    state.toggle_industry(code, snapshot);
                }
                _ => {
                    state.toggle_country(code, snapshot);
                }
            }
        }
    }
}

pub async fn run(orchestrator: &DataOrchestrator, config: &ViewConfig, options: ShowOptions) -> Result<()> {
    let mut state = options.view_state(config.page_size);
    let spinner = ui::new_spinner("Loading dashboard data");

    let output = if options.view == View::Measures {
        let measures = orchestrator.load_measures().await;
        spinner.finish_and_clear();
        render_measures(&measures.context(MEASURES_ERROR_MESSAGE)?, &state)
    } else {
        let snapshot = orchestrator.load_snapshot(options.refresh).await;
        spinner.finish_and_clear();
        let snapshot = snapshot.context(LOAD_ERROR_MESSAGE)?;
        options.apply_selections(&mut state, &snapshot);
        debug!(?state, "Rendering view");
        render(options.view, &snapshot, &state)
    };

    println!("{output}");
    Ok(())
}

/// Renders one snapshot view. Measures are not part of the snapshot and are
/// rendered by [`render_measures`].
pub fn render(view: View, snapshot: &DashboardSnapshot, state: &ViewState) -> String {
    let body = match view {
        View::Countries => render_countries(snapshot, state),
        View::Industries => render_industries(snapshot, state),
        View::Sectors => render_sectors(snapshot, state),
        View::Timeseries => render_time_series(snapshot, state),
        View::Map => render_map(snapshot, state),
        View::Measures => return NO_DATA.to_string(),
    };
    format!("{}\n{body}", freshness_line(snapshot))
}

fn freshness_line(snapshot: &DashboardSnapshot) -> String {
    let updated = snapshot
        .metadata
        .as_ref()
        .and_then(|m| m.last_updated.clone())
        .unwrap_or_else(|| snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    ui::style_text(&format!("Data as of {updated}"), ui::StyleType::Subtle)
}

fn footer<T>(page: &Page<T>, noun: &str) -> String {
    ui::style_text(
        &format!(
            "Page {} of {} ({} {noun})",
            page.page, page.total_pages, page.total_items
        ),
        ui::StyleType::Subtle,
    )
}

fn render_countries(snapshot: &DashboardSnapshot, state: &ViewState) -> String {
    if snapshot.countries.is_empty() {
        return NO_DATA.to_string();
    }
    let rows = table::view(&snapshot.countries, &state.query, state.sort_spec().as_ref());
    let page = table::paginate(&rows, state.page, state.page_size);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Code"),
        ui::header_cell("Country"),
        ui::header_cell("Region"),
        ui::header_cell("Tariff (%)"),
        ui::header_cell("Tariff Impact"),
        ui::header_cell("Jobs Impact"),
        ui::header_cell("Trade Deficit"),
        ui::header_cell("Supply Risk"),
    ]);
    for country in &page.items {
        table.add_row(vec![
            ui::selection_cell(state.selected_country() == Some(country.country_code.as_str())),
            Cell::new(&country.country_code),
            Cell::new(country.display_name()),
            Cell::new(country.region.as_deref().unwrap_or("")),
            ui::format_optional_cell(find_present(*country, quantity::TARIFF_RATE), |v| format!("{v:.1}")),
            ui::format_optional_cell(country.tariff_impact, |v| format!("{v:.2}")),
            ui::format_optional_cell(country.jobs_impact, |v| format!("{v:.0}")),
            ui::format_optional_cell(country.trade_deficit, |v| format!("{v:.2}")),
            ui::format_optional_cell(country.supply_chain_risk, |v| format!("{v:.2}")),
        ]);
    }

    let mut output = format!("{table}\n{}", footer(&page, "countries"));
    if let Some(country) = state.selected_country().and_then(|code| snapshot.country(code)) {
        output.push_str(&country_detail(country));
    }
    output
}

fn country_detail(country: &CountryMetric) -> String {
    let (point, source) = geo::resolve_with_source(country);
    let location = match source {
        CoordinateSource::Fallback => "unknown".to_string(),
        _ => format!("{:.2}, {:.2}", point.lat, point.lng),
    };
    let fmt = |v: Option<f64>| v.map_or("N/A".to_string(), |v| format!("{v:.2}"));
    format!(
        "\n\n{} ({})\n  {} {}\n  {} {} -> {}\n  {} {} / {}\n  {} {}",
        ui::style_text(country.display_name(), ui::StyleType::Title),
        country.country_code,
        ui::style_text("Region:", ui::StyleType::Label),
        country.region.as_deref().unwrap_or("N/A"),
        ui::style_text("Tariff:", ui::StyleType::Label),
        fmt(country.initial_tariff),
        fmt(country.effective_tariff),
        ui::style_text("Exports / Imports:", ui::StyleType::Label),
        fmt(country.exports),
        fmt(country.imports),
        ui::style_text("Location:", ui::StyleType::Label),
        location,
    )
}

fn render_industries(snapshot: &DashboardSnapshot, state: &ViewState) -> String {
    if snapshot.industries.is_empty() {
        return NO_DATA.to_string();
    }
    let rows = table::view(&snapshot.industries, &state.query, state.sort_spec().as_ref());
    let page = table::paginate(&rows, state.page, state.page_size);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Code"),
        ui::header_cell("Industry"),
        ui::header_cell("Sector"),
        ui::header_cell("Initial (%)"),
        ui::header_cell("Effective (%)"),
        ui::header_cell("Trade Volume"),
        ui::header_cell("GVA Impact"),
        ui::header_cell("Jobs Impact"),
    ]);
    for industry in &page.items {
        table.add_row(vec![
            ui::selection_cell(state.selected_industry() == Some(industry.industry_code.as_str())),
            Cell::new(&industry.industry_code),
            Cell::new(industry.display_name()),
            Cell::new(industry.sector.as_deref().unwrap_or("")),
            ui::format_optional_cell(industry.initial_tariff, |v| format!("{v:.1}")),
            ui::format_optional_cell(industry.effective_tariff, |v| format!("{v:.1}")),
            ui::format_optional_cell(industry.trade_volume, |v| format!("{v:.2}")),
            ui::format_optional_cell(industry.gva_impact, |v| format!("{v:.2}")),
            ui::format_optional_cell(industry.jobs_impact, |v| format!("{v:.0}")),
        ]);
    }

    let mut output = format!("{table}\n{}", footer(&page, "industries"));
    if let Some(industry) = state.selected_industry().and_then(|code| snapshot.industry(code)) {
        output.push_str(&industry_detail(industry));
    }
    output
}

fn industry_detail(industry: &IndustryMetric) -> String {
    let change = match (industry.initial_tariff, industry.effective_tariff) {
        (Some(initial), Some(effective)) => format!("{:+.1} pts", effective - initial),
        _ => "N/A".to_string(),
    };
    format!(
        "\n\n{} ({})\n  {} {}\n  {} {}",
        ui::style_text(industry.display_name(), ui::StyleType::Title),
        industry.industry_code,
        ui::style_text("Sector:", ui::StyleType::Label),
        industry.sector.as_deref().unwrap_or("N/A"),
        ui::style_text("Tariff change:", ui::StyleType::Label),
        change,
    )
}

fn render_sectors(snapshot: &DashboardSnapshot, state: &ViewState) -> String {
    if snapshot.sectors.is_empty() {
        return NO_DATA.to_string();
    }
    let rows = table::view(&snapshot.sectors, &state.query, state.sort_spec().as_ref());
    let page = table::paginate(&rows, state.page, state.page_size);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Sector"),
        ui::header_cell("Share"),
        ui::header_cell("Avg Tariff (%)"),
        ui::header_cell("Jobs Impact"),
    ]);
    for sector in &page.items {
        table.add_row(vec![
            Cell::new(&sector.sector),
            ui::number_cell(first_present(*sector, quantity::SHARE, 0.0), 2),
            ui::format_optional_cell(find_present(*sector, quantity::TARIFF_RATE), |v| format!("{v:.1}")),
            ui::format_optional_cell(sector.jobs_impact, |v| format!("{v:.0}")),
        ]);
    }
    format!("{table}\n{}", footer(&page, "sectors"))
}

fn render_time_series(snapshot: &DashboardSnapshot, state: &ViewState) -> String {
    if snapshot.time_series.is_empty() {
        return NO_DATA.to_string();
    }
    let series = snapshot.series_names();
    let rows = table::view(&snapshot.time_series, &state.query, state.sort_spec().as_ref());
    let page = table::paginate(&rows, state.page, state.page_size);

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Year")];
    header.extend(series.iter().map(|name| ui::header_cell(name)));
    table.set_header(header);
    for point in &page.items {
        let mut row = vec![Cell::new(&point.year)];
        row.extend(
            series
                .iter()
                .map(|name| ui::format_optional_cell(point.value(name), |v| format!("{v:.2}"))),
        );
        table.add_row(row);
    }
    format!("{table}\n{}", footer(&page, "points"))
}

/// Marker placement and encoding for every country that passes the query.
fn render_map(snapshot: &DashboardSnapshot, state: &ViewState) -> String {
    if snapshot.countries.is_empty() {
        return NO_DATA.to_string();
    }
    let rows = table::view(&snapshot.countries, &state.query, state.sort_spec().as_ref());
    let magnitudes: Vec<f64> = rows
        .iter()
        .map(|c| first_present(*c, quantity::MAGNITUDE, 0.0))
        .collect();
    let (low, high) = scale::extent(magnitudes.iter().copied()).unwrap_or((0.0, 0.0));
    let max_abs = low.abs().max(high.abs());
    let radius = RadiusScale::default();

    let markers: Vec<(&CountryMetric, f64)> = rows.iter().copied().zip(magnitudes).collect();
    let page = table::paginate(&markers, state.page, state.page_size);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Country"),
        ui::header_cell("Lat"),
        ui::header_cell("Lng"),
        ui::header_cell("Source"),
        ui::header_cell("Magnitude"),
        ui::header_cell("Color"),
        ui::header_cell("Radius"),
    ]);
    for (country, magnitude) in &page.items {
        let (point, source) = geo::resolve_with_source(*country);
        table.add_row(vec![
            ui::selection_cell(state.selected_country() == Some(country.country_code.as_str())),
            Cell::new(country.display_name()),
            ui::number_cell(point.lat, 2),
            ui::number_cell(point.lng, 2),
            Cell::new(source_label(source)),
            ui::number_cell(*magnitude, 2),
            ui::swatch_cell(scale::color_for(*magnitude, low, high)),
            ui::number_cell(radius.radius_for(*magnitude, max_abs), 1),
        ]);
    }

    let bounds = geo::compute_bounds(rows.iter().copied());
    let center = bounds.center();
    format!(
        "{table}\n{}\n{} lat {:.1}..{:.1}, lng {:.1}..{:.1} (center {:.1}, {:.1})",
        footer(&page, "countries"),
        ui::style_text("Bounds:", ui::StyleType::Label),
        bounds.south,
        bounds.north,
        bounds.west,
        bounds.east,
        center.lat,
        center.lng,
    )
}

fn source_label(source: CoordinateSource) -> &'static str {
    match source {
        CoordinateSource::Embedded => "payload",
        CoordinateSource::Reference => "reference",
        CoordinateSource::Fallback => "unknown",
    }
}

pub fn render_measures(measures: &[TariffMeasure], state: &ViewState) -> String {
    if measures.is_empty() {
        return NO_DATA.to_string();
    }
    let rows = table::view(measures, &state.query, state.sort_spec().as_ref());
    let page = table::paginate(&rows, state.page, state.page_size);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Title"),
        ui::header_cell("Published"),
        ui::header_cell("Type"),
        ui::header_cell("Status"),
        ui::header_cell("Countries"),
        ui::header_cell("Industries"),
    ]);
    for measure in &page.items {
        table.add_row(vec![
            Cell::new(&measure.id),
            Cell::new(&measure.title),
            Cell::new(measure.publication_date.as_deref().unwrap_or("")),
            Cell::new(measure.tariff_type.as_deref().unwrap_or("")),
            Cell::new(measure.status.as_deref().unwrap_or("")),
            Cell::new(measure.affected_countries.join(", ")),
            Cell::new(measure.affected_industries.join(", ")),
        ]);
    }
    format!("{table}\n{}", footer(&page, "measures"))
}

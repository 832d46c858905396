//! Per-surface presentation state: query, sort, page and selection.

use super::model::DashboardSnapshot;
use super::table::{SortDirection, SortSpec};
use tracing::debug;

/// State owned by one presentation surface. It reads the shared snapshot but
/// never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub query: String,
    pub sort_key: Option<String>,
    pub sort_direction: SortDirection,
    pub page: usize,
    pub page_size: usize,
    selected_country: Option<String>,
    selected_industry: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            sort_key: None,
            sort_direction: SortDirection::Descending,
            page: 1,
            page_size: page_size.max(1),
            selected_country: None,
            selected_industry: None,
        }
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort_key
            .as_deref()
            .map(|key| SortSpec::new(key, self.sort_direction))
    }

    /// New queries always start from the first page.
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.page = 1;
    }

    /// Same key flips the direction; a new key starts descending.
    pub fn sort_by(&mut self, key: &str) {
        if self.sort_key.as_deref() == Some(key) {
            self.sort_direction = self.sort_direction.flipped();
        } else {
            self.sort_key = Some(key.to_string());
            self.sort_direction = SortDirection::Descending;
        }
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn selected_country(&self) -> Option<&str> {
        self.selected_country.as_deref()
    }

    pub fn selected_industry(&self) -> Option<&str> {
        self.selected_industry.as_deref()
    }

    /// Selects the country, or clears the selection when it is already
    /// selected. Codes missing from the snapshot are ignored.
    pub fn toggle_country(&mut self, code: &str, snapshot: &DashboardSnapshot) -> Option<&str> {
        match snapshot.country(code) {
            Some(country) => {
                let canonical = &country.country_code;
                if self.selected_country.as_deref() == Some(canonical.as_str()) {
                    self.selected_country = None;
                } else {
                    self.selected_country = Some(canonical.clone());
                }
            }
            None => debug!(code, "Ignoring selection of unknown country"),
        }
        self.selected_country()
    }

    pub fn toggle_industry(&mut self, code: &str, snapshot: &DashboardSnapshot) -> Option<&str> {
        match snapshot.industry(code) {
            Some(industry) => {
                let canonical = &industry.industry_code;
                if self.selected_industry.as_deref() == Some(canonical.as_str()) {
                    self.selected_industry = None;
                } else {
                    self.selected_industry = Some(canonical.clone());
                }
            }
            None => debug!(code, "Ignoring selection of unknown industry"),
        }
        self.selected_industry()
    }

    /// Drops selections that no longer exist in `snapshot`. Returns true when
    /// anything was cleared.
    pub fn reconcile(&mut self, snapshot: &DashboardSnapshot) -> bool {
        let mut changed = false;
        if let Some(code) = &self.selected_country
            && snapshot.country(code).is_none()
        {
            debug!(code = %code, "Clearing stale country selection");
            self.selected_country = None;
            changed = true;
        }
        if let Some(code) = &self.selected_industry
            && snapshot.industry(code).is_none()
        {
            debug!(code = %code, "Clearing stale industry selection");
            self.selected_industry = None;
            changed = true;
        }
        changed
    }
}

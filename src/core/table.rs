//! Filtered, sorted and paginated views over record collections.

use super::record::{FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            }
        )
    }
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(anyhow::anyhow!("Invalid sort direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: &str, direction: SortDirection) -> Self {
        Self {
            key: key.to_string(),
            direction,
        }
    }
}

/// Applies the record type's own search fields. See [`view_with_fields`].
pub fn view<'a, R: Record>(records: &'a [R], query: &str, sort: Option<&SortSpec>) -> Vec<&'a R> {
    view_with_fields(records, R::SEARCH_FIELDS, query, sort)
}

/// Keeps records where `query` is a case-insensitive substring of any of
/// `search_fields`, then orders them by `sort`. The sort is stable, and a key
/// no record carries leaves the input order untouched.
pub fn view_with_fields<'a, R: Record>(
    records: &'a [R],
    search_fields: &[&str],
    query: &str,
    sort: Option<&SortSpec>,
) -> Vec<&'a R> {
    let needle = query.trim().to_lowercase();
    let mut rows: Vec<&R> = records
        .iter()
        .filter(|r| needle.is_empty() || matches_query(*r, search_fields, &needle))
        .collect();

    if let Some(spec) = sort {
        rows.sort_by(|a, b| {
            let ordering = compare_fields(a.field(&spec.key), b.field(&spec.key));
            match spec.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    rows
}

fn matches_query<R: Record>(record: &R, fields: &[&str], needle: &str) -> bool {
    fields.iter().any(|name| {
        record
            .field(name)
            .is_some_and(|v| v.as_text().to_lowercase().contains(needle))
    })
}

/// Absent sorts lowest. Two numeric values compare numerically and two text
/// values as case-insensitive text. A number sorts below text so the
/// comparator stays a total order on mixed columns.
fn compare_fields(a: Option<FieldValue<'_>>, b: Option<FieldValue<'_>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a
                .as_text()
                .to_lowercase()
                .cmp(&b.as_text().to_lowercase()),
        },
    }
}

/// One page of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page actually shown after clamping.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Slices `rows` into the requested page. Out-of-range pages are clamped and
/// there is always at least one (possibly empty) page.
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = rows.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total_items);
    Page {
        items: rows[start.min(end)..end].to_vec(),
        page,
        total_pages,
        total_items,
    }
}

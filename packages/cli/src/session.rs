//! Explicit per-run session state.
//!
//! Holds the selected area, the date filter, and the last successfully
//! fetched result set. A new fetch replaces the result set only once it
//! has fully succeeded; a failed fetch leaves the previous one in place.

use std::sync::Arc;

use aerial_meta_catalog::fetch::{PageSource, fetch_all, unfiltered_warning};
use aerial_meta_catalog::progress::ProgressCallback;
use aerial_meta_catalog::{BoundingBox, CatalogError, CatalogQuery, DateRange};
use aerial_meta_spatial::NormalizedRecord;
use aerial_meta_spatial::normalize::{NormalizeOptions, normalize_records};

/// The selected search area.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedArea {
    /// How the area was chosen (region code, file name, "pasted").
    pub label: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Default)]
pub struct Session {
    area: Option<SelectedArea>,
    dates: DateRange,
    records: Option<Vec<NormalizedRecord>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn area(&self) -> Option<&SelectedArea> {
        self.area.as_ref()
    }

    pub fn set_area(&mut self, label: impl Into<String>, bbox: BoundingBox) {
        self.area = Some(SelectedArea {
            label: label.into(),
            bbox,
        });
    }

    pub fn clear_area(&mut self) {
        self.area = None;
    }

    #[must_use]
    pub const fn dates(&self) -> DateRange {
        self.dates
    }

    pub const fn set_dates(&mut self, dates: DateRange) {
        self.dates = dates;
    }

    /// The last fetched result set, if any fetch has succeeded.
    #[must_use]
    pub fn records(&self) -> Option<&[NormalizedRecord]> {
        self.records.as_deref()
    }

    /// Builds the catalog query for the current area and dates.
    #[must_use]
    pub fn query(&self, page_limit: u32) -> CatalogQuery {
        CatalogQuery::new(self.area.as_ref().map(|a| a.bbox), self.dates)
            .with_limit(page_limit)
    }

    /// Fetches and normalizes every record for the current filters.
    ///
    /// On success the new records replace the held result set and their
    /// count is returned.
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`] that aborted the fetch. The previously
    /// held records are kept.
    pub async fn fetch(
        &mut self,
        source: &impl PageSource,
        page_limit: u32,
        options: NormalizeOptions,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<usize, CatalogError> {
        let query = self.query(page_limit);
        if let Some(warning) = unfiltered_warning(&query) {
            log::warn!("{warning}");
        }

        let raw = fetch_all(source, &query, progress).await?;
        let normalized = normalize_records(raw, options);
        let count = normalized.len();
        self.records = Some(normalized);

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use aerial_meta_catalog::progress::null_progress;
    use aerial_meta_catalog::{CatalogMeta, CatalogPage, MetadataRecord};
    use chrono::NaiveDate;

    use super::*;

    struct FakeCatalog {
        found: u64,
        fail: AtomicBool,
    }

    impl PageSource for FakeCatalog {
        async fn fetch_page(
            &self,
            _query: &CatalogQuery,
            page: u32,
        ) -> Result<CatalogPage, CatalogError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::Parse {
                    message: format!("page {page} unavailable"),
                });
            }
            let results = (0..self.found)
                .map(|i| {
                    serde_json::from_value::<MetadataRecord>(serde_json::json!({
                        "_id": format!("r{i}"),
                        "platform": "uav",
                    }))
                    .unwrap()
                })
                .collect();
            Ok(CatalogPage {
                results,
                meta: CatalogMeta {
                    found: self.found,
                    limit: 100,
                    page: Some(page),
                },
            })
        }
    }

    #[test]
    fn builds_query_from_state() {
        let mut session = Session::new();
        assert!(session.query(100).is_unfiltered());

        session.set_area("NPL", BoundingBox::new(80.0, 26.3, 88.2, 30.4).unwrap());
        let from = NaiveDate::from_ymd_opt(2020, 1, 1);
        session.set_dates(DateRange::new(from, None).unwrap());

        let query = session.query(50);
        assert!(!query.is_unfiltered());
        assert_eq!(query.limit, 50);
        assert_eq!(query.dates.start(), from);
        assert!(query.bbox.is_some());

        session.clear_area();
        assert!(session.query(50).bbox.is_none());
    }

    #[tokio::test]
    async fn fetch_replaces_records() {
        let mut session = Session::new();
        let source = FakeCatalog {
            found: 3,
            fail: AtomicBool::new(false),
        };

        let count = session
            .fetch(&source, 100, NormalizeOptions::default(), &null_progress())
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(session.records().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_records() {
        let mut session = Session::new();
        let source = FakeCatalog {
            found: 2,
            fail: AtomicBool::new(false),
        };
        session
            .fetch(&source, 100, NormalizeOptions::default(), &null_progress())
            .await
            .unwrap();

        source.fail.store(true, Ordering::SeqCst);
        let result = session
            .fetch(&source, 100, NormalizeOptions::default(), &null_progress())
            .await;

        assert!(result.is_err());
        assert_eq!(session.records().unwrap().len(), 2);
    }
}

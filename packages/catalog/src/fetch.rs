//! Paginated metadata fetching.
//!
//! The catalog reports, on every page, the total number of records matching
//! the whole query (`meta.found`). Pages are requested one at a time until
//! the accumulated record count reaches that total.

use std::sync::Arc;

use crate::progress::ProgressCallback;
use crate::{CatalogError, CatalogPage, CatalogQuery, MetadataRecord};

/// Default `OpenAerialMap` metadata search endpoint.
pub const DEFAULT_CATALOG_URL: &str = "https://api.openaerialmap.org/meta";

/// Warning shown before an unfiltered, whole-catalog fetch.
pub const UNFILTERED_WARNING: &str =
    "No filters selected. This might return a large amount of data";

/// Returns the cost warning if the query has no bounding box and no date
/// bound at all. A single set filter suppresses it.
#[must_use]
pub const fn unfiltered_warning(query: &CatalogQuery) -> Option<&'static str> {
    if query.is_unfiltered() {
        Some(UNFILTERED_WARNING)
    } else {
        None
    }
}

/// A source of catalog pages.
pub trait PageSource: Send + Sync {
    /// Fetches a single 1-based page of results for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the request or response parsing fails.
    fn fetch_page(
        &self,
        query: &CatalogQuery,
        page: u32,
    ) -> impl std::future::Future<Output = Result<CatalogPage, CatalogError>> + Send;
}

/// [`PageSource`] backed by the remote catalog HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_owned(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PageSource for HttpCatalog {
    async fn fetch_page(
        &self,
        query: &CatalogQuery,
        page: u32,
    ) -> Result<CatalogPage, CatalogError> {
        let params = query.to_params(page);
        log::debug!("Fetching catalog page {page}: {} {params:?}", self.url);

        let resp = self.client.get(&self.url).query(&params).send().await?;
        if !resp.status().is_success() {
            return Err(CatalogError::Status {
                url: resp.url().to_string(),
                status: resp.status(),
            });
        }
        let body = resp.text().await?;

        Ok(serde_json::from_str(&body)?)
    }
}

/// Fetches every record matching `query`, one page at a time.
///
/// Stops once the accumulated count is at least the reported `found` total,
/// or when a page comes back empty before the total is reached. Any failure
/// aborts the whole fetch and the partial accumulation is dropped.
///
/// # Errors
///
/// Returns the first [`CatalogError`] encountered.
pub async fn fetch_all(
    source: &(impl PageSource + ?Sized),
    query: &CatalogQuery,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<MetadataRecord>, CatalogError> {
    let mut all_records: Vec<MetadataRecord> = Vec::new();
    let mut page: u32 = 1;

    loop {
        progress.set_message(format!("Fetching page {page}"));
        let CatalogPage { results, meta } = source.fetch_page(query, page).await?;
        let count = results.len();

        if page == 1 {
            progress.set_total(meta.found);
        }
        progress.inc(count as u64);

        all_records.extend(results);
        log::debug!(
            "Page {page}: {count} records ({} / {} accumulated)",
            all_records.len(),
            meta.found
        );

        if all_records.len() as u64 >= meta.found {
            break;
        }

        if count == 0 {
            log::warn!(
                "Page {page} was empty with {} of {} records accumulated, stopping",
                all_records.len(),
                meta.found
            );
            break;
        }

        page += 1;
    }

    progress.finish(format!("Fetched {} records", all_records.len()));
    log::info!(
        "Catalog fetch complete: {} records over {page} page(s)",
        all_records.len()
    );

    Ok(all_records)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::progress::null_progress;
    use crate::{BoundingBox, CatalogMeta, DateRange};

    /// Serves `found` synthetic records in pages of `limit`, recording each
    /// requested page number.
    struct FakeCatalog {
        found: u64,
        limit: u32,
        fail_on_page: Option<u32>,
        requested: Mutex<Vec<u32>>,
    }

    impl FakeCatalog {
        fn new(found: u64, limit: u32) -> Self {
            Self {
                found,
                limit,
                fail_on_page: None,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl PageSource for FakeCatalog {
        async fn fetch_page(
            &self,
            _query: &CatalogQuery,
            page: u32,
        ) -> Result<CatalogPage, CatalogError> {
            self.requested.lock().unwrap().push(page);

            if self.fail_on_page == Some(page) {
                return Err(CatalogError::Parse {
                    message: "boom".to_string(),
                });
            }

            let start = u64::from(page - 1) * u64::from(self.limit);
            let end = (start + u64::from(self.limit)).min(self.found);
            let results = (start..end)
                .map(|i| {
                    let mut fields = serde_json::Map::new();
                    fields.insert("_id".to_string(), serde_json::json!(format!("rec-{i}")));
                    MetadataRecord::new(fields)
                })
                .collect();

            Ok(CatalogPage {
                results,
                meta: CatalogMeta {
                    found: self.found,
                    limit: self.limit,
                    page: Some(page),
                },
            })
        }
    }

    #[tokio::test]
    async fn fetches_exactly_enough_pages() {
        let catalog = FakeCatalog::new(250, 100);
        let records = fetch_all(&catalog, &CatalogQuery::default(), &null_progress())
            .await
            .unwrap();

        assert_eq!(records.len(), 250);
        assert_eq!(catalog.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stops_after_single_exact_page() {
        let catalog = FakeCatalog::new(100, 100);
        let records = fetch_all(&catalog, &CatalogQuery::default(), &null_progress())
            .await
            .unwrap();

        assert_eq!(records.len(), 100);
        assert_eq!(catalog.requested(), vec![1]);
    }

    #[tokio::test]
    async fn handles_empty_result_set() {
        let catalog = FakeCatalog::new(0, 100);
        let records = fetch_all(&catalog, &CatalogQuery::default(), &null_progress())
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(catalog.requested(), vec![1]);
    }

    #[tokio::test]
    async fn stops_on_empty_page_before_total() {
        // Reports more records than it can actually serve.
        struct Overreporting;

        impl PageSource for Overreporting {
            async fn fetch_page(
                &self,
                _query: &CatalogQuery,
                page: u32,
            ) -> Result<CatalogPage, CatalogError> {
                let results = if page == 1 {
                    vec![MetadataRecord::default(); 10]
                } else {
                    Vec::new()
                };
                Ok(CatalogPage {
                    results,
                    meta: CatalogMeta {
                        found: 50,
                        limit: 100,
                        page: Some(page),
                    },
                })
            }
        }

        let records = fetch_all(&Overreporting, &CatalogQuery::default(), &null_progress())
            .await
            .unwrap();
        assert_eq!(records.len(), 10);
    }

    #[tokio::test]
    async fn failing_page_aborts_whole_fetch() {
        let mut catalog = FakeCatalog::new(250, 100);
        catalog.fail_on_page = Some(2);

        let result = fetch_all(&catalog, &CatalogQuery::default(), &null_progress()).await;

        assert!(result.is_err());
        assert_eq!(catalog.requested(), vec![1, 2]);
    }

    #[derive(Default)]
    struct RecordingProgress {
        messages: Mutex<Vec<String>>,
        total: Mutex<Option<u64>>,
        finished: Mutex<Option<String>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn set_total(&self, total: u64) {
            *self.total.lock().unwrap() = Some(total);
        }
        fn inc(&self, _delta: u64) {}
        fn set_message(&self, msg: String) {
            self.messages.lock().unwrap().push(msg);
        }
        fn finish(&self, msg: String) {
            *self.finished.lock().unwrap() = Some(msg);
        }
        fn finish_and_clear(&self) {}
    }

    #[tokio::test]
    async fn reports_each_page_to_progress() {
        let catalog = FakeCatalog::new(150, 100);
        let recorder = Arc::new(RecordingProgress::default());
        let progress: Arc<dyn ProgressCallback> = recorder.clone();

        fetch_all(&catalog, &CatalogQuery::default(), &progress)
            .await
            .unwrap();

        assert_eq!(
            *recorder.messages.lock().unwrap(),
            vec!["Fetching page 1".to_string(), "Fetching page 2".to_string()]
        );
        assert_eq!(*recorder.total.lock().unwrap(), Some(150));
        assert_eq!(
            recorder.finished.lock().unwrap().as_deref(),
            Some("Fetched 150 records")
        );
    }

    #[test]
    fn warns_only_when_every_filter_is_unset() {
        let bbox = BoundingBox::new(-1.0, -1.0, 1.0, 1.0).unwrap();
        let from = NaiveDate::from_ymd_opt(2020, 1, 1);

        assert_eq!(
            unfiltered_warning(&CatalogQuery::default()),
            Some(UNFILTERED_WARNING)
        );
        assert_eq!(
            unfiltered_warning(&CatalogQuery::new(Some(bbox), DateRange::default())),
            None
        );
        assert_eq!(
            unfiltered_warning(&CatalogQuery::new(
                None,
                DateRange::new(from, None).unwrap()
            )),
            None
        );
        assert_eq!(
            unfiltered_warning(&CatalogQuery::new(
                None,
                DateRange::new(None, from).unwrap()
            )),
            None
        );
    }
}

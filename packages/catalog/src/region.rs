//! Named-region bounding box lookup.
//!
//! Country bounding boxes are published as a static JSON object mapping
//! ISO3 codes to `[min_x, min_y, max_x, max_y]` arrays. The mapping is
//! fetched once per session and kept in a [`RegionCatalog`].

use std::collections::BTreeMap;

use crate::{BoundingBox, CatalogError};

/// Default location of the ISO3 country bounding box resource.
pub const DEFAULT_REGIONS_URL: &str = "https://raw.githubusercontent.com/kshitijrajsharma/global-boundaries-bbox/refs/heads/main/bbox.json";

/// Fetches the region identifier to bounding box mapping.
///
/// # Errors
///
/// Returns [`CatalogError`] if the request fails, the server returns a
/// non-success status, or the body is not a JSON object.
pub async fn fetch_region_bboxes(
    client: &reqwest::Client,
    url: &str,
) -> Result<BTreeMap<String, BoundingBox>, CatalogError> {
    log::debug!("Fetching region bounding boxes from {url}");

    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(CatalogError::Status {
            url: url.to_string(),
            status: resp.status(),
        });
    }
    let body = resp.text().await?;

    parse_region_bboxes(&body)
}

/// Parses the region mapping, skipping entries that are not valid boxes.
///
/// # Errors
///
/// Returns [`CatalogError::Json`] if the body is not a JSON object.
pub fn parse_region_bboxes(body: &str) -> Result<BTreeMap<String, BoundingBox>, CatalogError> {
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body)?;

    let mut regions = BTreeMap::new();
    for (code, value) in raw {
        match serde_json::from_value::<BoundingBox>(value) {
            Ok(bbox) => {
                regions.insert(code, bbox);
            }
            Err(e) => log::warn!("Skipping region {code}: {e}"),
        }
    }

    Ok(regions)
}

/// The preloaded set of selectable regions.
///
/// An empty catalog is a valid state: it means the resource could not be
/// loaded and no region can be selected.
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: BTreeMap<String, BoundingBox>,
}

impl RegionCatalog {
    #[must_use]
    pub const fn new(regions: BTreeMap<String, BoundingBox>) -> Self {
        Self { regions }
    }

    /// Loads the catalog, degrading to an empty catalog on failure.
    pub async fn load(client: &reqwest::Client, url: &str) -> Self {
        match fetch_region_bboxes(client, url).await {
            Ok(regions) => {
                log::info!("Loaded {} region bounding boxes", regions.len());
                Self { regions }
            }
            Err(e) => {
                log::error!("Error fetching country data: {e}");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns the region identifiers in sorted order.
    #[must_use]
    pub fn codes(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    /// Looks up a region, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<BoundingBox> {
        let code = code.trim();
        self.regions.get(code).copied().or_else(|| {
            self.regions
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(code))
                .map(|(_, bbox)| *bbox)
        })
    }
}

//! Area selection: the three ways a user can pick the search area.

use std::path::PathBuf;

use crate::geometry::{bbox_from_document, parse_geometry_bytes, parse_geometry_document};
use crate::region::RegionCatalog;
use crate::{BoundingBox, CatalogError};

/// How the user chose the search area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaSelection {
    /// An identifier from the preloaded [`RegionCatalog`] (ISO3 code).
    Region(String),
    /// A `GeoJSON` file on disk.
    UploadedFile(PathBuf),
    /// `GeoJSON` text pasted by the user.
    PastedText(String),
}

impl AreaSelection {
    /// Short label used in menus and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Region(_) => "Select Country (ISO3)",
            Self::UploadedFile(_) => "Upload GeoJSON",
            Self::PastedText(_) => "Paste GeoJSON",
        }
    }
}

/// Resolves an area selection into a bounding box.
///
/// # Errors
///
/// Returns [`CatalogError::Parse`] if the region is unknown or the
/// `GeoJSON` cannot be parsed, and [`CatalogError::Io`] if an uploaded file
/// cannot be read.
pub fn resolve(
    selection: &AreaSelection,
    regions: &RegionCatalog,
) -> Result<BoundingBox, CatalogError> {
    let bbox = match selection {
        AreaSelection::Region(code) => {
            regions.get(code).ok_or_else(|| CatalogError::Parse {
                message: if regions.is_empty() {
                    "no regions are available".to_string()
                } else {
                    format!("unknown region '{code}'")
                },
            })?
        }
        AreaSelection::UploadedFile(path) => {
            let bytes = std::fs::read(path)?;
            bbox_from_document(&parse_geometry_bytes(&bytes)?)?
        }
        AreaSelection::PastedText(text) => bbox_from_document(&parse_geometry_document(text)?)?,
    };

    log::info!("{}: bounding box {bbox}", selection.label());
    Ok(bbox)
}

use thiserror::Error;

use crate::geo::GeoPoint;
use crate::tile::{Kind, ProjectedPoint, TileId, TileMetadata, ZoomLevel};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum OracleError {
    /// The service has nothing for this request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with something that couldn't be decoded. Seen
    /// sporadically; the same request usually works later.
    #[error("malformed response: {0}")]
    Transient(String),

    /// The service couldn't be reached or refused the request.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// The remote tile service as seen by the fill driver.
///
/// Every call is independent; implementations bound each one with their own
/// timeout and never retry.
#[allow(async_fn_in_trait)]
pub trait Oracle {
    /// Metadata of the tile containing `point`.
    async fn metadata_for_point(
        &self,
        point: GeoPoint,
        zoom: ZoomLevel,
        kind: Kind,
    ) -> Result<TileMetadata, OracleError>;

    async fn metadata_for_tile_id(&self, id: &TileId) -> Result<TileMetadata, OracleError>;

    /// Raw image bytes, exactly as served.
    async fn fetch_image(&self, id: &TileId) -> Result<Vec<u8>, OracleError>;

    /// Reprojects `point` into the service's projected system.
    async fn project_point(&self, point: GeoPoint) -> Result<ProjectedPoint, OracleError>;
}

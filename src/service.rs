use std::time::Duration;

use anyhow::{Context, Result};
use clap::crate_version;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::GeoPoint;
use crate::oracle::{Oracle, OracleError};
use crate::tile::{Kind, ProjectedPoint, Slot, TileCorners, TileId, TileMetadata, ZoomLevel};
use crate::url::UrlFormat;

const ZERO_DURATION: Duration = Duration::from_secs(0);

/// Connection settings for [`TileService`].
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the metadata endpoints.
    pub base_url: String,

    /// Template the image URL of a tile is built from.
    pub tile_url: UrlFormat,

    /// Timeout for a single call.
    ///
    /// Pass the zero duration to disable the timeout.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct PointQuery {
    lon: f64,
    lat: f64,
    theme: u8,
    scale: u8,
}

#[derive(Debug, Serialize)]
struct TileIdQuery {
    theme: u8,
    scale: u8,
    scene: u8,
    x: u32,
    y: u32,
}

#[derive(Debug, Serialize)]
struct ProjectQuery {
    lon: f64,
    lat: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTileId {
    theme: u8,
    scale: u8,
    scene: u8,
    x: u32,
    y: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireLonLat {
    lon: f64,
    lat: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TileMetaResponse {
    id: WireTileId,
    tile_exists: bool,
    south_west: WireLonLat,
    south_east: WireLonLat,
    north_west: WireLonLat,
    north_east: WireLonLat,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UtmResponse {
    zone: u8,
    x: f64,
    y: f64,
}

impl From<WireLonLat> for GeoPoint {
    fn from(p: WireLonLat) -> Self {
        GeoPoint::new(p.lat, p.lon)
    }
}

impl TileMetaResponse {
    fn into_metadata(self) -> Result<TileMetadata, OracleError> {
        if !self.tile_exists {
            return Err(OracleError::NotFound(format!(
                "no tile at {}x{} in scene {}",
                self.id.x, self.id.y, self.id.scene
            )));
        }

        let kind = Kind::from_theme(self.id.theme).ok_or_else(|| {
            OracleError::Transient(format!("unknown theme {}", self.id.theme))
        })?;
        let zoom = ZoomLevel::from_scale_code(self.id.scale).ok_or_else(|| {
            OracleError::Transient(format!("unknown scale {}", self.id.scale))
        })?;
        if self.id.x == u32::MAX || self.id.y == u32::MAX {
            return Err(OracleError::Transient(format!(
                "tile {}x{} lies on the edge of the grid",
                self.id.x, self.id.y
            )));
        }

        Ok(TileMetadata {
            id: TileId {
                kind,
                zoom,
                zone: self.id.scene,
                slot: Slot::new(self.id.x, self.id.y),
            },
            corners: TileCorners {
                south_west: self.south_west.into(),
                south_east: self.south_east.into(),
                north_west: self.north_west.into(),
                north_east: self.north_east.into(),
            },
        })
    }
}

fn join_endpoint(base_url: &str, name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), name)
}

/// HTTP client for the remote tile service.
#[derive(Debug)]
pub struct TileService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl TileService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if config.timeout > ZERO_DURATION {
            builder = builder.timeout(config.timeout);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.append(
            reqwest::header::USER_AGENT,
            format!("terrafill_rs_{}", crate_version!())
                .parse()
                .context("invalid user agent")?,
        );

        let client = builder
            .default_headers(headers)
            .build()
            .with_context(|| "failed creating HTTP client")?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, name: &str) -> String {
        join_endpoint(&self.config.base_url, name)
    }

    async fn get_bytes<Q: Serialize>(
        &self,
        url: &str,
        query: Option<&Q>,
    ) -> Result<Vec<u8>, OracleError> {
        let mut request = self.client.get(url);
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(format!("{}: {}", url, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(OracleError::NotFound(url.to_owned())),
            status if !status.is_success() => {
                return Err(OracleError::Unavailable(format!("{}: status {}", url, status)))
            }
            _ => {}
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Unavailable(format!("{}: {}", url, e))
            } else {
                OracleError::Transient(format!("{}: {}", url, e))
            }
        })?;

        Ok(body.to_vec())
    }

    async fn get_json<T, Q>(&self, endpoint: &str, query: &Q) -> Result<T, OracleError>
    where
        T: DeserializeOwned,
        Q: Serialize,
    {
        let url = self.endpoint(endpoint);
        let body = self.get_bytes(&url, Some(query)).await?;

        serde_json::from_slice(&body)
            .map_err(|e| OracleError::Transient(format!("{}: {}", url, e)))
    }
}

impl Oracle for TileService {
    async fn metadata_for_point(
        &self,
        point: GeoPoint,
        zoom: ZoomLevel,
        kind: Kind,
    ) -> Result<TileMetadata, OracleError> {
        let query = PointQuery {
            lon: point.lon,
            lat: point.lat,
            theme: kind.theme(),
            scale: zoom.scale_code(),
        };

        let response: TileMetaResponse = self.get_json("TileMetaFromLonLatPt", &query).await?;
        response.into_metadata()
    }

    async fn metadata_for_tile_id(&self, id: &TileId) -> Result<TileMetadata, OracleError> {
        let query = TileIdQuery {
            theme: id.kind.theme(),
            scale: id.zoom.scale_code(),
            scene: id.zone,
            x: id.slot.col,
            y: id.slot.row,
        };

        let response: TileMetaResponse = self.get_json("TileMetaFromTileId", &query).await?;
        response.into_metadata()
    }

    async fn fetch_image(&self, id: &TileId) -> Result<Vec<u8>, OracleError> {
        let url = self
            .config
            .tile_url
            .tile_url(&self.config.base_url, id)
            .map_err(|e| OracleError::Unavailable(format!("{:#}", e)))?;

        debug!(%url, "fetching tile image");
        let image = self.get_bytes(&url, None::<&()>).await?;
        if image.is_empty() {
            return Err(OracleError::NotFound(format!("empty image at {}", url)));
        }

        Ok(image)
    }

    async fn project_point(&self, point: GeoPoint) -> Result<ProjectedPoint, OracleError> {
        let query = ProjectQuery {
            lon: point.lon,
            lat: point.lat,
        };

        let utm: UtmResponse = self.get_json("ConvertLonLatPtToUtmPt", &query).await?;
        Ok(ProjectedPoint::from_meters(utm.zone, utm.x, utm.y))
    }
}

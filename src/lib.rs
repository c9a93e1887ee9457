//! Mirror a projected tile service into a local map base, incrementally.
//!
//! Given two opposite corners of a rectangle, the tiles covering it are
//! looked up on the service, every tile not yet on disk is downloaded, and
//! the geodetic and projected position of each tile corner is recorded in a
//! per-zoom corner file. Re-running over the same rectangle only fetches what
//! is still missing.
//!
//! # Map base layout
//!
//! ```text
//! tiles/
//!   corners-4m.txt          zoom col row lat lon zone x y, one corner per line
//!   photo/4m/687/6590.jpg   <kind>/<zoom>/<col>/<row>.<ext>
//!   topo/16m/171/1647.gif
//! ```
//!
//! # CLI Example
//!
//! ```bash
//! terrafill 47.60N,122.35W 47.62N,122.32W \
//!   --service http://tiles.example.com/api \
//!   --zoom 4 \
//!   --kind photo \
//!   --output ./tiles
//! ```
//!
//! The service is reached through the [`Oracle`] trait; [`TileService`] is
//! its HTTP implementation.

mod config;
mod corner;
mod fill;
mod geo;
pub mod logging;
mod map_base;
mod oracle;
mod service;
mod tile;
mod url;

pub use config::Config;
pub use corner::{CornerFileError, CornerSet, TileCorner};
pub use fill::{fill, plan, FillError, FillReport, Plan};
pub use geo::{parse_lat_lon, GeoBox, GeoPoint, ParseError};
pub use map_base::{MapBase, Stored};
pub use oracle::{Oracle, OracleError};
pub use service::{ServiceConfig, TileService};
pub use tile::{
    Kind, ProjectedPoint, Slot, SlotRange, TileCorners, TileId, TileMetadata, ZoomLevel,
};
pub use url::{UrlFormat, DEFAULT_TILE_URL};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_error_classification() {
        let zone = FillError::ZoneMismatch {
            south_west: 10,
            north_east: 11,
        };
        assert!(zone.is_usage());
        let msg = zone.to_string();
        assert!(msg.contains("10") && msg.contains("11"));

        let lookup = FillError::CornerLookup {
            point: GeoPoint::new(1.0, 2.0),
            source: OracleError::NotFound("nothing here".into()),
        };
        assert!(lookup.is_usage());

        let save = FillError::CornerSave(CornerFileError::Malformed {
            path: "corners-4m.txt".into(),
            line: 3,
            reason: "bad".into(),
        });
        assert!(!save.is_usage());
    }
}

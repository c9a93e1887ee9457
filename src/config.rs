use std::path::PathBuf;

use crate::geo::GeoBox;
use crate::map_base::MapBase;
use crate::tile::{Kind, ZoomLevel};

/// Fill run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The rectangle to mirror.
    pub area: GeoBox,

    /// Resolution of the tiles to fetch.
    pub zoom: ZoomLevel,

    /// Photo or topographic imagery.
    pub kind: Kind,

    /// Root folder of the map base.
    pub map_base: PathBuf,

    /// Maximum number of slots processed in parallel.
    pub fetch_rate: u8,

    /// Whether to draw a progress bar.
    pub progress: bool,
}

impl Config {
    pub fn map_base(&self) -> MapBase {
        MapBase::new(self.map_base.clone())
    }
}

use anyhow::{Context, Result};
use maplit::hashmap;
use std::fmt;
use strfmt::strfmt;

use crate::tile::TileId;

/// Image URL template the service's tile endpoint is queried with.
pub const DEFAULT_TILE_URL: &str = "{service}/Tile?T={t}&S={s}&X={x}&Y={y}&Z={z}";

/// A tile image URL template with the replacement specifiers `{service}`
/// (service base URL), `{t}` (theme), `{s}` (scale code), `{x}` (column),
/// `{y}` (row) and `{z}` (zone).
#[derive(Clone, PartialEq)]
pub struct UrlFormat {
    format_str: String,
}

impl UrlFormat {
    pub fn from_string(format_str: String) -> Self {
        Self { format_str }
    }

    pub fn tile_url(&self, service: &str, id: &TileId) -> Result<String> {
        let vars = hashmap! {
            "service".to_owned() => service.trim_end_matches('/').to_owned(),
            "t".to_owned() => id.kind.theme().to_string(),
            "s".to_owned() => id.zoom.scale_code().to_string(),
            "x".to_owned() => id.slot.col.to_string(),
            "y".to_owned() => id.slot.row.to_string(),
            "z".to_owned() => id.zone.to_string(),
        };

        strfmt(&self.format_str, &vars).context("failed formatting tile URL")
    }
}

impl Default for UrlFormat {
    fn default() -> Self {
        Self::from_string(DEFAULT_TILE_URL.to_owned())
    }
}

impl fmt::Debug for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFormat")
            .field("format_str", &self.format_str)
            .finish()
    }
}

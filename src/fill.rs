use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::{future, prelude::*, stream};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corner::{CornerFileError, CornerSet, TileCorner};
use crate::geo::GeoPoint;
use crate::map_base::{MapBase, Stored};
use crate::oracle::{Oracle, OracleError};
use crate::tile::{Slot, SlotRange, TileId, TileMetadata, ZoomLevel};

#[derive(Debug, Error)]
pub enum FillError {
    #[error("no tile covers corner {point}: {source}")]
    CornerLookup {
        point: GeoPoint,
        #[source]
        source: OracleError,
    },

    #[error(
        "the corners lie in different zones ({south_west} and {north_east}), \
         the rectangle must stay inside one zone"
    )]
    ZoneMismatch { south_west: u8, north_east: u8 },

    #[error("asked for {expected} tiles but the service answered with {found}")]
    Inconsistent { expected: String, found: TileId },

    #[error(transparent)]
    CornerLoad(CornerFileError),

    #[error(transparent)]
    CornerSave(CornerFileError),
}

impl FillError {
    /// Whether the error stems from the requested area rather than from the
    /// local map base.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            FillError::CornerLookup { .. }
                | FillError::ZoneMismatch { .. }
                | FillError::Inconsistent { .. }
        )
    }
}

/// Summary of one fill run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FillReport {
    pub visited: usize,
    pub stored: usize,
    pub already_present: usize,
    pub corners_added: usize,

    /// Slots without metadata or image.
    pub missing: Vec<Slot>,

    /// Slots whose image couldn't be written.
    pub failed: Vec<Slot>,
}

/// What a fill run would do, see [`plan`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plan {
    pub range: SlotRange,
    pub zone: u8,
    pub total: usize,
    pub missing_tiles: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TileOutcome {
    Stored,
    AlreadyPresent,
    Missing,
    WriteFailed,
}

#[derive(Clone, Copy, Debug)]
struct SlotOutcome {
    slot: Slot,
    tile: TileOutcome,
    corners_added: usize,
}

impl FillReport {
    fn record(&mut self, outcome: SlotOutcome) {
        self.visited += 1;
        self.corners_added += outcome.corners_added;

        match outcome.tile {
            TileOutcome::Stored => self.stored += 1,
            TileOutcome::AlreadyPresent => self.already_present += 1,
            TileOutcome::Missing => self.missing.push(outcome.slot),
            TileOutcome::WriteFailed => self.failed.push(outcome.slot),
        }
    }
}

/// Mirror every tile of `cfg.area` that isn't in the map base yet, together
/// with the corners of each tile, and save the corner file.
///
/// Tiles that are missing upstream or can't be written are reported and
/// skipped. Failing to resolve the area, or to load or save the corner file,
/// aborts the run.
///
/// # Example
/// ```rust,no_run
/// use terrafill::{fill, Config, GeoBox, Kind, ServiceConfig, TileService, UrlFormat, ZoomLevel};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let service = TileService::new(ServiceConfig {
///     base_url: "http://tiles.example.com/api".into(),
///     tile_url: UrlFormat::default(),
///     timeout: Duration::from_secs(30),
/// })?;
/// let config = Config {
///     area: GeoBox::new("47.60N,122.35W".parse()?, "47.62N,122.32W".parse()?),
///     zoom: ZoomLevel::new(4).unwrap(),
///     kind: Kind::Photo,
///     map_base: "./tiles".into(),
///     fetch_rate: 4,
///     progress: true,
/// };
///
/// let report = fill(&config, &service).await?;
/// println!("stored {} tiles", report.stored);
/// # Ok(())
/// # }
/// ```
pub async fn fill<O: Oracle>(cfg: &Config, oracle: &O) -> Result<FillReport, FillError> {
    let (south_west, north_east) = resolve(cfg, oracle).await?;
    let range = SlotRange::new(south_west.id.slot, north_east.id.slot);
    let template = south_west.id;

    let base = cfg.map_base();
    let corner_file = base.corner_file_for(cfg.zoom);
    let corners = CornerSet::load(&[&corner_file])
        .await
        .map_err(FillError::CornerLoad)?;
    let corners = Mutex::new(corners);

    info!(
        zone = template.zone,
        from = %range.min,
        to = %range.max,
        tiles = range.len(),
        "filling map base"
    );

    let pb = if cfg.progress {
        ProgressBar::new(range.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:60.cyan/blue} {pos:>7}/{len:7} ETA: {eta} {msg}")
            .progress_chars("##-"),
    );

    let mut report = stream::iter(range.iter())
        .map(|slot| {
            pb.set_message(&slot.to_string());
            fill_slot(oracle, &base, &corners, template.with_slot(slot))
        })
        .buffer_unordered(cfg.fetch_rate.max(1) as usize)
        .fold(FillReport::default(), |mut report, outcome| {
            pb.inc(1);
            report.record(outcome);
            future::ready(report)
        })
        .await;

    pb.finish_and_clear();
    report.missing.sort();
    report.failed.sort();

    let corners = corners.into_inner().unwrap_or_else(PoisonError::into_inner);
    corners
        .save(&corner_file)
        .await
        .map_err(FillError::CornerSave)?;

    info!(
        visited = report.visited,
        stored = report.stored,
        already_present = report.already_present,
        missing = report.missing.len(),
        failed = report.failed.len(),
        corners_added = report.corners_added,
        corners_total = corners.len(),
        "fill complete"
    );

    Ok(report)
}

/// Resolves and validates the area like [`fill`] does and counts the tiles
/// not yet in the map base, without fetching anything else.
pub async fn plan<O: Oracle>(cfg: &Config, oracle: &O) -> Result<Plan, FillError> {
    let (south_west, north_east) = resolve(cfg, oracle).await?;
    let range = SlotRange::new(south_west.id.slot, north_east.id.slot);
    let base = cfg.map_base();

    let missing_tiles = range
        .iter()
        .filter(|&slot| !MapBase::has(&base.path_for(cfg.zoom, slot, cfg.kind)))
        .count();

    Ok(Plan {
        range,
        zone: south_west.id.zone,
        total: range.len(),
        missing_tiles,
    })
}

/// Looks up the tiles under both corners of the area and checks that they
/// describe one rectangular slot range.
async fn resolve<O: Oracle>(
    cfg: &Config,
    oracle: &O,
) -> Result<(TileMetadata, TileMetadata), FillError> {
    let south_west = lookup_corner(cfg, oracle, cfg.area.south_west).await?;
    let north_east = lookup_corner(cfg, oracle, cfg.area.north_east).await?;

    if south_west.id.zone != north_east.id.zone {
        return Err(FillError::ZoneMismatch {
            south_west: south_west.id.zone,
            north_east: north_east.id.zone,
        });
    }

    Ok((south_west, north_east))
}

async fn lookup_corner<O: Oracle>(
    cfg: &Config,
    oracle: &O,
    point: GeoPoint,
) -> Result<TileMetadata, FillError> {
    let meta = oracle
        .metadata_for_point(point, cfg.zoom, cfg.kind)
        .await
        .map_err(|source| FillError::CornerLookup { point, source })?;

    if meta.id.kind != cfg.kind || meta.id.zoom != cfg.zoom {
        return Err(FillError::Inconsistent {
            expected: format!("{} {}", cfg.kind, cfg.zoom),
            found: meta.id,
        });
    }

    Ok(meta)
}

fn lock(corners: &Mutex<CornerSet>) -> MutexGuard<'_, CornerSet> {
    corners.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn fill_slot<O: Oracle>(
    oracle: &O,
    base: &MapBase,
    corners: &Mutex<CornerSet>,
    id: TileId,
) -> SlotOutcome {
    let slot = id.slot;
    debug!(col = slot.col, row = slot.row, "processing slot");

    let outcome = |tile, corners_added| SlotOutcome {
        slot,
        tile,
        corners_added,
    };

    let meta = match oracle.metadata_for_tile_id(&id).await {
        Ok(meta) if meta.id == id => meta,
        Ok(meta) => {
            warn!(
                col = slot.col,
                row = slot.row,
                found = %meta.id,
                "service answered for another tile"
            );
            return outcome(TileOutcome::Missing, 0);
        }
        Err(e) => {
            report_oracle_error(slot, "metadata", &e);
            return outcome(TileOutcome::Missing, 0);
        }
    };

    let corner_slots = match meta.corner_slots() {
        Some(corner_slots) => corner_slots,
        None => {
            warn!(col = slot.col, row = slot.row, "tile lies on the edge of the grid");
            return outcome(TileOutcome::Missing, 0);
        }
    };
    let corners_added = add_corners(oracle, corners, meta.id.zoom, &corner_slots).await;

    let path = base.path_for(id.zoom, slot, id.kind);
    if MapBase::has(&path) {
        return outcome(TileOutcome::AlreadyPresent, corners_added);
    }

    let image = match oracle.fetch_image(&id).await {
        Ok(image) => image,
        Err(e) => {
            report_oracle_error(slot, "image", &e);
            return outcome(TileOutcome::Missing, corners_added);
        }
    };

    let tile = match MapBase::store(&path, &image).await {
        Ok(Stored::Written) => TileOutcome::Stored,
        Ok(Stored::AlreadyPresent) => TileOutcome::AlreadyPresent,
        Err(e) => {
            warn!(
                col = slot.col,
                row = slot.row,
                path = %path.display(),
                error = %e,
                "failed writing tile"
            );
            TileOutcome::WriteFailed
        }
    };

    outcome(tile, corners_added)
}

/// Records the corners in `corner_slots` that aren't known yet. Returns how
/// many were added.
async fn add_corners<O: Oracle>(
    oracle: &O,
    corners: &Mutex<CornerSet>,
    zoom: ZoomLevel,
    corner_slots: &[(Slot, GeoPoint)],
) -> usize {
    let mut added = 0;

    for &(slot, geo) in corner_slots {
        if lock(corners).contains(zoom, slot) {
            continue;
        }

        let projected = match oracle.project_point(geo).await {
            Ok(projected) => projected,
            Err(e) => {
                report_oracle_error(slot, "corner projection", &e);
                continue;
            }
        };

        let corner = TileCorner {
            zoom,
            slot,
            geo,
            projected,
        };
        if lock(corners).add_if_absent(corner) {
            added += 1;
        }
    }

    added
}

fn report_oracle_error(slot: Slot, what: &str, error: &OracleError) {
    match error {
        OracleError::NotFound(_) => {
            info!(col = slot.col, row = slot.row, %error, "no {} for slot", what)
        }
        OracleError::Transient(_) | OracleError::Unavailable(_) => {
            warn!(col = slot.col, row = slot.row, %error, "skipping {} for slot", what)
        }
    }
}

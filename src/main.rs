mod validators;

use anyhow::{Context, Result};
use clap::{
    app_from_crate, crate_authors, crate_description, crate_name, crate_version,
    AppSettings, Arg,
};
use std::{path::PathBuf, process, time::Duration};

use terrafill::*;
use validators::*;

const CORNER1_ARG: &str = "CORNER1";
const CORNER2_ARG: &str = "CORNER2";
const ZOOM_ARG: &str = "ZOOM";
const KIND_ARG: &str = "KIND";
const OUTPUT_ARG: &str = "OUTPUT";
const SERVICE_ARG: &str = "SERVICE";
const TILE_URL_ARG: &str = "TILE_URL";
const PARALLEL_FETCHES_ARG: &str = "PARALLEL_FETCHES";
const TIMEOUT_ARG: &str = "TIMEOUT";
const DRY_RUN_ARG: &str = "DRY_RUN";
const VERBOSE_ARG: &str = "VERBOSE";

const USAGE_EXIT_CODE: i32 = 2;
const APPROX_TILE_BYTES: f64 = 10_000f64;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = app_from_crate!()
        .setting(AppSettings::GlobalVersion)
        .setting(AppSettings::VersionlessSubcommands)
        .arg(
            Arg::with_name(CORNER1_ARG)
                .help("One corner of the rectangle, e.g. `47.60N,122.35W` or `47d36m00sN 122d21mW`")
                .validator(is_geo_point)
                .required(true)
                .allow_hyphen_values(true)
                .index(1),
        )
        .arg(
            Arg::with_name(CORNER2_ARG)
                .help("The opposite corner of the rectangle")
                .validator(is_geo_point)
                .required(true)
                .allow_hyphen_values(true)
                .index(2),
        )
        .arg(
            Arg::with_name(ZOOM_ARG)
                .help("Resolution in meters per pixel (1, 2, 4, ... 512)")
                .validator(is_zoom_level)
                .default_value("4")
                .takes_value(true)
                .short("z")
                .long("zoom"),
        )
        .arg(
            Arg::with_name(KIND_ARG)
                .help("The kind of imagery to fetch")
                .possible_values(&["photo", "topo"])
                .case_insensitive(true)
                .default_value("photo")
                .takes_value(true)
                .short("k")
                .long("kind"),
        )
        .arg(
            Arg::with_name(OUTPUT_ARG)
                .help("The map base folder tiles and corner files are stored in.")
                .default_value("tiles")
                .takes_value(true)
                .short("o")
                .long("output"),
        )
        .arg(
            Arg::with_name(SERVICE_ARG)
                .help("Base URL of the tile service's metadata endpoints.")
                .required(true)
                .takes_value(true)
                .short("u")
                .long("service"),
        )
        .arg(
            Arg::with_name(TILE_URL_ARG)
                .help("The URL template tile images are fetched from. Supports the format specifiers `{service}`, `{t}` (theme), `{s}` (scale), `{x}`, `{y}` and `{z}` (zone).")
                .default_value(DEFAULT_TILE_URL)
                .takes_value(true)
                .long("tile-url"),
        )
        .arg(
            Arg::with_name(PARALLEL_FETCHES_ARG)
                .help("The amount of tiles processed in parallel.")
                .validator(is_positive_u8)
                .default_value("4")
                .takes_value(true)
                .short("r")
                .long("rate"),
        )
        .arg(
            Arg::with_name(TIMEOUT_ARG)
                .help("The timeout (in seconds) for a single request to the service. Pass 0 for no timeout.")
                .validator(is_numeric::<u64>)
                .default_value("30")
                .takes_value(true)
                .short("t")
                .long("timeout"),
        )
        .arg(
            Arg::with_name(DRY_RUN_ARG)
                .help("Don't fetch any tiles, just determine how many are missing.")
                .takes_value(false)
                .long("dry-run"),
        )
        .arg(
            Arg::with_name(VERBOSE_ARG)
                .help("Report every processed tile")
                .takes_value(false)
                .short("v")
                .long("verbose"),
        )
        .get_matches_safe()
        .unwrap_or_else(|e| {
            if !e.use_stderr() {
                e.exit();
            }
            eprintln!("{}", e.message);
            process::exit(USAGE_EXIT_CODE);
        });

    logging::init_logging(matches.is_present(VERBOSE_ARG));

    let corner1: GeoPoint = matches.value_of(CORNER1_ARG).unwrap().parse()?;
    let corner2: GeoPoint = matches.value_of(CORNER2_ARG).unwrap().parse()?;

    let service = TileService::new(ServiceConfig {
        base_url: matches.value_of(SERVICE_ARG).unwrap().to_owned(),
        tile_url: UrlFormat::from_string(matches.value_of(TILE_URL_ARG).unwrap().to_owned()),
        timeout: Duration::from_secs(matches.value_of(TIMEOUT_ARG).unwrap().parse().unwrap()),
    })?;

    let config = Config {
        area: GeoBox::new(corner1, corner2),
        zoom: matches.value_of(ZOOM_ARG).unwrap().parse().unwrap(),
        kind: matches.value_of(KIND_ARG).unwrap().parse().unwrap(),
        map_base: PathBuf::from(matches.value_of(OUTPUT_ARG).unwrap()),
        fetch_rate: matches
            .value_of(PARALLEL_FETCHES_ARG)
            .unwrap()
            .parse()
            .unwrap(),
        progress: !matches.is_present(VERBOSE_ARG),
    };

    if config.map_base.exists() && !config.map_base.is_dir() {
        eprintln!(
            "error: {} is not a directory\n\n{}",
            config.map_base.display(),
            matches.usage()
        );
        process::exit(USAGE_EXIT_CODE);
    }

    let result = if matches.is_present(DRY_RUN_ARG) {
        plan(&config, &service).await.map(|plan| {
            let bytes = plan.missing_tiles as f64 * APPROX_TILE_BYTES;
            let size = pretty_bytes::converter::convert(bytes);
            eprintln!(
                "zone {}, slots {} to {}: would download {} of {} tiles \
                 (approx {}, assuming 10 kb per tile)",
                plan.zone,
                plan.range.min,
                plan.range.max,
                plan.missing_tiles,
                plan.total,
                size
            );
        })
    } else {
        fill(&config, &service).await.map(|report| {
            eprintln!(
                "{} tiles stored, {} already present, {} missing, {} failed, {} new corners",
                report.stored,
                report.already_present,
                report.missing.len(),
                report.failed.len(),
                report.corners_added,
            );
        })
    };

    match result {
        Err(e) if e.is_usage() => {
            eprintln!("error: {}\n\n{}", e, matches.usage());
            process::exit(USAGE_EXIT_CODE);
        }
        other => other.context("fill aborted"),
    }
}

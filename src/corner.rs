use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::geo::GeoPoint;
use crate::tile::{ProjectedPoint, Slot, ZoomLevel};

/// Geodetic and projected position of one grid-line intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileCorner {
    pub zoom: ZoomLevel,
    pub slot: Slot,
    pub geo: GeoPoint,
    pub projected: ProjectedPoint,
}

#[derive(Debug, Error)]
pub enum CornerFileError {
    #[error("failed reading corner file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed writing corner file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Deduplicated set of tile corners keyed by zoom level and slot.
///
/// The first corner seen for a key wins; later ones are dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CornerSet {
    corners: BTreeMap<(ZoomLevel, Slot), TileCorner>,
}

impl CornerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every given corner file into one set. Missing files contribute
    /// nothing.
    pub async fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CornerFileError> {
        let mut set = CornerSet::new();
        for path in paths {
            set.merge_file(path.as_ref()).await?;
        }
        Ok(set)
    }

    async fn merge_file(&mut self, path: &Path) -> Result<(), CornerFileError> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no corner file yet");
                return Ok(());
            }
            Err(source) => {
                return Err(CornerFileError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let corner = parse_line(line).map_err(|reason| CornerFileError::Malformed {
                path: path.to_owned(),
                line: idx + 1,
                reason,
            })?;
            self.add_if_absent(corner);
        }

        Ok(())
    }

    pub fn get(&self, zoom: ZoomLevel, slot: Slot) -> Option<&TileCorner> {
        self.corners.get(&(zoom, slot))
    }

    pub fn contains(&self, zoom: ZoomLevel, slot: Slot) -> bool {
        self.corners.contains_key(&(zoom, slot))
    }

    /// Inserts `corner` unless its key is taken. Returns whether it was
    /// inserted.
    pub fn add_if_absent(&mut self, corner: TileCorner) -> bool {
        use std::collections::btree_map::Entry;

        match self.corners.entry((corner.zoom, corner.slot)) {
            Entry::Vacant(entry) => {
                entry.insert(corner);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    /// All corners ordered by zoom level, column and row.
    pub fn iter(&self) -> impl Iterator<Item = &TileCorner> {
        self.corners.values()
    }

    /// Writes the whole set to `path`, replacing it atomically.
    pub async fn save(&self, path: &Path) -> Result<(), CornerFileError> {
        let write_err = |source| CornerFileError::Write {
            path: path.to_owned(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp = path.with_extension("txt.partial");
        let mut result = write_synced(&tmp, self.to_text().as_bytes()).await;
        if result.is_ok() {
            result = fs::rename(&tmp, path).await;
        }
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        debug!(path = %path.display(), corners = self.len(), "saved corner file");
        Ok(())
    }

    /// One line per corner: `zoom col row lat lon zone x y`.
    fn to_text(&self) -> String {
        let mut text = String::new();
        for c in self.iter() {
            let _ = writeln!(
                text,
                "{} {} {} {} {} {} {} {}",
                c.zoom.meters_per_pixel(),
                c.slot.col,
                c.slot.row,
                c.geo.lat,
                c.geo.lon,
                c.projected.zone,
                c.projected.x,
                c.projected.y,
            );
        }
        text
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn parse_line(line: &str) -> Result<TileCorner, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 8 {
        return Err(format!("expected 8 fields, found {}", fields.len()));
    }

    fn field<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, String> {
        value
            .parse()
            .map_err(|_| format!("invalid {} `{}`", name, value))
    }

    let meters: u16 = field(fields[0], "zoom level")?;
    let zoom = ZoomLevel::new(meters).ok_or_else(|| format!("invalid zoom level `{}`", meters))?;

    Ok(TileCorner {
        zoom,
        slot: Slot::new(field(fields[1], "column")?, field(fields[2], "row")?),
        geo: GeoPoint::new(field(fields[3], "latitude")?, field(fields[4], "longitude")?),
        projected: ProjectedPoint {
            zone: field(fields[5], "zone")?,
            x: field(fields[6], "x")?,
            y: field(fields[7], "y")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn corner(col: u32, row: u32, lat: f64) -> TileCorner {
        TileCorner {
            zoom: ZoomLevel::new(4).unwrap(),
            slot: Slot::new(col, row),
            geo: GeoPoint::new(lat, -122.123456789),
            projected: ProjectedPoint {
                zone: 10,
                x: col as i64 * 800,
                y: row as i64 * 800,
            },
        }
    }

    #[test]
    fn first_corner_wins() {
        let mut set = CornerSet::new();
        assert!(set.add_if_absent(corner(1, 2, 47.0)));
        assert!(!set.add_if_absent(corner(1, 2, 48.0)));
        assert_eq!(set.len(), 1);

        let zoom = ZoomLevel::new(4).unwrap();
        assert_eq!(set.get(zoom, Slot::new(1, 2)).unwrap().geo.lat, 47.0);
        assert!(set.get(zoom, Slot::new(2, 1)).is_none());
        assert!(set.get(ZoomLevel::new(8).unwrap(), Slot::new(1, 2)).is_none());
    }

    #[tokio::test]
    async fn save_then_load_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("corners-4m.txt");

        let mut set = CornerSet::new();
        set.add_if_absent(corner(3, 1, 47.000_000_000_1));
        set.add_if_absent(corner(1, 1, 46.1));
        set.add_if_absent(corner(2, 9, -0.1 + 0.2));
        set.save(&path).await.unwrap();

        let loaded = CornerSet::load(&[&path]).await.unwrap();
        assert_eq!(loaded, set);
        assert!(!path.with_extension("txt.partial").exists());
    }

    #[tokio::test]
    async fn saved_file_is_sorted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corners-4m.txt");

        let mut set = CornerSet::new();
        set.add_if_absent(corner(2, 0, 1.0));
        set.add_if_absent(corner(1, 5, 1.0));
        set.add_if_absent(corner(1, 4, 1.0));
        set.save(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<(u32, u32)> = text
            .lines()
            .map(|l| {
                let f: Vec<&str> = l.split(' ').collect();
                (f[1].parse().unwrap(), f[2].parse().unwrap())
            })
            .collect();
        assert_eq!(keys, vec![(1, 4), (1, 5), (2, 0)]);
    }

    #[tokio::test]
    async fn missing_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let set = CornerSet::load(&[dir.path().join("nope.txt")]).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn merges_several_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "4 1 1 47 -122 10 800 800\n").unwrap();
        std::fs::write(
            &b,
            "# comment\n\n4 1 1 50 -120 10 800 800\n4 2 1 47 -121 10 1600 800\n",
        )
        .unwrap();

        let set = CornerSet::load(&[&a, &b]).await.unwrap();
        let zoom = ZoomLevel::new(4).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(zoom, Slot::new(1, 1)).unwrap().geo.lat, 47.0);
    }

    #[tokio::test]
    async fn corrupt_file_names_the_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "4 1 1 47 -122 10 800 800\n4 1 x 47 -122 10 800 800\n").unwrap();

        match CornerSet::load(&[&path]).await {
            Err(CornerFileError::Malformed { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("row"));
            }
            other => panic!("unexpected result {:?}", other),
        }

        std::fs::write(&path, "3 1 1 47 -122 10 800 800\n").unwrap();
        assert!(CornerSet::load(&[&path]).await.is_err());

        std::fs::write(&path, "4 1 1 47 -122 10 800\n").unwrap();
        assert!(CornerSet::load(&[&path]).await.is_err());
    }

    #[tokio::test]
    async fn unwritable_target_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let mut set = CornerSet::new();
        set.add_if_absent(corner(0, 0, 1.0));
        let err = set.save(&blocker.join("corners-4m.txt")).await.unwrap_err();
        assert!(matches!(err, CornerFileError::Write { .. }));
    }
}

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::tile::{Kind, Slot, ZoomLevel};

/// Outcome of [`MapBase::store`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stored {
    Written,
    AlreadyPresent,
}

/// The on-disk root holding mirrored tiles and corner files.
///
/// Layout:
/// ```text
/// <root>/corners-<m>m.txt
/// <root>/<kind>/<m>m/<col>/<row>.<ext>
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct MapBase {
    root: PathBuf,
}

impl MapBase {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Where the image for the tile at `slot` lives.
    ///
    /// # Example
    /// ```rust
    /// # use terrafill::{Kind, MapBase, Slot, ZoomLevel};
    /// # use std::path::PathBuf;
    /// let base = MapBase::new("tiles");
    /// let zoom = ZoomLevel::new(4).unwrap();
    /// assert_eq!(
    ///     base.path_for(zoom, Slot::new(687, 6590), Kind::Photo),
    ///     PathBuf::from("tiles/photo/4m/687/6590.jpg"),
    /// );
    /// ```
    pub fn path_for(&self, zoom: ZoomLevel, slot: Slot, kind: Kind) -> PathBuf {
        let mut path = self.root.join(kind.name());
        path.push(zoom.to_string());
        path.push(slot.col.to_string());
        path.push(format!("{}.{}", slot.row, kind.extension()));
        path
    }

    pub fn corner_file_for(&self, zoom: ZoomLevel) -> PathBuf {
        self.root.join(format!("corners-{}.txt", zoom))
    }

    /// Whether something already sits at `path`. The content isn't checked.
    pub fn has(path: &Path) -> bool {
        path.exists()
    }

    /// Writes `bytes` to `path` unless a file is already there.
    ///
    /// The file is created exclusively, so concurrent writers for the same
    /// tile can't both succeed. A failed write removes the partial file.
    pub async fn store(path: &Path, bytes: &[u8]) -> io::Result<Stored> {
        if Self::has(path) {
            return Ok(Stored::AlreadyPresent);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(Stored::AlreadyPresent)
            }
            Err(e) => return Err(e),
        };

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(path).await;
            return Err(e);
        }

        Ok(Stored::Written)
    }
}

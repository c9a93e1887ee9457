use std::fmt;
use std::str::FromStr;

use crate::geo::GeoPoint;

const MAX_ZOOM_EXPONENT: u32 = 9;
const SCALE_CODE_BASE: u8 = 10;

/// Image category served by the tile service.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Kind {
    Photo,
    Topo,
}

impl Kind {
    /// The service's numeric theme for this kind.
    pub fn theme(self) -> u8 {
        match self {
            Kind::Photo => 1,
            Kind::Topo => 2,
        }
    }

    pub fn from_theme(theme: u8) -> Option<Self> {
        match theme {
            1 => Some(Kind::Photo),
            2 => Some(Kind::Topo),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Photo => "photo",
            Kind::Topo => "topo",
        }
    }

    /// File extension of the images the service returns for this kind.
    pub fn extension(self) -> &'static str {
        match self {
            Kind::Photo => "jpg",
            Kind::Topo => "gif",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "photo" => Ok(Kind::Photo),
            "topo" => Ok(Kind::Topo),
            _ => Err("kind must be `photo` or `topo`"),
        }
    }
}

/// Resolution tier of the tile grid in meters per pixel, a power of two
/// between 1 and 512.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ZoomLevel(u16);

impl ZoomLevel {
    pub fn new(meters_per_pixel: u16) -> Option<Self> {
        let valid = meters_per_pixel.is_power_of_two()
            && meters_per_pixel.trailing_zeros() <= MAX_ZOOM_EXPONENT;
        valid.then(|| ZoomLevel(meters_per_pixel))
    }

    pub fn meters_per_pixel(self) -> u16 {
        self.0
    }

    /// The service's scale code, `10` for 1 m/px, `11` for 2 m/px and so on.
    pub fn scale_code(self) -> u8 {
        SCALE_CODE_BASE + self.0.trailing_zeros() as u8
    }

    pub fn from_scale_code(code: u8) -> Option<Self> {
        let exponent = code.checked_sub(SCALE_CODE_BASE)? as u32;
        if exponent > MAX_ZOOM_EXPONENT {
            return None;
        }
        Some(ZoomLevel(1 << exponent))
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl FromStr for ZoomLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches('m');
        let meters = digits
            .parse::<u16>()
            .map_err(|_| "zoom must be numeric (meters per pixel)")?;
        ZoomLevel::new(meters).ok_or("zoom must be a power of two from 1 to 512")
    }
}

/// Discrete address of a tile, or of a tile corner, within one zoom level.
///
/// Columns grow eastward and rows grow northward.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Slot {
    pub col: u32,
    pub row: u32,
}

impl Slot {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.col, self.row)
    }
}

/// A point in the service's projected system, rounded to whole meters.
///
/// Grid corners always fall on exact multiples of the tile span, so rounding
/// makes independently computed corners for the same place compare equal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ProjectedPoint {
    pub zone: u8,
    pub x: i64,
    pub y: i64,
}

impl ProjectedPoint {
    pub fn from_meters(zone: u8, x: f64, y: f64) -> Self {
        Self {
            zone,
            x: x.round() as i64,
            y: y.round() as i64,
        }
    }
}

/// Identity of one fetchable tile image.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TileId {
    pub kind: Kind,
    pub zoom: ZoomLevel,
    pub zone: u8,
    pub slot: Slot,
}

impl TileId {
    /// Same kind, zoom and zone, different slot.
    pub fn with_slot(&self, slot: Slot) -> Self {
        TileId { slot, ..*self }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} zone {} slot {}",
            self.kind, self.zoom, self.zone, self.slot
        )
    }
}

/// Geodetic position of the four corners of one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileCorners {
    pub south_west: GeoPoint,
    pub south_east: GeoPoint,
    pub north_west: GeoPoint,
    pub north_east: GeoPoint,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileMetadata {
    pub id: TileId,
    pub corners: TileCorners,
}

impl TileMetadata {
    /// The corner slots of this tile with their geodetic positions.
    ///
    /// A tile at `(c, r)` owns corners `(c, r)`, `(c + 1, r)`, `(c, r + 1)`
    /// and `(c + 1, r + 1)`, each shared with its neighbours. `None` for a
    /// tile on the last column or row, whose outer corners have no slot.
    pub fn corner_slots(&self) -> Option<[(Slot, GeoPoint); 4]> {
        let Slot { col, row } = self.id.slot;
        let next_col = col.checked_add(1)?;
        let next_row = row.checked_add(1)?;
        Some([
            (Slot::new(col, row), self.corners.south_west),
            (Slot::new(next_col, row), self.corners.south_east),
            (Slot::new(col, next_row), self.corners.north_west),
            (Slot::new(next_col, next_row), self.corners.north_east),
        ])
    }
}

/// Inclusive rectangle of tile slots.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SlotRange {
    pub min: Slot,
    pub max: Slot,
}

impl SlotRange {
    pub fn new(a: Slot, b: Slot) -> Self {
        SlotRange {
            min: Slot::new(a.col.min(b.col), a.row.min(b.row)),
            max: Slot::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    pub fn len(&self) -> usize {
        let cols = (self.max.col - self.min.col) as usize + 1;
        let rows = (self.max.row - self.min.row) as usize + 1;
        cols * rows
    }

    /// Iterates all slots column by column.
    pub fn iter(&self) -> impl Iterator<Item = Slot> + fmt::Debug {
        let (min, max) = (self.min, self.max);

        (min.col..=max.col)
            .flat_map(move |col| (min.row..=max.row).map(move |row| Slot::new(col, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_levels() {
        assert_eq!(ZoomLevel::new(1).unwrap().scale_code(), 10);
        assert_eq!(ZoomLevel::new(64).unwrap().scale_code(), 16);
        assert_eq!(ZoomLevel::from_scale_code(12), ZoomLevel::new(4));
        assert_eq!(ZoomLevel::from_scale_code(9), None);
        assert_eq!(ZoomLevel::from_scale_code(20), None);
        assert_eq!(ZoomLevel::new(3), None);
        assert_eq!(ZoomLevel::new(1024), None);
        assert_eq!("8m".parse::<ZoomLevel>(), Ok(ZoomLevel(8)));
        assert!("0".parse::<ZoomLevel>().is_err());
    }

    #[test]
    fn kinds() {
        assert_eq!("TOPO".parse::<Kind>(), Ok(Kind::Topo));
        assert!("street".parse::<Kind>().is_err());
        assert_eq!(Kind::from_theme(Kind::Photo.theme()), Some(Kind::Photo));
    }

    #[test]
    fn rounding_makes_nearby_points_equal() {
        let a = ProjectedPoint::from_meters(10, 550_399.6, 5_272_000.4);
        let b = ProjectedPoint::from_meters(10, 550_400.2, 5_271_999.7);
        assert_eq!(a, b);
        assert_eq!(a.x, 550_400);
        assert_eq!(a.y, 5_272_000);
        assert_ne!(a, ProjectedPoint::from_meters(11, 550_400.0, 5_272_000.0));
    }

    #[test]
    fn corners_are_shared_with_neighbours() {
        let p = GeoPoint::new(0.0, 0.0);
        let corners = TileCorners {
            south_west: p,
            south_east: p,
            north_west: p,
            north_east: p,
        };
        let id = TileId {
            kind: Kind::Photo,
            zoom: ZoomLevel(1),
            zone: 10,
            slot: Slot::new(5, 7),
        };
        let left = TileMetadata { id, corners };
        let right = TileMetadata {
            id: id.with_slot(Slot::new(6, 7)),
            corners,
        };

        let left: Vec<Slot> = left.corner_slots().unwrap().iter().map(|c| c.0).collect();
        let right: Vec<Slot> = right.corner_slots().unwrap().iter().map(|c| c.0).collect();
        assert_eq!(
            left,
            vec![Slot::new(5, 7), Slot::new(6, 7), Slot::new(5, 8), Slot::new(6, 8)]
        );
        let shared: Vec<&Slot> = left.iter().filter(|s| right.contains(s)).collect();
        assert_eq!(shared, vec![&Slot::new(6, 7), &Slot::new(6, 8)]);
    }

    #[test]
    fn last_column_and_row_have_no_corner_slots() {
        let p = GeoPoint::new(0.0, 0.0);
        let corners = TileCorners {
            south_west: p,
            south_east: p,
            north_west: p,
            north_east: p,
        };
        let id = TileId {
            kind: Kind::Topo,
            zoom: ZoomLevel(4),
            zone: 10,
            slot: Slot::new(u32::MAX, 0),
        };

        let edge = TileMetadata { id, corners };
        assert_eq!(edge.corner_slots(), None);

        let top = TileMetadata {
            id: id.with_slot(Slot::new(3, u32::MAX)),
            corners,
        };
        assert_eq!(top.corner_slots(), None);

        let inner = TileMetadata {
            id: id.with_slot(Slot::new(u32::MAX - 1, 0)),
            corners,
        };
        assert_eq!(inner.corner_slots().unwrap()[3].0, Slot::new(u32::MAX, 1));
    }

    #[test]
    fn range_is_inclusive() {
        let range = SlotRange::new(Slot::new(4, 3), Slot::new(2, 3));
        let slots: Vec<Slot> = range.iter().collect();
        assert_eq!(range.len(), 3);
        assert_eq!(slots, vec![Slot::new(2, 3), Slot::new(3, 3), Slot::new(4, 3)]);

        let single = SlotRange::new(Slot::new(9, 9), Slot::new(9, 9));
        assert_eq!(single.iter().count(), 1);
    }
}

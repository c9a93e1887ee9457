use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A geodetic point in degrees, north and east positive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat < 0.0 { 'S' } else { 'N' };
        let ew = if self.lon < 0.0 { 'W' } else { 'E' };
        write!(f, "{}{},{}{}", self.lat.abs(), ns, self.lon.abs(), ew)
    }
}

impl FromStr for GeoPoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_lat_lon(s)
    }
}

/// A rectangle between a southwest and a northeast corner.
///
/// # Example
/// ```rust
/// # use terrafill::{GeoBox, GeoPoint};
/// let area = GeoBox::new(GeoPoint::new(47.7, -122.2), GeoPoint::new(47.6, -122.4));
/// assert_eq!(area.south_west, GeoPoint::new(47.6, -122.4));
/// assert_eq!(area.north_east, GeoPoint::new(47.7, -122.2));
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBox {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBox {
    /// Normalizes two arbitrary opposite corners, each axis independently.
    pub fn new(a: GeoPoint, b: GeoPoint) -> Self {
        GeoBox {
            south_west: GeoPoint::new(a.lat.min(b.lat), a.lon.min(b.lon)),
            north_east: GeoPoint::new(a.lat.max(b.lat), a.lon.max(b.lon)),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty coordinate")]
    Empty,

    #[error("malformed coordinate `{0}`")]
    Malformed(String),

    #[error("missing or unrecognized hemisphere letter in `{0}`")]
    Hemisphere(String),

    #[error("`{0}` is out of range")]
    OutOfRange(String),

    #[error("`{0}` must hold exactly one latitude and one longitude")]
    Axes(String),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Axis {
    Lat,
    Lon,
}

/// Parses a human-entered point such as `47.6N,122.3W`, `47d36m22sN 122d19m W`
/// or `122:19:55W 47:36:22N`.
///
/// The two components may come in either order; the hemisphere letter of
/// each one decides whether it's the latitude or the longitude.
pub fn parse_lat_lon(text: &str) -> Result<GeoPoint, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let parts = split_components(text);
    if parts.len() != 2 {
        return Err(ParseError::Axes(text.to_owned()));
    }

    let (axis_a, a) = parse_component(parts[0])?;
    let (axis_b, b) = parse_component(parts[1])?;

    match (axis_a, axis_b) {
        (Axis::Lat, Axis::Lon) => Ok(GeoPoint::new(a, b)),
        (Axis::Lon, Axis::Lat) => Ok(GeoPoint::new(b, a)),
        _ => Err(ParseError::Axes(text.to_owned())),
    }
}

/// Splits on a comma if there is one, otherwise right after the first
/// hemisphere letter whose next non-blank character is a digit.
fn split_components(text: &str) -> Vec<&str> {
    if text.contains(',') {
        return text.split(',').map(str::trim).collect();
    }

    let boundary = text.char_indices().find(|&(i, c)| {
        is_hemisphere(c)
            && text[i + c.len_utf8()..]
                .trim_start()
                .starts_with(|next: char| next.is_ascii_digit())
    });

    match boundary {
        Some((i, c)) => {
            let (head, tail) = text.split_at(i + c.len_utf8());
            vec![head.trim(), tail.trim()]
        }
        None => vec![text],
    }
}

fn is_hemisphere(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'N' | 'S' | 'E' | 'W')
}

fn parse_component(component: &str) -> Result<(Axis, f64), ParseError> {
    let hemisphere = component
        .chars()
        .last()
        .ok_or(ParseError::Empty)?
        .to_ascii_uppercase();

    let (axis, sign, limit) = match hemisphere {
        'N' => (Axis::Lat, 1.0, 90.0),
        'S' => (Axis::Lat, -1.0, 90.0),
        'E' => (Axis::Lon, 1.0, 180.0),
        'W' => (Axis::Lon, -1.0, 180.0),
        _ => return Err(ParseError::Hemisphere(component.to_owned())),
    };

    let magnitude = &component[..component.len() - 1];
    let degrees = parse_magnitude(magnitude)
        .ok_or_else(|| ParseError::Malformed(component.to_owned()))?;

    if !(0.0..=limit).contains(&degrees) {
        return Err(ParseError::OutOfRange(component.to_owned()));
    }

    Ok((axis, sign * degrees))
}

/// Degrees, degrees-minutes or degrees-minutes-seconds. Only the last field
/// may carry a fraction.
fn parse_magnitude(text: &str) -> Option<f64> {
    let fields: Vec<&str> = text
        .split(|c: char| matches!(c, 'd' | 'D' | '°' | ':' | 'm' | 'M' | '\'' | ' '))
        .map(|f| f.trim_end_matches(|c: char| matches!(c, 's' | 'S' | '"')))
        .filter(|f| !f.is_empty())
        .collect();

    let number = |f: &str| -> Option<f64> {
        if f.is_empty() || !f.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return None;
        }
        f.parse::<f64>().ok()
    };

    match fields.as_slice() {
        [d] => number(d),
        [d, m] if !d.contains('.') => {
            let (d, m) = (number(d)?, number(m)?);
            (m < 60.0).then(|| d + m / 60.0)
        }
        [d, m, s] if !d.contains('.') && !m.contains('.') => {
            let (d, m, s) = (number(d)?, number(m)?, number(s)?);
            (m < 60.0 && s < 60.0).then(|| d + m / 60.0 + s / 3600.0)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn whole_and_decimal_degrees() {
        assert_eq!(parse_lat_lon("47N,122W").unwrap(), GeoPoint::new(47.0, -122.0));
        assert_eq!(
            parse_lat_lon("47.25S, 12.5E").unwrap(),
            GeoPoint::new(-47.25, 12.5)
        );
    }

    #[test]
    fn degrees_minutes_seconds() {
        let p = parse_lat_lon("47d30m36sN 122d15mW").unwrap();
        assert!(close(p.lat, 47.51));
        assert!(close(p.lon, -122.25));

        let p = parse_lat_lon("47:30:36N,122:15:00W").unwrap();
        assert!(close(p.lat, 47.51));
        assert!(close(p.lon, -122.25));

        let p = parse_lat_lon("47°30'36\"N 122°15'W").unwrap();
        assert!(close(p.lat, 47.51));
        assert!(close(p.lon, -122.25));
    }

    #[test]
    fn seconds_marker_before_south_hemisphere() {
        let p = parse_lat_lon("33d52m12sS,151d12m36sE").unwrap();
        assert!(close(p.lat, -(33.0 + 52.0 / 60.0 + 12.0 / 3600.0)));
        assert!(close(p.lon, 151.21));
    }

    #[test]
    fn components_in_any_order() {
        assert_eq!(
            parse_lat_lon("122.5w 47.5n").unwrap(),
            GeoPoint::new(47.5, -122.5)
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_lat_lon("  "), Err(ParseError::Empty));
        assert!(matches!(parse_lat_lon("47X,122W"), Err(ParseError::Hemisphere(_))));
        assert!(matches!(parse_lat_lon("91N,122W"), Err(ParseError::OutOfRange(_))));
        assert!(matches!(parse_lat_lon("45N,181E"), Err(ParseError::OutOfRange(_))));
        assert!(matches!(parse_lat_lon("4a5N,122W"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_lat_lon("45d61mN,122W"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_lat_lon("45N,46S"), Err(ParseError::Axes(_))));
        assert!(matches!(parse_lat_lon("45N"), Err(ParseError::Axes(_))));
    }

    #[test]
    fn display_parses_back() {
        let p = GeoPoint::new(-33.87, 151.21);
        assert_eq!(p.to_string().parse::<GeoPoint>().unwrap(), p);
    }

    #[test]
    fn box_normalizes_each_axis() {
        let b = GeoBox::new(GeoPoint::new(10.0, 5.0), GeoPoint::new(2.0, 8.0));
        assert_eq!(b.south_west, GeoPoint::new(2.0, 5.0));
        assert_eq!(b.north_east, GeoPoint::new(10.0, 8.0));

        let same = GeoBox::new(GeoPoint::new(1.0, 1.0), GeoPoint::new(1.0, 1.0));
        assert_eq!(same.south_west, same.north_east);
    }
}

use std::str::FromStr;

use terrafill::{GeoPoint, ZoomLevel};

pub(crate) fn is_numeric<T: FromStr>(v: String) -> Result<(), String> {
    v.parse::<T>()
        .map(|_| ())
        .map_err(|_| "must be numeric".to_owned())
}

pub(crate) fn is_positive_u8(v: String) -> Result<(), String> {
    let val = v.parse::<u8>().map_err(|_| "must be numeric".to_owned())?;
    if val > 0 {
        Ok(())
    } else {
        Err("must be > 0".to_owned())
    }
}

pub(crate) fn is_geo_point(v: String) -> Result<(), String> {
    v.parse::<GeoPoint>().map(|_| ()).map_err(|e| e.to_string())
}

pub(crate) fn is_zoom_level(v: String) -> Result<(), String> {
    v.parse::<ZoomLevel>().map(|_| ()).map_err(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_points() {
        assert!(is_geo_point("47.6N,122.3W".into()).is_ok());
        assert!(is_geo_point("47.6,122.3".into()).is_err());
    }

    #[test]
    fn validates_zoom() {
        assert!(is_zoom_level("16".into()).is_ok());
        assert!(is_zoom_level("16m".into()).is_ok());
        assert!(is_zoom_level("5".into()).is_err());
    }

    #[test]
    fn validates_counts() {
        assert!(is_positive_u8("3".into()).is_ok());
        assert!(is_positive_u8("0".into()).is_err());
        assert!(is_numeric::<u64>("x".into()).is_err());
    }
}

//! Coordinate reference systems and join policy types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identified by EPSG code
///
/// Two systems are the same when their EPSG codes agree; the name is only
/// for display.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.epsg == other.epsg
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// Build a CRS from a bare EPSG code, naming the well-known ones
    pub fn from_epsg(epsg: u32) -> Self {
        let name = match epsg {
            4326 => "WGS 84",
            3857 => "Web Mercator",
            4258 => "ETRS89",
            25832 => "ETRS89 / UTM zone 32N",
            25833 => "ETRS89 / UTM zone 33N",
            31466 => "DHDN / 3-degree Gauss-Kruger zone 2",
            31467 => "DHDN / 3-degree Gauss-Kruger zone 3",
            31468 => "DHDN / 3-degree Gauss-Kruger zone 4",
            31469 => "DHDN / 3-degree Gauss-Kruger zone 5",
            _ => return Self::new(epsg, format!("EPSG:{}", epsg)),
        };
        Self::new(epsg, name)
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// ETRS89 / UTM zone 32N (EPSG:25832), used by most German district data
    pub fn etrs89_utm32n() -> Self {
        Self::from_epsg(25832)
    }

    /// Authority string understood by PROJ, e.g. `EPSG:4326`
    pub fn authority(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{} ({})", self.epsg, self.name)
    }
}

/// How many overlaps a base feature may contribute to a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Record every district a postal code overlaps
    #[default]
    All,
    /// Stop at the first intersecting candidate (legacy mapping output)
    FirstMatch,
}

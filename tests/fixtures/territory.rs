//! Real Las Vegas metro places for realistic service-day fixtures.
//!
//! Coordinates come from OpenStreetMap and are routable against OSRM
//! Nevada data. Places are grouped by the role they play in a test
//! territory rather than by what the business at the address sells.

use route_optimizer::geo::Coordinate;

/// A named, routable place.
#[derive(Debug, Clone, Copy)]
pub struct Place {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub const fn new(name: &'static str, latitude: f64, longitude: f64) -> Self {
        Self {
            name,
            latitude,
            longitude,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The branch office, mid valley.
pub const OFFICE: Place = Place::new("Mid-valley branch office", 36.1162, -115.1745);

// ============================================================================
// Pro home bases, one per corner of the metro
// ============================================================================

pub const NORTH_HOME: Place = Place::new("North valley home base", 36.1450055, -115.0482587);
pub const STRIP_HOME: Place = Place::new("Strip-adjacent home base", 36.1263781, -115.1658180);
pub const HENDERSON_HOME: Place = Place::new("Henderson home base", 36.0308, -115.0825);

// ============================================================================
// Customer sites by area
// ============================================================================

pub const STRIP_SITES: &[Place] = &[
    Place::new("Bellagio", 36.1126, -115.1767),
    Place::new("MGM Grand", 36.1023654, -115.1688720),
    Place::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Place::new("Grand Lux Cafe", 36.1216416, -115.1685024),
    Place::new("Spago by Wolfgang Puck", 36.1139368, -115.1741462),
    Place::new("Gordon Ramsay Steak", 36.1127744, -115.1712029),
];

pub const HENDERSON_SITES: &[Place] = &[
    Place::new("Sunset Station Area", 36.0614, -115.0631),
    Place::new("Buffalo Wild Wings Henderson", 36.0090449, -114.9917034),
    Place::new("Naga", 36.0137634, -114.9928676),
    Place::new("RibCage", 35.9949754, -115.0999810),
    Place::new("Islander's Grill", 36.0335058, -114.9856162),
];

pub const NORTH_SITES: &[Place] = &[
    Place::new("Roberto's Taco Shop", 36.1452953, -115.0478347),
    Place::new("Monarca Mexican Restaurant", 36.1440711, -115.0634197),
    Place::new("La Costa del Sol", 36.1470458, -115.0644345),
    Place::new("Beers and Bets", 36.1428945, -115.1573836),
];

pub const EAST_SITES: &[Place] = &[
    Place::new("Original Lindo Michoacan", 36.1294005, -115.1135106),
    Place::new("Tomo Sushi", 36.0992464, -115.1142123),
    Place::new("Chuck Wagon Restaurant", 36.1072491, -115.0593482),
    Place::new("Pei Wei Town Square", 36.0810469, -115.1472694),
];

/// Sites spread over the whole metro, for multi-route days.
pub fn spread_sites() -> Vec<Place> {
    vec![
        NORTH_SITES[0],
        NORTH_SITES[1],
        STRIP_SITES[0],
        STRIP_SITES[1],
        STRIP_SITES[3],
        HENDERSON_SITES[0],
        HENDERSON_SITES[4],
        EAST_SITES[0],
        EAST_SITES[3],
    ]
}

/// Sites within a few blocks of each other, for overload tests where
/// travel time should barely matter.
pub fn strip_cluster() -> Vec<Place> {
    vec![
        Place::new("Rao's", 36.1163982, -115.1763053),
        Place::new("Beijing Noodle No. 9", 36.1158277, -115.1758038),
        Place::new("Bacchanal Buffet", 36.1159581, -115.1762929),
        Place::new("Mr Chow", 36.1161158, -115.1761223),
        Place::new("Le Cirque", 36.1135689, -115.1749763),
        Place::new("Payard Patisserie", 36.1166582, -115.1759111),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_place_sits_in_the_vegas_metro() {
        let mut places = vec![OFFICE, NORTH_HOME, STRIP_HOME, HENDERSON_HOME];
        places.extend_from_slice(STRIP_SITES);
        places.extend_from_slice(HENDERSON_SITES);
        places.extend_from_slice(NORTH_SITES);
        places.extend_from_slice(EAST_SITES);
        places.extend(spread_sites());
        places.extend(strip_cluster());
        for place in places {
            assert!(
                place.latitude > 35.9 && place.latitude < 36.3,
                "{} latitude out of range: {}",
                place.name,
                place.latitude
            );
            assert!(
                place.longitude > -115.4 && place.longitude < -114.8,
                "{} longitude out of range: {}",
                place.name,
                place.longitude
            );
        }
    }
}

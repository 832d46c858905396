//! Coordinate resolution for map placement.

use super::model::CountryMetric;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const ORIGIN: GeoPoint = GeoPoint { lat: 0.0, lng: 0.0 };

    /// Finite and within `|lat| <= 90`, `|lng| <= 180`.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

/// Where a resolved coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSource {
    Embedded,
    Reference,
    Fallback,
}

/// Anything that can be placed on the map.
pub trait Locatable {
    fn embedded_coordinates(&self) -> (Option<f64>, Option<f64>);
    fn display_name(&self) -> &str;
    fn code(&self) -> Option<&str> {
        None
    }
}

impl Locatable for CountryMetric {
    fn embedded_coordinates(&self) -> (Option<f64>, Option<f64>) {
        (self.lat, self.lng)
    }

    fn display_name(&self) -> &str {
        CountryMetric::display_name(self)
    }

    fn code(&self) -> Option<&str> {
        Some(&self.country_code)
    }
}

/// Resolves `entity` to a usable coordinate pair. Never fails.
pub fn resolve<E: Locatable + ?Sized>(entity: &E) -> GeoPoint {
    resolve_with_source(entity).0
}

pub fn resolve_with_source<E: Locatable + ?Sized>(entity: &E) -> (GeoPoint, CoordinateSource) {
    if let (Some(lat), Some(lng)) = entity.embedded_coordinates() {
        let point = GeoPoint { lat, lng };
        if point.is_valid() {
            return (point, CoordinateSource::Embedded);
        }
    }
    if let Some(point) = lookup_name(entity.display_name())
        .or_else(|| entity.code().and_then(lookup_code))
    {
        return (point, CoordinateSource::Reference);
    }
    (GeoPoint::ORIGIN, CoordinateSource::Fallback)
}

/// Case-insensitive lookup in the country reference table by display name.
pub fn lookup_name(name: &str) -> Option<GeoPoint> {
    let name = name.trim();
    COUNTRY_COORDINATES
        .iter()
        .find(|(n, _, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, _, lat, lng)| GeoPoint { lat, lng })
}

/// Lookup by ISO 3166 alpha-3 code.
pub fn lookup_code(code: &str) -> Option<GeoPoint> {
    let code = code.trim();
    COUNTRY_COORDINATES
        .iter()
        .find(|(_, c, _, _)| c.eq_ignore_ascii_case(code))
        .map(|&(_, _, lat, lng)| GeoPoint { lat, lng })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Default framing when nothing on the map has a known position.
    pub const WORLD: Bounds = Bounds {
        south: -60.0,
        west: -180.0,
        north: 85.0,
        east: 180.0,
    };

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }

    /// Grows the box by `degrees` on every side, staying within valid ranges.
    pub fn padded(&self, degrees: f64) -> Bounds {
        let d = if degrees.is_finite() { degrees.max(0.0) } else { 0.0 };
        Bounds {
            south: (self.south - d).max(-90.0),
            west: (self.west - d).max(-180.0),
            north: (self.north + d).min(90.0),
            east: (self.east + d).min(180.0),
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }
}

/// Smallest box around every entity with a known position. Entities that only
/// resolve to the origin fallback are left out.
pub fn compute_bounds<'a, E, I>(entities: I) -> Bounds
where
    E: Locatable + 'a,
    I: IntoIterator<Item = &'a E>,
{
    entities
        .into_iter()
        .map(resolve_with_source)
        .filter(|(_, source)| *source != CoordinateSource::Fallback)
        .fold(None, |acc: Option<Bounds>, (p, _)| {
            Some(match acc {
                None => Bounds {
                    south: p.lat,
                    west: p.lng,
                    north: p.lat,
                    east: p.lng,
                },
                Some(b) => Bounds {
                    south: b.south.min(p.lat),
                    west: b.west.min(p.lng),
                    north: b.north.max(p.lat),
                    east: b.east.max(p.lng),
                },
            })
        })
        .unwrap_or(Bounds::WORLD)
}

/// Approximate country centroids: (name, ISO alpha-3, lat, lng).
static COUNTRY_COORDINATES: &[(&str, &str, f64, f64)] = &[
    ("United States", "USA", 39.8, -98.6),
    ("Canada", "CAN", 56.1, -106.3),
    ("Mexico", "MEX", 23.6, -102.6),
    ("Brazil", "BRA", -14.2, -51.9),
    ("Argentina", "ARG", -38.4, -63.6),
    ("Chile", "CHL", -35.7, -71.5),
    ("Colombia", "COL", 4.6, -74.3),
    ("Peru", "PER", -9.2, -75.0),
    ("Venezuela", "VEN", 6.4, -66.6),
    ("Ecuador", "ECU", -1.8, -78.2),
    ("Costa Rica", "CRI", 9.7, -83.8),
    ("Guatemala", "GTM", 15.8, -90.2),
    ("Honduras", "HND", 15.2, -86.2),
    ("Dominican Republic", "DOM", 18.7, -70.2),
    ("United Kingdom", "GBR", 55.4, -3.4),
    ("Ireland", "IRL", 53.4, -8.2),
    ("France", "FRA", 46.2, 2.2),
    ("Germany", "DEU", 51.2, 10.5),
    ("Italy", "ITA", 41.9, 12.6),
    ("Spain", "ESP", 40.5, -3.7),
    ("Portugal", "PRT", 39.4, -8.2),
    ("Netherlands", "NLD", 52.1, 5.3),
    ("Belgium", "BEL", 50.5, 4.5),
    ("Switzerland", "CHE", 46.8, 8.2),
    ("Austria", "AUT", 47.5, 14.6),
    ("Sweden", "SWE", 60.1, 18.6),
    ("Norway", "NOR", 60.5, 8.5),
    ("Denmark", "DNK", 56.3, 9.5),
    ("Finland", "FIN", 61.9, 25.7),
    ("Poland", "POL", 51.9, 19.1),
    ("Czech Republic", "CZE", 49.8, 15.5),
    ("Hungary", "HUN", 47.2, 19.5),
    ("Greece", "GRC", 39.1, 21.8),
    ("Turkey", "TUR", 39.0, 35.2),
    ("Russia", "RUS", 61.5, 105.3),
    ("Ukraine", "UKR", 48.4, 31.2),
    ("Israel", "ISR", 31.0, 34.9),
    ("Saudi Arabia", "SAU", 23.9, 45.1),
    ("United Arab Emirates", "ARE", 23.4, 53.8),
    ("Qatar", "QAT", 25.4, 51.2),
    ("Egypt", "EGY", 26.8, 30.8),
    ("Morocco", "MAR", 31.8, -7.1),
    ("Nigeria", "NGA", 9.1, 8.7),
    ("South Africa", "ZAF", -30.6, 22.9),
    ("Kenya", "KEN", 0.0, 37.9),
    ("Ethiopia", "ETH", 9.1, 40.5),
    ("China", "CHN", 35.9, 104.2),
    ("Hong Kong", "HKG", 22.3, 114.2),
    ("Taiwan", "TWN", 23.7, 121.0),
    ("Japan", "JPN", 36.2, 138.3),
    ("South Korea", "KOR", 35.9, 127.8),
    ("India", "IND", 20.6, 79.0),
    ("Pakistan", "PAK", 30.4, 69.3),
    ("Bangladesh", "BGD", 23.7, 90.4),
    ("Sri Lanka", "LKA", 7.9, 80.8),
    ("Vietnam", "VNM", 14.1, 108.3),
    ("Thailand", "THA", 15.9, 100.9),
    ("Malaysia", "MYS", 4.2, 101.98),
    ("Singapore", "SGP", 1.35, 103.8),
    ("Indonesia", "IDN", -0.8, 113.9),
    ("Philippines", "PHL", 12.9, 121.8),
    ("Cambodia", "KHM", 12.6, 105.0),
    ("Australia", "AUS", -25.3, 133.8),
    ("New Zealand", "NZL", -40.9, 174.9),
    ("European Union", "EUU", 50.1, 9.3),
];

//! Spherical-earth helpers for radius searches over station coordinates.

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Inclusive lat/long rectangle used as a cheap pre-filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Point reached by travelling `distance_m` from `origin` along `bearing_deg` (clockwise from north).
pub fn destination_point(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    GeoPoint {
        lat: phi2.to_degrees(),
        lon: normalize_lon(lambda2.to_degrees()),
    }
}

/// Rectangle enclosing every point within `radius_m` of `center`.
///
/// Latitude bounds are the destination points due north and south. The
/// longitude half-width is taken at the tangent point of the circle, which is
/// wider than the due east/west destinations away from the equator. When the
/// circle reaches a pole or crosses the antimeridian the longitude range widens
/// to the whole globe.
pub fn bounding_box(center: GeoPoint, radius_m: f64) -> BoundingBox {
    if radius_m <= 0.0 {
        return BoundingBox {
            min_lat: center.lat,
            max_lat: center.lat,
            min_lon: center.lon,
            max_lon: center.lon,
        };
    }

    let delta = radius_m / EARTH_RADIUS_M;
    let phi = center.lat.to_radians();

    let north = destination_point(center, 0.0, radius_m);
    let south = destination_point(center, 180.0, radius_m);
    let reaches_north_pole = phi + delta >= std::f64::consts::FRAC_PI_2;
    let reaches_south_pole = phi - delta <= -std::f64::consts::FRAC_PI_2;

    let max_lat = if reaches_north_pole { 90.0 } else { north.lat };
    let min_lat = if reaches_south_pole { -90.0 } else { south.lat };

    if reaches_north_pole || reaches_south_pole || delta.sin() >= phi.cos() {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    let half_width = (delta.sin() / phi.cos()).asin().to_degrees();
    let min_lon = center.lon - half_width;
    let max_lon = center.lon + half_width;
    if min_lon < -180.0 || max_lon > 180.0 {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

fn normalize_lon(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}

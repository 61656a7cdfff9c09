//! Spherical Web Mercator (EPSG:3857) projection.
//!
//! Used to measure footprint areas in metres. Web Mercator inflates areas
//! away from the equator; values are comparable with common web-mapping
//! tools, not true ground areas.

use std::f64::consts::FRAC_PI_4;

use geo::{Area as _, Coord, Geometry, MapCoords as _};

/// Semi-major axis of the WGS84 ellipsoid, used as the sphere radius.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes a square world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Projects a longitude/latitude coordinate to Web Mercator metres.
/// Latitudes beyond [`MAX_LATITUDE`] are clamped.
#[must_use]
pub fn to_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    Coord {
        x: EARTH_RADIUS_M * coord.x.to_radians(),
        y: EARTH_RADIUS_M * lat.to_radians().mul_add(0.5, FRAC_PI_4).tan().ln(),
    }
}

/// Inverse of [`to_web_mercator`].
#[must_use]
pub fn from_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (coord.x / EARTH_RADIUS_M).to_degrees(),
        y: (2.0f64.mul_add((coord.y / EARTH_RADIUS_M).exp().atan(), -2.0 * FRAC_PI_4))
            .to_degrees(),
    }
}

/// Projects every coordinate of an EPSG:4326 geometry to EPSG:3857.
#[must_use]
pub fn project_to_web_mercator(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(to_web_mercator)
}

/// Unprojects every coordinate of an EPSG:3857 geometry to EPSG:4326.
#[must_use]
pub fn project_to_geographic(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(from_web_mercator)
}

/// Planar area of an EPSG:4326 geometry measured in Web Mercator square
/// metres.
#[must_use]
pub fn web_mercator_area(geometry: &Geometry<f64>) -> f64 {
    project_to_web_mercator(geometry).unsigned_area()
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn origin_maps_to_origin() {
        let projected = to_web_mercator(Coord { x: 0.0, y: 0.0 });
        assert!(projected.x.abs() < 1e-9);
        assert!(projected.y.abs() < 1e-9);
    }

    #[test]
    fn antimeridian_maps_to_half_circumference() {
        let projected = to_web_mercator(Coord { x: 180.0, y: 0.0 });
        assert!((projected.x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn round_trips_coordinates() {
        let original = Coord { x: 85.324, y: 27.7172 };
        let back = from_web_mercator(to_web_mercator(original));
        assert!((back.x - original.x).abs() < 1e-9);
        assert!((back.y - original.y).abs() < 1e-9);
    }

    #[test]
    fn clamps_polar_latitudes() {
        let pole = to_web_mercator(Coord { x: 0.0, y: 90.0 });
        assert!(pole.y.is_finite());
        let limit = to_web_mercator(Coord { x: 0.0, y: MAX_LATITUDE });
        assert!((pole.y - limit.y).abs() < 1e-6);
    }

    #[test]
    fn measures_equatorial_degree_square() {
        let square = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]);

        // One degree of longitude is ~111.32 km. Mercator stretches the
        // northern edge slightly, so the area is just above that squared.
        let area = web_mercator_area(&square);
        let degree = EARTH_RADIUS_M.to_radians();
        assert!(area > degree * degree);
        assert!(area < degree * degree * 1.001);
    }

    #[test]
    fn unprojects_geometry() {
        let square = Geometry::Polygon(polygon![
            (x: 10.0, y: 45.0),
            (x: 11.0, y: 45.0),
            (x: 11.0, y: 46.0),
            (x: 10.0, y: 45.0),
        ]);
        let back = project_to_geographic(&project_to_web_mercator(&square));
        let geo::Geometry::Polygon(poly) = back else {
            panic!("expected polygon");
        };
        let first = poly.exterior().0[0];
        assert!((first.x - 10.0).abs() < 1e-9);
        assert!((first.y - 45.0).abs() < 1e-9);
    }
}

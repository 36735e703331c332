/// Boundary polygon containment test used to scope station discovery.
///
/// The polygon arrives from an external collaborator already reprojected to
/// WGS84 decimal degrees (lat, lon). Containment uses the even-odd crossing
/// rule with an explicit edge-membership check first, so points exactly on
/// the boundary count as inside. Correct for non-convex rings.

use crate::model::AcquireError;

/// Tolerance for the point-on-edge test, in degrees. About 1 cm at the
/// equator — far below any station coordinate precision.
const EDGE_EPSILON: f64 = 1e-7;

/// Axis-aligned bounding box of a boundary, in decimal degrees.
///
/// Provider catalogs are queried by bounding box first (the services accept
/// only rectangular extents); exact polygon filtering happens afterwards in
/// `discovery`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// A closed boundary ring of (latitude, longitude) vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    /// Distinct vertices; the closing vertex is implicit (last connects to
    /// first).
    vertices: Vec<(f64, f64)>,
}

impl BoundaryPolygon {
    /// Builds a polygon from an ordered vertex list.
    ///
    /// A repeated closing vertex (`first == last`) is accepted and
    /// collapsed. Fails with `InvalidGeometry` if fewer than 3 distinct
    /// vertices remain or any coordinate is non-finite.
    pub fn new(mut vertices: Vec<(f64, f64)>) -> Result<Self, AcquireError> {
        if vertices.len() >= 2 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        if vertices.len() < 3 {
            return Err(AcquireError::InvalidGeometry(format!(
                "polygon needs at least 3 distinct vertices, got {}",
                vertices.len()
            )));
        }
        if vertices
            .iter()
            .any(|&(lat, lon)| !lat.is_finite() || !lon.is_finite())
        {
            return Err(AcquireError::InvalidGeometry(
                "polygon contains non-finite coordinates".to_string(),
            ));
        }

        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Even-odd containment test; boundary points are inside.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if !lat.is_finite() || !lon.is_finite() {
            return false;
        }
        if self.on_boundary(lat, lon) {
            return true;
        }

        // Ray crossing count: treat (lon, lat) as (x, y) and cast the ray
        // in the +x direction.
        let (x, y) = (lon, lat);
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (yi, xi) = self.vertices[i];
            let (yj, xj) = self.vertices[j];
            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// True if the point lies on one of the ring's edges (within
    /// `EDGE_EPSILON`).
    fn on_boundary(&self, lat: f64, lon: f64) -> bool {
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (ay, ax) = self.vertices[j];
            let (by, bx) = self.vertices[i];
            if point_on_segment(lon, lat, ax, ay, bx, by) {
                return true;
            }
            j = i;
        }
        false
    }

    /// Smallest axis-aligned box covering the ring.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            south: f64::INFINITY,
            west: f64::INFINITY,
            north: f64::NEG_INFINITY,
            east: f64::NEG_INFINITY,
        };
        for &(lat, lon) in &self.vertices {
            bbox.south = bbox.south.min(lat);
            bbox.north = bbox.north.max(lat);
            bbox.west = bbox.west.min(lon);
            bbox.east = bbox.east.max(lon);
        }
        bbox
    }
}

/// Collinearity + projection test for a point against segment (a, b).
fn point_on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    let dot = (px - ax) * (bx - ax) + (py - ay) * (by - ay);
    let len_sq = (bx - ax).powi(2) + (by - ay).powi(2);
    dot >= -EDGE_EPSILON && dot <= len_sq + EDGE_EPSILON
}

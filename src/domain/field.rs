use geo::{BoundingRect, Centroid, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

pub const HECTARES_TO_ACRES: f64 = 2.47105;

/// Geographic coordinate (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned geographic bounding box. Invariant: west < east, south < north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// Identity and geometry of a single field. Created externally; read-only
/// to the analysis core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoundary {
    pub id: String,
    pub farm_id: String,
    pub name: String,
    pub area_hectares: f64,
    /// Ordered polygon ring; the closing vertex may repeat the first.
    pub vertices: Vec<GeoPoint>,
}

impl FieldBoundary {
    /// Validate the boundary: at least three distinct vertices, coordinates
    /// in range, positive area, and a simple (non-self-intersecting) ring.
    ///
    /// A missing or degenerate polygon is an input error; the core never
    /// substitutes synthetic coordinates.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.id.is_empty() {
            return Err(AnalysisError::invalid_input("field id must not be empty"));
        }
        if !(self.area_hectares.is_finite() && self.area_hectares > 0.0) {
            return Err(AnalysisError::invalid_input(format!(
                "field {} area must be positive, got {}",
                self.id, self.area_hectares
            )));
        }

        let ring = self.ring();
        if ring.len() < 3 {
            return Err(AnalysisError::invalid_input(format!(
                "field {} boundary needs at least 3 vertices, got {}",
                self.id,
                ring.len()
            )));
        }

        for v in ring {
            if !v.lat.is_finite() || !v.lng.is_finite() {
                return Err(AnalysisError::invalid_input(format!(
                    "field {} boundary has a non-finite vertex",
                    self.id
                )));
            }
            if !(-90.0..=90.0).contains(&v.lat) || !(-180.0..=180.0).contains(&v.lng) {
                return Err(AnalysisError::invalid_input(format!(
                    "field {} boundary vertex ({}, {}) out of range",
                    self.id, v.lat, v.lng
                )));
            }
        }

        if self_intersects(ring) {
            return Err(AnalysisError::invalid_input(format!(
                "field {} boundary polygon self-intersects",
                self.id
            )));
        }

        let bbox = self.bounding_box()?;
        if bbox.west >= bbox.east || bbox.south >= bbox.north {
            return Err(AnalysisError::invalid_input(format!(
                "field {} boundary is degenerate (zero-extent bounding box)",
                self.id
            )));
        }

        Ok(())
    }

    /// Axis-aligned bounding box covering the boundary.
    pub fn bounding_box(&self) -> AnalysisResult<BoundingBox> {
        let rect = self.polygon().bounding_rect().ok_or_else(|| {
            AnalysisError::invalid_input(format!("field {} boundary has no extent", self.id))
        })?;
        Ok(BoundingBox {
            west: rect.min().x,
            south: rect.min().y,
            east: rect.max().x,
            north: rect.max().y,
        })
    }

    /// Area-weighted centroid of the boundary polygon.
    pub fn centroid(&self) -> AnalysisResult<GeoPoint> {
        let point = self.polygon().centroid().ok_or_else(|| {
            AnalysisError::invalid_input(format!("field {} boundary has no centroid", self.id))
        })?;
        Ok(GeoPoint::new(point.y(), point.x()))
    }

    pub fn area_acres(&self) -> f64 {
        self.area_hectares * HECTARES_TO_ACRES
    }

    /// The vertex ring without the closing duplicate, if present.
    fn ring(&self) -> &[GeoPoint] {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) if self.vertices.len() > 1 && first == last => {
                &self.vertices[..self.vertices.len() - 1]
            }
            _ => &self.vertices,
        }
    }

    fn polygon(&self) -> Polygon<f64> {
        let coords: Vec<(f64, f64)> = self.ring().iter().map(|v| (v.lng, v.lat)).collect();
        Polygon::new(LineString::from(coords), vec![])
    }
}

/// Orientation of the ordered triple (a, b, c): 0 collinear, 1 clockwise,
/// 2 counter-clockwise.
fn orientation(a: GeoPoint, b: GeoPoint, c: GeoPoint) -> u8 {
    let cross = (b.lng - a.lng) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lng - a.lng);
    if cross.abs() < 1e-12 {
        0
    } else if cross < 0.0 {
        1
    } else {
        2
    }
}

fn on_segment(a: GeoPoint, b: GeoPoint, p: GeoPoint) -> bool {
    p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

fn segments_intersect(p1: GeoPoint, p2: GeoPoint, q1: GeoPoint, q2: GeoPoint) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(p1, p2, q1))
        || (o2 == 0 && on_segment(p1, p2, q2))
        || (o3 == 0 && on_segment(q1, q2, p1))
        || (o4 == 0 && on_segment(q1, q2, p2))
}

/// Pairwise edge test over non-adjacent edges of the ring.
fn self_intersects(ring: &[GeoPoint]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            // Skip adjacent edges (they share a vertex by construction)
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (p1, p2) = (ring[i], ring[(i + 1) % n]);
            let (q1, q2) = (ring[j], ring[(j + 1) % n]);
            if segments_intersect(p1, p2, q1, q2) {
                return true;
            }
        }
    }
    false
}

// src/models/reference.rs - Reference (target dataset) address features
use geo::{BoundingRect, Centroid};
use geo_types::{LineString, MultiPolygon, Point, Rect};

use crate::models::address::AddressTags;

/// Geometry shapes a reference address can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceGeometry {
    Point(Point<f64>),
    Area(MultiPolygon<f64>),
    /// Address interpolation lines; kept but never filed by block.
    Line(LineString<f64>),
}

impl ReferenceGeometry {
    pub fn kind(&self) -> &'static str {
        match self {
            ReferenceGeometry::Point(_) => "Point",
            ReferenceGeometry::Area(_) => "MultiPolygon",
            ReferenceGeometry::Line(_) => "LineString",
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            ReferenceGeometry::Point(p) => Some(p.bounding_rect()),
            ReferenceGeometry::Area(mp) => mp.bounding_rect(),
            ReferenceGeometry::Line(ls) => ls.bounding_rect(),
        }
    }

    /// The point itself, or the centroid of an area or line.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        match self {
            ReferenceGeometry::Point(p) => Some(*p),
            ReferenceGeometry::Area(mp) => mp.centroid(),
            ReferenceGeometry::Line(ls) => ls.centroid(),
        }
    }
}

/// An address already present in the target dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAddress {
    /// Stable identity such as `way/1234`.
    pub id: String,
    pub tags: AddressTags,
    pub geometry: ReferenceGeometry,
}

impl ReferenceAddress {
    pub fn new(id: impl Into<String>, tags: AddressTags, geometry: ReferenceGeometry) -> Self {
        Self {
            id: id.into(),
            tags,
            geometry,
        }
    }

    pub fn area(&self) -> Option<&MultiPolygon<f64>> {
        match &self.geometry {
            ReferenceGeometry::Area(mp) => Some(mp),
            _ => None,
        }
    }
}

// src/models/address.rs - Address records and their well-known tags
use std::collections::BTreeMap;

use geo_types::Point;
use serde::{Deserialize, Serialize};

pub const TAG_UNIT: &str = "addr:unit";
pub const TAG_HOUSENUMBER: &str = "addr:housenumber";
pub const TAG_STREET: &str = "addr:street";
pub const TAG_SUBURB: &str = "addr:suburb";
pub const TAG_STATE: &str = "addr:state";
pub const TAG_POSTCODE: &str = "addr:postcode";
pub const TAG_FLATS: &str = "addr:flats";
pub const TAG_TRACE: &str = "_pfi";

/// Attribute set of an address feature, keyed by the tag names used on output.
/// Tags this crate does not interpret are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressTags {
    #[serde(rename = "addr:unit", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "addr:housenumber", default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(rename = "addr:street", default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "addr:suburb", default, skip_serializing_if = "Option::is_none")]
    pub suburb: Option<String>,
    #[serde(rename = "addr:state", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "addr:postcode", default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(rename = "addr:flats", default, skip_serializing_if = "Option::is_none")]
    pub flats: Option<String>,
    /// Opaque source trace identifier, concatenated with `,` when records are merged.
    #[serde(rename = "_pfi", default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Grouping key over every descriptive attribute: unit, number, street, suburb, state, postcode.
pub type AddressKey = [Option<String>; 6];
/// Grouping key over street, suburb, state and postcode.
pub type StreetKey = [Option<String>; 4];
/// Grouping key over every descriptive attribute except the unit.
pub type NonUnitKey = [Option<String>; 5];

/// A point address feature. `location` is `None` when the input carried no usable geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub tags: AddressTags,
    pub location: Option<Point<f64>>,
}

impl AddressRecord {
    pub fn new(tags: AddressTags, location: Option<Point<f64>>) -> Self {
        Self { tags, location }
    }

    pub fn at(lon: f64, lat: f64, tags: AddressTags) -> Self {
        Self::new(tags, Some(Point::new(lon, lat)))
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.tags.trace_id.as_deref()
    }

    pub fn house_number(&self) -> Option<&str> {
        self.tags.house_number.as_deref()
    }

    /// True when the house number denotes a span such as `304-306`.
    pub fn is_range(&self) -> bool {
        self.house_number().map_or(false, |n| n.contains('-'))
    }

    pub fn address_key(&self) -> AddressKey {
        let t = &self.tags;
        [
            t.unit.clone(),
            t.house_number.clone(),
            t.street.clone(),
            t.suburb.clone(),
            t.state.clone(),
            t.postcode.clone(),
        ]
    }

    pub fn street_key(&self) -> StreetKey {
        let t = &self.tags;
        [
            t.street.clone(),
            t.suburb.clone(),
            t.state.clone(),
            t.postcode.clone(),
        ]
    }

    pub fn non_unit_key(&self) -> NonUnitKey {
        let t = &self.tags;
        [
            t.house_number.clone(),
            t.street.clone(),
            t.suburb.clone(),
            t.state.clone(),
            t.postcode.clone(),
        ]
    }

    /// Exact bitwise coordinate key, so records only group when their geometry is identical.
    pub fn coordinate_key(&self) -> Option<(u64, u64)> {
        self.location.map(|p| (p.x().to_bits(), p.y().to_bits()))
    }

    pub fn same_location(&self, other: &AddressRecord) -> bool {
        match (self.location, other.location) {
            (Some(a), Some(b)) => a.x() == b.x() && a.y() == b.y(),
            _ => false,
        }
    }

    /// Short human readable form used in log lines.
    pub fn describe(&self) -> String {
        let t = &self.tags;
        let mut out = String::new();
        if let Some(unit) = &t.unit {
            out.push_str(unit);
            out.push('/');
        }
        out.push_str(t.house_number.as_deref().unwrap_or("?"));
        for part in [&t.street, &t.suburb, &t.state, &t.postcode].into_iter().flatten() {
            out.push(' ');
            out.push_str(part);
        }
        out
    }
}

/// Joins the trace ids of `records` with `,`, skipping records without one.
pub fn join_trace_ids<'a, I>(records: I) -> Option<String>
where
    I: IntoIterator<Item = &'a AddressRecord>,
{
    let ids: Vec<&str> = records.into_iter().filter_map(|r| r.trace_id()).collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids.join(","))
    }
}

/// Arithmetic mean of the located records' coordinates.
pub fn mean_location<'a, I>(records: I) -> Option<Point<f64>>
where
    I: IntoIterator<Item = &'a AddressRecord>,
{
    let (mut sum_x, mut sum_y, mut n) = (0.0, 0.0, 0usize);
    for p in records.into_iter().filter_map(|r| r.location) {
        sum_x += p.x();
        sum_y += p.y();
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(Point::new(sum_x / n as f64, sum_y / n as f64))
    }
}

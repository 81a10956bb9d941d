// src/utils/ndjson.rs - Line-delimited GeoJSON input and output
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo_types::{Coord, LineString, MultiPolygon, Point, Polygon};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::DataQualityIssue;
use crate::models::address::{AddressRecord, AddressTags};
use crate::models::outcome::UnitNumberSplit;
use crate::models::reference::{ReferenceAddress, ReferenceGeometry};
use crate::reduction::value_limits::apply_value_limits;
use crate::spatial::blocks::{Block, BlockId};

/// Values read from one file, plus what had to be skipped or flagged.
#[derive(Debug)]
pub struct FeatureBatch<T> {
    pub items: Vec<T>,
    /// Lines that were not valid JSON features.
    pub skipped: usize,
    pub issues: Vec<DataQualityIssue>,
}

impl<T> Default for FeatureBatch<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: 0,
            issues: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

enum Geometry {
    Point(Point<f64>),
    Line(LineString<f64>),
    Area(MultiPolygon<f64>),
}

fn coord(values: &[f64]) -> Result<Coord<f64>> {
    match values {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => bail!("position with fewer than two values"),
    }
}

fn line(positions: Vec<Vec<f64>>) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>> {
    let mut rings = rings.into_iter().map(line);
    let exterior = rings.next().ok_or_else(|| anyhow!("polygon without rings"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

impl RawGeometry {
    fn convert(self) -> Result<Option<Geometry>> {
        let RawGeometry { kind, coordinates } = self;
        let geometry = match kind.as_str() {
            "Point" => {
                let position: Vec<f64> = serde_json::from_value(coordinates)?;
                Geometry::Point(Point::from(coord(&position)?))
            }
            "LineString" => Geometry::Line(line(serde_json::from_value(coordinates)?)?),
            "Polygon" => Geometry::Area(MultiPolygon(vec![polygon(serde_json::from_value(
                coordinates,
            )?)?])),
            "MultiPolygon" => {
                let parts: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(coordinates)?;
                Geometry::Area(MultiPolygon(
                    parts.into_iter().map(polygon).collect::<Result<Vec<_>>>()?,
                ))
            }
            _ => return Ok(None),
        };
        Ok(Some(geometry))
    }
}

fn geometry_kind(raw: &Option<RawGeometry>) -> String {
    raw.as_ref()
        .map_or_else(|| "null".to_string(), |g| g.kind.clone())
}

/// Reads one JSON value per non-empty line. Lines that do not parse are
/// skipped with a warning and counted. Fails only when the file cannot be read.
pub fn read_features(path: &Path) -> Result<(Vec<Value>, usize)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut features = Vec::new();
    let mut skipped = 0;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => features.push(value),
            Err(e) => {
                warn!("Skipping line {} of {}: {}", line_no + 1, path.display(), e);
                skipped += 1;
            }
        }
    }
    debug!("Read {} features from {} ({} skipped)", features.len(), path.display(), skipped);
    Ok((features, skipped))
}

fn parse_raw(value: Value) -> Result<RawFeature> {
    serde_json::from_value(value).context("not a GeoJSON feature")
}

fn tags_from(properties: Option<Map<String, Value>>) -> Result<AddressTags> {
    serde_json::from_value(Value::Object(properties.unwrap_or_default()))
        .context("address properties are not strings")
}

/// Parses a source address feature. A missing or non-point geometry yields a
/// record without location.
pub fn record_from_feature(value: Value) -> Result<(AddressRecord, Option<DataQualityIssue>)> {
    let raw = parse_raw(value)?;
    let kind = geometry_kind(&raw.geometry);
    let tags = tags_from(raw.properties)?;
    let geometry = match raw.geometry {
        Some(g) => g.convert()?,
        None => None,
    };
    let (location, issue) = match geometry {
        Some(Geometry::Point(p)) => (Some(p), None),
        _ => {
            let issue = DataQualityIssue::UnsupportedGeometry {
                id: tags.trace_id.clone().unwrap_or_else(|| "<no trace id>".to_string()),
                kind,
            };
            (None, Some(issue))
        }
    };
    Ok((AddressRecord::new(tags, location), issue))
}

/// Feature id of a reference, `@type/@id` when both are present.
fn reference_id(id: &Option<Value>, tags: &AddressTags, position: usize) -> String {
    let prop = |key: &str| tags.extra.get(key).map(value_to_string);
    match (prop("@type"), prop("@id")) {
        (Some(t), Some(i)) => format!("{}/{}", t, i),
        _ => id
            .as_ref()
            .map(value_to_string)
            .unwrap_or_else(|| format!("feature/{}", position + 1)),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn read_records(path: &Path) -> Result<FeatureBatch<AddressRecord>> {
    let (features, mut skipped) = read_features(path)?;
    let mut batch = FeatureBatch::default();
    for (i, value) in features.into_iter().enumerate() {
        match record_from_feature(value) {
            Ok((record, issue)) => {
                batch.issues.extend(issue);
                batch.items.push(record);
            }
            Err(e) => {
                warn!("Skipping feature {} of {}: {:#}", i + 1, path.display(), e);
                skipped += 1;
            }
        }
    }
    batch.skipped = skipped;
    info!(
        "Loaded {} address records from {} ({} skipped)",
        batch.items.len(),
        path.display(),
        batch.skipped
    );
    Ok(batch)
}

/// Reads reference addresses; points, areas and lines are kept, other kinds
/// are reported as unsupported and left out.
pub fn read_references(path: &Path) -> Result<FeatureBatch<ReferenceAddress>> {
    let (features, mut skipped) = read_features(path)?;
    let mut batch = FeatureBatch::default();
    for (i, value) in features.into_iter().enumerate() {
        let parsed = parse_raw(value).and_then(|raw| {
            let kind = geometry_kind(&raw.geometry);
            let tags = tags_from(raw.properties)?;
            let id = reference_id(&raw.id, &tags, i);
            let geometry = match raw.geometry {
                Some(g) => g.convert()?,
                None => None,
            };
            Ok((id, tags, kind, geometry))
        });
        match parsed {
            Ok((id, tags, _, Some(geometry))) => {
                let geometry = match geometry {
                    Geometry::Point(p) => ReferenceGeometry::Point(p),
                    Geometry::Line(l) => ReferenceGeometry::Line(l),
                    Geometry::Area(a) => ReferenceGeometry::Area(a),
                };
                batch.items.push(ReferenceAddress::new(id, tags, geometry));
            }
            Ok((id, _, kind, None)) => {
                debug!("Unsupported geometry type {} for {}", kind, id);
                batch.issues.push(DataQualityIssue::UnsupportedGeometry { id, kind });
            }
            Err(e) => {
                warn!("Skipping reference {} of {}: {:#}", i + 1, path.display(), e);
                skipped += 1;
            }
        }
    }
    batch.skipped = skipped;
    info!(
        "Loaded {} reference addresses from {} ({} skipped, {} unsupported)",
        batch.items.len(),
        path.display(),
        batch.skipped,
        batch.issues.len()
    );
    Ok(batch)
}

/// Reads block polygons, numbered from 1 in file order. The reference count
/// comes from a `NUMPOINTS` or `reference_count` property when present.
pub fn read_blocks(path: &Path) -> Result<FeatureBatch<Block>> {
    let (features, mut skipped) = read_features(path)?;
    let mut batch = FeatureBatch::default();
    for (i, value) in features.into_iter().enumerate() {
        let id = BlockId(i + 1);
        let parsed = parse_raw(value).and_then(|raw| {
            let kind = geometry_kind(&raw.geometry);
            let count = raw.properties.as_ref().and_then(|p| {
                p.get("NUMPOINTS")
                    .or_else(|| p.get("reference_count"))
                    .and_then(Value::as_u64)
            });
            let geometry = match raw.geometry {
                Some(g) => g.convert()?,
                None => None,
            };
            Ok((kind, count, geometry))
        });
        match parsed {
            Ok((_, count, Some(Geometry::Area(area)))) => batch.items.push(match count {
                Some(n) => Block::new(id, area, n as usize),
                None => Block::without_count(id, area),
            }),
            Ok((kind, _, _)) => batch.issues.push(DataQualityIssue::UnsupportedGeometry {
                id: id.to_string(),
                kind,
            }),
            Err(e) => {
                warn!("Skipping block {} of {}: {:#}", i + 1, path.display(), e);
                skipped += 1;
            }
        }
    }
    batch.skipped = skipped;
    info!(
        "Loaded {} blocks from {} ({} skipped)",
        batch.items.len(),
        path.display(),
        batch.skipped
    );
    Ok(batch)
}

fn position(c: Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring(ls: &LineString<f64>) -> Value {
    Value::Array(ls.coords().map(|c| position(*c)).collect())
}

fn polygon_rings(p: &Polygon<f64>) -> Value {
    let mut rings = vec![ring(p.exterior())];
    rings.extend(p.interiors().iter().map(ring));
    Value::Array(rings)
}

fn reference_geometry_json(geometry: &ReferenceGeometry) -> Value {
    match geometry {
        ReferenceGeometry::Point(p) => json!({"type": "Point", "coordinates": position(p.0)}),
        ReferenceGeometry::Line(ls) => json!({"type": "LineString", "coordinates": ring(ls)}),
        ReferenceGeometry::Area(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": Value::Array(mp.0.iter().map(polygon_rings).collect()),
        }),
    }
}

pub fn record_to_feature(record: &AddressRecord) -> Result<Value> {
    let properties = serde_json::to_value(&record.tags).context("Failed to serialize tags")?;
    let geometry = record
        .location
        .map_or(Value::Null, |p| json!({"type": "Point", "coordinates": position(p.0)}));
    Ok(json!({
        "type": "Feature",
        "properties": properties,
        "geometry": geometry,
    }))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn write_lines<I: IntoIterator<Item = Value>>(path: &Path, values: I) -> Result<usize> {
    let mut writer = create(path)?;
    let mut written = 0;
    for value in values {
        serde_json::to_writer(&mut writer, &value)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(written)
}

/// Writes records as one feature per line. With `max_tag_len`, over-long
/// `addr:flats` values are split into numbered tags first.
pub fn write_records(path: &Path, records: &[AddressRecord], max_tag_len: Option<usize>) -> Result<usize> {
    let features = records
        .iter()
        .map(|record| match max_tag_len {
            Some(max) => record_to_feature(&apply_value_limits(record.clone(), max)),
            None => record_to_feature(record),
        })
        .collect::<Result<Vec<_>>>()?;
    let written = write_lines(path, features)?;
    debug!("Wrote {} features to {}", written, path.display());
    Ok(written)
}

/// Writes one tag-fix task per reference whose house number combines unit and number.
pub fn write_suggestions(
    path: &Path,
    suggestions: &BTreeMap<usize, UnitNumberSplit>,
    references: &[ReferenceAddress],
) -> Result<usize> {
    let mut tasks = Vec::with_capacity(suggestions.len());
    for (&index, split) in suggestions {
        let reference = references
            .get(index)
            .ok_or_else(|| anyhow!("suggestion for unknown reference {}", index))?;
        let properties = serde_json::to_value(&reference.tags).context("Failed to serialize tags")?;
        tasks.push(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": properties,
                "geometry": reference_geometry_json(&reference.geometry),
            }],
            "cooperativeWork": {
                "meta": {"version": 2, "type": 1},
                "operations": [{
                    "operationType": "modifyElement",
                    "data": {
                        "id": split.reference_id,
                        "operations": [{
                            "operation": "setTags",
                            "data": {
                                "addr:unit": split.unit,
                                "addr:housenumber": split.house_number,
                            },
                        }],
                    },
                }],
            },
        }));
    }
    write_lines(path, tasks)
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IssueKind;
    use std::fs;

    fn write(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    #[test]
    fn test_empty_files_give_empty_batches() {
        let empty: FeatureBatch<Block> = FeatureBatch::default();
        assert!(empty.items.is_empty() && empty.issues.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.geojson", &[]);
        let blocks = read_blocks(&path).unwrap();
        assert!(blocks.items.is_empty());
        assert_eq!(blocks.skipped, 0);
        let references = read_references(&path).unwrap();
        assert!(references.items.is_empty());
        assert!(read_records(&path).unwrap().items.is_empty());
    }

    #[test]
    fn test_read_records_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "source.geojson",
            &[
                r#"{"type":"Feature","properties":{"addr:housenumber":"12","addr:street":"Lygon Street","_pfi":"77","building":"yes"},"geometry":{"type":"Point","coordinates":[144.96,-37.8]}}"#,
                "not json",
                "",
                r#"{"type":"Feature","properties":{"addr:housenumber":"14"},"geometry":null}"#,
            ],
        );
        let batch = read_records(&path).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.skipped, 1);
        let first = &batch.items[0];
        assert_eq!(first.house_number(), Some("12"));
        assert_eq!(first.trace_id(), Some("77"));
        assert_eq!(first.tags.extra["building"], "yes");
        assert_eq!(first.location, Some(Point::new(144.96, -37.8)));
        assert!(batch.items[1].location.is_none());
        assert_eq!(batch.issues.len(), 1);
        assert_eq!(batch.issues[0].kind(), IssueKind::UnsupportedGeometry);
    }

    #[test]
    fn test_read_references_by_geometry_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "reference.geojson",
            &[
                r#"{"type":"Feature","properties":{"@type":"node","@id":1,"addr:housenumber":"1"},"geometry":{"type":"Point","coordinates":[0.5,0.5]}}"#,
                r#"{"type":"Feature","properties":{"@type":"way","@id":2},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}"#,
                r#"{"type":"Feature","id":"line-3","properties":{},"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}"#,
                r#"{"type":"Feature","properties":{"@type":"relation","@id":4},"geometry":{"type":"GeometryCollection","coordinates":[]}}"#,
            ],
        );
        let batch = read_references(&path).unwrap();
        assert_eq!(batch.items.len(), 3);
        assert_eq!(batch.items[0].id, "node/1");
        assert_eq!(batch.items[1].id, "way/2");
        assert!(batch.items[1].area().is_some());
        assert_eq!(batch.items[2].id, "line-3");
        assert_eq!(batch.items[2].geometry.kind(), "LineString");
        assert_eq!(
            batch.issues,
            vec![DataQualityIssue::UnsupportedGeometry {
                id: "relation/4".to_string(),
                kind: "GeometryCollection".to_string(),
            }]
        );
    }

    #[test]
    fn test_read_blocks_numbers_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "blocks.geojson",
            &[
                r#"{"type":"Feature","properties":{"NUMPOINTS":0},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}"#,
                r#"{"type":"Feature","properties":{},"geometry":{"type":"MultiPolygon","coordinates":[[[[1,0],[2,0],[2,1],[1,1],[1,0]]]]}}"#,
            ],
        );
        let batch = read_blocks(&path).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.items[0].id, BlockId(1));
        assert!(batch.items[0].has_no_references());
        assert_eq!(batch.items[1].id, BlockId(2));
        assert_eq!(batch.items[1].reference_count, None);
    }

    #[test]
    fn test_write_and_read_back_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("records.geojson");
        let mut tags = AddressTags {
            house_number: Some("5".to_string()),
            flats: Some("1".repeat(300)),
            ..Default::default()
        };
        tags.extra.insert("source".to_string(), Value::from("survey"));
        let records = vec![AddressRecord::at(1.0, 2.0, tags)];

        assert_eq!(write_records(&path, &records, Some(255)).unwrap(), 1);
        let back = read_records(&path).unwrap();
        let record = &back.items[0];
        assert_eq!(record.tags.flats.as_ref().map(String::len), Some(255));
        assert_eq!(record.tags.extra["addr:flats2"], "1".repeat(45));
        assert_eq!(record.tags.extra["source"], "survey");
        assert_eq!(record.location, Some(Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_write_suggestions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mr_explodeUnitFromNumber.geojson");
        let references = vec![ReferenceAddress::new(
            "node/9",
            AddressTags {
                house_number: Some("2/8".to_string()),
                ..Default::default()
            },
            ReferenceGeometry::Point(Point::new(0.0, 0.0)),
        )];
        let mut suggestions = BTreeMap::new();
        suggestions.insert(
            0,
            UnitNumberSplit {
                reference_id: "node/9".to_string(),
                unit: "2".to_string(),
                house_number: "8".to_string(),
            },
        );
        assert_eq!(write_suggestions(&path, &suggestions, &references).unwrap(), 1);

        let (tasks, skipped) = read_features(&path).unwrap();
        assert_eq!(skipped, 0);
        let operation = &tasks[0]["cooperativeWork"]["operations"][0];
        assert_eq!(operation["data"]["id"], "node/9");
        assert_eq!(operation["data"]["operations"][0]["data"]["addr:unit"], "2");
        assert_eq!(tasks[0]["features"][0]["properties"]["addr:housenumber"], "2/8");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_records(&dir.path().join("missing.geojson")).is_err());
    }
}

//! Loading labelled boundary polygons.
//!
//! Input is a JSON array of `{"tz": "<label>", "polygon": [[lng, lat], ...]}`
//! objects, optionally gzip-compressed. Each entry is decoded on its own so a
//! single malformed polygon only costs that polygon.

mod normalize;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ParseError;
use crate::geometry::Point;

pub use normalize::{normalize, LoadReport, LoadedInput, SplitFailure};

/// One raw boundary as handed over by the decoder: a label and its ring in
/// file order, no closing duplicate required.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPolygon {
    pub label: String,
    pub points: Vec<Point>,
}

/// Everything the decoder produced, good and bad.
#[derive(Debug, Default)]
pub struct Decoded {
    pub polygons: Vec<InputPolygon>,
    pub skipped: Vec<ParseError>,
}

/// Read and decode a polygon file. `.gz` files are decompressed on the fly.
pub fn read_polygons(path: &Path) -> Result<Decoded, ParseError> {
    info!("Reading polygons from {}", path.display());
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    decode_polygons(BufReader::new(reader))
}

/// Decode a polygon list. Only a document that is not a JSON array fails as
/// a whole; bad entries are collected in [`Decoded::skipped`].
pub fn decode_polygons<R: Read>(reader: R) -> Result<Decoded, ParseError> {
    let entries: Vec<Value> = serde_json::from_reader(reader)?;
    let mut decoded = Decoded::default();
    for (index, entry) in entries.iter().enumerate() {
        match decode_entry(index, entry) {
            Ok(polygon) => decoded.polygons.push(polygon),
            Err(e) => {
                warn!("Skipping polygon: {}", e);
                decoded.skipped.push(e);
            }
        }
    }
    info!(
        "Decoded {} polygons ({} skipped)",
        decoded.polygons.len(),
        decoded.skipped.len()
    );
    Ok(decoded)
}

fn decode_entry(index: usize, entry: &Value) -> Result<InputPolygon, ParseError> {
    let label = entry
        .get("tz")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField { index, field: "tz" })?;
    let coords = entry
        .get("polygon")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField {
            index,
            field: "polygon",
        })?;

    let mut points = Vec::with_capacity(coords.len());
    for (position, coord) in coords.iter().enumerate() {
        let Some((lng, lat)) = coord
            .as_array()
            .filter(|pair| pair.len() >= 2)
            .and_then(|pair| Some((pair[0].as_f64()?, pair[1].as_f64()?)))
        else {
            return Err(ParseError::BadCoordinate {
                index,
                label: label.to_string(),
                position,
            });
        };
        let pt = Point::new(lat, lng);
        if pt.is_undefined() {
            return Err(ParseError::OutOfRange {
                index,
                label: label.to_string(),
                lat,
                lng,
            });
        }
        points.push(pt);
    }

    if points.len() < 3 {
        return Err(ParseError::TooFewPoints {
            index,
            label: label.to_string(),
            points: points.len(),
        });
    }
    Ok(InputPolygon {
        label: label.to_string(),
        points,
    })
}

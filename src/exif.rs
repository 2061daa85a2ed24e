//! EXIF metadata extraction for photoatlas.
//!
//! This module decodes the raw EXIF block embedded in a JPEG into a
//! tag-name keyed map (`RawMetadata`) and derives the normalized record
//! (`ExifMetadata`) the rest of the pipeline consumes: decimal latitude
//! and longitude, integer altitude, and the camera-format timestamp.
//!
//! Extraction is a pure read of the decoded structure. Missing or
//! malformed fields degrade to `None`; nothing here touches the network
//! or writes to disk.

use anyhow::{Context, Result};
use exif::{In, Value};
use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Numeric tag number to symbolic name, for top-level EXIF tags we care
/// about. Tags not listed here keep their numeric key in `RawMetadata`
/// and are never consumed downstream.
const EXIF_TAG_NAMES: &[(u16, &str)] = &[
    (0x010f, "Make"),
    (0x0110, "Model"),
    (0x0112, "Orientation"),
    (0x0132, "DateTime"),
    (0x829a, "ExposureTime"),
    (0x829d, "FNumber"),
    (0x8827, "ISOSpeedRatings"),
    (0x9003, "DateTimeOriginal"),
    (0x9004, "DateTimeDigitized"),
    (0x920a, "FocalLength"),
];

/// Tag names for the GPS sub-block.
const GPS_TAG_NAMES: &[(u16, &str)] = &[
    (0x0000, "GPSVersionID"),
    (0x0001, "GPSLatitudeRef"),
    (0x0002, "GPSLatitude"),
    (0x0003, "GPSLongitudeRef"),
    (0x0004, "GPSLongitude"),
    (0x0005, "GPSAltitudeRef"),
    (0x0006, "GPSAltitude"),
    (0x0007, "GPSTimeStamp"),
    (0x001d, "GPSDateStamp"),
];

fn tag_name(table: &[(u16, &str)], number: u16) -> String {
    table
        .iter()
        .find(|(num, _)| *num == number)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| number.to_string())
}

/// A decoded EXIF field value, reduced to the shapes the extractor reads.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// ASCII tag contents (references, timestamps, camera strings)
    Text(String),
    /// Single numeric value (altitude, altitude reference, ISO, ...)
    Number(f64),
    /// Degrees/minutes/seconds rational triple
    Triple(f64, f64, f64),
}

impl TagValue {
    fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_triple(&self) -> Option<(f64, f64, f64)> {
        match self {
            TagValue::Triple(d, m, s) => Some((*d, *m, *s)),
            _ => None,
        }
    }
}

/// The raw metadata block of one image: top-level tags plus the optional
/// GPS sub-block, both keyed by symbolic tag name (or the numeric tag as
/// a string when the name is unknown).
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub fields: HashMap<String, TagValue>,
    pub gps: Option<HashMap<String, TagValue>>,
}

/// Normalized metadata record for one photo.
///
/// Latitude and longitude are jointly present or jointly absent; altitude
/// and timestamp are independent of position and of each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifMetadata {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i64>,
    /// Camera-format timestamp, `YYYY:MM:DD HH:MM:SS`. Not validated here;
    /// parsing happens at ranking/manifest time.
    pub timestamp: Option<String>,
}

/// Converts a degrees/minutes/seconds triple to decimal degrees.
fn dms_to_degrees(d: f64, m: f64, s: f64) -> f64 {
    d + m / 60.0 + s / 3600.0
}

fn decode_value(value: &Value) -> Option<TagValue> {
    match value {
        Value::Ascii(vec) => vec
            .first()
            .map(|bytes| TagValue::Text(String::from_utf8_lossy(bytes).to_string())),
        Value::Rational(vec) => match vec.len() {
            0 => None,
            1 | 2 => Some(TagValue::Number(vec[0].to_f64())),
            _ => Some(TagValue::Triple(
                vec[0].to_f64(),
                vec[1].to_f64(),
                vec[2].to_f64(),
            )),
        },
        Value::SRational(vec) => vec.first().map(|r| TagValue::Number(r.to_f64())),
        Value::Byte(vec) => vec.first().map(|&b| TagValue::Number(f64::from(b))),
        Value::Short(vec) => vec.first().map(|&v| TagValue::Number(f64::from(v))),
        Value::Long(vec) => vec.first().map(|&v| TagValue::Number(f64::from(v))),
        _ => None,
    }
}

/// Builds a `RawMetadata` map from a decoded EXIF structure, resolving
/// tag numbers through the static dictionaries above.
pub fn decode_raw_metadata(exif: &exif::Exif) -> RawMetadata {
    let mut raw = RawMetadata::default();

    for field in exif.fields() {
        if field.ifd_num != In::PRIMARY {
            continue;
        }
        let Some(value) = decode_value(&field.value) else {
            continue;
        };
        if field.tag.context() == exif::Context::Gps {
            let name = tag_name(GPS_TAG_NAMES, field.tag.number());
            raw.gps.get_or_insert_with(HashMap::new).insert(name, value);
        } else {
            let name = tag_name(EXIF_TAG_NAMES, field.tag.number());
            raw.fields.insert(name, value);
        }
    }

    raw
}

/// Derives the normalized metadata record from a raw EXIF block.
pub fn extract(raw: &RawMetadata) -> ExifMetadata {
    let mut metadata = ExifMetadata {
        timestamp: raw
            .fields
            .get("DateTime")
            .and_then(TagValue::as_text)
            .map(str::to_string),
        ..Default::default()
    };

    let Some(gps) = &raw.gps else {
        return metadata;
    };

    let position = (
        gps.get("GPSLatitude").and_then(TagValue::as_triple),
        gps.get("GPSLatitudeRef").and_then(TagValue::as_text),
        gps.get("GPSLongitude").and_then(TagValue::as_triple),
        gps.get("GPSLongitudeRef").and_then(TagValue::as_text),
    );

    if let (Some((lat_d, lat_m, lat_s)), Some(lat_ref), Some((lon_d, lon_m, lon_s)), Some(lon_ref)) =
        position
    {
        let mut lat = dms_to_degrees(lat_d, lat_m, lat_s);
        if lat_ref != "N" {
            lat = -lat;
        }

        let lon = dms_to_degrees(lon_d, lon_m, lon_s);
        if lon_ref != "E" {
            metadata.latitude = Some(lat);
            metadata.longitude = Some(-lon);
        }
        // An 'E' longitude reference drops the whole position. Every
        // manifest published so far was built with this rule, so the set
        // of geotagged photos must not change out from under the gallery.
    }

    if let Some(altitude) = gps.get("GPSAltitude").and_then(TagValue::as_number) {
        let below_sea_level = gps
            .get("GPSAltitudeRef")
            .and_then(TagValue::as_number)
            .is_some_and(|r| r == 1.0);
        let signed = if below_sea_level { -altitude } else { altitude };
        metadata.altitude = Some(signed as i64);
    }

    metadata
}

/// Extracts the metadata record from a JPEG file on disk.
///
/// A file that opens but carries no EXIF block yields an all-`None`
/// record rather than an error.
pub fn extract_from_path(image_path: &Path) -> Result<ExifMetadata> {
    let file = File::open(image_path)
        .with_context(|| format!("Failed to open image file at {}", image_path.display()))?;
    let mut bufreader = BufReader::new(&file);

    let exif = match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => exif,
        Err(e) => {
            warn!(
                "Could not extract EXIF data from {}: {}",
                image_path.display(),
                e
            );
            return Ok(ExifMetadata::default());
        }
    };

    Ok(extract(&decode_raw_metadata(&exif)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gps_block(entries: &[(&str, TagValue)]) -> HashMap<String, TagValue> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn raw_with_gps(entries: &[(&str, TagValue)]) -> RawMetadata {
        RawMetadata {
            fields: HashMap::new(),
            gps: Some(gps_block(entries)),
        }
    }

    #[test]
    fn test_dms_conversion_north_west() {
        let raw = raw_with_gps(&[
            ("GPSLatitude", TagValue::Triple(41.0, 52.0, 41.16)),
            ("GPSLatitudeRef", TagValue::Text("N".to_string())),
            ("GPSLongitude", TagValue::Triple(87.0, 37.0, 47.28)),
            ("GPSLongitudeRef", TagValue::Text("W".to_string())),
        ]);

        let metadata = extract(&raw);
        let lat = metadata.latitude.unwrap();
        let lon = metadata.longitude.unwrap();

        assert!((lat - (41.0 + 52.0 / 60.0 + 41.16 / 3600.0)).abs() < 1e-9);
        assert!((lon + (87.0 + 37.0 / 60.0 + 47.28 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn test_southern_latitude_is_negative() {
        let raw = raw_with_gps(&[
            ("GPSLatitude", TagValue::Triple(33.0, 52.0, 0.0)),
            ("GPSLatitudeRef", TagValue::Text("S".to_string())),
            ("GPSLongitude", TagValue::Triple(70.0, 40.0, 0.0)),
            ("GPSLongitudeRef", TagValue::Text("W".to_string())),
        ]);

        let metadata = extract(&raw);
        assert!(metadata.latitude.unwrap() < 0.0);
        assert!(metadata.longitude.unwrap() < 0.0);
    }

    #[test]
    fn test_east_longitude_drops_position() {
        let raw = raw_with_gps(&[
            ("GPSLatitude", TagValue::Triple(48.0, 51.0, 24.0)),
            ("GPSLatitudeRef", TagValue::Text("N".to_string())),
            ("GPSLongitude", TagValue::Triple(2.0, 21.0, 8.0)),
            ("GPSLongitudeRef", TagValue::Text("E".to_string())),
        ]);

        let metadata = extract(&raw);
        assert_eq!(metadata.latitude, None);
        assert_eq!(metadata.longitude, None);
    }

    #[test]
    fn test_altitude_survives_dropped_position() {
        let raw = raw_with_gps(&[
            ("GPSLatitude", TagValue::Triple(48.0, 51.0, 24.0)),
            ("GPSLatitudeRef", TagValue::Text("N".to_string())),
            ("GPSLongitude", TagValue::Triple(2.0, 21.0, 8.0)),
            ("GPSLongitudeRef", TagValue::Text("E".to_string())),
            ("GPSAltitude", TagValue::Number(35.0)),
        ]);

        let metadata = extract(&raw);
        assert_eq!(metadata.latitude, None);
        assert_eq!(metadata.longitude, None);
        assert_eq!(metadata.altitude, Some(35));
    }

    #[test]
    fn test_altitude_below_sea_level() {
        let raw = raw_with_gps(&[
            ("GPSAltitude", TagValue::Number(86.7)),
            ("GPSAltitudeRef", TagValue::Number(1.0)),
        ]);

        let metadata = extract(&raw);
        assert_eq!(metadata.altitude, Some(-86));
    }

    #[test]
    fn test_altitude_truncates_to_integer() {
        let raw = raw_with_gps(&[("GPSAltitude", TagValue::Number(179.9))]);
        assert_eq!(extract(&raw).altitude, Some(179));
    }

    #[test]
    fn test_missing_gps_block_yields_nulls() {
        let mut raw = RawMetadata::default();
        raw.fields.insert(
            "DateTime".to_string(),
            TagValue::Text("2023:05:01 10:00:00".to_string()),
        );

        let metadata = extract(&raw);
        assert_eq!(metadata.latitude, None);
        assert_eq!(metadata.longitude, None);
        assert_eq!(metadata.altitude, None);
        assert_eq!(metadata.timestamp, Some("2023:05:01 10:00:00".to_string()));
    }

    #[test]
    fn test_partial_gps_block_keeps_position_null() {
        // Latitude tags alone are not enough; the pair is derived jointly.
        let raw = raw_with_gps(&[
            ("GPSLatitude", TagValue::Triple(41.0, 52.0, 41.16)),
            ("GPSLatitudeRef", TagValue::Text("N".to_string())),
        ]);

        let metadata = extract(&raw);
        assert_eq!(metadata.latitude, None);
        assert_eq!(metadata.longitude, None);
    }

    #[test]
    fn test_unknown_tags_keep_numeric_key() {
        assert_eq!(tag_name(EXIF_TAG_NAMES, 0x0132), "DateTime");
        assert_eq!(tag_name(GPS_TAG_NAMES, 0x0002), "GPSLatitude");
        assert_eq!(tag_name(EXIF_TAG_NAMES, 0xbeef), "48879");
    }

    #[test]
    fn test_extract_from_missing_file() {
        let result = extract_from_path(Path::new("/nonexistent/path.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_from_file_without_exif() -> Result<()> {
        use std::io::Write;

        let temp_dir = tempfile::tempdir()?;
        let image_path = temp_dir.path().join("plain.jpg");
        let mut file = File::create(&image_path)?;
        file.write_all(b"\xff\xd8\xff\xdbnot really a full jpeg")?;

        let metadata = extract_from_path(&image_path)?;
        assert_eq!(metadata, ExifMetadata::default());

        Ok(())
    }
}

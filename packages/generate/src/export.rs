//! Delimited export of the result set.

use std::io::Write;
use std::path::Path;

use crash_map_crash_models::NormalizedRecord;

use crate::GenerateError;

/// Column names, in the order [`NormalizedRecord`] serializes its fields.
pub const CSV_HEADERS: [&str; 6] = [
    "crash_id",
    "crash_date",
    "severity",
    "collision_type",
    "longitude",
    "latitude",
];

/// Writes `records` as CSV with a header row. Missing values are empty
/// cells and dates are `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns [`GenerateError`] if serialization or the write fails.
pub fn write_csv_to<W: Write>(writer: W, records: &[NormalizedRecord]) -> Result<(), GenerateError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    // `serialize` only emits the header along with the first row.
    if records.is_empty() {
        csv_writer.write_record(CSV_HEADERS)?;
    }
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes `records` to a CSV file at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`GenerateError`] if the file cannot be created or written.
pub fn write_csv(path: &Path, records: &[NormalizedRecord]) -> Result<(), GenerateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_csv_to(file, records)?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn writes_header_and_empty_cells_for_nulls() {
        let records = vec![
            NormalizedRecord {
                crash_id: Some("241234567".to_string()),
                crash_date: NaiveDate::from_ymd_opt(2024, 1, 1),
                severity: Some("B".to_string()),
                collision_type: Some("1. Rear End".to_string()),
                longitude: Some(-77.5),
                latitude: Some(37.25),
            },
            NormalizedRecord {
                crash_id: None,
                crash_date: None,
                severity: None,
                collision_type: Some("Angle, with \"quotes\"".to_string()),
                longitude: None,
                latitude: None,
            },
        ];

        let mut buf = Vec::new();
        write_csv_to(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "crash_id,crash_date,severity,collision_type,longitude,latitude"
        );
        assert_eq!(lines[0], CSV_HEADERS.join(","));
        assert_eq!(lines[1], "241234567,2024-01-01,B,1. Rear End,-77.5,37.25");
        assert_eq!(lines[2], ",,,\"Angle, with \"\"quotes\"\"\",,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_result_set_still_writes_header() {
        let mut buf = Vec::new();
        write_csv_to(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, format!("{}\n", CSV_HEADERS.join(",")));
    }
}

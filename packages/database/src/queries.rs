//! Table management and writes for `crash_data`.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crash_map_crash_models::NormalizedRecord;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, WriteMode};

/// PostgreSQL's limit on bind parameters per statement.
const PG_MAX_PARAMS: usize = 65_535;

/// Bind parameters per inserted row.
const PARAMS_PER_ROW: usize = 6;

/// Creates `crash_data` and its `crash_id` unique index if missing.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub async fn ensure_table(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS crash_data (
            id SERIAL PRIMARY KEY,
            crash_id VARCHAR,
            crash_date DATE,
            severity VARCHAR,
            collision_type VARCHAR,
            longitude DOUBLE PRECISION,
            latitude DOUBLE PRECISION
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE UNIQUE INDEX IF NOT EXISTS crash_data_crash_id_key ON crash_data (crash_id)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS crash_data_crash_date_idx ON crash_data (crash_date DESC)",
    )
    .await?;

    Ok(())
}

/// Drops `crash_data` and creates it again, empty.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub async fn replace_table(db: &dyn Database) -> Result<(), DbError> {
    log::warn!("Dropping table crash_data");
    db.exec_raw("DROP TABLE IF EXISTS crash_data").await?;
    ensure_table(db).await
}

/// Writes the result set using `mode`. Returns the number of rows
/// inserted or updated.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn write_records(
    db: &dyn Database,
    records: &[NormalizedRecord],
    mode: WriteMode,
) -> Result<u64, DbError> {
    match mode {
        WriteMode::Replace => replace_table(db).await?,
        WriteMode::Upsert => ensure_table(db).await?,
    }

    let rows = dedupe_by_crash_id(records);
    if rows.len() < records.len() {
        log::warn!(
            "Skipping {} records with a repeated crash_id",
            records.len() - rows.len()
        );
    }

    let mut written = 0u64;
    for chunk in rows.chunks(PG_MAX_PARAMS / PARAMS_PER_ROW) {
        let sql = insert_sql(chunk.len());
        let params: Vec<DatabaseValue> = chunk.iter().flat_map(|r| row_params(r)).collect();
        written += db.exec_raw_params(&sql, &params).await?;
        log::debug!("Wrote {written}/{} rows", rows.len());
    }

    log::info!("Stored {written} rows in crash_data ({mode})");
    Ok(written)
}

/// Counts the rows currently in `crash_data`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the count cannot be read.
pub async fn count_records(db: &dyn Database) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params("SELECT COUNT(*) AS count FROM crash_data", &[])
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "COUNT query returned no rows".to_string(),
    })?;

    row.to_value("count").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse row count: {e}"),
    })
}

/// Keeps the first record for each `crash_id`. A single upsert statement
/// cannot touch the same conflict key twice. Records without a `crash_id`
/// are all kept.
fn dedupe_by_crash_id(records: &[NormalizedRecord]) -> Vec<&NormalizedRecord> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|r| r.crash_id.as_deref().is_none_or(|id| seen.insert(id)))
        .collect()
}

/// Multi-row upsert for `rows` records. Casts pin the parameter types so
/// all-NULL columns still bind.
fn insert_sql(rows: usize) -> String {
    let mut sql = String::from(
        "INSERT INTO crash_data (crash_id, crash_date, severity, collision_type, longitude, latitude)\nVALUES ",
    );

    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        let p = row * PARAMS_PER_ROW;
        let _ = write!(
            sql,
            "(${}::text, ${}::text::date, ${}::text, ${}::text, ${}::float8, ${}::float8)",
            p + 1,
            p + 2,
            p + 3,
            p + 4,
            p + 5,
            p + 6,
        );
    }

    sql.push_str(
        "\nON CONFLICT (crash_id) DO UPDATE SET
            crash_date = EXCLUDED.crash_date,
            severity = EXCLUDED.severity,
            collision_type = EXCLUDED.collision_type,
            longitude = EXCLUDED.longitude,
            latitude = EXCLUDED.latitude",
    );
    sql
}

fn row_params(record: &NormalizedRecord) -> [DatabaseValue; PARAMS_PER_ROW] {
    let text = |value: Option<String>| value.map_or(DatabaseValue::Null, DatabaseValue::String);

    [
        text(record.crash_id.clone()),
        text(record.crash_date.map(|d| d.format("%Y-%m-%d").to_string())),
        text(record.severity.clone()),
        text(record.collision_type.clone()),
        record.longitude.map_or(DatabaseValue::Null, DatabaseValue::Real64),
        record.latitude.map_or(DatabaseValue::Null, DatabaseValue::Real64),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(id: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            crash_id: id.map(str::to_string),
            crash_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            severity: Some("O".to_string()),
            collision_type: None,
            longitude: Some(-77.1),
            latitude: None,
        }
    }

    #[test]
    fn dedupe_keeps_first_and_all_missing_ids() {
        let records = vec![
            record(Some("a")),
            record(None),
            record(Some("a")),
            record(None),
            record(Some("b")),
        ];
        let kept = dedupe_by_crash_id(&records);
        let ids: Vec<Option<&str>> = kept.iter().map(|r| r.crash_id.as_deref()).collect();
        assert_eq!(ids, [Some("a"), None, None, Some("b")]);
        assert!(std::ptr::eq(kept[0], &records[0]));
    }

    #[test]
    fn insert_sql_numbers_placeholders_per_row() {
        let sql = insert_sql(2);
        assert!(sql.contains("($1::text, $2::text::date, $3::text, $4::text, $5::float8, $6::float8)"));
        assert!(sql.contains("($7::text, $8::text::date, $9::text, $10::text, $11::float8, $12::float8)"));
        assert!(sql.contains("ON CONFLICT (crash_id) DO UPDATE"));
        assert!(!sql.contains("$13"));
    }

    #[test]
    fn row_params_bind_nulls_for_missing_values() {
        let params = row_params(&record(None));
        assert!(matches!(params[0], DatabaseValue::Null));
        assert!(matches!(&params[1], DatabaseValue::String(s) if s == "2024-02-29"));
        assert!(matches!(params[3], DatabaseValue::Null));
        assert!(matches!(params[4], DatabaseValue::Real64(v) if (v - -77.1).abs() < f64::EPSILON));
        assert!(matches!(params[5], DatabaseValue::Null));
    }
}

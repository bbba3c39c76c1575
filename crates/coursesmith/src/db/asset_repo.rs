//! Row-level operations on the `assets` table.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::asset::{Asset, AssetStatus, NewAsset, StatusUpdate};

fn asset_from_row(row: &Row<'_>) -> Result<Asset, rusqlite::Error> {
    let raw_status: String = row.get("status")?;
    let status = raw_status.parse::<AssetStatus>().map_err(|e| {
        let index = row.as_ref().column_index("status").unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Asset {
        id: row.get("id")?,
        asset_type: row.get("asset_type")?,
        status,
        original_document_url: row.get("original_document_url")?,
        original_document_name: row.get("original_document_name")?,
        audience: row.get("audience")?,
        tone: row.get("tone")?,
        compliance_text: row.get("compliance_text")?,
        output_url: row.get("output_url")?,
        completed_at: timestamp(row, "completed_at")?,
        failure_reason: row.get("failure_reason")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Reads a timestamp column written by either this worker or the creation
/// flow. Values that are not a recognizable time read as `None`.
fn timestamp(row: &Row<'_>, column: &str) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let parsed = match row.get_ref(column)? {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(secs) => DateTime::from_timestamp(secs, 0),
        ValueRef::Real(secs) => DateTime::from_timestamp_millis((secs * 1000.0) as i64),
        ValueRef::Text(raw) => std::str::from_utf8(raw).ok().and_then(parse_timestamp),
    };
    Ok(parsed)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    // TEXT affinity stores an inserted integer as its decimal text.
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Inserts a new asset in `processing` state and returns the stored row.
pub fn insert(db: &Database, new: &NewAsset) -> Result<Asset, DatabaseError> {
    let id = new
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let now = Utc::now();

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO assets (id, asset_type, status, original_document_url,
             original_document_name, audience, tone, compliance_text, created_at, updated_at)
             VALUES (?1, ?2, 'processing', ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                new.asset_type,
                new.original_document_url,
                new.original_document_name,
                new.audience,
                new.tone,
                new.compliance_text,
                now,
            ],
        )?;
        Ok(())
    })?;

    find_by_id(db, &id)?.ok_or_else(|| {
        DatabaseError::Unavailable(format!("asset {} vanished after insert", id))
    })
}

/// Finds an asset by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Asset>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM assets WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], asset_from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All assets still in `processing`, oldest first.
///
/// A row that cannot be read is failed in place with the read error as its
/// reason, so it neither blocks nor reappears in later polls.
pub fn fetch_pending(db: &Database) -> Result<Vec<Asset>, DatabaseError> {
    db.with_conn(|conn| {
        let mut pending = Vec::new();
        let mut unreadable = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT rowid AS row_id, * FROM assets WHERE status = 'processing'
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                match asset_from_row(row) {
                    Ok(asset) => pending.push(asset),
                    Err(e) => unreadable.push((row.get::<_, i64>("row_id")?, e.to_string())),
                }
            }
        }

        for (row_id, error) in unreadable {
            log::warn!("Failing unreadable asset row {}: {}", row_id, error);
            conn.execute(
                "UPDATE assets SET status = 'failed', failure_reason = ?2, updated_at = ?3
                 WHERE rowid = ?1 AND status = 'processing'",
                params![row_id, format!("Unreadable asset row: {}", error), Utc::now()],
            )?;
        }

        Ok(pending)
    })
}

/// Writes a terminal transition in one statement.
///
/// Only rows still in `processing` are touched. Returns `false` when the row
/// is missing or already terminal.
pub fn update_status(
    db: &Database,
    id: &str,
    update: &StatusUpdate,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = match update {
            StatusUpdate::Completed { output_url } => conn.execute(
                "UPDATE assets SET status = 'completed', output_url = ?2, completed_at = ?3,
                 failure_reason = NULL, updated_at = ?3
                 WHERE id = ?1 AND status = 'processing'",
                params![id, output_url, at],
            )?,
            StatusUpdate::Failed { reason } => conn.execute(
                "UPDATE assets SET status = 'failed', failure_reason = ?2, updated_at = ?3
                 WHERE id = ?1 AND status = 'processing'",
                params![id, reason, at],
            )?,
        };
        Ok(changed == 1)
    })
}

/// Counts assets with the given status.
pub fn count_by_status(db: &Database, status: AssetStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM assets WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Most recently created assets, optionally filtered by status.
pub fn list(
    db: &Database,
    status: Option<AssetStatus>,
    limit: u32,
) -> Result<Vec<Asset>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM assets WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![status.map(|s| s.as_str()), limit], asset_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

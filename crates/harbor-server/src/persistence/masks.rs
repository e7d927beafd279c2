//! Mask snapshot persistence.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use harbor_core::{MaskMetadata, MaskSnapshot, OccupancyMask};

/// Store the mask as the single snapshot row. Metadata and buffer land in
/// one statement, so a reader never sees one without the other.
pub async fn save_mask(pool: &SqlitePool, mask: &OccupancyMask) -> Result<MaskSnapshot> {
    let snapshot = mask.snapshot();
    let metadata = serde_json::to_string(&snapshot.metadata)?;

    sqlx::query(
        r#"
        INSERT INTO mask_snapshots (id, metadata, cells, updated_at)
        VALUES (1, ?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET
            metadata = ?1, cells = ?2, updated_at = ?3
        "#,
    )
    .bind(&metadata)
    .bind(&snapshot.cells)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(snapshot)
}

/// Load the saved mask, if any. A row that fails validation is an error,
/// not a silent fallback; the caller decides what to do with it.
pub async fn load_mask(pool: &SqlitePool) -> Result<Option<OccupancyMask>> {
    let row = sqlx::query_as::<_, MaskRow>("SELECT metadata, cells FROM mask_snapshots WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let metadata: MaskMetadata =
        serde_json::from_str(&row.metadata).context("mask metadata is not valid JSON")?;
    let mask = OccupancyMask::from_snapshot(MaskSnapshot {
        metadata,
        cells: row.cells,
    })?;
    Ok(Some(mask))
}

pub async fn delete_mask(pool: &SqlitePool) -> Result<bool> {
    let result = sqlx::query("DELETE FROM mask_snapshots WHERE id = 1")
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct MaskRow {
    metadata: String,
    cells: Vec<u8>,
}

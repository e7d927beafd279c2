//! Restricted area persistence operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use harbor_core::{ExclusionZone, GeoPoint};

pub async fn upsert_restricted_area(pool: &SqlitePool, zone: &ExclusionZone) -> Result<()> {
    let ring_json = serde_json::to_string(&zone.ring)?;

    sqlx::query(
        r#"
        INSERT INTO restricted_areas (id, name, ring, created_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET name = ?2, ring = ?3
        "#,
    )
    .bind(&zone.id)
    .bind(&zone.name)
    .bind(&ring_json)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_all_restricted_areas(pool: &SqlitePool) -> Result<Vec<ExclusionZone>> {
    let rows = sqlx::query_as::<_, RestrictedAreaRow>(
        "SELECT id, name, ring FROM restricted_areas ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| row.try_into()).collect()
}

pub async fn delete_restricted_area(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM restricted_areas WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct RestrictedAreaRow {
    id: String,
    name: String,
    ring: String,
}

impl TryFrom<RestrictedAreaRow> for ExclusionZone {
    type Error = anyhow::Error;

    fn try_from(row: RestrictedAreaRow) -> Result<Self> {
        let ring: Vec<GeoPoint> = serde_json::from_str(&row.ring)?;
        Ok(ExclusionZone::new(row.id, row.name, ring))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::db::temp_database;

    #[tokio::test]
    async fn zones_survive_reload() {
        let db = temp_database().await;
        let zone = ExclusionZone::new(
            "firing-range",
            "Firing range",
            vec![
                GeoPoint::new(26.0, 50.0),
                GeoPoint::new(26.0, 50.1),
                GeoPoint::new(26.1, 50.1),
                GeoPoint::new(26.0, 50.0),
            ],
        );
        upsert_restricted_area(db.pool(), &zone).await.unwrap();

        let loaded = load_all_restricted_areas(db.pool()).await.unwrap();
        assert_eq!(loaded, vec![zone]);

        assert!(delete_restricted_area(db.pool(), "firing-range").await.unwrap());
        assert!(load_all_restricted_areas(db.pool()).await.unwrap().is_empty());
    }
}

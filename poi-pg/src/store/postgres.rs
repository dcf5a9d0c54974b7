//! Store PostgreSQL/PostGIS
//!
//! Insertion par `COPY ... FORMAT csv` (géométrie en EWKT), requêtes spatiales
//! déléguées à PostGIS (`ST_Contains`, `ST_Distance` sur `geography`).

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use deadpool_postgres::{Object, Pool, Transaction};
use futures::SinkExt;
use geo::{Geometry, Point};
use geojson::GeoJson;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use serde_json::Value;
use tokio_postgres::Row;
use tracing::{info, warn};

use super::transaction::BatchTransaction;
use super::PoiStore;
use crate::record::{CanonicalRecord, StoredPoi};

/// Préfixe EWKT de toutes les géométries stockées
const EWKT_PREFIX: &[u8] = b"SRID=4326;";

/// Colonnes lues pour reconstruire un [`StoredPoi`]
const SELECT_COLUMNS: &str = "id, name, poi_type, address, ST_AsGeoJSON(geom) AS geometry, properties::text AS properties";

/// Session de stockage: une connexion du pool, rendue au drop
pub struct PostgisStore {
    client: Object,
    schema: String,
    batches: usize,
}

impl PostgisStore {
    /// Prend une connexion du pool pour la durée d'une opération
    pub async fn acquire(pool: &Pool, schema: &str) -> Result<Self> {
        validate_identifier(schema)?;
        let client = pool
            .get()
            .await
            .context("Failed to get connection from pool")?;
        Ok(Self {
            client,
            schema: schema.to_string(),
            batches: 0,
        })
    }

    /// Nombre de POI stockés
    pub async fn count(&self) -> Result<i64> {
        let row = self
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {}.poi", self.schema), &[])
            .await
            .context("Failed to count POIs")?;
        Ok(row.get(0))
    }

    async fn query_pois(&self, sql: &str, point: Option<Point<f64>>) -> Result<Vec<Row>> {
        let rows = match point {
            Some(p) => {
                let (lon, lat) = (p.x(), p.y());
                self.client.query(sql, &[&lon, &lat]).await
            }
            None => self.client.query(sql, &[]).await,
        };
        rows.with_context(|| format!("Query failed on {}.poi", self.schema))
    }
}

impl PoiStore for PostgisStore {
    async fn insert_batch(&mut self, records: &[CanonicalRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let data = encode_copy_rows(records)?;
        let copy_sql = format!(
            "COPY {}.poi (name, poi_type, address, geom, properties) FROM STDIN WITH (FORMAT csv, DELIMITER '|', QUOTE '\"', ESCAPE '\"', NULL '')",
            self.schema
        );

        self.batches += 1;
        let mut tx = BatchTransaction::begin(&mut self.client, self.batches).await?;

        match copy_rows(tx.transaction(), &copy_sql, data).await {
            Ok(rows) => {
                tx.record_rows(rows);
                tx.commit().await
            }
            Err(e) => {
                tx.rollback(&format!("{e:#}")).await;
                Err(e)
            }
        }
    }

    async fn find_containing(&self, point: Point<f64>) -> Result<Vec<StoredPoi>> {
        let sql = format!(
            "SELECT {} FROM {}.poi WHERE ST_Contains(geom, ST_SetSRID(ST_MakePoint($1, $2), 4326)) ORDER BY id",
            SELECT_COLUMNS, self.schema
        );
        self.query_pois(&sql, Some(point))
            .await?
            .iter()
            .map(row_to_poi)
            .collect()
    }

    async fn find_nearest(&self, point: Point<f64>) -> Result<Option<(StoredPoi, f64)>> {
        let sql = format!(
            "SELECT {}, ST_Distance(geom::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS distance FROM {}.poi ORDER BY distance, id LIMIT 1",
            SELECT_COLUMNS, self.schema
        );
        let rows = self.query_pois(&sql, Some(point)).await?;
        match rows.first() {
            Some(row) => {
                let distance: f64 = row.try_get("distance")?;
                Ok(Some((row_to_poi(row)?, distance)))
            }
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<StoredPoi>> {
        let sql = format!("SELECT {} FROM {}.poi ORDER BY id", SELECT_COLUMNS, self.schema);
        self.query_pois(&sql, None)
            .await?
            .iter()
            .map(row_to_poi)
            .collect()
    }
}

async fn copy_rows(tx: &Transaction<'_>, copy_sql: &str, data: Bytes) -> Result<u64> {
    let sink = tx.copy_in(copy_sql).await.context("Failed to start COPY")?;
    let mut pinned = std::pin::pin!(sink);
    pinned
        .as_mut()
        .send(data)
        .await
        .context("Failed to send COPY data")?;
    pinned.as_mut().finish().await.context("Failed to finish COPY")
}

/// Encode un lot en lignes CSV `name|poi_type|address|geom|properties`
fn encode_copy_rows(records: &[CanonicalRecord]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(records.len() * 256);
    let mut wkt_buf = Vec::new();

    for record in records {
        push_csv_field(&mut buf, Some(&record.name));
        buf.extend_from_slice(b"|");
        push_csv_field(&mut buf, record.category.as_deref());
        buf.extend_from_slice(b"|");
        push_csv_field(&mut buf, record.address.as_deref());
        buf.extend_from_slice(b"|");

        wkt_buf.clear();
        {
            let mut writer = WktWriter::new(&mut wkt_buf);
            record
                .geometry
                .process_geom(&mut writer)
                .context("Failed to encode geometry to WKT")?;
        }
        buf.extend_from_slice(b"\"");
        buf.extend_from_slice(EWKT_PREFIX);
        buf.extend_from_slice(&wkt_buf);
        buf.extend_from_slice(b"\"");
        buf.extend_from_slice(b"|");

        let properties = record
            .properties
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize properties")?;
        push_csv_field(&mut buf, properties.as_deref());
        buf.extend_from_slice(b"\n");
    }

    Ok(buf.freeze())
}

/// Champ CSV: `None` = NULL (vide non quoté), sinon valeur quotée
fn push_csv_field(buf: &mut BytesMut, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    buf.extend_from_slice(b"\"");
    for b in value.as_bytes() {
        match *b {
            b'"' => buf.extend_from_slice(b"\"\""),
            _ => buf.extend_from_slice(&[*b]),
        }
    }
    buf.extend_from_slice(b"\"");
}

fn row_to_poi(row: &Row) -> Result<StoredPoi> {
    let id: i32 = row.try_get("id")?;
    let geometry: String = row.try_get("geometry")?;
    let properties: Option<String> = row.try_get("properties")?;

    let properties = match properties {
        Some(text) => match serde_json::from_str::<Value>(&text)
            .with_context(|| format!("Invalid properties JSON for POI {}", id))?
        {
            Value::Object(map) if !map.is_empty() => Some(map),
            _ => None,
        },
        None => None,
    };

    Ok(StoredPoi {
        id,
        record: CanonicalRecord {
            name: row.try_get("name")?,
            category: row.try_get("poi_type")?,
            address: row.try_get("address")?,
            geometry: parse_geometry(&geometry)
                .with_context(|| format!("Invalid geometry for POI {}", id))?,
            properties,
        },
    })
}

fn parse_geometry(text: &str) -> Result<Geometry<f64>> {
    match text.parse::<GeoJson>()? {
        GeoJson::Geometry(geometry) => Ok(Geometry::try_from(geometry)?),
        _ => anyhow::bail!("Expected a GeoJSON geometry"),
    }
}

/// Refuse les noms de schéma qui ne sont pas de simples identifiants SQL
fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        anyhow::bail!("Invalid schema name: {:?}", name);
    }
    Ok(())
}

/// Crée le schéma, l'extension PostGIS, la table `poi`, ses index et son trigger
pub async fn create_schema(pool: &Pool, schema: &str, drop_table: bool) -> Result<()> {
    validate_identifier(schema)?;
    let client = pool.get().await?;

    client
        .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
        .await
        .context("Failed to create schema")?;

    // L'extension peut exister sans que l'utilisateur ait le droit de la (re)créer
    match client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        Ok(_) => {}
        Err(e) => {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                return Err(anyhow::anyhow!(
                    "PostGIS extension is not installed and could not be created: {e}"
                ));
            }
        }
    }

    if drop_table {
        client
            .execute(&format!("DROP TABLE IF EXISTS {}.poi CASCADE", schema), &[])
            .await
            .context("Failed to drop poi table")?;
        info!("Dropped table {}.poi", schema);
    }

    client
        .batch_execute(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.poi (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                poi_type VARCHAR(100),
                address VARCHAR(500),
                geom geometry(Geometry, 4326) NOT NULL,
                properties JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_poi_name ON {schema}.poi (name);
            CREATE INDEX IF NOT EXISTS idx_poi_type ON {schema}.poi (poi_type);
            CREATE INDEX IF NOT EXISTS idx_poi_geom ON {schema}.poi USING GIST (geom);

            CREATE OR REPLACE FUNCTION {schema}.poi_set_updated_at() RETURNS trigger AS $$
            BEGIN
                NEW.updated_at = NOW();
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;

            DROP TRIGGER IF EXISTS poi_updated_at ON {schema}.poi;
            CREATE TRIGGER poi_updated_at BEFORE UPDATE ON {schema}.poi
                FOR EACH ROW EXECUTE FUNCTION {schema}.poi_set_updated_at();
            "#
        ))
        .await
        .with_context(|| format!("Failed to create table {}.poi", schema))?;

    info!("Created table {}.poi", schema);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};
    use serde_json::json;

    fn record(name: &str, geometry: Geometry<f64>) -> CanonicalRecord {
        CanonicalRecord {
            name: name.to_string(),
            category: None,
            address: None,
            geometry,
            properties: None,
        }
    }

    #[test]
    fn test_encode_point_row() {
        let mut r = record("Café \"Central\"", Geometry::Point(point!(x: 2.5, y: 48.5)));
        r.category = Some("food".into());
        let data = encode_copy_rows(&[r]).unwrap();
        let line = std::str::from_utf8(&data).unwrap();

        let fields: Vec<&str> = line.trim_end_matches('\n').split('|').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], "\"Café \"\"Central\"\"\"");
        assert_eq!(fields[1], "\"food\"");
        // NULL = champ vide non quoté
        assert_eq!(fields[2], "");
        assert!(fields[3].starts_with("\"SRID=4326;POINT"));
        assert!(fields[3].contains("2.5 48.5"));
        assert_eq!(fields[4], "");
    }

    #[test]
    fn test_encode_properties_and_polygon() {
        let mut r = record(
            "Park",
            Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]),
        );
        r.address = Some(String::new());
        r.properties = json!({"area": 12, "label": "a|b"}).as_object().cloned();

        let data = encode_copy_rows(&[r]).unwrap();
        let line = std::str::from_utf8(&data).unwrap();

        // Chaîne vide quotée, distincte de NULL
        assert!(line.starts_with("\"Park\"||\"\"|\"SRID=4326;POLYGON"));
        assert!(line.ends_with("\"{\"\"area\"\":12,\"\"label\"\":\"\"a|b\"\"}\"\n"));
    }

    #[test]
    fn test_encode_multiple_rows() {
        let records = vec![
            record("a", Geometry::Point(point!(x: 0.0, y: 0.0))),
            record("b", Geometry::Point(point!(x: 1.0, y: 1.0))),
        ];
        let data = encode_copy_rows(&records).unwrap();
        assert_eq!(data.iter().filter(|b| **b == b'\n').count(), 2);
    }

    #[test]
    fn test_parse_geometry() {
        let geometry = parse_geometry(r#"{"type":"Point","coordinates":[-75,40]}"#).unwrap();
        assert_eq!(geometry, Geometry::Point(point!(x: -75.0, y: 40.0)));
        assert!(parse_geometry(r#"{"type":"Feature","geometry":null,"properties":{}}"#).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("public").is_ok());
        assert!(validate_identifier("poi_2024").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2024").is_err());
        assert!(validate_identifier("public; DROP TABLE poi").is_err());
        assert!(validate_identifier("my-schema").is_err());
    }
}

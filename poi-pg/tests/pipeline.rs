//! Tests de bout en bout lecture -> import -> résolution (store mémoire)

use std::path::PathBuf;

use anyhow::Result;
use geo::Point;
use poi_pg::record::{CanonicalRecord, StoredPoi};
use poi_pg::{
    BatchImporter, FieldMapping, ImportError, ImportOptions, ImportStats, MemoryStore, PoiStore,
    SpatialResolver,
};
use serde_json::json;
use tempfile::TempDir;

#[path = "../../geodata/tests/support/shp_fixture.rs"]
mod shp_fixture;

fn write_geojson(dir: &TempDir, name: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, value.to_string()).unwrap();
    path
}

fn point_feature(name: &str, lon: f64, lat: f64) -> serde_json::Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [lon, lat]},
        "properties": {"name": name, "type": "test"}
    })
}

fn square_feature(name: &str, lon: f64, lat: f64, half: f64) -> serde_json::Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lon - half, lat - half],
                [lon + half, lat - half],
                [lon + half, lat + half],
                [lon - half, lat + half],
                [lon - half, lat - half]
            ]]
        },
        "properties": {"name": name, "type": "area", "address": "1 Main St", "zone": "B"}
    })
}

fn collection(features: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"type": "FeatureCollection", "features": features})
}

/// Store dont le n-ième lot échoue
struct FailingStore {
    inner: MemoryStore,
    calls: usize,
    fail_on: usize,
}

impl PoiStore for FailingStore {
    async fn insert_batch(&mut self, records: &[CanonicalRecord]) -> Result<u64> {
        self.calls += 1;
        if self.calls == self.fail_on {
            anyhow::bail!("connection reset");
        }
        self.inner.insert_batch(records).await
    }

    async fn find_containing(&self, point: Point<f64>) -> Result<Vec<StoredPoi>> {
        self.inner.find_containing(point).await
    }

    async fn find_nearest(&self, point: Point<f64>) -> Result<Option<(StoredPoi, f64)>> {
        self.inner.find_nearest(point).await
    }

    async fn all(&self) -> Result<Vec<StoredPoi>> {
        self.inner.all().await
    }
}

#[tokio::test]
async fn test_import_skips_missing_geometry() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "pois.geojson",
        collection(vec![
            point_feature("A", 2.35, 48.85),
            json!({"type": "Feature", "geometry": null, "properties": {"name": "B"}}),
            point_feature("C", 2.36, 48.86),
        ]),
    );

    let mut store = MemoryStore::new();
    let stats = BatchImporter::new(&mut store, ImportOptions::default())
        .import_file(&path)
        .await
        .unwrap();

    assert_eq!(
        stats,
        ImportStats {
            succeeded: 2,
            failed: 0,
            skipped: 1
        }
    );
    let names: Vec<String> = store
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.record.name)
        .collect();
    assert_eq!(names, vec!["A", "C"]);
}

#[tokio::test]
async fn test_import_shapefile_skips_null_shape() {
    let dir = TempDir::new().unwrap();
    let path = shp_fixture::write_point_shapefile(
        dir.path(),
        "poi",
        &[Some((2.3376, 48.8606)), None, Some((2.2945, 48.8584))],
        &shp_fixture::POI_FIELDS,
        &[
            vec!["Louvre", "museum", "1"],
            vec!["Ghost", "unknown", "2"],
            vec!["Tour Eiffel", "monument", "3"],
        ],
    );
    std::fs::write(dir.path().join("poi.prj"), shp_fixture::WGS84_PRJ).unwrap();

    let options = ImportOptions {
        mapping: FieldMapping {
            name: "NAME".into(),
            category: "TYPE".into(),
            address: "ADDRESS".into(),
        },
        ..Default::default()
    };
    let mut store = MemoryStore::new();
    let stats = BatchImporter::new(&mut store, options)
        .import_file(&path)
        .await
        .unwrap();

    assert_eq!(
        stats,
        ImportStats {
            succeeded: 2,
            failed: 0,
            skipped: 1
        }
    );

    let pois = store.all().await.unwrap();
    assert_eq!(pois[0].record.name, "Louvre");
    assert_eq!(pois[0].record.category.as_deref(), Some("museum"));
    assert_eq!(pois[0].record.properties.as_ref().unwrap()["RANK"], 1);
    assert_eq!(pois[1].record.name, "Tour Eiffel");

    let found = SpatialResolver::new(&store)
        .resolve(48.8584, 2.2946)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Tour Eiffel");
    assert!(!found.contained);
}

#[tokio::test]
async fn test_point_inside_polygon_is_contained() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "areas.geojson",
        collection(vec![
            square_feature("Park", -75.0, 40.0, 0.01),
            point_feature("Kiosk", -75.0005, 40.0),
        ]),
    );

    let mut store = MemoryStore::new();
    BatchImporter::new(&mut store, ImportOptions::default())
        .import_file(&path)
        .await
        .unwrap();

    let found = SpatialResolver::new(&store)
        .resolve(40.0, -75.0)
        .await
        .unwrap()
        .unwrap();

    assert!(found.contained);
    assert_eq!(found.distance_meters, 0.0);
    assert_eq!(found.name, "Park");
    assert_eq!(found.address.as_deref(), Some("1 Main St"));
    assert_eq!(found.properties.unwrap()["zone"], "B");
}

#[tokio::test]
async fn test_nearest_point_outside_any_polygon() {
    let dir = TempDir::new().unwrap();
    // 0.013566° de latitude à l'équateur ≈ 1500 m
    let path = write_geojson(
        &dir,
        "points.geojson",
        collection(vec![point_feature("Beacon", 0.0, 0.013566)]),
    );

    let mut store = MemoryStore::new();
    BatchImporter::new(&mut store, ImportOptions::default())
        .import_file(&path)
        .await
        .unwrap();

    let found = SpatialResolver::new(&store)
        .resolve(0.0, 0.0)
        .await
        .unwrap()
        .unwrap();

    assert!(!found.contained);
    assert!((found.distance_meters - 1500.0).abs() < 1.0, "{}", found.distance_meters);
    assert_eq!(found.display_distance(), "1.50 kilometers");
}

#[tokio::test]
async fn test_nearest_is_global_minimum_and_monotone() {
    let mut store = MemoryStore::new();
    let records: Vec<CanonicalRecord> = [(0.05, "far"), (0.01, "near"), (0.03, "mid")]
        .iter()
        .map(|(lat, name)| CanonicalRecord {
            name: name.to_string(),
            category: None,
            address: None,
            geometry: Point::new(0.0, *lat).into(),
            properties: None,
        })
        .collect();
    store.insert_batch(&records).await.unwrap();

    let resolver = SpatialResolver::new(&store);
    let found = resolver.resolve(0.0, 0.0).await.unwrap().unwrap();
    assert_eq!(found.name, "near");

    let mut previous = 0.0;
    for lat in [-0.01, -0.02, -0.04, -0.08] {
        let found = resolver.resolve(lat, 0.0).await.unwrap().unwrap();
        assert_eq!(found.name, "near");
        assert!(found.distance_meters > previous);
        previous = found.distance_meters;
    }
}

#[tokio::test]
async fn test_reimport_gives_same_classification() {
    let text = collection(vec![
        point_feature("A", 1.0, 1.0),
        json!({"type": "Feature", "geometry": null, "properties": {"name": "B"}}),
        json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0]]},
            "properties": {"name": "C"}
        }),
        square_feature("D", 5.0, 5.0, 0.5),
    ])
    .to_string();

    let mut results = Vec::new();
    for _ in 0..2 {
        let dataset = geodata::read_geojson_str(&text).unwrap();
        let total = dataset.len();
        let mut store = MemoryStore::new();
        let stats = BatchImporter::new(&mut store, ImportOptions::default())
            .import(dataset.records)
            .await
            .unwrap();
        assert_eq!(stats.total(), total);
        results.push(stats);
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(
        results[0],
        ImportStats {
            succeeded: 2,
            failed: 1,
            skipped: 1
        }
    );
}

#[tokio::test]
async fn test_failed_batch_reports_committed_rows() {
    let features = (0..5)
        .map(|i| point_feature(&format!("P{i}"), i as f64, 0.0))
        .collect();
    let dataset = geodata::read_geojson_str(&collection(features).to_string()).unwrap();

    let mut store = FailingStore {
        inner: MemoryStore::new(),
        calls: 0,
        fail_on: 2,
    };
    let options = ImportOptions {
        batch_size: 2,
        ..Default::default()
    };
    let err = BatchImporter::new(&mut store, options)
        .import(dataset.records)
        .await
        .unwrap_err();

    match err {
        ImportError::BatchCommit {
            batch, committed, ..
        } => {
            assert_eq!(batch, 2);
            assert_eq!(committed, 2);
        }
        other => panic!("Expected BatchCommit, got {other}"),
    }
    assert_eq!(store.inner.len(), 2);
}

#[tokio::test]
async fn test_progress_and_custom_mapping() {
    let features = (0..7)
        .map(|i| {
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [i as f64, 0.0]},
                "properties": {"NOM": format!("Site {i}"), "CATEGORIE": "museum", "extra": i}
            })
        })
        .collect();
    let dataset = geodata::read_geojson_str(&collection(features).to_string()).unwrap();

    let options = ImportOptions {
        batch_size: 3,
        skip_invalid: true,
        mapping: FieldMapping {
            name: "NOM".into(),
            category: "CATEGORIE".into(),
            address: "ADRESSE".into(),
        },
    };
    let mut seen = Vec::new();
    let mut store = MemoryStore::new();
    let stats = BatchImporter::new(&mut store, options)
        .on_progress(|n| seen.push(n))
        .import(dataset.records)
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 7);
    assert_eq!(seen, vec![3, 6, 7]);

    let pois = store.all().await.unwrap();
    assert_eq!(pois[0].record.name, "Site 0");
    assert_eq!(pois[0].record.category.as_deref(), Some("museum"));
    assert_eq!(pois[0].record.address, None);
    let properties = pois[6].record.properties.as_ref().unwrap();
    assert_eq!(properties["extra"], 6);
    assert!(!properties.contains_key("NOM"));
}

#[tokio::test]
async fn test_strict_mode_aborts_on_missing_geometry() {
    let text = collection(vec![
        point_feature("A", 1.0, 1.0),
        json!({"type": "Feature", "geometry": null, "properties": {"name": "B"}}),
        point_feature("C", 2.0, 2.0),
    ])
    .to_string();
    let dataset = geodata::read_geojson_str(&text).unwrap();

    let options = ImportOptions {
        skip_invalid: false,
        ..Default::default()
    };
    let mut store = MemoryStore::new();
    let err = BatchImporter::new(&mut store, options)
        .import(dataset.records)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::InvalidGeometry { index: 1 }));
    assert!(store.is_empty());
}

#[cfg(feature = "reproject")]
#[tokio::test]
async fn test_reprojected_polygon_contains_reprojected_point() {
    let lambert93 = json!({"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}});
    let (x, y) = (652381.0, 6862047.0);

    let mut polygon = collection(vec![json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [x - 500.0, y - 500.0],
                [x + 500.0, y - 500.0],
                [x + 500.0, y + 500.0],
                [x - 500.0, y + 500.0],
                [x - 500.0, y - 500.0]
            ]]
        },
        "properties": {"name": "Ilot"}
    })]);
    polygon["crs"] = lambert93.clone();

    let mut point = collection(vec![point_feature("Centre", x, y)]);
    point["crs"] = lambert93;

    let dir = TempDir::new().unwrap();
    let polygon_path = write_geojson(&dir, "ilot.geojson", polygon);
    let point_path = write_geojson(&dir, "centre.geojson", point);

    let mut store = MemoryStore::new();
    BatchImporter::new(&mut store, ImportOptions::default())
        .import_file(&polygon_path)
        .await
        .unwrap();

    let centre = geodata::read(&point_path).unwrap();
    assert!(centre.reprojected);
    let geo::Geometry::Point(p) = centre.records[0].geometry.clone().unwrap() else {
        panic!("Expected a point");
    };

    let found = SpatialResolver::new(&store)
        .resolve(p.y(), p.x())
        .await
        .unwrap()
        .unwrap();
    assert!(found.contained);
    assert_eq!(found.name, "Ilot");

    // ~2 km au nord: hors du polygone
    let outside = SpatialResolver::new(&store)
        .resolve(p.y() + 0.02, p.x())
        .await
        .unwrap()
        .unwrap();
    assert!(!outside.contained);
    assert!(outside.distance_meters > 1000.0);
}

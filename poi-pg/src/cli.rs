//! Définition et implémentation des commandes CLI
//!
//! - `import`: GeoJSON / Shapefile -> PostGIS (ou mémoire avec `--dry-run`)
//! - `resolve`: POI contenant ou le plus proche d'un point
//! - `export`: table `poi` -> GeoJSON
//! - `init-db`: schéma, extension PostGIS, table et index

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use deadpool_postgres::Pool;
use geodata::{Dataset, RawRecord};
use tracing::{info, warn};

use poi_pg::location::LocationClient;
use poi_pg::store::postgres::create_schema;
use poi_pg::store::test_connection;
use poi_pg::{
    create_pool, BatchImporter, DatabaseConfig, ImportConfig, ImportError, ImportOptions,
    ImportOverrides, ImportReport, ImportStats, MemoryStore, PoiStore, PostgisStore,
    ResolvedMatch, SpatialResolver,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Import POI data from a GeoJSON or Shapefile into PostGIS
    Import(ImportArgs),

    /// Find the POI containing a point, or the nearest one
    Resolve(ResolveArgs),

    /// Export every stored POI to a GeoJSON FeatureCollection
    Export {
        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Create the schema, PostGIS extension, poi table and indexes
    InitDb {
        /// Drop the poi table before creating it
        #[arg(long)]
        drop_table: bool,

        #[command(flatten)]
        db: DbArgs,
    },
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to GeoJSON (.geojson, .json) or Shapefile (.shp)
    pub file: PathBuf,

    /// Field name for POI name (défaut : name)
    #[arg(long)]
    pub name_field: Option<String>,

    /// Field name for POI type (défaut : type)
    #[arg(long)]
    pub type_field: Option<String>,

    /// Field name for address (défaut : address)
    #[arg(long)]
    pub address_field: Option<String>,

    /// Batch size for insert operations (défaut : 1000)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Fail on invalid geometries instead of skipping
    #[arg(long)]
    pub no_skip_invalid: bool,

    /// Initialize database tables before import
    #[arg(long)]
    pub init_db: bool,

    /// JSON import config (fields, batch_size, skip_invalid)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write a JSON import report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Run the whole pipeline against an in-memory store (no database)
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Latitude (WGS84)
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude (WGS84)
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Use the current location from an IP geolocation service
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub from_ip: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

/// Options de connexion PostgreSQL (priment sur l'environnement)
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// PostgreSQL database name (défaut : env PGDATABASE / gis_city)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// Schema containing the poi table (défaut : env POI_SCHEMA / public)
    #[arg(long)]
    pub schema: Option<String>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

impl DbArgs {
    fn apply(self, config: &mut DatabaseConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = self.database {
            config.dbname = database;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(schema) = self.schema {
            config.schema = schema;
        }
        if let Some(ssl) = self.ssl {
            match ssl.parse() {
                Ok(mode) => config.ssl_mode = mode,
                Err(e) => warn!("{e}, keeping {:?}", config.ssl_mode),
            }
        }
    }
}

/// Configuration effective: environnement puis options CLI
fn database_config(db: DbArgs) -> DatabaseConfig {
    let mut config = DatabaseConfig::from_env();
    db.apply(&mut config);
    config
}

async fn connect(config: &DatabaseConfig) -> Result<Pool> {
    println!("Database: {}", config.describe());
    let pool = create_pool(config)?;
    test_connection(&pool).await?;
    println!("Connected to PostgreSQL");
    Ok(pool)
}

/// Exécute la commande import
pub async fn cmd_import(args: ImportArgs) -> Result<()> {
    let started = Instant::now();

    let config = match &args.config {
        Some(path) => ImportConfig::load(path)?,
        None => ImportConfig::default(),
    };
    let options = config.resolve(ImportOverrides {
        name_field: args.name_field,
        type_field: args.type_field,
        address_field: args.address_field,
        batch_size: args.batch_size,
        no_skip_invalid: args.no_skip_invalid,
    });

    info!(
        path = %args.file.display(),
        batch_size = options.batch_size,
        skip_invalid = options.skip_invalid,
        dry_run = args.dry_run,
        "Starting import"
    );

    let dataset = geodata::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    print_data_summary(&dataset);

    if dataset.is_empty() {
        println!("Error: No geometries found in the file.");
        return Ok(());
    }

    let (result, record_errors) = if args.dry_run {
        let mut store = MemoryStore::new();
        run_import(&mut store, dataset.records, options).await
    } else {
        let db_config = database_config(args.db);
        let pool = connect(&db_config).await?;
        if args.init_db {
            println!("Initializing database tables...");
            create_schema(&pool, &db_config.schema, false).await?;
            println!();
        }
        let mut store = PostgisStore::acquire(&pool, &db_config.schema).await?;
        run_import(&mut store, dataset.records, options).await
    };

    let mut report = ImportReport::new(&args.file, args.dry_run);
    report.record_errors(&record_errors);
    report.set_duration(started.elapsed());

    let outcome = match result {
        Ok(stats) => {
            report.finalize(stats);
            Ok(())
        }
        Err(e) => {
            report.record_fatal(e.to_string());
            report.finalize(partial_stats(&e));
            Err(e)
        }
    };

    report.display();
    if let Some(path) = &args.report {
        report.save_to_file(path)?;
        println!("\nReport written to {}", path.display());
    }
    info!("{}", report.summary());

    outcome.map_err(anyhow::Error::from)
}

async fn run_import<S: PoiStore>(
    store: &mut S,
    records: Vec<RawRecord>,
    options: ImportOptions,
) -> (Result<ImportStats, ImportError>, Vec<String>) {
    let mut importer = BatchImporter::new(store, options)
        .on_progress(|succeeded| println!("  Imported {} records...", succeeded));
    let result = importer.import(records).await;
    (result, importer.record_errors().to_vec())
}

/// Compteurs connus lorsqu'un import est interrompu
fn partial_stats(error: &ImportError) -> ImportStats {
    match error {
        ImportError::BatchCommit { committed, .. } => ImportStats {
            succeeded: *committed,
            ..Default::default()
        },
        _ => ImportStats::default(),
    }
}

fn print_data_summary(dataset: &Dataset) {
    print!("{}", render_data_summary(dataset));
}

/// Bloc texte décrivant le jeu de données lu
fn render_data_summary(dataset: &Dataset) -> String {
    let crs = match &dataset.source_crs {
        Some(crs) if dataset.reprojected => format!("{} (reprojected to EPSG:4326)", crs),
        Some(crs) => crs.to_string(),
        None => "EPSG:4326 (assumed)".to_string(),
    };

    format!(
        "\nData summary:\n  Total records: {}\n  Geometry types: {}\n  CRS: {}\n  Columns: {}\n",
        dataset.len(),
        dataset.geometry_types().join(", "),
        crs,
        dataset.columns().join(", ")
    )
}

/// Exécute la commande resolve
pub async fn cmd_resolve(args: ResolveArgs) -> Result<()> {
    let (latitude, longitude) = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ if args.from_ip => {
            println!("Fetching current location from IP...");
            let client = LocationClient::from_env()?;
            let (lat, lon) = client
                .current_location()
                .await
                .context("Failed to get current location")?;
            println!("Current location: {}, {}", lat, lon);
            (lat, lon)
        }
        _ => anyhow::bail!("Provide --lat and --lon, or --from-ip"),
    };

    let db_config = database_config(args.db);
    let pool = connect(&db_config).await?;
    let store = PostgisStore::acquire(&pool, &db_config.schema).await?;

    info!(latitude, longitude, "Resolving point");
    let resolved = SpatialResolver::new(&store)
        .resolve(latitude, longitude)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!();
        print!("{}", render_match(resolved.as_ref()));
    }
    Ok(())
}

/// Bloc texte affiché par `resolve`
fn render_match(resolved: Option<&ResolvedMatch>) -> String {
    let Some(m) = resolved else {
        return "No POI found containing this location.\nThe point may be outside all POI boundaries.\n"
            .to_string();
    };

    let mut out = String::from("Found POI:\n");
    out.push_str(&format!("  Name: {}\n", m.name));
    if let Some(category) = &m.category {
        out.push_str(&format!("  Type: {}\n", category));
    }
    if let Some(address) = &m.address {
        out.push_str(&format!("  Address: {}\n", address));
    }
    if let Some(properties) = &m.properties {
        out.push_str(&format!(
            "  Properties: {}\n",
            serde_json::Value::Object(properties.clone())
        ));
    }
    if m.contained {
        out.push_str("  Location: inside this POI\n");
    } else {
        out.push_str(&format!("  Distance: {}\n", m.display_distance()));
    }
    out
}

/// Exécute la commande export
pub async fn cmd_export(output: &Path, db: DbArgs) -> Result<()> {
    let db_config = database_config(db);
    let pool = connect(&db_config).await?;
    let store = PostgisStore::acquire(&pool, &db_config.schema).await?;

    let pois = store.all().await?;
    let count = poi_pg::export::export_to_geojson(&pois, output)?;
    println!("Exported {} POIs to {}", count, output.display());
    Ok(())
}

/// Exécute la commande init-db
pub async fn cmd_init_db(drop_table: bool, db: DbArgs) -> Result<()> {
    let db_config = database_config(db);
    let pool = connect(&db_config).await?;

    println!("Initializing database tables...");
    create_schema(&pool, &db_config.schema, drop_table).await?;
    println!("Table {}.poi ready", db_config.schema);
    Ok(())
}

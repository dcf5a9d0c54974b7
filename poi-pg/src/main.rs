//! Point d'entrée CLI pour poi-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Importer des POI vers PostGIS et retrouver le POI d'un point
#[derive(Parser)]
#[command(name = "poi-pg")]
#[command(author, version)]
#[command(about = "Importer des POI (GeoJSON, Shapefile) vers PostGIS et résoudre un point")]
#[command(long_about = "Import de POI vers PostGIS avec reprojection WGS84 et lots transactionnels.\n\nLa commande 'resolve' retourne le POI contenant le point, sinon le plus proche.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Import(args) => {
            info!(path = %args.file.display(), dry_run = args.dry_run, "Import");
            cli::cmd_import(args).await?;
        }
        Commands::Resolve(args) => {
            cli::cmd_resolve(args).await?;
        }
        Commands::Export { output, db } => {
            info!(output = %output.display(), "Export vers GeoJSON");
            cli::cmd_export(&output, db).await?;
        }
        Commands::InitDb { drop_table, db } => {
            cli::cmd_init_db(drop_table, db).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

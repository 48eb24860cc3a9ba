use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tomesvet::{migrate, stats};

#[derive(Debug, Parser)]
#[command(name = "tomesvet", about = "TomesVet clinic data core", version)]
struct Cli {
    /// Optional explicit DB path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Directory holding uploaded documents (defaults next to the database)
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Bring the schema up to date and ensure the upload directory exists
    Migrate,
    /// Show each evolution step and whether it is still pending
    Status,
    /// Print record counts for the main tables
    Counts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tomesvet::init_logging();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let db_path = cli.db.unwrap_or_else(|| data_dir.join("tomesvet.sqlite3"));

    match cli.cmd {
        Cmd::Migrate => {
            let boot = tomesvet::bootstrap(&db_path, &data_dir)
                .await
                .context("bring database schema up to date")?;
            let report = serde_json::to_string_pretty(&boot.report)
                .context("serialize evolution report")?;
            println!("{report}");
            boot.pool.close().await;
        }
        Cmd::Status => {
            let pool = tomesvet::db::open_sqlite_pool(&db_path).await?;
            let statuses = migrate::evolution_status(&pool).await?;
            println!("{:<32} State", "Step");
            for status in &statuses {
                let state = if status.pending { "pending" } else { "present" };
                println!("{:<32} {state}", status.name);
            }
            pool.close().await;
            if statuses.iter().any(|s| s.pending) {
                std::process::exit(1);
            }
        }
        Cmd::Counts => {
            let pool = tomesvet::db::open_sqlite_pool(&db_path).await?;
            let counts = stats::dashboard_counts(&pool).await?;
            let serialized =
                serde_json::to_string_pretty(&counts).context("serialize dashboard counts")?;
            println!("{serialized}");
            pool.close().await;
        }
    }

    Ok(())
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| anyhow::anyhow!("failed to resolve application data directory"))?;
    Ok(base.join("tomesvet"))
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "warehouse", version, about = "Rent-contract warehouse CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// CSV -> Bronze IPC
    Ingest {
        #[arg(long, default_value = "rent_contracts")]
        dataset: String,
        #[arg(long)]
        source: PathBuf,
        #[arg(long, value_name = "YYYY-MM-DD")]
        ingest_date: String,
        #[arg(long, default_value = "./data")]
        root: PathBuf,
    },
    /// Bronze IPC -> Silver IPC (typed columns + quality flags)
    Clean {
        #[arg(long, default_value = "rent_contracts")]
        dataset: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        ingest_date: String,
        #[arg(long, default_value = "./data")]
        root: PathBuf,
    },
    /// Silver IPC -> Gold star schema Parquet + manifests
    Star {
        #[arg(long, default_value = "rent_contracts")]
        dataset: String,
        /// Which Silver ingest to use
        #[arg(long, value_name = "YYYY-MM-DD")]
        ingest_date: String,
        /// Where to place the Gold snapshot
        #[arg(long, value_name = "YYYY-MM-DD")]
        snapshot_date: String,
        #[arg(long, default_value = "./data")]
        root: PathBuf,
    },
    /// Silver IPC -> standalone Parquet file
    ExportSilver {
        #[arg(long, default_value = "rent_contracts")]
        dataset: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        ingest_date: String,
        #[arg(long, default_value = "./data")]
        root: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Contracts ending within the horizon, computed from a Silver ingest
    Expiring {
        #[arg(long, default_value = "rent_contracts")]
        dataset: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        ingest_date: String,
        #[arg(long, default_value = "./data")]
        root: PathBuf,
        /// Reference date for the window; defaults to today (UTC)
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<String>,
        #[arg(long, default_value_t = star::expiring::DEFAULT_HORIZON_DAYS)]
        horizon_days: i64,
        /// Optionally write the view as a Parquet file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let start = std::time::Instant::now();
    match cli.cmd {
        Commands::Ingest { dataset, source, ingest_date, root } => {
            let cfg = ingest::IngestConfig {
                slug: dataset,
                ingest_date,
                storage_root: root,
                bronze_dir: "bronze".to_string(),
            };
            let st = ingest::ingest_contracts(cfg, source.as_path()).await?;
            println!(
                "INGEST OK rows_in={} bytes_in={} out={}",
                st.rows_in,
                st.bytes_in,
                st.out_path.display()
            );
        }
        Commands::Clean { dataset, ingest_date, root } => {
            let cfg = clean::CleanConfig {
                slug: dataset,
                ingest_date,
                storage_root: root,
                bronze_dir: "bronze".to_string(),
                silver_dir: "silver".to_string(),
            };
            let st = clean::clean_contracts(cfg).await?;
            println!(
                "CLEAN OK rows_in={} rows_out={} date_issues={} amount_issues={} silver={}",
                st.rows_in,
                st.rows_out,
                st.date_issues,
                st.amount_issues,
                st.silver_out.display()
            );
        }
        Commands::Star { dataset, ingest_date, snapshot_date, root } => {
            let cfg = star::StarConfig {
                slug: dataset,
                ingest_date,
                snapshot_date,
                storage_root: root,
                silver_dir: "silver".to_string(),
                gold_dir: "gold".to_string(),
                manifests_dir: "manifests".to_string(),
            };
            let st = star::build_star_schema(cfg).await?;
            println!(
                "STAR OK facts={} dims=ct:{},prop:{},proj:{},loc:{},ten:{},date:{} snapshot_dir={} commit={}",
                st.fact_rows,
                st.dim_contract_type_rows,
                st.dim_property_rows,
                st.dim_project_rows,
                st.dim_location_rows,
                st.dim_tenant_rows,
                st.dim_date_rows,
                st.snapshot_dir.display(),
                st.commit_path.display()
            );
        }
        Commands::ExportSilver { dataset, ingest_date, root, out } => {
            let cfg = export::ExportConfig {
                slug: dataset,
                ingest_date,
                storage_root: root,
                silver_dir: "silver".to_string(),
                out_path: out,
            };
            let st = export::export_silver(cfg).await?;
            println!(
                "EXPORT OK rows_out={} bytes_out={} out={}",
                st.rows_out,
                st.bytes_out,
                st.out_path.display()
            );
        }
        Commands::Expiring { dataset, ingest_date, root, as_of, horizon_days, out } => {
            let as_of = match as_of {
                Some(s) => Date::parse(&s, &format_description!("[year]-[month]-[day]"))?,
                None => OffsetDateTime::now_utc().date(),
            };
            let silver_path = root
                .join("silver")
                .join(&dataset)
                .join(format!("ingest_date={ingest_date}"))
                .join(model::SILVER_PART);
            let silver = model::read_silver(&silver_path)?;
            let dims = star::dims::build_dimensions(&silver)?;
            let facts = star::fact::build_facts(&silver, &dims)?;
            let view = star::expiring::expiring_contracts(&facts, &dims, as_of, horizon_days);
            println!(
                "EXPIRING OK as_of={as_of} horizon_days={horizon_days} rows={}",
                view.len()
            );
            if let Some(out) = out {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let batch = star::gold::expiring_batch(&view)?;
                let rows =
                    star::gold::write_table(&out, star::gold::expiring_schema(), &[batch])?;
                println!("EXPIRING WRITTEN rows={} out={}", rows, out.display());
            }
        }
    }
    let duration_pretty = humantime::format_duration(start.elapsed());
    println!("DONE in {}", duration_pretty);
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use legis_core::action::VoteRequest;
use legis_core::cache::{DocumentCache, DocumentKind, FsCache};
use legis_core::config::SyncConfig;
use legis_core::db;
use legis_core::fetch::HttpFetcher;
use legis_core::pipeline::{ROSTER_ID, SyncPipeline};
use legis_core::refresh::PlannedBill;
use legis_core::schema::{Tally, VoteKind};
use legis_core::vote::{VoteContext, extract_vote};
use legis_export::{OutputPaths, load_snapshot, save_snapshot, to_json_string, write_outputs};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "legis")]
#[command(about = "Montana Legislature bill, action and vote sync", long_about = None)]
struct Cli {
    /// TOML run configuration (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every listed bill and export bills, actions and votes
    Sync {
        /// Reuse the cached bill listing instead of fetching it
        #[arg(long)]
        cached_roster: bool,
        /// Also upsert the records into this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Re-fetch one bill and print its records as JSON
    Bill {
        /// Bill key, e.g. "HB 102"
        key: String,
    },
    /// Fetch and parse a single vote document, printing it as JSON
    Vote(VoteArgs),
    /// Export JSON Schemas for the exported record types
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Args)]
struct VoteArgs {
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    bill: String,
    #[arg(long)]
    action_id: String,
    #[arg(long, value_enum)]
    kind: KindArg,
    /// Yeas reported on the bill page
    #[arg(long, default_value_t = 0)]
    yeas: u32,
    /// Nays reported on the bill page
    #[arg(long, default_value_t = 0)]
    nays: u32,
    /// Action date; veto overrides take theirs from the action row
    #[arg(long, required_if_eq("kind", "veto-override"))]
    date: Option<String>,
    /// Action description
    #[arg(long, required_if_eq("kind", "veto-override"))]
    description: Option<String>,
}

impl From<VoteArgs> for VoteRequest {
    fn from(args: VoteArgs) -> Self {
        VoteRequest {
            kind: args.kind.into(),
            url: args.url,
            bill: args.bill,
            action_id: args.action_id,
            action_description: args.description.unwrap_or_default(),
            action_date: args.date.unwrap_or_default(),
            reported: Tally::yes_no(args.yeas, args.nays),
        }
    }
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for the record types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Floor,
    Committee,
    VetoOverride,
}

impl From<KindArg> for VoteKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Floor => VoteKind::Floor,
            KindArg::Committee => VoteKind::Committee,
            KindArg::VetoOverride => VoteKind::VetoOverride,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("legis=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };

    match cli.command {
        Commands::Sync { cached_roster, db } => sync(&config, cached_roster, db.as_deref()),
        Commands::Bill { key } => bill(&config, &key),
        Commands::Vote(args) => vote(&config, args.into()),
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
    }
}

fn sync(config: &SyncConfig, cached_roster: bool, db_path: Option<&Path>) -> Result<()> {
    info!(session = %config.session_id, cache = %config.cache_dir().display(), "sync starting");
    let mut cache = FsCache::new(config.cache_dir());
    let fetcher = HttpFetcher::new(config);
    let snapshot_path = config.snapshot_path();
    let snapshot = load_snapshot(&snapshot_path)?;

    let mut pipeline = SyncPipeline::new(config, &mut cache, &fetcher);
    let roster = pipeline.load_roster(cached_roster)?;
    let output = pipeline.run(&roster, &snapshot)?;

    write_outputs(&OutputPaths::new(config.output_dir()), &output)?;
    save_snapshot(&snapshot_path, &output.bills)?;

    if let Some(path) = db_path {
        let mut conn = db::open(path)?;
        db::store_output(&mut conn, &output)
            .with_context(|| format!("storing records in {}", path.display()))?;
        info!(db = %path.display(), "records stored");
    }
    Ok(())
}

fn bill(config: &SyncConfig, key: &str) -> Result<()> {
    let mut cache = FsCache::new(config.cache_dir());
    let fetcher = HttpFetcher::new(config);
    let cached = cache.exists(DocumentKind::Roster, ROSTER_ID);

    let mut pipeline = SyncPipeline::new(config, &mut cache, &fetcher);
    let roster = pipeline.load_roster(cached)?;
    let entry = roster
        .into_iter()
        .find(|e| e.key == key)
        .with_context(|| format!("{key} is not in the bill listing"))?;

    let output = pipeline.process_bill(&PlannedBill {
        entry,
        refresh: true,
    })?;
    let json = serde_json::json!({
        "bill": output.bills.first(),
        "actions": output.actions,
        "votes": output.votes,
    });
    println!("{}", to_json_string(&json)?);
    Ok(())
}

fn vote(config: &SyncConfig, request: VoteRequest) -> Result<()> {
    let mut cache = FsCache::new(config.cache_dir());
    let fetcher = HttpFetcher::new(config);
    let mut ctx = VoteContext {
        config,
        cache: &mut cache,
        fetcher: &fetcher,
        refresh: true,
    };
    let record = extract_vote(&request, &mut ctx)?;
    println!("{}", to_json_string(&record)?);
    Ok(())
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let schemas = [
        ("RosterEntry", schema_for!(legis_core::schema::RosterEntry)),
        ("BillRecord", schema_for!(legis_core::schema::BillRecord)),
        ("ActionRecord", schema_for!(legis_core::schema::ActionRecord)),
        ("VoteRecord", schema_for!(legis_core::schema::VoteRecord)),
    ];
    for (name, schema) in schemas {
        let json = serde_json::to_string_pretty(&schema)?;
        fs::write(out_dir.join(format!("{name}.schema.json")), json)?;
    }

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use invrec_rules::resolve_profile;
use invrec_sheets::Rgb;
use invrec_sync::{census, extract_file, run_from_config, RunMode, SyncConfig, DEFAULT_PARENTS};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "invrec-cli")]
#[command(about = "Reconcile server/VM inventory reports into a spreadsheet")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract every report and update or insert its spreadsheet row.
    Sync(RunArgs),
    /// Colour the rows that report file names point at.
    Highlight {
        #[command(flatten)]
        run: RunArgs,
        /// Background colour as #RRGGBB.
        #[arg(long)]
        color: Option<String>,
    },
    /// Print the record extracted from one report as JSON.
    Extract {
        file: PathBuf,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Load a profile and report its rules and layout.
    CheckProfile { profile: String },
    /// Count reports per folder by type marker.
    Count {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Parent folders to scan; defaults to draft, done and notes.
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Directory holding the report files.
    #[arg(long)]
    dir: Option<PathBuf>,
    #[arg(long)]
    profile: Option<String>,
    #[arg(long)]
    spreadsheet_id: Option<String>,
    #[arg(long)]
    worksheet: Option<String>,
    #[arg(long)]
    reports_dir: Option<PathBuf>,
    /// Abort the batch on the first failed file.
    #[arg(long)]
    stop_on_error: bool,
}

impl RunArgs {
    fn apply(self, config: &mut SyncConfig) {
        if let Some(dir) = self.dir {
            config.directory = dir;
        }
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        if let Some(id) = self.spreadsheet_id {
            config.spreadsheet_id = Some(id);
        }
        if let Some(worksheet) = self.worksheet {
            config.worksheet = worksheet;
        }
        if let Some(reports_dir) = self.reports_dir {
            config.reports_dir = reports_dir;
        }
        if self.stop_on_error {
            config.continue_on_error = false;
        }
    }
}

async fn run_batch(config: &SyncConfig, mode: RunMode) -> Result<()> {
    let (recap, dir) = run_from_config(config, mode).await?;
    let counts = recap.counts();
    println!(
        "run complete: run_id={} files={} updated={} inserted={} highlighted={} skipped={} failed={} reports={}",
        recap.run_id,
        counts.total,
        counts.updated,
        counts.inserted,
        counts.highlighted,
        counts.skipped,
        counts.failed,
        dir.display()
    );
    for (file, reason) in recap.reasons() {
        println!("  {file}: {reason}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Sync(RunArgs::default())) {
        Commands::Sync(args) => {
            args.apply(&mut config);
            run_batch(&config, RunMode::Sync).await?;
        }
        Commands::Highlight { run, color } => {
            run.apply(&mut config);
            if let Some(raw) = color {
                config.highlight_color =
                    Rgb::parse_hex(&raw).with_context(|| format!("invalid colour {raw}"))?;
            }
            run_batch(&config, RunMode::Highlight).await?;
        }
        Commands::Extract { file, profile } => {
            let name = profile.unwrap_or_else(|| config.profile.clone());
            let profile = resolve_profile(&name, &config.profiles_dir)?;
            let record = extract_file(&profile, &file).await?;
            let json = serde_json::to_string_pretty(&record.to_view())
                .context("serializing record")?;
            println!("{json}");
        }
        Commands::CheckProfile { profile } => {
            let profile = resolve_profile(&profile, &config.profiles_dir)?;
            let layout = &profile.layout;
            println!(
                "profile {} v{}: {} rules, identity columns serial={} rack={} slot={}",
                profile.name,
                profile.version,
                profile.rule_set.len(),
                layout.serial_column,
                layout.rack_column,
                layout.slot_column
            );
            for block in &layout.write_blocks {
                println!("  block {}:{} ({} cells)", block.start, block.end, block.width());
            }
        }
        Commands::Count { root, parents } => {
            let parents: Vec<&str> = if parents.is_empty() {
                DEFAULT_PARENTS.to_vec()
            } else {
                parents.iter().map(String::as_str).collect()
            };
            print!("{}", census(&root, &parents)?.render());
        }
    }

    Ok(())
}

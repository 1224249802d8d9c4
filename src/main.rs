mod db;
mod roster;
mod settings;

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use roster::ImportResult;
use settings::Settings;

#[derive(Parser)]
#[command(name = "roster", about = "Import member rosters pasted from a workspace members page")]
struct Cli {
    /// SQLite database path (overrides ROSTER_DB_PATH / roster.toml)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the accounts members are imported into
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Parse pasted text and print the members found, without saving
    Preview {
        /// Text file to read (default: stdin)
        file: Option<PathBuf>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Parse pasted text and save the members under an account
    Import {
        /// Account id the members belong to
        #[arg(short, long)]
        account: i64,
        /// Text files to read (default: stdin)
        files: Vec<PathBuf>,
    },
    /// List stored members of an account
    Members {
        #[arg(short, long)]
        account: i64,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show database statistics
    Stats,
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Register a new account
    Add {
        #[arg(short, long)]
        label: String,
        /// Owner email (unique per account)
        #[arg(short, long)]
        owner: String,
        #[arg(short, long, default_value = "0")]
        seats: u32,
    },
    /// List accounts with member counts
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Account { command } => {
            let conn = open_db(&settings)?;
            match command {
                AccountCommand::Add { label, owner, seats } => {
                    let id = db::insert_account(&conn, &label, &owner, seats)?;
                    info!(id, %owner, "account created");
                    println!("Created account {} ({})", id, label);
                }
                AccountCommand::List => {
                    let rows = db::fetch_accounts(&conn)?;
                    if rows.is_empty() {
                        println!("No accounts. Create one with 'account add'.");
                        return Ok(());
                    }
                    println!(
                        "{:>4} | {:<24} | {:<28} | {:<8} | {:>5} | {:>7}",
                        "Id", "Label", "Owner", "Status", "Seats", "Members"
                    );
                    println!("{}", "-".repeat(90));
                    for r in &rows {
                        println!(
                            "{:>4} | {:<24} | {:<28} | {:<8} | {:>5} | {:>7}",
                            r.id,
                            truncate(&r.label, 24),
                            truncate(&r.owner_email, 28),
                            r.status,
                            r.seats_total,
                            r.member_count
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Preview { file, json } => {
            let input = read_input(file.as_deref(), settings.max_input_bytes)?;
            let result = settings.parser().parse(&input.text);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_empty() {
                println!("No members found in {}.", input.source);
            } else {
                print_records(&result);
            }
            Ok(())
        }
        Commands::Import { account, files } => {
            let conn = open_db(&settings)?;
            db::require_account(&conn, account)?;

            let inputs = if files.is_empty() {
                vec![read_input(None, settings.max_input_bytes)?]
            } else {
                files
                    .iter()
                    .map(|f| read_input(Some(f.as_path()), settings.max_input_bytes))
                    .collect::<Result<Vec<_>>>()?
            };

            let counts = import_inputs(&conn, &settings, account, &inputs)?;
            counts.print(account);
            Ok(())
        }
        Commands::Members { account, limit } => {
            let conn = open_db(&settings)?;
            let rows = db::fetch_members(&conn, account, limit)?;
            if rows.is_empty() {
                println!("Account {} has no members yet.", account);
                return Ok(());
            }
            println!(
                "{:>5} | {:<24} | {:<32} | {:<6} | {:<7} | {:<10}",
                "Id", "Name", "Email", "Role", "Status", "Added"
            );
            println!("{}", "-".repeat(100));
            for r in &rows {
                let added = r.date_added.get(..10).unwrap_or(&r.date_added);
                let marker = if r.date_source == "default" { "*" } else { "" };
                println!(
                    "{:>5} | {:<24} | {:<32} | {:<6} | {:<7} | {}{}",
                    r.id,
                    truncate(&r.name, 24),
                    truncate(&r.email, 32),
                    r.role,
                    r.status,
                    added,
                    marker
                );
            }
            println!("\n{} members | * = date not found in pasted text", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = open_db(&settings)?;
            let s = db::get_stats(&conn)?;
            println!("Accounts:        {}", s.accounts);
            println!("Members:         {}", s.members);
            println!("Import runs:     {}", s.imports);
            println!("Defaulted dates: {}", s.defaulted_dates);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_db(settings: &Settings) -> Result<rusqlite::Connection> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

struct Input {
    source: String,
    text: String,
}

fn read_input(path: Option<&std::path::Path>, max_bytes: usize) -> Result<Input> {
    let (source, bytes) = match path {
        Some(p) => (
            p.display().to_string(),
            std::fs::read(p).with_context(|| format!("Failed to read {:?}", p))?,
        ),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            ("stdin".to_string(), buf)
        }
    };
    if bytes.len() > max_bytes {
        bail!(
            "{} is {} bytes, over the {} byte limit (set ROSTER_MAX_INPUT_BYTES to raise it)",
            source,
            bytes.len(),
            max_bytes
        );
    }
    // Browser copies sometimes carry stray non-UTF-8 bytes; keep the rest of the text.
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(%source, error = %e.utf8_error(), "input is not valid UTF-8, replacing bad bytes");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(Input { source, text })
}

struct ImportCounts {
    files: usize,
    empty: usize,
    members: usize,
}

impl ImportCounts {
    fn print(&self, account: i64) {
        if self.members == 0 {
            println!("Nothing imported: no email addresses found.");
            return;
        }
        println!(
            "Imported {} members into account {} ({} inputs, {} without members).",
            self.members, account, self.files, self.empty
        );
    }
}

/// Parse every input in parallel, then write all rosters in one transaction.
fn import_inputs(
    conn: &rusqlite::Connection,
    settings: &Settings,
    account: i64,
    inputs: &[Input],
) -> Result<ImportCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let parser = settings.parser();
    let now = Utc::now();
    let results: Vec<ImportResult> = inputs
        .par_iter()
        .map(|i| {
            let result = parser.parse_at(&i.text, now);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    let mut counts = ImportCounts {
        files: inputs.len(),
        empty: 0,
        members: 0,
    };
    let mut batches = Vec::new();

    for (input, result) in inputs.iter().zip(&results) {
        if result.is_empty() {
            warn!(source = %input.source, "no email addresses found");
            counts.empty += 1;
        } else {
            counts.members += result.count();
            batches.push(db::ImportBatch {
                source: &input.source,
                records: &result.records,
            });
        }
    }

    if !batches.is_empty() {
        let runs = db::save_imports(conn, account, &batches)?;
        info!(account, runs = runs.len(), members = counts.members, "import saved");
    }
    Ok(counts)
}

fn print_records(result: &ImportResult) {
    println!("{:>3} | {:<24} | {:<32} | {:<6} | {:<10}", "#", "Name", "Email", "Role", "Joined");
    println!("{}", "-".repeat(90));
    for (i, r) in result.records.iter().enumerate() {
        let joined = if r.joined.is_parsed() {
            r.joined.instant().format("%Y-%m-%d").to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:>3} | {:<24} | {:<32} | {:<6} | {:<10}",
            i + 1,
            truncate(&r.name, 24),
            truncate(&r.email, 32),
            r.role.as_str(),
            joined
        );
    }
    println!("\n{} members found", result.count());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

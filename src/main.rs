use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod config;
mod db;
mod decision;
mod error;
mod evaluation;
mod forest;
mod layout;
mod logging;
mod models;
mod pdf;
mod pipeline;
mod report;
mod rules;
mod schema;
mod score;

use config::EngineConfig;
use pipeline::StudentQuery;
use report::ReportArtifact;
use schema::NormalizedRoster;

#[derive(Parser)]
#[command(name = "graduation-forecast")]
#[command(about = "Graduation prediction engine for school rosters", long_about = None)]
struct Cli {
    /// TOML file with threshold, absence limit, bonus table and subjects
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RosterSource {
    /// Read the roster from a CSV file instead of the database
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Restrict the roster to one class
    #[arg(long)]
    class: Option<String>,
}

#[derive(Args)]
struct RuleOverrides {
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=200))]
    threshold: Option<u32>,
    #[arg(long)]
    absence_limit: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small sample roster
    Seed,
    /// Normalize a CSV roster and store it
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Decide the whole roster and write the grouped report
    Predict {
        #[command(flatten)]
        source: RosterSource,
        #[command(flatten)]
        rules: RuleOverrides,
        #[arg(long, default_value = "Class")]
        class_name: String,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the outcome as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Decide one student and write the individual report
    #[command(group(
        ArgGroup::new("who")
            .args(["id", "name"])
            .required(true)
            .multiple(false)
    ))]
    Student {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        source: RosterSource,
        #[command(flatten)]
        rules: RuleOverrides,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write the subject score table for the roster
    ReportCard {
        #[command(flatten)]
        source: RosterSource,
        #[arg(long, default_value = "Class")]
        class_name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when no --csv roster is given")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn read_csv_roster(path: &Path, config: &EngineConfig) -> anyhow::Result<NormalizedRoster> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open roster {}", path.display()))?;
    let raw = schema::read_roster(file)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    Ok(schema::normalize(&raw, config)?)
}

async fn load_roster(
    source: &RosterSource,
    config: &EngineConfig,
) -> anyhow::Result<NormalizedRoster> {
    match &source.csv {
        Some(path) => {
            let mut roster = read_csv_roster(path, config)?;
            if let Some(class) = &source.class {
                roster.retain_class(class);
            }
            Ok(roster)
        }
        None => {
            let pool = connect().await?;
            let records = db::fetch_roster(&pool, source.class.as_deref()).await?;
            Ok(records.into())
        }
    }
}

fn apply_overrides(
    mut config: EngineConfig,
    rules: &RuleOverrides,
) -> anyhow::Result<EngineConfig> {
    if let Some(threshold) = rules.threshold {
        config.threshold = threshold;
    }
    if let Some(limit) = rules.absence_limit {
        config.absence_override_limit = limit;
    }
    config.validate()?;
    Ok(config)
}

fn write_artifact(
    artifact: &ReportArtifact,
    out: Option<PathBuf>,
    quiet: bool,
) -> anyhow::Result<()> {
    let path = out.unwrap_or_else(|| PathBuf::from(&artifact.filename));
    std::fs::write(&path, &artifact.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = artifact.bytes.len(), "report written");
    if !quiet {
        println!("Report written to {} ({}).", path.display(), artifact.mime);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_level.as_deref())?;
    let config = EngineConfig::load(cli.config.as_deref())?;
    let today = chrono::Local::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            let inserted = db::seed(&pool, today).await?;
            println!("Seeded {inserted} students.");
        }
        Commands::Import { csv } => {
            let roster = read_csv_roster(&csv, &config)?;
            let pool = connect().await?;
            let imported = db::import_roster(&pool, &roster.records, today).await?;
            println!("Imported {imported} students from {}.", csv.display());
            if !roster.warnings.is_empty() {
                println!("Skipped {} duplicate rows.", roster.warnings.len());
            }
        }
        Commands::Predict {
            source,
            rules,
            class_name,
            out,
            json,
        } => {
            let config = apply_overrides(config, &rules)?;
            let roster = load_roster(&source, &config).await?;
            let outcome = pipeline::run_roster(&roster, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let summary = outcome.summary();
                println!(
                    "Threshold {}: {} passed, {} failed, {} excluded.",
                    outcome.threshold, summary.passed, summary.failed, summary.excluded
                );
                match &outcome.evaluation {
                    models::EvaluationOutcome::Evaluated(report) => {
                        for (name, value) in report.named_metrics() {
                            println!("- {name}: {value:.2}");
                        }
                    }
                    models::EvaluationOutcome::NotApplicable { reason } => {
                        println!("Evaluation not applicable: {reason}.");
                    }
                }
                for warning in &outcome.warnings {
                    println!("! {} ({}): {}", warning.name, warning.id, warning.reason);
                }
            }

            // Decisions above stay valid even if rendering fails.
            let artifact = report::roster_report(&outcome, &class_name, today)
                .context("failed to render roster report")?;
            write_artifact(&artifact, out, json)?;
        }
        Commands::Student {
            id,
            name,
            source,
            rules,
            out,
        } => {
            let config = apply_overrides(config, &rules)?;
            let roster = load_roster(&source, &config).await?;
            let query = match (id, name) {
                (Some(id), _) => StudentQuery::Id(id),
                (None, Some(name)) => StudentQuery::Name(name),
                (None, None) => anyhow::bail!("either --id or --name is required"),
            };

            let record = pipeline::find_student(&roster.records, &query)
                .with_context(|| format!("student not found: {query:?}"))?;
            let outcome = pipeline::decide_student(record, &config)?;

            let verdict = if outcome.decision.label.is_pass() {
                "PASSED"
            } else {
                "NOT PASSED"
            };
            println!(
                "{} ({}) final score {:.2}: {verdict}",
                outcome.name, outcome.id, outcome.score.final_score
            );
            if let Some(reason) = &outcome.decision.override_reason {
                println!("Note: {reason}");
            }

            let artifact = report::student_report(&outcome, today)
                .context("failed to render student report")?;
            write_artifact(&artifact, out, false)?;
        }
        Commands::ReportCard {
            source,
            class_name,
            out,
        } => {
            let records = load_roster(&source, &config).await?.records;
            if records.is_empty() {
                println!("No students found for this roster.");
                return Ok(());
            }
            let artifact = report::report_card(&records, &config.subjects, &class_name, today)
                .context("failed to render report card")?;
            write_artifact(&artifact, out, false)?;
        }
    }

    Ok(())
}

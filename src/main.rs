use std::path::PathBuf;

use academic_engine::attendance::{
    absences_by_bimester, annual_attendance, bimester_attendance, student_attendance,
};
use academic_engine::calendar::locate_bimester_str;
use academic_engine::config::EngineConfig;
use academic_engine::db;
use academic_engine::gating::{approved_view, gated_bimester, PLACEHOLDER};
use academic_engine::models::BimesterNumber;
use academic_engine::report::{self, format_attendance};
use academic_engine::snapshot::SchoolSnapshot;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "academic-engine")]
#[command(about = "Bimester grades and attendance for school report cards", long_about = None)]
struct Cli {
    /// JSON file with engine rules (thresholds, lesson length)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Read documents from a JSON snapshot instead of Postgres
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Evaluate as of this date instead of the current one
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the document store schema
    InitDb,
    /// Load a sample school year
    Seed,
    /// Import attendance rows from a CSV file
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the bimester a date falls in
    Bimester {
        #[arg(long)]
        date: String,
    },
    /// Attendance percentages for a student in one subject
    Attendance {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        bimester: Option<BimesterNumber>,
    },
    /// Averages and situation per subject
    Grades {
        #[arg(long)]
        student: String,
        #[arg(long, default_value_t = false)]
        year_finished: bool,
    },
    /// Generate a markdown report card
    Report {
        #[arg(long)]
        student: String,
        #[arg(long, default_value_t = false)]
        year_finished: bool,
        #[arg(long, default_value = "report-card.md")]
        out: PathBuf,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set unless --snapshot is given")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_snapshot(path: Option<&PathBuf>) -> anyhow::Result<SchoolSnapshot> {
    match path {
        Some(path) => SchoolSnapshot::from_json_path(path),
        None => db::load_snapshot(&connect().await?).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAttendance { csv } => {
            let inserted = db::import_attendance_csv(&connect().await?, &csv).await?;
            info!(inserted, "attendance import finished");
            println!("Imported {inserted} attendance rows from {}.", csv.display());
        }
        Commands::Bimester { date } => {
            let snapshot = load_snapshot(cli.snapshot.as_ref()).await?;
            let bimester = locate_bimester_str(&date, snapshot.calendar.as_ref());
            println!("{date} falls in bimester {bimester}.");
        }
        Commands::Attendance {
            student,
            subject,
            bimester,
        } => {
            let snapshot = load_snapshot(cli.snapshot.as_ref()).await?;
            let profile = snapshot
                .student(&student)
                .with_context(|| format!("unknown student {student}"))?;
            let ctx = snapshot.context(&config, today);
            let scope = profile.scope();

            if let Some(number) = bimester {
                let result = student_attendance(
                    &ctx,
                    &scope,
                    &profile.id,
                    &subject,
                    &snapshot.attendance,
                    number,
                );
                println!(
                    "{} in {subject}, bimester {number}: {} ({} absences over {} classes)",
                    profile.name,
                    format_attendance(&result),
                    result.absences,
                    result.taught
                );
                return Ok(());
            }

            let absences = absences_by_bimester(
                &snapshot.attendance,
                &profile.id,
                &subject,
                ctx.calendar,
                today,
            );
            println!("Attendance for {} in {subject}:", profile.name);
            for number in 1..=ctx.current_bimester() {
                let result = bimester_attendance(
                    &ctx,
                    &scope,
                    &subject,
                    absences[usize::from(number - 1)],
                    number,
                );
                println!("- bimester {number}: {}", format_attendance(&result));
            }
            let annual = annual_attendance(&ctx, &scope, &subject, &absences);
            println!("- year: {}", format_attendance(&annual));
        }
        Commands::Grades {
            student,
            year_finished,
        } => {
            let snapshot = load_snapshot(cli.snapshot.as_ref()).await?;
            let profile = snapshot
                .student(&student)
                .with_context(|| format!("unknown student {student}"))?;

            let entries: Vec<_> = snapshot.grades_for(&profile.id).collect();
            if entries.is_empty() {
                println!("No grades recorded for {}.", profile.name);
                return Ok(());
            }

            println!("Grades for {}:", profile.name);
            for entry in entries {
                let shown: Vec<String> = entry
                    .bimesters
                    .iter()
                    .map(|b| gated_bimester(b).average.display(1))
                    .collect();
                let data = approved_view(entry).final_data(config.thresholds(), year_finished);
                println!(
                    "- {}: {} | annual {} | {}",
                    entry.subject,
                    shown.join(" "),
                    data.annual_average
                        .map_or_else(|| PLACEHOLDER.to_string(), |v| format!("{v:.1}")),
                    data.situation.label()
                );
            }
        }
        Commands::Report {
            student,
            year_finished,
            out,
        } => {
            let snapshot = load_snapshot(cli.snapshot.as_ref()).await?;
            let profile = snapshot
                .student(&student)
                .with_context(|| format!("unknown student {student}"))?;
            let summaries =
                report::summarize_subjects(&snapshot, profile, &config, today, year_finished);
            let card =
                report::build_report_card(profile, &summaries, today, config.minimum_attendance);
            std::fs::write(&out, card)?;
            println!("Report card written to {}.", out.display());
        }
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use testledger::capture::{FileScreenshot, ScreenshotSource, TestOutcome};
use testledger::config::{LedgerConfig, LoggingConfig};
use testledger::model::{TestStatus, TestType};

#[derive(Parser)]
#[command(
    name = "testledger",
    about = "Record UI/API test outcomes with artifacts and render HTML reports",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the execution log database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Override the artifact root directory
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and artifact directories
    Init,

    /// Record one finished test outcome
    Record {
        /// Test name
        #[arg(long)]
        name: String,

        /// Outcome: pass, fail, or skip
        #[arg(long)]
        status: TestStatus,

        /// Test category: ui or api
        #[arg(long)]
        category: TestType,

        /// User story id (stored as N/A when omitted)
        #[arg(long)]
        us_id: Option<String>,

        /// Test case id (falls back to --description, then --name)
        #[arg(long)]
        tc_id: Option<String>,

        /// Human-readable test description
        #[arg(long)]
        description: Option<String>,

        /// Raw request payload (API tests)
        #[arg(long)]
        request: Option<String>,

        /// Raw response body (API tests)
        #[arg(long)]
        response: Option<String>,

        /// Screenshot image to attach (UI tests)
        #[arg(long)]
        screenshot: Option<PathBuf>,
    },

    /// Generate an HTML report from the execution log
    Report {
        /// Also print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the execution log
    List,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LedgerConfig::resolve(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }
    if let Some(root) = cli.artifacts {
        config.artifacts.root = root;
    }

    init_tracing(&config.logging);

    match cli.command {
        Commands::Init => {
            let log = testledger::open_log(&config).context("failed to initialize execution log")?;
            let store = testledger::artifacts::ArtifactStore::new(&config.artifacts.root);
            for dir in [
                store.screenshot_dir(),
                store.api_dir(),
                store.root().join(testledger::report::REPORT_DIR),
            ] {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            println!(
                "Initialized {} ({} records), artifacts under {}",
                config.storage.db_path.display(),
                log.count()?,
                config.artifacts.root.display()
            );
        }
        Commands::Record {
            name,
            status,
            category,
            us_id,
            tc_id,
            description,
            request,
            response,
            screenshot,
        } => {
            let event = TestOutcome {
                test_name: name,
                status,
                category,
                user_story_id: us_id,
                test_case_id: tc_id,
                description,
                request_payload: request,
                response_body: response,
            };

            // Telemetry failures are logged, never turned into a failing exit code.
            let report = tokio::task::spawn_blocking(move || match testledger::open_capture(&config) {
                Ok(capture) => {
                    let session = screenshot.map(FileScreenshot::new);
                    let session = session.as_ref().map(|s| s as &dyn ScreenshotSource);
                    Some((event.test_name.clone(), capture.record_outcome(&event, session)))
                }
                Err(e) => {
                    tracing::error!(error = %e, test = %event.test_name, "execution log unavailable, outcome not recorded");
                    None
                }
            })
            .await
            .context("record task panicked")?;

            if let Some((name, report)) = report {
                match report.record_id {
                    Some(id) => println!("Recorded '{}' as #{}", name, id),
                    None => println!("'{}' was not recorded (see log)", name),
                }
                if !report.artifact_path.is_empty() {
                    println!("Artifact: {}", report.artifact_path);
                }
            }
        }
        Commands::Report { json } => {
            let (path, summary) = testledger::generate_report(&config).await?;
            println!("Report generated: {}", path.display());
            println!(
                "Total: {} | Passed: {} | Failed: {} | Skipped: {} | Success rate: {}",
                summary.total,
                summary.passed,
                summary.failed,
                summary.skipped,
                summary.success_rate_display()
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Commands::List => {
            let records = tokio::task::spawn_blocking(move || {
                let log = testledger::open_log(&config)?;
                log.read_all()
            })
            .await
            .context("list task panicked")?
            .context("failed to read execution log")?;

            if records.is_empty() {
                println!("No executions recorded.");
            } else {
                println!(
                    "{:<6} | {:<30} | {:<6} | {:<4} | {:<12} | {:<20} | Executed",
                    "ID", "Test", "Status", "Type", "US_ID", "TC_ID"
                );
                println!(
                    "{:-<6}-|-{:-<30}-|-{:-<6}-|-{:-<4}-|-{:-<12}-|-{:-<20}-|-{:-<19}",
                    "", "", "", "", "", "", ""
                );
                for r in records {
                    println!(
                        "{:<6} | {:<30} | {:<6} | {:<4} | {:<12} | {:<20} | {}",
                        r.id,
                        r.test_name,
                        r.status,
                        r.test_type,
                        r.user_story_id,
                        r.test_case_id,
                        r.execution_time.format(testledger::model::DB_TIME_FORMAT)
                    );
                }
            }
        }
    }

    Ok(())
}

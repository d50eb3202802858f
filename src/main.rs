use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_flow::{parser, report, runner};

#[derive(Parser)]
#[command(name = "lumi-flow")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "JSON-driven mobile UI flow runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the suites of a test configuration
    Run {
        /// Path to test-config.json (searched in the resources directory if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to test-data.json or a CSV file with a suiteName column
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output directory for reports and artifacts
        #[arg(short, long, default_value = "./test-reports")]
        output: PathBuf,

        /// Run only this suite. Can be specified multiple times.
        #[arg(short, long)]
        suite: Vec<String>,

        /// Run each suite once per row of the test data file
        #[arg(long, default_value = "false")]
        data_driven: bool,

        /// Execute against a simulated device instead of Appium
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Skip page source and screenshot capture on failures
        #[arg(long, default_value = "false")]
        no_diagnostics: bool,
    },

    /// Check a configuration for unresolved references
    Validate {
        /// Path to test-config.json
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate report from saved test results
    Report {
        /// Path to results.json
        results: PathBuf,

        /// Output format (text, junit, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            output,
            suite,
            data_driven,
            dry_run,
            no_diagnostics,
        } => {
            println!("{} Running test suites", "▶".green().bold());
            if let Some(ref path) = config {
                println!("  Config: {}", path.display().to_string().cyan());
            }
            if !suite.is_empty() {
                println!("  Suites: {}", suite.join(", ").cyan());
            }
            if data_driven {
                println!("  Data-driven: {}", "Enabled".yellow());
            }
            println!("  Output: {}", output.display().to_string().cyan());

            let options = runner::RunOptions {
                config,
                data,
                output,
                suites: suite,
                data_driven,
                dry_run,
                capture_diagnostics: !no_diagnostics,
            };
            let summary = runner::run_tests(&options).await?;
            if !summary.all_passed() {
                anyhow::bail!("{} of {} suites failed", summary.failed, summary.total);
            }
        }

        Commands::Validate { config } => {
            let (config, path) = parser::load_config(config.as_deref())?;
            let issues = parser::validate_config(&config);
            if issues.is_empty() {
                println!(
                    "{} {} is valid ({} suites, {} flows)",
                    "✓".green(),
                    path.display(),
                    config.suite_executions.len(),
                    config.flows.len()
                );
            } else {
                for issue in &issues {
                    println!("  {} {}", "✗".red(), issue);
                }
                anyhow::bail!("{} problems found in {}", issues.len(), path.display());
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            report::generate_report(&results, &format, output.as_deref())?;
        }
    }

    Ok(())
}

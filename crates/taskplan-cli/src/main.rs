//! taskplan: run declarative task plans from the command line.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taskplan_core::{JobRunner, NoterRegistry, load_plan};

#[derive(Parser)]
#[command(name = "taskplan")]
#[command(about = "Run automated task plans", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all jobs defined in a task plan file.
    Run {
        /// Working directory for job execution (default: system temp dir).
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Stop with an error as soon as any job fails.
        #[arg(long)]
        re_raise: bool,

        /// Path to a JSON file containing the task plan.
        plan_file: PathBuf,
    },

    /// Download a file from a GitHub blob URL.
    ///
    /// The URL can point at a branch or a commit, e.g.
    /// https://github.com/python/cpython/blob/main/README.rst
    GithubFile {
        /// URL of the GitHub file to download.
        #[arg(long)]
        url: String,

        /// Where to store the local copy.
        #[arg(long)]
        outfile: PathBuf,

        /// Request timeout in seconds.
        #[arg(long, default_value_t = 30.0)]
        timeout: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            working_dir,
            re_raise,
            plan_file,
        } => run(working_dir, re_raise, plan_file).await,
        Commands::GithubFile {
            url,
            outfile,
            timeout,
        } => match github_file(&url, &outfile, timeout).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error downloading {url}: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(working_dir: Option<PathBuf>, re_raise: bool, plan_file: PathBuf) -> ExitCode {
    let working_dir = working_dir.unwrap_or_else(std::env::temp_dir);
    if let Err(e) = tokio::fs::create_dir_all(&working_dir).await {
        eprintln!("Error creating working directory: {e}");
        return ExitCode::FAILURE;
    }

    let registry = NoterRegistry::with_builtins();
    let plan = match load_plan(&plan_file, &registry).await {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error parsing task plan file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let job_names: Vec<String> = plan.jobs.keys().cloned().collect();
    println!(
        "Running {} jobs from {}",
        job_names.len(),
        plan_file.display()
    );
    println!("Working directory: {}", working_dir.display());
    println!("{}", "-".repeat(60));

    let runner = JobRunner::new(plan, registry, working_dir);
    let mut summary = taskplan_core::RunSummary::default();

    for name in job_names {
        println!("Running job: {name}");
        let outcome = match runner.run_job(&name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Error running job {name}: {e}");
                return ExitCode::FAILURE;
            }
        };

        println!("  Status: {}", outcome.status);
        let max_len = if outcome.is_success() { 400 } else { 2000 };
        println!("  Output: {}", shorten_msg(&outcome.output, max_len, 6));
        if let Some(code) = outcome.exit_code {
            println!("  Exit Code: {code}");
        }
        if let Some(error) = &outcome.error {
            println!("  Error: {error}");
            println!("  stderr: {}", shorten_msg(&outcome.stderr, max_len, 6));
        }
        println!();

        summary.record(&outcome);
        if re_raise && let Some(err) = outcome.execution_error() {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    println!("{}", "-".repeat(60));
    println!("{summary}");

    if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Rewrite a github.com blob URL to its raw.githubusercontent.com form.
/// Already-raw URLs pass through unchanged.
fn raw_url(url: &str) -> String {
    url.replace("github.com", "raw.githubusercontent.com")
        .replace("/blob/", "/")
}

async fn github_file(url: &str, outfile: &PathBuf, timeout: f64) -> Result<(), Box<dyn Error>> {
    let raw_url = raw_url(url);
    tracing::info!(raw_url, "downloading");

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs_f64(timeout))
        .build()?;
    let bytes = client
        .get(&raw_url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(outfile, &bytes).await?;
    println!("Wrote {} bytes to {}", bytes.len(), outfile.display());
    Ok(())
}

/// Truncate a message to a maximum length and line count, marking the cut.
fn shorten_msg(msg: &str, max_len: usize, max_lines: usize) -> String {
    let clipped: String = msg.chars().take(max_len).collect();
    let mut short = clipped
        .split('\n')
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n");
    if short != msg {
        short.push_str("...");
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through() {
        assert_eq!(shorten_msg("hello", 400, 6), "hello");
    }

    #[test]
    fn long_messages_are_clipped_with_marker() {
        let msg = "x".repeat(500);
        let short = shorten_msg(&msg, 400, 6);
        assert_eq!(short.len(), 403);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn line_count_is_limited() {
        let msg = "a\nb\nc\nd";
        let short = shorten_msg(msg, 400, 2);
        assert_eq!(short, "a\nb...");
    }

    #[test]
    fn github_blob_url_is_rewritten_to_raw() {
        assert_eq!(
            raw_url("https://github.com/python/cpython/blob/main/README.rst"),
            "https://raw.githubusercontent.com/python/cpython/main/README.rst"
        );
    }

    #[test]
    fn raw_urls_pass_through_unchanged() {
        let url = "https://raw.githubusercontent.com/python/cpython/main/README.rst";
        assert_eq!(raw_url(url), url);
    }
}

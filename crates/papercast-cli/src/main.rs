use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use papercast_core::{
    extract_text, init_workspace, load_config, pdf_documents, OptimizationReport,
    OptimizationRequest, Papercast,
};
use papercast_schema::{Role, Timestamp, VariantKind};
use papercast_server::state::AppState;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "papercast", version, about = "Paper-to-podcast generator with feedback-driven prompt optimization")]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Workspace root (contains config/, prompts/, prompt_history/)"
    )]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write default config and baseline prompts")]
    Init,
    #[command(about = "Validate config files")]
    Validate,
    #[command(about = "List prompt versions")]
    Timestamps,
    #[command(about = "Create podcasts from a PDF")]
    Create {
        #[arg(help = "Path to the PDF")]
        pdf: PathBuf,
        #[arg(long, help = "Use this prompt version instead of last/random")]
        timestamp: Option<String>,
    },
    #[command(about = "Attach feedback to a podcast and optimize all prompts")]
    Feedback {
        #[arg(long, help = "Timestamp of the podcast the feedback is about")]
        timestamp: String,
        #[arg(long, help = "Feedback text")]
        text: String,
        #[arg(long, help = "Version to write (default: now)")]
        new_timestamp: Option<String>,
    },
    #[command(about = "Optimize one role's prompt")]
    Optimize {
        #[arg(long, help = "summarizer, scriptwriter or enhancer")]
        role: Role,
        #[arg(long, help = "Prompt version to start from (default: baseline)")]
        from: Option<String>,
        #[arg(long, help = "Podcast state holding the feedback")]
        state: String,
        #[arg(long, help = "Version to write")]
        to: String,
    },
    #[command(about = "Compare random prompt versions pairwise on a PDF corpus")]
    Evaluate {
        #[arg(help = "Directory of PDFs")]
        pdf_dir: PathBuf,
        #[arg(long, default_value = "300", help = "Number of comparisons")]
        rounds: usize,
        #[arg(long, default_value = "4", help = "Comparisons in flight")]
        concurrency: usize,
        #[arg(long, default_value = "evaluation", help = "Output directory for the CSV")]
        out: PathBuf,
    },
    #[command(about = "Run one simulated listener feedback cycle on a PDF")]
    Simulate {
        #[arg(help = "Path to the PDF")]
        pdf: PathBuf,
    },
    #[command(about = "Start the HTTP API server")]
    Serve {
        #[arg(long, help = "Port (overrides server.bind)")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = cli.root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "papercast.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Init => {
            let written = init_workspace(&cli.root)?;
            if written.is_empty() {
                println!("Workspace already initialized.");
            }
            for path in written {
                println!("wrote {}", path.display());
            }
        }
        Commands::Validate => {
            let config = load_config(&cli.root.join("config"))?;
            println!(
                "Config valid. {} providers, {} optimization rounds.",
                config.providers.len(),
                config.main.optimizer.rounds
            );
        }
        Commands::Timestamps => {
            let app = open(&cli.root)?;
            for ts in app.prompts().list_timestamps().await? {
                println!("{ts}");
            }
        }
        Commands::Create { pdf, timestamp } => {
            let app = open(&cli.root)?;
            let studio = app.studio();
            let variants = match timestamp {
                Some(raw) => {
                    let version = Timestamp::parse(&raw)?;
                    let text = read_pdf(&app, &pdf).await?;
                    vec![
                        studio
                            .create_single(&text, VariantKind::Last, Some(&version))
                            .await?,
                    ]
                }
                None => {
                    let bytes = tokio::fs::read(&pdf)
                        .await
                        .with_context(|| format!("failed to read {}", pdf.display()))?;
                    studio.create_from_pdf(&bytes).await?
                }
            };
            for variant in variants {
                println!(
                    "{:?} {} -> {}",
                    variant.kind,
                    variant.timestamp,
                    app.audio_dir().join(&variant.audio_file).display()
                );
            }
        }
        Commands::Feedback {
            timestamp,
            text,
            new_timestamp,
        } => {
            let app = open(&cli.root)?;
            let old = Timestamp::parse(&timestamp)?;
            let new = match new_timestamp {
                Some(raw) => Timestamp::parse(&raw)?,
                None => Timestamp::now(),
            };
            if text.trim().is_empty() {
                bail!("feedback must not be empty");
            }
            let report = app.driver().run(&old, &new, &text).await?;
            print_report(&report)?;
        }
        Commands::Optimize {
            role,
            from,
            state,
            to,
        } => {
            let app = open(&cli.root)?;
            let request = OptimizationRequest {
                role,
                prompt_from: from.as_deref().map(Timestamp::parse).transpose()?,
                state: Timestamp::parse(&state)?,
                target: Timestamp::parse(&to)?,
            };
            let text = app.optimizer().optimize(&request).await?;
            println!("{text}");
        }
        Commands::Evaluate {
            pdf_dir,
            rounds,
            concurrency,
            out,
        } => {
            let app = open(&cli.root)?;
            let documents = pdf_documents(&pdf_dir).await?;
            let board = app
                .evaluation()
                .with_concurrency(concurrency)
                .run(&documents, rounds)
                .await?;
            print!("{}", board.to_csv());
            let path = board.write_csv(&cli.root.join(out)).await?;
            println!(
                "{} unclear, {} failed. Raw data saved as: {}",
                board.unclear,
                board.failed,
                path.display()
            );
        }
        Commands::Simulate { pdf } => {
            let app = open(&cli.root)?;
            let text = read_pdf(&app, &pdf).await?;
            let report = app.simulation().run(&text, &Timestamp::now()).await?;
            println!("Personality: {}", report.personality);
            println!("Feedback: {}", report.feedback);
            print_report(&report.optimization)?;
        }
        Commands::Serve { port } => {
            let app = open(&cli.root)?;
            let addr = bind_addr(&app.config().main.server.bind, port);
            papercast_server::serve(AppState::new(app), &addr).await?;
        }
    }

    Ok(())
}

fn open(root: &Path) -> Result<Papercast> {
    let config = load_config(&root.join("config"))?;
    Papercast::from_config(root, config)
}

async fn read_pdf(app: &Papercast, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(extract_text(&bytes, app.config().main.pdf.max_tokens)?.text)
}

fn print_report(report: &OptimizationReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    let failed = report.failures().count();
    if failed > 0 {
        bail!("{failed} of {} roles failed to optimize", report.roles.len());
    }
    Ok(())
}

/// `host:port` from the configured bind address, with an optional port override.
fn bind_addr(bind: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => {
            let host = bind.rsplit_once(':').map_or(bind, |(host, _)| host);
            format!("{host}:{port}")
        }
        None => bind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_feedback_subcommand() {
        let cli = Cli::try_parse_from([
            "papercast",
            "feedback",
            "--timestamp",
            "20240101_000000",
            "--text",
            "too long",
        ])
        .unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Feedback { new_timestamp: None, .. }
        ));
    }

    #[test]
    fn parses_optimize_role() {
        let cli = Cli::try_parse_from([
            "papercast",
            "optimize",
            "--role",
            "enhancer",
            "--state",
            "20240101_000000",
            "--to",
            "20240102_000000",
        ])
        .unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Optimize {
                role: Role::Enhancer,
                from: None,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Cli::try_parse_from([
            "papercast", "optimize", "--role", "narrator", "--state", "x", "--to", "y",
        ])
        .is_err());
    }

    #[test]
    fn parses_evaluate_defaults() {
        let cli = Cli::try_parse_from(["papercast", "--root", "/tmp/pc", "evaluate", "pdfs"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/tmp/pc"));
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Evaluate {
                rounds: 300,
                concurrency: 4,
                ..
            }
        ));
    }

    #[test]
    fn bind_addr_overrides_port_only() {
        assert_eq!(bind_addr("127.0.0.1:8000", None), "127.0.0.1:8000");
        assert_eq!(bind_addr("127.0.0.1:8000", Some(9000)), "127.0.0.1:9000");
        assert_eq!(bind_addr("0.0.0.0", Some(9000)), "0.0.0.0:9000");
    }
}

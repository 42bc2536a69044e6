use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ra_tester::config::{RunSettings, TOKENS_FILE};
use ra_tester::tokens::{mask, TokenStore};
use ra_tester::{flow, harness, prompt, report, Environment, FlowOutcome, SiteVersion};

#[derive(Parser)]
#[command(name = "ra-tester")]
#[command(version = "0.1.0")]
#[command(about = "Reclame AQUI complaint-flow automation and V1/V2 benchmark CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the complaint-publishing flow
    Publish {
        /// Skip the interactive prompts and read everything from RA_* env vars
        #[arg(long, default_value = "false")]
        non_interactive: bool,

        /// Run the browser headless
        #[arg(long, default_value = "false")]
        headless: bool,

        /// Environment (tst, evo, prod)
        #[arg(short, long)]
        env: Option<String>,

        /// Site version (v1, v2)
        #[arg(short = 'V', long)]
        site_version: Option<String>,

        /// Company to complain about
        #[arg(short, long)]
        company: Option<String>,

        /// Complaint text
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Measure the flow step URLs for V1 and V2 and write comparison reports
    Benchmark {
        /// Environment (tst, evo, prod)
        #[arg(short, long, default_value = "prod")]
        env: String,

        /// Complaint session id used to build the step URLs
        #[arg(short, long)]
        session_id: String,

        /// Keep one context across URLs (cache accumulates)
        #[arg(long, default_value = "false")]
        shared_cache: bool,

        /// Skip JS coverage collection
        #[arg(long, default_value = "false")]
        skip_coverage: bool,

        /// Output directory for the md/json reports
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Regenerate reports from a saved benchmark JSON dump
    Report {
        /// Path to the benchmark results JSON
        results: PathBuf,

        /// Output format (markdown, json, all)
        #[arg(short, long, default_value = "all")]
        format: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Manage saved auth tokens
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Show the saved tokens (masked)
    Show,
    /// Delete the saved token file
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            non_interactive,
            headless,
            env,
            site_version,
            company,
            text,
        } => {
            let mut settings = if non_interactive {
                RunSettings::from_env()?
            } else {
                prompt::collect()?
            };

            if let Some(e) = env {
                settings.env = Environment::parse(&e)?;
            }
            if let Some(v) = site_version {
                settings.version = SiteVersion::parse(&v)?;
            }
            if let Some(c) = company {
                settings.company = c;
            }
            if let Some(t) = text {
                settings.complaint_text = t;
            }
            if headless {
                settings.headless = true;
            }

            match flow::run(settings).await {
                Ok(FlowOutcome::Published { url }) => {
                    log::info!("publicada em {}", url);
                }
                Ok(FlowOutcome::Blocked) => {
                    println!(
                        "\n{} Fluxo concluído: publicação bloqueada por duplicidade (3 dias).",
                        "ℹ".blue()
                    );
                }
                Err(e) => {
                    eprintln!("\n{} Fluxo falhou: {:#}", "❌".red(), e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Benchmark {
            env,
            session_id,
            shared_cache,
            skip_coverage,
            output,
        } => {
            let mut opts = harness::HarnessOptions::new(Environment::parse(&env)?, session_id);
            if shared_cache {
                opts.cache_mode = harness::CacheMode::SharedContext;
            }
            opts.coverage = !skip_coverage;

            let run = harness::run(&opts).await?;

            std::fs::create_dir_all(&output)?;
            report::markdown::write(&run, &output.join(report::MARKDOWN_FILE))?;
            report::json::write(&run, &output.join(report::JSON_FILE))?;
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Gerando relatório ({}) de: {}",
                "📊".blue(),
                format.cyan(),
                results.display()
            );
            std::fs::create_dir_all(&output)?;
            report::generate(&results, &format, &output)?;
        }

        Commands::Tokens { command } => {
            let store = TokenStore::new(TOKENS_FILE);
            match command {
                TokenCommands::Show => match store.load() {
                    Some(tokens) => {
                        println!("  tk  → {}", mask(tokens.tk.as_deref()));
                        println!("  rtk → {}", mask(tokens.rtk.as_deref()));
                        println!("  itk → {}", mask(tokens.itk.as_deref()));
                        if let Some(saved_at) = tokens.saved_at {
                            println!("  salvos em {}", saved_at);
                        }
                    }
                    None => println!("  Nenhum token salvo."),
                },
                TokenCommands::Clear => {
                    store.clear()?;
                    println!("  {} Tokens removidos.", "🗑".yellow());
                }
            }
        }
    }

    Ok(())
}

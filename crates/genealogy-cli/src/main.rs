mod view;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use genealogy_client::{build_backend, DefaultBackend, TreeSourceClient};
use genealogy_core::{ConfigManager, GenealogyConfig, LoggingConfig, NodeId, PreferredSource, ViewMode};
use genealogy_engine::{GenealogyNavigator, NavOutcome};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

type Navigator = GenealogyNavigator<DefaultBackend>;

#[derive(Parser)]
#[command(name = "genealogy")]
#[command(about = "Browse a referral genealogy tree from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Configuration file (defaults to ./.genealogy.toml, then ~/.genealogy/config.toml)
    #[arg(short, long, global = true, env = "GENEALOGY_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Matrix,
    Sponsor,
    Auto,
}

impl From<SourceArg> for PreferredSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Matrix => PreferredSource::Matrix,
            SourceArg::Sponsor => PreferredSource::Sponsor,
            SourceArg::Auto => PreferredSource::Auto,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print one member's tree with team sizes
    Tree {
        /// Member identifier; omitted loads the default admin root
        identifier: Option<String>,

        /// Show your own sponsor tree instead of searching
        #[arg(long = "self", conflicts_with = "identifier")]
        own: bool,

        /// Preferred source for admin searches
        #[arg(short, long, value_enum)]
        source: Option<SourceArg>,

        /// Levels to fetch, root included
        #[arg(short, long)]
        depth: Option<u32>,
    },

    /// Interactive navigation shell
    Explore {
        /// Browse your own sponsor tree
        #[arg(long = "self")]
        own: bool,

        /// Preferred source for admin searches
        #[arg(short, long, value_enum)]
        source: Option<SourceArg>,
    },

    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Destination path
        #[arg(default_value = ".genealogy.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config(ConfigCommands::Init { path }) = &cli.command {
        ConfigManager::create_default_config(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", "Wrote".green().bold(), path.display());
        return Ok(());
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::from_path(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;
    let config = manager.config().clone();

    init_logging(&config.logging, cli.verbose);
    debug!(
        "Configuration loaded from {:?}, API at {}",
        manager.config_path(),
        config.api.base_url
    );

    match execute_command(&cli, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn execute_command(cli: &Cli, mut config: GenealogyConfig) -> Result<()> {
    match &cli.command {
        Commands::Tree {
            identifier,
            own,
            source,
            depth,
        } => {
            apply_overrides(&mut config, *own, *source);
            if let Some(depth) = depth {
                if *depth == 0 {
                    bail!("--depth must be at least 1");
                }
                config.navigation.max_depth = *depth;
            }
            if !*own && identifier.is_none() {
                config.navigation.auto_load_default_root = true;
            }

            let nav = build_navigator(&config)?;
            let outcome = match identifier {
                Some(identifier) => nav.search(identifier).await,
                None => nav.mount().await,
            };
            if let NavOutcome::Failed(e) = outcome {
                return Err(e).context("Could not load the tree");
            }
            print_current(&nav, cli.output)
        }
        Commands::Explore { own, source } => {
            apply_overrides(&mut config, *own, *source);
            let nav = build_navigator(&config)?;
            explore(&nav, cli.output).await
        }
        Commands::Config(ConfigCommands::Show) => {
            if config.api.api_token.is_some() {
                config.api.api_token = Some("********".to_string());
            }
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Pretty => println!("{:#?}", config),
            }
            Ok(())
        }
        Commands::Config(ConfigCommands::Init { .. }) => Ok(()),
    }
}

fn apply_overrides(config: &mut GenealogyConfig, own: bool, source: Option<SourceArg>) {
    if own {
        config.navigation.mode = ViewMode::SelfScoped;
    }
    if let Some(source) = source {
        config.navigation.preferred_source = source.into();
    }
}

fn build_navigator(config: &GenealogyConfig) -> Result<Navigator> {
    let backend = build_backend(config).context("Failed to create HTTP client")?;
    Ok(GenealogyNavigator::new(
        TreeSourceClient::new(backend),
        config.navigation.clone(),
    ))
}

fn print_current(nav: &Navigator, output: OutputFormat) -> Result<()> {
    let Some(view) = view::tree_view(nav) else {
        println!("{}", "Nothing loaded yet. Use `search <identifier>`.".dimmed());
        return Ok(());
    };
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Pretty => view::print_view(&view),
    }
    Ok(())
}

fn report(nav: &Navigator, outcome: NavOutcome, output: OutputFormat) -> Result<()> {
    match outcome {
        NavOutcome::Loaded => print_current(nav, output),
        NavOutcome::Failed(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            Ok(())
        }
        NavOutcome::Superseded => Ok(()),
        NavOutcome::Ignored => {
            println!("{}", "Nothing to do".dimmed());
            Ok(())
        }
    }
}

const HELP: &str = "\
search <identifier>   load a member (admin view)
open <n|id>           drill into the n-th shown child or a node id
crumb <n>             jump to breadcrumb n
back                  one level up
source <matrix|sponsor|auto>
count <id>            team size of any node
refresh               reload the current root
state                 navigation state as JSON
stats                 cache statistics
quit";

async fn explore(nav: &Navigator, output: OutputFormat) -> Result<()> {
    let outcome = nav.mount().await;
    if outcome != NavOutcome::Ignored {
        report(nav, outcome, output)?;
    }
    println!("{}", "Type `help` for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "help" => println!("{}", HELP),
            "quit" | "exit" => break,
            "search" => report(nav, nav.search(arg).await, output)?,
            "open" => {
                let target = child_target(nav, arg);
                report(nav, nav.drill_down(&target).await, output)?;
            }
            "crumb" => match arg.parse::<usize>() {
                Ok(index) => report(nav, nav.jump_to_breadcrumb(index).await, output)?,
                Err(_) => eprintln!("{} crumb expects a number", "Error:".red().bold()),
            },
            "back" => report(nav, nav.back().await, output)?,
            "source" => match arg.parse::<PreferredSource>() {
                Ok(source) => report(nav, nav.switch_source(source).await, output)?,
                Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
            },
            "count" if arg.is_empty() => {
                eprintln!("{} count expects a node id", "Error:".red().bold())
            }
            "count" => {
                let count = nav.fetch_team_count(&NodeId::from(arg)).await;
                println!("{} {}", "team".cyan(), count.to_string().yellow());
            }
            "refresh" => report(nav, nav.refresh().await, output)?,
            "state" => println!("{}", serde_json::to_string_pretty(&nav.state())?),
            "stats" => {
                let stats = serde_json::json!({
                    "team_counts": nav.cache().stats(),
                    "responses": nav.client().backend().stats(),
                });
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            other => eprintln!("{} unknown command `{}`", "Error:".red().bold(), other),
        }
    }
    Ok(())
}

/// `open 2` means the second shown child; anything else is taken as an id.
fn child_target(nav: &Navigator, arg: &str) -> NodeId {
    let shown = nav.displayed_children();
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 && n <= shown.len() => shown[n - 1].id.clone(),
        _ => NodeId::from(arg),
    }
}

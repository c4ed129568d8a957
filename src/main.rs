use clap::{Parser as ClapParser, Subcommand};
use sqlweave::cli::{self, CheckOptions, CliError, RenderOptions};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "sqlweave")]
#[command(about = "sqlweave - Compose dynamic SQL templates into driver-ready statements")]
#[command(version)]
struct Cli {
    /// Log template building and assembly to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a template to JSON parameters and print the bound SQL
    Render {
        /// JSON directive file
        #[arg(short, long)]
        template: PathBuf,

        /// JSON parameter object (reads from stdin if not provided)
        #[arg(short, long)]
        params: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Build a template and report whether it is valid
    Check {
        /// JSON directive file
        #[arg(short, long)]
        template: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Substitute configuration variables into text
    Substitute {
        /// Text containing ${key} tokens
        text: String,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Render {
            template,
            params,
            config,
            pretty,
        } => run_render(template, params, config, pretty),
        Commands::Check { template, config } => run_check(template, config),
        Commands::Substitute { text, config } => cli::load_config(config.as_deref())
            .map(|config| println!("{}", cli::execute_substitute(&text, &config))),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlweave=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_render(
    template: PathBuf,
    params: Option<String>,
    config: Option<PathBuf>,
    pretty: bool,
) -> Result<(), CliError> {
    let params = match params {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };

    let options = RenderOptions {
        template,
        params,
        config,
    };
    let bound = cli::execute_render(&options)?;
    let json = if pretty {
        serde_json::to_string_pretty(&bound)
    } else {
        serde_json::to_string(&bound)
    }?;
    println!("{}", json);
    Ok(())
}

fn run_check(template: PathBuf, config: Option<PathBuf>) -> Result<(), CliError> {
    let report = cli::execute_check(&CheckOptions { template, config })?;
    println!(
        "Template is valid ({}, {} expressions)",
        if report.dynamic { "dynamic" } else { "static" },
        report.expressions.len()
    );
    Ok(())
}

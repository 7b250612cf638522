use clap::Parser;
use form_intelligence::cli::commands::{cmd_fill, cmd_scan, cmd_validate};
use form_intelligence::cli::config::{Cli, Commands, load_config};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let all_passed = match cli.command {
        Commands::Scan { document, format } => {
            cmd_scan(&document, &format, &config, cli.verbose)?;
            true
        }
        Commands::Fill {
            document,
            values,
            smart,
            validate,
            format,
        } => runtime.block_on(cmd_fill(&document, &values, smart, validate, &format, &config))?,
        Commands::Validate { document, format } => {
            runtime.block_on(cmd_validate(&document, &format, &config))?
        }
    };

    if !all_passed {
        std::process::exit(1);
    }
    Ok(())
}

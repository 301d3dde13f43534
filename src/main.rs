use clap::Parser;
use miette::Result;
use spcs::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();

    // Library logs go to stderr so stdout stays clean for data
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.global.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Limits(args) => spcs::cli::commands::limits::run(args, &cli.global),
        Commands::Generate(args) => spcs::cli::commands::generate::run(args, &cli.global),
        Commands::Check(args) => spcs::cli::commands::check::run(args, &cli.global),
        Commands::Difficulty(args) => spcs::cli::commands::difficulty::run(args, &cli.global),
        Commands::Batch(args) => spcs::cli::commands::batch::run(args, &cli.global),
        Commands::Completions(args) => spcs::cli::commands::completions::run(args),
    }
}

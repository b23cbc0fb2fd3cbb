use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = hwt::cli::Cli::parse();
    hwt::logging::init_tracing(cli.log_filter.as_deref())?;

    let config = hwt::config::from_cli(&cli)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    hwt::commands::execute(&config, cli.user.as_deref(), cli.command, &mut handle)?;

    Ok(())
}

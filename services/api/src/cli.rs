use crate::loader::{run_load_addresses, LoadAddressesArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tobacco_retail::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tobacco Retailer Location API",
    about = "Serve the tobacco retailer location API and manage its address data",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load addresses if needed, then start the HTTP service (default command)
    Serve(ServeArgs),
    /// Populate an empty address table from the CSV source and exit
    LoadAddresses(LoadAddressesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::LoadAddresses(args) => run_load_addresses(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["tobacco-retail-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_load_addresses_overrides() {
        let cli = Cli::try_parse_from([
            "tobacco-retail-api",
            "load-addresses",
            "--csv",
            "/srv/data/address.csv",
            "--table",
            "address_staging",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::LoadAddresses(args)) => {
                assert_eq!(
                    args.csv.as_deref(),
                    Some(std::path::Path::new("/srv/data/address.csv"))
                );
                assert_eq!(args.table.as_deref(), Some("address_staging"));
            }
            other => panic!("expected load-addresses, got {other:?}"),
        }
    }
}

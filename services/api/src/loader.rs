use crate::infra::initialize_addresses;
use clap::Args;
use std::path::PathBuf;
use tobacco_retail::addresses::InitOutcome;
use tobacco_retail::config::AppConfig;
use tobacco_retail::error::AppError;
use tobacco_retail::telemetry;

#[derive(Args, Debug)]
pub(crate) struct LoadAddressesArgs {
    /// CSV file to load (defaults to ADDRESS_CSV_PATH)
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Target table (defaults to ADDRESS_TABLE)
    #[arg(long)]
    pub(crate) table: Option<String>,
}

pub(crate) async fn run_load_addresses(args: LoadAddressesArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(csv) = args.csv {
        config.addresses.csv_path = csv;
    }
    if let Some(table) = args.table {
        config.addresses.table = table;
    }

    telemetry::init(&config.telemetry)?;

    match initialize_addresses(&config.database, &config.addresses).await {
        InitOutcome::Loaded { rows } => {
            println!(
                "Loaded {} address rows from {} into `{}`",
                rows,
                config.addresses.csv_path.display(),
                config.addresses.table
            );
            Ok(())
        }
        InitOutcome::Skipped { existing_rows } => {
            println!(
                "`{}` already holds {} rows; nothing loaded",
                config.addresses.table, existing_rows
            );
            Ok(())
        }
        InitOutcome::Failed(error) => Err(error.into()),
    }
}

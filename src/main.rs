use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use co2mini::{acquisition, logging, AcquisitionConfig, HidTransport, ResultData};
use co2mini::{PRODUCT_ID, VENDOR_ID};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// {"isOk":..,"message":..,"co2":..,"temperature":..}
    Json,
    /// co2:<ppm>\ttemp:<celsius>\t
    Text,
}

#[derive(Parser, Debug)]
#[command(
    name = "co2mini",
    about = "Read CO2 concentration and temperature from a CO2mini USB monitor"
)]
struct Args {
    /// Seconds to wait for both readings
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,
    /// Upper bound for a single HID read, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
    /// Log level (overrides CO2MINI_LOG / RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref());

    let data = match read(&args) {
        Ok(data) => data,
        Err(e) => ResultData::failure(format!("{e:#}")),
    };

    match render(&data, args.format) {
        Ok(line) => println!("{line}"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    }

    if data.is_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read(args: &Args) -> Result<ResultData> {
    let timeout = Duration::try_from_secs_f64(args.timeout)
        .with_context(|| format!("invalid timeout {}", args.timeout))?;
    let config = AcquisitionConfig::default()
        .timeout(timeout)
        .poll_interval(Duration::from_millis(args.poll_interval_ms));

    let transport =
        HidTransport::open(VENDOR_ID, PRODUCT_ID).context("failed to open CO2 monitor")?;
    let result = acquisition::run(transport, &config).context("acquisition failed")?;
    Ok(ResultData::from(&result))
}

fn render(data: &ResultData, format: Format) -> Result<String> {
    match format {
        Format::Json => data.to_json().context("failed to encode result"),
        Format::Text => Ok(data.to_text()),
    }
}

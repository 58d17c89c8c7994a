use clap::Parser;
use gsheetx::args::{Args, Command};
use gsheetx::{commands, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().gsheetx_home().path();
    let timeout_secs = args.common().timeout_secs();

    // This allows for testing the program without hitting the Google APIs. When
    // GSHEETX_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Google.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.client_secret())
            .await?
            .print(),

        Command::Auth(auth_args) => {
            let config = commands::load_config(home, timeout_secs).await?;
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config).await?.print()
            }
        }

        Command::Sheets(sheets_args) => {
            let config = commands::load_config(home, timeout_secs).await?;
            let out = commands::sheets(&config, mode, sheets_args).await?;
            out.print();
            for title in out.structure().into_iter().flatten() {
                println!("{title}");
            }
        }

        Command::Sheet(sheet_args) => {
            let config = commands::load_config(home, timeout_secs).await?;
            let out = commands::sheet(&config, mode, sheet_args).await?;
            out.print();
            if let Some(info) = out.structure() {
                println!("{info}");
            }
        }

        Command::Get(get_args) => {
            let config = commands::load_config(home, timeout_secs).await?;
            let out = commands::get(&config, mode, get_args).await?;
            out.print();
            if let Some(rendered) = out.structure() {
                println!("{rendered}");
            }
        }

        Command::Set(set_args) => {
            let config = commands::load_config(home, timeout_secs).await?;
            commands::set(&config, mode, set_args).await?.print()
        }

        Command::Apply(apply_args) => {
            let config = commands::load_config(home, timeout_secs).await?;
            commands::apply(&config, mode, apply_args).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

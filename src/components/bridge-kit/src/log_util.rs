use crate::get_log_file_path;
use simplelog::*;
use std::fs::File;
use thiserror::Error;

pub const BRIDGE_LOG_ENV: &str = "DISCORD_BRIDGE_LOG";

#[derive(Error, Debug)]
pub enum LogInitError {
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(#[from] log::SetLoggerError),
}

pub fn init_logging(service_name: &str, is_service: bool) -> Result<(), LogInitError> {
    // terminal level comes from env, file always keeps info
    let log_level = std::env::var(BRIDGE_LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let log_level = log_level.parse().unwrap_or(LevelFilter::Info);

    let log_file = get_log_file_path(service_name, is_service);
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = ConfigBuilder::new()
        .set_time_format_custom(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            log_level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, config, File::create(log_file)?),
    ])?;

    Ok(())
}

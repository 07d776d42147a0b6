//! Manual `--flag value` argument parsing layered on top of
//! [`crate::config::ServerConfig`]'s environment defaults. No `clap`
//! dependency exists anywhere in the teacher workspace, so this follows its
//! own `std::env::args()` convention instead (see `continuum-core/src/main.rs`).

use crate::config::ServerConfig;
use crate::error::{Error, Result};

pub const HELP_TEXT: &str = "\
inferd - inference server core

USAGE:
    inferd [OPTIONS]

OPTIONS:
    --model-repository <path>        Root directory of model configs (default: ./models)
    --enable-repository-watcher      Watch the model repository for changes
    --use-polling-watcher            Use a polling watcher instead of OS file events
    --http-port <port>                HTTP port (default: 8998)
    --grpc-port <port>                gRPC port (default: 50051)
    --worker-dir <path>               Directory searched for worker-kind libraries
    --batch-size <n>                  Default batch size for loaded endpoints
    --batch-timeout-ms <ms>           Default batch timeout in milliseconds
    --log-level <level>               env_logger filter (default: info)
    --help                            Print this help text and exit
";

/// Outcome of parsing argv: either a config ready to run with, or a request
/// to print help and exit cleanly before doing anything else.
pub enum ParseOutcome {
    Run,
    Help,
}

pub fn parse_args(config: &mut ServerConfig, args: impl IntoIterator<Item = String>) -> Result<ParseOutcome> {
    let mut args = args.into_iter().peekable();
    args.next(); // argv[0]

    while let Some(flag) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| Error::invalid_argument(format!("{flag} requires a value")))
        };

        match flag.as_str() {
            "--help" => return Ok(ParseOutcome::Help),
            "--model-repository" => config.model_repository = value()?.into(),
            "--enable-repository-watcher" => config.enable_repository_watcher = true,
            "--use-polling-watcher" => config.use_polling_watcher = true,
            "--http-port" => {
                config.http_port = value()?
                    .parse()
                    .map_err(|_| Error::invalid_argument("--http-port expects a port number"))?;
            }
            "--grpc-port" => {
                config.grpc_port = value()?
                    .parse()
                    .map_err(|_| Error::invalid_argument("--grpc-port expects a port number"))?;
            }
            "--worker-dir" => config.worker_library_dir = value()?.into(),
            "--batch-size" => {
                config.default_batch_size = value()?
                    .parse()
                    .map_err(|_| Error::invalid_argument("--batch-size expects an integer"))?;
            }
            "--batch-timeout-ms" => {
                config.default_batch_timeout_ms = value()?
                    .parse()
                    .map_err(|_| Error::invalid_argument("--batch-timeout-ms expects an integer"))?;
            }
            "--log-level" => config.log_level = value()?,
            other => {
                return Err(Error::invalid_argument(format!("unrecognized flag: {other}")));
            }
        }
    }

    Ok(ParseOutcome::Run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_defaults_from_flags() {
        let mut config = ServerConfig::default();
        let args = vec![
            "inferd".to_string(),
            "--batch-size".to_string(),
            "8".to_string(),
            "--log-level".to_string(),
            "debug".to_string(),
        ];
        assert!(matches!(parse_args(&mut config, args).unwrap(), ParseOutcome::Run));
        assert_eq!(config.default_batch_size, 8);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn parses_the_spec_required_flags() {
        let mut config = ServerConfig::default();
        let args = vec![
            "inferd".to_string(),
            "--model-repository".to_string(),
            "/tmp/models".to_string(),
            "--enable-repository-watcher".to_string(),
            "--use-polling-watcher".to_string(),
            "--http-port".to_string(),
            "9000".to_string(),
            "--grpc-port".to_string(),
            "9001".to_string(),
        ];
        assert!(matches!(parse_args(&mut config, args).unwrap(), ParseOutcome::Run));
        assert_eq!(config.model_repository.to_str().unwrap(), "/tmp/models");
        assert!(config.enable_repository_watcher);
        assert!(config.use_polling_watcher);
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.grpc_port, 9001);
    }

    #[test]
    fn help_short_circuits_without_touching_config() {
        let mut config = ServerConfig::default();
        let args = vec!["inferd".to_string(), "--help".to_string()];
        assert!(matches!(parse_args(&mut config, args).unwrap(), ParseOutcome::Help));
    }

    #[test]
    fn rejects_unknown_flags() {
        let mut config = ServerConfig::default();
        let args = vec!["inferd".to_string(), "--bogus".to_string()];
        assert!(parse_args(&mut config, args).is_err());
    }

    #[test]
    fn rejects_flag_missing_its_value() {
        let mut config = ServerConfig::default();
        let args = vec!["inferd".to_string(), "--batch-size".to_string()];
        assert!(parse_args(&mut config, args).is_err());
    }

    #[test]
    fn rejects_bad_port_value() {
        let mut config = ServerConfig::default();
        let args = vec!["inferd".to_string(), "--http-port".to_string(), "not-a-port".to_string()];
        assert!(parse_args(&mut config, args).is_err());
    }
}

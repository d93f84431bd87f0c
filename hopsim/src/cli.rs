//! Command line interface.

use std::{net::SocketAddr, path::PathBuf};

use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};

use crate::config::{Config, ConfigError, TransportKind};

const CONFIG_FLAG: &str = "config";
const LISTEN_FLAG: &str = "listen";
const TRANSPORT_FLAG: &str = "transport";
const LOG_LEVEL_FLAG: &str = "log-level";

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn command() -> Command {
    Command::new("hopsim")
        .version(crate_version())
        .about("Simulate multi-hop packet transit and stream every hop to a visualization client.")
        .arg(
            Arg::new(CONFIG_FLAG)
                .short('c')
                .long(CONFIG_FLAG)
                .env("HOPSIM_CONFIG")
                .help("Path to a YAML or JSON config file. The bundled demo is used when omitted")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(LISTEN_FLAG)
                .short('l')
                .long(LISTEN_FLAG)
                .env("HOPSIM_LISTEN")
                .help("Address to listen on, overrides the config file")
                .value_parser(clap::value_parser!(SocketAddr)),
        )
        .arg(
            Arg::new(TRANSPORT_FLAG)
                .long(TRANSPORT_FLAG)
                .env("HOPSIM_TRANSPORT")
                .help("Transport serving the clients, overrides the config file")
                .value_parser(PossibleValuesParser::new(["ws", "tcp"])),
        )
        .arg(
            Arg::new(LOG_LEVEL_FLAG)
                .long(LOG_LEVEL_FLAG)
                .default_value("info")
                .help("Log filter used when RUST_LOG is not set"),
        )
}

/// Parsed command line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
    pub transport: Option<TransportKind>,
    pub log_level: String,
}

impl Args {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config: matches.get_one::<PathBuf>(CONFIG_FLAG).cloned(),
            listen: matches.get_one::<SocketAddr>(LISTEN_FLAG).copied(),
            transport: matches
                .get_one::<String>(TRANSPORT_FLAG)
                .and_then(|t| t.parse::<TransportKind>().ok()),
            log_level: matches
                .get_one::<String>(LOG_LEVEL_FLAG)
                .cloned()
                .unwrap_or_else(|| "info".to_owned()),
        }
    }

    /// Loads the configured file, or the demo, and applies the command line overrides.
    pub fn config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::demo()?,
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let matches = command().try_get_matches_from(args).unwrap();
        Args::from_matches(&matches)
    }

    #[test]
    fn defaults() {
        let args = parse(&["hopsim"]);

        assert_eq!(args.listen, None);
        assert_eq!(args.transport, None);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn overrides_apply_on_top_of_the_demo() {
        let args = parse(&[
            "hopsim",
            "-l",
            "127.0.0.1:9001",
            "--transport",
            "tcp",
            "--log-level",
            "debug",
        ]);
        let config = args.config().unwrap();

        assert_eq!(config.listen, "127.0.0.1:9001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.transport, TransportKind::Tcp);
        assert_eq!(config.routes.len(), 4);
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(command().try_get_matches_from(["hopsim", "--transport", "udp"]).is_err());
        assert!(command().try_get_matches_from(["hopsim", "--listen", "nowhere"]).is_err());
    }

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }
}

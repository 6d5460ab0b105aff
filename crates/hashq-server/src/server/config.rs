use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use hashq::ServiceConfig;

/// Runtime configuration for the `hashq-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for local use.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hashq-server",
    version,
    about = "An HTTP service for deferred SHA-512 password digests"
)]
pub struct CliArgs {
    /// Host name or IP address to listen on.
    ///
    /// Environment variable: `ADDRESS`
    #[arg(long, env = "ADDRESS", default_value_t = String::from("localhost"))]
    pub address: String,

    /// TCP port to listen on.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Milliseconds to wait before a submitted password is digested.
    ///
    /// The same delay is the grace period between a shutdown request and
    /// process exit, so every admitted password is digested before the
    /// process ends.
    ///
    /// Environment variable: `HASH_DELAY_MS`
    #[arg(long, env = "HASH_DELAY_MS", default_value_t = 5_000)]
    pub delay_ms: u64,

    /// Upper bound, in seconds, on how long exit waits for outstanding
    /// digests once the server has stopped.
    ///
    /// Environment variable: `DRAIN_TIMEOUT_SECS`
    #[arg(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 3)]
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub service: ServiceConfig,
    pub drain_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.address.trim().is_empty() {
            bail!("ADDRESS must not be empty");
        }

        if args.port == 0 {
            bail!("PORT must be greater than 0");
        }

        if args.delay_ms == 0 {
            bail!("HASH_DELAY_MS must be greater than 0");
        }

        Ok(Self {
            server_addr: format!("{}:{}", args.address.trim(), args.port),
            service: ServiceConfig {
                delay: Duration::from_millis(args.delay_ms),
            },
            drain_timeout: Duration::from_secs(args.drain_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = core::iter::once("hashq-server").chain(args.iter().copied());
        let args = CliArgs::try_parse_from(argv)?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--address",
            "0.0.0.0",
            "--port",
            "9000",
            "--delay-ms",
            "250",
            "--drain-timeout-secs",
            "1",
        ])
        .unwrap();

        assert_eq!(config.server_addr, "0.0.0.0:9000");
        assert_eq!(config.service.delay, Duration::from_millis(250));
        assert_eq!(config.drain_timeout, Duration::from_secs(1));
    }

    #[test]
    fn zero_port_is_rejected() {
        let err = parse(&["--address", "127.0.0.1", "--port", "0"]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn zero_delay_is_rejected() {
        let err = parse(&["--port", "8080", "--delay-ms", "0"]).unwrap_err();
        assert!(err.to_string().contains("HASH_DELAY_MS"));
    }

    #[test]
    fn blank_address_is_rejected() {
        let err = parse(&["--address", " ", "--port", "8080"]).unwrap_err();
        assert!(err.to_string().contains("ADDRESS"));
    }
}

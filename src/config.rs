//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **CLI flags** — `--serial`, `--baud`, `--host`, `--port`, `--hz`, `--audit`
//! 2. **Environment variables** — `SERIAL_DEV`, `BAUD`, `WS_HOST`, `WS_PORT`,
//!    `POLL_HZ`, `AUDIT_PATH`
//! 3. **Compiled defaults** — see each field's default value below
//!
//! There is no on-disk config file: this gateway has exactly two external
//! sources of configuration, flags and environment, matching the device
//! control plane it talks to.

use clap::Parser;

const DEFAULT_SERIAL: &str = "/dev/ttyUSB0";
const DEFAULT_BAUD: u32 = 115_200;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;
const DEFAULT_HZ: f64 = 2.0;
const DEFAULT_AUDIT_PATH: &str = "/var/lib/lydia-device/audit.jsonl";

const HZ_MIN: f64 = 0.5;
const HZ_MAX: f64 = 5.0;

/// CLI surface, parsed by `clap`. Every field also has an environment
/// variable fallback applied in [`Config::load`] before the compiled
/// default is used.
#[derive(Debug, Parser)]
#[command(
    name = "lydia-device",
    about = "Serial-to-WebSocket gateway for the msh laser controller shell"
)]
struct Cli {
    /// Serial device path (env `SERIAL_DEV`, default `/dev/ttyUSB0`).
    #[arg(long)]
    serial: Option<String>,
    /// Serial baud rate (env `BAUD`, default 115200).
    #[arg(long)]
    baud: Option<u32>,
    /// WebSocket bind host (env `WS_HOST`, default 127.0.0.1).
    #[arg(long)]
    host: Option<String>,
    /// WebSocket bind port (env `WS_PORT`, default 8787).
    #[arg(long)]
    port: Option<u16>,
    /// Status poll frequency in Hz, clamped to [0.5, 5.0] (env `POLL_HZ`, default 2.0).
    #[arg(long)]
    hz: Option<f64>,
    /// Audit log path (env `AUDIT_PATH`, default `/var/lib/lydia-device/audit.jsonl`).
    #[arg(long)]
    audit: Option<String>,
}

/// Resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub serial: String,
    pub baud: u32,
    pub host: String,
    pub port: u16,
    /// Poll frequency in Hz, already clamped to `[0.5, 5.0]`.
    pub hz: f64,
    pub audit_path: String,
}

impl Config {
    /// Parse CLI arguments, layer in environment fallbacks, and apply defaults.
    #[must_use]
    pub fn load() -> Self {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Self {
        let serial = cli
            .serial
            .or_else(|| std::env::var("SERIAL_DEV").ok())
            .unwrap_or_else(|| DEFAULT_SERIAL.to_string());

        let baud = cli
            .baud
            .or_else(|| std::env::var("BAUD").ok().and_then(|s| s.parse().ok()))
            .unwrap_or(DEFAULT_BAUD);

        let host = cli
            .host
            .or_else(|| std::env::var("WS_HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli
            .port
            .or_else(|| std::env::var("WS_PORT").ok().and_then(|s| s.parse().ok()))
            .unwrap_or(DEFAULT_PORT);

        let hz = cli
            .hz
            .or_else(|| std::env::var("POLL_HZ").ok().and_then(|s| s.parse().ok()))
            .unwrap_or(DEFAULT_HZ);

        let audit_path = cli
            .audit
            .or_else(|| std::env::var("AUDIT_PATH").ok())
            .unwrap_or_else(|| DEFAULT_AUDIT_PATH.to_string());

        Self {
            serial,
            baud,
            host,
            port,
            hz: clamp_hz(hz),
            audit_path,
        }
    }
}

fn clamp_hz(hz: f64) -> f64 {
    hz.clamp(HZ_MIN, HZ_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(serial: Option<&str>, hz: Option<f64>) -> Cli {
        Cli {
            serial: serial.map(str::to_string),
            baud: None,
            host: None,
            port: None,
            hz,
            audit: None,
        }
    }

    #[test]
    fn defaults_apply_when_nothing_set() {
        let cfg = Config::from_cli(cli(None, None));
        assert_eq!(cfg.serial, DEFAULT_SERIAL);
        assert_eq!(cfg.baud, DEFAULT_BAUD);
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!((cfg.hz - DEFAULT_HZ).abs() < f64::EPSILON);
        assert_eq!(cfg.audit_path, DEFAULT_AUDIT_PATH);
    }

    #[test]
    fn cli_flag_overrides_default() {
        let cfg = Config::from_cli(cli(Some("/dev/ttyS5"), None));
        assert_eq!(cfg.serial, "/dev/ttyS5");
    }

    #[test]
    fn hz_is_clamped_to_range() {
        assert!((clamp_hz(0.1) - HZ_MIN).abs() < f64::EPSILON);
        assert!((clamp_hz(50.0) - HZ_MAX).abs() < f64::EPSILON);
        assert!((clamp_hz(3.3) - 3.3).abs() < f64::EPSILON);
    }
}

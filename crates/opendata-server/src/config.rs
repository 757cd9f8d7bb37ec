//! Server configuration
//!
//! Values are layered, lowest priority first: built-in defaults, an optional
//! configuration file, `OPENDATA_*` environment variables and command line
//! flags.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix, e.g. `OPENDATA_PORT`.
pub const ENV_PREFIX: &str = "OPENDATA";

/// Command line flags
#[derive(Parser, Debug, Default)]
#[command(name = "opendata-server", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// JSON fixture seeding the user store
    #[arg(long = "users")]
    pub users_fixture: Option<PathBuf>,

    /// Issue an API key for this user (slug or id) at startup and print it
    #[arg(long, value_name = "USER")]
    pub issue_apikey: Option<String>,
}

/// Resolved server configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub users_fixture: Option<PathBuf>,
    pub export_basename: String,
    /// API key signing secret
    pub secret_key: Option<SecretString>,
    /// Account receiving a fresh API key at startup
    pub issue_apikey: Option<String>,
}

impl ServerConfig {
    /// Load configuration from every layer, reading the process environment.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::load_with_env(cli, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(cli: &Cli, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080_i64)?
            .set_default("log_level", "info")?
            .set_default("log_json", false)?
            .set_default("export_basename", "export")?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder
            .add_source(env.try_parsing(true))
            .set_override_option("host", cli.host.clone())?
            .set_override_option("port", cli.port.map(i64::from))?
            .set_override_option("log_level", cli.log_level.clone())?
            .set_override_option("log_json", cli.log_json.then_some(true))?
            .set_override_option(
                "users_fixture",
                cli.users_fixture
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("issue_apikey", cli.issue_apikey.clone())?
            .build()?
            .try_deserialize()
    }

    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::load_with_env(&Cli::default(), env(&[])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.export_basename, "export");
        assert!(config.users_fixture.is_none());
        assert!(config.secret_key.is_none());
        assert!(config.issue_apikey.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file =
            config_file("port = 9000\nexport_basename = \"users\"\nsecret_key = \"s3cret\"\n");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };

        let config = ServerConfig::load_with_env(&cli, env(&[])).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.export_basename, "users");
        assert_eq!(config.secret_key.unwrap().expose_secret(), "s3cret");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file("port = 9000\n");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };

        let config = ServerConfig::load_with_env(
            &cli,
            env(&[("OPENDATA_PORT", "9100"), ("OPENDATA_LOG_JSON", "true")]),
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert!(config.log_json);
    }

    #[test]
    fn test_cli_overrides_env() {
        let cli = Cli {
            port: Some(7000),
            host: Some("127.0.0.1".to_string()),
            users_fixture: Some(PathBuf::from("users.json")),
            ..Cli::default()
        };

        let config =
            ServerConfig::load_with_env(&cli, env(&[("OPENDATA_PORT", "9100")])).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:7000");
        assert_eq!(config.users_fixture, Some(PathBuf::from("users.json")));
    }

    #[test]
    fn test_missing_config_file_fails() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/opendata.toml")),
            ..Cli::default()
        };
        assert!(ServerConfig::load_with_env(&cli, env(&[])).is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "opendata-server",
            "--port",
            "3000",
            "--log-json",
            "--users",
            "u.json",
            "--issue-apikey",
            "ada-admin",
        ]);
        assert_eq!(cli.port, Some(3000));
        assert!(cli.log_json);
        assert_eq!(cli.users_fixture, Some(PathBuf::from("u.json")));

        let config = ServerConfig::load_with_env(&cli, env(&[])).unwrap();
        assert_eq!(config.issue_apikey.as_deref(), Some("ada-admin"));
    }
}

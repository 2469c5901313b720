use crate::config::AppConfig;
use crate::utils::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "recipe-calendar")]
#[command(about = "Recipe library and weekly meal planner")]
pub struct CliConfig {
    #[arg(short, long, default_value = "recipe-calendar.toml")]
    pub config: String,

    #[arg(long, help = "Override [server].port")]
    pub port: Option<u16>,

    #[arg(long, help = "Override [server].host")]
    pub host: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Validate the configuration and exit")]
    pub check: bool,
}

impl CliConfig {
    /// Loads the TOML file and applies command-line overrides.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = AppConfig::from_file(&self.config)?;
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(host) = &self.host {
            config.server.host = Some(host.clone());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_overrides_win_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[server]
port = 9000

[auth]
client_id = "id"
client_secret = "secret"
"#,
        )
        .unwrap();

        let cli = CliConfig::parse_from([
            "recipe-calendar",
            "--config",
            file.path().to_str().unwrap(),
            "--port",
            "8080",
        ]);
        let config = cli.load().unwrap();

        assert_eq!(config.port(), 8080);
        assert_eq!(config.host(), "127.0.0.1");
    }
}

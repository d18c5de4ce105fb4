//! Content server configuration

/// Content server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// Look up a tenant's build status when one of its files is missing
    pub status_diagnostics: bool,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SERVER_BIND_ADDR (optional, default: 0.0.0.0:3001, or 0.0.0.0:$PORT)
    /// - STATUS_DIAGNOSTICS (optional, default: true)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = match std::env::var("SERVER_BIND_ADDR") {
            Ok(addr) => addr,
            Err(_) => match std::env::var("PORT") {
                Ok(port) => format!("0.0.0.0:{port}"),
                Err(_) => defaults.bind_addr,
            },
        };

        let status_diagnostics = match std::env::var("STATUS_DIAGNOSTICS") {
            Ok(value) => parse_flag(&value).ok_or_else(|| {
                anyhow::anyhow!("STATUS_DIAGNOSTICS must be true or false, got {value:?}")
            })?,
            Err(_) => defaults.status_diagnostics,
        };

        Ok(Self {
            bind_addr,
            status_diagnostics,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            status_diagnostics: true,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert!(config.status_diagnostics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}

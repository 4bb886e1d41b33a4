//! Connection configuration for the Phoenix handler.
//!
//! Parameters arrive either as a TOML file (`load_config`) or as a mapping
//! supplied by the host (`ConnectionParams::from_args`). Optional parameters
//! the caller leaves out are held as `None` and are still handed to the
//! driver, which applies its own defaults.
use crate::core::{HandlerError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Authentication mechanisms understood by the Avatica server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AuthenticationMode {
    Spnego,
    Basic,
    Digest,
    None,
}

impl FromStr for AuthenticationMode {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SPNEGO" => Ok(AuthenticationMode::Spnego),
            "BASIC" => Ok(AuthenticationMode::Basic),
            "DIGEST" => Ok(AuthenticationMode::Digest),
            "NONE" => Ok(AuthenticationMode::None),
            other => Err(HandlerError::Config(format!(
                "unknown authentication mode '{}', expected SPNEGO, BASIC, DIGEST or NONE",
                other
            ))),
        }
    }
}

impl TryFrom<String> for AuthenticationMode {
    type Error = HandlerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthenticationMode::Spnego => "SPNEGO",
            AuthenticationMode::Basic => "BASIC",
            AuthenticationMode::Digest => "DIGEST",
            AuthenticationMode::None => "NONE",
        };
        f.write_str(s)
    }
}

/// Parameters used to open a connection to the query server.
///
/// Immutable once handed to a handler.
#[derive(Clone, PartialEq, Deserialize)]
pub struct ConnectionParams {
    /// URL of the Phoenix Query Server, e.g. `http://127.0.0.1:8765`
    pub url: String,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub autocommit: Option<bool>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub authentication: Option<AuthenticationMode>,
    #[serde(default)]
    pub avatica_user: Option<String>,
    #[serde(default)]
    pub avatica_password: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("ConnectionParams")
            .field("url", &self.url)
            .field("max_retries", &self.max_retries)
            .field("autocommit", &self.autocommit)
            .field("auth", &redact(&self.auth))
            .field("authentication", &self.authentication)
            .field("avatica_user", &self.avatica_user)
            .field("avatica_password", &redact(&self.avatica_password))
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .finish()
    }
}

impl ConnectionParams {
    /// Parameters with only the URL set.
    pub fn new(url: impl Into<String>) -> Self {
        ConnectionParams {
            url: url.into(),
            max_retries: None,
            autocommit: None,
            auth: None,
            authentication: None,
            avatica_user: None,
            avatica_password: None,
            user: None,
            password: None,
        }
    }

    /// Builds parameters from a host-supplied mapping of names to values.
    ///
    /// Keys that are missing or `null` become `None`; a missing `url` is an
    /// error.
    pub fn from_args(args: serde_json::Value) -> Result<Self> {
        let params: ConnectionParams = serde_json::from_value(args)
            .map_err(|e| HandlerError::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(HandlerError::Config("url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Every recognized parameter in declaration order, paired with its
    /// value rendered as text or `None` when absent.
    pub fn to_args(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("url", Some(self.url.clone())),
            ("max_retries", self.max_retries.map(|v| v.to_string())),
            ("autocommit", self.autocommit.map(|v| v.to_string())),
            ("auth", self.auth.clone()),
            ("authentication", self.authentication.map(|v| v.to_string())),
            ("avatica_user", self.avatica_user.clone()),
            ("avatica_password", self.avatica_password.clone()),
            ("user", self.user.clone()),
            ("password", self.password.clone()),
        ]
    }
}

/// Type of a connection argument as advertised to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Str,
    Int,
    Bool,
}

/// Description of one connection argument.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionArg {
    pub name: &'static str,
    pub arg_type: ArgType,
    pub required: bool,
    pub description: &'static str,
}

/// Connection arguments accepted by the handler, in the order the driver
/// receives them.
pub const CONNECTION_ARGS: &[ConnectionArg] = &[
    ConnectionArg {
        name: "url",
        arg_type: ArgType::Str,
        required: true,
        description: "The URL to the Phoenix Query Server.",
    },
    ConnectionArg {
        name: "max_retries",
        arg_type: ArgType::Int,
        required: false,
        description: "The maximum number of retries in case there is a connection error.",
    },
    ConnectionArg {
        name: "autocommit",
        arg_type: ArgType::Bool,
        required: false,
        description: "The flag for switching the connection to autocommit mode.",
    },
    ConnectionArg {
        name: "auth",
        arg_type: ArgType::Str,
        required: false,
        description: "An authentication configuration object passed to the HTTP client.",
    },
    ConnectionArg {
        name: "authentication",
        arg_type: ArgType::Str,
        required: false,
        description: "The authentication mechanism, mirroring the JDBC driver: SPNEGO, BASIC, DIGEST or NONE.",
    },
    ConnectionArg {
        name: "avatica_user",
        arg_type: ArgType::Str,
        required: false,
        description: "The username for BASIC or DIGEST authentication.",
    },
    ConnectionArg {
        name: "avatica_password",
        arg_type: ArgType::Str,
        required: false,
        description: "The password for BASIC or DIGEST authentication.",
    },
    ConnectionArg {
        name: "user",
        arg_type: ArgType::Str,
        required: false,
        description: "Alias for avatica_user with BASIC or DIGEST, or for do_as with NONE or SPNEGO.",
    },
    ConnectionArg {
        name: "password",
        arg_type: ArgType::Str,
        required: false,
        description: "Alias for avatica_password with BASIC or DIGEST.",
    },
];

/// Example parameters pointing at a local query server.
pub fn connection_args_example() -> ConnectionParams {
    ConnectionParams {
        autocommit: Some(true),
        ..ConnectionParams::new("http://127.0.0.1:8765")
    }
}

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    /// Name of this handler instance as known to the host
    #[serde(default = "default_name")]
    pub name: String,
    pub connection: ConnectionParams,
}

fn default_name() -> String {
    crate::handler::NAME.to_string()
}

impl HandlerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HandlerConfig = toml::from_str(content)?;
        config.connection.validate()?;
        Ok(config)
    }
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HandlerConfig> {
    let content = fs::read_to_string(path)?;
    HandlerConfig::from_toml_str(&content)
}

/// Default configuration file location, `<config dir>/phoenix-handler/connection.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("phoenix-handler").join("connection.toml"))
}

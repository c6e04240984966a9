//! Configuration loading and validation.

use std::fs;
use std::net::SocketAddr;

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(nested)]
    pub server: ServerSettings,

    #[validate(nested)]
    #[serde(default)]
    pub api: ApiLimits,

    #[serde(default)]
    pub assets: AssetSettings,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    #[allow(dead_code)]
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap()
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

/// Listener addresses and per-request limits for the endpoint server.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub listeners: Vec<Listener>,

    /// Downstream keepalive in seconds, 0 disables connection reuse.
    #[serde(default = "ServerSettings::default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Largest request body accepted before responding 413.
    #[serde(default = "ServerSettings::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerSettings {
    fn default_keepalive_secs() -> u64 {
        60
    }

    fn default_max_body_bytes() -> usize {
        1024 * 1024
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            keepalive_secs: Self::default_keepalive_secs(),
            max_body_bytes: Self::default_max_body_bytes(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listener {
    pub address: SocketAddr,
}

/// Bounds applied to user-supplied fields, adjustable without a rebuild.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "ApiLimits::validate_username_bounds"))]
pub struct ApiLimits {
    #[serde(default = "ApiLimits::default_username_min")]
    pub username_min: u64,
    #[serde(default = "ApiLimits::default_username_max")]
    pub username_max: u64,
    #[serde(default = "ApiLimits::default_display_name_max")]
    pub display_name_max: u64,
}

impl ApiLimits {
    fn default_username_min() -> u64 {
        3
    }

    fn default_username_max() -> u64 {
        32
    }

    fn default_display_name_max() -> u64 {
        64
    }

    fn validate_username_bounds(&self) -> Result<(), ValidationError> {
        if self.username_min == 0 || self.username_min > self.username_max {
            return Err(ValidationError::new("username_bounds"));
        }

        Ok(())
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            username_min: Self::default_username_min(),
            username_max: Self::default_username_max(),
            display_name_max: Self::default_display_name_max(),
        }
    }
}

/// Where the asset endpoint serves files from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetSettings {
    #[serde(default = "AssetSettings::default_root")]
    pub root: String,
}

impl AssetSettings {
    fn default_root() -> String {
        "./assets".to_string()
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
        }
    }
}

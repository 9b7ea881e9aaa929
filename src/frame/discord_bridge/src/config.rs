use crate::error::{BridgeError, BridgeResult};
use crate::ids::UserId;
use crate::remote::RemoteUser;
use bridge_db::DEFAULT_DB_FILE_NAME;
use bridge_kit::get_bridge_data_dir;
use log::*;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const USERID_PLACEHOLDER: &str = "{userid}";
const DEFAULT_USERNAME_TEMPLATE: &str = "discord_{userid}";
const DEFAULT_DISPLAYNAME_TEMPLATE: &str = "{displayname}{bot}";
const PLACEHOLDER_PATTERN: &str = r"\{([a-z_]+)\}";

#[derive(Debug, Deserialize, Clone)]
pub struct HomeserverConfig {
    pub address: String,
    pub domain: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeSection {
    #[serde(default = "default_username_template")]
    pub username_template: String,
    #[serde(default = "default_displayname_template")]
    pub displayname_template: String,
    #[serde(default)]
    pub enable_dm_bridging: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        BridgeSection {
            username_template: default_username_template(),
            displayname_template: default_displayname_template(),
            enable_dm_bridging: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    pub homeserver: HomeserverConfig,
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_username_template() -> String {
    DEFAULT_USERNAME_TEMPLATE.to_string()
}

fn default_displayname_template() -> String {
    DEFAULT_DISPLAYNAME_TEMPLATE.to_string()
}

impl BridgeConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            error!("failed to read config {}: {}", path.display(), err);
            err
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("loaded bridge config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.homeserver.domain.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "homeserver.domain is required".to_string(),
            ));
        }
        let template = &self.bridge.username_template;
        if template.matches(USERID_PLACEHOLDER).count() != 1 {
            return Err(BridgeError::InvalidConfig(format!(
                "bridge.username_template must contain {} exactly once: {}",
                USERID_PLACEHOLDER, template
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database.path {
            Some(path) => path.clone(),
            None => get_bridge_data_dir().join(DEFAULT_DB_FILE_NAME),
        }
    }

    pub fn puppet_naming(&self) -> BridgeResult<PuppetNaming> {
        PuppetNaming::new(
            &self.bridge.username_template,
            &self.bridge.displayname_template,
            &self.homeserver.domain,
        )
    }
}

/// Ghost id and display name rules, built once from the config.
#[derive(Debug, Clone)]
pub struct PuppetNaming {
    username_prefix: String,
    username_suffix: String,
    displayname_template: String,
    domain: String,
    mxid_regex: Regex,
    placeholder_regex: Regex,
}

impl PuppetNaming {
    pub fn new(
        username_template: &str,
        displayname_template: &str,
        domain: &str,
    ) -> BridgeResult<Self> {
        let (prefix, suffix) = username_template
            .split_once(USERID_PLACEHOLDER)
            .ok_or_else(|| {
                BridgeError::InvalidConfig(format!(
                    "username template has no {}: {}",
                    USERID_PLACEHOLDER, username_template
                ))
            })?;

        let pattern = format!(
            "^@{}([0-9]+){}:{}$",
            regex::escape(prefix),
            regex::escape(suffix),
            regex::escape(domain)
        );
        let mxid_regex = Regex::new(&pattern)
            .map_err(|err| BridgeError::InvalidConfig(format!("bad ghost id pattern: {}", err)))?;
        let placeholder_regex = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|err| BridgeError::InvalidConfig(format!("bad placeholder pattern: {}", err)))?;

        Ok(PuppetNaming {
            username_prefix: prefix.to_string(),
            username_suffix: suffix.to_string(),
            displayname_template: displayname_template.to_string(),
            domain: domain.to_string(),
            mxid_regex,
            placeholder_regex,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn format_username(&self, remote_id: &str) -> String {
        format!("{}{}{}", self.username_prefix, remote_id, self.username_suffix)
    }

    pub fn format_puppet_mxid(&self, remote_id: &str) -> UserId {
        UserId::new(&self.format_username(remote_id), &self.domain)
    }

    /// Returns the remote id encoded in a ghost id, or `None` for any other user.
    pub fn parse_puppet_mxid(&self, mxid: &UserId) -> Option<String> {
        let mxid = mxid.to_string();
        self.mxid_regex
            .captures(&mxid)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Expands the display name template in one pass, so placeholder text
    /// inside user supplied values is kept verbatim. Unknown placeholders
    /// are left as written.
    pub fn format_displayname(&self, user: &RemoteUser) -> String {
        self.placeholder_regex
            .replace_all(&self.displayname_template, |caps: &regex::Captures<'_>| {
                match &caps[1] {
                    "displayname" => user.display_name().to_string(),
                    "username" => user.username.clone(),
                    "global_name" => user.global_name.clone().unwrap_or_default(),
                    "discriminator" => user.discriminator.clone(),
                    "id" => user.id.clone(),
                    "bot" if user.bot => " (bot)".to_string(),
                    "bot" => String::new(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

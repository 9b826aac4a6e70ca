//! # Merge Configuration
//!
//! This module turns the raw, stringly-typed configuration of a run into
//! validated [`MergeItemConfig`] values. Downstream components never see raw
//! key/value pairs.
//!
//! ## File Format
//!
//! The configuration file is INI. The `global_config` section supplies
//! defaults for every merge item; every other section is one merge item,
//! processed in file order:
//!
//! ```ini
//! [global_config]
//! src_user = robot
//! src_token = secret
//! tgt_user = robot
//! tgt_token = secret
//!
//! [kernel]
//! src = https://git.example.com/upstream/kernel.git
//! src_branch = main
//! src_rev = a1b2c3...d4e5f6
//! tgt = https://git.example.com/downstream/kernel.git
//! tgt_branch = vendor
//! ```
//!
//! ## Resolution
//!
//! [`resolve`] looks each recognized option up in the item first and the
//! global defaults second. Every option except `enabled` is required; a
//! missing one is a configuration error and the item is skipped by the
//! caller. Credentials are interpolated into the remote URLs and the
//! revision range is checked against the `<rev>...<rev>` grammar.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::defaults::GLOBAL_SECTION;
use crate::error::{Error, Result};

/// Raw option set of one config section, keys lowercased.
pub type RawOptions = BTreeMap<String, String>;

/// Every option a merge item understands.
pub const CONFIG_KEYS: [&str; 10] = [
    "src",
    "src_branch",
    "src_user",
    "src_token",
    "src_rev",
    "tgt",
    "tgt_user",
    "tgt_branch",
    "tgt_token",
    "enabled",
];

static REVISION_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z]+\.\.\.[0-9A-Za-z]+$").expect("revision range pattern is valid")
});

/// One unresolved merge item as read from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub name: String,
    pub options: RawOptions,
}

/// The whole configuration of a run, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Options of the `global_config` section.
    pub global: RawOptions,
    /// Merge items in file order.
    pub items: Vec<RawItem>,
}

/// A git remote together with the credentials used to reach it.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub url: String,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl RemoteEndpoint {
    /// Creates an endpoint; empty credentials are treated as absent.
    pub fn new(url: &str, username: &str, token: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            url: url.to_string(),
            username: non_empty(username),
            token: non_empty(token),
        }
    }

    /// The URL with credentials interpolated into its authority.
    pub fn authenticated_url(&self) -> String {
        authenticated_url(
            &self.url,
            self.username.as_deref().unwrap_or(""),
            self.token.as_deref().unwrap_or(""),
        )
    }

    /// The URL safe to print in logs.
    pub fn display_url(&self) -> String {
        redact_url(&self.url)
    }
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("url", &self.display_url())
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where patches come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub endpoint: RemoteEndpoint,
    pub branch: String,
    /// Validated `<rev>...<rev>` range.
    pub revision_range: String,
}

/// Where patches go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub endpoint: RemoteEndpoint,
    pub branch: String,
}

/// A validated merge item. Built once per run, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeItemConfig {
    pub name: String,
    pub source: SourceSpec,
    pub target: TargetSpec,
    pub enabled: bool,
}

/// Resolves one merge item against the global defaults.
pub fn resolve(name: &str, item: &RawOptions, global: &RawOptions) -> Result<MergeItemConfig> {
    for key in item.keys() {
        if !CONFIG_KEYS.contains(&key.as_str()) {
            debug!("[{}] ignoring unknown option '{}'", name, key);
        }
    }

    let required = |key: &str| lookup(name, item, global, key);

    let src = required("src")?;
    let src_branch = required("src_branch")?;
    let src_user = required("src_user")?;
    let src_token = required("src_token")?;
    let src_rev = required("src_rev")?;
    let tgt = required("tgt")?;
    let tgt_user = required("tgt_user")?;
    let tgt_branch = required("tgt_branch")?;
    let tgt_token = required("tgt_token")?;

    let enabled = match item.get("enabled").or_else(|| global.get("enabled")) {
        Some(value) => parse_bool(value).ok_or_else(|| Error::InvalidConfigValue {
            item: name.to_string(),
            key: "enabled".to_string(),
            value: value.clone(),
        })?,
        None => true,
    };

    validate_revision_range(name, src_rev)?;

    Ok(MergeItemConfig {
        name: name.to_string(),
        source: SourceSpec {
            endpoint: RemoteEndpoint::new(src, src_user, src_token),
            branch: src_branch.to_string(),
            revision_range: src_rev.to_string(),
        },
        target: TargetSpec {
            endpoint: RemoteEndpoint::new(tgt, tgt_user, tgt_token),
            branch: tgt_branch.to_string(),
        },
        enabled,
    })
}

fn lookup<'a>(name: &str, item: &'a RawOptions, global: &'a RawOptions, key: &str) -> Result<&'a str> {
    item.get(key)
        .or_else(|| global.get(key))
        .map(String::as_str)
        .ok_or_else(|| Error::MissingConfig {
            item: name.to_string(),
            key: key.to_string(),
        })
}

/// Returns true iff `range` is two alphanumeric revisions joined by `...`.
pub fn is_revision_range(range: &str) -> bool {
    REVISION_RANGE.is_match(range)
}

/// Checks `range` for the item, reporting an [`Error::InvalidRevisionRange`].
pub fn validate_revision_range(item: &str, range: &str) -> Result<()> {
    if is_revision_range(range) {
        Ok(())
    } else {
        Err(Error::InvalidRevisionRange {
            item: item.to_string(),
            range: range.to_string(),
        })
    }
}

/// Interpolates credentials into a remote URL.
///
/// The escaped username, then `:` and the escaped token if there is one,
/// then `@` are inserted right after the first `//`. Without a username the
/// URL is returned unchanged.
pub fn authenticated_url(url: &str, username: &str, token: &str) -> String {
    if username.is_empty() {
        return url.to_string();
    }
    let Some(pos) = url.find("//") else {
        return url.to_string();
    };

    let mut userinfo = urlencoding::encode(username).into_owned();
    if !token.is_empty() {
        userinfo.push(':');
        userinfo.push_str(&urlencoding::encode(token));
    }
    userinfo.push('@');

    let (scheme, rest) = url.split_at(pos + 2);
    format!("{}{}{}", scheme, userinfo, rest)
}

/// Strips any username and password from a URL for display.
///
/// Strings that do not parse as URLs (e.g. scp-style remotes) are returned
/// unchanged.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            if parsed.set_password(None).is_err() || parsed.set_username("").is_err() {
                return "<redacted>".to_string();
            }
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Loads a merge plan from an INI file.
pub fn from_file(path: &Path) -> Result<MergePlan> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_from(&content, path)
}

/// Parses a merge plan from INI text.
pub fn parse(content: &str) -> Result<MergePlan> {
    parse_from(content, Path::new("<inline>"))
}

fn parse_from(content: &str, path: &Path) -> Result<MergePlan> {
    let ini = ini::Ini::load_from_str_noescape(content).map_err(|e| Error::ConfigFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut plan = MergePlan::default();
    for (section, properties) in ini.iter() {
        let Some(section) = section else {
            continue;
        };
        let options: RawOptions = properties
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();

        if section == GLOBAL_SECTION {
            plan.global.extend(options);
        } else {
            plan.items.push(RawItem {
                name: section.to_string(),
                options,
            });
        }
    }
    Ok(plan)
}

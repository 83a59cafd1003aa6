use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde::Deserialize;
use serde_yaml::Deserializer;
use url::Url;

use crate::fetcher::RetryPolicy;

const APP_NAME: &str = "dramaradar";
const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_SOURCE_URL: &str = "https://piaofang.maoyan.com/web-heat";
pub const DEFAULT_REFERER: &str = "https://piaofang.maoyan.com/";
pub const DEFAULT_DB_PATH: &str = "data/dramaradar.db";
pub const DEFAULT_TOP_N: usize = 10;
pub const MAX_TOP_N: usize = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// What the optional YAML file may set. Everything can also come from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub top_n: Option<usize>,
    pub source_url: Option<String>,
    pub referer: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_url: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
    pub fetch_attempts: Option<u32>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub top_n: usize,
    pub source_url: String,
    pub referer: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Alternative Bot API endpoint, e.g. a proxy.
    pub telegram_api_url: Option<Url>,
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub send_timeout: Duration,
}

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and report only: no ledger writes, no messages.
    pub dry_run: bool,
    /// Update the ledger but do not send anything.
    pub no_notify: bool,
    pub verbose: bool,
}

pub struct EnsureOutcome {
    pub path: PathBuf,
    pub created: bool,
}

impl Config {
    /// Environment and `.env` first, then the YAML file, then defaults.
    /// `db_override` (the `--db-path` flag) beats all of them.
    pub fn load(db_override: Option<PathBuf>) -> Result<Config> {
        load_dotenv()?;
        let file = Self::get_user_config()?;
        Self::resolve(file, |key| env::var(key).ok(), db_override)
    }

    pub fn resolve(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
        db_override: Option<PathBuf>,
    ) -> Result<Config> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = db_override
            .or_else(|| var("DRAMARADAR_DB_PATH").map(PathBuf::from))
            .or(file.db_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let top_n = match var("DRAMARADAR_TOP_N") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| anyhow!("DRAMARADAR_TOP_N must be an integer, e.g. 10 (got {raw:?})"))?,
            None => file.top_n.unwrap_or(DEFAULT_TOP_N),
        };
        if !(1..=MAX_TOP_N).contains(&top_n) {
            bail!("top_n must be between 1 and {MAX_TOP_N} (got {top_n})");
        }

        let telegram_api_url = var("TG_API_BASE_URL")
            .or(file.telegram_api_url.filter(|v| !v.trim().is_empty()))
            .map(|raw| parse_api_url(&raw))
            .transpose()?;

        let fetch_timeout_secs = file.fetch_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }

        let retry = RetryPolicy {
            max_attempts: file.fetch_attempts.unwrap_or(RetryPolicy::default().max_attempts).max(1),
            ..RetryPolicy::default()
        };

        Ok(Config {
            db_path,
            top_n,
            source_url: file.source_url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            referer: file.referer.unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            telegram_bot_token: var("TG_BOT_TOKEN").or(file.telegram_bot_token.filter(|v| !v.trim().is_empty())),
            telegram_chat_id: var("TG_CHAT_ID").or(file.telegram_chat_id.filter(|v| !v.trim().is_empty())),
            telegram_api_url,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            retry,
            send_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Write a commented template to the XDG config dir unless one exists.
    pub fn ensure_user_config() -> Result<EnsureOutcome> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME);

        if let Some(path) = xdg_dirs.find_config_file(CONFIG_FILE) {
            return Ok(EnsureOutcome {
                path,
                created: false,
            });
        }

        let config_path = xdg_dirs
            .place_config_file(CONFIG_FILE)
            .context("Cannot create configuration directory")?;
        let mut config_file = File::create(&config_path)?;

        write!(
            &mut config_file,
            r#"# dramaradar config (YAML)
# Every key is optional. Environment variables take precedence:
# TG_BOT_TOKEN, TG_CHAT_ID, TG_API_BASE_URL, DRAMARADAR_DB_PATH, DRAMARADAR_TOP_N

db_path: "{DEFAULT_DB_PATH}"
top_n: {DEFAULT_TOP_N}

# telegram_bot_token: "<your bot token>"
# telegram_chat_id: "<numeric chat id or @channel>"
# telegram_api_url: "https://api.telegram.org"

# fetch_timeout_secs: {DEFAULT_TIMEOUT_SECS}
# fetch_attempts: 3
"#
        )?;

        Ok(EnsureOutcome {
            path: config_path,
            created: true,
        })
    }

    /// The YAML file, or an empty config when there is none.
    pub fn get_user_config() -> Result<FileConfig> {
        match xdg::BaseDirectories::with_prefix(APP_NAME).find_config_file(CONFIG_FILE) {
            Some(path) => read_config_file(&path),
            None => {
                debug!("No config file found, using environment and defaults");
                Ok(FileConfig::default())
            }
        }
    }
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    let deserialized = Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(deserialized).map_err(|e| {
        anyhow!(
            "Invalid YAML in {} at `{}`: {}",
            path.display(),
            e.path(),
            e.inner()
        )
    })
}

/// Fill in unset variables from the `.env` file named by `DRAMARADAR_ENV_FILE`.
/// Variables already present in the environment win.
fn load_dotenv() -> Result<()> {
    let path = env::var("DRAMARADAR_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    let path = Path::new(&path);
    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(());
    }
    dotenvy::from_path(path).with_context(|| format!("Failed to read {}", path.display()))?;
    debug!("Loaded environment from {}", path.display());
    Ok(())
}

fn parse_api_url(raw: &str) -> Result<Url> {
    let base = raw.trim().trim_end_matches('/');
    let url = Url::parse(base)
        .with_context(|| format!("Telegram API URL must be an http(s) URL, got {raw:?}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        bail!("Telegram API URL must be an http(s) URL such as https://tg.example.com, got {raw:?}");
    }
    Ok(url)
}

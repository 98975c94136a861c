use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Loaded from environment variables, with a best-effort `.env` loader so local
/// runs do not need an exported environment.
#[derive(Clone, Debug)]
pub struct Config {
    // VK access
    pub vk_token: String,
    pub vk_group_id: i64,
    /// The community chat the bot works in (local id, not peer id).
    pub chat_for_work_id: i64,

    // Quiz
    pub questions_file: PathBuf,
    pub round_time: Duration,

    // Housekeeping
    pub logs_dir: PathBuf,

    // Long poll
    pub longpoll_wait: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let vk_token = env_str("VK_TOKEN").unwrap_or_default();
        if vk_token.trim().is_empty() {
            return Err(Error::Config(
                "VK_TOKEN environment variable is required".to_string(),
            ));
        }

        let vk_group_id = env_i64("VK_GROUP_ID").ok_or_else(|| {
            Error::Config("VK_GROUP_ID environment variable is required".to_string())
        })?;
        let chat_for_work_id = env_i64("VK_CHAT_ID").ok_or_else(|| {
            Error::Config("VK_CHAT_ID environment variable is required".to_string())
        })?;

        let questions_file = env_path("QUESTIONS_FILE")
            .unwrap_or_else(|| PathBuf::from("data/questions_list.json"));
        let round_time = Duration::from_secs(env_u64("ROUND_SECONDS").unwrap_or(60));
        let logs_dir = env_path("LOGS_DIR").unwrap_or_else(|| PathBuf::from("logs"));

        // VK caps long poll `wait` at 90 seconds; 25 is the documented default.
        let longpoll_wait = Duration::from_secs(env_u64("LONGPOLL_WAIT_SECS").unwrap_or(25).min(90));

        Ok(Self {
            vk_token,
            vk_group_id,
            chat_for_work_id,
            questions_file,
            round_time,
            logs_dir,
            longpoll_wait,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADMIN_CREDENTIALS: &str = "admin1:111,admin2:222";

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub poll_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub persist_interval: Duration,
    /// `None` keeps fixes forever.
    pub location_ttl: Option<Duration>,
    pub admins: HashMap<String, String>,
    pub supabase: Option<SupabaseConfig>,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        env_file_loaded(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse(&get, "PORT", 3000u16)?;
        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "./data".to_string()));
        let persist_interval = Duration::from_secs(parse(&get, "PERSIST_SECS", 60u64)?);
        let location_ttl = match parse(&get, "LOCATION_TTL_SECS", 1800u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let admins = parse_credentials(
            &get("ADMIN_CREDENTIALS").unwrap_or_else(|| DEFAULT_ADMIN_CREDENTIALS.to_string()),
        )?;

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                key,
                poll_interval: Duration::from_secs(parse(&get, "SUPABASE_POLL_SECS", 5u64)?.max(1)),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialSupabase),
        };

        Ok(Self {
            port,
            data_dir,
            persist_interval,
            location_ttl,
            admins,
            supabase,
        })
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn env_file_loaded<T>(result: dotenvy::Result<T>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::EnvFile(e)),
    }
}

fn parse<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

/// `user:password` pairs separated by commas.
fn parse_credentials(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut out = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once(':') {
            Some((user, pass)) if !user.is_empty() => {
                out.insert(user.to_string(), pass.to_string());
            }
            _ => return Err(ConfigError::MalformedCredential(entry.to_string())),
        }
    }
    Ok(out)
}

//! Store configuration: which backend to read and where its data lives.
//!
//! Configuration is resolved once into a `StoreConfig` and handed to
//! `CatalogStore::new`, so a store instance never changes backend between
//! calls. `StoreConfig::from_env` implements the documented variable
//! precedence; `from_lookup` takes any key lookup so tests can supply a map
//! instead of mutating the process environment.

use crate::error::CatalogError;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SFIA_CSV: &str = "sfia-8_en_220221.xlsx - Skills.csv";
pub const DEFAULT_ROLES_JSON: &str = "roles.json";
pub const DEFAULT_LEVELS_JSON: &str = "sfia_levels.json";
pub const DEFAULT_AI_DESCRIPTIONS: &str = "sfia_ai_descriptions.json";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SourceMode {
    #[default]
    File,
    Db,
}

impl SourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceMode::File => "file",
            SourceMode::Db => "db",
        }
    }
}

impl FromStr for SourceMode {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "file" => Ok(SourceMode::File),
            "db" => Ok(SourceMode::Db),
            other => Err(CatalogError::Config(format!(
                "unknown data source '{other}' (expected 'file' or 'db')"
            ))),
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which relational layout holds role requirements.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RoleTableLayout {
    /// `role_level_competencies` (flat skill/level pairs) plus
    /// `role_pathway_selected_skills` (pathway shortlist).
    #[default]
    Competencies,
    /// `role_level_selected_skills` (per-level list with required level).
    SelectedSkills,
}

impl FromStr for RoleTableLayout {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "competencies" => Ok(RoleTableLayout::Competencies),
            "selected_skills" => Ok(RoleTableLayout::SelectedSkills),
            other => Err(CatalogError::Config(format!(
                "unknown role table layout '{other}' (expected 'competencies' or 'selected_skills')"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Locations of the file-backed sources. The overlay is optional by nature.
pub struct FilePaths {
    pub sfia_csv: PathBuf,
    pub roles_json: PathBuf,
    pub levels_json: PathBuf,
    pub ai_descriptions: PathBuf,
}

impl FilePaths {
    /// Default file names resolved under `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            sfia_csv: data_dir.join(DEFAULT_SFIA_CSV),
            roles_json: data_dir.join(DEFAULT_ROLES_JSON),
            levels_json: data_dir.join(DEFAULT_LEVELS_JSON),
            ai_descriptions: data_dir.join(DEFAULT_AI_DESCRIPTIONS),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseSettings {
    /// `DATABASE_URL`; overrides every discrete setting.
    Url(String),
    Discrete {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
        require_ssl: bool,
    },
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings::Discrete {
            host: "localhost".into(),
            port: 5432,
            user: "careers".into(),
            password: "careers".into(),
            database: "careers".into(),
            require_ssl: false,
        }
    }
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, CatalogError> {
        match self {
            DatabaseSettings::Url(url) => PgConnectOptions::from_str(url)
                .map_err(|err| CatalogError::Config(format!("invalid DATABASE_URL: {err}"))),
            DatabaseSettings::Discrete {
                host,
                port,
                user,
                password,
                database,
                require_ssl,
            } => {
                let ssl_mode = if *require_ssl {
                    PgSslMode::Require
                } else {
                    PgSslMode::Prefer
                };
                Ok(PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password)
                    .database(database)
                    .ssl_mode(ssl_mode))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    pub mode: SourceMode,
    pub files: FilePaths,
    pub database: DatabaseSettings,
    pub role_tables: RoleTableLayout,
}

impl StoreConfig {
    /// File-mode configuration reading the default file names under `data_dir`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            mode: SourceMode::File,
            files: FilePaths::in_dir(data_dir),
            database: DatabaseSettings::default(),
            role_tables: RoleTableLayout::default(),
        }
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, CatalogError> {
        let data_dir = crate::find_data_dir();
        Self::from_lookup(&data_dir, |key| env::var(key).ok())
    }

    /// Resolve configuration through `lookup`, treating blank values as unset.
    pub fn from_lookup<F>(data_dir: &Path, lookup: F) -> Result<Self, CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mode = match get("CAREERS_DATA_SOURCE") {
            Some(raw) => raw.parse()?,
            None => SourceMode::File,
        };
        let role_tables = match get("CAREERS_DB_ROLE_SCHEMA") {
            Some(raw) => raw.parse()?,
            None => RoleTableLayout::default(),
        };

        let resolve = |key: &str, default: &str| {
            let raw = get(key).unwrap_or_else(|| default.to_string());
            let path = PathBuf::from(raw);
            if path.is_absolute() {
                path
            } else {
                data_dir.join(path)
            }
        };
        let files = FilePaths {
            sfia_csv: resolve("CAREERS_SFIA_CSV", DEFAULT_SFIA_CSV),
            roles_json: resolve("CAREERS_ROLES_JSON", DEFAULT_ROLES_JSON),
            levels_json: resolve("CAREERS_LEVELS_JSON", DEFAULT_LEVELS_JSON),
            ai_descriptions: resolve("CAREERS_AI_DESCRIPTIONS", DEFAULT_AI_DESCRIPTIONS),
        };

        Ok(Self {
            mode,
            files,
            database: database_settings(get)?,
            role_tables,
        })
    }
}

fn database_settings<F>(get: F) -> Result<DatabaseSettings, CatalogError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = get("DATABASE_URL") {
        return Ok(DatabaseSettings::Url(url));
    }

    let first = |keys: &[&str], default: &str| {
        keys.iter()
            .find_map(|key| get(key))
            .unwrap_or_else(|| default.to_string())
    };

    let port = match get("PGPORT") {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| CatalogError::Config(format!("PGPORT must be a port number, got '{raw}'")))?,
        None => 5432,
    };

    Ok(DatabaseSettings::Discrete {
        host: first(&["PGHOST"], "localhost"),
        port,
        user: first(&["PGUSER", "CAREERS_DB_USER", "POSTGRES_USER"], "careers"),
        password: first(
            &["PGPASSWORD", "CAREERS_DB_PASSWORD", "POSTGRES_PASSWORD"],
            "careers",
        ),
        database: first(&["PGDATABASE", "POSTGRES_DB"], "careers"),
        require_ssl: get("PGSSLMODE").as_deref() == Some("require"),
    })
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheScope, DEFAULT_QUOTA_BYTES, DEFAULT_TTL, MAX_ENTRY_BYTES};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  pub session: SessionConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the dues API (e.g. "https://dues.example.edu/api/v1")
  pub base_url: String,
  /// Transport timeout for every request
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

/// Dashboard role. Decides which overview is shown and scopes cache keys.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  #[default]
  SuperAdmin,
  CollegeAdmin,
  DepartmentAdmin,
  FinanceDirector,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::SuperAdmin => "super_admin",
      Role::CollegeAdmin => "college_admin",
      Role::DepartmentAdmin => "dept_admin",
      Role::FinanceDirector => "finance_director",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
  #[serde(default)]
  pub role: Role,
  pub college: Option<String>,
  pub department: Option<String>,
}

impl SessionConfig {
  /// Cache scope for this session.
  pub fn scope(&self) -> CacheScope {
    let mut scope = CacheScope::new(self.role.as_str());
    if let Some(college) = &self.college {
      scope = scope.with_college(college.clone());
    }
    if let Some(department) = &self.department {
      scope = scope.with_department(department.clone());
    }
    scope
  }

  /// Check that the role has the scope it needs.
  pub fn validate(&self) -> Result<()> {
    match self.role {
      Role::CollegeAdmin if self.college.is_none() => {
        Err(eyre!("session.college is required for the college_admin role"))
      }
      Role::DepartmentAdmin if self.department.is_none() => Err(eyre!(
        "session.department is required for the department_admin role"
      )),
      _ => Ok(()),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Disable to keep cache entries in memory only
  pub enabled: bool,
  /// Lifetime of every cached entry, shared by all domains
  pub ttl_secs: u64,
  pub max_entry_bytes: usize,
  pub quota_bytes: usize,
  /// Cache database location (default: $XDG_DATA_HOME/duesboard/cache.db)
  pub path: Option<PathBuf>,
  /// Cached entries this close to expiry are revalidated in the background
  pub grace_secs: u64,
  pub revalidate_delay_ms: u64,
  pub debounce_ms: u64,
  /// Prefetch the next page of paginated lists
  pub prefetch: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: DEFAULT_TTL.as_secs(),
      max_entry_bytes: MAX_ENTRY_BYTES,
      quota_bytes: DEFAULT_QUOTA_BYTES,
      path: None,
      grace_secs: 60,
      revalidate_delay_ms: 1000,
      debounce_ms: 400,
      prefetch: true,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./duesboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/duesboard/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/duesboard/config.yaml\n\
                 See duesboard.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("duesboard.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("duesboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.session.validate()?;
    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks DUESBOARD_API_TOKEN first, then DUES_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("DUESBOARD_API_TOKEN")
      .or_else(|_| std::env::var("DUES_API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set DUESBOARD_API_TOKEN or DUES_API_TOKEN environment variable.")
      })
  }
}

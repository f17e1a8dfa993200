use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info
};

pub const CONFIG_ENV: &str = "TASKDECK_CONFIG";
pub const API_URL_ENV: &str = "TASKDECK_API_URL";
pub const EMAIL_ENV: &str = "TASKDECK_EMAIL";

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub api_base_url:         String,
  pub request_timeout_secs: u64,
  pub toast_ttl_ms:         u64,
  pub table_page_size:      usize,
  pub data_dir:             Option<PathBuf>,
  pub email:                Option<String>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_base_url:         "http://localhost:8000/api"
        .to_string(),
      request_timeout_secs: 30,
      toast_ttl_ms:         5000,
      table_page_size:      10,
      data_dir:             None,
      email:                None
    }
  }
}

impl Config {
  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let cfg: Config = toml::from_str(text)
      .context("invalid taskdeck config")?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// Defaults, then the config file (explicit path, `$TASKDECK_CONFIG`,
  /// or the per-user file when it exists), then environment overrides.
  #[tracing::instrument(skip(path_override))]
  pub fn load(
    path_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = match resolve_config_path(
      path_override
    ) {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        let text = fs::read_to_string(&path)
          .with_context(|| {
            format!(
              "failed to read {}",
              path.display()
            )
          })?;
        Self::from_toml_str(&text)
          .with_context(|| {
            format!(
              "failed to parse {}",
              path.display()
            )
          })?
      }
      | None => {
        debug!(
          "no config file found; using \
           defaults"
        );
        Self::default()
      }
    };

    cfg.apply_env(|key| {
      std::env::var(key).ok()
    });
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn apply_env<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>
  {
    if let Some(url) = lookup(API_URL_ENV)
      .filter(|v| !v.trim().is_empty())
    {
      debug!(url = %url, "api url from environment");
      self.api_base_url = url;
    }
    if let Some(email) = lookup(EMAIL_ENV)
      .filter(|v| !v.trim().is_empty())
    {
      self.email = Some(email);
    }
  }

  /// `key=value` overrides from the command line. Keys are the TOML field
  /// names; unknown keys are an error.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      match key.as_str() {
        | "api_base_url" => {
          self.api_base_url = value
        }
        | "request_timeout_secs" => {
          self.request_timeout_secs =
            parse_number(&key, &value)?
        }
        | "toast_ttl_ms" => {
          self.toast_ttl_ms =
            parse_number(&key, &value)?
        }
        | "table_page_size" => {
          self.table_page_size =
            parse_number(&key, &value)?
        }
        | "data_dir" => {
          self.data_dir =
            Some(PathBuf::from(value))
        }
        | "email" => self.email = Some(value),
        | other => {
          return Err(anyhow!(
            "unknown config key: {other}"
          ));
        }
      }
    }
    self.validate()
  }

  pub fn toast_ttl(&self) -> Duration {
    Duration::from_millis(self.toast_ttl_ms)
  }

  /// Directory for local preferences, created on first use.
  #[tracing::instrument(skip(self))]
  pub fn resolve_data_dir(
    &self
  ) -> anyhow::Result<PathBuf> {
    let dir = match &self.data_dir {
      | Some(path) => expand_tilde(path),
      | None => dirs::data_local_dir()
        .map(|dir| dir.join("taskdeck"))
        .ok_or_else(|| {
          anyhow!(
            "cannot determine data \
             directory"
          )
        })?
    };

    if !dir.exists() {
      info!(dir = %dir.display(), "creating data directory");
      fs::create_dir_all(&dir)
        .with_context(|| {
          format!(
            "failed to create {}",
            dir.display()
          )
        })?;
    }
    Ok(dir)
  }

  fn validate(&self) -> anyhow::Result<()> {
    let url = self.api_base_url.trim();
    if !(url.starts_with("http://")
      || url.starts_with("https://"))
    {
      return Err(anyhow!(
        "api_base_url must be an http(s) \
         URL, got: {url}"
      ));
    }
    if self.table_page_size == 0 {
      return Err(anyhow!(
        "table_page_size must be at least 1"
      ));
    }
    Ok(())
  }
}

fn parse_number<N: std::str::FromStr>(
  key: &str,
  value: &str
) -> anyhow::Result<N> {
  value.trim().parse::<N>().map_err(|_| {
    anyhow!(
      "invalid value for {key}: {value}"
    )
  })
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(path) = std::env::var(CONFIG_ENV)
    && !path.trim().is_empty()
  {
    return Some(expand_tilde(Path::new(
      &path
    )));
  }

  dirs::config_dir()
    .map(|dir| {
      dir.join("taskdeck").join("config.toml")
    })
    .filter(|candidate| candidate.exists())
}

fn expand_tilde(path: &Path) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) = text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg = Config::from_toml_str(
      "api_base_url = \"https://tasks.example.com/api\"\n\
       toast_ttl_ms = 2500\n"
    )
    .expect("config");
    assert_eq!(
      cfg.api_base_url,
      "https://tasks.example.com/api"
    );
    assert_eq!(cfg.toast_ttl(), Duration::from_millis(2500));
    assert_eq!(cfg.table_page_size, 10);
    assert_eq!(cfg.request_timeout_secs, 30);
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let err = Config::from_toml_str("colour = \"on\"\n")
      .expect_err("unknown key");
    assert!(format!("{err:#}").contains("colour"));
  }

  #[test]
  fn env_then_cli_overrides() {
    let env: HashMap<&str, &str> = HashMap::from([
      (API_URL_ENV, "http://env.local/api"),
      (EMAIL_ENV, "env@example.com"),
    ]);
    let mut cfg = Config::default();
    cfg.apply_env(|key| env.get(key).map(|v| v.to_string()));
    assert_eq!(cfg.api_base_url, "http://env.local/api");

    cfg
      .apply_overrides([
        ("api_base_url".to_string(), "http://cli.local/api".to_string()),
        ("table_page_size".to_string(), "25".to_string()),
      ])
      .expect("overrides");
    assert_eq!(cfg.api_base_url, "http://cli.local/api");
    assert_eq!(cfg.table_page_size, 25);
    assert_eq!(cfg.email.as_deref(), Some("env@example.com"));
  }

  #[test]
  fn bad_overrides_fail() {
    let mut cfg = Config::default();
    assert!(
      cfg
        .apply_overrides([("nope".to_string(), "1".to_string())])
        .is_err()
    );
    assert!(
      cfg
        .apply_overrides([(
          "table_page_size".to_string(),
          "0".to_string()
        )])
        .is_err()
    );
    assert!(
      cfg
        .apply_overrides([(
          "api_base_url".to_string(),
          "localhost:8000".to_string()
        )])
        .is_err()
    );
  }

  #[test]
  fn explicit_data_dir_is_created() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("nested").join("prefs");
    let cfg = Config {
      data_dir: Some(target.clone()),
      ..Config::default()
    };
    let dir = cfg.resolve_data_dir().expect("data dir");
    assert_eq!(dir, target);
    assert!(dir.is_dir());
  }
}

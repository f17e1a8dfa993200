use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use tracing::{
  debug,
  warn
};

pub const THEME_KEY: &str = "theme";

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum Theme {
  #[default]
  Light,
  Dark
}

impl Theme {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Light => "light",
      | Self::Dark => "dark"
    }
  }

  pub fn toggle(self) -> Self {
    match self {
      | Self::Light => Self::Dark,
      | Self::Dark => Self::Light
    }
  }

  pub fn is_dark(self) -> bool {
    self == Self::Dark
  }
}

impl fmt::Display for Theme {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Theme {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      | "light" => Ok(Self::Light),
      | "dark" => Ok(Self::Dark),
      | other => {
        Err(anyhow::anyhow!(
          "unknown theme: {other}"
        ))
      }
    }
  }
}

/// Small string key/value store for user preferences: browser
/// `localStorage`, a JSON file, or memory in tests.
pub trait PreferenceStorage {
  fn load(&self, key: &str) -> Option<String>;

  fn save(
    &self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()>;
}

impl<S: PreferenceStorage + ?Sized> PreferenceStorage
  for Rc<S>
{
  fn load(&self, key: &str) -> Option<String> {
    (**self).load(key)
  }

  fn save(
    &self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    (**self).save(key, value)
  }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
  values: RefCell<HashMap<String, String>>
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl PreferenceStorage for MemoryStorage {
  fn load(&self, key: &str) -> Option<String> {
    self.values.borrow().get(key).cloned()
  }

  fn save(
    &self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    self
      .values
      .borrow_mut()
      .insert(key.to_string(), value.to_string());
    Ok(())
  }
}

/// The active theme, restored from storage on start and written back on
/// every change.
pub struct ThemeStore<S> {
  storage: S,
  theme:   Theme
}

impl<S: PreferenceStorage> ThemeStore<S> {
  /// A valid stored value wins; `system_prefers_dark` is only consulted
  /// when nothing usable is stored.
  #[tracing::instrument(skip_all)]
  pub fn load<F>(
    storage: S,
    system_prefers_dark: F
  ) -> Self
  where
    F: FnOnce() -> bool
  {
    let stored = storage
      .load(THEME_KEY)
      .and_then(|raw| match raw.parse::<Theme>() {
        | Ok(theme) => Some(theme),
        | Err(err) => {
          warn!(error = %err, "ignoring stored theme");
          None
        }
      });

    let theme = match stored {
      | Some(theme) => theme,
      | None if system_prefers_dark() => Theme::Dark,
      | None => Theme::Light
    };
    debug!(%theme, from_storage = stored.is_some(), "theme resolved");

    let store = Self { storage, theme };
    store.persist();
    store
  }

  pub fn theme(&self) -> Theme {
    self.theme
  }

  pub fn set(&mut self, theme: Theme) {
    self.theme = theme;
    self.persist();
  }

  pub fn toggle(&mut self) -> Theme {
    self.set(self.theme.toggle());
    self.theme
  }

  fn persist(&self) {
    if let Err(err) = self
      .storage
      .save(THEME_KEY, self.theme.as_str())
    {
      warn!(error = %err, "failed to persist theme");
    }
  }
}

#[cfg(feature = "cli")]
pub use file::FileStorage;

#[cfg(feature = "cli")]
mod file {
  use std::collections::BTreeMap;
  use std::fs;
  use std::io::Write;
  use std::path::{
    Path,
    PathBuf
  };

  use anyhow::{
    Context,
    anyhow
  };
  use tempfile::NamedTempFile;
  use tracing::{
    debug,
    warn
  };

  use super::PreferenceStorage;

  pub const PREFERENCES_FILE: &str =
    "preferences.json";

  /// Preferences as one JSON object in `<data_dir>/preferences.json`,
  /// replaced atomically on every save.
  #[derive(Debug, Clone)]
  pub struct FileStorage {
    path: PathBuf
  }

  impl FileStorage {
    pub fn new(data_dir: &Path) -> Self {
      Self {
        path: data_dir.join(PREFERENCES_FILE)
      }
    }

    pub fn path(&self) -> &Path {
      &self.path
    }

    fn read_all(
      &self
    ) -> anyhow::Result<BTreeMap<String, String>> {
      if !self.path.exists() {
        return Ok(BTreeMap::new());
      }
      let text = fs::read_to_string(&self.path)
        .with_context(|| {
          format!(
            "failed to read {}",
            self.path.display()
          )
        })?;
      if text.trim().is_empty() {
        return Ok(BTreeMap::new());
      }
      serde_json::from_str(&text).with_context(|| {
        format!(
          "failed to parse {}",
          self.path.display()
        )
      })
    }
  }

  impl PreferenceStorage for FileStorage {
    fn load(&self, key: &str) -> Option<String> {
      match self.read_all() {
        | Ok(mut values) => values.remove(key),
        | Err(err) => {
          warn!(error = %format!("{err:#}"), "preferences unreadable");
          None
        }
      }
    }

    #[tracing::instrument(skip(self, value), fields(file = %self.path.display()))]
    fn save(
      &self,
      key: &str,
      value: &str
    ) -> anyhow::Result<()> {
      let mut values =
        self.read_all().unwrap_or_default();
      values.insert(
        key.to_string(),
        value.to_string()
      );

      let dir = self
        .path
        .parent()
        .unwrap_or_else(|| Path::new("."));
      let mut temp = NamedTempFile::new_in(dir)?;
      serde_json::to_writer_pretty(
        &mut temp, &values
      )?;
      writeln!(temp)?;
      temp.flush()?;
      temp.persist(&self.path).map_err(|err| {
        anyhow!(
          "failed to persist {}: {}",
          self.path.display(),
          err
        )
      })?;
      debug!(count = values.len(), "preferences saved");
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;

  #[test]
  fn stored_value_wins_over_system() {
    let storage = Rc::new(MemoryStorage::new());
    storage.save(THEME_KEY, "dark").expect("save");
    let consulted = Cell::new(false);
    let store = ThemeStore::load(storage, || {
      consulted.set(true);
      false
    });
    assert_eq!(store.theme(), Theme::Dark);
    assert!(!consulted.get());
  }

  #[test]
  fn system_preference_used_when_nothing_valid_stored() {
    let storage = Rc::new(MemoryStorage::new());
    storage.save(THEME_KEY, "sepia").expect("save");
    let store = ThemeStore::load(storage.clone(), || true);
    assert_eq!(store.theme(), Theme::Dark);
    assert_eq!(storage.load(THEME_KEY).as_deref(), Some("dark"));
  }

  #[test]
  fn toggle_persists_across_reload() {
    let storage = Rc::new(MemoryStorage::new());
    let mut store = ThemeStore::load(storage.clone(), || false);
    assert_eq!(store.theme(), Theme::Light);
    assert_eq!(store.toggle(), Theme::Dark);

    let reloaded = ThemeStore::load(storage, || false);
    assert_eq!(reloaded.theme(), Theme::Dark);
  }

  #[cfg(feature = "cli")]
  #[test]
  fn file_storage_round_trips_and_keeps_other_keys() {
    let temp = tempfile::tempdir().expect("tempdir");
    let storage = FileStorage::new(temp.path());
    assert_eq!(storage.load(THEME_KEY), None);

    storage.save("density", "compact").expect("save");
    let mut store = ThemeStore::load(storage.clone(), || false);
    store.set(Theme::Dark);

    let reopened = FileStorage::new(temp.path());
    assert_eq!(reopened.load(THEME_KEY).as_deref(), Some("dark"));
    assert_eq!(reopened.load("density").as_deref(), Some("compact"));
  }
}

use anyhow::anyhow;
use taskdeck_core::theme::{
  PreferenceStorage,
  Theme
};

const DARK_SCHEME_QUERY: &str =
  "(prefers-color-scheme: dark)";

/// Preferences in the browser's `localStorage`, stored as plain strings.
pub struct LocalStorage;

fn local_storage() -> Option<web_sys::Storage> {
  web_sys::window().and_then(|window| {
    window
      .local_storage()
      .ok()
      .flatten()
  })
}

impl PreferenceStorage for LocalStorage {
  fn load(&self, key: &str) -> Option<String> {
    local_storage().and_then(|storage| {
      storage.get_item(key).ok().flatten()
    })
  }

  fn save(
    &self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let storage = local_storage().ok_or_else(
      || anyhow!("localStorage is unavailable")
    )?;
    storage.set_item(key, value).map_err(
      |err| {
        anyhow!(
          "localStorage write failed: {err:?}"
        )
      }
    )
  }
}

pub fn system_prefers_dark() -> bool {
  web_sys::window()
    .and_then(|window| {
      window
        .match_media(DARK_SCHEME_QUERY)
        .ok()
        .flatten()
    })
    .is_some_and(|query| query.matches())
}

/// Mirrors the theme onto `<html>`: the `data-theme` attribute and the
/// `dark` class.
pub fn apply_theme(theme: Theme) {
  let Some(root) = web_sys::window()
    .and_then(|window| window.document())
    .and_then(|document| {
      document.document_element()
    })
  else {
    return;
  };

  if let Err(err) = root
    .set_attribute("data-theme", theme.as_str())
  {
    tracing::warn!(?err, "failed to set data-theme");
  }
  if let Err(err) = root
    .class_list()
    .toggle_with_force("dark", theme.is_dark())
  {
    tracing::warn!(?err, "failed to toggle dark class");
  }
}

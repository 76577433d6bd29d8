use std::collections::HashMap;
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
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::api::{
  ClientSettings,
  DEFAULT_API_URL
};
use crate::auth::DEFAULT_AUTH_URL;
use crate::datetime::{
  DEFAULT_TIMEZONE,
  parse_timezone
};

const RC_ENV_VAR: &str = "TASKDESKRC";
const RC_FILE_NAME: &str =
  ".taskdeskrc";
const DEFAULT_DATA_DIR: &str =
  "~/.taskdesk";

const DEFAULTS: [(&str, &str); 5] = [
  ("api.url", DEFAULT_API_URL),
  ("auth.url", DEFAULT_AUTH_URL),
  ("data.location", DEFAULT_DATA_DIR),
  ("color", "on"),
  ("timezone", DEFAULT_TIMEZONE)
];

/// One meaningful line of an rc file.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

/// Parses a line, dropping `#` comments. Blank lines yield `None`.
fn parse_rc_line(
  raw: &str
) -> Result<Option<RcLine<'_>>, String> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(None);
  }
  if let Some(path) =
    line.strip_prefix("include ")
  {
    return Ok(Some(RcLine::Include(
      path.trim()
    )));
  }
  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(Some(RcLine::Setting(
        key.trim(),
        value.trim()
      )))
    }
    | _ => Err(format!(
      "expected `key = value` or \
       `include <path>`, got: {line}"
    ))
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map: DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();
    match rc_path(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "loading rc file");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!("no rc file; using defaults")
      }
    }
    Ok(cfg)
  }

  /// `--rc` overrides. A leading `rc.` on the key is accepted.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .map(str::to_string)
        .unwrap_or(key);
      debug!(key = %key, value = %value, "applying override");
      self.map.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  fn required(
    &self,
    key: &str
  ) -> anyhow::Result<String> {
    self
      .get(key)
      .filter(|v| !v.trim().is_empty())
      .ok_or_else(|| {
        anyhow!("{key} is not set")
      })
  }

  /// Whether colored output is wanted. Unknown words are an error rather
  /// than silently off.
  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    let raw = self
      .get("color")
      .unwrap_or_else(|| "on".into());
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        Ok(true)
      }
      | "off" | "no" | "false" | "0" => {
        Ok(false)
      }
      | other => Err(anyhow!(
        "invalid color setting: {other}"
      ))
    }
  }

  pub fn timezone(
    &self
  ) -> anyhow::Result<Tz> {
    parse_timezone(
      &self.get("timezone").unwrap_or_else(
        || DEFAULT_TIMEZONE.to_string()
      )
    )
  }

  /// `http.timeout` in seconds. Unset or `0` means no timeout.
  pub fn http_timeout(
    &self
  ) -> anyhow::Result<Option<Duration>> {
    let Some(raw) =
      self.get("http.timeout")
    else {
      return Ok(None);
    };
    let secs: u64 =
      raw.trim().parse().with_context(
        || {
          format!(
            "invalid http.timeout: \
             {raw}"
          )
        }
      )?;
    Ok(
      (secs > 0)
        .then(|| Duration::from_secs(secs))
    )
  }

  pub fn client_settings(
    &self
  ) -> anyhow::Result<ClientSettings> {
    Ok(ClientSettings {
      api_url: self.required("api.url")?,
      timeout: self.http_timeout()?
    })
  }

  pub fn auth_url(
    &self
  ) -> anyhow::Result<String> {
    self.required("auth.url")
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());
    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for (idx, raw) in
      text.lines().enumerate()
    {
      let parsed = parse_rc_line(raw)
        .map_err(|msg| {
          anyhow!(
            "{}:{}: {msg}",
            path.display(),
            idx + 1
          )
        })?;
      match parsed {
        | None => {}
        | Some(RcLine::Setting(
          key,
          value
        )) => {
          trace!(key, value, "rc setting");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | Some(RcLine::Include(
          target
        )) => {
          let target = base_dir
            .join(expand_tilde(
              Path::new(target)
            ));
          if self
            .loaded_files
            .contains(&target)
          {
            warn!(include = %target.display(), "include cycle; skipping");
          } else if target.exists() {
            self.load_file(&target)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
      }
    }
    Ok(())
  }
}

/// `--data` wins, then `data.location`.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_dir {
    return Ok(path.to_path_buf());
  }
  let configured = cfg
    .get("data.location")
    .unwrap_or_else(|| {
      DEFAULT_DATA_DIR.to_string()
    });
  let path =
    expand_tilde(Path::new(&configured));
  if path.starts_with("~") {
    return Err(anyhow!(
      "cannot determine home \
       directory for {configured}"
    ));
  }
  Ok(path)
}

/// `--taskdeskrc`, then `$TASKDESKRC` (`/dev/null` disables), then
/// `~/.taskdeskrc` if present.
fn rc_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }
  if let Ok(env) =
    std::env::var(RC_ENV_VAR)
  {
    return (env != "/dev/null")
      .then(|| PathBuf::from(env));
  }
  dirs::home_dir()
    .map(|home| home.join(RC_FILE_NAME))
    .filter(|candidate| {
      candidate.exists()
    })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

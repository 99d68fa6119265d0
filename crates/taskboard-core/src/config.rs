use std::collections::{
  BTreeMap,
  HashSet
};
use std::fmt;
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
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const DEFAULT_API_URL: &str =
  "http://localhost:5000";
const DEFAULT_API_TIMEOUT_SECS: u64 =
  10;
const DEFAULT_DATA_LOCATION: &str =
  "~/.taskboard";
const RC_ENV: &str = "TASKBOARDRC";
const RC_FILE_NAME: &str =
  ".taskboardrc";

/// Where a setting's current value
/// came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
  Default,
  File {
    path: PathBuf,
    line: usize
  },
  CommandLine
}

impl fmt::Display for Origin {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Origin::Default => {
        f.write_str("default")
      }
      | Origin::File { path, line } => {
        write!(
          f,
          "{}:{line}",
          path.display()
        )
      }
      | Origin::CommandLine => {
        f.write_str("command line")
      }
    }
  }
}

#[derive(Debug, Clone)]
struct Setting {
  value:  String,
  origin: Origin
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum ColorMode {
  /// Color when stdout is a terminal.
  Auto,
  Never
}

/// Client settings layered as
/// defaults, then rc files in include
/// order, then `--rc` overrides.
#[derive(Debug, Clone)]
pub struct Config {
  settings:         BTreeMap<
    String,
    Setting
  >,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let timeout =
      DEFAULT_API_TIMEOUT_SECS
        .to_string();
    let settings = [
      (
        "data.location",
        DEFAULT_DATA_LOCATION
      ),
      ("api.url", DEFAULT_API_URL),
      ("api.timeout", timeout.as_str()),
      ("color", "on")
    ]
    .into_iter()
    .map(|(key, value)| {
      (key.to_string(), Setting {
        value:  value.to_string(),
        origin: Origin::Default
      })
    })
    .collect();

    Self {
      settings,
      loaded_files: Vec::new()
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

    match resolve_rc_path(rc_override)? {
      | Some(path) => {
        info!(rc = %path.display(), "loading taskboardrc");
        cfg.read_rc_tree(&path)?;
      }
      | None => {
        debug!(
          "no taskboardrc found; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  /// `--rc key=value` pairs. A leading
  /// `rc.` on the key is ignored.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw_key, value) in overrides {
      let key = raw_key
        .strip_prefix("rc.")
        .unwrap_or(&raw_key)
        .to_string();
      debug!(key = %key, value = %value, "applying override");
      self.settings.insert(key, Setting {
        value,
        origin: Origin::CommandLine
      });
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self
      .settings
      .get(key)
      .map(|setting| {
        setting.value.as_str()
      })
  }

  pub fn origin(
    &self,
    key: &str
  ) -> Option<&Origin> {
    self
      .settings
      .get(key)
      .map(|setting| &setting.origin)
  }

  pub fn api_url(&self) -> String {
    self
      .get("api.url")
      .map(str::trim)
      .filter(|url| !url.is_empty())
      .unwrap_or(DEFAULT_API_URL)
      .to_string()
  }

  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let raw = self
      .get("api.timeout")
      .unwrap_or_default()
      .trim();
    if raw.is_empty() {
      return Ok(Duration::from_secs(
        DEFAULT_API_TIMEOUT_SECS
      ));
    }

    match raw.parse::<u64>() {
      | Ok(0) => {
        Err(anyhow!(
          "api.timeout must be at \
           least one second ({})",
          self.describe("api.timeout")
        ))
      }
      | Ok(secs) => {
        Ok(Duration::from_secs(secs))
      }
      | Err(err) => {
        Err(anyhow!(
          "invalid api.timeout {raw:?} \
           ({}): {err}",
          self.describe("api.timeout")
        ))
      }
    }
  }

  pub fn color_mode(
    &self
  ) -> anyhow::Result<ColorMode> {
    let raw = self
      .get("color")
      .unwrap_or("on")
      .trim()
      .to_ascii_lowercase();
    match raw.as_str() {
      | "on" | "yes" | "true" | "1"
      | "auto" => Ok(ColorMode::Auto),
      | "off" | "no" | "false" | "0" => {
        Ok(ColorMode::Never)
      }
      | other => {
        Err(anyhow!(
          "invalid color setting \
           {other:?} ({})",
          self.describe("color")
        ))
      }
    }
  }

  fn describe(
    &self,
    key: &str
  ) -> String {
    self
      .origin(key)
      .map(|origin| {
        format!("set by {origin}")
      })
      .unwrap_or_else(|| {
        "unset".to_string()
      })
  }

  /// Reads `root`, then the files it
  /// includes, depth first and each at
  /// most once. An included file is
  /// read after the whole file naming
  /// it, so its values win.
  fn read_rc_tree(
    &mut self,
    root: &Path
  ) -> anyhow::Result<()> {
    let mut pending =
      vec![expand_tilde(root)];
    let mut seen = HashSet::new();

    while let Some(path) = pending.pop()
    {
      let canonical =
        fs::canonicalize(&path)
          .unwrap_or_else(|_| {
            path.clone()
          });
      if !seen.insert(canonical) {
        warn!(file = %path.display(), "include cycle; skipping repeat");
        continue;
      }

      let text =
        fs::read_to_string(&path)
          .with_context(|| {
            format!(
              "failed to read {}",
              path.display()
            )
          })?;
      self.loaded_files.push(path.clone());

      let mut includes = Vec::new();
      for (idx, raw_line) in
        text.lines().enumerate()
      {
        match parse_rc_line(raw_line)
          .with_context(|| {
            format!(
              "{}:{}",
              path.display(),
              idx + 1
            )
          })? {
          | RcLine::Blank => {}
          | RcLine::Include(target) => {
            let target = include_target(
              &path, target
            );
            if target.exists() {
              includes.push(target);
            } else {
              warn!(include = %target.display(), "include file does not exist; skipping");
            }
          }
          | RcLine::Entry(key, value) => {
            trace!(key, value, "loaded config key");
            self.settings.insert(
              key.to_string(),
              Setting {
                value:  value.to_string(),
                origin: Origin::File {
                  path: path.clone(),
                  line: idx + 1
                }
              }
            );
          }
        }
      }

      // Later includes are pushed first
      // so the first one is read next.
      pending.extend(
        includes.into_iter().rev()
      );
    }

    Ok(())
  }
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Entry(&'a str, &'a str)
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<RcLine<'_>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();

  if line.is_empty() {
    return Ok(RcLine::Blank);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      return Err(anyhow!(
        "include path cannot be empty"
      ));
    }
    return Ok(RcLine::Include(target));
  }

  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(RcLine::Entry(
        key.trim(),
        value.trim()
      ))
    }
    | _ => {
      Err(anyhow!(
        "expected `key = value`, got \
         {raw:?}"
      ))
    }
  }
}

fn include_target(
  including: &Path,
  target: &str
) -> PathBuf {
  let expanded =
    expand_tilde(Path::new(target));
  if expanded.is_absolute() {
    return expanded;
  }
  including
    .parent()
    .unwrap_or_else(|| Path::new("."))
    .join(expanded)
}

/// `--data`, else `data.location`.
/// Creates the directory when missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    | Some(path) => path.to_path_buf(),
    | None => {
      let location = cfg
        .get("data.location")
        .map(str::trim)
        .filter(|loc| !loc.is_empty())
        .unwrap_or(
          DEFAULT_DATA_LOCATION
        );
      if location.starts_with("~/")
        && dirs::home_dir().is_none()
      {
        return Err(anyhow!(
          "cannot determine home \
           directory for {location}"
        ));
      }
      expand_tilde(Path::new(location))
    }
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

/// `--config`, then `$TASKBOARDRC`
/// (`/dev/null` disables rc files),
/// then `~/.taskboardrc` if present.
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(from_env) =
    std::env::var_os(RC_ENV)
  {
    if from_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      from_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       ~/.taskboardrc"
    );
    return Ok(None);
  };

  Ok(
    Some(home.join(RC_FILE_NAME))
      .filter(|path| path.exists())
  )
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

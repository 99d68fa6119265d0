//! Default dates and times for new
//! tasks.
//!
//! The board zone comes from
//! `$TASKBOARD_TIMEZONE`, else a
//! `taskboard-time.toml` (path in
//! `$TASKBOARD_TIME_CONFIG`, or the
//! working directory), else the system
//! local zone.

use std::fmt;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Local,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const ZONE_ENV: &str =
  "TASKBOARD_TIMEZONE";
const ZONE_FILE_ENV: &str =
  "TASKBOARD_TIME_CONFIG";
const ZONE_FILE_NAME: &str =
  "taskboard-time.toml";

/// `2026-03-01`
pub const TASK_DATE_FORMAT: &str =
  "%Y-%m-%d";
/// `09:05 PM`
pub const TASK_TIME_FORMAT: &str =
  "%I:%M %p";

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum BoardZone {
  Named(Tz),
  Local
}

/// Date and time strings as a task
/// stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStamp {
  pub date: String,
  pub time: String
}

impl BoardZone {
  pub fn stamp(
    self,
    now: DateTime<Utc>
  ) -> TaskStamp {
    match self {
      | BoardZone::Named(tz) => {
        stamp_in(now, &tz)
      }
      | BoardZone::Local => {
        stamp_in(now, &Local)
      }
    }
  }
}

impl fmt::Display for BoardZone {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | BoardZone::Named(tz) => {
        f.write_str(tz.name())
      }
      | BoardZone::Local => {
        f.write_str("local")
      }
    }
  }
}

pub fn stamp_in<Z: TimeZone>(
  now: DateTime<Utc>,
  zone: &Z
) -> TaskStamp
where
  Z::Offset: fmt::Display
{
  let local = now.with_timezone(zone);
  TaskStamp {
    date: local
      .format(TASK_DATE_FORMAT)
      .to_string(),
    time: local
      .format(TASK_TIME_FORMAT)
      .to_string()
  }
}

/// Resolved once per process.
pub fn board_zone() -> BoardZone {
  static ZONE: OnceLock<BoardZone> =
    OnceLock::new();
  *ZONE.get_or_init(|| {
    let zone = resolve_zone(
      std::env::var(ZONE_ENV).ok(),
      zone_file()
    );
    tracing::debug!(%zone, "board timezone");
    zone
  })
}

pub fn default_task_stamp(
  now: DateTime<Utc>
) -> TaskStamp {
  board_zone().stamp(now)
}

#[derive(Debug)]
enum ZoneSource {
  Env,
  File(PathBuf)
}

impl fmt::Display for ZoneSource {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | ZoneSource::Env => {
        f.write_str(ZONE_ENV)
      }
      | ZoneSource::File(path) => {
        write!(f, "{}", path.display())
      }
    }
  }
}

fn zone_file() -> Option<PathBuf> {
  std::env::var(ZONE_FILE_ENV)
    .ok()
    .map(|raw| raw.trim().to_string())
    .filter(|raw| !raw.is_empty())
    .map(PathBuf::from)
    .or_else(|| {
      std::env::current_dir()
        .ok()
        .map(|dir| {
          dir.join(ZONE_FILE_NAME)
        })
    })
}

fn resolve_zone(
  from_env: Option<String>,
  file: Option<PathBuf>
) -> BoardZone {
  let candidates = from_env
    .map(|name| (name, ZoneSource::Env))
    .into_iter()
    .chain(file.and_then(|path| {
      read_zone_file(&path)
        .map(|name| {
          (name, ZoneSource::File(path))
        })
    }));

  for (name, source) in candidates {
    if let Some(tz) =
      parse_zone(&name, &source)
    {
      return BoardZone::Named(tz);
    }
  }
  BoardZone::Local
}

fn read_zone_file(
  path: &Path
) -> Option<String> {
  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err)
      if err.kind()
        == std::io::ErrorKind::NotFound =>
    {
      return None;
    }
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone file"
      );
      return None;
    }
  };

  match zone_name_from_toml(&raw) {
    | Ok(Some(name)) => Some(name),
    | Ok(None) => {
      tracing::warn!(
        file = %path.display(),
        "timezone file names no zone"
      );
      None
    }
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone file"
      );
      None
    }
  }
}

/// Accepts `timezone = ".."` at the
/// top level or under `[time]`.
fn zone_name_from_toml(
  raw: &str
) -> Result<Option<String>, toml::de::Error>
{
  #[derive(Deserialize)]
  struct ZoneFile {
    timezone: Option<String>,
    time:     Option<TimeTable>
  }

  #[derive(Deserialize)]
  struct TimeTable {
    timezone: Option<String>
  }

  let file: ZoneFile =
    toml::from_str(raw)?;
  Ok(file.timezone.or(
    file.time.and_then(|t| t.timezone)
  ))
}

fn parse_zone(
  name: &str,
  source: &ZoneSource
) -> Option<Tz> {
  let name = name.trim();
  if name.is_empty() {
    tracing::warn!(%source, "empty timezone; ignoring");
    return None;
  }
  name
    .parse::<Tz>()
    .inspect(|_| {
      tracing::info!(%source, timezone = name, "using board timezone");
    })
    .inspect_err(|err| {
      tracing::warn!(%source, timezone = name, error = %err, "unknown timezone; ignoring");
    })
    .ok()
}

#[cfg(test)]
mod tests {
  use std::fs;

  use chrono::{
    TimeZone,
    Utc
  };
  use tempfile::tempdir;

  use super::{
    BoardZone,
    TaskStamp,
    resolve_zone,
    stamp_in,
    zone_name_from_toml
  };

  #[test]
  fn stamps_date_and_twelve_hour_time()
  {
    let now = Utc
      .with_ymd_and_hms(
        2026, 3, 1, 21, 5, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      stamp_in(now, &Utc),
      TaskStamp {
        date: "2026-03-01".to_string(),
        time: "09:05 PM".to_string()
      }
    );
  }

  #[test]
  fn date_follows_the_zone_not_utc() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 3, 2, 3, 0, 0
      )
      .single()
      .expect("valid now");
    let stamp = BoardZone::Named(
      chrono_tz::America::New_York
    )
    .stamp(now);
    assert_eq!(stamp.date, "2026-03-01");
    assert_eq!(stamp.time, "10:00 PM");
  }

  #[test]
  fn reads_zone_from_either_toml_shape()
  {
    assert_eq!(
      zone_name_from_toml(
        "timezone = \"Europe/Berlin\""
      )
      .expect("flat"),
      Some("Europe/Berlin".to_string())
    );
    assert_eq!(
      zone_name_from_toml(
        "[time]\ntimezone = \"Asia/Tokyo\""
      )
      .expect("section"),
      Some("Asia/Tokyo".to_string())
    );
    assert_eq!(
      zone_name_from_toml("")
        .expect("empty"),
      None
    );
  }

  #[test]
  fn env_wins_then_file_then_local() {
    let dir = tempdir().expect("tempdir");
    let file =
      dir.path().join("zone.toml");
    fs::write(
      &file,
      "timezone = \"Asia/Tokyo\"\n"
    )
    .expect("write zone file");

    assert_eq!(
      resolve_zone(
        Some("UTC".to_string()),
        Some(file.clone())
      ),
      BoardZone::Named(chrono_tz::UTC)
    );
    assert_eq!(
      resolve_zone(
        Some("Mars/Olympus".to_string()),
        Some(file.clone())
      ),
      BoardZone::Named(
        chrono_tz::Asia::Tokyo
      )
    );
    assert_eq!(
      resolve_zone(
        None,
        Some(dir.path().join("missing"))
      ),
      BoardZone::Local
    );
  }
}

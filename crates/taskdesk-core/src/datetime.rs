use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  TimeDelta,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

pub const DEFAULT_TIMEZONE: &str =
  "UTC";

/// Serializes an instant the way the backend expects it: UTC with
/// millisecond precision and a `Z` suffix.
#[must_use]
pub fn format_wire(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

/// Reads a wire date. Offsets are honoured, naive date-times and bare dates
/// are taken as UTC, and empty or unrecognized strings read as absent.
#[must_use]
pub fn parse_wire(
  raw: &str
) -> Option<DateTime<Utc>> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(dt.with_timezone(&Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(ndt.and_utc());
    }
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .ok()
  .and_then(|date| {
    date.and_hms_opt(0, 0, 0)
  })
  .map(|ndt| ndt.and_utc())
}

pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "timezone setting is empty"
    ));
  }
  trimmed.parse::<Tz>().map_err(|err| {
    anyhow!(
      "invalid timezone {trimmed}: \
       {err}"
    )
  })
}

#[must_use]
pub fn format_display_date(
  dt: DateTime<Utc>,
  tz: Tz
) -> String {
  dt.with_timezone(&tz)
    .format("%Y-%m-%d")
    .to_string()
}

#[must_use]
pub fn format_display_datetime(
  dt: DateTime<Utc>,
  tz: Tz
) -> String {
  dt.with_timezone(&tz)
    .format("%Y-%m-%d %H:%M %Z")
    .to_string()
}

fn to_utc_from_local(
  local_naive: NaiveDateTime,
  tz: Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      Ok(
        first
          .min(second)
          .with_timezone(&Utc)
      )
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in timezone {tz}: \
         {context}"
      ))
    }
  }
}

fn local_midnight(
  date: NaiveDate,
  tz: Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {context}"
      )
    })?;
  to_utc_from_local(
    midnight, tz, context
  )
}

/// Parses a user-entered date for filter bounds and task due dates.
#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      let today = now
        .with_timezone(&tz)
        .date_naive();
      return local_midnight(
        today, tz, "today"
      );
    }
    | "tomorrow" => {
      return Ok(
        parse_date_expr(
          "today", now, tz
        )? + Duration::days(1)
      );
    }
    | "yesterday" => {
      return Ok(
        parse_date_expr(
          "today", now, tz
        )? - Duration::days(1)
      );
    }
    | _ => {}
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[wdhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let duration = match &caps["unit"] {
      | "w" => TimeDelta::try_weeks(num),
      | "d" => TimeDelta::try_days(num),
      | "h" => TimeDelta::try_hours(num),
      | "m" => TimeDelta::try_minutes(num),
      | unit => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    let shifted = duration.and_then(
      |duration| {
        if &caps["sign"] == "-" {
          now.checked_sub_signed(duration)
        } else {
          now.checked_add_signed(duration)
        }
      }
    );
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative offset out of \
         range: {token}"
      )
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return local_midnight(
      date, tz, "date"
    );
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return to_utc_from_local(
        ndt, tz, fmt
      );
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     +Nw/+Nd/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM"
  })
}

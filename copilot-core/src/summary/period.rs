//! Summary periods and their time windows.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    #[default]
    Daily,
    /// Yesterday and today, for a stand-up update
    Standup,
    Weekly,
    Monthly,
    Custom,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Daily => "daily",
            SummaryKind::Standup => "standup",
            SummaryKind::Weekly => "weekly",
            SummaryKind::Monthly => "monthly",
            SummaryKind::Custom => "custom",
        }
    }
}

/// Half-open `[start, end)` window a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SummaryWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Window for `kind` ending at `now`. Custom windows need both dates and
    /// include the whole end day.
    pub fn resolve(
        kind: SummaryKind,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let today = now.with_timezone(&Local).date_naive();
        let end = now + Duration::seconds(1);
        let start = match kind {
            SummaryKind::Daily => local_midnight(today)?,
            SummaryKind::Standup => local_midnight(today - Duration::days(1))?,
            SummaryKind::Weekly => local_midnight(today - Duration::days(6))?,
            SummaryKind::Monthly => local_midnight(today - Duration::days(29))?,
            SummaryKind::Custom => {
                let (Some(from), Some(to)) = (start_date, end_date) else {
                    return Err(Error::InvalidInput(
                        "custom summaries need a start and end date".to_string(),
                    ));
                };
                if from > to {
                    return Err(Error::InvalidInput(
                        "start date is after end date".to_string(),
                    ));
                }
                return Ok(Self {
                    start: local_midnight(from)?,
                    end: local_midnight(to + Duration::days(1))?,
                });
            }
        };
        Ok(Self { start, end })
    }

    pub fn label(&self, kind: SummaryKind) -> String {
        let from = self.start.with_timezone(&Local).date_naive();
        let to = (self.end - Duration::seconds(1))
            .with_timezone(&Local)
            .date_naive();
        match kind {
            SummaryKind::Daily => format!("Today ({})", from),
            SummaryKind::Standup => format!("Since yesterday ({})", from),
            _ if from == to => from.to_string(),
            _ => format!("{} to {}", from, to),
        }
    }
}

pub(crate) fn local_midnight(day: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidInput(format!("invalid date {}", day)))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidInput(format!("no local midnight on {}", day)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_windows_end_now() {
        let now = Utc::now();
        for kind in [SummaryKind::Daily, SummaryKind::Standup, SummaryKind::Weekly, SummaryKind::Monthly] {
            let window = SummaryWindow::resolve(kind, None, None, now).unwrap();
            assert!(window.contains(now), "{:?}", kind);
            assert!(window.start <= now);
        }
        let daily = SummaryWindow::resolve(SummaryKind::Daily, None, None, now).unwrap();
        let weekly = SummaryWindow::resolve(SummaryKind::Weekly, None, None, now).unwrap();
        assert!(weekly.start < daily.start);
    }

    #[test]
    fn test_custom_window() {
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let window = SummaryWindow::resolve(SummaryKind::Custom, Some(from), Some(to), Utc::now()).unwrap();
        let last_day = local_midnight(to).unwrap() + Duration::hours(12);
        assert!(window.contains(last_day));
        assert!(!window.contains(local_midnight(to + Duration::days(1)).unwrap()));
        assert_eq!(window.label(SummaryKind::Custom), "2026-03-01 to 2026-03-03");

        assert!(SummaryWindow::resolve(SummaryKind::Custom, Some(to), Some(from), Utc::now()).is_err());
        assert!(SummaryWindow::resolve(SummaryKind::Custom, None, Some(to), Utc::now()).is_err());
    }

    #[test]
    fn test_kind_wire_names() {
        let kind: SummaryKind = serde_json::from_str("\"standup\"").unwrap();
        assert_eq!(kind, SummaryKind::Standup);
        assert_eq!(kind.as_str(), "standup");
    }
}

//! Forecast cycle identification.

use chrono::{DateTime, Duration, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Spacing between synoptic model runs, in hours.
pub const CYCLE_STEP_HOURS: i64 = 6;

/// One published model run: the reference (analysis) time of the cycle plus
/// the forecast-hour offset of the frame this job consumes.
///
/// Immutable once resolved; downstream stages only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastCycle {
    /// Cycle reference time, always on a 6-hour boundary.
    pub reference_time: DateTime<Utc>,
    /// Offset of the consumed frame from the reference time.
    pub forecast_hour: u32,
}

impl ForecastCycle {
    pub fn new(reference_time: DateTime<Utc>, forecast_hour: u32) -> Self {
        Self {
            reference_time,
            forecast_hour,
        }
    }

    /// The analysis frame of a cycle (forecast hour 0).
    pub fn analysis(reference_time: DateTime<Utc>) -> Self {
        Self::new(reference_time, 0)
    }

    /// Most recent synoptic boundary (00/06/12/18Z) at or before `now`.
    pub fn floor_to_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = now.hour() as i64;
        let excess = Duration::hours(hour % CYCLE_STEP_HOURS)
            + Duration::minutes(now.minute() as i64)
            + Duration::seconds(now.second() as i64)
            + Duration::nanoseconds(now.nanosecond() as i64);
        now - excess
    }

    /// The cycle `steps` 6-hour boundaries earlier, same forecast hour.
    pub fn step_back(&self, steps: u32) -> Self {
        Self {
            reference_time: self.reference_time
                - Duration::hours(CYCLE_STEP_HOURS * steps as i64),
            forecast_hour: self.forecast_hour,
        }
    }

    /// Run hour of the cycle (0, 6, 12, or 18).
    pub fn cycle_hour(&self) -> u32 {
        self.reference_time.hour()
    }

    /// Compact cycle date, e.g. "20240301". Used in upstream directory paths.
    pub fn date_compact(&self) -> String {
        self.reference_time.format("%Y%m%d").to_string()
    }

    /// Wall-clock time the consumed frame is valid for.
    pub fn valid_datetime(&self) -> DateTime<Utc> {
        self.reference_time + Duration::hours(self.forecast_hour as i64)
    }

    /// Reference time as a second-precision ISO-8601 string with Z suffix.
    pub fn iso8601(&self) -> String {
        self.reference_time
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_floor_lands_on_synoptic_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 14, 37, 22).unwrap();
        let floored = ForecastCycle::floor_to_boundary(now);
        assert_eq!(floored, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_floor_is_identity_on_boundary() {
        let boundary = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        assert_eq!(ForecastCycle::floor_to_boundary(boundary), boundary);
    }

    #[test]
    fn test_floor_just_before_midnight_cycle() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 5, 59, 59).unwrap();
        let floored = ForecastCycle::floor_to_boundary(now);
        assert_eq!(floored, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_step_back_crosses_midnight() {
        let cycle =
            ForecastCycle::analysis(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let earlier = cycle.step_back(1);
        assert_eq!(
            earlier.reference_time,
            Utc.with_ymd_and_hms(2024, 2, 29, 18, 0, 0).unwrap()
        );
        assert_eq!(earlier.date_compact(), "20240229");
        assert_eq!(earlier.cycle_hour(), 18);
    }

    #[test]
    fn test_iso8601_formatting() {
        let cycle =
            ForecastCycle::analysis(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(cycle.iso8601(), "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_valid_datetime_applies_offset() {
        let cycle =
            ForecastCycle::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(), 6);
        assert_eq!(
            cycle.valid_datetime(),
            Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
        );
    }
}

//! Recurring session generation.
//!
//! Expands a date range and a set of weekdays into concrete sessions. The
//! walk is bounded by [`MAX_ITERATIONS`] days and by the end of the current
//! calendar year so a malformed request cannot produce a runaway schedule.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Session;
use super::schedule::TimeOfDay;
use crate::error::GatewayError;

/// Hard stop on the number of calendar days walked.
pub const MAX_ITERATIONS: usize = 370;

/// Weekly recurrence rule for generating sessions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecurrenceRequest {
    /// First day (inclusive).
    pub start_date: NaiveDate,
    /// Last day (inclusive).
    pub end_date: NaiveDate,
    /// Start time of every generated session.
    pub start_time: TimeOfDay,
    /// End time of every generated session.
    pub end_time: TimeOfDay,
    /// Capacity of every generated session.
    pub capacity: u32,
    /// Selected weekdays, `0` = Sunday through `6` = Saturday.
    pub weekdays: Vec<u8>,
}

impl RecurrenceRequest {
    /// Validates the rule against the optional parent span and the
    /// current-year limit derived from `today`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for an empty or out-of-range
    ///   weekday set, an inverted time window or zero capacity.
    /// - [`GatewayError::InvalidDateRange`] when the end precedes the start,
    ///   the range leaves the parent span, or the end passes 31 December of
    ///   the current year.
    pub fn validate(
        &self,
        parent_span: Option<(NaiveDate, NaiveDate)>,
        today: NaiveDate,
    ) -> Result<(), GatewayError> {
        if self.weekdays.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "select at least one weekday".to_string(),
            ));
        }
        if let Some(bad) = self.weekdays.iter().find(|&&d| d > 6) {
            return Err(GatewayError::InvalidRequest(format!(
                "weekday index {bad} is out of range (0 = Sunday .. 6 = Saturday)"
            )));
        }
        if self.start_time >= self.end_time {
            return Err(GatewayError::InvalidRequest(
                "start time must be before end time".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(GatewayError::InvalidRequest(
                "capacity must be positive".to_string(),
            ));
        }
        if self.start_date > self.end_date {
            return Err(GatewayError::InvalidDateRange(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        if let Some((first, last)) = parent_span
            && (self.start_date < first || self.end_date > last)
        {
            return Err(GatewayError::InvalidDateRange(format!(
                "range must stay within the parent event's sessions ({first} to {last})"
            )));
        }
        let year_end = NaiveDate::from_ymd_opt(today.year(), 12, 31)
            .ok_or_else(|| GatewayError::Internal("calendar overflow".to_string()))?;
        if self.end_date > year_end {
            return Err(GatewayError::InvalidDateRange(format!(
                "end date must not be after {year_end}"
            )));
        }
        Ok(())
    }

    /// Returns `true` if the rule selects the given day.
    fn selects(&self, day: NaiveDate) -> bool {
        let index = day.weekday().num_days_from_sunday();
        self.weekdays.iter().any(|&d| u32::from(d) == index)
    }
}

/// Expands the rule into sessions with `filled = 0`.
///
/// # Errors
///
/// Returns the validation errors of [`RecurrenceRequest::validate`], or
/// [`GatewayError::NoSessionsGenerated`] when no day in the range matches.
pub fn generate_sessions(
    request: &RecurrenceRequest,
    parent_span: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> Result<Vec<Session>, GatewayError> {
    request.validate(parent_span, today)?;

    let sessions: Vec<Session> = request
        .start_date
        .iter_days()
        .take_while(|day| *day <= request.end_date)
        .take(MAX_ITERATIONS)
        .filter(|day| request.selects(*day))
        .map(|day| Session::new(day, request.start_time, request.end_time, request.capacity))
        .collect();

    if sessions.is_empty() {
        return Err(GatewayError::NoSessionsGenerated);
    }
    Ok(sessions)
}

/// Generates sessions and appends them to the sessions already staged for
/// the event being authored. Returns how many were added.
///
/// # Errors
///
/// Same as [`generate_sessions`]; `staged` is left untouched on error.
pub fn append_recurring(
    staged: &mut Vec<Session>,
    request: &RecurrenceRequest,
    parent_span: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> Result<usize, GatewayError> {
    let generated = generate_sessions(request, parent_span, today)?;
    let added = generated.len();
    staged.extend(generated);
    Ok(added)
}

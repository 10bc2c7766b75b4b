//! Code for working with the timesteps of the modelled year.
//!
//! The year is divided into `N` equal-length timesteps. Dispatch decisions are made for each
//! timestep in `0..N`, while the battery state of charge is tracked at `N + 1` points: the start
//! of every timestep plus the end of the last one.
use anyhow::{Result, ensure};
use std::ops::Range;

/// Number of days in each month of a (non-leap) year
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// The timesteps covered by one calendar month
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSpan {
    /// The month number (1 to 12)
    pub month: u32,
    /// The number of timesteps in the month according to the calendar
    pub calendar_steps: usize,
    /// The timesteps which take this month's values.
    ///
    /// This is shorter than `calendar_steps` if the modelled year ends part-way through the month
    /// and, for December, longer if the modelled year is longer than the calendar.
    pub steps: Range<usize>,
}

/// Information about the timesteps in the modelled year
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepInfo {
    /// The length of the modelled year in hours
    pub hours_in_year: f64,
    /// The length of each timestep in hours
    pub resolution_hours: f64,
    /// The number of timesteps in the year
    pub num_timesteps: usize,
    /// The number of timesteps in one day
    pub steps_per_day: usize,
    months: Vec<MonthSpan>,
}

impl TimestepInfo {
    /// Create a new [`TimestepInfo`].
    ///
    /// # Arguments
    ///
    /// * `hours_in_year` - The length of the modelled year in hours
    /// * `resolution_hours` - The length of each timestep in hours (e.g. 0.25 for 15 minutes)
    pub fn new(hours_in_year: f64, resolution_hours: f64) -> Result<Self> {
        ensure!(
            resolution_hours.is_finite() && resolution_hours > 0.0 && resolution_hours <= 24.0,
            "Time resolution must be greater than zero and no more than 24 hours"
        );
        ensure!(
            hours_in_year.is_finite() && hours_in_year > 0.0,
            "Hours in year must be a finite number greater than zero"
        );

        let num_timesteps = (hours_in_year / resolution_hours) as usize;
        ensure!(
            num_timesteps > 0,
            "Time resolution of {resolution_hours}h gives no timesteps in a year of \
            {hours_in_year}h"
        );
        let steps_per_day = (24.0 / resolution_hours) as usize;

        Ok(Self {
            hours_in_year,
            resolution_hours,
            num_timesteps,
            steps_per_day,
            months: month_spans(num_timesteps, resolution_hours),
        })
    }

    /// Iterate over timestep indices
    pub fn iter(&self) -> Range<usize> {
        0..self.num_timesteps
    }

    /// The number of points at which the battery state of charge is tracked (`N + 1`)
    pub fn num_soc_points(&self) -> usize {
        self.num_timesteps + 1
    }

    /// The calendar months and the timesteps they cover
    pub fn months(&self) -> &[MonthSpan] {
        &self.months
    }

    /// The hour of the day at which the given timestep starts
    pub fn hour_of_day(&self, timestep: usize) -> f64 {
        (timestep % self.steps_per_day) as f64 * self.resolution_hours
    }

    /// Whether the given timestep falls in the daily window `[start_hour, end_hour)`.
    ///
    /// The window boundaries are rounded down to whole timesteps.
    pub fn is_within_daily_window(&self, timestep: usize, start_hour: f64, end_hour: f64) -> bool {
        let start = (start_hour / self.resolution_hours) as usize;
        let end = (end_hour / self.resolution_hours) as usize;
        (start..end).contains(&(timestep % self.steps_per_day))
    }
}

/// Assign consecutive ranges of timesteps to calendar months
fn month_spans(num_timesteps: usize, resolution_hours: f64) -> Vec<MonthSpan> {
    let mut start = 0;
    let mut months: Vec<MonthSpan> = DAYS_IN_MONTH
        .iter()
        .zip(1..)
        .map(|(&days, month)| {
            let calendar_steps = (f64::from(days) * 24.0 / resolution_hours) as usize;
            let end = (start + calendar_steps).min(num_timesteps);
            let span = MonthSpan {
                month,
                calendar_steps,
                steps: start..end,
            };
            start = end;
            span
        })
        .collect();

    // Any remaining timesteps take December's values
    if let Some(december) = months.last_mut() {
        december.steps.end = num_timesteps;
    }

    months
}

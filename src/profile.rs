//! Synthesis of the input time series (demand, specific yields and feed-in tariff) from monthly
//! aggregates.
//!
//! All series are dense vectors indexed by timestep. Yields are "specific", i.e. the energy
//! generated in a timestep per MW of installed capacity.
use crate::model::{Generator, Model};
use crate::timestep::TimestepInfo;
use log::warn;
use rand::Rng;
use rand::seq::index::sample;

/// PV yield totals below this are treated as zero and not rescaled
const MIN_RESCALE_TOTAL: f64 = 1e-6;

/// The input time series for one run of the model
#[derive(Debug, Clone, PartialEq)]
pub struct InputProfiles {
    /// Demand in MWh per timestep
    pub demand: Vec<f64>,
    /// PV generation in MWh per MW installed per timestep
    pub pv_yield: Vec<f64>,
    /// Wind generation in MWh per MW installed per timestep
    pub wind_yield: Vec<f64>,
    /// The tariff received for exported energy in each timestep
    pub feed_in_tariff: Vec<f64>,
}

impl InputProfiles {
    /// Generate the input time series for the given model.
    ///
    /// # Arguments
    ///
    /// * `model` - The model
    /// * `rng` - Random source used to place the zero-tariff timesteps
    pub fn generate<R: Rng + ?Sized>(model: &Model, rng: &mut R) -> Self {
        let params = &model.parameters;
        let info = &model.timestep_info;

        let demand = vec![
            params.demand.power.value() * info.resolution_hours;
            info.num_timesteps
        ];
        let pv = model.generator(Generator::Pv);
        let pv_yield = pv_yield_profile(
            info,
            pv.monthly_weights,
            pv.annual_specific_yield.value(),
            params.pv.daytime_start_hour,
            params.pv.daytime_end_hour,
        );
        let wind = model.generator(Generator::Wind);
        let wind_yield = monthly_profile(
            info,
            wind.monthly_weights,
            wind.annual_specific_yield.value(),
        );
        let feed_in_tariff = tariff_profile(
            info,
            params.grid.feed_in_tariff.value(),
            params.grid.zero_tariff_hours,
            rng,
        );

        Self {
            demand,
            pv_yield,
            wind_yield,
            feed_in_tariff,
        }
    }

    /// The number of timesteps covered
    pub fn len(&self) -> usize {
        self.demand.len()
    }

    /// Whether the profiles are empty
    pub fn is_empty(&self) -> bool {
        self.demand.is_empty()
    }

    /// The specific yield series for the given generator
    pub fn specific_yield(&self, generator: Generator) -> &[f64] {
        match generator {
            Generator::Pv => &self.pv_yield,
            Generator::Wind => &self.wind_yield,
        }
    }

    /// Total demand over the year in MWh
    pub fn total_demand(&self) -> f64 {
        self.demand.iter().sum()
    }
}

/// Spread an annual yield across the timesteps of the year according to monthly weights.
///
/// Each month receives its share of the annual total, which is then split evenly over the
/// month's calendar timesteps.
pub fn monthly_profile(info: &TimestepInfo, weights: &[f64; 12], annual_total: f64) -> Vec<f64> {
    let weight_sum: f64 = weights.iter().sum();
    let mut profile = vec![0.0; info.num_timesteps];
    if weight_sum <= 0.0 {
        return profile;
    }

    for (span, weight) in info.months().iter().zip(weights) {
        if span.calendar_steps == 0 {
            warn!(
                "Month {} has no timesteps at this resolution; its yield is ignored",
                span.month
            );
            continue;
        }

        let monthly_total = weight / weight_sum * annual_total;
        let per_step = monthly_total / span.calendar_steps as f64;
        profile[span.steps.clone()].fill(per_step);
    }

    profile
}

/// Generate the PV specific yield, which is zero outside the daytime window.
///
/// After masking, the profile is rescaled so that it still sums to the annual target.
pub fn pv_yield_profile(
    info: &TimestepInfo,
    weights: &[f64; 12],
    annual_total: f64,
    daytime_start_hour: f64,
    daytime_end_hour: f64,
) -> Vec<f64> {
    let mut profile = monthly_profile(info, weights, annual_total);
    for (t, value) in profile.iter_mut().enumerate() {
        if !info.is_within_daily_window(t, daytime_start_hour, daytime_end_hour) {
            *value = 0.0;
        }
    }

    let total: f64 = profile.iter().sum();
    if total > MIN_RESCALE_TOTAL {
        let scale = annual_total / total;
        for value in &mut profile {
            *value *= scale;
        }
    }

    profile
}

/// The number of timesteps with a zero feed-in tariff
pub fn num_zero_tariff_steps(info: &TimestepInfo, zero_tariff_hours: f64) -> usize {
    let count = (zero_tariff_hours / info.hours_in_year * info.num_timesteps as f64).floor();
    (count.max(0.0) as usize).min(info.num_timesteps)
}

/// Generate the feed-in tariff, which is zero at a random subset of timesteps
pub fn tariff_profile<R: Rng + ?Sized>(
    info: &TimestepInfo,
    base_tariff: f64,
    zero_tariff_hours: f64,
    rng: &mut R,
) -> Vec<f64> {
    let mut tariff = vec![base_tariff; info.num_timesteps];
    let num_zero = num_zero_tariff_steps(info, zero_tariff_hours);
    for t in sample(rng, info.num_timesteps, num_zero) {
        tariff[t] = 0.0;
    }

    tariff
}

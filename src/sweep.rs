//! The sensitivity sweep maps the total annual cost over a grid of fixed PV and wind capacities.
//!
//! Battery capacities are frozen at the values from the main optimisation. Each grid point is an
//! independent dispatch-only problem, so points are solved in parallel on a thread pool. A point
//! which cannot be solved to optimality has a cost of +∞.
use crate::model::Model;
use crate::model::parameters::SweepParameters;
use crate::optimisation::{Solution, SystemRun};
use crate::profile::InputProfiles;
use crate::units::{Energy, MoneyPerYear, Power};
use anyhow::{Context, Result};
use itertools::iproduct;
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Report progress after every this many points
const PROGRESS_INTERVAL: usize = 5;

/// Relative tolerance when checking that no point is cheaper than the optimum
const LOWER_BOUND_TOLERANCE: f64 = 1e-6;

/// Battery capacities which are held fixed across the sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrozenStorage {
    /// Storage capacity
    pub energy: Energy,
    /// Charge/discharge power capacity
    pub power: Power,
}

impl FrozenStorage {
    /// The battery from an optimal solution, or `None` if it is too small to matter
    pub fn from_solution(solution: &Solution, negligible: f64) -> Option<Self> {
        let energy = solution.battery_energy.value();
        let power = solution.battery_power.value();
        if energy < negligible || power < negligible {
            None
        } else {
            Some(Self {
                energy: solution.battery_energy,
                power: solution.battery_power,
            })
        }
    }
}

/// The upper bound of a sweep axis, given the optimal capacity for that technology
pub fn axis_max(optimum: Power, params: &SweepParameters) -> Power {
    let mut max = params.min_range.value().max(optimum.value() * params.scale);
    if optimum.value() < 1.0 {
        max = max.max(params.fallback_range.value());
    }

    Power(max)
}

/// `steps` evenly-spaced values from zero to `max` inclusive
pub fn linspace(max: Power, steps: usize) -> Vec<Power> {
    match steps {
        0 => Vec::new(),
        1 => vec![Power(0.0)],
        _ => (0..steps)
            .map(|i| Power(max.value() * i as f64 / (steps - 1) as f64))
            .collect(),
    }
}

/// Solve a single point of the sweep.
///
/// # Arguments
///
/// * `model` - The model
/// * `profiles` - The input time series
/// * `pv` - Fixed PV capacity
/// * `wind` - Fixed wind capacity
/// * `storage` - Fixed battery capacities, or `None` to leave the battery out
/// * `time_limit` - Optional solver time limit in seconds
///
/// # Returns
///
/// The total annual cost, or +∞ if the problem could not be solved to optimality.
pub fn solve_grid_point(
    model: &Model,
    profiles: &InputProfiles,
    pv: Power,
    wind: Power,
    storage: Option<FrozenStorage>,
    time_limit: Option<f64>,
) -> f64 {
    let run = SystemRun::new(model, profiles)
        .with_fixed_generation(pv, wind)
        .with_time_limit(time_limit);
    let run = match storage {
        Some(storage) => run.with_fixed_storage(storage.energy, storage.power),
        None => run.without_storage(),
    };

    match run.run() {
        Ok(solution) => solution.objective_value.value(),
        Err(err) => {
            debug!("Sweep point PV={pv} MW, wind={wind} MW failed: {err}");
            f64::INFINITY
        }
    }
}

/// The total annual cost for each combination of PV and wind capacity
#[derive(Debug, Clone, PartialEq)]
pub struct CostSurface {
    /// PV capacities
    pub pv_axis: Vec<Power>,
    /// Wind capacities
    pub wind_axis: Vec<Power>,
    /// Costs indexed by `[wind_index][pv_index]`; +∞ where the solve failed
    pub costs: Vec<Vec<f64>>,
}

impl CostSurface {
    /// Iterate over PV capacity, wind capacity and cost for every point
    pub fn iter(&self) -> impl Iterator<Item = (Power, Power, f64)> + '_ {
        iproduct!(
            self.wind_axis.iter().enumerate(),
            self.pv_axis.iter().enumerate()
        )
        .map(|((i, wind), (j, pv))| (*pv, *wind, self.costs[i][j]))
    }

    /// The cheapest point with a finite cost, as (PV capacity, wind capacity, cost)
    pub fn min_finite(&self) -> Option<(Power, Power, f64)> {
        self.iter()
            .filter(|(_, _, cost)| cost.is_finite())
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }

    /// The number of points which could not be solved
    pub fn num_failed(&self) -> usize {
        self.iter().filter(|(_, _, cost)| !cost.is_finite()).count()
    }

    /// Check that no point is cheaper than the optimum found by the main optimisation.
    ///
    /// Every point is a restriction of the main problem, so a cheaper point indicates a numerical
    /// problem. Returns whether the check passed.
    pub fn check_lower_bound(&self, optimum: MoneyPerYear) -> bool {
        let optimum = optimum.value();
        let tolerance = LOWER_BOUND_TOLERANCE * optimum.abs().max(1.0);
        let violations: Vec<_> = self
            .iter()
            .filter(|(_, _, cost)| cost.is_finite() && *cost < optimum - tolerance)
            .collect();

        for (pv, wind, cost) in &violations {
            warn!(
                "Sweep point PV={pv} MW, wind={wind} MW has cost {cost:.2}, which is below the \
                optimum of {optimum:.2}"
            );
        }

        violations.is_empty()
    }
}

/// Tracks and reports progress through the sweep
struct Progress {
    total: usize,
    done: AtomicUsize,
    start: Instant,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            start: Instant::now(),
        }
    }

    /// Record that a point has finished, logging progress at regular intervals
    fn increment(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % PROGRESS_INTERVAL != 0 && done != self.total {
            return;
        }

        let elapsed = self.start.elapsed().as_secs_f64();
        let remaining = elapsed / done as f64 * (self.total - done) as f64;
        info!(
            "Sweep progress: {done}/{} points ({:.0}%), about {remaining:.0}s remaining",
            self.total,
            100.0 * done as f64 / self.total as f64
        );
    }
}

/// Run the sensitivity sweep around an optimal solution.
///
/// # Arguments
///
/// * `model` - The model
/// * `profiles` - The input time series used for the main optimisation
/// * `optimum` - The solution of the main optimisation
/// * `num_threads` - Number of worker threads (0 for one per core)
/// * `time_limit` - Optional solver time limit per point in seconds
pub fn run_sweep(
    model: &Model,
    profiles: &InputProfiles,
    optimum: &Solution,
    num_threads: usize,
    time_limit: Option<f64>,
) -> Result<CostSurface> {
    let params = &model.parameters.sweep;
    let pv_axis = linspace(axis_max(optimum.pv_capacity, params), params.pv_steps);
    let wind_axis = linspace(axis_max(optimum.wind_capacity, params), params.wind_steps);

    let storage = FrozenStorage::from_solution(optimum, params.negligible_battery);
    match storage {
        Some(storage) => info!(
            "Sweeping {}x{} points with battery fixed at {:.3} MWh / {:.3} MW",
            pv_axis.len(),
            wind_axis.len(),
            storage.energy.value(),
            storage.power.value()
        ),
        None => info!(
            "Sweeping {}x{} points without a battery",
            pv_axis.len(),
            wind_axis.len()
        ),
    }

    let points: Vec<_> = iproduct!(0..wind_axis.len(), 0..pv_axis.len()).collect();
    let progress = Progress::new(points.len());
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to build thread pool for sweep")?;

    let flat_costs: Vec<f64> = pool.install(|| {
        points
            .par_iter()
            .map(|&(i, j)| {
                let cost = solve_grid_point(
                    model,
                    profiles,
                    pv_axis[j],
                    wind_axis[i],
                    storage,
                    time_limit,
                );
                progress.increment();
                cost
            })
            .collect()
    });

    let costs = flat_costs
        .chunks(pv_axis.len())
        .map(<[f64]>::to_vec)
        .collect();
    let surface = CostSurface {
        pv_axis,
        wind_axis,
        costs,
    };

    let num_failed = surface.num_failed();
    if num_failed > 0 {
        warn!("{num_failed} sweep points could not be solved and have infinite cost");
    }

    Ok(surface)
}

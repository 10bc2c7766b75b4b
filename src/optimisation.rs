//! Code for performing the capacity and dispatch optimisation.
//!
//! A single linear program decides the installed capacities of PV, wind and battery storage along
//! with the dispatch of every timestep. The same formulation is reused for the sensitivity sweep
//! by fixing some of the capacities.
use crate::log::is_logging_disabled;
use crate::model::{Generator, Model};
use crate::profile::InputProfiles;
use crate::units::{Energy, MoneyPerYear, Power};
use highs::{HighsModelStatus, HighsStatus, RowProblem as Problem, Sense};
use log::warn;
use serde_string_enum::SerializeLabeledStringEnum;
use std::error::Error;
use std::fmt;
use std::ops::{Bound, Range};

mod constraints;
use constraints::add_model_constraints;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
type Variable = highs::Col;

/// Square roots of efficiency below this give a clamped inverse
const MIN_SQRT_EFFICIENCY: f64 = 1e-9;

/// The inverse efficiency used when the square root of efficiency is too small
const MAX_INVERSE_SQRT_EFFICIENCY: f64 = 1e9;

/// Battery efficiencies applied to each leg of a charge/discharge cycle.
///
/// Round-trip losses are split evenly between charging and discharging, so each leg has an
/// efficiency of `sqrt(eta)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageEfficiency {
    /// The round-trip efficiency actually used
    pub round_trip: f64,
    /// Fraction of charged energy which is stored
    pub charge: f64,
    /// Energy withdrawn from storage per unit of energy discharged
    pub inverse_discharge: f64,
}

impl StorageEfficiency {
    /// Derive per-leg efficiencies from a round-trip efficiency.
    ///
    /// Values which are not finite, not positive or greater than one are replaced with 1
    /// (lossless) with a warning.
    pub fn from_round_trip(efficiency: f64) -> Self {
        let round_trip = if efficiency.is_finite() && efficiency > 0.0 && efficiency <= 1.0 {
            efficiency
        } else {
            warn!("Invalid battery efficiency {efficiency}; assuming a lossless battery");
            1.0
        };

        let charge = round_trip.sqrt();
        let inverse_discharge = if charge < MIN_SQRT_EFFICIENCY {
            MAX_INVERSE_SQRT_EFFICIENCY
        } else {
            1.0 / charge
        };

        Self {
            round_trip,
            charge,
            inverse_discharge,
        }
    }
}

/// Whether a capacity is decided by the optimisation or fixed in advance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityChoice {
    /// The capacity is a decision variable
    Free,
    /// The capacity is fixed at the given value
    Fixed(f64),
}

impl CapacityChoice {
    /// Column bounds for the capacity variable
    fn bounds(self) -> (Bound<f64>, Bound<f64>) {
        match self {
            CapacityChoice::Free => (Bound::Included(0.0), Bound::Unbounded),
            CapacityChoice::Fixed(value) => (Bound::Included(value), Bound::Included(value)),
        }
    }
}

/// The outcome of a solve, as reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeLabeledStringEnum)]
pub enum SolveStatus {
    /// An optimal solution was found
    #[string = "optimal"]
    Optimal,
    /// The problem has no feasible solution
    #[string = "infeasible"]
    Infeasible,
    /// The objective can be decreased without limit
    #[string = "unbounded"]
    Unbounded,
    /// The solver reached its time limit
    #[string = "timed_out"]
    TimedOut,
    /// The solver stopped for another reason
    #[string = "not_solved"]
    NotSolved,
}

impl From<HighsModelStatus> for SolveStatus {
    fn from(status: HighsModelStatus) -> Self {
        match status {
            HighsModelStatus::Optimal => SolveStatus::Optimal,
            HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
                SolveStatus::Infeasible
            }
            HighsModelStatus::Unbounded => SolveStatus::Unbounded,
            HighsModelStatus::ReachedTimeLimit => SolveStatus::TimedOut,
            _ => SolveStatus::NotSolved,
        }
    }
}

/// An error which occurred while solving the problem
#[derive(Debug)]
pub enum ModelError {
    /// The model definition is incoherent.
    ///
    /// Users should not be able to trigger this error.
    Incoherent(HighsStatus),
    /// An optimal solution could not be found
    NonOptimal(SolveStatus),
}

impl ModelError {
    /// The status to report for this error
    pub fn status(&self) -> SolveStatus {
        match self {
            ModelError::Incoherent(_) => SolveStatus::NotSolved,
            ModelError::NonOptimal(status) => *status,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Incoherent(status) => write!(f, "Incoherent model: {status:?}"),
            ModelError::NonOptimal(status) => {
                write!(f, "Could not find optimal result: {status:?}")
            }
        }
    }
}

impl Error for ModelError {}

/// Try to solve the model, returning an error if the model is incoherent or result is non-optimal
pub fn solve_optimal(model: highs::Model) -> Result<highs::SolvedModel, ModelError> {
    let solved = model.try_solve().map_err(ModelError::Incoherent)?;

    match solved.status() {
        HighsModelStatus::Optimal => Ok(solved),
        status => Err(ModelError::NonOptimal(status.into())),
    }
}

/// Variables for battery storage
struct StorageVariables {
    energy_capacity: Variable,
    power_capacity: Variable,
    capacity_idx: Range<usize>,
    charge: Vec<Variable>,
    charge_idx: Range<usize>,
    discharge: Vec<Variable>,
    discharge_idx: Range<usize>,
    soc: Vec<Variable>,
    soc_idx: Range<usize>,
}

/// A map for easy lookup of variables in the problem.
///
/// We use this data structure for two things:
///
/// 1. In order define constraints for the optimisation
/// 2. To keep track of which columns hold which values, for when we are reading the results of
///    the optimisation.
pub struct VariableMap {
    pv_capacity: Variable,
    wind_capacity: Variable,
    generation_capacity_idx: Range<usize>,
    import: Vec<Variable>,
    import_idx: Range<usize>,
    export: Vec<Variable>,
    export_idx: Range<usize>,
    curtailment: Vec<Variable>,
    curtailment_idx: Range<usize>,
    storage: Option<StorageVariables>,
}

/// Add a variable for each timestep to the problem, returning the variables and their column range
fn add_series<F, B>(
    problem: &mut Problem,
    len: usize,
    mut column: F,
) -> (Vec<Variable>, Range<usize>)
where
    F: FnMut(usize) -> (f64, B),
    B: std::ops::RangeBounds<f64>,
{
    // This line **must** come before we add more variables
    let start = problem.num_cols();
    let vars = (0..len)
        .map(|t| {
            let (coeff, bounds) = column(t);
            problem.add_column(coeff, bounds)
        })
        .collect();

    (vars, start..problem.num_cols())
}

/// Column bounds for a grid exchange variable with an optional power limit
fn grid_bounds(limit: Option<Power>, resolution_hours: f64) -> (Bound<f64>, Bound<f64>) {
    match limit {
        Some(limit) => (
            Bound::Included(0.0),
            Bound::Included(limit.value() * resolution_hours),
        ),
        None => (Bound::Included(0.0), Bound::Unbounded),
    }
}

/// The annual cost per MW of a generator: annualised capital cost plus fixed operating cost
fn capacity_cost(model: &Model, generator: Generator) -> f64 {
    let params = model.generator(generator);
    params.capex.value() * model.annuity.for_generator(generator).factor.value()
        + params.opex.value()
}

impl VariableMap {
    /// Add all variables to the problem.
    ///
    /// Capacity variables carry their annualised capital and fixed operating costs and grid
    /// exchange variables carry the energy price, so the objective is the total annual cost.
    fn new(problem: &mut Problem, run: &SystemRun) -> Self {
        let model = run.model;
        let params = &model.parameters;
        let n = model.timestep_info.num_timesteps;
        let resolution = model.timestep_info.resolution_hours;

        // This line **must** come before we add more variables
        let start = problem.num_cols();
        let pv_capacity = problem.add_column(capacity_cost(model, Generator::Pv), run.pv.bounds());
        let wind_capacity =
            problem.add_column(capacity_cost(model, Generator::Wind), run.wind.bounds());
        let generation_capacity_idx = start..problem.num_cols();

        let import_price = params.grid.import_price.value();
        let (import, import_idx) = add_series(problem, n, |_| {
            (import_price, grid_bounds(params.grid.import_limit, resolution))
        });
        let (export, export_idx) = add_series(problem, n, |t| {
            (
                -run.profiles.feed_in_tariff[t],
                grid_bounds(params.grid.export_limit, resolution),
            )
        });
        let (curtailment, curtailment_idx) = add_series(problem, n, |_| (0.0, 0.0..));

        let storage = run
            .storage
            .map(|(energy, power)| add_storage_variables(problem, model, energy, power));

        Self {
            pv_capacity,
            wind_capacity,
            generation_capacity_idx,
            import,
            import_idx,
            export,
            export_idx,
            curtailment,
            curtailment_idx,
            storage,
        }
    }
}

/// Add battery capacity, charge, discharge and state of charge variables to the problem
fn add_storage_variables(
    problem: &mut Problem,
    model: &Model,
    energy: CapacityChoice,
    power: CapacityChoice,
) -> StorageVariables {
    let params = &model.parameters.battery;

    // This line **must** come before we add more variables
    let start = problem.num_cols();
    let energy_capacity = problem.add_column(params.energy_opex.value(), energy.bounds());
    let power_capacity = problem.add_column(
        params.power_capex.value() * model.annuity.battery.factor.value(),
        power.bounds(),
    );
    let capacity_idx = start..problem.num_cols();

    let info = &model.timestep_info;
    let (charge, charge_idx) = add_series(problem, info.num_timesteps, |_| (0.0, 0.0..));
    let (discharge, discharge_idx) = add_series(problem, info.num_timesteps, |_| (0.0, 0.0..));
    let (soc, soc_idx) = add_series(problem, info.num_soc_points(), |_| (0.0, 0.0..));

    StorageVariables {
        energy_capacity,
        power_capacity,
        capacity_idx,
        charge,
        charge_idx,
        discharge,
        discharge_idx,
        soc,
        soc_idx,
    }
}

/// The dispatch of every timestep in an optimal solution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dispatch {
    /// Energy imported from the grid (MWh per timestep)
    pub import: Vec<f64>,
    /// Energy exported to the grid
    pub export: Vec<f64>,
    /// Renewable generation which is discarded
    pub curtailment: Vec<f64>,
    /// Energy used to charge the battery
    pub charge: Vec<f64>,
    /// Energy delivered by the battery
    pub discharge: Vec<f64>,
    /// Battery state of charge at the start of each timestep, plus the end of the last one
    pub soc: Vec<f64>,
}

/// The solution to the optimisation problem
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Installed PV capacity
    pub pv_capacity: Power,
    /// Installed wind capacity
    pub wind_capacity: Power,
    /// Battery storage capacity (zero if storage is not modelled)
    pub battery_energy: Energy,
    /// Battery charge/discharge power capacity (zero if storage is not modelled)
    pub battery_power: Power,
    /// Dispatch for each timestep
    pub dispatch: Dispatch,
    /// The objective value for the solution, i.e. the total annual cost
    pub objective_value: MoneyPerYear,
}

impl Solution {
    /// Read the values of the variables from the solver's solution
    fn extract(solution: &highs::Solution, variables: &VariableMap, objective: f64) -> Self {
        let columns = solution.columns();
        let read = |idx: &Range<usize>| columns[idx.clone()].to_vec();

        let generation = &columns[variables.generation_capacity_idx.clone()];
        let n = variables.import.len();
        let (battery_energy, battery_power, charge, discharge, soc) = match &variables.storage {
            Some(storage) => {
                let capacity = &columns[storage.capacity_idx.clone()];
                (
                    capacity[0],
                    capacity[1],
                    read(&storage.charge_idx),
                    read(&storage.discharge_idx),
                    read(&storage.soc_idx),
                )
            }
            None => (0.0, 0.0, vec![0.0; n], vec![0.0; n], vec![0.0; n + 1]),
        };

        Self {
            pv_capacity: Power(generation[0]),
            wind_capacity: Power(generation[1]),
            battery_energy: Energy(battery_energy),
            battery_power: Power(battery_power),
            dispatch: Dispatch {
                import: read(&variables.import_idx),
                export: read(&variables.export_idx),
                curtailment: read(&variables.curtailment_idx),
                charge,
                discharge,
                soc,
            },
            objective_value: MoneyPerYear(objective),
        }
    }
}

/// Enable console output for the HiGHS solver, unless logging is disabled (e.g. in tests)
fn enable_highs_logging(model: &mut highs::Model) {
    if is_logging_disabled() {
        model.set_option("output_flag", false);
        return;
    }

    model.set_option("log_to_console", true);
    model.set_option("output_flag", true);
}

/// Provides the interface for running the optimisation.
///
/// By default, every capacity is a decision variable and the battery is included. The sweep fixes
/// the generation capacities and either fixes or removes the battery.
pub struct SystemRun<'a> {
    model: &'a Model,
    profiles: &'a InputProfiles,
    pv: CapacityChoice,
    wind: CapacityChoice,
    storage: Option<(CapacityChoice, CapacityChoice)>,
    time_limit: Option<f64>,
    solver_output: bool,
}

impl<'a> SystemRun<'a> {
    /// Create a new [`SystemRun`] in which all capacities are free
    pub fn new(model: &'a Model, profiles: &'a InputProfiles) -> Self {
        Self {
            model,
            profiles,
            pv: CapacityChoice::Free,
            wind: CapacityChoice::Free,
            storage: Some((CapacityChoice::Free, CapacityChoice::Free)),
            time_limit: None,
            solver_output: false,
        }
    }

    /// Fix the PV and wind capacities
    pub fn with_fixed_generation(self, pv: Power, wind: Power) -> Self {
        Self {
            pv: CapacityChoice::Fixed(pv.value()),
            wind: CapacityChoice::Fixed(wind.value()),
            ..self
        }
    }

    /// Fix the battery capacities
    pub fn with_fixed_storage(self, energy: Energy, power: Power) -> Self {
        Self {
            storage: Some((
                CapacityChoice::Fixed(energy.value()),
                CapacityChoice::Fixed(power.value()),
            )),
            ..self
        }
    }

    /// Leave the battery out of the problem entirely
    pub fn without_storage(self) -> Self {
        Self {
            storage: None,
            ..self
        }
    }

    /// Stop the solver after the given number of seconds
    pub fn with_time_limit(self, time_limit: Option<f64>) -> Self {
        Self { time_limit, ..self }
    }

    /// Show the solver's console output
    pub fn with_solver_output(self) -> Self {
        Self {
            solver_output: true,
            ..self
        }
    }

    /// Build the problem without solving it
    fn build(&self) -> (Problem, VariableMap) {
        let mut problem = Problem::default();
        let variables = VariableMap::new(&mut problem, self);
        add_model_constraints(&mut problem, &variables, self.model, self.profiles);

        (problem, variables)
    }

    /// Perform the optimisation.
    ///
    /// # Returns
    ///
    /// The optimal capacities and dispatch, or an error if no optimal solution was found.
    pub fn run(self) -> Result<Solution, ModelError> {
        let (problem, variables) = self.build();

        let mut highs_model = problem.optimise(Sense::Minimise);
        if self.solver_output {
            enable_highs_logging(&mut highs_model);
        } else {
            highs_model.set_option("output_flag", false);
        }
        if let Some(time_limit) = self.time_limit {
            highs_model.set_option("time_limit", time_limit);
        }

        let solved = solve_optimal(highs_model)?;
        Ok(Solution::extract(
            &solved.get_solution(),
            &variables,
            solved.objective_value(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{generate_profiles, model, profiles};
    use crate::model::Model;
    use crate::units::EnergyPerPower;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Tolerance for comparing values from the solver
    const TOL: f64 = 1e-6;

    #[rstest]
    #[case(0.88, 0.88, 0.88f64.sqrt())]
    #[case(1.0, 1.0, 1.0)]
    #[case(0.0, 1.0, 1.0)]
    #[case(-0.5, 1.0, 1.0)]
    #[case(1.5, 1.0, 1.0)]
    #[case(f64::NAN, 1.0, 1.0)]
    fn test_storage_efficiency(
        #[case] efficiency: f64,
        #[case] round_trip: f64,
        #[case] charge: f64,
    ) {
        let eff = StorageEfficiency::from_round_trip(efficiency);
        assert_eq!(eff.round_trip, round_trip);
        assert_approx_eq!(f64, eff.charge, charge);
        assert_approx_eq!(f64, eff.charge * eff.inverse_discharge, 1.0);
    }

    #[test]
    fn test_storage_efficiency_tiny() {
        let eff = StorageEfficiency::from_round_trip(1e-20);
        assert_eq!(eff.inverse_discharge, MAX_INVERSE_SQRT_EFFICIENCY);
        assert!(eff.inverse_discharge.is_finite());
    }

    #[rstest]
    #[case(HighsModelStatus::Optimal, SolveStatus::Optimal)]
    #[case(HighsModelStatus::Infeasible, SolveStatus::Infeasible)]
    #[case(HighsModelStatus::Unbounded, SolveStatus::Unbounded)]
    #[case(HighsModelStatus::ReachedTimeLimit, SolveStatus::TimedOut)]
    #[case(HighsModelStatus::NotSet, SolveStatus::NotSolved)]
    fn test_solve_status_from_highs(
        #[case] status: HighsModelStatus,
        #[case] expected: SolveStatus,
    ) {
        assert_eq!(SolveStatus::from(status), expected);
    }

    #[test]
    fn test_solve_status_serialise() {
        #[derive(serde::Serialize)]
        struct Report {
            status: SolveStatus,
        }

        let report = Report {
            status: SolveStatus::TimedOut,
        };
        assert_eq!(toml::to_string(&report).unwrap(), "status = \"timed_out\"\n");
    }

    /// Check the invariants which every solution must satisfy
    fn check_solution_invariants(model: &Model, profiles: &InputProfiles, solution: &Solution) {
        let d = &solution.dispatch;
        let n = profiles.len();
        let eff = model.storage_efficiency;
        let min_soc = model.parameters.battery.min_soc_fraction * solution.battery_energy.value();
        let max_step = solution.battery_power.value() * model.timestep_info.resolution_hours;

        assert_eq!(d.soc.len(), n + 1);
        for t in 0..n {
            // Energy balance
            let sources = profiles.pv_yield[t] * solution.pv_capacity.value()
                + profiles.wind_yield[t] * solution.wind_capacity.value()
                + d.import[t]
                + d.discharge[t];
            let sinks = profiles.demand[t] + d.export[t] + d.curtailment[t] + d.charge[t];
            assert_approx_eq!(f64, sources, sinks, epsilon = TOL);

            // State of charge update
            let expected_soc =
                d.soc[t] + d.charge[t] * eff.charge - d.discharge[t] * eff.inverse_discharge;
            assert_approx_eq!(f64, d.soc[t + 1], expected_soc, epsilon = TOL);

            // Power limits
            assert!(d.charge[t] <= max_step + TOL);
            assert!(d.discharge[t] <= max_step + TOL);

            for value in [d.import[t], d.export[t], d.curtailment[t], d.charge[t], d.discharge[t]]
            {
                assert!(value >= -TOL);
            }
        }

        // State of charge bounds, including the final point
        for soc in &d.soc {
            assert!(*soc >= min_soc - TOL);
            assert!(*soc <= solution.battery_energy.value() + TOL);
        }

        // Cyclic boundary
        assert_approx_eq!(f64, d.soc[n], d.soc[0], epsilon = TOL);
    }

    #[rstest]
    fn test_run_sizing(model: Model, profiles: InputProfiles) {
        let solution = SystemRun::new(&model, &profiles).run().unwrap();
        check_solution_invariants(&model, &profiles, &solution);
        assert!(solution.objective_value.value() > 0.0);
        assert!(solution.pv_capacity.value() >= 0.0);
        assert!(solution.wind_capacity.value() >= 0.0);
    }

    #[rstest]
    fn test_run_lossless_battery(mut model: Model, profiles: InputProfiles) {
        model.storage_efficiency = StorageEfficiency::from_round_trip(1.0);
        let solution = SystemRun::new(&model, &profiles).run().unwrap();
        check_solution_invariants(&model, &profiles, &solution);

        // With no losses, everything charged is discharged over the cycle
        let charged: f64 = solution.dispatch.charge.iter().sum();
        let discharged: f64 = solution.dispatch.discharge.iter().sum();
        assert_approx_eq!(f64, charged, discharged, epsilon = TOL);
    }

    #[rstest]
    fn test_run_zero_demand(mut model: Model) {
        model.parameters.demand.power = Power(0.0);
        let profiles = generate_profiles(&model);
        let solution = SystemRun::new(&model, &profiles).run().unwrap();

        // Nothing to supply and exporting never pays for new capacity
        assert_approx_eq!(f64, solution.pv_capacity.value(), 0.0, epsilon = TOL);
        assert_approx_eq!(f64, solution.wind_capacity.value(), 0.0, epsilon = TOL);
        assert_approx_eq!(f64, solution.objective_value.value(), 0.0, epsilon = TOL);
    }

    #[rstest]
    fn test_run_zero_demand_and_yield(mut model: Model) {
        model.parameters.demand.power = Power(0.0);
        model.parameters.pv.annual_specific_yield = EnergyPerPower(0.0);
        model.parameters.wind.annual_specific_yield = EnergyPerPower(0.0);
        let profiles = generate_profiles(&model);
        let solution = SystemRun::new(&model, &profiles).run().unwrap();
        check_solution_invariants(&model, &profiles, &solution);

        // Nothing to supply and nothing to generate, so nothing is built or dispatched
        for capacity in [
            solution.pv_capacity.value(),
            solution.wind_capacity.value(),
            solution.battery_energy.value(),
            solution.battery_power.value(),
            solution.objective_value.value(),
        ] {
            assert_approx_eq!(f64, capacity, 0.0, epsilon = TOL);
        }

        let d = &solution.dispatch;
        for series in [
            &d.import,
            &d.export,
            &d.curtailment,
            &d.charge,
            &d.discharge,
            &d.soc,
        ] {
            assert!(!series.is_empty());
            for value in series {
                assert_approx_eq!(f64, *value, 0.0, epsilon = TOL);
            }
        }
    }

    #[rstest]
    fn test_run_fixed_generation_no_storage(model: Model, profiles: InputProfiles) {
        let solution = SystemRun::new(&model, &profiles)
            .with_fixed_generation(Power(2.0), Power(3.0))
            .without_storage()
            .run()
            .unwrap();

        assert_approx_eq!(f64, solution.pv_capacity.value(), 2.0, epsilon = TOL);
        assert_approx_eq!(f64, solution.wind_capacity.value(), 3.0, epsilon = TOL);
        assert_eq!(solution.battery_energy, Energy(0.0));
        assert!(solution.dispatch.charge.iter().all(|v| *v == 0.0));

        // The objective includes the fixed capacity costs
        let params = &model.parameters;
        let fixed_cost = 2.0
            * (params.pv.capex.value() * model.annuity.pv.factor.value() + params.pv.opex.value())
            + 3.0
                * (params.wind.capex.value() * model.annuity.wind.factor.value()
                    + params.wind.opex.value());
        let grid_cost: f64 = solution
            .dispatch
            .import
            .iter()
            .map(|v| v * params.grid.import_price.value())
            .sum::<f64>()
            - solution
                .dispatch
                .export
                .iter()
                .zip(&profiles.feed_in_tariff)
                .map(|(v, tariff)| v * tariff)
                .sum::<f64>();
        assert_approx_eq!(
            f64,
            solution.objective_value.value(),
            fixed_cost + grid_cost,
            epsilon = 1e-3
        );
    }

    #[rstest]
    fn test_run_fixed_storage(model: Model, profiles: InputProfiles) {
        let solution = SystemRun::new(&model, &profiles)
            .with_fixed_generation(Power(5.0), Power(5.0))
            .with_fixed_storage(Energy(4.0), Power(1.0))
            .run()
            .unwrap();
        check_solution_invariants(&model, &profiles, &solution);
        assert_approx_eq!(f64, solution.battery_energy.value(), 4.0, epsilon = TOL);
        assert_approx_eq!(f64, solution.battery_power.value(), 1.0, epsilon = TOL);
    }

    #[rstest]
    fn test_run_fixing_optimum_gives_same_cost(model: Model, profiles: InputProfiles) {
        let optimum = SystemRun::new(&model, &profiles).run().unwrap();
        let fixed = SystemRun::new(&model, &profiles)
            .with_fixed_generation(optimum.pv_capacity, optimum.wind_capacity)
            .with_fixed_storage(optimum.battery_energy, optimum.battery_power)
            .run()
            .unwrap();
        assert_approx_eq!(
            f64,
            fixed.objective_value.value(),
            optimum.objective_value.value(),
            epsilon = 1e-2
        );
    }

    #[rstest]
    fn test_run_infeasible(mut model: Model, profiles: InputProfiles) {
        // No generation and no imports, so demand cannot be met
        model.parameters.grid.import_limit = Some(Power(0.0));
        let err = SystemRun::new(&model, &profiles)
            .with_fixed_generation(Power(0.0), Power(0.0))
            .without_storage()
            .run()
            .unwrap_err();
        assert_eq!(err.status(), SolveStatus::Infeasible);
        assert_eq!(err.to_string(), "Could not find optimal result: Infeasible");
    }

    #[rstest]
    fn test_run_import_limit(mut model: Model, profiles: InputProfiles) {
        model.parameters.grid.import_limit = Some(Power(1.0));
        let solution = SystemRun::new(&model, &profiles).run().unwrap();
        let max_import = model.timestep_info.resolution_hours;
        assert!(
            solution
                .dispatch
                .import
                .iter()
                .all(|v| *v <= max_import + TOL)
        );
        check_solution_invariants(&model, &profiles, &solution);
    }
}

//! Aggregation of an optimal solution into annual costs, energy flows and key indicators.
use crate::finance::annual_capital_cost;
use crate::model::{Generator, Model};
use crate::optimisation::{Solution, SolveStatus};
use crate::profile::InputProfiles;
use crate::units::{Energy, MoneyPerEnergy, MoneyPerYear, Power};
use log::warn;
use serde::Serialize;

/// The largest acceptable mismatch between energy sources and sinks over the year
const MAX_BALANCE_ERROR: Energy = Energy(1.0);

/// The largest acceptable mismatch between the cost breakdown and the objective value
const MAX_CONTROL_SUM_ERROR: MoneyPerYear = MoneyPerYear(1.0);

/// Demand below this is treated as zero when calculating ratios
const MIN_DEMAND: f64 = 1e-6;

/// Wind capacity below this is reported as no turbines
const MIN_WIND_CAPACITY: f64 = 1e-3;

/// Installed capacities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capacities {
    /// PV capacity (MW)
    pub pv: Power,
    /// Wind capacity (MW)
    pub wind: Power,
    /// Battery storage capacity (MWh)
    pub battery_energy: Energy,
    /// Battery charge/discharge power (MW)
    pub battery_power: Power,
    /// Equivalent number of wind turbines of the configured rating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_turbines: Option<f64>,
}

/// The annual cost of the system, broken down by component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Annualised PV capital cost
    pub pv_capex: MoneyPerYear,
    /// Annualised wind capital cost
    pub wind_capex: MoneyPerYear,
    /// Annualised battery capital cost
    pub battery_capex: MoneyPerYear,
    /// Annual PV operating cost
    pub pv_opex: MoneyPerYear,
    /// Annual wind operating cost
    pub wind_opex: MoneyPerYear,
    /// Annual battery operating cost
    pub battery_opex: MoneyPerYear,
    /// Cost of energy imported from the grid
    pub grid_import: MoneyPerYear,
    /// Revenue from energy exported to the grid
    pub feed_in_revenue: MoneyPerYear,
    /// Total annual cost
    pub total: MoneyPerYear,
}

impl CostBreakdown {
    /// Calculate the cost breakdown for a solution
    pub fn new(model: &Model, profiles: &InputProfiles, solution: &Solution) -> Self {
        let params = &model.parameters;
        let generator_capex = |generator, capacity: Power| {
            annual_capital_cost(
                model.generator(generator).capex,
                capacity,
                model.annuity.for_generator(generator),
            )
        };

        let pv_capex = generator_capex(Generator::Pv, solution.pv_capacity);
        let wind_capex = generator_capex(Generator::Wind, solution.wind_capacity);
        let battery_capex = annual_capital_cost(
            params.battery.power_capex,
            solution.battery_power,
            &model.annuity.battery,
        );
        let pv_opex = params.pv.opex * solution.pv_capacity;
        let wind_opex = params.wind.opex * solution.wind_capacity;
        let battery_opex = params.battery.energy_opex * solution.battery_energy;

        let imported = Energy(solution.dispatch.import.iter().sum());
        let grid_import = (params.grid.import_price * imported).per_year();
        let feed_in_revenue = MoneyPerYear(
            solution
                .dispatch
                .export
                .iter()
                .zip(&profiles.feed_in_tariff)
                .map(|(export, tariff)| export * tariff)
                .sum(),
        );

        let total = pv_capex + wind_capex + battery_capex + pv_opex + wind_opex + battery_opex
            + grid_import
            - feed_in_revenue;

        Self {
            pv_capex,
            wind_capex,
            battery_capex,
            pv_opex,
            wind_opex,
            battery_opex,
            grid_import,
            feed_in_revenue,
            total,
        }
    }
}

/// Annual energy flows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyBalance {
    /// Total demand
    pub demand: Energy,
    /// PV generation, including curtailed energy
    pub pv_generation: Energy,
    /// Wind generation, including curtailed energy
    pub wind_generation: Energy,
    /// Energy imported from the grid
    pub import: Energy,
    /// Energy exported to the grid
    pub export: Energy,
    /// Generation which was discarded
    pub curtailment: Energy,
    /// Energy used to charge the battery
    pub charge: Energy,
    /// Energy delivered by the battery
    pub discharge: Energy,
}

impl EnergyBalance {
    /// Calculate annual energy flows for a solution
    pub fn new(profiles: &InputProfiles, solution: &Solution) -> Self {
        let sum = |values: &[f64]| Energy(values.iter().sum());
        let generation = |yields: &[f64], capacity: Power| {
            Energy(yields.iter().map(|y| y * capacity.value()).sum())
        };
        let dispatch = &solution.dispatch;

        Self {
            demand: sum(&profiles.demand),
            pv_generation: generation(
                profiles.specific_yield(Generator::Pv),
                solution.pv_capacity,
            ),
            wind_generation: generation(
                profiles.specific_yield(Generator::Wind),
                solution.wind_capacity,
            ),
            import: sum(&dispatch.import),
            export: sum(&dispatch.export),
            curtailment: sum(&dispatch.curtailment),
            charge: sum(&dispatch.charge),
            discharge: sum(&dispatch.discharge),
        }
    }

    /// Total renewable generation
    pub fn generation(&self) -> Energy {
        self.pv_generation + self.wind_generation
    }

    /// Energy lost in the battery
    pub fn storage_losses(&self) -> Energy {
        self.charge - self.discharge
    }

    /// The difference between energy sources and energy sinks, which should be zero
    pub fn balance_error(&self) -> Energy {
        let sources = self.generation() + self.import + self.discharge;
        let sinks = self.demand + self.export + self.curtailment + self.charge;
        sources - sinks
    }
}

/// Key performance indicators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    /// Levelised cost of energy: total annual cost per unit of demand
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcoe: Option<MoneyPerEnergy>,
    /// Percentage of demand not met by grid imports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_sufficiency_percent: Option<f64>,
    /// Renewable generation as a percentage of demand
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable_coverage_percent: Option<f64>,
}

impl Kpis {
    /// Calculate indicators from annual costs and energy flows.
    ///
    /// Ratios are `None` if there is no demand.
    pub fn new(costs: &CostBreakdown, energy: &EnergyBalance) -> Self {
        if energy.demand.value() <= MIN_DEMAND {
            return Self {
                lcoe: None,
                self_sufficiency_percent: None,
                renewable_coverage_percent: None,
            };
        }

        let demand = energy.demand;
        Self {
            lcoe: Some(costs.total / demand),
            self_sufficiency_percent: Some(100.0 * ((demand - energy.import) / demand).value()),
            renewable_coverage_percent: Some(100.0 * (energy.generation() / demand).value()),
        }
    }
}

/// The results of a successful optimisation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemResults {
    /// Solver status
    pub status: SolveStatus,
    /// The objective value reported by the solver
    pub objective: MoneyPerYear,
    /// Installed capacities
    pub capacities: Capacities,
    /// Annual cost breakdown
    pub costs: CostBreakdown,
    /// Annual energy flows
    pub energy: EnergyBalance,
    /// Key performance indicators
    pub kpis: Kpis,
}

impl SystemResults {
    /// Aggregate the results of an optimal solution
    pub fn new(model: &Model, profiles: &InputProfiles, solution: &Solution) -> Self {
        let turbine_rating = model.parameters.wind.turbine_rating;
        let wind_turbines = (solution.wind_capacity.value() > MIN_WIND_CAPACITY)
            .then(|| (solution.wind_capacity / turbine_rating).value());

        let costs = CostBreakdown::new(model, profiles, solution);
        let energy = EnergyBalance::new(profiles, solution);
        let kpis = Kpis::new(&costs, &energy);

        Self {
            status: SolveStatus::Optimal,
            objective: solution.objective_value,
            capacities: Capacities {
                pv: solution.pv_capacity,
                wind: solution.wind_capacity,
                battery_energy: solution.battery_energy,
                battery_power: solution.battery_power,
                wind_turbines,
            },
            costs,
            energy,
            kpis,
        }
    }

    /// Check that the energy balance closes and that the costs add up to the objective.
    ///
    /// Problems are logged as warnings. Returns whether both checks passed.
    pub fn check(&self) -> bool {
        let balance_error = self.energy.balance_error();
        let balance_ok = balance_error.abs() <= MAX_BALANCE_ERROR;
        if !balance_ok {
            warn!(
                "Annual energy balance does not close: sources exceed sinks by {balance_error} MWh"
            );
        }

        let control_sum_error = self.costs.total - self.objective;
        let control_sum_ok = control_sum_error.abs() <= MAX_CONTROL_SUM_ERROR;
        if !control_sum_ok {
            warn!(
                "Sum of cost components ({}) differs from the objective value ({}) by {}",
                self.costs.total, self.objective, control_sum_error
            );
        }

        balance_ok && control_sum_ok
    }
}

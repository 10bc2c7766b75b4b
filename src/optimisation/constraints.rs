//! Code for adding constraints to the optimisation problem.
use super::{StorageVariables, Variable, VariableMap};
use crate::model::Model;
use crate::profile::InputProfiles;
use highs::RowProblem as Problem;

/// Add constraints for the optimisation.
///
/// # Arguments
///
/// * `problem` - The optimisation problem
/// * `variables` - The variables in the problem
/// * `model` - The model
/// * `profiles` - The input time series
pub fn add_model_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    model: &Model,
    profiles: &InputProfiles,
) {
    add_energy_balance_constraints(problem, variables, profiles);

    if let Some(storage) = &variables.storage {
        add_storage_constraints(problem, storage, model);
    }
}

/// Add a row, leaving out terms with a zero coefficient
fn add_sparse_row<B, I>(problem: &mut Problem, bounds: B, terms: I)
where
    B: std::ops::RangeBounds<f64>,
    I: IntoIterator<Item = (Variable, f64)>,
{
    let terms: Vec<_> = terms.into_iter().filter(|(_, coeff)| *coeff != 0.0).collect();
    problem.add_row(bounds, terms);
}

/// Add energy balance constraints.
///
/// In every timestep, the energy from generation, imports and battery discharge must equal the
/// energy going to demand, exports, curtailment and battery charging.
fn add_energy_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    profiles: &InputProfiles,
) {
    for t in 0..profiles.len() {
        let mut terms = vec![
            (variables.pv_capacity, profiles.pv_yield[t]),
            (variables.wind_capacity, profiles.wind_yield[t]),
            (variables.import[t], 1.0),
            (variables.export[t], -1.0),
            (variables.curtailment[t], -1.0),
        ];
        if let Some(storage) = &variables.storage {
            terms.push((storage.discharge[t], 1.0));
            terms.push((storage.charge[t], -1.0));
        }

        let demand = profiles.demand[t];
        add_sparse_row(problem, demand..=demand, terms);
    }
}

/// Add constraints for battery storage.
///
/// These comprise the state of charge update, limits on charge and discharge power, bounds on the
/// state of charge and the cyclic boundary condition.
fn add_storage_constraints(problem: &mut Problem, storage: &StorageVariables, model: &Model) {
    let efficiency = model.storage_efficiency;
    let resolution = model.timestep_info.resolution_hours;
    let min_soc_fraction = model.parameters.battery.min_soc_fraction;

    for (t, (&charge, &discharge)) in storage.charge.iter().zip(&storage.discharge).enumerate() {
        // soc[t+1] = soc[t] + charge * sqrt(eta) - discharge / sqrt(eta)
        problem.add_row(
            0.0..=0.0,
            [
                (storage.soc[t + 1], 1.0),
                (storage.soc[t], -1.0),
                (charge, -efficiency.charge),
                (discharge, efficiency.inverse_discharge),
            ],
        );

        // Energy moved per timestep is limited by the power capacity
        problem.add_row(..=0.0, [(charge, 1.0), (storage.power_capacity, -resolution)]);
        problem.add_row(
            ..=0.0,
            [(discharge, 1.0), (storage.power_capacity, -resolution)],
        );
    }

    // Bounds apply at every point, including the end of the last timestep
    for &soc in &storage.soc {
        problem.add_row(..=0.0, [(soc, 1.0), (storage.energy_capacity, -1.0)]);
        if min_soc_fraction > 0.0 {
            problem.add_row(
                0.0..,
                [(soc, 1.0), (storage.energy_capacity, -min_soc_fraction)],
            );
        }
    }

    // Cyclic boundary condition
    if let (Some(&first), Some(&last)) = (storage.soc.first(), storage.soc.last()) {
        problem.add_row(0.0..=0.0, [(last, 1.0), (first, -1.0)]);
    }
}

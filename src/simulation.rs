//! Functionality for running a model: optimisation, reporting and the sensitivity sweep.
use crate::model::Model;
use crate::optimisation::SystemRun;
use crate::output::DataWriter;
use crate::output::metadata::{RunMetadata, write_metadata};
use crate::profile::InputProfiles;
use crate::results::SystemResults;
use crate::settings::Settings;
use crate::sweep::run_sweep;
use anyhow::{Context, Result, bail};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

/// Options for a single run which can be given on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOptions {
    /// Seed for placing the zero-tariff hours, overriding the model's seed
    pub seed: Option<u64>,
    /// Skip the sensitivity sweep even if the model enables it
    pub skip_sweep: bool,
}

/// Choose the seed for placing the zero-tariff hours.
///
/// A seed given on the command line takes precedence over the model's seed. If neither is given,
/// a random seed is drawn.
pub fn choose_seed(from_cli: Option<u64>, from_model: Option<u64>) -> u64 {
    from_cli.or(from_model).unwrap_or_else(rand::random)
}

/// Run the model.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `settings` - Program settings
/// * `options` - Options for this run
pub fn run(
    model: &Model,
    output_path: &Path,
    settings: &Settings,
    options: RunOptions,
) -> Result<()> {
    let writer = DataWriter::create(output_path, settings.debug_model);

    let seed = choose_seed(options.seed, model.parameters.grid.tariff_seed);
    info!("Tariff seed: {seed}");
    let profiles = InputProfiles::generate(model, &mut StdRng::seed_from_u64(seed));
    info!(
        "Generated input profiles with {} timesteps ({} h resolution)",
        profiles.len(),
        model.timestep_info.resolution_hours
    );

    let sweep = model.parameters.sweep.enabled && !options.skip_sweep;
    write_metadata(output_path, RunMetadata::new(&model.model_path, seed, sweep))
        .context("Failed to save metadata")?;

    // Main optimisation
    let solution = match SystemRun::new(model, &profiles)
        .with_solver_output()
        .with_time_limit(settings.solver_time_limit)
        .run()
    {
        Ok(solution) => solution,
        Err(err) => {
            writer.write_status(err.status())?;
            bail!(err);
        }
    };

    let results = SystemResults::new(model, &profiles, &solution);
    info!(
        "Optimal capacities: PV {:.3} MW, wind {:.3} MW, battery {:.3} MWh / {:.3} MW",
        results.capacities.pv.value(),
        results.capacities.wind.value(),
        results.capacities.battery_energy.value(),
        results.capacities.battery_power.value()
    );
    info!("Total annual cost: {:.2}", results.objective.value());
    if let Some(lcoe) = results.kpis.lcoe {
        info!("LCOE: {:.2} per MWh", lcoe.value());
    }
    info!(
        "Battery losses: {:.3} MWh",
        results.energy.storage_losses().value()
    );
    results.check();
    writer.write_results(&results)?;
    writer.write_dispatch(model, &profiles, &solution)?;
    writer.write_debug_profiles(&profiles)?;

    if !sweep {
        info!("Skipping sensitivity sweep");
        return Ok(());
    }

    // Sensitivity sweep
    let surface = run_sweep(
        model,
        &profiles,
        &solution,
        settings.num_threads,
        settings.solver_time_limit,
    )?;
    writer.write_cost_surface(&surface)?;
    match surface.min_finite() {
        Some((pv, wind, cost)) => info!(
            "Cheapest sweep point: PV {:.3} MW, wind {:.3} MW, cost {cost:.2}",
            pv.value(),
            wind.value()
        ),
        None => warn!("No point in the sensitivity sweep could be solved"),
    }
    surface.check_lower_bound(solution.objective_value);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{model, parameters};
    use crate::model::ModelParameters;
    use crate::units::{EnergyPerPower, Power};
    use rstest::rstest;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[rstest]
    #[case(Some(1), Some(2), 1)]
    #[case(None, Some(2), 2)]
    #[case(Some(1), None, 1)]
    fn test_choose_seed(
        #[case] from_cli: Option<u64>,
        #[case] from_model: Option<u64>,
        #[case] expected: u64,
    ) {
        assert_eq!(choose_seed(from_cli, from_model), expected);
    }

    #[rstest]
    fn test_run(model: Model) {
        let dir = tempdir().unwrap();
        let settings = Settings {
            debug_model: true,
            num_threads: 2,
            ..Settings::default()
        };
        run(&model, dir.path(), &settings, RunOptions::default()).unwrap();

        for file_name in [
            "metadata.toml",
            "results.toml",
            "dispatch.csv",
            "cost_surface.csv",
            "debug_profiles.csv",
        ] {
            assert!(dir.path().join(file_name).is_file(), "{file_name} missing");
        }
    }

    #[rstest]
    fn test_run_skip_sweep(model: Model) {
        let dir = tempdir().unwrap();
        let options = RunOptions {
            seed: Some(7),
            skip_sweep: true,
        };
        run(&model, dir.path(), &Settings::default(), options).unwrap();

        assert!(dir.path().join("results.toml").is_file());
        assert!(!dir.path().join("cost_surface.csv").exists());
        assert!(!dir.path().join("debug_profiles.csv").exists());
    }

    #[rstest]
    fn test_run_infeasible(mut parameters: ModelParameters) {
        // Generators produce nothing and imports are forbidden, so demand cannot be met
        parameters.grid.import_limit = Some(Power(0.0));
        parameters.pv.annual_specific_yield = EnergyPerPower(0.0);
        parameters.wind.annual_specific_yield = EnergyPerPower(0.0);
        let model = Model::new(parameters, PathBuf::from("test_model")).unwrap();

        let dir = tempdir().unwrap();
        let settings = Settings {
            debug_model: true,
            ..Settings::default()
        };
        assert!(run(&model, dir.path(), &settings, RunOptions::default()).is_err());

        let contents = std::fs::read_to_string(dir.path().join("results.toml")).unwrap();
        assert_eq!(contents, "status = \"infeasible\"\n");

        // Only the status and the run metadata are written
        assert!(dir.path().join("metadata.toml").is_file());
        for file_name in ["dispatch.csv", "cost_surface.csv", "debug_profiles.csv"] {
            assert!(!dir.path().join(file_name).exists(), "{file_name} written");
        }
    }
}

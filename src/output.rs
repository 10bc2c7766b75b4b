//! The module responsible for writing output data to disk.
use crate::model::Model;
use crate::optimisation::{Solution, SolveStatus};
use crate::profile::InputProfiles;
use crate::results::SystemResults;
use crate::sweep::CostSurface;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "resopt_results";

/// The output file name for the summary of results
const RESULTS_FILE_NAME: &str = "results.toml";

/// The output file name for the dispatch of each timestep
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for the sensitivity sweep
const COST_SURFACE_FILE_NAME: &str = "cost_surface.csv";

/// The output file name for the input profiles
const PROFILES_FILE_NAME: &str = "debug_profiles.csv";

/// Get the default output directory for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model.
///
/// # Arguments
///
/// * `output_dir` - The folder to create
/// * `allow_overwrite` - Whether an existing, non-empty folder may be overwritten
///
/// # Returns
///
/// Whether an existing folder was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let mut overwrite = false;
    if output_dir.is_dir() {
        let is_empty = output_dir.read_dir()?.next().is_none();
        if !is_empty {
            ensure!(
                allow_overwrite,
                "Output folder already exists and is not empty. Use --overwrite to replace it."
            );

            fs::remove_dir_all(output_dir)?;
            overwrite = true;
        }
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// The contents of the results file when no optimal solution was found
#[derive(Serialize)]
struct StatusOnly {
    status: SolveStatus,
}

/// Represents a row in the dispatch CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    timestep: usize,
    hour_of_day: f64,
    demand: f64,
    pv_generation: f64,
    wind_generation: f64,
    import: f64,
    export: f64,
    curtailment: f64,
    charge: f64,
    discharge: f64,
    soc: f64,
    self_consumption: f64,
}

/// Represents a row in the cost surface CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CostSurfaceRow {
    pv_capacity: f64,
    wind_capacity: f64,
    total_cost: f64,
}

/// Represents a row in the input profiles CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ProfileRow {
    timestep: usize,
    demand: f64,
    pv_yield: f64,
    wind_yield: f64,
    feed_in_tariff: f64,
}

/// An object for writing output data to files in the output folder
pub struct DataWriter {
    output_path: PathBuf,
    save_debug_info: bool,
}

impl DataWriter {
    /// Create a new [`DataWriter`]
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            save_debug_info,
        }
    }

    /// Write rows to a CSV file in the output folder
    fn write_csv<T, I>(&self, file_name: &str, rows: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let file_path = self.output_path.join(file_name);
        let mut writer = csv::Writer::from_path(&file_path)
            .with_context(|| format!("Could not create {}", file_path.display()))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write a TOML file in the output folder
    fn write_toml<T: Serialize>(&self, file_name: &str, contents: &T) -> Result<()> {
        let file_path = self.output_path.join(file_name);
        fs::write(&file_path, toml::to_string(contents)?)
            .with_context(|| format!("Could not write {}", file_path.display()))?;

        Ok(())
    }

    /// Write the summary of an optimal solution
    pub fn write_results(&self, results: &SystemResults) -> Result<()> {
        self.write_toml(RESULTS_FILE_NAME, results)
    }

    /// Write only the solver status, for when no optimal solution was found
    pub fn write_status(&self, status: SolveStatus) -> Result<()> {
        self.write_toml(RESULTS_FILE_NAME, &StatusOnly { status })
    }

    /// Write the dispatch of every timestep
    pub fn write_dispatch(
        &self,
        model: &Model,
        profiles: &InputProfiles,
        solution: &Solution,
    ) -> Result<()> {
        let d = &solution.dispatch;
        let rows = model.timestep_info.iter().map(|t| DispatchRow {
            timestep: t,
            hour_of_day: model.timestep_info.hour_of_day(t),
            demand: profiles.demand[t],
            pv_generation: profiles.pv_yield[t] * solution.pv_capacity.value(),
            wind_generation: profiles.wind_yield[t] * solution.wind_capacity.value(),
            import: d.import[t],
            export: d.export[t],
            curtailment: d.curtailment[t],
            charge: d.charge[t],
            discharge: d.discharge[t],
            soc: d.soc[t],
            self_consumption: (profiles.demand[t] - d.import[t]).max(0.0),
        });

        self.write_csv(DISPATCH_FILE_NAME, rows)
    }

    /// Write the cost of every point in the sensitivity sweep
    pub fn write_cost_surface(&self, surface: &CostSurface) -> Result<()> {
        let rows = surface.iter().map(|(pv, wind, cost)| CostSurfaceRow {
            pv_capacity: pv.value(),
            wind_capacity: wind.value(),
            total_cost: cost,
        });

        self.write_csv(COST_SURFACE_FILE_NAME, rows)
    }

    /// Write the input profiles, if debug info is enabled
    pub fn write_debug_profiles(&self, profiles: &InputProfiles) -> Result<()> {
        if !self.save_debug_info {
            return Ok(());
        }

        let rows = (0..profiles.len()).map(|t| ProfileRow {
            timestep: t,
            demand: profiles.demand[t],
            pv_yield: profiles.pv_yield[t],
            wind_yield: profiles.wind_yield[t],
            feed_in_tariff: profiles.feed_in_tariff[t],
        });

        self.write_csv(PROFILES_FILE_NAME, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{model, profiles};
    use crate::optimisation::SystemRun;
    use crate::units::Power;
    use itertools::Itertools;
    use rstest::rstest;
    use tempfile::tempdir;

    /// Read all rows of a CSV file in the given folder
    fn read_rows<T: serde::de::DeserializeOwned>(dir: &Path, file_name: &str) -> Vec<T> {
        csv::Reader::from_path(dir.join(file_name))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("a").join("b");

        // New folder
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Empty folder is reused
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Non-empty folder needs permission to overwrite
        fs::write(output_dir.join("file.txt"), "contents").unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("file.txt").exists());
    }

    #[rstest]
    fn test_write_dispatch(model: Model, profiles: InputProfiles) {
        let solution = SystemRun::new(&model, &profiles).run().unwrap();
        let dir = tempdir().unwrap();
        let writer = DataWriter::create(dir.path(), false);
        writer.write_dispatch(&model, &profiles, &solution).unwrap();

        let rows: Vec<DispatchRow> = read_rows(dir.path(), DISPATCH_FILE_NAME);
        assert_eq!(rows.len(), profiles.len());
        assert_eq!(rows[5].timestep, 5);
        assert_eq!(rows[5].hour_of_day, 5.0);
        assert!(rows.iter().all(|row| row.self_consumption >= 0.0));
        assert!(
            rows.iter()
                .all(|row| row.self_consumption <= row.demand + 1e-9)
        );
    }

    #[test]
    fn test_write_cost_surface() {
        let surface = CostSurface {
            pv_axis: vec![Power(0.0), Power(1.0)],
            wind_axis: vec![Power(2.0)],
            costs: vec![vec![10.0, f64::INFINITY]],
        };
        let dir = tempdir().unwrap();
        DataWriter::create(dir.path(), false)
            .write_cost_surface(&surface)
            .unwrap();

        let rows: Vec<CostSurfaceRow> = read_rows(dir.path(), COST_SURFACE_FILE_NAME);
        assert_eq!(
            rows,
            [
                CostSurfaceRow {
                    pv_capacity: 0.0,
                    wind_capacity: 2.0,
                    total_cost: 10.0
                },
                CostSurfaceRow {
                    pv_capacity: 1.0,
                    wind_capacity: 2.0,
                    total_cost: f64::INFINITY
                }
            ]
        );
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_write_debug_profiles(profiles: InputProfiles, #[case] debug: bool) {
        let dir = tempdir().unwrap();
        DataWriter::create(dir.path(), debug)
            .write_debug_profiles(&profiles)
            .unwrap();

        let file_path = dir.path().join(PROFILES_FILE_NAME);
        assert_eq!(file_path.exists(), debug);
        if debug {
            let rows: Vec<ProfileRow> = read_rows(dir.path(), PROFILES_FILE_NAME);
            assert_eq!(rows.len(), profiles.len());
            assert_eq!(rows[0].feed_in_tariff, profiles.feed_in_tariff[0]);
        }
    }

    #[test]
    fn test_write_status() {
        let dir = tempdir().unwrap();
        DataWriter::create(dir.path(), false)
            .write_status(SolveStatus::Infeasible)
            .unwrap();

        let contents = fs::read_to_string(dir.path().join(RESULTS_FILE_NAME)).unwrap();
        assert_eq!(contents, "status = \"infeasible\"\n");
    }

    #[rstest]
    fn test_write_results(model: Model, profiles: InputProfiles) {
        let solution = SystemRun::new(&model, &profiles).run().unwrap();
        let results = SystemResults::new(&model, &profiles, &solution);
        let dir = tempdir().unwrap();
        DataWriter::create(dir.path(), false)
            .write_results(&results)
            .unwrap();

        let contents = fs::read_to_string(dir.path().join(RESULTS_FILE_NAME)).unwrap();
        let value: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(value["status"].as_str(), Some("optimal"));
        assert!(value["capacities"]["pv"].as_float().is_some());
        assert!(value["costs"]["total"].as_float().is_some());
        assert!(value["kpis"]["lcoe"].as_float().is_some());
    }
}

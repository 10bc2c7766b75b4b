//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{
    check_non_negative, check_positive, deserialise_proportion, input_err_msg, read_toml,
};
use crate::units::{
    EnergyPerPower, MoneyPerEnergy, MoneyPerEnergyPerYear, MoneyPerPower, MoneyPerPowerPerYear,
    Power,
};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

/// Relative monthly PV yields (January to December)
const DEFAULT_PV_MONTHLY_WEIGHTS: [f64; 12] = [
    534.0, 638.0, 1404.0, 1567.0, 2136.0, 1994.0, 1954.0, 2072.0, 1683.0, 1528.0, 638.0, 425.0,
];

/// Relative monthly wind yields (January to December)
const DEFAULT_WIND_MONTHLY_WEIGHTS: [f64; 12] = [
    2107.0, 1914.0, 1345.0, 1310.0, 877.0, 820.0, 820.0, 751.0, 1230.0, 1207.0, 1424.0, 1846.0,
];

/// Represents the contents of the entire model file.
///
/// Every section and field is optional; missing values take defaults.
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct ModelParameters {
    /// The division of the year into timesteps
    pub time: TimeParameters,
    /// The demand to be met
    pub demand: DemandParameters,
    /// Solar PV generation
    pub pv: PvParameters,
    /// Wind generation
    pub wind: WindParameters,
    /// Battery storage
    pub battery: BatteryParameters,
    /// Exchange with the grid
    pub grid: GridParameters,
    /// Economic parameters
    pub finance: FinanceParameters,
    /// The sensitivity sweep over PV and wind capacities
    pub sweep: SweepParameters,
}

/// Represents the `[time]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct TimeParameters {
    /// The length of the modelled year in hours
    pub hours_in_year: f64,
    /// The length of each timestep in hours
    pub resolution_hours: f64,
}

impl Default for TimeParameters {
    fn default() -> Self {
        Self {
            hours_in_year: 8760.0,
            resolution_hours: 0.25,
        }
    }
}

/// Represents the `[demand]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct DemandParameters {
    /// The constant demand in MW
    pub power: Power,
}

impl Default for DemandParameters {
    fn default() -> Self {
        Self {
            power: Power(3.629),
        }
    }
}

/// Represents the `[pv]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct PvParameters {
    /// Relative yield for each month, January to December
    pub monthly_weights: [f64; 12],
    /// Target annual yield per MW installed
    pub annual_specific_yield: EnergyPerPower,
    /// Capital cost per MW installed
    pub capex: MoneyPerPower,
    /// Fixed operating cost per MW installed per year
    pub opex: MoneyPerPowerPerYear,
    /// Lifetime in years
    pub lifetime: u32,
    /// The hour of the day at which PV generation starts
    pub daytime_start_hour: f64,
    /// The hour of the day at which PV generation ends
    pub daytime_end_hour: f64,
}

impl Default for PvParameters {
    fn default() -> Self {
        Self {
            monthly_weights: DEFAULT_PV_MONTHLY_WEIGHTS,
            annual_specific_yield: EnergyPerPower(1280.0),
            capex: MoneyPerPower(800_000.0),
            opex: MoneyPerPowerPerYear(13_300.0),
            lifetime: 20,
            daytime_start_hour: 6.0,
            daytime_end_hour: 20.0,
        }
    }
}

/// Represents the `[wind]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct WindParameters {
    /// Relative yield for each month, January to December
    pub monthly_weights: [f64; 12],
    /// Target annual yield per MW installed
    pub annual_specific_yield: EnergyPerPower,
    /// Capital cost per MW installed
    pub capex: MoneyPerPower,
    /// Fixed operating cost per MW installed per year
    pub opex: MoneyPerPowerPerYear,
    /// Lifetime in years
    pub lifetime: u32,
    /// Rated power of a single turbine, used to report the equivalent number of turbines
    pub turbine_rating: Power,
}

impl Default for WindParameters {
    fn default() -> Self {
        Self {
            monthly_weights: DEFAULT_WIND_MONTHLY_WEIGHTS,
            annual_specific_yield: EnergyPerPower(2302.0),
            capex: MoneyPerPower(1_600_000.0),
            opex: MoneyPerPowerPerYear(32_000.0),
            lifetime: 20,
            turbine_rating: Power(6.8),
        }
    }
}

/// Represents the `[battery]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct BatteryParameters {
    /// Capital cost per MW of charge/discharge power
    pub power_capex: MoneyPerPower,
    /// Fixed operating cost per MWh of storage capacity per year
    pub energy_opex: MoneyPerEnergyPerYear,
    /// Lifetime in years
    pub lifetime: u32,
    /// Round-trip efficiency.
    ///
    /// Invalid values are replaced with 1 (lossless) with a warning rather than rejected.
    pub efficiency: f64,
    /// The minimum state of charge as a fraction of storage capacity
    #[serde(deserialize_with = "deserialise_proportion")]
    pub min_soc_fraction: f64,
}

impl Default for BatteryParameters {
    fn default() -> Self {
        Self {
            power_capex: MoneyPerPower(500_000.0),
            energy_opex: MoneyPerEnergyPerYear(6650.0),
            lifetime: 15,
            efficiency: 0.88,
            min_soc_fraction: 0.1,
        }
    }
}

/// Represents the `[grid]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct GridParameters {
    /// The price paid for energy imported from the grid
    pub import_price: MoneyPerEnergy,
    /// The tariff received for energy exported to the grid
    pub feed_in_tariff: MoneyPerEnergy,
    /// The expected number of hours per year in which the feed-in tariff is zero
    pub zero_tariff_hours: f64,
    /// Seed for placing the zero-tariff timesteps. A random seed is used if absent.
    pub tariff_seed: Option<u64>,
    /// Maximum import power. Unlimited if absent.
    pub import_limit: Option<Power>,
    /// Maximum export power. Unlimited if absent.
    pub export_limit: Option<Power>,
}

impl Default for GridParameters {
    fn default() -> Self {
        Self {
            import_price: MoneyPerEnergy(169.9),
            feed_in_tariff: MoneyPerEnergy(50.0),
            zero_tariff_hours: 459.0,
            tariff_seed: None,
            import_limit: None,
            export_limit: None,
        }
    }
}

/// Represents the `[finance]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct FinanceParameters {
    /// The discount rate used to annualise capital costs
    pub discount_rate: f64,
}

impl Default for FinanceParameters {
    fn default() -> Self {
        Self {
            discount_rate: 0.06,
        }
    }
}

/// Represents the `[sweep]` section of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct SweepParameters {
    /// Whether to run the sweep
    pub enabled: bool,
    /// Number of grid points along the PV axis
    pub pv_steps: usize,
    /// Number of grid points along the wind axis
    pub wind_steps: usize,
    /// The upper bound of each axis as a multiple of the optimal capacity
    pub scale: f64,
    /// The minimum upper bound of each axis
    pub min_range: Power,
    /// The minimum upper bound of an axis whose optimal capacity is below 1 MW
    pub fallback_range: Power,
    /// Battery capacities below this are treated as zero, giving a sweep without storage
    pub negligible_battery: f64,
}

impl Default for SweepParameters {
    fn default() -> Self {
        Self {
            enabled: true,
            pv_steps: 15,
            wind_steps: 15,
            scale: 1.5,
            min_range: Power(10.0),
            fallback_range: Power(50.0),
            negligible_battery: 1e-3,
        }
    }
}

/// Check that monthly weights are valid
fn check_monthly_weights(weights: &[f64; 12], name: &str) -> Result<()> {
    ensure!(
        weights.iter().all(|w| w.is_finite() && *w >= 0.0),
        "{name} must all be finite numbers greater than or equal to zero"
    );
    if weights.iter().all(|w| *w == 0.0) {
        warn!("All {name} are zero, so there will be no generation");
    }

    Ok(())
}

/// Check that the PV daytime window lies within a day
fn check_daytime_window(start: f64, end: f64) -> Result<()> {
    ensure!(
        (0.0..=24.0).contains(&start) && (0.0..=24.0).contains(&end) && start < end,
        "PV daytime window must satisfy 0 <= daytime_start_hour < daytime_end_hour <= 24"
    );

    Ok(())
}

/// Check that the sweep parameters are valid
fn check_sweep(sweep: &SweepParameters) -> Result<()> {
    ensure!(
        sweep.pv_steps >= 2 && sweep.wind_steps >= 2,
        "Sweep must have at least two steps along each axis"
    );
    check_positive(sweep.scale, "sweep.scale")?;
    check_positive(sweep.min_range.value(), "sweep.min_range")?;
    check_positive(sweep.fallback_range.value(), "sweep.fallback_range")?;
    check_non_negative(sweep.negligible_battery, "sweep.negligible_battery")?;

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        // time: the timestep calendar is checked when it is constructed
        check_positive(self.time.hours_in_year, "time.hours_in_year")?;
        check_positive(self.time.resolution_hours, "time.resolution_hours")?;

        // demand
        check_non_negative(self.demand.power.value(), "demand.power")?;

        // pv
        check_monthly_weights(&self.pv.monthly_weights, "pv.monthly_weights")?;
        check_non_negative(
            self.pv.annual_specific_yield.value(),
            "pv.annual_specific_yield",
        )?;
        check_non_negative(self.pv.capex.value(), "pv.capex")?;
        check_non_negative(self.pv.opex.value(), "pv.opex")?;
        check_daytime_window(self.pv.daytime_start_hour, self.pv.daytime_end_hour)?;

        // wind
        check_monthly_weights(&self.wind.monthly_weights, "wind.monthly_weights")?;
        check_non_negative(
            self.wind.annual_specific_yield.value(),
            "wind.annual_specific_yield",
        )?;
        check_non_negative(self.wind.capex.value(), "wind.capex")?;
        check_non_negative(self.wind.opex.value(), "wind.opex")?;
        check_positive(self.wind.turbine_rating.value(), "wind.turbine_rating")?;

        // battery: efficiency is deliberately not checked here (see `StorageEfficiency`) and
        // min_soc_fraction was validated when deserialising
        check_non_negative(self.battery.power_capex.value(), "battery.power_capex")?;
        check_non_negative(self.battery.energy_opex.value(), "battery.energy_opex")?;

        // grid
        check_non_negative(self.grid.import_price.value(), "grid.import_price")?;
        check_non_negative(self.grid.feed_in_tariff.value(), "grid.feed_in_tariff")?;
        check_non_negative(self.grid.zero_tariff_hours, "grid.zero_tariff_hours")?;
        if self.grid.zero_tariff_hours > self.time.hours_in_year {
            warn!(
                "grid.zero_tariff_hours ({}) exceeds the length of the year; the feed-in tariff \
                will be zero throughout",
                self.grid.zero_tariff_hours
            );
        }
        if let Some(limit) = self.grid.import_limit {
            check_non_negative(limit.value(), "grid.import_limit")?;
        }
        if let Some(limit) = self.grid.export_limit {
            check_non_negative(limit.value(), "grid.export_limit")?;
        }
        if self.grid.feed_in_tariff > self.grid.import_price {
            warn!(
                "The feed-in tariff exceeds the import price, so importing energy to export it \
                again is profitable. The optimisation is unbounded unless grid limits are set."
            );
        }

        // finance
        ensure!(
            self.finance.discount_rate.is_finite(),
            "finance.discount_rate must be a finite number"
        );

        // sweep
        check_sweep(&self.sweep)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Write the given contents to a model file in a new temporary directory
    fn write_model_file(contents: &str) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
        write!(file, "{contents}").unwrap();
        dir
    }

    #[test]
    fn test_model_params_from_path_empty_file() {
        let dir = write_model_file("");
        let params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(params, ModelParameters::default());
        assert_eq!(params.time.resolution_hours, 0.25);
        assert_eq!(params.pv.monthly_weights, DEFAULT_PV_MONTHLY_WEIGHTS);
    }

    #[test]
    fn test_model_params_from_path_partial_section() {
        let dir = write_model_file(
            "[battery]\nefficiency = 0.9\n\n[grid]\ntariff_seed = 42\nimport_limit = 5.0\n",
        );
        let params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(params.battery.efficiency, 0.9);
        assert_eq!(params.battery.lifetime, 15); // default kept
        assert_eq!(params.grid.tariff_seed, Some(42));
        assert_eq!(params.grid.import_limit, Some(Power(5.0)));
        assert_eq!(params.grid.export_limit, None);
    }

    #[test]
    fn test_model_params_from_path_missing_file() {
        let dir = tempdir().unwrap();
        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[rstest]
    #[case("[pv]\nmonthly_weights = [1.0, 2.0]\n")] // Wrong number of months
    #[case("[battery]\nmin_soc_fraction = 1.5\n")]
    #[case("[time]\nresolution_hours = 0.0\n")]
    #[case("[pv]\ndaytime_start_hour = 20.0\ndaytime_end_hour = 6.0\n")]
    #[case("[grid]\nimport_price = -1.0\n")]
    #[case("[sweep]\npv_steps = 1\n")]
    #[case("[wind]\ncapex = -5.0\n")]
    fn test_model_params_from_path_invalid(#[case] contents: &str) {
        let dir = write_model_file(contents);
        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_invalid_efficiency_is_accepted() {
        // Handled later by clamping
        let dir = write_model_file("[battery]\nefficiency = -0.5\n");
        assert!(ModelParameters::from_path(dir.path()).is_ok());
    }

    #[rstest]
    #[case([1.0; 12], true)]
    #[case([0.0; 12], true)]
    #[case([-1.0; 12], false)]
    #[case([f64::NAN; 12], false)]
    fn test_check_monthly_weights(#[case] weights: [f64; 12], #[case] expected_valid: bool) {
        assert_eq!(
            check_monthly_weights(&weights, "weights").is_ok(),
            expected_valid
        );
    }

    #[rstest]
    #[case(6.0, 20.0, true)]
    #[case(0.0, 24.0, true)]
    #[case(20.0, 6.0, false)]
    #[case(6.0, 6.0, false)]
    #[case(-1.0, 6.0, false)]
    #[case(6.0, 25.0, false)]
    fn test_check_daytime_window(#[case] start: f64, #[case] end: f64, #[case] valid: bool) {
        assert_eq!(check_daytime_window(start, end).is_ok(), valid);
    }
}

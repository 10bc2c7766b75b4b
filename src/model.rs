//! The model represents the static input data provided by the user.
use crate::finance::{AnnuityFactor, annuity_factor};
use crate::optimisation::StorageEfficiency;
use crate::timestep::TimestepInfo;
use crate::units::{EnergyPerPower, MoneyPerPower, MoneyPerPowerPerYear};
use anyhow::{Context, Result};
use log::warn;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, IntoEnumIterator};

pub mod parameters;
pub use parameters::ModelParameters;

/// A renewable generation technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Generator {
    /// Solar photovoltaics
    #[strum(serialize = "PV")]
    Pv,
    /// Onshore wind
    #[strum(serialize = "wind")]
    Wind,
}

/// The parameters common to all generation technologies
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParameters<'a> {
    /// Relative yield for each month, January to December
    pub monthly_weights: &'a [f64; 12],
    /// Target annual yield per MW installed
    pub annual_specific_yield: EnergyPerPower,
    /// Capital cost per MW installed
    pub capex: MoneyPerPower,
    /// Fixed operating cost per MW installed per year
    pub opex: MoneyPerPowerPerYear,
}

/// Annuity factors for each technology
#[derive(Debug, Clone, PartialEq)]
pub struct AnnuityFactors {
    /// Solar PV
    pub pv: AnnuityFactor,
    /// Wind
    pub wind: AnnuityFactor,
    /// Battery storage
    pub battery: AnnuityFactor,
}

impl AnnuityFactors {
    /// The annuity factor for the given generator
    pub fn for_generator(&self, generator: Generator) -> &AnnuityFactor {
        match generator {
            Generator::Pv => &self.pv,
            Generator::Wind => &self.wind,
        }
    }
}

/// Warn that a technology's capital cost will be ignored because its annuity factor is unusable
fn warn_if_unusable(name: &str, factor: &AnnuityFactor) {
    if !factor.is_usable() {
        warn!(
            "Annuity factor for {name} is {}, so its capital cost will not be counted",
            factor.factor
        );
    }
}

/// Model definition
#[derive(Debug, Clone)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// The timesteps of the modelled year
    pub timestep_info: TimestepInfo,
    /// Annuity factors derived from the discount rate and technology lifetimes
    pub annuity: AnnuityFactors,
    /// Battery charging and discharging efficiencies
    pub storage_efficiency: StorageEfficiency,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let parameters = ModelParameters::from_path(&model_dir)?;
        Model::new(parameters, model_dir.as_ref().to_path_buf())
    }

    /// Create a model from already-validated parameters, deriving the quantities used by the
    /// optimisation
    pub fn new(parameters: ModelParameters, model_path: PathBuf) -> Result<Model> {
        let timestep_info = TimestepInfo::new(
            parameters.time.hours_in_year,
            parameters.time.resolution_hours,
        )
        .context("Invalid [time] section")?;

        let rate = parameters.finance.discount_rate;
        let annuity = AnnuityFactors {
            pv: annuity_factor(rate, f64::from(parameters.pv.lifetime)),
            wind: annuity_factor(rate, f64::from(parameters.wind.lifetime)),
            battery: annuity_factor(rate, f64::from(parameters.battery.lifetime)),
        };
        for generator in Generator::iter() {
            warn_if_unusable(&generator.to_string(), annuity.for_generator(generator));
        }
        warn_if_unusable("battery", &annuity.battery);

        let storage_efficiency = StorageEfficiency::from_round_trip(parameters.battery.efficiency);

        Ok(Model {
            model_path,
            parameters,
            timestep_info,
            annuity,
            storage_efficiency,
        })
    }

    /// The parameters for the given generator
    pub fn generator(&self, generator: Generator) -> GeneratorParameters<'_> {
        let params = &self.parameters;
        match generator {
            Generator::Pv => GeneratorParameters {
                monthly_weights: &params.pv.monthly_weights,
                annual_specific_yield: params.pv.annual_specific_yield,
                capex: params.pv.capex,
                opex: params.pv.opex,
            },
            Generator::Wind => GeneratorParameters {
                monthly_weights: &params.wind.monthly_weights,
                annual_specific_yield: params.wind.annual_specific_yield,
                capex: params.wind.capex,
                opex: params.wind.opex,
            },
        }
    }
}

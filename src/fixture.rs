//! Fixtures for tests
use crate::model::{Model, ModelParameters};
use crate::profile::InputProfiles;
use crate::units::{
    EnergyPerPower, MoneyPerEnergy, MoneyPerEnergyPerYear, MoneyPerPower, MoneyPerPowerPerYear,
    Power,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rstest::fixture;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Parameters for a two-day model at hourly resolution.
///
/// Costs are scaled down so that renewables and storage are worth building over such a short
/// horizon, while the feed-in tariff stays below the cost of generation so the problem is bounded.
#[fixture]
pub fn parameters() -> ModelParameters {
    let mut parameters = ModelParameters::default();
    parameters.time.hours_in_year = 48.0;
    parameters.time.resolution_hours = 1.0;
    parameters.demand.power = Power(1.0);

    parameters.pv.monthly_weights = [1.0; 12];
    parameters.pv.annual_specific_yield = EnergyPerPower(20.0);
    parameters.pv.capex = MoneyPerPower(1000.0);
    parameters.pv.opex = MoneyPerPowerPerYear(0.0);

    // 0.4 MWh per MW in each hour of January
    parameters.wind.monthly_weights = [1.0; 12];
    parameters.wind.annual_specific_yield = EnergyPerPower(0.4 * 744.0 * 12.0);
    parameters.wind.capex = MoneyPerPower(2000.0);
    parameters.wind.opex = MoneyPerPowerPerYear(0.0);

    parameters.battery.power_capex = MoneyPerPower(100.0);
    parameters.battery.energy_opex = MoneyPerEnergyPerYear(1.0);

    parameters.grid.feed_in_tariff = MoneyPerEnergy(2.0);
    parameters.grid.zero_tariff_hours = 4.0;
    parameters.grid.tariff_seed = Some(42);

    parameters.sweep.pv_steps = 3;
    parameters.sweep.wind_steps = 3;

    parameters
}

#[fixture]
pub fn model(parameters: ModelParameters) -> Model {
    Model::new(parameters, PathBuf::from("test_model")).unwrap()
}

/// Generate input profiles for the model with a fixed seed
pub fn generate_profiles(model: &Model) -> InputProfiles {
    InputProfiles::generate(model, &mut StdRng::seed_from_u64(42))
}

#[fixture]
pub fn profiles(model: Model) -> InputProfiles {
    generate_profiles(&model)
}

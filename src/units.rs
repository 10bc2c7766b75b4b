//! This module defines various unit types and their conversions.
//!
//! Power is in MW, energy in MWh and money in the currency of the input data (EUR in the bundled
//! demo). Costs which recur every year are expressed "per year".
use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};

/// Define a newtype for a quantity along with the operations common to all quantities
macro_rules! base_unit_struct {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Create a new instance of the unit type from an `f64` value
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// The value of the quantity as an `f64`
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// The absolute value of the quantity
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }
        }

        impl std::ops::Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl ApproxEq for $name {
            type Margin = F64Margin;

            fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

/// Define a newtype for a dimensional quantity, which can be scaled by [`Dimensionless`] values
macro_rules! unit_struct {
    ($(#[$meta:meta])* $name:ident) => {
        base_unit_struct!($(#[$meta])* $name);

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

base_unit_struct!(
    /// A dimensionless quantity (a ratio, fraction or factor)
    Dimensionless
);

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

// Base quantities
unit_struct!(
    /// An amount of money
    Money
);
unit_struct!(
    /// Power in MW (installed generation or battery power capacity)
    Power
);
unit_struct!(
    /// Energy in MWh
    Energy
);

// Derived quantities
unit_struct!(
    /// Money spent or earned every year
    MoneyPerYear
);
unit_struct!(
    /// A capital cost per MW of installed power
    MoneyPerPower
);
unit_struct!(
    /// A recurring annual cost per MW of installed power
    MoneyPerPowerPerYear
);
unit_struct!(
    /// A price per MWh of energy
    MoneyPerEnergy
);
unit_struct!(
    /// A recurring annual cost per MWh of storage capacity
    MoneyPerEnergyPerYear
);
unit_struct!(
    /// Energy yielded per MW of installed capacity (specific yield, MWh/MW)
    EnergyPerPower
);

// Division rules
impl_div!(Money, Energy, MoneyPerEnergy);
impl_div!(MoneyPerYear, Energy, MoneyPerEnergy);
impl_div!(Energy, Power, EnergyPerPower);

// Multiplication rules
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(MoneyPerPowerPerYear, Power, MoneyPerYear);
impl_mul!(MoneyPerEnergyPerYear, Energy, MoneyPerYear);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(EnergyPerPower, Power, Energy);

impl Money {
    /// Interpret a sum of money as being spent (or earned) every year
    pub fn per_year(self) -> MoneyPerYear {
        MoneyPerYear(self.0)
    }
}

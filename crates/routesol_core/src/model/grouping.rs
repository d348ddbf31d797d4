//! Static cargo grouping tables.
//!
//! Warehouse areas, their product group codes and temperature bands, trailer
//! zones, and the load combinations that may share one trailer.

use std::fmt::{Display, Formatter};

/// Inclusive temperature band in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBand {
    pub min_c: f64,
    pub max_c: f64,
}

impl TemperatureBand {
    const fn new(min_c: f64, max_c: f64) -> Self {
        Self { min_c, max_c }
    }

    pub fn contains(&self, celsius: f64) -> bool {
        celsius >= self.min_c && celsius <= self.max_c
    }
}

impl Display for TemperatureBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}..{:.0} °C", self.min_c, self.max_c)
    }
}

const AMBIENT_BAND: TemperatureBand = TemperatureBand::new(11.0, 24.0);
const CHILLED_BAND: TemperatureBand = TemperatureBand::new(-2.0, 3.0);
const MEAT_BAND: TemperatureBand = TemperatureBand::new(0.0, 3.0);
const FREEZER_BAND: TemperatureBand = TemperatureBand::new(-28.0, -18.0);
const FRESH_BAND: TemperatureBand = TemperatureBand::new(11.0, 17.0);

/// Trailer compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrailerZone {
    Front,
    Back,
}

impl TrailerZone {
    pub const ALL: [TrailerZone; 2] = [TrailerZone::Front, TrailerZone::Back];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "Front",
            Self::Back => "Back",
        }
    }
}

/// Warehouse picking area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseArea {
    Ambient,
    Bulk,
    Bread,
    NonFood,
    LimitedOffer,
    Chilled,
    Milk,
    ChilledConvenience,
    MeatAndPoultry,
    Freezer,
    FruitAndVeg,
    FlowersAndPlants,
}

impl WarehouseArea {
    pub const ALL: [WarehouseArea; 12] = [
        WarehouseArea::Ambient,
        WarehouseArea::Bulk,
        WarehouseArea::Bread,
        WarehouseArea::NonFood,
        WarehouseArea::LimitedOffer,
        WarehouseArea::Chilled,
        WarehouseArea::Milk,
        WarehouseArea::ChilledConvenience,
        WarehouseArea::MeatAndPoultry,
        WarehouseArea::Freezer,
        WarehouseArea::FruitAndVeg,
        WarehouseArea::FlowersAndPlants,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ambient => "Ambient",
            Self::Bulk => "Bulk",
            Self::Bread => "Bread",
            Self::NonFood => "Non Food",
            Self::LimitedOffer => "Limited Offer",
            Self::Chilled => "Chilled",
            Self::Milk => "Milk",
            Self::ChilledConvenience => "Chilled Convenience",
            Self::MeatAndPoultry => "Meat and Poultry",
            Self::Freezer => "Freezer",
            Self::FruitAndVeg => "Fruit and Veg",
            Self::FlowersAndPlants => "Flowers and Plants",
        }
    }

    pub fn product_group(self) -> u8 {
        match self {
            Self::Ambient => 10,
            Self::Bulk => 20,
            Self::Bread => 22,
            Self::NonFood => 30,
            Self::LimitedOffer => 31,
            Self::Chilled => 40,
            Self::Milk => 41,
            Self::ChilledConvenience => 42,
            Self::MeatAndPoultry => 50,
            Self::Freezer => 60,
            Self::FruitAndVeg => 70,
            Self::FlowersAndPlants => 71,
        }
    }

    pub fn temperature(self) -> TemperatureBand {
        match self {
            Self::Ambient | Self::Bulk | Self::Bread | Self::NonFood | Self::LimitedOffer => {
                AMBIENT_BAND
            }
            Self::Chilled | Self::Milk | Self::ChilledConvenience => CHILLED_BAND,
            Self::MeatAndPoultry => MEAT_BAND,
            Self::Freezer => FREEZER_BAND,
            Self::FruitAndVeg | Self::FlowersAndPlants => FRESH_BAND,
        }
    }

    pub fn from_product_group(code: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|area| area.product_group() == code)
    }
}

impl Display for WarehouseArea {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Permitted mix of warehouse areas on one trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadCombination {
    /// Full load, every area.
    Fl,
    /// Ambient and frozen.
    Az,
    /// Fresh, bread and chilled.
    Fbc,
    /// Ambient, fresh and bread.
    Afb,
    /// Ambient and chilled.
    Ac,
    /// Chilled and frozen.
    Cz,
    /// Fresh, bread and frozen.
    Fbz,
}

impl LoadCombination {
    pub const ALL: [LoadCombination; 7] = [
        LoadCombination::Fl,
        LoadCombination::Az,
        LoadCombination::Fbc,
        LoadCombination::Afb,
        LoadCombination::Ac,
        LoadCombination::Cz,
        LoadCombination::Fbz,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Fl => "FL",
            Self::Az => "AZ",
            Self::Fbc => "FBC",
            Self::Afb => "AFB",
            Self::Ac => "AC",
            Self::Cz => "CZ",
            Self::Fbz => "FBZ",
        }
    }

    pub fn areas(self) -> &'static [WarehouseArea] {
        use WarehouseArea::*;
        match self {
            Self::Fl => &WarehouseArea::ALL,
            Self::Az => &[Ambient, Bulk, NonFood, LimitedOffer, Freezer],
            Self::Fbc => &[
                Chilled,
                Milk,
                ChilledConvenience,
                MeatAndPoultry,
                Bread,
                FruitAndVeg,
                FlowersAndPlants,
            ],
            Self::Afb => &[
                Ambient,
                Bulk,
                Bread,
                FruitAndVeg,
                FlowersAndPlants,
                NonFood,
                LimitedOffer,
            ],
            Self::Ac => &[
                Ambient,
                Bulk,
                Chilled,
                Milk,
                ChilledConvenience,
                MeatAndPoultry,
                NonFood,
                LimitedOffer,
            ],
            Self::Cz => &[Chilled, Milk, ChilledConvenience, MeatAndPoultry, Freezer],
            Self::Fbz => &[Bread, FruitAndVeg, FlowersAndPlants, Freezer],
        }
    }

    pub fn carries(self, area: WarehouseArea) -> bool {
        self.areas().contains(&area)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.trim();
        Self::ALL
            .into_iter()
            .find(|combination| combination.code().eq_ignore_ascii_case(normalized))
    }
}

impl Display for LoadCombination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

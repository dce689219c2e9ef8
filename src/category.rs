//! Decor categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target classification label for a sighting.
///
/// `Roadside` is the fallback: it is what a row is predicted as when no
/// provider evidence yields any category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Restaurant,
    #[serde(alias = "Café", alias = "Caf√©")]
    Cafe,
    Sweetshop,
    #[serde(rename = "Movie Theater")]
    MovieTheater,
    Pharmacy,
    Zoo,
    Forest,
    Waterside,
    #[serde(rename = "Post Office")]
    PostOffice,
    #[serde(rename = "Art Gallery")]
    ArtGallery,
    Airport,
    Station,
    Beach,
    #[serde(rename = "Hamburger Shop")]
    BurgerPlace,
    #[serde(rename = "Mini-Mart")]
    MiniMart,
    Supermarket,
    Bakery,
    #[serde(rename = "Hair Salon")]
    HairSalon,
    #[serde(rename = "Clothing Store")]
    ClothesStore,
    Park,
    Roadside,
}

impl Category {
    pub const FALLBACK: Self = Self::Roadside;

    pub const ALL: [Self; 21] = [
        Self::Restaurant,
        Self::Cafe,
        Self::Sweetshop,
        Self::MovieTheater,
        Self::Pharmacy,
        Self::Zoo,
        Self::Forest,
        Self::Waterside,
        Self::PostOffice,
        Self::ArtGallery,
        Self::Airport,
        Self::Station,
        Self::Beach,
        Self::BurgerPlace,
        Self::MiniMart,
        Self::Supermarket,
        Self::Bakery,
        Self::HairSalon,
        Self::ClothesStore,
        Self::Park,
        Self::Roadside,
    ];

    /// Categories no provider reports reliably; rows labelled with them are
    /// dropped before scoring.
    pub const UNRELIABLE: [Self; 3] = [Self::Forest, Self::Park, Self::Waterside];

    pub fn label(self) -> &'static str {
        match self {
            Self::Restaurant => "Restaurant",
            Self::Cafe => "Cafe",
            Self::Sweetshop => "Sweetshop",
            Self::MovieTheater => "Movie Theater",
            Self::Pharmacy => "Pharmacy",
            Self::Zoo => "Zoo",
            Self::Forest => "Forest",
            Self::Waterside => "Waterside",
            Self::PostOffice => "Post Office",
            Self::ArtGallery => "Art Gallery",
            Self::Airport => "Airport",
            Self::Station => "Station",
            Self::Beach => "Beach",
            Self::BurgerPlace => "Hamburger Shop",
            Self::MiniMart => "Mini-Mart",
            Self::Supermarket => "Supermarket",
            Self::Bakery => "Bakery",
            Self::HairSalon => "Hair Salon",
            Self::ClothesStore => "Clothing Store",
            Self::Park => "Park",
            Self::Roadside => "Roadside",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decor category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if matches!(trimmed, "Café" | "Caf√©") {
            return Ok(Self::Cafe);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(trimmed.to_string()))
    }
}

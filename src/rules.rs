//! Category ↔ provider tag rules.
//!
//! Each provider has one static table. A category may list several native
//! tags; a rule may carry a temporal predicate comparing the sighting date to
//! the cutoff at which OSM `amenity=fast_food` stopped meaning Restaurant and
//! started meaning Hamburger Shop.

use chrono::NaiveDate;

use crate::category::Category;
use crate::place::{Prediction, RawPlace};
use crate::provider::Provider;

/// Date from which fast food places spawn Hamburger Shop decor.
pub fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 12, 18).unwrap_or(NaiveDate::MIN)
}

/// A provider-native tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTag {
    /// OSM `key=value`.
    KeyValue(&'static str, &'static str),
    /// A category name, type or alias, depending on the provider.
    Label(&'static str),
}

impl NativeTag {
    /// The string recorded as the matched label.
    pub fn label(self) -> &'static str {
        match self {
            Self::KeyValue(_, value) => value,
            Self::Label(label) => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    BeforeCutoff,
    AtOrAfterCutoff,
}

impl Temporal {
    pub fn holds(self, observed_at: NaiveDate, cutoff: NaiveDate) -> bool {
        match self {
            Self::BeforeCutoff => observed_at < cutoff,
            Self::AtOrAfterCutoff => observed_at >= cutoff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRule {
    pub category: Category,
    pub tag: NativeTag,
    pub when: Option<Temporal>,
}

impl TagRule {
    const fn kv(category: Category, key: &'static str, value: &'static str) -> Self {
        Self { category, tag: NativeTag::KeyValue(key, value), when: None }
    }

    const fn gated(category: Category, key: &'static str, value: &'static str, when: Temporal) -> Self {
        Self { category, tag: NativeTag::KeyValue(key, value), when: Some(when) }
    }

    const fn label(category: Category, label: &'static str) -> Self {
        Self { category, tag: NativeTag::Label(label), when: None }
    }

    pub fn applies_at(&self, observed_at: NaiveDate, cutoff: NaiveDate) -> bool {
        self.when.map_or(true, |w| w.holds(observed_at, cutoff))
    }
}

use Category as C;

const OSM_RULES: &[TagRule] = &[
    TagRule::kv(C::Restaurant, "amenity", "restaurant"),
    TagRule::gated(C::Restaurant, "amenity", "fast_food", Temporal::BeforeCutoff),
    TagRule::kv(C::Cafe, "amenity", "cafe"),
    TagRule::kv(C::Cafe, "cuisine", "coffee_shop"),
    TagRule::kv(C::Sweetshop, "shop", "pastry"),
    TagRule::kv(C::MovieTheater, "amenity", "cinema"),
    TagRule::kv(C::Pharmacy, "amenity", "pharmacy"),
    TagRule::kv(C::Zoo, "tourism", "zoo"),
    // both tagging schemes are in use for woodland
    TagRule::kv(C::Forest, "natural", "wood"),
    TagRule::kv(C::Forest, "landuse", "forest"),
    TagRule::kv(C::Waterside, "natural", "water"),
    TagRule::kv(C::PostOffice, "amenity", "post_office"),
    TagRule::kv(C::ArtGallery, "shop", "art"),
    TagRule::kv(C::Airport, "aeroway", "aerodrome"),
    TagRule::kv(C::Airport, "aeroway", "heliport"),
    TagRule::kv(C::Station, "railway", "station"),
    TagRule::kv(C::Station, "building", "train_station"),
    TagRule::kv(C::Beach, "natural", "beach"),
    TagRule::gated(C::BurgerPlace, "amenity", "fast_food", Temporal::AtOrAfterCutoff),
    TagRule::kv(C::BurgerPlace, "cuisine", "burger"),
    TagRule::kv(C::MiniMart, "shop", "convenience"),
    TagRule::kv(C::Supermarket, "shop", "supermarket"),
    TagRule::kv(C::Bakery, "shop", "bakery"),
    TagRule::kv(C::Bakery, "cuisine", "pretzel"),
    TagRule::kv(C::HairSalon, "shop", "hairdresser"),
    TagRule::kv(C::ClothesStore, "shop", "clothes"),
    TagRule::kv(C::ClothesStore, "shop", "shoes"),
    TagRule::kv(C::Park, "leisure", "park"),
];

const FOURSQUARE_RULES: &[TagRule] = &[
    TagRule::label(C::Restaurant, "Restaurant"),
    TagRule::label(C::Restaurant, "Buffet"),
    TagRule::label(C::Restaurant, "Diner"),
    TagRule::label(C::Restaurant, "Bar"),
    TagRule::label(C::Restaurant, "Pizzeria"),
    TagRule::label(C::Restaurant, "Steakhouse"),
    TagRule::label(C::Restaurant, "Food and Beverage Retail"),
    TagRule::label(C::Restaurant, "African Restaurant"),
    TagRule::label(C::Restaurant, "American Restaurant"),
    TagRule::label(C::Restaurant, "Chinese Restaurant"),
    TagRule::label(C::Restaurant, "Hawaiian Restaurant"),
    TagRule::label(C::Restaurant, "Italian Restaurant"),
    TagRule::label(C::Restaurant, "Indian Restaurant"),
    TagRule::label(C::Restaurant, "Mexican Restaurant"),
    TagRule::label(C::Restaurant, "Middle Eastern Restaurant"),
    TagRule::label(C::Restaurant, "Seafood Restaurant"),
    TagRule::label(C::Cafe, "Café"),
    TagRule::label(C::Cafe, "Coffee Shop"),
    TagRule::label(C::Cafe, "Cafes, Coffee, and Tea Houses"),
    TagRule::label(C::Sweetshop, "Dessert Shop"),
    TagRule::label(C::MovieTheater, "Movie Theater"),
    TagRule::label(C::Pharmacy, "Drugstore"),
    TagRule::label(C::PostOffice, "Post Office"),
    TagRule::label(C::ArtGallery, "Art Museum"),
    TagRule::label(C::ArtGallery, "Art School"),
    TagRule::label(C::Station, "Tram Station"),
    TagRule::label(C::Station, "Rail Station"),
    TagRule::label(C::BurgerPlace, "Fast Food Restaurant"),
    TagRule::label(C::BurgerPlace, "Burger Joint"),
    TagRule::label(C::MiniMart, "Convenience Store"),
    TagRule::label(C::Supermarket, "Grocery Store / Supermarket"),
    TagRule::label(C::Bakery, "Bakery"),
    TagRule::label(C::HairSalon, "Hair Salon"),
    TagRule::label(C::HairSalon, "Barbershop"),
    TagRule::label(C::HairSalon, "Health and Beauty Service"),
    TagRule::label(C::ClothesStore, "Clothing Store"),
    TagRule::label(C::ClothesStore, "Shoe Store"),
    TagRule::label(C::ClothesStore, "Fashion Retail"),
    TagRule::label(C::Park, "Park"),
];

const GOOGLE_PLACES_RULES: &[TagRule] = &[
    TagRule::label(C::Restaurant, "restaurant"),
    TagRule::label(C::Cafe, "cafe"),
    TagRule::label(C::MovieTheater, "movie_theater"),
    TagRule::label(C::Pharmacy, "drugstore"),
    TagRule::label(C::Pharmacy, "pharmacy"),
    TagRule::label(C::ArtGallery, "art_gallery"),
    TagRule::label(C::Station, "transit_station"),
    TagRule::label(C::MiniMart, "convenience_store"),
    TagRule::label(C::Supermarket, "grocery_or_supermarket"),
    TagRule::label(C::Supermarket, "supermarket"),
    TagRule::label(C::Bakery, "bakery"),
    TagRule::label(C::HairSalon, "beauty_salon"),
    TagRule::label(C::HairSalon, "hair_care"),
    TagRule::label(C::ClothesStore, "shoe_store"),
    TagRule::label(C::ClothesStore, "clothing_store"),
];

const YELP_RULES: &[TagRule] = &[
    TagRule::label(C::Restaurant, "chinese"),
    TagRule::label(C::Restaurant, "steak"),
    TagRule::label(C::Restaurant, "sandwiches"),
    TagRule::label(C::Restaurant, "pizza"),
    TagRule::label(C::Restaurant, "bars"),
    TagRule::label(C::Restaurant, "mexican"),
    TagRule::label(C::Restaurant, "buffets"),
    TagRule::label(C::Restaurant, "tradamerican"),
    TagRule::label(C::Restaurant, "newamerican"),
    TagRule::label(C::Restaurant, "icecream"),
    TagRule::label(C::Restaurant, "italian"),
    TagRule::label(C::Restaurant, "serbocroatian"),
    TagRule::label(C::Restaurant, "mediterranean"),
    TagRule::label(C::Restaurant, "bbq"),
    TagRule::label(C::Restaurant, "hawaiian"),
    TagRule::label(C::Restaurant, "restaurants"),
    TagRule::label(C::Cafe, "cafes"),
    TagRule::label(C::Cafe, "coffee"),
    TagRule::label(C::Sweetshop, "desserts"),
    TagRule::label(C::Sweetshop, "customcakes"),
    TagRule::label(C::MovieTheater, "movietheaters"),
    TagRule::label(C::Pharmacy, "drugstores"),
    TagRule::label(C::ArtGallery, "galleries"),
    TagRule::label(C::ArtGallery, "artschools"),
    TagRule::label(C::ArtGallery, "artclasses"),
    TagRule::label(C::Station, "trainstations"),
    TagRule::label(C::BurgerPlace, "burgers"),
    TagRule::label(C::MiniMart, "convenience"),
    TagRule::label(C::Supermarket, "grocery"),
    TagRule::label(C::Bakery, "bakeries"),
    TagRule::label(C::HairSalon, "hair"),
    TagRule::label(C::HairSalon, "barbers"),
    TagRule::label(C::HairSalon, "menshair"),
    TagRule::label(C::ClothesStore, "shoes"),
    TagRule::label(C::ClothesStore, "menscloth"),
    TagRule::label(C::ClothesStore, "womenscloth"),
    TagRule::label(C::ClothesStore, "sportswear"),
    TagRule::label(C::ClothesStore, "leather"),
];

/// The static rule table of `provider`.
pub fn rules_for(provider: Provider) -> &'static [TagRule] {
    match provider {
        Provider::Osm => OSM_RULES,
        Provider::Foursquare => FOURSQUARE_RULES,
        Provider::GooglePlaces => GOOGLE_PLACES_RULES,
        Provider::Yelp => YELP_RULES,
    }
}

/// Whether `place` carries `tag`, read the way `provider` encodes labels.
fn carries(provider: Provider, place: &RawPlace, tag: NativeTag) -> bool {
    match tag {
        NativeTag::KeyValue(key, value) => place.tag(key) == Some(value),
        NativeTag::Label(label) => match provider {
            Provider::Foursquare => place.nested_strings("categories", "name").any(|n| n == label),
            Provider::Yelp => place.nested_strings("categories", "alias").any(|a| a == label),
            Provider::GooglePlaces => place.strings("types").any(|t| t == label),
            Provider::Osm => false,
        },
    }
}

/// Apply `provider`'s table to one raw record.
///
/// Yields at most one prediction per category, in table order, labelled with
/// the first matching tag.
pub fn classify(
    provider: Provider,
    place: &RawPlace,
    observed_at: NaiveDate,
    cutoff: NaiveDate,
) -> Vec<Prediction> {
    let mut out: Vec<Prediction> = Vec::new();
    for rule in rules_for(provider) {
        if out.iter().any(|p| p.category == rule.category) {
            continue;
        }
        if rule.applies_at(observed_at, cutoff) && carries(provider, place, rule.tag) {
            out.push(Prediction::new(rule.category, provider, rule.tag.label()));
        }
    }
    out
}

/// Native tags that map to `category` for `provider`, ignoring dates.
pub fn tags_for(provider: Provider, category: Category) -> Vec<NativeTag> {
    rules_for(provider)
        .iter()
        .filter(|r| r.category == category)
        .map(|r| r.tag)
        .collect()
}

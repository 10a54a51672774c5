//! Fruit records as served by the catalog API.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// A single fruit as decoded from the catalog endpoint.
///
/// `name` is the natural key: attachments and report pages refer to a fruit
/// by name, never by a generated identifier. Extra fields in the payload
/// (the upstream API also sends a numeric `id`) are ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FruitRecord {
    pub name: String,
    pub genus: String,
    pub family: String,
    pub order: String,
    pub nutritions: NutritionInfo,
}

/// Nutrition figures per 100g.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct NutritionInfo {
    pub carbohydrates: f64,
    pub protein: f64,
    pub fat: f64,
    pub calories: f64,
    pub sugar: f64,
}

impl NutritionInfo {
    /// All figures are finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [
            self.carbohydrates,
            self.protein,
            self.fat,
            self.calories,
            self.sugar,
        ]
        .iter()
        .all(|value| value.is_finite() && *value >= 0.0)
    }
}

/// The in-memory catalog for the current session, in upstream order.
#[derive(Serialize, Clone, Debug, Default)]
pub struct Catalog {
    fruits: Vec<FruitRecord>,
}

impl Catalog {
    /// Build a catalog from decoded records.
    ///
    /// Names must be unique within one fetch: the first record with a given
    /// name wins and later duplicates are dropped. Records with a blank name
    /// or invalid nutrition figures are dropped as well.
    pub fn from_records(records: Vec<FruitRecord>) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let mut fruits = Vec::with_capacity(records.len());

        for record in records {
            if record.name.trim().is_empty() {
                warn!("dropping catalog record with an empty name");
                continue;
            }
            if !record.nutritions.is_valid() {
                warn!("dropping `{}`: invalid nutrition figures", record.name);
                continue;
            }
            if !seen.insert(record.name.clone()) {
                warn!("dropping duplicate catalog record `{}`", record.name);
                continue;
            }
            fruits.push(record);
        }

        Self { fruits }
    }

    pub fn fruits(&self) -> &[FruitRecord] {
        &self.fruits
    }

    pub fn get(&self, name: &str) -> Option<&FruitRecord> {
        self.fruits.iter().find(|fruit| fruit.name == name)
    }

    pub fn len(&self) -> usize {
        self.fruits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fruits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fruit;

    #[test]
    fn duplicate_names_keep_the_first_record() {
        let mut second = fruit("Apple", "Other", 1.0);
        second.genus = "Duplicate".into();
        let catalog = Catalog::from_records(vec![
            fruit("Apple", "Rosaceae", 52.0),
            fruit("Banana", "Musaceae", 96.0),
            second,
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Apple").map(|f| f.family.as_str()), Some("Rosaceae"));
        let names: Vec<_> = catalog.fruits().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Apple", "Banana"]);
    }

    #[test]
    fn blank_names_and_negative_figures_are_dropped() {
        let mut negative = fruit("Lemon", "Rutaceae", 29.0);
        negative.nutritions.sugar = -1.0;
        let catalog = Catalog::from_records(vec![fruit("  ", "Nameless", 1.0), negative]);

        assert!(catalog.is_empty());
    }

    #[test]
    fn decodes_upstream_payload_and_ignores_unknown_fields() {
        let body = r#"{
            "name": "Apple", "id": 6, "family": "Rosaceae", "order": "Rosales",
            "genus": "Malus",
            "nutritions": {"calories": 52, "fat": 0.4, "sugar": 10.3,
                           "carbohydrates": 11.4, "protein": 0.3}
        }"#;
        let record: FruitRecord = serde_json::from_str(body).unwrap();

        assert_eq!(record.name, "Apple");
        assert_eq!(record.genus, "Malus");
        assert_eq!(record.nutritions.calories, 52.0);
        assert!(record.nutritions.is_valid());
    }
}

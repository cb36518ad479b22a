//! The fixed scrap category table shared by entry input, pricing and reporting.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScrapCategory {
  Heavy,
  Light,
  Cast,
  Soft,
  Hard,
  Brass,
  Copper,
  Battery,
  Radiator,
  Boots,
  Yellow,
  Black,
  Sandals,
  Basins,
}

impl ScrapCategory {
  pub const ALL: [ScrapCategory; 14] = [
    ScrapCategory::Heavy,
    ScrapCategory::Light,
    ScrapCategory::Cast,
    ScrapCategory::Soft,
    ScrapCategory::Hard,
    ScrapCategory::Brass,
    ScrapCategory::Copper,
    ScrapCategory::Battery,
    ScrapCategory::Radiator,
    ScrapCategory::Boots,
    ScrapCategory::Yellow,
    ScrapCategory::Black,
    ScrapCategory::Sandals,
    ScrapCategory::Basins,
  ];

  pub fn name(self) -> &'static str {
    match self {
      ScrapCategory::Heavy => "Heavy",
      ScrapCategory::Light => "Light",
      ScrapCategory::Cast => "Cast",
      ScrapCategory::Soft => "Soft",
      ScrapCategory::Hard => "Hard",
      ScrapCategory::Brass => "Brass",
      ScrapCategory::Copper => "Copper",
      ScrapCategory::Battery => "Battery",
      ScrapCategory::Radiator => "Radiator",
      ScrapCategory::Boots => "Boots",
      ScrapCategory::Yellow => "Yellow",
      ScrapCategory::Black => "Black",
      ScrapCategory::Sandals => "Sandals",
      ScrapCategory::Basins => "Basins",
    }
  }

  /// Position in the enumeration, used as the stored sort key.
  pub fn position(self) -> i64 {
    Self::ALL.iter().position(|c| *c == self).unwrap_or(0) as i64
  }

  pub fn from_name(name: &str) -> Option<Self> {
    let trimmed = name.trim();
    Self::ALL
      .iter()
      .copied()
      .find(|category| category.name().eq_ignore_ascii_case(trimmed))
  }

  /// Exact key lookup for weight maps; other spellings are unknown keys.
  pub fn from_key(key: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|category| category.name() == key)
  }

  pub fn parse(name: &str) -> Result<Self, LedgerError> {
    Self::from_name(name).ok_or_else(|| LedgerError::UnknownCategory(name.to_string()))
  }
}

impl fmt::Display for ScrapCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Weight per category. Always carries every category; absent input keys are 0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "HashMap<String, f64>")]
pub struct CategoryWeights(BTreeMap<ScrapCategory, f64>);

impl CategoryWeights {
  pub fn zero() -> Self {
    Self(ScrapCategory::ALL.iter().map(|c| (*c, 0.0)).collect())
  }

  /// Builds weights from operator input. Keys must match a category name exactly
  /// and anything else is ignored. A negative or non-finite weight on a known key
  /// is rejected.
  pub fn from_input(raw: &HashMap<String, f64>) -> Result<Self, LedgerError> {
    let mut weights = Self::zero();
    for (key, value) in raw {
      let Some(category) = ScrapCategory::from_key(key) else {
        continue;
      };
      if !value.is_finite() || *value < 0.0 {
        return Err(LedgerError::InvalidWeight {
          category: category.name().to_string(),
          value: *value,
        });
      }
      weights.0.insert(category, *value);
    }
    Ok(weights)
  }

  pub fn get(&self, category: ScrapCategory) -> f64 {
    self.0.get(&category).copied().unwrap_or(0.0)
  }

  pub fn set(&mut self, category: ScrapCategory, weight: f64) {
    self.0.insert(category, weight.max(0.0));
  }

  pub fn total(&self) -> f64 {
    self.0.values().sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = (ScrapCategory, f64)> + '_ {
    self.0.iter().map(|(c, w)| (*c, *w))
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
  }

  /// Lenient read of a stored weight map.
  pub fn from_json(raw: &str) -> Self {
    serde_json::from_str::<HashMap<String, f64>>(raw)
      .map(Self::from)
      .unwrap_or_else(|_| Self::zero())
  }
}

impl Default for CategoryWeights {
  fn default() -> Self {
    Self::zero()
  }
}

impl From<HashMap<String, f64>> for CategoryWeights {
  fn from(raw: HashMap<String, f64>) -> Self {
    let mut weights = Self::zero();
    for (key, value) in raw {
      if let Some(category) = ScrapCategory::from_key(&key) {
        if value.is_finite() {
          weights.set(category, value);
        }
      }
    }
    weights
  }
}

impl Serialize for CategoryWeights {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for (category, weight) in &self.0 {
      map.serialize_entry(category.name(), weight)?;
    }
    map.end()
  }
}

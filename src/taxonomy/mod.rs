//! Keyword tables for housing-type classification and neighborhood
//! resolution.
//!
//! Both tables are first-match-wins, so declaration order matters. The TOML
//! schema uses arrays of tables (`[[housing_types]]`, `[[cities]]`) because
//! arrays keep their order through deserialization; keyed tables do not.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

const DEFAULT_TAXONOMY: &str = r#"
[[housing_types]]
name = "studio"
keywords = ["studio", "chambre moderne", "chambre meublée", "chambre simple"]

[[housing_types]]
name = "one_bedroom"
keywords = ["1 chambre", "une chambre", "1 bedroom", "one bedroom", "t2", "f2"]

[[housing_types]]
name = "two_bedroom"
keywords = ["2 chambres", "deux chambres", "2 bedroom", "two bedroom", "t3", "f3"]

[[housing_types]]
name = "three_plus_bedroom"
keywords = [
    "3 chambres", "4 chambres", "5 chambres", "trois chambres",
    "3 bedroom", "4 bedroom", "three bedroom", "t4", "f4", "t5", "f5",
]

[[housing_types]]
name = "villa"
keywords = ["villa", "duplex", "maison individuelle"]

[[housing_types]]
name = "apartment"
keywords = ["appartement", "apartment", "appart"]

[[cities]]
name = "douala"

  [[cities.neighborhoods]]
  name = "Bonapriso"
  variants = ["bonapriso"]

  [[cities.neighborhoods]]
  name = "Bonanjo"
  variants = ["bonanjo"]

  [[cities.neighborhoods]]
  name = "Akwa"
  variants = ["akwa"]

  [[cities.neighborhoods]]
  name = "Bonamoussadi"
  variants = ["bonamoussadi", "bonamousadi", "bonamoussady"]

  [[cities.neighborhoods]]
  name = "Makepe"
  variants = ["makepe", "makèpè"]

  [[cities.neighborhoods]]
  name = "Kotto"
  variants = ["kotto"]

  [[cities.neighborhoods]]
  name = "Logpom"
  variants = ["logpom"]

  [[cities.neighborhoods]]
  name = "Deido"
  variants = ["deido", "deïdo"]

  [[cities.neighborhoods]]
  name = "Bali"
  variants = ["bali"]

  [[cities.neighborhoods]]
  name = "Bonaberi"
  variants = ["bonaberi", "bonabéri"]

  [[cities.neighborhoods]]
  name = "Logbessou"
  variants = ["logbessou"]

  [[cities.neighborhoods]]
  name = "PK"
  variants = ["pk8", "pk10", "pk12", "pk14"]

[[cities]]
name = "yaounde"

  [[cities.neighborhoods]]
  name = "Bastos"
  variants = ["bastos"]

  [[cities.neighborhoods]]
  name = "Golf"
  variants = ["golf"]

  [[cities.neighborhoods]]
  name = "Omnisport"
  variants = ["omnisport", "omnisports"]

  [[cities.neighborhoods]]
  name = "Essos"
  variants = ["essos"]

  [[cities.neighborhoods]]
  name = "Mvan"
  variants = ["mvan"]

  [[cities.neighborhoods]]
  name = "Biyem-Assi"
  variants = ["biyem-assi", "biyem assi", "biyemassi"]

  [[cities.neighborhoods]]
  name = "Ngousso"
  variants = ["ngousso"]

  [[cities.neighborhoods]]
  name = "Odza"
  variants = ["odza"]

  [[cities.neighborhoods]]
  name = "Santa Barbara"
  variants = ["santa barbara", "santa-barbara"]

  [[cities.neighborhoods]]
  name = "Mimboman"
  variants = ["mimboman"]

  [[cities.neighborhoods]]
  name = "Nlongkak"
  variants = ["nlongkak"]
"#;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Taxonomy {
    #[serde(default)]
    pub housing_types: Vec<HousingCategory>,
    #[serde(default)]
    pub cities: Vec<CityNeighborhoods>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HousingCategory {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CityNeighborhoods {
    pub name: String,
    #[serde(default)]
    pub neighborhoods: Vec<CanonicalNeighborhood>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CanonicalNeighborhood {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Taxonomy {
    /// Built-in Douala / Yaoundé tables.
    pub fn defaults() -> Self {
        // Parsing a compile-time constant; covered by `defaults_parse`.
        Self::from_toml_str(DEFAULT_TAXONOMY).unwrap_or_default()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let taxonomy: Taxonomy = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(taxonomy.cleaned())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let taxonomy: Taxonomy = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()
            .with_context(|| format!("read taxonomy {:?}", path))?
            .try_deserialize()
            .with_context(|| format!("parse taxonomy {:?}", path))?;
        Ok(taxonomy.cleaned())
    }

    /// Configured file if any, built-in tables otherwise. A broken file
    /// degrades to empty tables so resolvers use their fallbacks.
    pub fn load_or_degrade(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::defaults();
        };

        match Self::from_path(path) {
            Ok(t) => {
                debug!(
                    "Taxonomy {:?}: {} housing types, {} cities",
                    path,
                    t.housing_types.len(),
                    t.cities.len()
                );
                t
            }
            Err(e) => {
                error!("Failed to load taxonomy: {:#}; continuing with empty tables", e);
                Self::default()
            }
        }
    }

    /// Neighborhood table for a (lowercased) city, if configured.
    pub fn city(&self, city: &str) -> Option<&CityNeighborhoods> {
        self.cities.iter().find(|c| c.name == city)
    }

    /// Lowercase and trim keys, drop blank entries so an empty string can
    /// never act as a match-everything keyword.
    fn cleaned(mut self) -> Self {
        for cat in &mut self.housing_types {
            cat.name = cat.name.trim().to_string();
            cat.keywords = clean_terms(&cat.keywords);
        }
        self.housing_types.retain(|c| !c.name.is_empty());

        for city in &mut self.cities {
            city.name = city.name.trim().to_lowercase();
            for n in &mut city.neighborhoods {
                n.name = n.name.trim().to_string();
                n.variants = clean_terms(&n.variants);
            }
            city.neighborhoods.retain(|n| !n.name.is_empty());
        }
        self.cities.retain(|c| !c.name.is_empty());
        self
    }
}

fn clean_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

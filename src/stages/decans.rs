//! Decan resolver: (sidereal Sun sign, degree) to one of 37 decan records.
//!
//! Twelve signs split into three 10° bands; Ophiuchus has a single special
//! decan (number 37) selected regardless of degree.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use super::signs::ZodiacSign;
use crate::error::ConfigGap;

/// One configured decan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecanRecord {
    pub deity: String,
    pub title: String,
    pub tool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecanProfile {
    /// 1..=37
    pub number: usize,
    /// e.g. "2. Dekan Krebs (10°–20°)"
    pub range: String,
    pub deity: String,
    pub title: String,
    pub tool: String,
}

/// Decan records per sign, loaded from a TOML document of the form
///
/// ```toml
/// [[widder]]
/// deity = "..."
/// title = "..."
/// tool = "..."
/// ```
#[derive(Debug, Clone, Default)]
pub struct DecanTable {
    entries: HashMap<ZodiacSign, Vec<DecanRecord>>,
}

impl DecanTable {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigGap> {
        let parsed: BTreeMap<String, Vec<DecanRecord>> =
            toml::from_str(raw).map_err(|e| ConfigGap::MalformedTable {
                table: "decans",
                reason: e.to_string(),
            })?;

        let mut entries = HashMap::new();
        for (key, records) in parsed {
            let sign = ZodiacSign::from_table_key(&key).ok_or_else(|| ConfigGap::MalformedTable {
                table: "decans",
                reason: format!("unknown sign key '{key}'"),
            })?;
            entries.insert(sign, records);
        }

        let table = Self { entries };
        for (sign, missing) in table.gaps() {
            warn!(sign = %sign, missing, "Decan table incomplete");
        }
        Ok(table)
    }

    /// Signs with fewer records than bands, and how many are missing.
    pub fn gaps(&self) -> Vec<(ZodiacSign, usize)> {
        ZodiacSign::ALL
            .into_iter()
            .filter_map(|sign| {
                let expected = if sign == ZodiacSign::Ophiuchus { 1 } else { 3 };
                let have = self.entries.get(&sign).map_or(0, Vec::len);
                (have < expected).then_some((sign, expected - have))
            })
            .collect()
    }

    /// Total number of configured records.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a domain sign name and degree-within-sign.
    pub fn resolve(&self, sign_name: &str, degree: f64) -> Result<DecanProfile, ConfigGap> {
        let sign =
            ZodiacSign::from_name(sign_name).ok_or_else(|| ConfigGap::UnknownSign(sign_name.to_string()))?;

        let (band, range) = if sign == ZodiacSign::Ophiuchus {
            (0, "Ophiuchus (Sonder-Dekan)".to_string())
        } else {
            let band = if degree < 10.0 {
                0
            } else if degree < 20.0 {
                1
            } else {
                2
            };
            let lo = band * 10;
            (band, format!("{}. Dekan {} ({}°–{}°)", band + 1, sign, lo, lo + 10))
        };

        let record = self
            .entries
            .get(&sign)
            .and_then(|records| records.get(band))
            .ok_or_else(|| ConfigGap::DecanNotConfigured {
                sign: sign.name().to_string(),
                band: band + 1,
            })?;

        let number = sign.decan_offset() + band + 1;
        info!(sign = %sign, degree, number, deity = %record.deity, "Decan resolved");
        Ok(DecanProfile {
            number,
            range,
            deity: record.deity.clone(),
            title: record.title.clone(),
            tool: record.tool.clone(),
        })
    }
}

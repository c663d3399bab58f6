//! Sign translator
//!
//! Maps ephemeris sign codes to the German sign names used in every result,
//! and tests membership of the fixed 13th-sign zone.

use serde::{Deserialize, Serialize};

use crate::config::defaults::{OPHIUCHUS_END_DEG, OPHIUCHUS_START_DEG};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZodiacSign {
    #[serde(rename = "Widder")]
    Aries,
    #[serde(rename = "Stier")]
    Taurus,
    #[serde(rename = "Zwillinge")]
    Gemini,
    #[serde(rename = "Krebs")]
    Cancer,
    #[serde(rename = "Löwe")]
    Leo,
    #[serde(rename = "Jungfrau")]
    Virgo,
    #[serde(rename = "Waage")]
    Libra,
    #[serde(rename = "Skorpion")]
    Scorpio,
    #[serde(rename = "Schütze")]
    Sagittarius,
    #[serde(rename = "Steinbock")]
    Capricorn,
    #[serde(rename = "Wassermann")]
    Aquarius,
    #[serde(rename = "Fische")]
    Pisces,
    #[serde(rename = "Ophiuchus")]
    Ophiuchus,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 13] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
        ZodiacSign::Ophiuchus,
    ];

    /// Domain name as it appears in results.
    pub const fn name(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Widder",
            ZodiacSign::Taurus => "Stier",
            ZodiacSign::Gemini => "Zwillinge",
            ZodiacSign::Cancer => "Krebs",
            ZodiacSign::Leo => "Löwe",
            ZodiacSign::Virgo => "Jungfrau",
            ZodiacSign::Libra => "Waage",
            ZodiacSign::Scorpio => "Skorpion",
            ZodiacSign::Sagittarius => "Schütze",
            ZodiacSign::Capricorn => "Steinbock",
            ZodiacSign::Aquarius => "Wassermann",
            ZodiacSign::Pisces => "Fische",
            ZodiacSign::Ophiuchus => "Ophiuchus",
        }
    }

    /// Three-letter engine code.
    pub const fn code(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Ari",
            ZodiacSign::Taurus => "Tau",
            ZodiacSign::Gemini => "Gem",
            ZodiacSign::Cancer => "Can",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Vir",
            ZodiacSign::Libra => "Lib",
            ZodiacSign::Scorpio => "Sco",
            ZodiacSign::Sagittarius => "Sag",
            ZodiacSign::Capricorn => "Cap",
            ZodiacSign::Aquarius => "Aqu",
            ZodiacSign::Pisces => "Pis",
            ZodiacSign::Ophiuchus => "Oph",
        }
    }

    /// ASCII key used in table files (`loewe`, `schuetze`, ...).
    pub const fn table_key(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "widder",
            ZodiacSign::Taurus => "stier",
            ZodiacSign::Gemini => "zwillinge",
            ZodiacSign::Cancer => "krebs",
            ZodiacSign::Leo => "loewe",
            ZodiacSign::Virgo => "jungfrau",
            ZodiacSign::Libra => "waage",
            ZodiacSign::Scorpio => "skorpion",
            ZodiacSign::Sagittarius => "schuetze",
            ZodiacSign::Capricorn => "steinbock",
            ZodiacSign::Aquarius => "wassermann",
            ZodiacSign::Pisces => "fische",
            ZodiacSign::Ophiuchus => "ophiuchus",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn from_table_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.table_key() == key)
    }

    /// Decans numbered before this sign's first one.
    pub const fn decan_offset(self) -> usize {
        match self {
            ZodiacSign::Ophiuchus => 36,
            other => other as usize * 3,
        }
    }
}

impl std::fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine code to domain name. Unknown codes pass through unchanged.
pub fn translate_sign(code: &str) -> String {
    ZodiacSign::from_code(code)
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Sidereal longitude inside the 13th-sign zone, `[240°, 266°)`.
pub fn in_ophiuchus_zone(longitude: f64) -> bool {
    (OPHIUCHUS_START_DEG..OPHIUCHUS_END_DEG).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_known_codes() {
        assert_eq!(translate_sign("Ari"), "Widder");
        assert_eq!(translate_sign("Leo"), "Löwe");
        assert_eq!(translate_sign("Sag"), "Schütze");
        assert_eq!(translate_sign("Pis"), "Fische");
    }

    #[test]
    fn test_unknown_code_passes_through() {
        assert_eq!(translate_sign("Xyz"), "Xyz");
        assert_eq!(translate_sign(""), "");
    }

    #[test]
    fn test_ophiuchus_zone_is_half_open() {
        assert!(!in_ophiuchus_zone(239.99));
        assert!(in_ophiuchus_zone(240.0));
        assert!(in_ophiuchus_zone(265.99));
        assert!(!in_ophiuchus_zone(266.0));
    }

    #[test]
    fn test_decan_offsets() {
        assert_eq!(ZodiacSign::Aries.decan_offset(), 0);
        assert_eq!(ZodiacSign::Taurus.decan_offset(), 3);
        assert_eq!(ZodiacSign::Pisces.decan_offset(), 33);
        assert_eq!(ZodiacSign::Ophiuchus.decan_offset(), 36);
    }

    #[test]
    fn test_lookups_are_consistent() {
        for sign in ZodiacSign::ALL {
            assert_eq!(ZodiacSign::from_code(sign.code()), Some(sign));
            assert_eq!(ZodiacSign::from_name(sign.name()), Some(sign));
            assert_eq!(ZodiacSign::from_table_key(sign.table_key()), Some(sign));
            assert_eq!(
                serde_json::to_string(&sign).unwrap(),
                format!("\"{}\"", sign.name())
            );
        }
    }
}

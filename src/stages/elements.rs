//! Element resolver: sidereal Sun sign to element family.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::signs::ZodiacSign;
use crate::error::ConfigGap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    #[serde(rename = "Feuer")]
    Fire,
    #[serde(rename = "Erde")]
    Earth,
    #[serde(rename = "Luft")]
    Air,
    #[serde(rename = "Wasser")]
    Water,
    /// The 13th sign's own family
    #[serde(rename = "Feuer-Wasser")]
    FireWater,
}

struct ElementInfo {
    element: Element,
    signs: &'static [ZodiacSign],
    traits: &'static str,
    shadow: &'static str,
}

const ELEMENTS: [ElementInfo; 5] = [
    ElementInfo {
        element: Element::Fire,
        signs: &[ZodiacSign::Aries, ZodiacSign::Leo, ZodiacSign::Sagittarius],
        traits: "Dynamisch, initiativ, leidenschaftlich",
        shadow: "Impulsiv, aggressiv, ungeduldig",
    },
    ElementInfo {
        element: Element::Earth,
        signs: &[ZodiacSign::Taurus, ZodiacSign::Virgo, ZodiacSign::Capricorn],
        traits: "Stabil, praktisch, zuverlässig",
        shadow: "Starr, materialistisch, langsam",
    },
    ElementInfo {
        element: Element::Air,
        signs: &[ZodiacSign::Gemini, ZodiacSign::Libra, ZodiacSign::Aquarius],
        traits: "Intellektuell, kommunikativ, sozial",
        shadow: "Oberflächlich, unbeständig, distanziert",
    },
    ElementInfo {
        element: Element::Water,
        signs: &[ZodiacSign::Cancer, ZodiacSign::Scorpio, ZodiacSign::Pisces],
        traits: "Emotional, intuitiv, empathisch",
        shadow: "Launisch, manipulativ, abhängig",
    },
    ElementInfo {
        element: Element::FireWater,
        signs: &[ZodiacSign::Ophiuchus],
        traits: "Transformativ, heilend, alchemistisch",
        shadow: "Konfliktgeladen, intensiv, extrem",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementProfile {
    pub element: Element,
    pub traits: String,
    pub shadow: String,
}

/// Reverse index sign -> element, built once with the other static tables.
#[derive(Debug, Clone)]
pub struct ElementIndex {
    by_sign: HashMap<ZodiacSign, usize>,
}

impl ElementIndex {
    pub fn builtin() -> Self {
        let by_sign = ELEMENTS
            .iter()
            .enumerate()
            .flat_map(|(i, info)| info.signs.iter().map(move |&s| (s, i)))
            .collect();
        Self { by_sign }
    }

    /// Resolve a domain sign name.
    pub fn resolve(&self, sign_name: &str) -> Result<ElementProfile, ConfigGap> {
        let info = ZodiacSign::from_name(sign_name)
            .and_then(|sign| self.by_sign.get(&sign))
            .map(|&i| &ELEMENTS[i])
            .ok_or_else(|| ConfigGap::UnknownSign(sign_name.to_string()))?;

        info!(sign = %sign_name, element = ?info.element, "Element resolved");
        Ok(ElementProfile {
            element: info.element,
            traits: info.traits.to_string(),
            shadow: info.shadow.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_sign.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sign.is_empty()
    }
}

//! Gate / channel / center classifier
//!
//! Maps the tracked body longitudes of two tropical charts (the birth moment
//! and 88 days earlier) onto a fixed 64-slot wheel, finds fully activated
//! channels, derives the defined centers and resolves the profile type.
//!
//! ## Decision table (first match wins)
//!
//! | Condition | Type |
//! |---|---|
//! | no center defined | Reflector |
//! | sacral defined, motor reaches throat | Manifesting Generator |
//! | sacral defined | Generator |
//! | motor reaches throat | Manifestor |
//! | otherwise | Projector |
//!
//! The wheel order and the channel wiring are domain tables reproduced
//! as-is, not derived.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::info;

use crate::config::defaults::{DESIGN_OFFSET_DAYS, GATE_SPAN_DEG};
use crate::ephemeris::{chart_within, ChartPositions, ChartRequest, EphemerisEngine, ReferenceFrame};
use crate::error::{ConfigGap, StageError};

// ============================================================================
// Gate Wheel
// ============================================================================

/// Gate numbers by slot, slot `i` starting at `i * 5.625°`.
pub const GATE_WHEEL: [u8; 64] = [
    17, 21, 51, 42, 3, 27, 24, 2, //
    23, 8, 20, 16, 35, 45, 12, 15, //
    52, 39, 53, 62, 56, 31, 33, 7, //
    4, 29, 59, 40, 64, 47, 6, 46, //
    18, 48, 57, 32, 50, 28, 44, 1, //
    43, 14, 34, 9, 5, 26, 11, 10, //
    58, 38, 54, 61, 60, 41, 19, 13, //
    49, 30, 55, 37, 63, 22, 36, 25, //
];

/// Gate of the last slot whose start is at or below the longitude,
/// wrapping at 360°.
pub fn gate_at(longitude: f64) -> u8 {
    let lon = longitude.rem_euclid(360.0);
    let slot = (0..GATE_WHEEL.len())
        .rev()
        .find(|&i| i as f64 * GATE_SPAN_DEG <= lon)
        .unwrap_or(0);
    GATE_WHEEL[slot]
}

/// Gates activated by one chart's tracked bodies.
pub fn activated_gates(chart: &ChartPositions) -> BTreeSet<u8> {
    chart
        .activation_bodies()
        .into_iter()
        .map(|body| gate_at(body.longitude))
        .collect()
}

// ============================================================================
// Centers and Channels
// ============================================================================

/// Serialized names are the wiring table identifiers. Variants are declared
/// in the order of those names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Center {
    #[serde(rename = "ajna")]
    Ajna,
    #[serde(rename = "g_zentrum")]
    G,
    #[serde(rename = "herz")]
    Heart,
    #[serde(rename = "kehle")]
    Throat,
    #[serde(rename = "kopf")]
    Head,
    #[serde(rename = "milz")]
    Spleen,
    #[serde(rename = "sakral")]
    Sacral,
    #[serde(rename = "solar_plexus")]
    SolarPlexus,
    #[serde(rename = "wurzel")]
    Root,
}

impl Center {
    pub const MOTORS: [Center; 4] = [Center::Sacral, Center::SolarPlexus, Center::Heart, Center::Root];

    pub fn is_motor(self) -> bool {
        Self::MOTORS.contains(&self)
    }
}

/// One row of the wiring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub gates: [u8; 2],
    pub centers: [Center; 2],
}

impl Channel {
    /// Unordered identity of the gate pair.
    pub fn key(&self) -> (u8, u8) {
        let [a, b] = self.gates;
        (a.min(b), a.max(b))
    }
}

#[derive(Debug, Deserialize)]
struct ChannelFile {
    channel: Vec<Channel>,
}

/// Channel wiring in table order. Rows may repeat a gate pair with swapped
/// endpoints; the first occurrence is the one that counts.
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
    channels: Vec<Channel>,
}

impl ChannelTable {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigGap> {
        let file: ChannelFile = toml::from_str(raw).map_err(|e| ConfigGap::MalformedTable {
            table: "channels",
            reason: e.to_string(),
        })?;

        for ch in &file.channel {
            let [a, b] = ch.gates;
            if !(1..=64).contains(&a) || !(1..=64).contains(&b) || a == b {
                return Err(ConfigGap::MalformedTable {
                    table: "channels",
                    reason: format!("invalid gate pair {a}-{b}"),
                });
            }
            if ch.centers[0] == ch.centers[1] {
                return Err(ConfigGap::MalformedTable {
                    table: "channels",
                    reason: format!("channel {a}-{b} connects a center to itself"),
                });
            }
        }

        Ok(Self { channels: file.channel })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Rows with repeated gate pairs dropped, first occurrence kept.
    pub fn unique(&self) -> impl Iterator<Item = &Channel> {
        let mut seen = HashSet::new();
        self.channels.iter().filter(move |ch| seen.insert(ch.key()))
    }
}

/// Channels whose both gates are active.
pub fn defined_channels<'a>(active: &BTreeSet<u8>, table: &'a ChannelTable) -> Vec<&'a Channel> {
    table
        .unique()
        .filter(|ch| ch.gates.iter().all(|g| active.contains(g)))
        .collect()
}

pub fn defined_centers(channels: &[&Channel]) -> BTreeSet<Center> {
    channels.iter().flat_map(|ch| ch.centers).collect()
}

/// Whether any defined motor reaches the throat over defined channels.
pub fn motor_reaches_throat(channels: &[&Channel], defined: &BTreeSet<Center>) -> bool {
    let mut adjacency: HashMap<Center, Vec<Center>> = HashMap::new();
    for ch in channels {
        let [a, b] = ch.centers;
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    defined
        .iter()
        .copied()
        .filter(|center| center.is_motor())
        .any(|motor| reaches(&adjacency, motor, Center::Throat))
}

fn reaches(adjacency: &HashMap<Center, Vec<Center>>, from: Center, target: Center) -> bool {
    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
        if current == target {
            return true;
        }
        for &next in adjacency.get(&current).into_iter().flatten() {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    false
}

// ============================================================================
// Profile Type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileType {
    #[serde(rename = "Reflektor")]
    Reflector,
    #[serde(rename = "Manifestierender Generator")]
    ManifestingGenerator,
    #[serde(rename = "Generator")]
    Generator,
    #[serde(rename = "Manifestor")]
    Manifestor,
    #[serde(rename = "Projektor")]
    Projector,
}

impl ProfileType {
    pub fn decide(any_center_defined: bool, sacral_defined: bool, motor_to_throat: bool) -> Self {
        if !any_center_defined {
            ProfileType::Reflector
        } else if sacral_defined && motor_to_throat {
            ProfileType::ManifestingGenerator
        } else if sacral_defined {
            ProfileType::Generator
        } else if motor_to_throat {
            ProfileType::Manifestor
        } else {
            ProfileType::Projector
        }
    }

    pub const fn strategy(self) -> &'static str {
        match self {
            ProfileType::Reflector => "Warte einen Mondzyklus (28 Tage)",
            ProfileType::ManifestingGenerator => "Warte auf Response, dann informiere",
            ProfileType::Generator => "Warte auf Response",
            ProfileType::Manifestor => "Informiere bevor du handelst",
            ProfileType::Projector => "Warte auf die Einladung",
        }
    }

    pub const fn authority(self) -> &'static str {
        match self {
            ProfileType::Reflector => "Lunar",
            ProfileType::ManifestingGenerator | ProfileType::Generator => "Sakral",
            ProfileType::Manifestor => "Emotional oder Milz",
            ProfileType::Projector => "Selbst-projiziert oder Milz",
        }
    }

    pub const fn summary(self) -> &'static str {
        match self {
            ProfileType::Reflector => "Du bist ein Spiegel deiner Umgebung, einzigartig und weise.",
            ProfileType::ManifestingGenerator => {
                "Du bist hier um vieles gleichzeitig zu tun. Folge deiner Begeisterung."
            }
            ProfileType::Generator => "Du bist hier um zu tun, was dich begeistert.",
            ProfileType::Manifestor => "Du bist hier um zu initiieren. Informiere dein Umfeld.",
            ProfileType::Projector => "Du bist hier um andere zu leiten. Warte auf Anerkennung.",
        }
    }
}

/// Classifier output. Underscore-prefixed fields are diagnostics and are
/// stripped from exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanDesignProfile {
    #[serde(rename = "type")]
    pub profile_type: ProfileType,
    pub strategy: String,
    pub authority: String,
    pub summary: String,
    /// Only the ten bodies and the node are used, not the full activation set
    #[serde(rename = "_simplified")]
    pub simplified: bool,
    #[serde(rename = "_personality_gates")]
    pub personality_gates: Vec<u8>,
    #[serde(rename = "_design_gates")]
    pub design_gates: Vec<u8>,
    #[serde(rename = "_defined_channels")]
    pub defined_channels: Vec<[u8; 2]>,
    #[serde(rename = "_defined_centers")]
    pub defined_centers: Vec<Center>,
    #[serde(rename = "_motor_to_throat")]
    pub motor_to_throat: bool,
}

/// Classify from the two activated gate sets.
pub fn classify_gates(
    personality: &BTreeSet<u8>,
    design: &BTreeSet<u8>,
    table: &ChannelTable,
) -> HumanDesignProfile {
    let active: BTreeSet<u8> = personality.union(design).copied().collect();
    let channels = defined_channels(&active, table);
    let centers = defined_centers(&channels);
    let sacral = centers.contains(&Center::Sacral);
    let motor_to_throat = motor_reaches_throat(&channels, &centers);
    let profile_type = ProfileType::decide(!centers.is_empty(), sacral, motor_to_throat);

    HumanDesignProfile {
        profile_type,
        strategy: profile_type.strategy().to_string(),
        authority: profile_type.authority().to_string(),
        summary: profile_type.summary().to_string(),
        simplified: true,
        personality_gates: personality.iter().copied().collect(),
        design_gates: design.iter().copied().collect(),
        defined_channels: channels.iter().map(|ch| ch.gates).collect(),
        defined_centers: centers.into_iter().collect(),
        motor_to_throat,
    }
}

/// Classify from the personality and design charts.
pub fn classify(personality: &ChartPositions, design: &ChartPositions, table: &ChannelTable) -> HumanDesignProfile {
    classify_gates(&activated_gates(personality), &activated_gates(design), table)
}

/// Classifier stage: queries the tropical charts for the birth moment and
/// for the design moment, same place and timezone.
pub async fn human_design(
    engine: &dyn EphemerisEngine,
    request: &ChartRequest,
    table: &ChannelTable,
    timeout_secs: u64,
) -> Result<HumanDesignProfile, StageError> {
    let personality_req = request.in_frame(ReferenceFrame::Tropical);
    let design_req = personality_req.days_earlier(DESIGN_OFFSET_DAYS);

    let personality = chart_within(engine, &personality_req, timeout_secs).await?;
    let design = chart_within(engine, &design_req, timeout_secs).await?;
    let profile = classify(&personality, &design, table);

    info!(
        profile_type = ?profile.profile_type,
        motor_to_throat = profile.motor_to_throat,
        centers = profile.defined_centers.len(),
        "Bodygraph classified"
    );
    Ok(profile)
}

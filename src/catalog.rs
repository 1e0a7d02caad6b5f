//! Static, read-only lookup tables (§4.1): races, maps, region-pair→server,
//! and the supplemental ping-quality estimate. None of this holds any
//! mutable state, so it needs no controller wrapper — just free functions
//! over `const`/`lazy_static` tables.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::model::Race;

/// All six race/game combinations, in a fixed display order.
pub fn races() -> &'static [Race] {
    &[
        Race::BwTerran,
        Race::BwZerg,
        Race::BwProtoss,
        Race::Sc2Terran,
        Race::Sc2Zerg,
        Race::Sc2Protoss,
    ]
}

/// 2-char abbreviation: digit is the game (1=BW, 2=SC2), letter is the race.
pub fn race_short_name(race: Race) -> &'static str {
    match race {
        Race::BwTerran => "T1",
        Race::BwZerg => "Z1",
        Race::BwProtoss => "P1",
        Race::Sc2Terran => "T2",
        Race::Sc2Zerg => "Z2",
        Race::Sc2Protoss => "P2",
    }
}

/// Region code of the server chosen as the engine's fallback whenever a
/// requested pair isn't in the cross-table, or a player has no region set.
pub const DEFAULT_REGION: &str = "NAC";

/// Ordered pool of active map codes. A real deployment would load this from
/// the database or a config file; the fixed set here is the engine's
/// built-in default pool (§4.1, §4.6 step 3).
pub fn active_maps() -> &'static [&'static str] {
    &[
        "fighting-spirit",
        "circuit-breaker",
        "polypoid",
        "eye-of-the-storm",
        "neo-moon-glaive",
        "ever-dream",
    ]
}

/// Deterministic map pick for a given match id, round-robining through
/// `active_maps()` (§4.6 step 3: "must be deterministic per match id").
pub fn pick_map(match_id: i64) -> &'static str {
    let maps = active_maps();
    let idx = (match_id.rem_euclid(maps.len() as i64)) as usize;
    maps[idx]
}

/// Rough ping quality between two regions relayed through `server`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PingQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

lazy_static! {
    /// Region-pair → best server region. Keyed on an unordered pair, so
    /// lookups normalize `(a, b)` with `a <= b` before indexing.
    ///
    /// Grounded on `region_mapping.py`'s default cross-table: North America
    /// prefers its own sub-region, Europe prefers `EUW`, East Asia prefers
    /// `KRJ`, Oceania/Southeast Asia share `SEA`, South America prefers `NAE`.
    /// Everything else collapses to `DEFAULT_REGION`.
    static ref CROSS_TABLE: HashMap<(&'static str, &'static str), &'static str> = {
        let mut m = HashMap::new();
        let same: &[&str] = &[
            "NAW", "NAC", "NAE", "CAM", "SAM", "EUW", "EUE", "AFR", "MEA", "SEA", "KRJ", "CHN",
            "THM", "OCE", "USB", "FER",
        ];
        for r in same {
            m.insert((*r, *r), *r);
        }
        let mut pair = |a: &'static str, b: &'static str, server: &'static str| {
            let key = if a <= b { (a, b) } else { (b, a) };
            m.insert(key, server);
        };
        pair("NAW", "NAC", "NAC");
        pair("NAW", "NAE", "NAC");
        pair("NAC", "NAE", "NAC");
        pair("EUW", "EUE", "EUW");
        pair("KRJ", "CHN", "KRJ");
        pair("KRJ", "THM", "KRJ");
        pair("KRJ", "SEA", "KRJ");
        pair("CHN", "THM", "KRJ");
        pair("CHN", "SEA", "KRJ");
        pair("THM", "SEA", "KRJ");
        pair("OCE", "SEA", "SEA");
        pair("OCE", "THM", "SEA");
        pair("SAM", "NAE", "NAE");
        pair("SAM", "CAM", "NAE");
        m
    };

    /// Geographic adjacency used by `ping_quality`'s "Fair" tier.
    static ref CLOSE_REGIONS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m = HashMap::new();
        m.insert("NAW", &["NAC", "NAE"][..]);
        m.insert("NAC", &["NAW", "NAE"][..]);
        m.insert("NAE", &["NAC", "NAW", "CAM"][..]);
        m.insert("EUW", &["EUE"][..]);
        m.insert("EUE", &["EUW"][..]);
        m.insert("KRJ", &["CHN", "THM"][..]);
        m.insert("CHN", &["KRJ", "THM", "SEA"][..]);
        m.insert("THM", &["CHN", "KRJ", "SEA"][..]);
        m.insert("SEA", &["THM", "CHN", "OCE"][..]);
        m.insert("OCE", &["SEA"][..]);
        m
    };
}

/// The server region that minimizes joint latency for a pair of players'
/// regions (§4.1). Falls back to `DEFAULT_REGION` if either region is
/// `None`, empty, or not present in the cross-table.
pub fn best_server(region_a: Option<&str>, region_b: Option<&str>) -> String {
    let (a, b) = match (region_a, region_b) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => (a, b),
        _ => return DEFAULT_REGION.to_string(),
    };
    let key = if a <= b { (a, b) } else { (b, a) };
    CROSS_TABLE
        .iter()
        .find(|(k, _)| **k == key)
        .map(|(_, v)| (*v).to_string())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Supplemental projection (not present in the distilled spec, carried over
/// from `region_mapping.py`'s `estimate_ping_quality`): a coarse quality
/// label for a match's chosen server, shown to players alongside the match
/// announcement.
pub fn ping_quality(region_a: &str, region_b: &str, server: &str) -> PingQuality {
    if region_a == server && region_b == server {
        return PingQuality::Excellent;
    }
    if region_a == server || region_b == server {
        return PingQuality::Good;
    }

    let a_close = CLOSE_REGIONS.get(region_a).copied().unwrap_or(&[]);
    let b_close = CLOSE_REGIONS.get(region_b).copied().unwrap_or(&[]);
    let server_close = CLOSE_REGIONS.get(server).copied().unwrap_or(&[]);

    let a_ok = a_close.contains(&server) || server_close.contains(&region_a);
    let b_ok = b_close.contains(&server) || server_close.contains(&region_b);

    if a_ok && b_ok {
        PingQuality::Fair
    } else {
        PingQuality::Poor
    }
}

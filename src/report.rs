//! Read-only view of the Elite Insights `_detailed_wvw_kill.json` report.
//!
//! Only the fields the session machine and the detail cards consume are
//! modelled; everything else in the document is ignored.

use crate::error::PipelineError;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Suffix Elite Insights appends to the input stem for WvW reports.
pub const REPORT_SUFFIX: &str = "_detailed_wvw_kill";

/// Run folder commander name used when no participant carries the tag.
pub const UNKNOWN_COMMANDER: &str = "UnknownCommander";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedReport {
    pub fight_name: String,
    pub time_start: String,
    pub duration: String,
    pub encounter_duration: String,
    pub players: Vec<Player>,
    pub targets: Vec<Target>,
    pub combat_replay_meta_data: CombatReplayMetaData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    pub name: String,
    pub account: String,
    pub profession: String,
    pub has_commander_tag: bool,
    pub not_in_squad: bool,
    pub stats_all: Vec<PlayerStats>,
    pub dps_all: Vec<DpsEntry>,
    pub dps_targets: Vec<Vec<TargetDps>>,
    pub defenses: Vec<PlayerDefense>,
    pub support: Vec<PlayerSupport>,
    pub stats_targets: Vec<Vec<PlayerStatTarget>>,
    pub combat_replay_data: CombatReplayData,
    pub ext_healing_stats: ExtHealingStats,
    pub ext_barrier_stats: ExtBarrierStats,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DpsEntry {
    pub dps: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetDps {
    pub dps: i64,
    pub damage: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStats {
    #[serde(rename = "totaldmg")]
    pub total_dmg: i64,
    pub downed: i64,
    pub killed: i64,
    pub down_contribution: i64,
    #[serde(rename = "distToCom", deserialize_with = "lenient_f64")]
    pub dist_to_commander: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStatTarget {
    pub downed: i64,
    pub killed: i64,
    pub down_contribution: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerDefense {
    pub down_count: i64,
    pub dead_count: i64,
    pub received_crowd_control: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerSupport {
    pub boon_strips: i64,
    pub condi_cleanse: i64,
    pub condi_cleanse_self: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CombatReplayData {
    /// `[[deathStart, deathEnd], ...]` in milliseconds.
    pub dead: Vec<Vec<serde_json::Value>>,
    pub positions: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CombatReplayMetaData {
    pub polling_rate: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtHealingStats {
    pub outgoing_healing_allies: Vec<Vec<Healing>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Healing {
    pub healing: i64,
    pub hps: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtBarrierStats {
    pub outgoing_barrier: Vec<Barrier>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Barrier {
    pub barrier: i64,
    pub bps: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    pub name: String,
    pub enemy_player: bool,
    #[serde(rename = "isFake")]
    pub is_fake: bool,
    pub stats_all: Vec<TargetStats>,
    pub dps_all: Vec<DpsEntry>,
    pub defenses: Vec<TargetDefense>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetStats {
    #[serde(rename = "totaldmg")]
    pub total_dmg: i64,
    pub downed: i64,
    pub killed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetDefense {
    pub down_count: i64,
    pub dead_count: i64,
}

/// Accepts a number, a numeric string, or anything else (e.g. `"N/A"`) as 0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(f64),
        Str(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(v) => v,
        NumOrString::Str(s) => s.trim().parse().unwrap_or(0.0),
        NumOrString::Other(_) => 0.0,
    })
}

impl ParsedReport {
    /// Account of the first participant carrying the commander tag.
    pub fn commander_account(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.has_commander_tag)
            .map(|p| p.account.as_str())
            .filter(|a| !a.is_empty())
    }

    pub fn commander(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.has_commander_tag)
    }

    pub fn squad(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.not_in_squad)
    }
}

/// Read and decode a report from disk.
pub fn parse_report(path: &Path) -> Result<ParsedReport, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::ParseFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::ParseFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Display name of a report: file stem without the Elite Insights suffix.
pub fn display_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix(REPORT_SUFFIX) {
        Some(base) => base.to_string(),
        None => stem,
    }
}

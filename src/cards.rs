//! Per-fight statistic cards computed from a parsed report.
//!
//! Cards are plain text tables; the TUI styles them and the text mode prints
//! them as-is.

use crate::report::{ParsedReport, Player};
use crate::session::CARD_COUNT;

const TOP: usize = 5;

/// Short titles, indexed like [`build_card`].
pub const CARD_TITLES: [&str; CARD_COUNT] = [
    "Summary", "Fight", "Damage", "Downs", "Cleanses", "Strips", "Deaths", "Healing", "Barrier",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub header: String,
    pub rows: Vec<String>,
}

impl Card {
    fn new(header: String) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }
}

/// Build card `index` (`0..CARD_COUNT`) for `report`.
pub fn build_card(report: &ParsedReport, index: usize) -> Card {
    match index {
        0 => summary_card(report),
        1 => banner_card(report),
        2 => damage_card(report),
        3 => down_contribution_card(report),
        4 => cleanses_card(report),
        5 => strips_card(report),
        6 => death_card(report),
        7 => healing_card(report),
        _ => barrier_card(report),
    }
}

/// `1234567` -> `1,234,567`.
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Distance between two replay positions in game units.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx * dx + dy * dy).sqrt() * 100.0
}

fn map_label(fight_name: &str) -> &'static str {
    const MAPS: [(&str, &str); 4] = [
        ("Detailed WvW - Blue", "BBL"),
        ("Detailed WvW - Red", "RBL"),
        ("Detailed WvW - Green", "GBL"),
        ("Detailed WvW - Eternal", "EBG"),
    ];
    MAPS.iter()
        .find(|(prefix, _)| fight_name.starts_with(*prefix))
        .map_or("PvE", |&(_, label)| label)
}

fn banner_card(report: &ParsedReport) -> Card {
    let start = report.time_start.split(' ').nth(1).unwrap_or_default();
    let mut card = Card::new(format!("{:<9} {:<14} {}", "Location", "Duration", "Fight Start"));
    card.rows.push(format!(
        "{:<9} {:<14} {}",
        map_label(&report.fight_name),
        report.duration,
        start
    ));
    card
}

fn target_totals(p: &Player) -> (i64, i64) {
    p.dps_targets
        .iter()
        .flatten()
        .fold((0, 0), |(dmg, dps), t| (dmg + t.damage, dps + t.dps))
}

fn summary_card(report: &ParsedReport) -> Card {
    let (mut in_squad, mut outside) = (0, 0);
    let (mut dmg, mut dps, mut downs, mut deaths) = (0, 0, 0, 0);
    let (mut enemy_downs, mut enemy_deaths) = (0, 0);

    for p in &report.players {
        if p.not_in_squad {
            outside += 1;
            continue;
        }
        in_squad += 1;
        let (d, s) = target_totals(p);
        dmg += d;
        dps += s;
        if let Some(def) = p.defenses.first() {
            downs += def.down_count;
            deaths += def.dead_count;
        }
        for st in p.stats_targets.iter().flatten() {
            enemy_downs += st.downed;
            enemy_deaths += st.killed;
        }
    }

    let (mut enemies, mut enemy_dmg, mut enemy_dps) = (0, 0, 0);
    for t in report.targets.iter().filter(|t| t.enemy_player && !t.is_fake) {
        enemies += 1;
        enemy_dmg += t.stats_all.first().map_or(0, |s| s.total_dmg);
        enemy_dps += t.dps_all.first().map_or(0, |s| s.dps);
    }

    let mut card = Card::new(format!(
        "{:<15} {:<12} {:<8} {:<5} {}",
        "Fight Balance", "DMG", "DPS", "Downs", "Deaths"
    ));
    card.rows.push(format!(
        "Squad {:<2}({:<2}/{:<2}) {:<12} {:<8} {:<5} {}",
        in_squad + outside,
        in_squad,
        outside,
        format_number(dmg),
        format_number(dps),
        format_number(downs),
        format_number(deaths)
    ));
    card.rows.push(format!(
        "Enemy {:<9} {:<12} {:<8} {:<5} {}",
        enemies,
        format_number(enemy_dmg),
        format_number(enemy_dps),
        format_number(enemy_downs),
        format_number(enemy_deaths)
    ));
    card
}

/// Top entries of `(name, primary, secondary)`, highest primary first.
fn top_rows(mut rows: Vec<(String, i64, i64)>, two_columns: bool) -> Vec<String> {
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows.into_iter()
        .take(TOP)
        .map(|(name, a, b)| {
            if two_columns {
                format!("{:<20} {:<10} {}", name, format_number(a), format_number(b))
            } else {
                format!("{:<20} {}", name, format_number(a))
            }
        })
        .collect()
}

fn damage_card(report: &ParsedReport) -> Card {
    let rows = report
        .squad()
        .map(|p| {
            let (dmg, dps) = target_totals(p);
            (p.name.clone(), dmg, dps)
        })
        .collect();
    let mut card = Card::new(format!("{:<20} {:<10} {}", "Damage Top 5", "T-DMG", "DPS"));
    card.rows = top_rows(rows, true);
    card
}

fn down_contribution_card(report: &ParsedReport) -> Card {
    let rows = report
        .squad()
        .map(|p| {
            let (con, downs) = p
                .stats_targets
                .iter()
                .flatten()
                .fold((0, 0), |(c, d), st| (c + st.down_contribution, d + st.downed));
            (p.name.clone(), con, downs)
        })
        .filter(|(_, con, _)| *con > 0)
        .collect();
    let mut card = Card::new(format!("{:<20} {:<10} {}", "Downs Top 5", "Down-Cont", "Downs"));
    card.rows = top_rows(rows, true);
    card
}

fn cleanses_card(report: &ParsedReport) -> Card {
    let rows = report
        .squad()
        .filter_map(|p| {
            let s = p.support.first()?;
            let total = s.condi_cleanse + s.condi_cleanse_self;
            (total > 0).then(|| (p.name.clone(), total, 0))
        })
        .collect();
    let mut card = Card::new("Cleanses".into());
    card.rows = top_rows(rows, false);
    card
}

fn strips_card(report: &ParsedReport) -> Card {
    let rows = report
        .squad()
        .filter_map(|p| {
            let strips = p.support.first()?.boon_strips;
            (strips > 0).then(|| (p.name.clone(), strips, 0))
        })
        .collect();
    let mut card = Card::new("Boon Strips".into());
    card.rows = top_rows(rows, false);
    card
}

fn healing_card(report: &ParsedReport) -> Card {
    let rows = report
        .squad()
        .map(|p| {
            let (healing, hps) = p
                .ext_healing_stats
                .outgoing_healing_allies
                .iter()
                .flatten()
                .fold((0, 0), |(h, s), e| (h + e.healing, s + e.hps));
            (p.name.clone(), healing, hps)
        })
        .filter(|(_, healing, hps)| *healing > 0 || *hps > 0)
        .collect();
    let mut card = Card::new(format!("{:<20} {:<10} {}", "Healing Top 5", "Healing", "HPS"));
    card.rows = top_rows(rows, true);
    card
}

fn barrier_card(report: &ParsedReport) -> Card {
    let rows = report
        .squad()
        .filter_map(|p| {
            let b = p.ext_barrier_stats.outgoing_barrier.first()?;
            Some((p.name.clone(), b.barrier, b.bps))
        })
        .collect();
    let mut card = Card::new(format!("{:<20} {:<10} {}", "Barrier Top 5", "Barrier", "BPS"));
    card.rows = top_rows(rows, true);
    card
}

fn position_at(p: &Player, index: usize) -> Option<(f64, f64)> {
    match p.combat_replay_data.positions.get(index)?.as_slice() {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

fn death_card(report: &ParsedReport) -> Card {
    struct Death<'a> {
        name: &'a str,
        at_ms: f64,
        dist: f64,
        cc: i64,
    }

    let commander = report.commander();
    let polling = report.combat_replay_meta_data.polling_rate;

    let mut deaths: Vec<Death> = report
        .squad()
        .filter_map(|p| {
            let def = p.defenses.first().filter(|d| d.dead_count > 0)?;
            let first = p.combat_replay_data.dead.first().filter(|d| d.len() > 1)?;
            let at_ms = first[0].as_f64()?;

            let replay_dist = commander.filter(|_| polling > 0).and_then(|cmd| {
                let index = (at_ms / polling as f64).round();
                if index < 0.0 {
                    return None;
                }
                let index = index as usize;
                Some(distance(position_at(p, index)?, position_at(cmd, index)?))
            });
            let dist = match replay_dist {
                Some(d) if !p.has_commander_tag => d,
                _ => p.stats_all.first().map_or(-1.0, |s| s.dist_to_commander),
            };

            Some(Death {
                name: &p.name,
                at_ms,
                dist,
                cc: def.received_crowd_control,
            })
        })
        .collect();
    deaths.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));

    let mut card = Card::new(format!(
        "{:<20} {:<11} {:<12} {}",
        "First 5 To Die", "Time(H:m:s)", "DistToTag", "CC"
    ));
    card.rows = deaths
        .iter()
        .take(TOP)
        .map(|d| {
            let secs = (d.at_ms / 1000.0) as u64;
            let clock = format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
            let dist = if d.dist >= 0.0 {
                format!("{:.2}", d.dist)
            } else {
                "N/A".into()
            };
            format!("{:<20} {:<11} {:<12} {}", d.name, clock, dist, d.cc)
        })
        .collect();
    card
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ParsedReport {
        serde_json::from_str(
            r#"{
            "fightName": "Detailed WvW - Red Alpine Borderlands",
            "timeStart": "2024-05-01 20:14:03 +02:00",
            "duration": "02m 31s 400ms",
            "combatReplayMetaData": {"pollingRate": 150},
            "players": [
                {"name": "Tag", "account": "Tag.1", "hasCommanderTag": true,
                 "dpsTargets": [[{"dps": 100, "damage": 15000}]],
                 "defenses": [{"downCount": 0, "deadCount": 0}],
                 "support": [{"condiCleanse": 3, "condiCleanseSelf": 1, "boonStrips": 0}],
                 "statsAll": [{"distToCom": 0}],
                 "combatReplayData": {"positions": [[0, 0], [0, 0], [0, 0]]}},
                {"name": "Dps", "account": "Dps.2",
                 "dpsTargets": [[{"dps": 900, "damage": 1200000}], [{"dps": 50, "damage": 500}]],
                 "statsTargets": [[{"downed": 2, "killed": 1, "downContribution": 40000}]],
                 "defenses": [{"downCount": 1, "deadCount": 1, "receivedCrowdControl": 4}],
                 "support": [{"boonStrips": 12}],
                 "statsAll": [{"distToCom": "N/A"}],
                 "combatReplayData": {"dead": [[300, 900]], "positions": [[0, 0], [0, 0], [3, 4]]},
                 "extBarrierStats": {"outgoingBarrier": [{"barrier": 2500, "bps": 16}]}},
                {"name": "Pug", "account": "Pug.3", "notInSquad": true,
                 "dpsTargets": [[{"dps": 99999, "damage": 99999999}]]}
            ],
            "targets": [
                {"name": "E1", "enemyPlayer": true, "statsAll": [{"totaldmg": 7000}], "dpsAll": [{"dps": 46}]},
                {"name": "Fake", "enemyPlayer": true, "isFake": true, "statsAll": [{"totaldmg": 1}]},
                {"name": "Npc", "enemyPlayer": false}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-45210), "-45,210");
    }

    #[test]
    fn distance_scales_to_game_units() {
        assert_eq!(distance((0.0, 0.0), (3.0, 4.0)), 500.0);
    }

    #[test]
    fn banner_reads_map_and_clock() {
        let card = build_card(&report(), 1);
        assert_eq!(card.rows.len(), 1);
        assert!(card.rows[0].starts_with("RBL"));
        assert!(card.rows[0].contains("02m 31s 400ms"));
        assert!(card.rows[0].ends_with("20:14:03"));
    }

    #[test]
    fn summary_counts_squad_and_real_enemies() {
        let card = build_card(&report(), 0);
        assert!(card.rows[0].starts_with("Squad 3 (2 /1 ) 1,215,500"));
        assert!(card.rows[1].starts_with("Enemy 1 "));
        assert!(card.rows[1].contains("7,000"));
    }

    #[test]
    fn damage_excludes_players_outside_squad() {
        let card = build_card(&report(), 2);
        assert_eq!(card.rows.len(), 2);
        assert!(card.rows[0].starts_with("Dps"));
        assert!(card.rows[0].contains("1,200,500"));
        assert!(!card.rows.iter().any(|r| r.starts_with("Pug")));
    }

    #[test]
    fn empty_stat_rows_are_hidden() {
        let r = report();
        assert_eq!(build_card(&r, 4).rows, vec![format!("{:<20} 4", "Tag")]);
        assert_eq!(build_card(&r, 5).rows, vec![format!("{:<20} 12", "Dps")]);
        assert_eq!(build_card(&r, 7).rows.len(), 0);
        assert_eq!(build_card(&r, 8).rows.len(), 1);
    }

    #[test]
    fn death_uses_replay_distance() {
        let card = build_card(&report(), 6);
        assert_eq!(card.rows.len(), 1);
        let row = &card.rows[0];
        assert!(row.starts_with("Dps"));
        assert!(row.contains("00:00:00"));
        assert!(row.contains("500.00"));
        assert!(row.ends_with('4'));
    }

    #[test]
    fn every_index_builds_a_card() {
        let r = ParsedReport::default();
        for i in 0..CARD_COUNT {
            assert!(!build_card(&r, i).header.is_empty());
        }
    }
}

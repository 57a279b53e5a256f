//! Built-in seed records.
//!
//! Used when the backing file is missing a top-level key, so a fresh install
//! has something to render. Derived fields are left at their defaults; the
//! startup recalculation fills them in.

use crate::model::{EntityRef, Player, RaceResult, Tournament, Zone};

pub fn tournament() -> Tournament {
    Tournament {
        id: 1,
        title: "Canyon Lapping Series".to_string(),
        description: "Eight weekly buggy races across rotating zones. Consistency wins \
                      the series, raw pace wins the week."
            .to_string(),
        start_date: "2026-09-05T19:00:00.000Z".to_string(),
        end_date: "2026-10-24T19:00:00.000Z".to_string(),
        status: "active".to_string(),
        total_weeks: 8,
        prizes: "1st: 100,000 TBUX | 2nd: 50,000 TBUX | 3rd: 25,000 TBUX".to_string(),
        rules: "Weekly races with point-based scoring. Each week features a different \
                zone. Four finishes required to qualify for final standings."
            .to_string(),
        registration_info: "Sign up at the billboard in the active zone before the \
                            weekly start time."
            .to_string(),
        contact_info: "Organizer: CanyonCrew | Questions: series channel on Discord".to_string(),
        stream_url: "https://twitch.tv/canyonlapping".to_string(),
        discord_url: "https://discord.gg/canyonlapping".to_string(),
        ..Tournament::default()
    }
}

pub fn players() -> Vec<Player> {
    let roster = [
        (1, "Redline", "Zone 1 - Dust Bowl"),
        (2, "Apex", "Zone 2 - Ridge Run"),
        (3, "Slipstream", "Zone 3 - Salt Flats"),
        (4, "Hairpin", "Zone 1 - Dust Bowl"),
    ];
    roster
        .into_iter()
        .map(|(id, name, zone_assignment)| Player {
            id,
            name: name.to_string(),
            zone_assignment: zone_assignment.to_string(),
            ..Player::default()
        })
        .collect()
}

pub fn zones() -> Vec<Zone> {
    let tracks = [
        (
            1,
            "Zone 1 - Dust Bowl",
            "Dust Bowl",
            "Wide open bowl with loose surface. Throttle control over bravery.",
            1,
            false,
        ),
        (
            2,
            "Zone 2 - Ridge Run",
            "Ridge Run",
            "Narrow crest road with long drops on both sides. Clean lines only.",
            2,
            true,
        ),
        (
            3,
            "Zone 3 - Salt Flats",
            "Salt Flats",
            "Flat-out speed. Slipstreaming decides the finish.",
            3,
            false,
        ),
    ];
    tracks
        .into_iter()
        .map(|(id, name, map_name, description, week_number, is_active)| Zone {
            id,
            name: name.to_string(),
            map_name: map_name.to_string(),
            description: description.to_string(),
            week_number,
            is_active,
            ..Zone::default()
        })
        .collect()
}

pub fn race_results() -> Vec<RaceResult> {
    let week_one = [
        (1, 1, "Redline", 1, "01:42.310"),
        (2, 4, "Hairpin", 2, "01:43.055"),
        (3, 2, "Apex", 3, "01:44.900"),
    ];
    week_one
        .into_iter()
        .map(|(id, player_id, player_name, position, time)| RaceResult {
            id,
            position,
            finish_time: time.to_string(),
            race_date: "2026-09-05T20:00:00.000Z".to_string(),
            week_number: 1,
            player: Some(EntityRef {
                id: player_id,
                name: player_name.to_string(),
            }),
            zone: Some(EntityRef {
                id: 1,
                name: "Zone 1 - Dust Bowl".to_string(),
            }),
            ..RaceResult::default()
        })
        .collect()
}

//! Standings recalculation.
//!
//! Every derived field in the dataset is a pure function of the race results,
//! the roster, and the points config. Rather than patching aggregates on each
//! mutation, callers run a full recomputation after any change; the pass is
//! idempotent and never reorders either collection.

use std::collections::HashMap;

use crate::model::{Player, RaceResult, ResultSummary, Tournament};
use crate::points::PointsConfig;
use crate::time::{format_finish_time, parse_finish_time};

/// Recompute every result's points and normalized time, then rebuild each
/// player's aggregates, and re-embed the points config into the tournament.
pub fn recalculate(
    players: &mut [Player],
    results: &mut [RaceResult],
    config: &PointsConfig,
    tournament: &mut Tournament,
) {
    for player in players.iter_mut() {
        player.total_points = 0;
        player.races_participated = 0;
        player.best_finish_time_ms = None;
        player.race_results.clear();
    }

    let index: HashMap<u64, usize> = players
        .iter()
        .enumerate()
        .map(|(slot, player)| (player.id, slot))
        .collect();

    for result in results.iter_mut() {
        let points = config.points_for(result.position);
        result.points_earned = points;

        let raw_time = if result.finish_time.is_empty() {
            result.lap_time.clone()
        } else {
            result.finish_time.clone()
        };
        let parsed = parse_finish_time(&raw_time);
        result.finish_time = parsed.formatted;
        result.finish_time_ms = parsed.milliseconds;
        if result.lap_time.is_empty() && !result.finish_time.is_empty() {
            result.lap_time = result.finish_time.clone();
        }

        // Results without a linked player still get their own fields updated,
        // they just don't feed any standings.
        let Some(player_ref) = result.player.as_ref() else {
            continue;
        };
        let Some(&slot) = index.get(&player_ref.id) else {
            tracing::warn!(
                result = result.id,
                player = player_ref.id,
                "race result references a player that no longer exists"
            );
            continue;
        };
        let player = &mut players[slot];

        player.total_points += points;
        player.races_participated += 1;
        player.race_results.push(ResultSummary {
            id: result.id,
            position: result.position,
            points_earned: points,
            week_number: result.week_number,
        });

        if let Some(ms) = result.finish_time_ms
            && player.best_finish_time_ms.is_none_or(|best| ms < best)
        {
            player.best_finish_time_ms = Some(ms);
            player.best_lap_time = format_finish_time(ms);
        }
    }

    // A hand-entered best lap time survives as the canonical best only while
    // the player has no timed result.
    for player in players.iter_mut() {
        if player.best_finish_time_ms.is_none() && !player.best_lap_time.is_empty() {
            let parsed = parse_finish_time(&player.best_lap_time);
            if let Some(ms) = parsed.milliseconds {
                player.best_finish_time_ms = Some(ms);
                player.best_lap_time = parsed.formatted;
            }
        }
    }

    tournament.points_config = config.clone();
}

//! Cumulative weekly metrics and the wide "bar race" CSV layout
//!
//! The dashboard's bar chart race wants one row per player and one column
//! per week, each cell holding the cumulative negative-sentiment rate up to
//! that week. This module turns `player_temporal` rows into that shape.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;

use courtpulse_common::{Error, Result};

use crate::aggregate::document::{PlayerMetadataEntry, PlayerWeekRow};
use crate::aggregate::metrics::round4;

/// One player-week of cumulative counts.
///
/// `cum_neg_rate` is `None` when the player has no comments yet, or after
/// threshold masking.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativePoint {
    pub player: String,
    pub week: NaiveDate,
    pub cum_neg: u64,
    pub cum_total: u64,
    pub cum_neg_rate: Option<f64>,
}

/// Running negative-rate series per player, one point per week.
///
/// The latest week in the input is a stub (the season week still being
/// collected) and is dropped. Every remaining week gets a point for every
/// player; weeks a player sat out carry the previous totals forward.
pub fn compute_cumulative_metrics(rows: &[PlayerWeekRow]) -> Vec<CumulativePoint> {
    let mut weeks: Vec<NaiveDate> = rows.iter().map(|r| r.week).collect();
    weeks.sort_unstable();
    weeks.dedup();
    let Some(&stub_week) = weeks.last() else {
        return Vec::new();
    };
    weeks.pop();

    let mut per_player: BTreeMap<&str, BTreeMap<NaiveDate, (u64, u64)>> = BTreeMap::new();
    for row in rows {
        if row.week == stub_week {
            continue;
        }
        let entry = per_player
            .entry(row.attributed_player.as_str())
            .or_default()
            .entry(row.week)
            .or_insert((0, 0));
        entry.0 += row.metrics.neg_count;
        entry.1 += row.metrics.comment_count;
    }

    let mut points = Vec::with_capacity(per_player.len() * weeks.len());
    for (player, by_week) in &per_player {
        let mut cum_neg = 0u64;
        let mut cum_total = 0u64;
        for &week in &weeks {
            if let Some(&(neg, total)) = by_week.get(&week) {
                cum_neg += neg;
                cum_total += total;
            }
            let cum_neg_rate = (cum_total > 0)
                .then(|| round4(cum_neg as f64 / cum_total as f64));
            points.push(CumulativePoint {
                player: player.to_string(),
                week,
                cum_neg,
                cum_total,
                cum_neg_rate,
            });
        }
    }
    points
}

/// A bar race row: one player plus a rate cell per week column.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRaceRow {
    pub label: String,
    pub category: String,
    pub image: String,
    pub values: Vec<Option<f64>>,
}

/// Wide bar race layout, ready for CSV rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRaceTable {
    pub week_columns: Vec<NaiveDate>,
    pub rows: Vec<BarRaceRow>,
}

/// Pivot cumulative points into the wide bar race layout.
///
/// Players are ranked by their final-week cumulative negative rate, keeping
/// the `top_n` whose final sample reaches `min_ranking_comments`. Cells stay
/// empty until the player's cumulative sample reaches `min_entry_comments`,
/// so bars enter the race only once their rate is meaningful.
pub fn pivot_bar_race_wide(
    points: &[CumulativePoint],
    metadata: &BTreeMap<String, PlayerMetadataEntry>,
    top_n: usize,
    min_ranking_comments: u64,
    min_entry_comments: u64,
) -> BarRaceTable {
    let mut week_columns: Vec<NaiveDate> = points.iter().map(|p| p.week).collect();
    week_columns.sort_unstable();
    week_columns.dedup();
    let Some(&final_week) = week_columns.last() else {
        return BarRaceTable {
            week_columns,
            rows: Vec::new(),
        };
    };

    let mut per_player: BTreeMap<&str, BTreeMap<NaiveDate, &CumulativePoint>> = BTreeMap::new();
    for point in points {
        per_player
            .entry(point.player.as_str())
            .or_default()
            .insert(point.week, point);
    }

    // Rank on the raw final-week rate; entry masking applies to cells only
    let mut ranked: Vec<(&str, f64)> = per_player
        .iter()
        .filter_map(|(player, by_week)| {
            let last = by_week.get(&final_week)?;
            if last.cum_total < min_ranking_comments {
                return None;
            }
            last.cum_neg_rate.map(|rate| (*player, rate))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(top_n);

    let rows = ranked
        .iter()
        .map(|(player, _)| {
            let by_week = &per_player[player];
            let values = week_columns
                .iter()
                .map(|week| {
                    by_week.get(week).and_then(|p| {
                        if p.cum_total >= min_entry_comments {
                            p.cum_neg_rate
                        } else {
                            None
                        }
                    })
                })
                .collect();
            let meta = metadata.get(*player);
            BarRaceRow {
                label: player.to_string(),
                category: meta.map(|m| m.team.clone()).unwrap_or_default(),
                image: meta.map(|m| m.headshot_url.clone()).unwrap_or_default(),
                values,
            }
        })
        .collect();

    BarRaceTable { week_columns, rows }
}

/// Render the table as CSV: `Label,Category,Image` then one column per week.
/// Masked cells become empty fields.
pub fn write_csv<W: Write>(table: &BarRaceTable, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec![
        "Label".to_string(),
        "Category".to_string(),
        "Image".to_string(),
    ];
    header.extend(table.week_columns.iter().map(|w| w.to_string()));
    out.write_record(&header)
        .map_err(|e| Error::Internal(format!("csv write failed: {e}")))?;

    for row in &table.rows {
        let mut record = vec![row.label.clone(), row.category.clone(), row.image.clone()];
        for value in &row.values {
            record.push(value.map(|r| r.to_string()).unwrap_or_default());
        }
        out.write_record(&record)
            .map_err(|e| Error::Internal(format!("csv write failed: {e}")))?;
    }

    out.flush()?;
    Ok(())
}

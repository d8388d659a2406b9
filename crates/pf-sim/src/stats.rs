//! Aggregate statistics over a batch of sessions

use std::collections::BTreeMap;

use serde::Serialize;

use crate::chain::SessionResult;

// ═══════════════════════════════════════════════════════════════════════════════
// PROFIT BRACKETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Half-open profit range `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitBracket {
    pub low: f64,
    pub high: f64,
    pub label: &'static str,
}

impl ProfitBracket {
    pub fn contains(&self, profit: f64) -> bool {
        profit >= self.low && profit < self.high
    }
}

/// Standard profit brackets, open-ended at both extremes
pub const PROFIT_BRACKETS: [ProfitBracket; 11] = [
    ProfitBracket {
        low: f64::NEG_INFINITY,
        high: -80_000.0,
        label: "lose 80k+",
    },
    ProfitBracket {
        low: -80_000.0,
        high: -50_000.0,
        label: "lose 50k-80k",
    },
    ProfitBracket {
        low: -50_000.0,
        high: -30_000.0,
        label: "lose 30k-50k",
    },
    ProfitBracket {
        low: -30_000.0,
        high: -10_000.0,
        label: "lose 10k-30k",
    },
    ProfitBracket {
        low: -10_000.0,
        high: 0.0,
        label: "lose <10k",
    },
    ProfitBracket {
        low: 0.0,
        high: 10_000.0,
        label: "win <10k",
    },
    ProfitBracket {
        low: 10_000.0,
        high: 30_000.0,
        label: "win 10k-30k",
    },
    ProfitBracket {
        low: 30_000.0,
        high: 50_000.0,
        label: "win 30k-50k",
    },
    ProfitBracket {
        low: 50_000.0,
        high: 80_000.0,
        label: "win 50k-80k",
    },
    ProfitBracket {
        low: 80_000.0,
        high: 150_000.0,
        label: "win 80k-150k",
    },
    ProfitBracket {
        low: 150_000.0,
        high: f64::INFINITY,
        label: "win 150k+",
    },
];

/// Share of sessions falling in one bracket
#[derive(Debug, Clone, Serialize)]
pub struct BracketShare {
    pub bracket: ProfitBracket,
    pub count: usize,
    pub share: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Summary of a batch of sessions
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub sessions: usize,
    /// Fraction of sessions with profit > 0
    pub win_rate: f64,
    pub mean_profit: f64,
    pub median_profit: f64,
    /// Population standard deviation of profit
    pub std_profit: f64,
    /// Over sessions that triggered at least once
    pub mean_first_hit: Option<f64>,
    pub median_first_hit: Option<f64>,
    /// Over every episode of every session
    pub mean_chain: Option<f64>,
    pub max_chain: u32,
    /// Chain length → episode count
    pub chain_distribution: BTreeMap<u32, usize>,
    pub total_episodes: usize,
    pub mean_triggers: f64,
    pub charge_sessions: usize,
    pub brackets: Vec<BracketShare>,
}

impl SessionSummary {
    pub fn from_results(results: &[SessionResult]) -> Self {
        let n = results.len();
        let profits: Vec<f64> = results.iter().map(|r| r.profit).collect();

        let first_hits: Vec<f64> = results
            .iter()
            .filter(|r| r.first_hit_rotation > 0)
            .map(|r| r.first_hit_rotation as f64)
            .collect();

        let mut chain_distribution = BTreeMap::new();
        let mut chain_sum = 0u64;
        let mut total_episodes = 0usize;
        for &len in results.iter().flat_map(|r| r.chain_lengths.iter()) {
            *chain_distribution.entry(len).or_insert(0) += 1;
            chain_sum += len as u64;
            total_episodes += 1;
        }

        let brackets = PROFIT_BRACKETS
            .iter()
            .map(|bracket| {
                let count = profits.iter().filter(|&&p| bracket.contains(p)).count();
                BracketShare {
                    bracket: *bracket,
                    count,
                    share: ratio(count, n),
                }
            })
            .collect();

        Self {
            sessions: n,
            win_rate: ratio(results.iter().filter(|r| r.is_win()).count(), n),
            mean_profit: mean(&profits).unwrap_or(0.0),
            median_profit: median(&profits).unwrap_or(0.0),
            std_profit: std_dev(&profits).unwrap_or(0.0),
            mean_first_hit: mean(&first_hits),
            median_first_hit: median(&first_hits),
            mean_chain: (total_episodes > 0).then(|| chain_sum as f64 / total_episodes as f64),
            max_chain: results.iter().map(|r| r.max_chain).max().unwrap_or(0),
            chain_distribution,
            total_episodes,
            mean_triggers: ratio(total_episodes, n),
            charge_sessions: results.iter().filter(|r| r.charge_count > 0).count(),
            brackets,
        }
    }

    /// Fraction of episodes with exactly `length` payouts
    pub fn chain_share(&self, length: u32) -> f64 {
        ratio(
            self.chain_distribution.get(&length).copied().unwrap_or(0),
            self.total_episodes,
        )
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Arithmetic mean (None when empty)
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; even lengths average the middle pair
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

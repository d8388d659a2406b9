//! Session output: episodes (chains) and per-session results

use serde::{Deserialize, Serialize};

/// What started an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// Primary hit during normal hunting, resolved on the bonus table
    Normal,
    /// Hit during time-reduced hunting, `rotation` spins into the sub-budget
    TimeReduced { rotation: u32 },
    /// Win on a reserved-chance trial
    Reserved,
    /// Charge payout that ran away directly into streak mode
    ChargeRunaway,
}

impl TriggerOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerOrigin::Normal => "normal",
            TriggerOrigin::TimeReduced { .. } => "time-reduced",
            TriggerOrigin::Reserved => "reserved",
            TriggerOrigin::ChargeRunaway => "charge runaway",
        }
    }
}

/// One episode: a trigger and every streak payout that followed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDetail {
    /// Rotations consumed to trigger (0 for reserved-chance wins)
    pub trigger_rotation: u32,
    /// Payouts in this episode, trigger included
    pub chain_length: u32,
    pub trigger_payout: u32,
    /// Streak continuation payouts, in order
    pub continuation_payouts: Vec<u32>,
    /// Lucky-trigger consolation paid when the streak ended
    pub end_bonus: u32,
    /// Trigger + continuations + end bonus
    pub total_payout: u64,
    /// Streak spins drawn under rotation resolution
    pub streak_rotations: u32,
    pub entered_streak: bool,
    pub origin: TriggerOrigin,
    /// A charge payout landed while hunting for this trigger
    pub charge_hit: bool,
}

impl ChainDetail {
    pub fn continuation_count(&self) -> usize {
        self.continuation_payouts.len()
    }

    pub fn is_time_reduced_hit(&self) -> bool {
        matches!(self.origin, TriggerOrigin::TimeReduced { .. })
    }

    /// Spin of the time-reduced sub-budget that hit (0 otherwise)
    pub fn time_reduced_rotation(&self) -> u32 {
        match self.origin {
            TriggerOrigin::TimeReduced { rotation } => rotation,
            _ => 0,
        }
    }

    pub fn is_reserved_hit(&self) -> bool {
        self.origin == TriggerOrigin::Reserved
    }

    pub fn is_charge_hit(&self) -> bool {
        self.charge_hit || self.is_charge_runaway()
    }

    pub fn is_charge_runaway(&self) -> bool {
        self.origin == TriggerOrigin::ChargeRunaway
    }
}

/// One simulated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// (payout − investment) × currency per ball
    pub profit: f64,
    pub total_hits: u32,
    /// Rotations to the first trigger (0 = never triggered)
    pub first_hit_rotation: u32,
    pub max_chain: u32,
    /// Chain length of every episode
    pub chain_lengths: Vec<u32>,
    /// Rotations-to-trigger of every episode
    pub trigger_rotations: Vec<u32>,
    pub episodes: Vec<ChainDetail>,
    /// Balls paid out
    pub total_payout: u64,
    /// Balls invested
    pub investment: f64,
    /// Rotations spent in normal and time-reduced hunting
    pub rotations_used: u32,
    /// Charge payouts landed
    pub charge_count: u32,
    /// The budget ran out on a near-miss boundary draw
    pub ended_on_near_miss: bool,
}

impl SessionResult {
    /// Assemble a result; the per-episode lists are derived from `episodes`
    pub fn from_episodes(
        episodes: Vec<ChainDetail>,
        total_payout: u64,
        investment: f64,
        currency_per_ball: f64,
    ) -> Self {
        let chain_lengths: Vec<u32> = episodes.iter().map(|e| e.chain_length).collect();
        let trigger_rotations: Vec<u32> = episodes.iter().map(|e| e.trigger_rotation).collect();

        Self {
            profit: (total_payout as f64 - investment) * currency_per_ball,
            total_hits: episodes.len() as u32,
            first_hit_rotation: trigger_rotations.first().copied().unwrap_or(0),
            max_chain: chain_lengths.iter().copied().max().unwrap_or(0),
            chain_lengths,
            trigger_rotations,
            episodes,
            total_payout,
            investment,
            rotations_used: 0,
            charge_count: 0,
            ended_on_near_miss: false,
        }
    }

    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }

    /// Streak continuation payouts across all episodes
    pub fn continuation_count(&self) -> usize {
        self.episodes.iter().map(ChainDetail::continuation_count).sum()
    }

    /// Balls paid by episodes (excludes charge payouts that did not run away)
    pub fn episode_payout(&self) -> u64 {
        self.episodes.iter().map(|e| e.total_payout).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(rotation: u32, payouts: &[u32], origin: TriggerOrigin) -> ChainDetail {
        let total: u64 = payouts.iter().map(|&p| p as u64).sum();
        ChainDetail {
            trigger_rotation: rotation,
            chain_length: payouts.len() as u32,
            trigger_payout: payouts[0],
            continuation_payouts: payouts[1..].to_vec(),
            end_bonus: 0,
            total_payout: total,
            streak_rotations: 0,
            entered_streak: payouts.len() > 1,
            origin,
            charge_hit: false,
        }
    }

    #[test]
    fn test_empty_session() {
        let result = SessionResult::from_episodes(Vec::new(), 0, 0.0, 4.0);
        assert_eq!(result.total_hits, 0);
        assert_eq!(result.first_hit_rotation, 0);
        assert_eq!(result.max_chain, 0);
        assert_eq!(result.profit, 0.0);
        assert!(!result.is_win());
    }

    #[test]
    fn test_derived_lists() {
        let episodes = vec![
            episode(250, &[450, 1500, 1500], TriggerOrigin::Normal),
            episode(0, &[1500], TriggerOrigin::Reserved),
        ];
        let result = SessionResult::from_episodes(episodes, 4950, 1000.0, 4.0);

        assert_eq!(result.chain_lengths, vec![3, 1]);
        assert_eq!(result.trigger_rotations, vec![250, 0]);
        assert_eq!(result.first_hit_rotation, 250);
        assert_eq!(result.max_chain, 3);
        assert_eq!(result.continuation_count(), 2);
        assert_eq!(result.episode_payout(), 4950);
        assert_eq!(result.profit, (4950.0 - 1000.0) * 4.0);
    }

    #[test]
    fn test_provenance_flags() {
        let jitan = episode(37, &[1500], TriggerOrigin::TimeReduced { rotation: 37 });
        assert!(jitan.is_time_reduced_hit());
        assert_eq!(jitan.time_reduced_rotation(), 37);
        assert!(!jitan.is_reserved_hit());

        let runaway = episode(900, &[300], TriggerOrigin::ChargeRunaway);
        assert!(runaway.is_charge_hit());
        assert!(runaway.is_charge_runaway());
        assert_eq!(runaway.time_reduced_rotation(), 0);
    }
}

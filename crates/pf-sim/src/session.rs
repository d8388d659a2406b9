//! Session Simulator: per-session state machine
//!
//! A session hunts for hits under a shared rotation budget, resolves each hit
//! into an episode (trigger payout plus any streak continuations), then hands
//! control to time-reduced hunting and reserved-chance trials before falling
//! back to normal hunting.
//!
//! ```text
//!            ┌──────────── charge runaway ─────────────┐
//!            │                                         v
//! Normal ──hit──> ResolveTrigger ──streak──> Streak ──close──> TimeReduced
//!   ^   │                │                    ^  ^                 │  │
//!   │   └─budget─> Done  └──no streak─close───┼──┼─────────────────┘  │
//!   │                                         │  └──── hit ──────────┘│
//!   └──── no win ──── ReservedCheck <─────────┴──── lapse ────────────┘
//! ```
//!
//! Draw order per rotation is fixed (charge check, charge runaway, hit check),
//! followed by bonus-table, continuation and reserved-trial draws as they
//! occur, so a seeded stream replays bit-for-bit.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainDetail, SessionResult, TriggerOrigin};
use crate::sampler::chance;
use crate::spec::{MachineSpec, StreakResolution};
use crate::{Result, SimError};

/// Balls lent per 1,000 currency units
pub const DEFAULT_BALLS_PER_1K: u32 = 250;

/// Currency value of one ball at an even exchange rate
pub const DEFAULT_CURRENCY_PER_BALL: f64 = 4.0;

/// What happens when normal hunting runs out of budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Budget exhausted without a hit: one extra hit draw marks the session as
    /// ending on a near miss. It never creates an episode.
    #[default]
    NearMiss,
    /// Whenever hunting stops at the budget, one extra hit draw decides if the
    /// trailing attempt resolves a trigger; a failed draw discards it.
    TrailingDraw,
}

/// Player-side parameters of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayConditions {
    /// Rotation budget for normal plus time-reduced hunting
    pub total_rotations: u32,
    /// Rotations per 1,000 currency units while hunting normally
    pub rotations_per_1k: f64,
    pub balls_per_1k: u32,
    pub currency_per_ball: f64,
    /// Overrides the machine's time-reduced rotation rate
    #[serde(default)]
    pub reduced_rotations_per_1k: Option<f64>,
    #[serde(default)]
    pub boundary: BoundaryPolicy,
}

impl PlayConditions {
    pub fn new(total_rotations: u32, rotations_per_1k: f64) -> Self {
        Self {
            total_rotations,
            rotations_per_1k,
            balls_per_1k: DEFAULT_BALLS_PER_1K,
            currency_per_ball: DEFAULT_CURRENCY_PER_BALL,
            reduced_rotations_per_1k: None,
            boundary: BoundaryPolicy::default(),
        }
    }

    pub fn with_balls_per_1k(mut self, balls: u32) -> Self {
        self.balls_per_1k = balls;
        self
    }

    pub fn with_currency_per_ball(mut self, value: f64) -> Self {
        self.currency_per_ball = value;
        self
    }

    pub fn with_reduced_rate(mut self, rotations_per_1k: f64) -> Self {
        self.reduced_rotations_per_1k = Some(rotations_per_1k);
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rotations_per_1k.is_finite() && self.rotations_per_1k > 0.0) {
            return Err(SimError::InvalidConditions(format!(
                "rotations_per_1k must be positive, got {}",
                self.rotations_per_1k
            )));
        }
        if let Some(rate) = self.reduced_rotations_per_1k {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(SimError::InvalidConditions(format!(
                    "reduced_rotations_per_1k must be positive, got {}",
                    rate
                )));
            }
        }
        if !(self.currency_per_ball.is_finite() && self.currency_per_ball >= 0.0) {
            return Err(SimError::InvalidConditions(format!(
                "currency_per_ball must be non-negative, got {}",
                self.currency_per_ball
            )));
        }
        Ok(())
    }
}

impl Default for PlayConditions {
    fn default() -> Self {
        Self::new(2000, 18.0)
    }
}

/// Episode under construction
#[derive(Debug, Clone, PartialEq)]
pub struct OpenEpisode {
    pub trigger_rotation: u32,
    pub trigger_payout: u32,
    pub origin: TriggerOrigin,
    pub charge_hit: bool,
    pub continuation_payouts: Vec<u32>,
    pub streak_rotations: u32,
    pub end_bonus: u32,
    pub entered_streak: bool,
}

impl OpenEpisode {
    pub fn new(
        trigger_rotation: u32,
        trigger_payout: u32,
        origin: TriggerOrigin,
        charge_hit: bool,
    ) -> Self {
        Self {
            trigger_rotation,
            trigger_payout,
            origin,
            charge_hit,
            continuation_payouts: Vec::new(),
            streak_rotations: 0,
            end_bonus: 0,
            entered_streak: false,
        }
    }

    fn into_detail(self) -> ChainDetail {
        let continuations: u64 = self.continuation_payouts.iter().map(|&p| p as u64).sum();
        ChainDetail {
            trigger_rotation: self.trigger_rotation,
            chain_length: 1 + self.continuation_payouts.len() as u32,
            trigger_payout: self.trigger_payout,
            total_payout: self.trigger_payout as u64 + continuations + self.end_bonus as u64,
            continuation_payouts: self.continuation_payouts,
            end_bonus: self.end_bonus,
            streak_rotations: self.streak_rotations,
            entered_streak: self.entered_streak,
            origin: self.origin,
            charge_hit: self.charge_hit,
        }
    }
}

/// Session state-machine phase
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Hunting at full cost; the charge check runs inside each rotation
    Normal,
    /// One-shot bonus-table lookup for a primary hit
    ResolveTrigger { rotations: u32, charge_hit: bool },
    /// Continuation loop of an open episode
    Streak(OpenEpisode),
    /// Reduced-cost hunting with a bounded sub-budget
    TimeReduced { spins: u32 },
    /// Budget-free reserved-chance trials
    ReservedCheck,
    Done,
}

/// Running totals of one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub rotations_used: u32,
    pub total_payout: u64,
    pub investment: f64,
    pub charge_count: u32,
    pub ended_on_near_miss: bool,
    pub episodes: Vec<ChainDetail>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self, currency_per_ball: f64) -> SessionResult {
        let mut result = SessionResult::from_episodes(
            self.episodes,
            self.total_payout,
            self.investment,
            currency_per_ball,
        );
        result.rotations_used = self.rotations_used;
        result.charge_count = self.charge_count;
        result.ended_on_near_miss = self.ended_on_near_miss;
        result
    }
}

/// Drives one machine through sessions under fixed play conditions
#[derive(Debug, Clone)]
pub struct SessionSimulator<'a> {
    spec: &'a MachineSpec,
    conditions: PlayConditions,
    /// Balls per normal rotation
    normal_cost: f64,
    /// Balls per time-reduced rotation
    reduced_cost: f64,
}

impl<'a> SessionSimulator<'a> {
    pub fn new(spec: &'a MachineSpec, conditions: PlayConditions) -> Result<Self> {
        conditions.validate()?;

        let balls = conditions.balls_per_1k as f64;
        let reduced_rate = conditions
            .reduced_rotations_per_1k
            .unwrap_or_else(|| spec.time_reduced_rotations_per_1k());

        Ok(Self {
            spec,
            conditions,
            normal_cost: balls / conditions.rotations_per_1k,
            reduced_cost: balls / reduced_rate,
        })
    }

    pub fn spec(&self) -> &MachineSpec {
        self.spec
    }

    pub fn conditions(&self) -> &PlayConditions {
        &self.conditions
    }

    /// Simulate one full session
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> SessionResult {
        let mut state = SessionState::new();
        let mut phase = Phase::Normal;

        while phase != Phase::Done {
            phase = self.step(&mut state, phase, rng);
        }

        let result = state.finish(self.conditions.currency_per_ball);
        log::debug!(
            "Session on '{}': {} hits, max chain {}, profit {:+.0}",
            self.spec.name(),
            result.total_hits,
            result.max_chain,
            result.profit
        );
        result
    }

    /// Advance the state machine by one phase
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        phase: Phase,
        rng: &mut R,
    ) -> Phase {
        match phase {
            Phase::Normal => self.hunt(state, rng),
            Phase::ResolveTrigger {
                rotations,
                charge_hit,
            } => self.resolve_trigger(state, rotations, charge_hit, rng),
            Phase::Streak(episode) => self.streak(state, episode, rng),
            Phase::TimeReduced { spins } => self.time_reduced(state, spins, rng),
            Phase::ReservedCheck => self.reserved_check(state, rng),
            Phase::Done => Phase::Done,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PHASES
    // ═══════════════════════════════════════════════════════════════════════════

    fn hunt<R: Rng + ?Sized>(&self, state: &mut SessionState, rng: &mut R) -> Phase {
        let budget = self.conditions.total_rotations;
        if state.rotations_used >= budget {
            return Phase::Done;
        }

        let spec = self.spec;
        let mut spins = 0u32;
        let mut charge_hit = false;
        let mut hit = false;

        while state.rotations_used < budget {
            state.rotations_used += 1;
            spins += 1;

            if spec.charge_enabled() && chance(rng, spec.charge_prob()) {
                state.total_payout += spec.charge_payout() as u64;
                state.charge_count += 1;
                charge_hit = true;
                log::trace!("Charge payout at rotation {}", state.rotations_used);

                if chance(rng, spec.charge_streak_rate()) {
                    state.investment += spins as f64 * self.normal_cost;
                    let episode = OpenEpisode::new(
                        spins,
                        spec.charge_payout(),
                        TriggerOrigin::ChargeRunaway,
                        true,
                    );
                    return Phase::Streak(episode);
                }
            }

            if chance(rng, spec.hit_prob()) {
                hit = true;
                break;
            }
        }

        state.investment += spins as f64 * self.normal_cost;

        match self.conditions.boundary {
            BoundaryPolicy::NearMiss => {
                if hit {
                    Phase::ResolveTrigger {
                        rotations: spins,
                        charge_hit,
                    }
                } else {
                    state.ended_on_near_miss = chance(rng, spec.hit_prob());
                    Phase::Done
                }
            }
            BoundaryPolicy::TrailingDraw => {
                if state.rotations_used >= budget && !chance(rng, spec.hit_prob()) {
                    Phase::Done
                } else {
                    Phase::ResolveTrigger {
                        rotations: spins,
                        charge_hit,
                    }
                }
            }
        }
    }

    fn resolve_trigger<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        rotations: u32,
        charge_hit: bool,
        rng: &mut R,
    ) -> Phase {
        let outcome = *self.spec.bonus_table().sample(rng);
        state.total_payout += outcome.payout as u64;

        let episode =
            OpenEpisode::new(rotations, outcome.payout, TriggerOrigin::Normal, charge_hit);
        if outcome.enters_streak {
            Phase::Streak(episode)
        } else {
            self.close(state, episode)
        }
    }

    fn streak<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        mut episode: OpenEpisode,
        rng: &mut R,
    ) -> Phase {
        let spec = self.spec;
        episode.entered_streak = true;

        match spec.streak_resolution() {
            StreakResolution::Probability => {
                while chance(rng, spec.st_continue_rate()) {
                    self.pay_continuation(state, &mut episode, rng);
                }
            }
            StreakResolution::Rotation => loop {
                let mut won = false;
                for _ in 0..spec.st_spins() {
                    episode.streak_rotations += 1;
                    if chance(rng, spec.st_hit_prob()) {
                        won = true;
                        break;
                    }
                }
                if !won {
                    break;
                }
                self.pay_continuation(state, &mut episode, rng);
            },
        }

        // Lucky-trigger consolation, once per streak
        if spec.lt_end_payout() > 0 {
            state.total_payout += spec.lt_end_payout() as u64;
            episode.end_bonus = spec.lt_end_payout();
        }

        self.close(state, episode)
    }

    fn time_reduced<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        spins: u32,
        rng: &mut R,
    ) -> Phase {
        let budget = self.conditions.total_rotations;
        if spins == 0 || state.rotations_used >= budget {
            return Phase::Normal;
        }

        let mut count = 0u32;
        let mut hit = false;
        while count < spins && state.rotations_used < budget {
            state.rotations_used += 1;
            count += 1;
            if chance(rng, self.spec.hit_prob()) {
                hit = true;
                break;
            }
        }

        state.investment += count as f64 * self.reduced_cost;

        if hit {
            let payout = self.spec.continuation_table().sample(rng).payout;
            state.total_payout += payout as u64;
            log::trace!("Time-reduced hit on spin {} of {}", count, spins);
            Phase::Streak(OpenEpisode::new(
                count,
                payout,
                TriggerOrigin::TimeReduced { rotation: count },
                false,
            ))
        } else {
            Phase::ReservedCheck
        }
    }

    fn reserved_check<R: Rng + ?Sized>(&self, state: &mut SessionState, rng: &mut R) -> Phase {
        let spec = self.spec;

        for trial in 0..spec.reserved_count() {
            if !chance(rng, spec.hit_prob()) {
                continue;
            }

            let payout = spec.continuation_table().sample(rng).payout;
            state.total_payout += payout as u64;
            log::trace!("Reserved chance {} won", trial + 1);

            let episode = OpenEpisode::new(0, payout, TriggerOrigin::Reserved, false);
            return if chance(rng, spec.reserved_streak_rate()) {
                Phase::Streak(episode)
            } else {
                self.close(state, episode)
            };
        }

        Phase::Normal
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn pay_continuation<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        episode: &mut OpenEpisode,
        rng: &mut R,
    ) {
        let payout = self.spec.continuation_table().sample(rng).payout;
        state.total_payout += payout as u64;
        episode.continuation_payouts.push(payout);
    }

    /// Record the episode and pick the follow-up phase
    fn close(&self, state: &mut SessionState, episode: OpenEpisode) -> Phase {
        let entered_streak = episode.entered_streak;
        let origin = episode.origin;
        let detail = episode.into_detail();

        log::trace!(
            "Episode closed: {} trigger, {} chain, {} balls",
            origin.label(),
            detail.chain_length,
            detail.total_payout
        );
        state.episodes.push(detail);

        if origin == TriggerOrigin::Reserved && !entered_streak {
            Phase::Normal
        } else {
            Phase::TimeReduced {
                spins: self.spec.time_reduced_spins(entered_streak),
            }
        }
    }
}

/// Validate conditions and simulate one session
pub fn simulate_session<R: Rng + ?Sized>(
    spec: &MachineSpec,
    conditions: PlayConditions,
    rng: &mut R,
) -> Result<SessionResult> {
    let simulator = SessionSimulator::new(spec, conditions)?;
    Ok(simulator.run(rng))
}

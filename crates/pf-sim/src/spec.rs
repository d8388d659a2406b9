//! Machine specification: probability/payout contract of one machine

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::sampler::{Weighted, pick_index};
use crate::{Result, SimError};

/// Allowed deviation of a payout table's probability sum from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Entry of the bonus table consulted when a primary hit resolves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusOutcome {
    pub probability: f64,
    /// Payout in balls
    pub payout: u32,
    /// Whether this outcome enters streak mode
    pub enters_streak: bool,
}

impl BonusOutcome {
    pub fn new(probability: f64, payout: u32, enters_streak: bool) -> Self {
        Self {
            probability,
            payout,
            enters_streak,
        }
    }
}

impl Weighted for BonusOutcome {
    fn probability(&self) -> f64 {
        self.probability
    }
}

/// Entry of the continuation table consulted during streaks, time-reduced
/// hits and reserved-chance wins
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuationOutcome {
    pub probability: f64,
    /// Payout in balls
    pub payout: u32,
}

impl ContinuationOutcome {
    pub fn new(probability: f64, payout: u32) -> Self {
        Self {
            probability,
            payout,
        }
    }
}

impl Weighted for ContinuationOutcome {
    fn probability(&self) -> f64 {
        self.probability
    }
}

/// Validated, non-empty weighted table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PayoutTable<T> {
    entries: Vec<T>,
}

impl<T: Weighted> PayoutTable<T> {
    fn new(name: &str, entries: Vec<T>) -> Result<Self> {
        if entries.is_empty() {
            return Err(SimError::InvalidSpec(format!("{} is empty", name)));
        }

        for (i, entry) in entries.iter().enumerate() {
            let p = entry.probability();
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::InvalidSpec(format!(
                    "{}[{}] probability {} outside [0, 1]",
                    name, i, p
                )));
            }
        }

        let sum: f64 = entries.iter().map(Weighted::probability).sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(SimError::InvalidSpec(format!(
                "{} probabilities sum to {}, expected 1",
                name, sum
            )));
        }

        Ok(Self { entries })
    }

    /// Draw one entry, consuming a single uniform value.
    ///
    /// Always defined: residue past the last bucket resolves to the last entry.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let draw: f64 = rng.random();
        let index = pick_index(self.entries.iter().map(Weighted::probability), draw)
            .unwrap_or(self.entries.len() - 1);
        &self.entries[index]
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PayoutTable<BonusOutcome> {
    /// Probability that a primary hit enters streak mode
    pub fn streak_entry_rate(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.enters_streak)
            .map(|e| e.probability)
            .sum()
    }

    pub fn expected_payout(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.probability * e.payout as f64)
            .sum()
    }
}

impl PayoutTable<ContinuationOutcome> {
    pub fn expected_payout(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.probability * e.payout as f64)
            .sum()
    }
}

/// How a streak decides whether it continues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakResolution {
    /// One Bernoulli(`st_continue_rate`) draw per continuation
    #[default]
    Probability,
    /// Up to `st_spins` Bernoulli(`st_hit_prob`) draws per continuation
    Rotation,
}

/// Immutable, validated machine specification.
///
/// Built through [`MachineSpecBuilder`], a preset, or a JSON/YAML file. Every
/// path runs the same validation, so a `MachineSpec` in hand is always
/// simulatable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MachineSpecBuilder")]
pub struct MachineSpec {
    name: String,
    hit_prob: f64,
    st_hit_prob: f64,
    border_rotations_per_1k: Option<f64>,
    bonus_table: PayoutTable<BonusOutcome>,
    continuation_table: PayoutTable<ContinuationOutcome>,
    streak_resolution: StreakResolution,
    st_spins: u32,
    st_continue_rate: f64,
    time_reduced_on_fail: u32,
    time_reduced_after_streak: u32,
    time_reduced_rotations_per_1k: f64,
    reserved_count: u32,
    reserved_streak_rate: f64,
    charge_prob: f64,
    charge_payout: u32,
    charge_streak_rate: f64,
    lt_end_payout: u32,
}

impl MachineSpec {
    /// Start a builder with the reference defaults
    pub fn builder(name: impl Into<String>) -> MachineSpecBuilder {
        MachineSpecBuilder::new(name)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRESETS
    // ═══════════════════════════════════════════════════════════════════════════

    /// 1/319.7 ST machine: 10R/3R bonus split, 100 time-reduced spins after a
    /// non-streak hit, two reserved chances
    pub fn classic() -> Self {
        Self {
            name: "Classic ST 1/319.7".into(),
            hit_prob: 1.0 / 319.7,
            st_hit_prob: 1.0 / 99.4,
            border_rotations_per_1k: Some(17.0),
            bonus_table: PayoutTable {
                entries: vec![
                    BonusOutcome::new(0.03, 1500, true),
                    BonusOutcome::new(0.56, 450, true),
                    BonusOutcome::new(0.41, 450, false),
                ],
            },
            continuation_table: PayoutTable {
                entries: vec![ContinuationOutcome::new(1.0, 1500)],
            },
            streak_resolution: StreakResolution::Probability,
            st_spins: 163,
            st_continue_rate: 0.807,
            time_reduced_on_fail: 100,
            time_reduced_after_streak: 0,
            time_reduced_rotations_per_1k: 30.0,
            reserved_count: 2,
            reserved_streak_rate: 1.0,
            charge_prob: 0.0,
            charge_payout: 300,
            charge_streak_rate: 0.0,
            lt_end_payout: 0,
        }
    }

    /// 1/399.9 ST machine with the charge mechanic (1/2750.9, 300 balls, 2% runaway)
    pub fn charge() -> Self {
        Self {
            name: "Charge ST 1/399.9".into(),
            hit_prob: 1.0 / 399.9,
            st_hit_prob: 1.0 / 99.6,
            border_rotations_per_1k: Some(16.8),
            bonus_table: PayoutTable {
                entries: vec![
                    BonusOutcome::new(0.005, 1500, true),
                    BonusOutcome::new(0.495, 300, false),
                    BonusOutcome::new(0.50, 300, true),
                ],
            },
            continuation_table: PayoutTable {
                entries: vec![
                    ContinuationOutcome::new(0.98, 2400),
                    ContinuationOutcome::new(0.02, 4800),
                ],
            },
            streak_resolution: StreakResolution::Probability,
            st_spins: 157,
            st_continue_rate: 0.795,
            time_reduced_on_fail: 100,
            time_reduced_after_streak: 0,
            time_reduced_rotations_per_1k: 30.0,
            reserved_count: 2,
            reserved_streak_rate: 1.0,
            charge_prob: 1.0 / 2750.9,
            charge_payout: 300,
            charge_streak_rate: 0.02,
            lt_end_payout: 0,
        }
    }

    /// Names accepted by [`MachineSpec::preset`]
    pub fn preset_names() -> &'static [&'static str] {
        &["classic", "charge"]
    }

    /// Look up a built-in preset by name
    pub fn preset(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::classic()),
            "charge" => Ok(Self::charge()),
            _ => Err(SimError::UnknownPreset(name.to_string())),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOADING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Parse and validate a JSON spec
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SimError::Parse(e.to_string()))
    }

    /// Parse and validate a YAML spec
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| SimError::Parse(e.to_string()))
    }

    /// Load a spec file; `.yaml`/`.yml` parse as YAML, anything else as JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let spec = if is_yaml {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };
        log::debug!("Loaded machine spec '{}' from {}", spec.name, path.display());
        Ok(spec)
    }

    /// Resolve a preset name or, failing that, a spec file path
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        match Self::preset(name_or_path) {
            Ok(spec) => Ok(spec),
            Err(SimError::UnknownPreset(_)) if Path::new(name_or_path).exists() => {
                Self::load(name_or_path)
            }
            Err(e) => Err(e),
        }
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hit_prob(&self) -> f64 {
        self.hit_prob
    }

    pub fn st_hit_prob(&self) -> f64 {
        self.st_hit_prob
    }

    pub fn border_rotations_per_1k(&self) -> Option<f64> {
        self.border_rotations_per_1k
    }

    pub fn bonus_table(&self) -> &PayoutTable<BonusOutcome> {
        &self.bonus_table
    }

    pub fn continuation_table(&self) -> &PayoutTable<ContinuationOutcome> {
        &self.continuation_table
    }

    pub fn streak_resolution(&self) -> StreakResolution {
        self.streak_resolution
    }

    pub fn st_spins(&self) -> u32 {
        self.st_spins
    }

    pub fn st_continue_rate(&self) -> f64 {
        self.st_continue_rate
    }

    pub fn time_reduced_on_fail(&self) -> u32 {
        self.time_reduced_on_fail
    }

    pub fn time_reduced_after_streak(&self) -> u32 {
        self.time_reduced_after_streak
    }

    /// Time-reduced sub-budget granted after an episode
    pub fn time_reduced_spins(&self, entered_streak: bool) -> u32 {
        if entered_streak {
            self.time_reduced_after_streak
        } else {
            self.time_reduced_on_fail
        }
    }

    pub fn time_reduced_rotations_per_1k(&self) -> f64 {
        self.time_reduced_rotations_per_1k
    }

    pub fn reserved_count(&self) -> u32 {
        self.reserved_count
    }

    pub fn reserved_streak_rate(&self) -> f64 {
        self.reserved_streak_rate
    }

    pub fn charge_prob(&self) -> f64 {
        self.charge_prob
    }

    pub fn charge_enabled(&self) -> bool {
        self.charge_prob > 0.0
    }

    pub fn charge_payout(&self) -> u32 {
        self.charge_payout
    }

    pub fn charge_streak_rate(&self) -> f64 {
        self.charge_streak_rate
    }

    pub fn lt_end_payout(&self) -> u32 {
        self.lt_end_payout
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DERIVED FIGURES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Per-attempt probability that a streak continues
    pub fn effective_continue_rate(&self) -> f64 {
        match self.streak_resolution {
            StreakResolution::Probability => self.st_continue_rate,
            StreakResolution::Rotation => {
                1.0 - (1.0 - self.st_hit_prob).powi(self.st_spins as i32)
            }
        }
    }

    /// Expected payouts per streak, trigger included
    pub fn expected_chain_length(&self) -> f64 {
        let rate = self.effective_continue_rate();
        if rate >= 1.0 {
            f64::INFINITY
        } else {
            1.0 / (1.0 - rate)
        }
    }

    /// Relative margin of a rotation rate over the break-even border
    pub fn border_margin(&self, rotations_per_1k: f64) -> Option<f64> {
        self.border_rotations_per_1k
            .map(|border| rotations_per_1k / border - 1.0)
    }
}

impl TryFrom<MachineSpecBuilder> for MachineSpec {
    type Error = SimError;

    fn try_from(builder: MachineSpecBuilder) -> Result<Self> {
        builder.build()
    }
}

/// Unvalidated machine description.
///
/// Field names accept the machine-sheet aliases (`heso_payouts`,
/// `jitan_spins_on_fail`, `zanho_count`, ...) when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSpecBuilder {
    pub name: String,
    pub hit_prob: f64,
    pub st_hit_prob: f64,
    #[serde(alias = "border_touka")]
    pub border_rotations_per_1k: Option<f64>,
    #[serde(alias = "heso_payouts")]
    pub bonus_table: Vec<BonusOutcome>,
    #[serde(alias = "denchu_payouts")]
    pub continuation_table: Vec<ContinuationOutcome>,
    pub streak_resolution: StreakResolution,
    pub st_spins: u32,
    pub st_continue_rate: f64,
    #[serde(alias = "jitan_spins_on_fail")]
    pub time_reduced_on_fail: u32,
    #[serde(alias = "jitan_spins_after_st")]
    pub time_reduced_after_streak: u32,
    #[serde(alias = "jitan_rotation_per_1k", alias = "jitan_rotation_efficiency")]
    pub time_reduced_rotations_per_1k: f64,
    #[serde(alias = "zanho_count")]
    pub reserved_count: u32,
    #[serde(alias = "zanho_st_rate")]
    pub reserved_streak_rate: f64,
    pub charge_prob: f64,
    pub charge_payout: u32,
    #[serde(alias = "charge_st_rate")]
    pub charge_streak_rate: f64,
    pub lt_end_payout: u32,
}

impl Default for MachineSpecBuilder {
    fn default() -> Self {
        Self::new("Unnamed")
    }
}

impl MachineSpecBuilder {
    /// Reference defaults; payout tables start empty and must be filled
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hit_prob: 1.0 / 319.7,
            st_hit_prob: 1.0 / 99.4,
            border_rotations_per_1k: None,
            bonus_table: Vec::new(),
            continuation_table: Vec::new(),
            streak_resolution: StreakResolution::Probability,
            st_spins: 163,
            st_continue_rate: 0.81,
            time_reduced_on_fail: 100,
            time_reduced_after_streak: 0,
            time_reduced_rotations_per_1k: 30.0,
            reserved_count: 2,
            reserved_streak_rate: 1.0,
            charge_prob: 0.0,
            charge_payout: 300,
            charge_streak_rate: 0.0,
            lt_end_payout: 0,
        }
    }

    pub fn hit_prob(mut self, p: f64) -> Self {
        self.hit_prob = p;
        self
    }

    pub fn st_hit_prob(mut self, p: f64) -> Self {
        self.st_hit_prob = p;
        self
    }

    pub fn border(mut self, rotations_per_1k: f64) -> Self {
        self.border_rotations_per_1k = Some(rotations_per_1k);
        self
    }

    pub fn bonus(mut self, probability: f64, payout: u32, enters_streak: bool) -> Self {
        self.bonus_table
            .push(BonusOutcome::new(probability, payout, enters_streak));
        self
    }

    pub fn continuation(mut self, probability: f64, payout: u32) -> Self {
        self.continuation_table
            .push(ContinuationOutcome::new(probability, payout));
        self
    }

    pub fn streak_resolution(mut self, resolution: StreakResolution) -> Self {
        self.streak_resolution = resolution;
        self
    }

    pub fn st_spins(mut self, spins: u32) -> Self {
        self.st_spins = spins;
        self
    }

    pub fn st_continue_rate(mut self, rate: f64) -> Self {
        self.st_continue_rate = rate;
        self
    }

    pub fn time_reduced(mut self, on_fail: u32, after_streak: u32) -> Self {
        self.time_reduced_on_fail = on_fail;
        self.time_reduced_after_streak = after_streak;
        self
    }

    pub fn time_reduced_rotations_per_1k(mut self, rate: f64) -> Self {
        self.time_reduced_rotations_per_1k = rate;
        self
    }

    pub fn reserved(mut self, count: u32, streak_rate: f64) -> Self {
        self.reserved_count = count;
        self.reserved_streak_rate = streak_rate;
        self
    }

    pub fn charge(mut self, prob: f64, payout: u32, streak_rate: f64) -> Self {
        self.charge_prob = prob;
        self.charge_payout = payout;
        self.charge_streak_rate = streak_rate;
        self
    }

    pub fn lt_end_payout(mut self, payout: u32) -> Self {
        self.lt_end_payout = payout;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<MachineSpec> {
        check_hit_prob("hit_prob", self.hit_prob)?;
        check_hit_prob("st_hit_prob", self.st_hit_prob)?;
        check_rate("st_continue_rate", self.st_continue_rate)?;
        check_rate("reserved_streak_rate", self.reserved_streak_rate)?;
        check_rate("charge_prob", self.charge_prob)?;
        check_rate("charge_streak_rate", self.charge_streak_rate)?;

        if self.st_spins < 1 {
            return Err(SimError::InvalidSpec("st_spins must be at least 1".into()));
        }

        if !(self.time_reduced_rotations_per_1k.is_finite()
            && self.time_reduced_rotations_per_1k > 0.0)
        {
            return Err(SimError::InvalidSpec(format!(
                "time_reduced_rotations_per_1k must be positive, got {}",
                self.time_reduced_rotations_per_1k
            )));
        }

        if let Some(border) = self.border_rotations_per_1k {
            if !(border.is_finite() && border > 0.0) {
                return Err(SimError::InvalidSpec(format!(
                    "border_rotations_per_1k must be positive, got {}",
                    border
                )));
            }
        }

        // A streak that can never fail would never hand control back
        let endless = match self.streak_resolution {
            StreakResolution::Probability if self.st_continue_rate >= 1.0 => {
                Some(("st_continue_rate", self.st_continue_rate))
            }
            StreakResolution::Rotation if self.st_hit_prob >= 1.0 => {
                Some(("st_hit_prob", self.st_hit_prob))
            }
            _ => None,
        };
        if let Some((field, value)) = endless {
            return Err(SimError::InvalidSpec(format!(
                "{} = {} makes every {:?}-resolution streak continue forever; \
                 a streak must be able to end",
                field, value, self.streak_resolution
            )));
        }

        let bonus_table = PayoutTable::new("bonus_table", self.bonus_table)?;
        let continuation_table = PayoutTable::new("continuation_table", self.continuation_table)?;

        Ok(MachineSpec {
            name: self.name,
            hit_prob: self.hit_prob,
            st_hit_prob: self.st_hit_prob,
            border_rotations_per_1k: self.border_rotations_per_1k,
            bonus_table,
            continuation_table,
            streak_resolution: self.streak_resolution,
            st_spins: self.st_spins,
            st_continue_rate: self.st_continue_rate,
            time_reduced_on_fail: self.time_reduced_on_fail,
            time_reduced_after_streak: self.time_reduced_after_streak,
            time_reduced_rotations_per_1k: self.time_reduced_rotations_per_1k,
            reserved_count: self.reserved_count,
            reserved_streak_rate: self.reserved_streak_rate,
            charge_prob: self.charge_prob,
            charge_payout: self.charge_payout,
            charge_streak_rate: self.charge_streak_rate,
            lt_end_payout: self.lt_end_payout,
        })
    }
}

impl From<&MachineSpec> for MachineSpecBuilder {
    fn from(spec: &MachineSpec) -> Self {
        Self {
            name: spec.name.clone(),
            hit_prob: spec.hit_prob,
            st_hit_prob: spec.st_hit_prob,
            border_rotations_per_1k: spec.border_rotations_per_1k,
            bonus_table: spec.bonus_table.entries.clone(),
            continuation_table: spec.continuation_table.entries.clone(),
            streak_resolution: spec.streak_resolution,
            st_spins: spec.st_spins,
            st_continue_rate: spec.st_continue_rate,
            time_reduced_on_fail: spec.time_reduced_on_fail,
            time_reduced_after_streak: spec.time_reduced_after_streak,
            time_reduced_rotations_per_1k: spec.time_reduced_rotations_per_1k,
            reserved_count: spec.reserved_count,
            reserved_streak_rate: spec.reserved_streak_rate,
            charge_prob: spec.charge_prob,
            charge_payout: spec.charge_payout,
            charge_streak_rate: spec.charge_streak_rate,
            lt_end_payout: spec.lt_end_payout,
        }
    }
}

fn check_hit_prob(field: &str, p: f64) -> Result<()> {
    if p > 0.0 && p <= 1.0 {
        Ok(())
    } else {
        Err(SimError::InvalidSpec(format!(
            "{} must lie in (0, 1], got {}",
            field, p
        )))
    }
}

fn check_rate(field: &str, r: f64) -> Result<()> {
    if (0.0..=1.0).contains(&r) {
        Ok(())
    } else {
        Err(SimError::InvalidSpec(format!(
            "{} must lie in [0, 1], got {}",
            field, r
        )))
    }
}

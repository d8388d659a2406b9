//! Report generation for batch results

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::batch::BatchResult;
use crate::chain::{SessionResult, TriggerOrigin};
use crate::session::PlayConditions;
use crate::spec::MachineSpec;
use crate::stats::SessionSummary;

/// Largest chain length listed in the distribution line
const DISTRIBUTION_MAX_CHAIN: u32 = 7;

/// Buckets below these shares are left out of the text output
const MIN_CHAIN_SHARE: f64 = 0.01;
const MIN_BRACKET_SHARE: f64 = 0.005;

/// Report over one or more machines run under the same conditions
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Report title
    pub title: String,

    /// Timestamp
    pub timestamp: String,

    /// One entry per machine, in insertion order
    pub machines: Vec<MachineReport>,
}

/// Summary for a single machine
#[derive(Debug, Clone, Serialize)]
pub struct MachineReport {
    pub name: String,
    /// Relative margin over the machine's border (None when unknown)
    pub border_margin: Option<f64>,
    pub conditions: PlayConditions,
    pub seed: u64,
    pub duration_ms: u64,
    pub summary: SessionSummary,
}

impl BatchReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            machines: Vec::new(),
        }
    }

    /// Summarize a batch and append it
    pub fn add_batch(&mut self, spec: &MachineSpec, batch: &BatchResult) {
        self.machines.push(MachineReport {
            name: spec.name().to_string(),
            border_margin: spec.border_margin(batch.conditions.rotations_per_1k),
            conditions: batch.conditions,
            seed: batch.seed,
            duration_ms: batch.duration_ms,
            summary: SessionSummary::from_results(&batch.sessions),
        });
    }

    /// Generate text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.title));
        output.push_str(&format!("{}\n\n", "=".repeat(self.title.chars().count())));

        if let Some(first) = self.machines.first() {
            let c = &first.conditions;
            output.push_str(&format!(
                "Conditions: {:.1} rotations/1k, {} rotations, {} balls/1k, {:.2} per ball\n\n",
                c.rotations_per_1k, c.total_rotations, c.balls_per_1k, c.currency_per_ball
            ));
        }

        for machine in &self.machines {
            output.push_str(&machine.to_text());
            output.push('\n');
        }

        if self.machines.len() > 1 {
            output.push_str(&self.comparison_table());
        }

        output
    }

    /// Side-by-side win rate, mean and spread
    pub fn comparison_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{:<24} {:>8} {:>12} {:>12} {:>10}\n",
            "Machine", "Win", "Mean", "Std dev", "Border"
        ));
        output.push_str(&"-".repeat(70));
        output.push('\n');

        for machine in &self.machines {
            let s = &machine.summary;
            output.push_str(&format!(
                "{:<24} {:>7.1}% {:>12} {:>12} {:>10}\n",
                machine.name,
                s.win_rate * 100.0,
                format_signed(s.mean_profit),
                format_amount(s.std_profit),
                machine
                    .border_margin
                    .map(|m| format!("{:+.1}%", m * 100.0))
                    .unwrap_or_else(|| "-".into()),
            ));
        }

        output
    }

    /// Generate JSON report
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    /// Generate markdown report
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("**Timestamp:** {}\n\n", self.timestamp));

        output.push_str("| Machine | Sessions | Win rate | Mean | Median | Std dev | Chain |\n");
        output.push_str("|---------|----------|----------|------|--------|---------|-------|\n");
        for machine in &self.machines {
            let s = &machine.summary;
            output.push_str(&format!(
                "| {} | {} | {:.1}% | {} | {} | {} | {} |\n",
                machine.name,
                s.sessions,
                s.win_rate * 100.0,
                format_signed(s.mean_profit),
                format_signed(s.median_profit),
                format_amount(s.std_profit),
                s.mean_chain
                    .map(|c| format!("{:.2}", c))
                    .unwrap_or_else(|| "-".into()),
            ));
        }
        output.push('\n');

        output
    }

    /// Save report to file
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ReportFormat) -> std::io::Result<()> {
        let content = match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
        };
        fs::write(path, content)
    }
}

impl MachineReport {
    pub fn to_text(&self) -> String {
        let s = &self.summary;
        let mut output = String::new();

        output.push_str(&format!("[{}]", self.name));
        if let Some(margin) = self.border_margin {
            output.push_str(&format!(" border {:+.1}%", margin * 100.0));
        }
        output.push('\n');

        output.push_str(&format!(
            "  Sessions:  {} (seed {}, {} ms)\n",
            s.sessions, self.seed, self.duration_ms
        ));
        output.push_str(&format!("  Win rate:  {:.1}%\n", s.win_rate * 100.0));
        output.push_str(&format!("  Mean:      {}\n", format_signed(s.mean_profit)));
        output.push_str(&format!("  Median:    {}\n", format_signed(s.median_profit)));
        output.push_str(&format!("  Std dev:   {}\n", format_amount(s.std_profit)));

        if let (Some(mean), Some(median)) = (s.mean_first_hit, s.median_first_hit) {
            output.push_str(&format!(
                "  First hit: mean {:.0}, median {:.0} rotations\n",
                mean, median
            ));
        }

        if let Some(mean_chain) = s.mean_chain {
            output.push_str(&format!(
                "  Chains:    mean {:.1}, max {}, {:.2} triggers/session\n",
                mean_chain, s.max_chain, s.mean_triggers
            ));

            let upper = s.max_chain.min(DISTRIBUTION_MAX_CHAIN);
            let buckets: Vec<String> = (1..=upper)
                .map(|len| (len, s.chain_share(len)))
                .filter(|&(_, share)| share >= MIN_CHAIN_SHARE)
                .map(|(len, share)| format!("{}x:{:.0}%", len, share * 100.0))
                .collect();
            if !buckets.is_empty() {
                output.push_str(&format!("  Spread:    {}\n", buckets.join(" ")));
            }
        }

        if s.charge_sessions > 0 {
            output.push_str(&format!("  Charge:    {} sessions\n", s.charge_sessions));
        }

        output.push_str("  Profit:\n");
        for share in s.brackets.iter().filter(|b| b.share >= MIN_BRACKET_SHARE) {
            let pct = share.share * 100.0;
            output.push_str(&format!(
                "    {:<14} {:>5.1}% {}\n",
                share.bracket.label,
                pct,
                "#".repeat((pct / 2.0) as usize)
            ));
        }

        output
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION HISTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Hit-by-hit history of each session
pub fn session_history(results: &[SessionResult]) -> String {
    let mut output = String::new();

    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!("{}\n", "=".repeat(50)));
        if results.len() > 1 {
            output.push_str(&format!("Session {}: {}\n", i + 1, format_signed(result.profit)));
        } else {
            output.push_str("Hit history\n");
        }
        output.push_str(&format!("{}\n", "=".repeat(50)));

        if result.episodes.is_empty() {
            output.push_str("  no hits\n\n");
            continue;
        }

        let mut cumulative = 0u32;
        for (j, episode) in result.episodes.iter().enumerate() {
            cumulative += episode.trigger_rotation;

            let at = match episode.origin {
                TriggerOrigin::Reserved => "reserved".to_string(),
                _ => format!("rotation {}", episode.trigger_rotation),
            };
            let tag = if episode.is_charge_runaway() {
                " [charge runaway]"
            } else if episode.is_charge_hit() {
                " [charge]"
            } else if episode.is_reserved_hit() {
                " [reserved]"
            } else if episode.is_time_reduced_hit() {
                " [time-reduced]"
            } else {
                ""
            };

            output.push_str(&format!(
                "\n  Hit {}: {} (cumulative {}){}\n",
                j + 1,
                at,
                cumulative,
                tag
            ));
            output.push_str(&format!(
                "    Trigger: {}",
                group_digits(episode.trigger_payout as u64)
            ));

            if episode.chain_length > 1 {
                output.push_str(&format!(" -> streak -> {} chain\n", episode.chain_length));
                for (k, payout) in episode.continuation_payouts.iter().enumerate() {
                    output.push_str(&format!(
                        "      #{}: {}\n",
                        k + 2,
                        group_digits(*payout as u64)
                    ));
                }
            } else {
                output.push_str(" -> single\n");
            }
            if episode.end_bonus > 0 {
                output.push_str(&format!(
                    "    End bonus: {}\n",
                    group_digits(episode.end_bonus as u64)
                ));
            }
            output.push_str(&format!("    Total: {}\n", group_digits(episode.total_payout)));
        }

        output.push_str(&format!("\n  {}\n", "-".repeat(40)));
        output.push_str(&format!("  Hits:    {}\n", result.total_hits));
        output.push_str(&format!("  Payout:  {}\n", group_digits(result.total_payout)));
        output.push_str(&format!("  Profit:  {}\n\n", format_signed(result.profit)));
    }

    output
}

fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole amount with thousands separators
pub fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}{}", sign, group_digits(rounded.abs() as u64))
}

/// Like [`format_amount`] but always signed
pub fn format_signed(value: f64) -> String {
    let rounded = value.round();
    if rounded >= 0.0 {
        format!("+{}", group_digits(rounded as u64))
    } else {
        format_amount(rounded)
    }
}

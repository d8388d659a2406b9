//! Closed-form hitting probabilities

use serde::{Deserialize, Serialize};

use crate::spec::MachineSpec;

/// Rotation counts tabulated by default
pub const DEFAULT_DROUGHT_ROTATIONS: [u32; 6] = [500, 700, 1000, 1200, 1500, 2000];

/// Probability of no hit in `rotations` independent tries at `p`: `(1 − p)^n`
pub fn hitting_probability(p: f64, rotations: u32) -> f64 {
    (1.0 - p).powf(rotations as f64)
}

/// Probability of at least one hit in `rotations` tries
pub fn hit_within(p: f64, rotations: u32) -> f64 {
    1.0 - hitting_probability(p, rotations)
}

/// One row of a drought table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroughtRow {
    pub rotations: u32,
    /// No-hit probability per machine, in table column order
    pub probabilities: Vec<f64>,
}

/// No-hit probabilities of several machines over a list of rotation counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroughtTable {
    pub machines: Vec<String>,
    pub rows: Vec<DroughtRow>,
}

impl DroughtTable {
    pub fn new(specs: &[MachineSpec], rotations: &[u32]) -> Self {
        let rows = rotations
            .iter()
            .map(|&n| DroughtRow {
                rotations: n,
                probabilities: specs
                    .iter()
                    .map(|spec| hitting_probability(spec.hit_prob(), n))
                    .collect(),
            })
            .collect();

        Self {
            machines: specs.iter().map(|s| s.name().to_string()).collect(),
            rows,
        }
    }

    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{:<10}", "Rotations"));
        for name in &self.machines {
            output.push_str(&format!(" {:>22}", name));
        }
        if self.machines.len() == 2 {
            output.push_str(&format!(" {:>8}", "Ratio"));
        }
        output.push('\n');
        output.push_str(&"-".repeat(10 + 23 * self.machines.len() + 9));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!("{:<10}", row.rotations));
            for p in &row.probabilities {
                output.push_str(&format!(" {:>21.2}%", p * 100.0));
            }
            if let [a, b] = row.probabilities.as_slice() {
                if *a > 0.0 {
                    output.push_str(&format!(" {:>7.2}x", b / a));
                }
            }
            output.push('\n');
        }

        output
    }
}

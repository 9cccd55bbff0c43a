//! scenario.rs — Named DOUT1 input presets, so the simulator can exercise the
//! gateway's auto-control policy (spec.md §4.5) without the operator hand-
//! picking raw IO values on the command line.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scenario {
    /// DOUT1 stays at 0 for the whole run — exercises the 12-hour activation
    /// timeout when run with `--speed` sped up.
    Idle,
    /// DOUT1 stays nonzero — the zero-tracking origin never advances.
    Driving,
    /// Alternates zero/nonzero every batch, exercising the reset path.
    Toggle,
}

impl Scenario {
    /// The DOUT1 value to report on batch `n` (0-indexed).
    pub fn dout1_value(&self, batch_index: u64) -> u64 {
        match self {
            Scenario::Idle => 0,
            Scenario::Driving => 1,
            Scenario::Toggle => batch_index % 2,
        }
    }
}

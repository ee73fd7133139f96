//! Trend between consecutive uploaded temperatures.

use crate::display::DisplayCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Unchanged,
}

/// Compare two uploaded (already rounded) temperatures.
pub fn classify(previous: f64, current: f64) -> Trend {
    if current > previous {
        Trend::Rising
    } else if current < previous {
        Trend::Falling
    } else {
        Trend::Unchanged
    }
}

impl Trend {
    pub fn display_command(self) -> DisplayCommand {
        match self {
            Trend::Rising => DisplayCommand::TrendUp,
            Trend::Falling => DisplayCommand::TrendDown,
            Trend::Unchanged => DisplayCommand::TrendFlat,
        }
    }
}

use serde::{Deserialize, Serialize};

/// The unit a time-based profile records its weights in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    /// Multiplier converting one value in this unit into nanoseconds.
    pub fn nanoseconds_factor(self) -> f64 {
        match self {
            Self::Nanoseconds => 1.0,
            Self::Microseconds => 1_000.0,
            Self::Milliseconds => 1_000_000.0,
            Self::Seconds => 1_000_000_000.0,
        }
    }
}

/// Presentation policy turning a raw profile weight into a display string.
///
/// Chosen by the importer when a profile builder is created; the call tree
/// itself only ever stores plain `f64` weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueFormatter {
    /// Elapsed time recorded in the given unit.
    Time(TimeUnit),
    /// Memory in bytes.
    Bytes,
    /// Unitless sample counts or weights.
    #[default]
    Raw,
}

impl ValueFormatter {
    /// Shorthand for the formatter used by timestamped samplers.
    pub fn seconds() -> Self {
        Self::Time(TimeUnit::Seconds)
    }

    /// Format a weight for display.
    pub fn format(&self, value: f64) -> String {
        match self {
            Self::Time(unit) => format_nanoseconds(value * unit.nanoseconds_factor()),
            Self::Bytes => {
                if value >= 1_073_741_824.0 {
                    format!("{:.1} GiB", value / 1_073_741_824.0)
                } else if value >= 1_048_576.0 {
                    format!("{:.1} MiB", value / 1_048_576.0)
                } else if value >= 1_024.0 {
                    format!("{:.1} KiB", value / 1_024.0)
                } else {
                    format!("{} B", value as u64)
                }
            }
            Self::Raw => {
                if value.fract() == 0.0 {
                    format!("{value:.0}")
                } else {
                    format!("{value:.2}")
                }
            }
        }
    }
}

fn format_nanoseconds(nanos: f64) -> String {
    if nanos >= 1_000_000_000.0 {
        format!("{:.2}s", nanos / 1_000_000_000.0)
    } else if nanos >= 1_000_000.0 {
        format!("{:.1}ms", nanos / 1_000_000.0)
    } else if nanos >= 1_000.0 {
        format!("{:.0}µs", nanos / 1_000.0)
    } else {
        format!("{nanos:.0}ns")
    }
}

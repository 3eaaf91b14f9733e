use serde::{Deserialize, Serialize};

/// The three trading-logic variants an EA can be generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicKind {
    Crossover,
    Threshold,
    Custom,
}

impl LogicKind {
    pub const ALL: [LogicKind; 3] = [LogicKind::Crossover, LogicKind::Threshold, LogicKind::Custom];

    /// Tag used in the `logicConfig.kind` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicKind::Crossover => "crossover",
            LogicKind::Threshold => "threshold",
            LogicKind::Custom => "custom",
        }
    }
}

impl std::fmt::Display for LogicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogicKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crossover" => Ok(LogicKind::Crossover),
            "threshold" => Ok(LogicKind::Threshold),
            "custom" => Ok(LogicKind::Custom),
            _ => Err(format!("Unknown logic kind: {}", s)),
        }
    }
}

/// Which breach of the threshold levels produces a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdDirection {
    /// Value above the upper level.
    Above,
    /// Value below the lower level.
    Below,
    /// Either breach, each producing its own signal.
    Band,
}

impl ThresholdDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdDirection::Above => "above",
            ThresholdDirection::Below => "below",
            ThresholdDirection::Band => "band",
        }
    }

    /// Whether the upper level takes part in the comparison.
    pub fn uses_upper(&self) -> bool {
        matches!(self, ThresholdDirection::Above | ThresholdDirection::Band)
    }

    /// Whether the lower level takes part in the comparison.
    pub fn uses_lower(&self) -> bool {
        matches!(self, ThresholdDirection::Below | ThresholdDirection::Band)
    }
}

impl std::fmt::Display for ThresholdDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ThresholdDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "above" => Ok(ThresholdDirection::Above),
            "below" => Ok(ThresholdDirection::Below),
            "band" => Ok(ThresholdDirection::Band),
            _ => Err(format!("Unknown threshold direction: {}", s)),
        }
    }
}

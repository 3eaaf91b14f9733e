use serde::{Deserialize, Serialize};

use super::config::{LogicKind, ThresholdDirection};

// ── Defaults (match the original builder form) ──

pub const DEFAULT_INDICATOR_NAME: &str = "MyIndicator";
pub const DEFAULT_TIMEFRAME: &str = "_Period";
pub const DEFAULT_LOTS: f64 = 0.10;
pub const DEFAULT_SLIPPAGE: u32 = 3;
pub const DEFAULT_STOP_LOSS: u32 = 300;
pub const DEFAULT_TAKE_PROFIT: u32 = 600;
pub const DEFAULT_MAGIC_NUMBER: i32 = 123456;
pub const DEFAULT_UPPER_THRESHOLD: f64 = 70.0;
pub const DEFAULT_LOWER_THRESHOLD: f64 = 30.0;

// ── Logic configs ──

/// Fast/slow buffer crossover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CrossoverConfig {
    pub fast_buffer: u32,
    pub slow_buffer: u32,
    pub allow_multiple_positions: bool,
    pub reverse_signal: bool,
}

/// Single buffer compared against fixed levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThresholdConfig {
    pub buffer: u32,
    /// `None` disables the upper comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    /// `None` disables the lower comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    pub direction: ThresholdDirection,
    pub allow_multiple_positions: bool,
    /// Swap the side bound to each breach (upper → sell, lower → buy).
    #[serde(default)]
    pub reverse_signal: bool,
}

/// User-written MQL4 placed verbatim inside `OnTick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomConfig {
    pub snippet: String,
}

/// Trading logic, tagged by `kind`. Exactly one shape is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogicConfig {
    Crossover(CrossoverConfig),
    Threshold(ThresholdConfig),
    Custom(CustomConfig),
}

impl LogicConfig {
    pub fn kind(&self) -> LogicKind {
        match self {
            LogicConfig::Crossover(_) => LogicKind::Crossover,
            LogicConfig::Threshold(_) => LogicKind::Threshold,
            LogicConfig::Custom(_) => LogicKind::Custom,
        }
    }
}

// ── Payload ──

/// Everything the composer needs to emit an EA. Built by the caller once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionPayload {
    pub indicator_name: String,
    /// Raw indicator source; parameters are extracted from it.
    #[serde(default)]
    pub indicator_code: String,
    pub timeframe_expression: String,
    pub lots: f64,
    pub slippage: u32,
    /// Points; 0 disables.
    pub stop_loss: u32,
    /// Points; 0 disables.
    pub take_profit: u32,
    pub magic_number: i32,
    pub logic_config: LogicConfig,
}

impl ConversionPayload {
    /// Caller-side clamping applied before generation, the way the builder form does it.
    ///
    /// Bad lot sizes fall back to [`DEFAULT_LOTS`], the indicator name loses surrounding
    /// whitespace and a trailing `.mq4`/`.ex4`, and non-finite threshold levels are unset.
    pub fn normalized(mut self) -> Self {
        if !self.lots.is_finite() || self.lots <= 0.0 {
            self.lots = DEFAULT_LOTS;
        }
        self.indicator_name = strip_indicator_extension(self.indicator_name.trim()).to_string();

        if let LogicConfig::Threshold(t) = &mut self.logic_config {
            t.upper = t.upper.filter(|v| v.is_finite());
            t.lower = t.lower.filter(|v| v.is_finite());
        }
        self
    }
}

fn strip_indicator_extension(name: &str) -> &str {
    for ext in [".mq4", ".ex4"] {
        if name.len() > ext.len() {
            let (stem, tail) = name.split_at(name.len() - ext.len());
            if tail.eq_ignore_ascii_case(ext) {
                return stem;
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossover_payload() -> ConversionPayload {
        ConversionPayload {
            indicator_name: "MyIndicator".into(),
            indicator_code: String::new(),
            timeframe_expression: "_Period".into(),
            lots: 0.1,
            slippage: 3,
            stop_loss: 300,
            take_profit: 600,
            magic_number: 123456,
            logic_config: LogicConfig::Crossover(CrossoverConfig {
                fast_buffer: 0,
                slow_buffer: 1,
                allow_multiple_positions: false,
                reverse_signal: false,
            }),
        }
    }

    #[test]
    fn test_deserialize_camel_case_payload() {
        let json = r#"{
            "indicatorName": "Osc",
            "indicatorCode": "input int Period = 14;",
            "timeframeExpression": "PERIOD_H1",
            "lots": 0.2,
            "slippage": 3,
            "stopLoss": 0,
            "takeProfit": 0,
            "magicNumber": 42,
            "logicConfig": { "kind": "threshold", "buffer": 0, "upper": 70, "direction": "above", "allowMultiplePositions": true }
        }"#;
        let payload: ConversionPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.logic_config.kind(), LogicKind::Threshold);
        match payload.logic_config {
            LogicConfig::Threshold(t) => {
                assert_eq!(t.upper, Some(70.0));
                assert_eq!(t.lower, None);
                assert!(!t.reverse_signal);
            }
            other => panic!("unexpected logic: {:?}", other),
        }
    }

    #[test]
    fn test_foreign_fields_are_rejected() {
        // `buffer` belongs to threshold, not crossover
        let json = r#"{ "kind": "crossover", "fastBuffer": 0, "slowBuffer": 1,
                        "allowMultiplePositions": false, "reverseSignal": false, "buffer": 2 }"#;
        assert!(serde_json::from_str::<LogicConfig>(json).is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{ "kind": "momentum", "snippet": "" }"#;
        assert!(serde_json::from_str::<LogicConfig>(json).is_err());
    }

    #[test]
    fn test_normalized_clamps_lots_and_name() {
        let mut payload = crossover_payload();
        payload.lots = -1.0;
        payload.indicator_name = "  Trend.MQ4 ".into();
        let payload = payload.normalized();
        assert_eq!(payload.lots, DEFAULT_LOTS);
        assert_eq!(payload.indicator_name, "Trend");

        let mut payload = crossover_payload();
        payload.lots = f64::NAN;
        assert_eq!(payload.normalized().lots, DEFAULT_LOTS);
    }

    #[test]
    fn test_normalized_drops_non_finite_levels() {
        let mut payload = crossover_payload();
        payload.logic_config = LogicConfig::Threshold(ThresholdConfig {
            buffer: 0,
            upper: Some(f64::INFINITY),
            lower: Some(30.0),
            direction: ThresholdDirection::Band,
            allow_multiple_positions: false,
            reverse_signal: false,
        });
        match payload.normalized().logic_config {
            LogicConfig::Threshold(t) => {
                assert_eq!(t.upper, None);
                assert_eq!(t.lower, Some(30.0));
            }
            other => panic!("unexpected logic: {:?}", other),
        }
    }

    #[test]
    fn test_extension_only_name_is_kept() {
        assert_eq!(strip_indicator_extension(".mq4"), ".mq4");
        assert_eq!(strip_indicator_extension("Bands.ex4"), "Bands");
    }
}

use std::fmt::Write as FmtWrite;

use crate::models::config::ThresholdDirection;
use crate::models::payload::{CrossoverConfig, CustomConfig, LogicConfig, ThresholdConfig};

use super::codegen::mql_double;

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Text a logic variant contributes to the EA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicFragment {
    /// Extra `input` declarations, placed after the risk inputs.
    pub inputs: String,
    /// Body of `OnTick`, already indented.
    pub on_tick: String,
}

/// Render the selected variant. Called once per composition.
pub fn render(logic: &LogicConfig) -> LogicFragment {
    match logic {
        LogicConfig::Crossover(cfg) => render_crossover(cfg),
        LogicConfig::Threshold(cfg) => render_threshold(cfg),
        LogicConfig::Custom(cfg) => render_custom(cfg),
    }
}

// ══════════════════════════════════════════════════════════════
// Shared helpers
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

impl Side {
    fn order_type(self) -> &'static str {
        match self {
            Side::Buy => "OP_BUY",
            Side::Sell => "OP_SELL",
        }
    }

    /// Direction argument of `HasOpenPosition` / `ClosePositions`.
    fn direction(self) -> i32 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Close the other side if configured, then open. Without stacking the open
/// is guarded on the same statement so no unguarded `OpenOrder` exists.
fn write_entry_block(out: &mut String, condition: &str, side: Side, allow_multiple: bool, keyword: &str) {
    writeln!(out, "   {}({})", keyword, condition).ok();
    writeln!(out, "   {{").ok();
    writeln!(out, "      if(CloseOppositeSignal) ClosePositions({});", side.opposite().direction()).ok();
    if allow_multiple {
        writeln!(out, "      OpenOrder({});", side.order_type()).ok();
    } else {
        writeln!(out, "      if(!HasOpenPosition({})) OpenOrder({});", side.direction(), side.order_type()).ok();
    }
    writeln!(out, "   }}").ok();
}

// ══════════════════════════════════════════════════════════════
// Crossover
// ══════════════════════════════════════════════════════════════

fn render_crossover(cfg: &CrossoverConfig) -> LogicFragment {
    let mut on_tick = String::with_capacity(1024);
    let out = &mut on_tick;

    writeln!(
        out,
        "   // Crossover: buffer {} (fast) against buffer {} (slow){}",
        cfg.fast_buffer,
        cfg.slow_buffer,
        if cfg.reverse_signal { ", signals reversed" } else { "" }
    )
    .ok();
    writeln!(out, "   if(Bars < 2) return;").ok();
    writeln!(out).ok();
    writeln!(out, "   double fast     = GetIndicatorValue({}, 0);", cfg.fast_buffer).ok();
    writeln!(out, "   double slow     = GetIndicatorValue({}, 0);", cfg.slow_buffer).ok();
    writeln!(out, "   double fastPrev = GetIndicatorValue({}, 1);", cfg.fast_buffer).ok();
    writeln!(out, "   double slowPrev = GetIndicatorValue({}, 1);", cfg.slow_buffer).ok();
    writeln!(out, "   if(fast == EMPTY_VALUE || slow == EMPTY_VALUE || fastPrev == EMPTY_VALUE || slowPrev == EMPTY_VALUE) return;").ok();
    writeln!(out).ok();
    writeln!(out, "   bool bullishCross = fastPrev <= slowPrev && fast > slow;").ok();
    writeln!(out, "   bool bearishCross = fastPrev >= slowPrev && fast < slow;").ok();
    writeln!(out).ok();

    let (buy_cross, sell_cross) = if cfg.reverse_signal {
        ("bearishCross", "bullishCross")
    } else {
        ("bullishCross", "bearishCross")
    };
    writeln!(out, "   bool buySignal  = {};", buy_cross).ok();
    writeln!(out, "   bool sellSignal = {};", sell_cross).ok();
    writeln!(out).ok();

    write_entry_block(out, "buySignal", Side::Buy, cfg.allow_multiple_positions, "if");
    write_entry_block(out, "sellSignal", Side::Sell, cfg.allow_multiple_positions, "else if");

    LogicFragment {
        inputs: String::new(),
        on_tick,
    }
}

// ══════════════════════════════════════════════════════════════
// Threshold
// ══════════════════════════════════════════════════════════════

fn render_threshold(cfg: &ThresholdConfig) -> LogicFragment {
    let upper = cfg.upper.filter(|_| cfg.direction.uses_upper());
    let lower = cfg.lower.filter(|_| cfg.direction.uses_lower());

    let mut inputs = String::new();
    if let Some(level) = upper {
        writeln!(inputs, "{:<40}// Upper threshold", format!("input double UpperThreshold = {};", mql_double(level))).ok();
    }
    if let Some(level) = lower {
        writeln!(inputs, "{:<40}// Lower threshold", format!("input double LowerThreshold = {};", mql_double(level))).ok();
    }

    let (upper_side, lower_side) = if cfg.reverse_signal {
        (Side::Sell, Side::Buy)
    } else {
        (Side::Buy, Side::Sell)
    };

    let mut on_tick = String::with_capacity(1024);
    let out = &mut on_tick;

    writeln!(
        out,
        "   // Threshold: buffer {}, mode {}{}",
        cfg.buffer,
        cfg.direction,
        if cfg.reverse_signal { ", signals reversed" } else { "" }
    )
    .ok();
    writeln!(out, "   double value = GetIndicatorValue({}, 0);", cfg.buffer).ok();
    writeln!(out, "   if(value == EMPTY_VALUE) return;").ok();
    writeln!(out).ok();

    if cfg.direction.uses_upper() {
        match upper {
            Some(_) => {
                writeln!(out, "   bool upperBreach = value > UpperThreshold;").ok();
                write_entry_block(out, "upperBreach", upper_side, cfg.allow_multiple_positions, "if");
            }
            None => {
                writeln!(out, "   // Upper threshold not set: upper breach check disabled").ok();
            }
        }
    }

    if cfg.direction == ThresholdDirection::Band {
        writeln!(out).ok();
    }

    if cfg.direction.uses_lower() {
        match lower {
            Some(_) => {
                writeln!(out, "   bool lowerBreach = value < LowerThreshold;").ok();
                write_entry_block(out, "lowerBreach", lower_side, cfg.allow_multiple_positions, "if");
            }
            None => {
                writeln!(out, "   // Lower threshold not set: lower breach check disabled").ok();
            }
        }
    }

    LogicFragment { inputs, on_tick }
}

// ══════════════════════════════════════════════════════════════
// Custom
// ══════════════════════════════════════════════════════════════

fn render_custom(cfg: &CustomConfig) -> LogicFragment {
    let mut on_tick = String::with_capacity(cfg.snippet.len() + 128);
    on_tick.push_str("   // ---- custom logic (inserted verbatim) ----\n");
    on_tick.push_str(&cfg.snippet);
    if !cfg.snippet.ends_with('\n') {
        on_tick.push('\n');
    }
    on_tick.push_str("   // ---- end of custom logic ----\n");

    LogicFragment {
        inputs: String::new(),
        on_tick,
    }
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

use std::collections::{HashMap, HashSet};
use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::parameter::IndicatorParameter;
use crate::models::payload::{ConversionPayload, LogicConfig};

use super::inputs::{extract_parameters, infer_declaration_type, scan_declarations};
use super::logic;

// ══════════════════════════════════════════════════════════════
// Public API: types
// ══════════════════════════════════════════════════════════════

/// A generated Expert Advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedSource {
    /// Suggested file name: the indicator's base name with `.mq4`.
    pub filename: String,
    pub code: String,
}

impl std::fmt::Display for GeneratedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

/// Identifiers the generated EA declares itself, including the
/// `GetIndicatorValue` arguments that would hide a same-named input.
pub const RESERVED_NAMES: &[&str] = &[
    "Lots",
    "Slippage",
    "StopLoss",
    "TakeProfit",
    "MagicNumber",
    "CloseOppositeSignal",
    "IndicatorName",
    "UpperThreshold",
    "LowerThreshold",
    "GetIndicatorValue",
    "bufferIndex",
    "barShift",
    "HasOpenPosition",
    "OpenOrder",
    "ClosePositions",
    "OnInit",
    "OnDeinit",
    "OnTick",
];

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Generate the MQL4 Expert Advisor for a payload, carrying through the
/// parameters found in `payload.indicator_code`.
pub fn compose(payload: &ConversionPayload) -> Result<GeneratedSource, AppError> {
    let parameters = extract_parameters(&payload.indicator_code);
    compose_with_parameters(payload, &parameters)
}

/// Same as [`compose`] with an already-extracted parameter list.
///
/// Fails without producing any text on a blank indicator name, a lot size that
/// is not a positive finite number, or a non-finite threshold level.
pub fn compose_with_parameters(
    payload: &ConversionPayload,
    parameters: &[IndicatorParameter],
) -> Result<GeneratedSource, AppError> {
    validate_payload(payload)?;

    let params = unique_parameters(parameters);
    let declared = declared_types(&payload.indicator_code);
    let fragment = logic::render(&payload.logic_config);
    let filename = ea_filename(&payload.indicator_name);

    let mut out = String::with_capacity(8192);
    mql4_header(&mut out, &filename, payload);
    mql4_risk_inputs(&mut out, payload);
    mql4_logic_inputs(&mut out, &fragment.inputs);
    mql4_indicator_inputs(&mut out, &params, &declared);
    mql4_indicator_reader(&mut out, payload, &params);
    mql4_has_open_position(&mut out);
    mql4_open_order(&mut out);
    mql4_close_positions(&mut out);
    mql4_on_init(&mut out);
    mql4_on_deinit(&mut out);
    mql4_on_tick(&mut out, &fragment.on_tick);

    Ok(GeneratedSource { filename, code: out })
}

/// Carried-through parameter names that clash with the EA's own identifiers.
/// They are still emitted unmodified; MetaEditor will report the clash.
pub fn reserved_name_collisions(parameters: &[IndicatorParameter]) -> Vec<&str> {
    parameters
        .iter()
        .map(|p| p.name.as_str())
        .filter(|name| RESERVED_NAMES.contains(name))
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Shared helpers
// ══════════════════════════════════════════════════════════════

fn validate_payload(payload: &ConversionPayload) -> Result<(), AppError> {
    if payload.indicator_name.trim().is_empty() {
        return Err(AppError::InvalidConfig("indicator name is required".into()));
    }
    if !payload.lots.is_finite() || payload.lots <= 0.0 {
        return Err(AppError::InvalidConfig(format!(
            "lot size must be a positive number, got {}",
            payload.lots
        )));
    }
    if let LogicConfig::Threshold(t) = &payload.logic_config {
        for (label, level) in [("upper", t.upper), ("lower", t.lower)] {
            if let Some(v) = level {
                if !v.is_finite() {
                    return Err(AppError::InvalidConfig(format!("{} threshold must be finite", label)));
                }
            }
        }
    }
    Ok(())
}

/// Type tokens as written in the indicator, by parameter name.
fn declared_types(indicator_code: &str) -> HashMap<String, String> {
    scan_declarations(indicator_code)
        .into_iter()
        .map(|d| (d.parameter.name, d.type_name))
        .collect()
}

/// Drop repeated names, first one wins.
fn unique_parameters(parameters: &[IndicatorParameter]) -> Vec<&IndicatorParameter> {
    let mut seen = HashSet::new();
    parameters.iter().filter(|p| seen.insert(p.name.as_str())).collect()
}

fn ea_filename(indicator_name: &str) -> String {
    let base = indicator_name
        .trim()
        .replace(|c: char| !c.is_alphanumeric() && c != '_' && c != '-', "_");
    format!("{}.mq4", base)
}

/// Format a double literal so MQL always sees a floating-point constant (70 → "70.0").
pub(crate) fn mql_double(v: f64) -> String {
    let s = format!("{}", v);
    if s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Control characters would end a `//` comment early.
fn comment_text(text: &str) -> String {
    text.chars().map(|c| if c.is_control() { ' ' } else { c }).collect()
}

/// Quote text as an MQL string literal.
fn mql_string(text: &str) -> String {
    let mut s = String::with_capacity(text.len() + 2);
    s.push('"');
    for c in text.chars() {
        match c {
            '\\' => s.push_str("\\\\"),
            '"' => s.push_str("\\\""),
            '\n' => s.push_str("\\n"),
            '\r' => s.push_str("\\r"),
            '\t' => s.push_str("\\t"),
            _ => s.push(c),
        }
    }
    s.push('"');
    s
}

fn input_line(out: &mut String, declaration: String, comment: &str) {
    writeln!(out, "{:<40}// {}", declaration, comment).ok();
}

fn separator(out: &mut String) {
    writeln!(out, "//+------------------------------------------------------------------+").ok();
}

// ══════════════════════════════════════════════════════════════
// MQL4 Generation
// ══════════════════════════════════════════════════════════════

fn mql4_header(out: &mut String, filename: &str, payload: &ConversionPayload) {
    separator(out);
    writeln!(out, "//|                         {}", filename).ok();
    writeln!(out, "//|          Expert Advisor for indicator {}", comment_text(payload.indicator_name.trim())).ok();
    writeln!(out, "//|                    Generated by EA Builder").ok();
    separator(out);
    writeln!(out, "#property copyright \"Generated by EA Builder\"").ok();
    writeln!(out, "#property version   \"1.00\"").ok();
    writeln!(out, "#property strict").ok();
    writeln!(out).ok();
}

fn mql4_risk_inputs(out: &mut String, payload: &ConversionPayload) {
    writeln!(out, "// ═══════════════ RISK PARAMETERS ═══════════════").ok();
    input_line(out, format!("input double Lots = {};", mql_double(payload.lots)), "Lot size");
    input_line(out, format!("input int    Slippage = {};", payload.slippage), "Max slippage (points)");
    input_line(out, format!("input int    StopLoss = {};", payload.stop_loss), "Stop loss (points, 0 = disabled)");
    input_line(out, format!("input int    TakeProfit = {};", payload.take_profit), "Take profit (points, 0 = disabled)");
    input_line(out, format!("input int    MagicNumber = {};", payload.magic_number), "Magic number");
    input_line(out, "input bool   CloseOppositeSignal = true;".to_string(), "Close opposite positions on a new signal");
    input_line(
        out,
        format!("input string IndicatorName = {};", mql_string(payload.indicator_name.trim())),
        "Indicator file name (no extension)",
    );
    writeln!(out).ok();
}

fn mql4_logic_inputs(out: &mut String, inputs: &str) {
    if inputs.is_empty() {
        return;
    }
    writeln!(out, "// ═══════════════ STRATEGY PARAMETERS ═══════════════").ok();
    out.push_str(inputs);
    writeln!(out).ok();
}

fn mql4_indicator_inputs(out: &mut String, params: &[&IndicatorParameter], declared: &HashMap<String, String>) {
    writeln!(out, "// ═══════════════ INDICATOR PARAMETERS ═══════════════").ok();
    if params.is_empty() {
        writeln!(out, "// No input/extern parameters were detected in the indicator").ok();
    }
    for p in params {
        let type_name = declared
            .get(&p.name)
            .map(String::as_str)
            .unwrap_or_else(|| infer_declaration_type(&p.default_value));
        writeln!(out, "input {} {} = {};", type_name, p.name, p.default_value).ok();
    }
    writeln!(out).ok();
}

fn mql4_indicator_reader(out: &mut String, payload: &ConversionPayload, params: &[&IndicatorParameter]) {
    let timeframe = match payload.timeframe_expression.trim() {
        "" => "0",
        tf => tf,
    };

    let mut args = vec!["_Symbol".to_string(), timeframe.to_string(), "IndicatorName".to_string()];
    args.extend(params.iter().map(|p| p.name.clone()));
    args.push("bufferIndex".into());
    args.push("barShift".into());

    separator(out);
    writeln!(out, "//| Read one value of buffer `bufferIndex` at bar `barShift`").ok();
    separator(out);
    writeln!(out, "double GetIndicatorValue(int bufferIndex, int barShift)").ok();
    writeln!(out, "{{").ok();
    writeln!(out, "   return iCustom({});", args.join(", ")).ok();
    writeln!(out, "}}").ok();
    writeln!(out).ok();
}

fn mql4_has_open_position(out: &mut String) {
    separator(out);
    writeln!(out, "//| direction: 1 = buy, -1 = sell").ok();
    separator(out);
    writeln!(out, "bool HasOpenPosition(int direction)").ok();
    writeln!(out, "{{").ok();
    writeln!(out, "   int orderType = direction > 0 ? OP_BUY : OP_SELL;").ok();
    writeln!(out, "   for(int i = OrdersTotal() - 1; i >= 0; i--)").ok();
    writeln!(out, "   {{").ok();
    writeln!(out, "      if(!OrderSelect(i, SELECT_BY_POS, MODE_TRADES)) continue;").ok();
    writeln!(out, "      if(OrderSymbol() != _Symbol || OrderMagicNumber() != MagicNumber) continue;").ok();
    writeln!(out, "      if(OrderType() == orderType) return true;").ok();
    writeln!(out, "   }}").ok();
    writeln!(out, "   return false;").ok();
    writeln!(out, "}}").ok();
    writeln!(out).ok();
}

fn mql4_open_order(out: &mut String) {
    separator(out);
    writeln!(out, "bool OpenOrder(int orderType)").ok();
    writeln!(out, "{{").ok();
    writeln!(out, "   RefreshRates();").ok();
    writeln!(out, "   double price = orderType == OP_BUY ? Ask : Bid;").ok();
    writeln!(out, "   double sl = 0;").ok();
    writeln!(out, "   double tp = 0;").ok();
    writeln!(out, "   if(StopLoss > 0)").ok();
    writeln!(out, "      sl = orderType == OP_BUY ? price - StopLoss * _Point : price + StopLoss * _Point;").ok();
    writeln!(out, "   if(TakeProfit > 0)").ok();
    writeln!(out, "      tp = orderType == OP_BUY ? price + TakeProfit * _Point : price - TakeProfit * _Point;").ok();
    writeln!(out).ok();
    writeln!(out, "   int ticket = OrderSend(_Symbol, orderType, Lots, NormalizeDouble(price, _Digits), Slippage,").ok();
    writeln!(out, "                          NormalizeDouble(sl, _Digits), NormalizeDouble(tp, _Digits),").ok();
    writeln!(out, "                          IndicatorName + \" EA\", MagicNumber, 0, orderType == OP_BUY ? clrBlue : clrRed);").ok();
    writeln!(out, "   if(ticket < 0)").ok();
    writeln!(out, "   {{").ok();
    writeln!(out, "      Print(\"OrderSend failed: \", GetLastError());").ok();
    writeln!(out, "      return false;").ok();
    writeln!(out, "   }}").ok();
    writeln!(out, "   return true;").ok();
    writeln!(out, "}}").ok();
    writeln!(out).ok();
}

fn mql4_close_positions(out: &mut String) {
    separator(out);
    writeln!(out, "void ClosePositions(int direction)").ok();
    writeln!(out, "{{").ok();
    writeln!(out, "   int orderType = direction > 0 ? OP_BUY : OP_SELL;").ok();
    writeln!(out, "   for(int i = OrdersTotal() - 1; i >= 0; i--)").ok();
    writeln!(out, "   {{").ok();
    writeln!(out, "      if(!OrderSelect(i, SELECT_BY_POS, MODE_TRADES)) continue;").ok();
    writeln!(out, "      if(OrderSymbol() != _Symbol || OrderMagicNumber() != MagicNumber) continue;").ok();
    writeln!(out, "      if(OrderType() != orderType) continue;").ok();
    writeln!(out, "      RefreshRates();").ok();
    writeln!(out, "      double price = orderType == OP_BUY ? Bid : Ask;").ok();
    writeln!(out, "      if(!OrderClose(OrderTicket(), OrderLots(), NormalizeDouble(price, _Digits), Slippage, clrYellow))").ok();
    writeln!(out, "         Print(\"OrderClose failed: \", GetLastError());").ok();
    writeln!(out, "   }}").ok();
    writeln!(out, "}}").ok();
    writeln!(out).ok();
}

fn mql4_on_init(out: &mut String) {
    separator(out);
    writeln!(out, "int OnInit()").ok();
    writeln!(out, "{{").ok();
    writeln!(out, "   if(Lots <= 0)").ok();
    writeln!(out, "   {{").ok();
    writeln!(out, "      Print(\"Lots must be positive\");").ok();
    writeln!(out, "      return(INIT_PARAMETERS_INCORRECT);").ok();
    writeln!(out, "   }}").ok();
    writeln!(out, "   Print(\"EA initialized for indicator \", IndicatorName);").ok();
    writeln!(out, "   return(INIT_SUCCEEDED);").ok();
    writeln!(out, "}}").ok();
    writeln!(out).ok();
}

fn mql4_on_deinit(out: &mut String) {
    separator(out);
    writeln!(out, "void OnDeinit(const int reason)").ok();
    writeln!(out, "{{").ok();
    writeln!(out, "}}").ok();
    writeln!(out).ok();
}

fn mql4_on_tick(out: &mut String, body: &str) {
    separator(out);
    writeln!(out, "void OnTick()").ok();
    writeln!(out, "{{").ok();
    out.push_str(body);
    writeln!(out, "}}").ok();
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

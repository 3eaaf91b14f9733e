use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::config::LogicKind;
use crate::models::parameter::IndicatorParameter;
use crate::models::payload::ConversionPayload;
use crate::utils::codegen::{self, GeneratedSource};
use crate::utils::inputs;

/// Config file flavours accepted for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Toml,
}

impl PayloadFormat {
    /// `.toml` files are TOML, everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => PayloadFormat::Toml,
            _ => PayloadFormat::Json,
        }
    }
}

// ── Generation Commands ──

/// List the tunable inputs declared in an indicator.
pub fn detect_parameters(indicator_code: &str) -> Vec<IndicatorParameter> {
    let params = inputs::extract_parameters(indicator_code);
    info!("Detected {} indicator parameters", params.len());
    params
}

/// Build the Expert Advisor for a payload the caller has already normalized.
pub fn generate_expert_advisor(payload: &ConversionPayload) -> Result<GeneratedSource, AppError> {
    info!(
        "Generating EA: indicator={}, logic={}",
        payload.indicator_name,
        payload.logic_config.kind()
    );

    let params = detect_parameters(&payload.indicator_code);
    for name in codegen::reserved_name_collisions(&params) {
        warn!("Indicator input '{}' clashes with an EA identifier; MetaEditor will reject the duplicate", name);
    }

    let source = codegen::compose_with_parameters(payload, &params)?;
    info!("Generated {} ({} bytes)", source.filename, source.code.len());
    Ok(source)
}

// ── Payload Commands ──

/// Parse a payload. The logic tag is checked first so an unknown kind is
/// reported as such instead of as a generic shape error.
pub fn parse_payload(text: &str, format: PayloadFormat) -> Result<ConversionPayload, AppError> {
    let value: Value = match format {
        PayloadFormat::Json => serde_json::from_str(text)?,
        PayloadFormat::Toml => {
            let table: toml::Value = toml::from_str(text)?;
            serde_json::to_value(table)?
        }
    };

    check_logic_kind(&value)?;

    serde_json::from_value(value).map_err(|e| AppError::InvalidConfig(e.to_string()))
}

/// Read and parse a payload file; the format follows the extension.
pub fn load_payload(path: &Path) -> Result<ConversionPayload, AppError> {
    let text = read_text(path)?;
    let payload = parse_payload(&text, PayloadFormat::from_path(path))?;
    info!("Loaded payload from {}", path.display());
    Ok(payload)
}

/// Read a text file, rejecting content that is not UTF-8.
pub fn read_text(path: &Path) -> Result<String, AppError> {
    if !path.exists() {
        return Err(AppError::FileNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    decode_text(bytes, &path.display().to_string())
}

/// Turn raw bytes into text; `origin` names the source in the error.
pub fn decode_text(bytes: Vec<u8>, origin: &str) -> Result<String, AppError> {
    String::from_utf8(bytes).map_err(|e| AppError::InvalidInput(format!("{}: {}", origin, e)))
}

// ── Helpers ──

fn check_logic_kind(value: &Value) -> Result<(), AppError> {
    let logic = value
        .get("logicConfig")
        .ok_or_else(|| AppError::MissingField("logicConfig".into()))?;

    match logic.get("kind") {
        None => Err(AppError::MissingField("logicConfig.kind".into())),
        Some(Value::String(kind)) => kind
            .parse::<LogicKind>()
            .map(|_| ())
            .map_err(|_| AppError::UnknownLogicKind(kind.clone())),
        Some(other) => Err(AppError::InvalidConfig(format!(
            "logicConfig.kind must be a string, got {}",
            other
        ))),
    }
}

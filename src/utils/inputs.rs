use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::parameter::IndicatorParameter;

/// `input|extern <type> <name> = <value>;` at the start of a line segment.
/// String and char initializers may contain `;`.
static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(?:input|extern)\s+([A-Za-z_]\w*)\s+([A-Za-z_]\w*)\s*=\s*((?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^;"'])+?)\s*;"#,
    )
    .expect("Invalid declaration regex")
});

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+|0[xX][0-9a-fA-F]+)$").expect("Invalid integer regex"));

static REAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][+-]?\d+)?$").expect("Invalid real regex")
});

/// Scan indicator source for `input`/`extern` declarations.
///
/// Order of first appearance is kept and the first declaration of a name wins.
/// Commented-out declarations are ignored, declarations spanning several lines
/// are not recognized, and several declarations on one line are all picked up
/// as long as each follows the previous one's `;`. No match is not an error.
pub fn extract_parameters(source: &str) -> Vec<IndicatorParameter> {
    scan_declarations(source).into_iter().map(|d| d.parameter).collect()
}

/// A declaration with the type token it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub type_name: String,
    pub parameter: IndicatorParameter,
}

/// Same scan as [`extract_parameters`], keeping each declared type.
pub(crate) fn scan_declarations(source: &str) -> Vec<Declaration> {
    let cleaned = blank_comments(source);
    let mut seen = HashSet::new();
    let mut declarations = Vec::new();

    for line in cleaned.lines() {
        let mut rest = line;
        while let Some(caps) = DECLARATION.captures(rest) {
            let name = &caps[2];
            let value = caps[3].trim();

            if seen.insert(name.to_string()) {
                declarations.push(Declaration {
                    type_name: caps[1].to_string(),
                    parameter: IndicatorParameter::new(name, value),
                });
            } else {
                debug!("Skipping re-declaration of input '{}' = {}", name, value);
            }

            // Group 0 always exists on a successful capture
            rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
        }
    }

    debug!("Extracted {} indicator parameters", declarations.len());
    declarations
}

/// MQL4 type for a parameter whose declaration is not in the indicator source.
pub fn infer_declaration_type(default_value: &str) -> &'static str {
    let v = default_value.trim();
    if v == "true" || v == "false" {
        "bool"
    } else if v.starts_with('"') {
        "string"
    } else if v.starts_with("C'") || v.starts_with("clr") {
        "color"
    } else if v.starts_with("D'") {
        "datetime"
    } else if v.starts_with('\'') {
        "ushort"
    } else if INTEGER.is_match(v) {
        "int"
    } else if REAL.is_match(v) {
        "double"
    } else {
        // Enum constants (MODE_EMA, PRICE_CLOSE, ...) convert to int
        "int"
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Code,
    DoubleQuoted,
    SingleQuoted,
    LineComment,
    BlockComment,
}

/// Replace comment text with spaces, keeping newlines and string literals intact.
fn blank_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut state = ScanState::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            ScanState::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = ScanState::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = ScanState::BlockComment;
                }
                '"' => {
                    out.push(c);
                    state = ScanState::DoubleQuoted;
                }
                '\'' => {
                    out.push(c);
                    state = ScanState::SingleQuoted;
                }
                _ => out.push(c),
            },
            ScanState::DoubleQuoted | ScanState::SingleQuoted => {
                out.push(c);
                let closing = if state == ScanState::DoubleQuoted { '"' } else { '\'' };
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == closing || c == '\n' {
                    state = ScanState::Code;
                }
            }
            ScanState::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = ScanState::Code;
                } else {
                    out.push(' ');
                }
            }
            ScanState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = ScanState::Code;
                } else if c == '\n' {
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(params: &[IndicatorParameter]) -> Vec<&str> {
        params.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_sample_indicator_inputs() {
        let source = "#property indicator_buffers 2\n\ninput int FastPeriod = 12;\ninput int SlowPeriod = 26;\n\ndouble FastBuffer[];\n";
        let params = extract_parameters(source);
        assert_eq!(
            params,
            vec![
                IndicatorParameter::new("FastPeriod", "12"),
                IndicatorParameter::new("SlowPeriod", "26"),
            ]
        );
    }

    #[test]
    fn test_extern_whitespace_and_trailing_comment() {
        let source = "   extern   double   Deviation   =   2.5  ;   // band width\n\tinput bool UseAlerts=true; /* note */";
        let params = extract_parameters(source);
        assert_eq!(
            params,
            vec![
                IndicatorParameter::new("Deviation", "2.5"),
                IndicatorParameter::new("UseAlerts", "true"),
            ]
        );
    }

    #[test]
    fn test_no_declarations_is_empty() {
        assert!(extract_parameters("").is_empty());
        assert!(extract_parameters("int OnInit() { return(INIT_SUCCEEDED); }").is_empty());
        assert!(extract_parameters("double Level = 5;\nstatic int Count = 0;").is_empty());
    }

    #[test]
    fn test_commented_declarations_ignored() {
        let source = "// input int Hidden = 1;\n/*\ninput int AlsoHidden = 2;\n*/\ninput int Visible = 3;";
        assert_eq!(names(&extract_parameters(source)), vec!["Visible"]);
    }

    #[test]
    fn test_string_default_keeps_semicolon_and_slashes() {
        let source = r#"input string Url = "http://example.com/a;b"; // endpoint"#;
        let params = extract_parameters(source);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].default_value, r#""http://example.com/a;b""#);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let source = "input int Period = 14;\nextern int Period = 21;\ninput int Shift = 0;";
        let params = extract_parameters(source);
        assert_eq!(
            params,
            vec![IndicatorParameter::new("Period", "14"), IndicatorParameter::new("Shift", "0")]
        );
    }

    #[test]
    fn test_multiple_declarations_per_line() {
        let source = "input int A = 1; input int B = 2;extern color C = clrRed;";
        assert_eq!(names(&extract_parameters(source)), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_enum_typed_input() {
        let params = extract_parameters("input ENUM_MA_METHOD Method = MODE_EMA;");
        assert_eq!(params, vec![IndicatorParameter::new("Method", "MODE_EMA")]);
    }

    #[test]
    fn test_multiline_declaration_not_recognized() {
        assert!(extract_parameters("input int Period =\n   14;").is_empty());
    }

    #[test]
    fn test_char_literal_default_keeps_semicolon() {
        let source = "input ushort Sep = ';'; input ushort Quote = '\\''; // split char";
        let params = extract_parameters(source);
        assert_eq!(
            params,
            vec![IndicatorParameter::new("Sep", "';'"), IndicatorParameter::new("Quote", "'\\''")]
        );
    }

    #[test]
    fn test_color_and_datetime_literals() {
        let source = "input color Col = C'128,128,128';\ninput datetime Start = D'2024.01.01 00:00';";
        let params = extract_parameters(source);
        assert_eq!(params[0].default_value, "C'128,128,128'");
        assert_eq!(params[1].default_value, "D'2024.01.01 00:00'");
    }

    #[test]
    fn test_scan_keeps_declared_type() {
        let decls = scan_declarations("input double Deviation = 2;\nextern ENUM_MA_METHOD Method = MODE_EMA;");
        let types: Vec<&str> = decls.iter().map(|d| d.type_name.as_str()).collect();
        assert_eq!(types, vec!["double", "ENUM_MA_METHOD"]);
        assert_eq!(decls[0].parameter, IndicatorParameter::new("Deviation", "2"));
    }

    #[test]
    fn test_infer_declaration_type() {
        assert_eq!(infer_declaration_type("12"), "int");
        assert_eq!(infer_declaration_type("-3"), "int");
        assert_eq!(infer_declaration_type("2.5"), "double");
        assert_eq!(infer_declaration_type("1e-3"), "double");
        assert_eq!(infer_declaration_type("true"), "bool");
        assert_eq!(infer_declaration_type("\"abc\""), "string");
        assert_eq!(infer_declaration_type("clrDodgerBlue"), "color");
        assert_eq!(infer_declaration_type("C'128,128,128'"), "color");
        assert_eq!(infer_declaration_type("D'2024.01.01 00:00'"), "datetime");
        assert_eq!(infer_declaration_type("PRICE_CLOSE"), "int");
        assert_eq!(infer_declaration_type("';'"), "ushort");
    }

    fn ident() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z0-9_]{0,10}"
    }

    fn literal() -> impl Strategy<Value = String> {
        prop_oneof![
            "-?[0-9]{1,6}",
            "[0-9]{1,3}\\.[0-9]{1,4}",
            Just("true".to_string()),
            "\"[a-z ;/]{0,8}\"",
            "MODE_[A-Z]{2,5}",
        ]
    }

    proptest! {
        #[test]
        fn prop_well_formed_declarations_kept_in_order(
            decls in prop::collection::vec((ident(), literal(), any::<bool>()), 0..8)
        ) {
            let mut seen = HashSet::new();
            let decls: Vec<_> = decls.into_iter().filter(|(n, _, _)| seen.insert(n.clone())).collect();

            let source: String = decls
                .iter()
                .map(|(name, value, extern_kw)| {
                    let kw = if *extern_kw { "extern" } else { "input" };
                    format!("{} {} {} =  {} ;\nvoid Noise{}() {{}}\n", kw, infer_declaration_type(value), name, value, name)
                })
                .collect();

            let params = extract_parameters(&source);
            prop_assert_eq!(params.len(), decls.len());
            for (param, (name, value, _)) in params.iter().zip(&decls) {
                prop_assert_eq!(&param.name, name);
                prop_assert_eq!(&param.default_value, value);
            }
        }

        #[test]
        fn prop_text_without_qualifiers_is_empty(body in "[a-z0-9 =;(){}\n]{0,200}") {
            prop_assume!(!body.contains("input") && !body.contains("extern"));
            prop_assert!(extract_parameters(&body).is_empty());
        }
    }
}

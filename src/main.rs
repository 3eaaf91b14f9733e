use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ea_builder_lib::commands;
use ea_builder_lib::errors::{AppError, ErrorResponse};
use ea_builder_lib::models::config::{LogicKind, ThresholdDirection};
use ea_builder_lib::models::payload::*;
use ea_builder_lib::utils::export;

#[derive(Parser)]
#[command(name = "ea-builder")]
#[command(about = "Turn a MetaTrader 4 indicator into an Expert Advisor that trades on its buffers")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Print failures as a JSON {code, message} object on stderr
    #[arg(long, global = true)]
    json_errors: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the input/extern parameters declared in an indicator
    Params {
        /// Indicator source file, or "-" for stdin
        indicator: String,

        /// Print the parameters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate an Expert Advisor for an indicator
    Generate(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Indicator source file, or "-" for stdin
    #[arg(short, long)]
    indicator: Option<String>,

    /// Payload file (.toml or .json); flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file or directory, "-" for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Indicator file name without extension
    #[arg(long)]
    name: Option<String>,

    /// Timeframe expression passed to iCustom (e.g. _Period, PERIOD_H1)
    #[arg(long)]
    timeframe: Option<String>,

    /// Lot size
    #[arg(long)]
    lots: Option<f64>,

    /// Max slippage (points)
    #[arg(long)]
    slippage: Option<u32>,

    /// Stop loss (points, 0 = disabled)
    #[arg(long)]
    stop_loss: Option<u32>,

    /// Take profit (points, 0 = disabled)
    #[arg(long)]
    take_profit: Option<u32>,

    /// Magic number tagging the EA's orders
    #[arg(long, allow_negative_numbers = true)]
    magic: Option<i32>,

    /// Trading logic: crossover, threshold or custom. With --config, the logic
    /// flags below only apply when this is given
    #[arg(long, value_parser = parse_logic_kind)]
    logic: Option<LogicKind>,

    /// Fast buffer index (crossover)
    #[arg(long, default_value = "0")]
    fast_buffer: u32,

    /// Slow buffer index (crossover)
    #[arg(long, default_value = "1")]
    slow_buffer: u32,

    /// Allow stacking several positions in the same direction
    #[arg(long)]
    allow_multiple: bool,

    /// Swap buy and sell signals
    #[arg(long)]
    reverse: bool,

    /// Buffer index (threshold)
    #[arg(long, default_value = "0")]
    buffer: u32,

    /// Upper level (threshold); with neither level given, 70/30 are used
    #[arg(long, allow_negative_numbers = true)]
    upper: Option<f64>,

    /// Lower level (threshold)
    #[arg(long, allow_negative_numbers = true)]
    lower: Option<f64>,

    /// Threshold mode: above, below or band
    #[arg(long, default_value = "band", value_parser = parse_direction)]
    direction: ThresholdDirection,

    /// File holding the MQL4 snippet placed inside OnTick (custom)
    #[arg(long)]
    snippet: Option<PathBuf>,
}

fn parse_logic_kind(s: &str) -> Result<LogicKind, String> {
    s.parse()
}

fn parse_direction(s: &str) -> Result<ThresholdDirection, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    ea_builder_lib::init_tracing(&cli.log_level);

    match run(cli.command) {
        Ok(()) => Ok(()),
        Err(err) if cli.json_errors => {
            let response = match err.downcast_ref::<AppError>() {
                Some(app_err) => ErrorResponse::from(app_err),
                None => ErrorResponse {
                    code: "INTERNAL".into(),
                    message: format!("{:#}", err),
                },
            };
            eprintln!("{}", serde_json::to_string(&response)?);
            std::process::exit(1);
        }
        Err(err) => Err(err),
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Params { indicator, json } => {
            let code = read_source(&indicator)?;
            let params = commands::detect_parameters(&code);
            if json {
                println!("{}", serde_json::to_string_pretty(&params)?);
            } else if params.is_empty() {
                println!("No input or extern parameters were detected.");
            } else {
                for p in &params {
                    println!("{} = {}", p.name, p.default_value);
                }
            }
            Ok(())
        }
        Commands::Generate(args) => generate(args),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let payload = build_payload(&args)?.normalized();
    let source = commands::generate_expert_advisor(&payload)?;

    if args.output == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(source.code.as_bytes())?;
        stdout.flush()?;
    } else {
        let written = export::write_generated_source(&source, Path::new(&args.output))?;
        info!("Wrote {}", written.display());
    }
    Ok(())
}

/// Start from the config file (or the builder defaults) and apply flags on top.
fn build_payload(args: &GenerateArgs) -> Result<ConversionPayload> {
    let mut payload = match &args.config {
        Some(path) => commands::load_payload(path)?,
        None => ConversionPayload {
            indicator_name: DEFAULT_INDICATOR_NAME.into(),
            indicator_code: String::new(),
            timeframe_expression: DEFAULT_TIMEFRAME.into(),
            lots: DEFAULT_LOTS,
            slippage: DEFAULT_SLIPPAGE,
            stop_loss: DEFAULT_STOP_LOSS,
            take_profit: DEFAULT_TAKE_PROFIT,
            magic_number: DEFAULT_MAGIC_NUMBER,
            logic_config: logic_from_flags(args, LogicKind::Crossover)?,
        },
    };

    if let Some(indicator) = &args.indicator {
        payload.indicator_code = read_source(indicator)?;
    }
    if let Some(name) = &args.name {
        payload.indicator_name = name.clone();
    }
    if let Some(tf) = &args.timeframe {
        payload.timeframe_expression = tf.clone();
    }
    if let Some(lots) = args.lots {
        payload.lots = lots;
    }
    if let Some(slippage) = args.slippage {
        payload.slippage = slippage;
    }
    if let Some(sl) = args.stop_loss {
        payload.stop_loss = sl;
    }
    if let Some(tp) = args.take_profit {
        payload.take_profit = tp;
    }
    if let Some(magic) = args.magic {
        payload.magic_number = magic;
    }
    if let Some(kind) = args.logic {
        payload.logic_config = logic_from_flags(args, kind)?;
    }

    Ok(payload)
}

fn logic_from_flags(args: &GenerateArgs, kind: LogicKind) -> Result<LogicConfig> {
    let logic = match kind {
        LogicKind::Crossover => LogicConfig::Crossover(CrossoverConfig {
            fast_buffer: args.fast_buffer,
            slow_buffer: args.slow_buffer,
            allow_multiple_positions: args.allow_multiple,
            reverse_signal: args.reverse,
        }),
        LogicKind::Threshold => {
            let (upper, lower) = match (args.upper, args.lower) {
                (None, None) => (Some(DEFAULT_UPPER_THRESHOLD), Some(DEFAULT_LOWER_THRESHOLD)),
                levels => levels,
            };
            LogicConfig::Threshold(ThresholdConfig {
                buffer: args.buffer,
                upper,
                lower,
                direction: args.direction,
                allow_multiple_positions: args.allow_multiple,
                reverse_signal: args.reverse,
            })
        }
        LogicKind::Custom => {
            let path = args
                .snippet
                .as_ref()
                .ok_or_else(|| AppError::MissingField("--snippet (required for custom logic)".into()))?;
            let snippet = commands::read_text(path)
                .with_context(|| format!("reading snippet {}", path.display()))?;
            LogicConfig::Custom(CustomConfig { snippet })
        }
    };
    Ok(logic)
}

/// Read indicator text from a file, or stdin for "-".
fn read_source(location: &str) -> Result<String> {
    if location == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("reading indicator from stdin")?;
        return Ok(commands::decode_text(bytes, "stdin")?);
    }
    Ok(commands::read_text(Path::new(location))?)
}

use clap::Parser;
use rebar_optimizer::catalog;
use rebar_optimizer::render;
use rebar_optimizer::{Demands, Optimizer, OptimizerConfig, PieceDemand, SolverKind, Stocks};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rebar_optimizer",
    about = "Rebar purchase and cutting plan optimizer"
)]
struct Cli {
    /// JSON file with `demands`, optional `stocks` and optional `kerf`
    #[arg(long)]
    input: Option<std::path::PathBuf>,

    /// Required cuts as DIA:QTYxLENGTH in metres (e.g. #10:16x2.095 #10:12x1.695)
    #[arg(long = "cuts", num_args = 1..)]
    cuts: Vec<String>,

    /// Market lengths per diameter as DIA:L1,L2,... (default: full catalog)
    #[arg(long = "stock", num_args = 1..)]
    stock: Vec<String>,

    /// Blade kerf in metres (default: 0)
    #[arg(long)]
    kerf: Option<f64>,

    /// MIP backend: microlp or cbc
    #[arg(long, default_value = "microlp", value_parser = parse_solver)]
    solver: SolverKind,

    /// Solve diameters in parallel
    #[arg(long)]
    parallel: bool,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,

    /// Show an ASCII layout of each bar
    #[arg(long)]
    layout: bool,

    /// Log solver progress to stderr
    #[arg(long)]
    verbose: bool,
}

#[derive(Deserialize)]
struct InputFile {
    demands: Demands,
    #[serde(default)]
    stocks: Stocks,
    kerf: Option<f64>,
}

fn parse_solver(s: &str) -> Result<SolverKind, String> {
    s.parse()
}

fn parse_length(s: &str, context: &str) -> Result<f64, String> {
    let length = s
        .trim()
        .trim_end_matches('m')
        .parse::<f64>()
        .map_err(|_| format!("invalid length in '{}'", context))?;
    if !length.is_finite() || length <= 0.0 {
        return Err(format!("lengths must be positive in '{}'", context));
    }
    Ok(length)
}

fn parse_cut(s: &str) -> Result<(String, PieceDemand), String> {
    let (diameter, cut) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid cut '{}', expected DIA:QTYxLENGTH", s))?;
    let (qty, length) = cut
        .split_once('x')
        .ok_or_else(|| format!("invalid cut '{}', expected DIA:QTYxLENGTH", s))?;
    let qty = qty
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    if diameter.is_empty() {
        return Err(format!("missing diameter in '{}'", s));
    }
    Ok((diameter.to_string(), PieceDemand::new(qty, parse_length(length, s)?)))
}

fn parse_stock(s: &str) -> Result<(String, Vec<f64>), String> {
    let (diameter, lengths) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid stock '{}', expected DIA:L1,L2,...", s))?;
    let lengths = lengths
        .split(',')
        .map(|l| parse_length(l, s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((diameter.to_string(), lengths))
}

fn read_input(path: &std::path::Path) -> Result<InputFile, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid input '{}': {}", path.display(), e))
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut input = match &cli.input {
        Some(path) => read_input(path).unwrap_or_else(|e| exit_with(e)),
        None => InputFile {
            demands: Demands::new(),
            stocks: Stocks::new(),
            kerf: None,
        },
    };

    for cut in &cli.cuts {
        let (diameter, demand) = parse_cut(cut).unwrap_or_else(|e| exit_with(e));
        input.demands.entry(diameter).or_default().push(demand);
    }
    for stock in &cli.stock {
        let (diameter, lengths) = parse_stock(stock).unwrap_or_else(|e| exit_with(e));
        input.stocks.insert(diameter, lengths);
    }

    if input.demands.is_empty() {
        exit_with("no cuts given, use --cuts or --input");
    }

    let missing: Vec<&str> = input
        .demands
        .keys()
        .filter(|d| !input.stocks.contains_key(*d))
        .map(String::as_str)
        .collect();
    for diameter in &missing {
        if !catalog::is_known_diameter(diameter) {
            tracing::warn!(diameter = *diameter, "unknown bar size, using the full market catalog");
        }
    }
    let defaults = catalog::default_stocks(missing);
    input.stocks.extend(defaults);

    let config = OptimizerConfig {
        kerf_m: cli.kerf.or(input.kerf).unwrap_or(0.0),
        solver: cli.solver,
        parallel: cli.parallel,
    };
    let optimizer = Optimizer::new(config).unwrap_or_else(|e| exit_with(e));
    tracing::debug!(
        solver = %optimizer.config().solver,
        kerf_m = optimizer.config().kerf_m,
        diameters = input.demands.len(),
        "planning"
    );
    let plan = optimizer
        .optimize(&input.demands, &input.stocks)
        .unwrap_or_else(|e| exit_with(e));

    if cli.json {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{}", json),
            Err(e) => exit_with(e),
        }
    } else {
        println!("Purchase list:");
        print!("{}", render::render_purchase_list(&plan.purchase_list));
        println!();
        println!("Cutting plan:");
        print!("{}", render::render_cutting_plan(&plan.cutting_plan, cli.layout));
    }

    let failed = plan.errors().count();
    if failed > 0 {
        exit_with(format!(
            "{} diameter{} could not be planned",
            failed,
            if failed == 1 { "" } else { "s" }
        ));
    }
}

//! gridcalc CLI - evaluate and inspect spreadsheet formulas

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use gridcalc::prelude::*;
use gridcalc::{AstNode, CalculationOptions, ReferenceTarget};
use gridcalc_csv::CsvWriteOptions;
use serde_json::{json, Value as Json};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(author, version, about = "Spreadsheet formula evaluation tool")]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula and print its value
    Eval {
        formula: String,

        /// Cell the formula is evaluated at
        #[arg(short, long, default_value = "A1")]
        cell: String,

        /// CSV file providing the sheet data
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the lexer tree of a formula
    Tokens { formula: String },

    /// Print the parsed formula tree
    Ast {
        formula: String,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Calculate all formulas of a CSV file and write the values
    Calc {
        input: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the built-in functions
    Functions,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Eval { formula, cell, csv } => eval(&formula, &cell, csv.as_deref()),
        Commands::Tokens { formula } => tokens(&formula),
        Commands::Ast { formula, json } => ast(&formula, json),
        Commands::Calc { input, output } => calc(&input, output.as_deref()),
        Commands::Functions => functions(),
    }
}

fn open_calculated(path: &Path) -> Result<Workbook> {
    let mut workbook =
        Workbook::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let stats = workbook
        .calculate_with_options(&CalculationOptions::default())
        .context("Failed to calculate formulas")?;
    if !stats.faults.is_empty() {
        tracing::warn!(faults = stats.faults.len(), "some cells could not be calculated");
    }
    Ok(workbook)
}

fn eval(formula: &str, cell: &str, csv: Option<&Path>) -> Result<()> {
    let address =
        CellAddress::parse(cell).with_context(|| format!("Invalid cell address '{}'", cell))?;
    let workbook = match csv {
        Some(path) => open_calculated(path)?,
        None => Workbook::new(),
    };

    let engine = FormulaEngine::new();
    let value = engine
        .evaluate_formula(formula, &workbook, CellKey::new(0, address.row, address.col))
        .with_context(|| format!("Failed to evaluate '{}'", formula))?;
    println!("{}", value);
    Ok(())
}

fn tokens(formula: &str) -> Result<()> {
    let tree = gridcalc::tokenize(formula)
        .with_context(|| format!("Failed to tokenize '{}'", formula))?;
    print!("{}", tree);
    Ok(())
}

fn ast(formula: &str, as_json: bool) -> Result<()> {
    let engine = FormulaEngine::new();
    let ast = engine
        .parse(formula)
        .with_context(|| format!("Failed to parse '{}'", formula))?;
    if as_json {
        let text =
            serde_json::to_string_pretty(&ast_to_json(&ast)).context("Failed to encode JSON")?;
        println!("{}", text);
    } else {
        println!("{}", ast);
        print_ast(&ast, 0);
    }
    Ok(())
}

fn print_ast(node: &AstNode, depth: usize) {
    let label = match node {
        AstNode::Root(_) => "root".to_string(),
        AstNode::Value(v) => format!("value {}", v),
        AstNode::Reference(r) => format!("reference {}", r),
        AstNode::Name(n) => format!("name {}", n),
        AstNode::Prefix { op, .. } => format!("prefix {}", op),
        AstNode::Suffix { op, .. } => format!("suffix {}", op),
        AstNode::Operator { op, .. } => format!("operator {}", op),
        AstNode::Range { .. } => "range :".to_string(),
        AstNode::Function { name, .. } => format!("function {}", name),
        AstNode::Error { error, source } => format!("error {} ({})", error, source),
    };
    println!("{}{}", "  ".repeat(depth), label);
    for child in node.children() {
        print_ast(child, depth + 1);
    }
}

fn ast_to_json(node: &AstNode) -> Json {
    let children: Vec<Json> = node.children().into_iter().map(ast_to_json).collect();
    match node {
        AstNode::Root(_) => json!({ "kind": "root", "children": children }),
        AstNode::Value(v) => json!({ "kind": "value", "value": v.to_string() }),
        AstNode::Reference(r) => {
            let target = match r.target() {
                ReferenceTarget::Cell(_) => "cell",
                ReferenceTarget::Range(_) => "range",
                ReferenceTarget::Row(_) => "row",
                ReferenceTarget::Column(_) => "column",
                ReferenceTarget::Table { .. } => "table",
            };
            json!({
                "kind": "reference",
                "target": target,
                "sheet": r.sheet(),
                "text": r.to_string(),
            })
        }
        AstNode::Name(n) => json!({ "kind": "name", "name": n }),
        AstNode::Prefix { op, .. } => {
            json!({ "kind": "prefix", "op": op.symbol(), "children": children })
        }
        AstNode::Suffix { op, .. } => {
            json!({ "kind": "suffix", "op": op.symbol(), "children": children })
        }
        AstNode::Operator { op, .. } => {
            json!({ "kind": "operator", "op": op.symbol(), "children": children })
        }
        AstNode::Range { .. } => json!({ "kind": "range", "children": children }),
        AstNode::Function { name, .. } => {
            json!({ "kind": "function", "name": name, "children": children })
        }
        AstNode::Error { error, source } => {
            json!({ "kind": "error", "error": error.to_string(), "source": source })
        }
    }
}

fn calc(input: &Path, output: Option<&Path>) -> Result<()> {
    let workbook = open_calculated(input)?;
    let sheet = workbook
        .worksheet(0)
        .context("Workbook has no sheets")?;

    if let Some(output_path) = output {
        CsvWriter::write_file(sheet, output_path, &CsvWriteOptions::default())
            .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!("Wrote '{}'", output_path.display());
    } else {
        let mut buffer = Vec::new();
        CsvWriter::write(sheet, &mut buffer, &CsvWriteOptions::default())
            .context("Failed to format CSV")?;
        io::stdout()
            .write_all(&buffer)
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn functions() -> Result<()> {
    let engine = FormulaEngine::new();
    let registry = engine.functions();
    let mut stdout = io::stdout().lock();
    for name in registry.names() {
        let Some(def) = registry.get(name) else {
            bail!("Function {} disappeared from the registry", name);
        };
        let max = def
            .max_args
            .map_or_else(|| "...".to_string(), |n| n.to_string());
        writeln!(
            stdout,
            "{}\t{}-{}{}",
            def.name,
            def.min_args,
            max,
            if def.volatile { "\tvolatile" } else { "" }
        )
        .context("Failed to write to stdout")?;
    }
    Ok(())
}

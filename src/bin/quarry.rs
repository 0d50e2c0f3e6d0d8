//! quarry — placeholder expressions from the command line
//!
//! # Usage
//!
//! ```bash
//! # Interpolate into SQL for a dialect
//! quarry sql "[name] = %s and [age] > %i" --arg root --arg 18 --dialect mysql
//!
//! # Show the parsed expression
//! quarry parse "a = 1 or b in %i()" --arg '[1,2,3]'
//!
//! # Evaluate against a JSON record
//! quarry eval "[age] >= 18" --record '{"age": 21}'
//!
//! # Run a selection against a database
//! quarry run users --where "[active] = %b" --arg true --limit 10
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use quarry::config::Config;
use quarry::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Query expressions compiled to SQL or evaluated in memory", long_about = None)]
#[command(after_help = "EXAMPLES:
    quarry sql '[name] = %s' --arg root --dialect sqlserver
    quarry eval '[age] >= 18 and [group] = \"user\"' --record '{\"age\": 30, \"group\": \"user\"}'
    quarry run users --where '[id] = %i' --arg 7 --dry-run")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpolate an expression into SQL text
    Sql {
        format: String,
        /// Positional values; JSON when it parses, text otherwise
        #[arg(short, long = "arg")]
        args: Vec<String>,
        /// Target dialect (postgres, mysql, sqlite, sqlserver)
        #[arg(short, long)]
        dialect: Option<Dialect>,
    },
    /// Parse an expression and print its AST
    Parse {
        format: String,
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },
    /// Evaluate an expression against a JSON record
    Eval {
        format: String,
        #[arg(short, long = "arg")]
        args: Vec<String>,
        /// The record, as a JSON object
        #[arg(short, long, default_value = "{}")]
        record: String,
    },
    /// Compile a selection over a table and execute it
    Run {
        table: String,
        /// Filter expression
        #[arg(short, long = "where")]
        filter: Option<String>,
        #[arg(short, long = "arg")]
        args: Vec<String>,
        /// Order by a field; prefix with '-' for descending
        #[arg(short, long)]
        order: Vec<String>,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print the SQL without connecting
        #[arg(long)]
        dry_run: bool,
        /// Database connection URL
        #[arg(long, env = "QUARRY_DATABASE_URL")]
        database_url: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dispatch(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("QUARRY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "quarry=debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: &Cli) -> Result<()> {
    let config = Config::load().context("loading configuration")?;
    match &cli.command {
        Commands::Sql { format, args, dialect } => {
            let dialect = dialect.unwrap_or_else(|| config.dialect());
            let values = parse_args(args)?;
            let sql = quarry::parser::interpolate(format, &values, dialect.generator().as_ref())?;
            println!("{}", sql.white());
        }
        Commands::Parse { format, args } => {
            let expr = quarry::parse(format, &parse_args(args)?)?;
            println!("{}", serde_json::to_string_pretty(&expr)?);
            let rendered = expr.render(config.dialect().generator().as_ref())?;
            println!("{} {}", "Renders as:".dimmed(), rendered.cyan());
        }
        Commands::Eval { format, args, record } => {
            let expr = quarry::parse(format, &parse_args(args)?)?;
            let json: serde_json::Value = serde_json::from_str(record).context("--record is not JSON")?;
            let Value::Object(record) = Value::from(json) else {
                anyhow::bail!("--record must be a JSON object");
            };
            let value = expr.evaluate(&record)?;
            let shown = value.to_string();
            if value.truthy() {
                println!("{}", shown.green().bold());
            } else {
                println!("{}", shown.red().bold());
            }
        }
        Commands::Run {
            table,
            filter,
            args,
            order,
            limit,
            offset,
            dry_run,
            database_url,
            format,
        } => {
            let url = database_url.clone().or_else(|| config.database.url.clone());
            let dialect = config.dialect();
            let refine = |mut selection: Selection| -> Result<ReadSelection> {
                if let Some(filter) = filter {
                    selection = selection.filter(filter, parse_args(args)?);
                }
                for field in order {
                    selection = match field.strip_prefix('-') {
                        Some(field) => selection.order_by_descending(field),
                        None => selection.order_by(field),
                    };
                }
                if let Some(limit) = limit {
                    selection = selection.limit(*limit);
                }
                Ok(selection.offset(*offset).read())
            };

            let Some(url) = url.filter(|_| !dry_run) else {
                let model = Model::new(table.as_str());
                let selection = refine(Selection::new(SourceRef::new(BackendId::fresh(), model)))?;
                println!("{}", "Generated SQL:".green().bold());
                println!("{}", selection.to_sql_with_dialect(dialect)?.white());
                if !dry_run {
                    println!();
                    println!("{}", "⚠ No database URL. Use --database-url or set QUARRY_DATABASE_URL".yellow());
                }
                return Ok(());
            };

            if cli.verbose {
                println!("{} {}", "Connecting to:".dimmed(), url);
            }
            let driver = match config.database.dialect {
                Some(dialect) => SqlxDriver::connect_with(&url, dialect)?,
                None => SqlxDriver::connect(&url)?,
            };
            let source = SqlDataSource::new(driver, Model::new(table.as_str()))
                .case_insensitive_fields(config.query.case_insensitive_fields);
            let selection = refine(source.selection())?;
            let records = source.fetch(&selection)?;
            format_output(&records, *format);
        }
    }
    Ok(())
}

/// Command-line values: JSON when it parses, text otherwise.
fn parse_args(raw: &[String]) -> Result<Vec<Value>> {
    Ok(raw
        .iter()
        .map(|arg| match serde_json::from_str::<serde_json::Value>(arg) {
            Ok(json) => Value::from(json),
            Err(_) => Value::from(arg.as_str()),
        })
        .collect())
}

fn format_output(records: &[Record], format: OutputFormat) {
    if records.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = records.iter().map(|r| Value::Object(r.clone()).to_json()).collect();
            println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = records[0].keys().collect();

            let mut widths: BTreeMap<&String, usize> = columns.iter().map(|c| (*c, c.len())).collect();
            for record in records {
                for (column, value) in record {
                    let len = value.to_string().chars().count();
                    if let Some(w) = widths.get_mut(column) {
                        *w = (*w).max(len);
                    }
                }
            }

            let header: Vec<String> = columns
                .iter()
                .map(|c| format!("{:width$}", c, width = widths[*c]))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for record in records {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let value = record.get(*c).map(Value::to_string).unwrap_or_default();
                        format!("{:width$}", value, width = widths[*c])
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", records.len().to_string().cyan());
        }
    }
}

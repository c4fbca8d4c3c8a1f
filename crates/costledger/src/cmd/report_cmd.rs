//! costledger-report - Inventory cost reports from an event file.
//!
//! # Usage
//!
//! ```bash
//! costledger-report events.jsonl valuation --as-of 2024-06-30
//! costledger-report events.jsonl aging --periods 30,60,90,180
//! costledger-report events.jsonl variance WIDGET --start 2024-01-01 --end 2024-06-30
//! costledger-report events.jsonl summary WIDGET --history
//! costledger-report events.jsonl cogs --start 2024-01-01 --end 2024-03-31
//! ```
//!
//! # Reports
//!
//! - `valuation` - On-hand quantity and value per product and warehouse
//! - `aging` - Remaining value by layer age
//! - `variance` - Unit cost statistics over a date range
//! - `summary` - Cost position of one product, optionally with layer history
//! - `cogs` - Cost of sales per product over a date range

use crate::replay::Replay;
use anyhow::Result;
use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use costledger_core::{ProductId, WarehouseId};
use costledger_loader::Options;
use costledger_report::{
    aging_report, cogs_analysis, cost_variance, layer_history, product_cost_summary,
    valuate_inventory, AgingBuckets, AgingReport, CogsAnalysis, LayerHistoryEntry,
    ProductCostSummary, ValuationReport, VarianceReport,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    #[default]
    Text,
    /// JSON
    Json,
    /// CSV rows of the report's main table
    Csv,
}

/// Generate inventory cost reports.
#[derive(Parser, Debug)]
#[command(name = "costledger-report")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The event file (JSON Lines)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// The report to generate
    #[command(subcommand)]
    report: Report,

    /// Configuration file (`key = value` lines)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format (text, json or csv)
    #[arg(long, short = 'f', value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Report {
    /// Inventory value per product and warehouse
    Valuation {
        /// Valuation date (defaults to the last event date)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Only this warehouse
        #[arg(short, long)]
        warehouse: Option<String>,
    },
    /// Remaining value by age
    Aging {
        /// Report date (defaults to the last event date)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Bucket boundaries in days
        #[arg(long, value_delimiter = ',', default_values_t = [30, 60, 90, 180])]
        periods: Vec<i64>,
        /// Age from which stock counts as slow-moving (defaults to the config)
        #[arg(long)]
        slow_moving_days: Option<i64>,
        /// Only this warehouse
        #[arg(short, long)]
        warehouse: Option<String>,
    },
    /// Unit cost statistics over a date range
    Variance {
        /// Product
        product: String,
        /// Range start (defaults to a year before the end)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Range end (defaults to the last event date)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Only this warehouse
        #[arg(short, long)]
        warehouse: Option<String>,
    },
    /// Cost of sales per product over a date range
    Cogs {
        /// Range start (defaults to a year before the end)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Range end (defaults to the last event date)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Only this product
        #[arg(short, long)]
        product: Option<String>,
    },
    /// Cost position of one product
    Summary {
        /// Product
        product: String,
        /// Only this warehouse
        #[arg(short, long)]
        warehouse: Option<String>,
        /// Include every layer with its consumptions
        #[arg(long)]
        history: bool,
    },
}

/// Main entry point for the report command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    super::init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let (options, replay) = super::load(&args.file, args.config.as_deref(), false)?;
    let mut stdout = io::stdout().lock();

    match &args.report {
        Report::Valuation { as_of, warehouse } => {
            let as_of = as_of.unwrap_or_else(|| replay.default_as_of());
            let warehouse = warehouse.as_deref().map(WarehouseId::from);
            let report = replay
                .store
                .read(|state| valuate_inventory(state, &replay.ctx, as_of, warehouse.as_ref()));
            emit(args.format, &report, &mut stdout, write_valuation, csv_valuation)?;
        }
        Report::Aging {
            as_of,
            periods,
            slow_moving_days,
            warehouse,
        } => {
            let report = aging(
                &replay,
                &options,
                *as_of,
                periods,
                *slow_moving_days,
                warehouse.as_deref(),
            )?;
            emit(args.format, &report, &mut stdout, write_aging, csv_aging)?;
        }
        Report::Variance {
            product,
            start,
            end,
            warehouse,
        } => {
            let (start, end) = date_range(&replay, *start, *end);
            let warehouse = warehouse.as_deref().map(WarehouseId::from);
            let report = replay.store.read(|state| {
                cost_variance(
                    state,
                    &replay.ctx,
                    &ProductId::from(product.as_str()),
                    warehouse.as_ref(),
                    start,
                    end,
                )
            })?;
            emit(args.format, &report, &mut stdout, write_variance, csv_variance)?;
        }
        Report::Cogs {
            start,
            end,
            product,
        } => {
            let (start, end) = date_range(&replay, *start, *end);
            let product = product.as_deref().map(ProductId::from);
            let analysis = replay
                .store
                .read(|state| cogs_analysis(state, &replay.ctx, start, end, product.as_ref()))?;
            emit(args.format, &analysis, &mut stdout, write_cogs, csv_cogs)?;
        }
        Report::Summary {
            product,
            warehouse,
            history,
        } => {
            let product = ProductId::from(product.as_str());
            let warehouse = warehouse.as_deref().map(WarehouseId::from);
            // CSV output is the layer table, so it always needs the history
            let with_history = *history || matches!(args.format, OutputFormat::Csv);
            let summary = replay.store.read(|state| SummaryOutput {
                summary: product_cost_summary(state, &replay.ctx, &product, warehouse.as_ref()),
                history: with_history
                    .then(|| layer_history(state, &replay.ctx, &product, warehouse.as_ref())),
            });
            emit(args.format, &summary, &mut stdout, write_summary, csv_summary)?;
        }
    }
    Ok(())
}

/// Fill in a missing range end with the last event date and a missing
/// start with a year before the end.
fn date_range(
    replay: &Replay,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (NaiveDate, NaiveDate) {
    let end = end.unwrap_or_else(|| replay.default_as_of());
    let start = start.unwrap_or_else(|| {
        end.checked_sub_days(Days::new(365))
            .unwrap_or(NaiveDate::MIN)
    });
    (start, end)
}

fn aging(
    replay: &Replay,
    options: &Options,
    as_of: Option<NaiveDate>,
    periods: &[i64],
    slow_moving_days: Option<i64>,
    warehouse: Option<&str>,
) -> Result<AgingReport> {
    let as_of = as_of.unwrap_or_else(|| replay.default_as_of());
    let buckets = AgingBuckets::from_periods(periods)?;
    let slow_moving_days = slow_moving_days.unwrap_or(options.slow_moving_days);
    let warehouse = warehouse.map(WarehouseId::from);
    Ok(replay.store.read(|state| {
        aging_report(
            state,
            &replay.ctx,
            as_of,
            &buckets,
            slow_moving_days,
            warehouse.as_ref(),
        )
    }))
}

type TextWriter<T, W> = fn(&T, &mut W) -> Result<()>;
type CsvWriter<T, W> = fn(&T, &mut csv::Writer<&mut W>) -> Result<()>;

fn emit<T: Serialize, W: Write>(
    format: OutputFormat,
    report: &T,
    writer: &mut W,
    text: TextWriter<T, W>,
    table: CsvWriter<T, W>,
) -> Result<()> {
    match format {
        OutputFormat::Text => text(report, writer),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, report)?;
            writeln!(writer)?;
            Ok(())
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(writer);
            table(report, &mut wtr)?;
            wtr.flush()?;
            Ok(())
        }
    }
}

// ============================================================================
// Valuation
// ============================================================================

fn write_valuation<W: Write>(report: &ValuationReport, writer: &mut W) -> Result<()> {
    writeln!(writer, "Inventory valuation as of {}", report.as_of)?;
    if let Some(warehouse) = &report.warehouse {
        writeln!(writer, "Warehouse: {warehouse}")?;
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "{:<20} {:<12} {:>12} {:>14} {:>12} {:>6}",
        "Product", "Warehouse", "Quantity", "Value", "Avg Cost", "Layers"
    )?;
    writeln!(writer, "{}", "-".repeat(81))?;
    for line in &report.lines {
        writeln!(
            writer,
            "{:<20} {:<12} {:>12} {:>14} {:>12} {:>6}",
            line.product,
            line.warehouse,
            line.quantity,
            line.value,
            line.average_unit_cost,
            line.layer_count
        )?;
    }
    writeln!(writer, "{}", "-".repeat(81))?;
    writeln!(
        writer,
        "{:<33} {:>12} {:>14} {}",
        "Total", report.total_quantity, report.total_value, report.currency
    )?;
    Ok(())
}

fn csv_valuation<W: Write>(report: &ValuationReport, wtr: &mut csv::Writer<&mut W>) -> Result<()> {
    wtr.write_record([
        "product",
        "warehouse",
        "quantity",
        "value",
        "average_unit_cost",
        "layer_count",
    ])?;
    for line in &report.lines {
        wtr.write_record([
            line.product.to_string(),
            line.warehouse.to_string(),
            line.quantity.to_string(),
            line.value.to_string(),
            line.average_unit_cost.to_string(),
            line.layer_count.to_string(),
        ])?;
    }
    Ok(())
}

// ============================================================================
// Aging
// ============================================================================

fn write_aging<W: Write>(report: &AgingReport, writer: &mut W) -> Result<()> {
    writeln!(writer, "Inventory aging as of {}", report.as_of)?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:<16} {:>12} {:>14} {:>6} {:>9}",
        "Bucket", "Quantity", "Value", "Layers", "Share %"
    )?;
    writeln!(writer, "{}", "-".repeat(61))?;
    for total in &report.buckets {
        writeln!(
            writer,
            "{:<16} {:>12} {:>14} {:>6} {:>9}",
            total.bucket.label, total.quantity, total.value, total.layer_count, total.percentage
        )?;
    }
    writeln!(writer, "{}", "-".repeat(61))?;
    writeln!(
        writer,
        "{:<16} {:>12} {:>14} {}",
        "Total", report.total_quantity, report.total_value, report.currency
    )?;
    writeln!(writer)?;
    if let Some(oldest) = report.oldest_age_days {
        writeln!(writer, "Oldest layer:          {oldest} days")?;
    }
    writeln!(
        writer,
        "Weighted average age:  {} days",
        report.weighted_average_age_days
    )?;
    writeln!(
        writer,
        "Slow-moving (>= {} days): {} {}",
        report.slow_moving_days, report.slow_moving_value, report.currency
    )?;
    Ok(())
}

fn csv_aging<W: Write>(report: &AgingReport, wtr: &mut csv::Writer<&mut W>) -> Result<()> {
    wtr.write_record([
        "layer",
        "product",
        "warehouse",
        "acquisition_date",
        "age_days",
        "quantity_remaining",
        "unit_cost",
        "value",
        "bucket",
    ])?;
    for detail in &report.details {
        wtr.write_record([
            detail.layer.to_string(),
            detail.product.to_string(),
            detail.warehouse.to_string(),
            detail.acquisition_date.to_string(),
            detail.age_days.to_string(),
            detail.quantity_remaining.to_string(),
            detail.unit_cost.to_string(),
            detail.value.to_string(),
            detail.bucket.clone(),
        ])?;
    }
    Ok(())
}

// ============================================================================
// Variance
// ============================================================================

fn write_variance<W: Write>(report: &VarianceReport, writer: &mut W) -> Result<()> {
    writeln!(
        writer,
        "Cost variance for {} from {} to {}",
        report.product, report.start, report.end
    )?;
    writeln!(writer)?;
    let Some(stats) = &report.statistics else {
        writeln!(writer, "No layers acquired in range.")?;
        return Ok(());
    };

    writeln!(writer, "Layers:          {}", stats.layer_count)?;
    writeln!(writer, "Quantity:        {}", stats.total_quantity)?;
    writeln!(writer, "Min unit cost:   {}", stats.min)?;
    writeln!(writer, "Max unit cost:   {}", stats.max)?;
    writeln!(writer, "Mean:            {}", stats.mean)?;
    writeln!(writer, "Weighted mean:   {}", stats.weighted_mean)?;
    writeln!(writer, "Std deviation:   {}", stats.std_dev)?;
    writeln!(writer, "CV %:            {}", stats.coefficient_of_variation)?;
    writeln!(
        writer,
        "Range:           {} ({}%)",
        stats.range, stats.range_percentage
    )?;
    writeln!(writer, "Volatility:      {}", stats.volatility)?;

    if let Some(trend) = &report.trend {
        writeln!(
            writer,
            "Trend:           {:?} {}% ({} -> {})",
            trend.direction, trend.change_percentage, trend.first_unit_cost, trend.last_unit_cost
        )?;
    }

    if !report.volatile_periods.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Volatile periods:")?;
        for period in &report.volatile_periods {
            writeln!(
                writer,
                "  {} -> {}: {} -> {} ({}%)",
                period.from_date,
                period.to_date,
                period.from_unit_cost,
                period.to_unit_cost,
                period.change_percentage
            )?;
        }
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "{:<8} {:>6} {:>12} {:>12}",
        "Month", "Layers", "Quantity", "Avg Cost"
    )?;
    for month in &report.monthly {
        writeln!(
            writer,
            "{:<8} {:>6} {:>12} {:>12}",
            month.month, month.layer_count, month.quantity, month.average_unit_cost
        )?;
    }
    Ok(())
}

fn csv_variance<W: Write>(report: &VarianceReport, wtr: &mut csv::Writer<&mut W>) -> Result<()> {
    wtr.write_record(["month", "layer_count", "quantity", "average_unit_cost"])?;
    for month in &report.monthly {
        wtr.write_record([
            month.month.clone(),
            month.layer_count.to_string(),
            month.quantity.to_string(),
            month.average_unit_cost.to_string(),
        ])?;
    }
    Ok(())
}

// ============================================================================
// COGS
// ============================================================================

fn write_cogs<W: Write>(analysis: &CogsAnalysis, writer: &mut W) -> Result<()> {
    writeln!(
        writer,
        "Cost of goods sold from {} to {} ({})",
        analysis.start, analysis.end, analysis.valuation_policy
    )?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:<20} {:>12} {:>14} {:>12} {:>6}",
        "Product", "Quantity", "COGS", "Avg Cost", "Sales"
    )?;
    writeln!(writer, "{}", "-".repeat(68))?;
    for product in &analysis.products {
        writeln!(
            writer,
            "{:<20} {:>12} {:>14} {:>12} {:>6}",
            product.product,
            product.total_quantity,
            product.total_cogs,
            product.average_unit_cost,
            product.transaction_count
        )?;
    }
    writeln!(writer, "{}", "-".repeat(68))?;
    writeln!(
        writer,
        "{:<20} {:>12} {:>14} {:>12} {:>6}",
        "Total",
        analysis.total_quantity,
        analysis.total_cogs,
        analysis.average_unit_cost,
        analysis.transaction_count
    )?;
    writeln!(writer, "Currency: {}", analysis.currency)?;
    Ok(())
}

fn csv_cogs<W: Write>(analysis: &CogsAnalysis, wtr: &mut csv::Writer<&mut W>) -> Result<()> {
    wtr.write_record([
        "product",
        "total_quantity",
        "total_cogs",
        "average_unit_cost",
        "transaction_count",
    ])?;
    for product in &analysis.products {
        wtr.write_record([
            product.product.to_string(),
            product.total_quantity.to_string(),
            product.total_cogs.to_string(),
            product.average_unit_cost.to_string(),
            product.transaction_count.to_string(),
        ])?;
    }
    Ok(())
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Serialize)]
struct SummaryOutput {
    #[serde(flatten)]
    summary: ProductCostSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<LayerHistoryEntry>>,
}

fn write_summary<W: Write>(output: &SummaryOutput, writer: &mut W) -> Result<()> {
    let s = &output.summary;
    writeln!(writer, "Cost summary for {}", s.product)?;
    if let Some(warehouse) = &s.warehouse {
        writeln!(writer, "Warehouse: {warehouse}")?;
    }
    writeln!(writer)?;
    writeln!(writer, "On hand:                 {}", s.quantity_on_hand)?;
    writeln!(writer, "Value:                   {}", s.value)?;
    writeln!(writer, "Value excl. landed:      {}", s.value_excluding_landed)?;
    writeln!(writer, "Weighted average cost:   {}", s.weighted_average_cost)?;
    writeln!(writer, "Effective average cost:  {}", s.effective_average_cost)?;
    for (label, cost) in [
        ("Latest unit cost:", s.latest_unit_cost),
        ("Oldest unit cost:", s.oldest_unit_cost),
        ("Min unit cost:", s.min_unit_cost),
        ("Max unit cost:", s.max_unit_cost),
    ] {
        if let Some(cost) = cost {
            writeln!(writer, "{label:<24} {cost}")?;
        }
    }
    writeln!(
        writer,
        "Layers:                  {} active, {} consumed, {} total",
        s.active_layers, s.fully_consumed_layers, s.total_layers
    )?;
    writeln!(writer, "Total received:          {}", s.total_received)?;
    writeln!(writer, "Total consumed:          {}", s.total_consumed)?;
    writeln!(writer, "Total landed costs:      {}", s.total_landed_costs)?;

    for entry in output.history.iter().flatten() {
        let layer = &entry.layer;
        writeln!(writer)?;
        writeln!(
            writer,
            "{} {} {} {} {}/{} @ {} landed {}",
            layer.id,
            layer.acquisition_date,
            layer.layer_type,
            layer.warehouse,
            layer.quantity_remaining,
            layer.quantity,
            layer.base_unit_cost,
            layer.allocated_landed_costs
        )?;
        for record in &entry.consumptions {
            writeln!(
                writer,
                "  {} {} {} for {} ({})",
                record.date, record.kind, record.quantity, record.total_cost, record.id
            )?;
        }
    }
    Ok(())
}

fn csv_summary<W: Write>(output: &SummaryOutput, wtr: &mut csv::Writer<&mut W>) -> Result<()> {
    wtr.write_record([
        "layer",
        "warehouse",
        "layer_type",
        "acquisition_date",
        "quantity",
        "quantity_remaining",
        "base_unit_cost",
        "allocated_landed_costs",
        "consumptions",
    ])?;
    for entry in output.history.iter().flatten() {
        let layer = &entry.layer;
        wtr.write_record([
            layer.id.to_string(),
            layer.warehouse.to_string(),
            layer.layer_type.to_string(),
            layer.acquisition_date.to_string(),
            layer.quantity.to_string(),
            layer.quantity_remaining.to_string(),
            layer.base_unit_cost.to_string(),
            layer.allocated_landed_costs.to_string(),
            entry.consumptions.len().to_string(),
        ])?;
    }
    Ok(())
}

//! Kolosal Churn CLI Module
//!
//! Command-line front end for the churn dashboard: list models, score a
//! customer snapshot, inspect a dataset and start the JSON API.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts;
use crate::config::{DashboardConfig, PermutationConfig};
use crate::dashboard::{DashboardReport, DashboardSession, PermutationOutcome, RiskRow, Selection};
use crate::data::DataLoader;
use crate::explainability::{ImportanceRanking, Scoring};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(240, 190, 90) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", warn("!"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-churn")]
#[command(author, version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer churn scoring dashboard", long_about = None)]
pub struct Cli {
    /// Customer snapshot CSV
    #[arg(short, long, global = true)]
    pub data: Option<PathBuf>,

    /// Folder holding *.model artifacts and feature schemas
    #[arg(short, long, global = true)]
    pub models_dir: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the models offered for selection
    Models,

    /// Score the customer snapshot with one model
    Score {
        /// Model name (artifact file stem); defaults to the first visible one
        #[arg(long)]
        model: Option<String>,

        /// Churn probability threshold in [0, 1]
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Compute permutation importance (slow)
        #[arg(long)]
        permutation: bool,

        /// Permutation repeats in [3, 20]
        #[arg(long)]
        repeats: Option<usize>,

        /// Permutation scoring (roc_auc, f1, accuracy)
        #[arg(long)]
        scoring: Option<Scoring>,

        /// Rows shown in the churner and at-risk tables
        #[arg(long, default_value = "10")]
        top: usize,

        /// Write the scored table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a data file overview
    Info,

    /// Start the JSON API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
}

impl Cli {
    /// Build the dashboard configuration: file (or environment defaults),
    /// then global flags
    pub fn dashboard_config(&self) -> anyhow::Result<DashboardConfig> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::from_file(path)?,
            None => DashboardConfig::default(),
        };
        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_models(config: DashboardConfig) -> anyhow::Result<()> {
    section("Models");
    println!("  {:<12} {}", muted("Folder"), config.models_dir.display());
    println!();

    let session = DashboardSession::new(config)?;
    let entries = session.available_models()?;

    println!("  {:<24} {}", muted("Model"), muted("Feature schema"));
    println!("  {}", dim(&"─".repeat(56)));
    for entry in &entries {
        let schema = match artifacts::resolve_schema(&entry.path, &session.config().models_dir) {
            Ok(Some(schema)) => format!("{} ({} features)", schema.source, schema.features.len()),
            Ok(None) => format!("{}", "missing".red()),
            Err(e) => format!("{}", e.to_string().red()),
        };
        println!("  {:<24} {}", entry.name.white(), schema);
    }

    println!();
    step_ok(&format!("{} model(s) available", entries.len()));
    println!();
    Ok(())
}

pub fn cmd_score(
    config: DashboardConfig,
    selection: Selection,
    top: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Score");

    let session = DashboardSession::new(config)?;

    step_run("Scoring customers");
    let start = Instant::now();
    let mut report = session.run(&selection)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_overview(&report);
    print_summary(&report);
    print_distribution(&report);

    section(&format!("Top {} churners", top.min(report.top_churners.len())));
    print_risk_rows(&report.top_churners[..top.min(report.top_churners.len())]);

    section("At risk");
    println!(
        "  {} {} {}",
        report.at_risk.total.to_string().white().bold(),
        muted("customers with probability ≥"),
        format!("{:.2}", report.at_risk.threshold).white()
    );
    println!();
    print_risk_rows(&report.at_risk.rows[..top.min(report.at_risk.rows.len())]);

    section("Built-in importance");
    if report.builtin_importance.is_empty() {
        println!("  {}", muted("not available for this model"));
    } else {
        print_ranking(&report.builtin_importance, top);
    }

    print_permutation(&report.permutation, top);

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        let mut file = std::fs::File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut report.predictions)?;
        step_done(&format!("{} rows", report.predictions.height()));
    }

    println!();
    Ok(())
}

pub fn cmd_info(config: DashboardConfig) -> anyhow::Result<()> {
    section("Data Info");

    let path = &config.data_path;
    let df = DataLoader::new().load_csv(path)?;

    println!("  {:<12} {}", muted("File"), path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(config: DashboardConfig, host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Kolosal Churn".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}/api", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box(&kv("Data   ", &config.data_path.display().to_string()));
    line_box(&kv("Models ", &config.models_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let server = ServerConfig {
        host: host.to_string(),
        port,
        dashboard: config,
    };

    run_server(server).await
}

// ─── Default screen ────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("       {}", "╻┏━  ┏━┓╻  ┏━┓┏━┓┏━┓╻     ┏━╸╻ ╻╻ ╻┏━┓┏┓╻".truecolor(120, 170, 255));
    println!("       {}", "┣┻┓  ┃ ┃┃  ┃ ┃┗━┓┣━┫┃  ╺━╸┃  ┣━┫┃ ┃┣┳┛┃┗┫".truecolor(100, 150, 240));
    println!("       {}", "╹ ╹  ┗━┛┗━╸┗━┛┗━┛╹ ╹┗━╸   ┗━╸╹ ╹┗━┛╹┗╸╹ ╹".truecolor(80, 130, 220));
    println!();
    println!("       {}", dim(&format!("Churn dashboard  ·  v{}  ·  rust", env!("CARGO_PKG_VERSION"))));
    println!();
}

/// Shown when no subcommand is given
pub fn cmd_overview() -> anyhow::Result<()> {
    print_banner();
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("kolosal-churn models", "List available models"),
        ("kolosal-churn score", "Score customers with the first model"),
        ("kolosal-churn score --model LogReg -t 0.4", "Pick a model and threshold"),
        ("kolosal-churn score --permutation", "Add permutation importance"),
        ("kolosal-churn info -d data.csv", "Inspect a dataset"),
        ("kolosal-churn serve -p 3000", "Serve the JSON API"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<44} {}", cmd.white(), muted(desc));
    }

    section("Endpoints");

    let endpoints: &[(&str, &str)] = &[
        ("GET  /api/health", "Health check"),
        ("GET  /api/models", "Visible models"),
        ("POST /api/score", "Run one dashboard pass"),
    ];

    for (route, desc) in endpoints {
        println!("  {:<44} {}", route.truecolor(120, 170, 255), muted(desc));
    }

    println!();
    Ok(())
}

// ─── Report printing ───────────────────────────────────────────────────────────

fn print_overview(report: &DashboardReport) {
    println!();
    println!("  {:<16} {}", muted("Model"), report.model_name.white().bold());
    println!("  {:<16} {} ({})", muted("Kind"), report.model_kind, report.capability);
    println!("  {:<16} {}", muted("Features"), report.schema_source);
    println!("  {:<16} {:.2}", muted("Threshold"), report.threshold);

    let alignment = &report.alignment;
    if !alignment.missing.is_empty() {
        step_warn(&format!(
            "{} feature(s) missing from the data, filled with 0: {}",
            alignment.missing.len(),
            alignment.missing.join(", ")
        ));
    }
    if alignment.coerced_cells > 0 {
        step_warn(&format!("{} null or non-numeric cell(s) filled with 0", alignment.coerced_cells));
    }
}

fn print_summary(report: &DashboardReport) {
    let s = &report.summary;
    section("Summary");
    println!("  {:<24} {}", muted("Total customers"), s.total_customers.to_string().white().bold());
    println!("  {:<24} {}", muted("Predicted churn rate"), format!("{:.2}%", s.churn_rate * 100.0).white().bold());
    println!("  {:<24} {}", muted("Predicted churners"), s.predicted_churners.to_string().white().bold());
    println!("  {:<24} {}", muted("Avg churn probability"), format!("{:.3}", s.average_probability).white().bold());
}

fn print_distribution(report: &DashboardReport) {
    const BAR: usize = 30;
    const GROUP: usize = 4;

    section("Probability distribution");
    let h = &report.distribution;
    // Fold adjacent bins so the terminal view stays short
    let grouped: Vec<(f64, usize)> = h
        .edges
        .chunks(GROUP)
        .zip(h.counts.chunks(GROUP))
        .map(|(edges, counts)| (edges[0], counts.iter().sum()))
        .collect();
    let max = grouped.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1);
    let width = GROUP as f64 / h.edges.len().max(1) as f64;

    for (lower, count) in grouped {
        let len = count * BAR / max;
        println!(
            "  {} {}{} {}",
            muted(&format!("{:.2}-{:.2}", lower, lower + width)),
            accent(&"█".repeat(len)),
            " ".repeat(BAR - len),
            dim(&count.to_string())
        );
    }
}

fn print_risk_rows(rows: &[RiskRow]) {
    if rows.is_empty() {
        println!("  {}", muted("none"));
        return;
    }

    let attrs: Vec<&String> = rows[0].attributes.keys().collect();
    let mut header = format!("  {:<14} {:>11} {:>6}", "Customer", "Probability", "Churn");
    for a in &attrs {
        header.push_str(&format!(" {:>10}", a));
    }
    println!("{}", muted(&header));
    println!("  {}", dim(&"─".repeat(34 + 11 * attrs.len())));

    for row in rows {
        let id = row.customer_id.clone().unwrap_or_else(|| format!("#{}", row.row));
        let mut line = format!(
            "  {:<14} {:>11.4} {:>6}",
            id, row.churn_probability, row.predicted_churn
        );
        for a in &attrs {
            match row.attributes.get(*a).copied().flatten() {
                Some(v) => line.push_str(&format!(" {:>10.2}", v)),
                None => line.push_str(&format!(" {:>10}", "-")),
            }
        }
        println!("{}", line);
    }
}

fn print_ranking(ranking: &ImportanceRanking, top: usize) {
    let shown = ranking.top(top);
    let max = shown
        .iter()
        .map(|e| e.importance.abs())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);

    for entry in shown {
        let len = ((entry.importance.abs() / max) * 24.0).round() as usize;
        println!(
            "  {:<24} {:>10.4} {}",
            entry.feature,
            entry.importance,
            accent(&"▪".repeat(len))
        );
    }
}

fn print_permutation(outcome: &PermutationOutcome, top: usize) {
    match outcome {
        PermutationOutcome::Disabled => {}
        PermutationOutcome::Unavailable { reason } => {
            section("Permutation importance");
            step_warn(reason);
        }
        PermutationOutcome::Failed { message } => {
            section("Permutation importance");
            println!("  {} {}", "✗".red(), message);
        }
        PermutationOutcome::Computed { scoring, repeats, baseline_score, ranking } => {
            section(&format!("Permutation importance ({}, {} repeats)", scoring, repeats));
            println!("  {:<24} {:>10.4}", muted("Baseline"), baseline_score);
            println!();
            print_ranking(ranking, top);
        }
    }
}

/// Selection for `score` from its flags; permutation settings start from the
/// configured ones
pub fn score_selection(
    config: &DashboardConfig,
    model: Option<String>,
    threshold: Option<f64>,
    permutation: bool,
    repeats: Option<usize>,
    scoring: Option<Scoring>,
) -> Selection {
    let mut perm: PermutationConfig = config.permutation.clone();
    perm.enabled |= permutation;
    if let Some(r) = repeats {
        perm.repeats = r;
    }
    if let Some(s) = scoring {
        perm.scoring = s;
    }

    Selection {
        model,
        threshold,
        permutation: Some(perm),
        ..Selection::default()
    }
}

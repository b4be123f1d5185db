use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use hrvbudget::baseline::{StatusColor, TrendMetric};
use hrvbudget::config::AppConfig;
use hrvbudget::database::Database;
use hrvbudget::error::{ErrorSeverity, HrvBudgetError};
use hrvbudget::import::{read_rr_file, AnalysisStatus, BatchAnalyzer, BatchConfig};
use hrvbudget::logging::init_logging;
use hrvbudget::metrics::{HrvMetrics, HrvMetricsEngine};
use hrvbudget::quality::{QualityGate, QualityReport};
use hrvbudget::readiness::{ActivityRecommendation, PemRiskLevel};
use hrvbudget::service::HrvService;

/// HRV Budget - heart rate variability readiness tracking
///
/// Turns morning RR interval recordings into a personal baseline, a daily
/// energy budget and a PEM (post-exertional malaise) risk estimate.
#[derive(Parser)]
#[command(name = "hrvbudget")]
#[command(version)]
#[command(about = "HRV-based energy budget and PEM risk tracking", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Overrides the database location
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// User id (defaults to settings.default_user)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quality-check and analyze one RR recording without storing it
    Analyze {
        /// Recording file (CSV, text or JSON array, milliseconds)
        file: PathBuf,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Analyze many recordings in parallel
    Batch {
        /// Directory containing recordings
        dir: PathBuf,

        /// Worker threads (default: one per CPU)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Analyze a recording and store it as a reading
    Submit {
        /// Recording file
        file: PathBuf,

        /// Recording time, RFC 3339 (default: now)
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,

        /// Sleep duration in hours
        #[arg(long)]
        sleep_hours: Option<f64>,

        /// Device sleep quality score (0-100)
        #[arg(long)]
        sleep_quality: Option<f64>,

        /// Score the reading immediately against the active baseline
        #[arg(long)]
        score: bool,
    },

    /// Recalculate and activate the personal baseline
    Baseline {
        /// Show the active baseline instead of recalculating
        #[arg(long)]
        show: bool,

        /// Window end, RFC 3339 (default: now)
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },

    /// Compute the energy budget for a stored reading
    Score {
        /// Reading id
        reading_id: String,
    },

    /// Interpret RMSSD and heart rate against the active baseline
    Interpret {
        /// RMSSD in milliseconds
        rmssd: f64,

        /// Mean heart rate in bpm
        mean_hr: f64,
    },

    /// Show short-term trends
    Trend {
        /// Metric trend (rmssd, hr, total_power); omit for readiness trend
        #[arg(short, long)]
        metric: Option<TrendMetric>,

        /// Readiness trend length in days
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// List recent energy budgets or readings
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// List readings instead of energy budgets
        #[arg(long)]
        readings: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,

        /// Print the config file path only
        #[arg(long)]
        path: bool,
    },
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Artifacts %")]
    artifacts: String,
    #[tabled(rename = "RMSSD")]
    rmssd: String,
    #[tabled(rename = "HR")]
    mean_hr: String,
}

#[derive(Tabled)]
struct BudgetRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Budget")]
    energy_budget: String,
    #[tabled(rename = "HRV z")]
    hrv_zscore: String,
    #[tabled(rename = "PEM risk")]
    pem_risk: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Budget")]
    energy_budget: String,
    #[tabled(rename = "HRV score")]
    hrv_score: String,
    #[tabled(rename = "RHR score")]
    rhr_score: String,
    #[tabled(rename = "PEM risk")]
    pem_risk: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Recorded")]
    recorded_at: String,
    #[tabled(rename = "RMSSD")]
    rmssd: String,
    #[tabled(rename = "HR")]
    mean_hr: String,
    #[tabled(rename = "LF/HF")]
    lf_hf: String,
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_quality(report: &QualityReport) {
    let verdict = if report.is_valid {
        "✓ Recording passed quality checks".green()
    } else {
        "✗ Recording failed quality checks".red()
    };
    println!("{}", verdict.bold());
    println!(
        "  {} intervals, {} artifacts ({:.1}%)",
        report.total_intervals, report.artifact_count, report.artifact_percentage
    );
    for issue in &report.issues {
        println!("  {} {}", "•".yellow(), issue);
    }
}

fn print_metrics(metrics: &HrvMetrics) {
    let t = &metrics.time_domain;
    let f = &metrics.frequency_domain;

    print_table(vec![
        MetricRow { name: "Mean RR (ms)", value: format!("{:.1}", t.mean_rri) },
        MetricRow { name: "Mean HR (bpm)", value: format!("{:.1}", t.mean_hr) },
        MetricRow { name: "SDNN (ms)", value: format!("{:.1}", t.sdnn) },
        MetricRow { name: "RMSSD (ms)", value: format!("{:.1}", t.rmssd) },
        MetricRow { name: "pNN50 (%)", value: format!("{:.1}", t.pnn50) },
        MetricRow { name: "VLF (ms²)", value: format!("{:.1}", f.vlf_power) },
        MetricRow { name: "LF (ms²)", value: format!("{:.1}", f.lf_power) },
        MetricRow { name: "HF (ms²)", value: format!("{:.1}", f.hf_power) },
        MetricRow { name: "Total (ms²)", value: format!("{:.1}", f.total_power) },
        MetricRow { name: "LF/HF", value: format!("{:.2}", f.lf_hf_ratio) },
        MetricRow { name: "LF (nu)", value: format!("{:.1}", f.lf_nu) },
        MetricRow { name: "HF (nu)", value: format!("{:.1}", f.hf_nu) },
    ]);
}

fn paint_status(text: &str, color: StatusColor) -> ColoredString {
    match color {
        StatusColor::Green => text.green(),
        StatusColor::Yellow => text.yellow(),
        StatusColor::Orange => text.truecolor(255, 165, 0),
        StatusColor::Red => text.red(),
    }
}

fn paint_risk(risk: PemRiskLevel) -> ColoredString {
    match risk {
        PemRiskLevel::Low => risk.as_str().green(),
        PemRiskLevel::Moderate => risk.as_str().yellow(),
        PemRiskLevel::High => risk.as_str().red().bold(),
    }
}

fn paint_recommendation(recommendation: ActivityRecommendation) -> ColoredString {
    match recommendation {
        ActivityRecommendation::Normal => recommendation.as_str().green(),
        ActivityRecommendation::Light => recommendation.as_str().cyan(),
        ActivityRecommendation::Reduced => recommendation.as_str().yellow(),
        ActivityRecommendation::Rest => recommendation.as_str().red().bold(),
    }
}

fn print_energy_budget(record: &hrvbudget::EnergyBudgetRecord) {
    let b = &record.breakdown;

    println!("{}", format!("Energy budget: {:.0}/100", b.energy_budget).bold());
    print_table(vec![
        MetricRow { name: "HRV score", value: format!("{:.1}", b.hrv_score) },
        MetricRow { name: "Resting HR score", value: format!("{:.1}", b.rhr_score) },
        MetricRow { name: "Sleep score", value: format!("{:.1}", b.sleep_score) },
        MetricRow { name: "Stress score", value: format!("{:.1}", b.stress_score) },
        MetricRow { name: "HRV z-score", value: format!("{:+.2}", b.hrv_zscore) },
        MetricRow { name: "HR z-score", value: fmt_opt(b.rhr_zscore, 2) },
        MetricRow { name: "Low-HRV streak", value: format!("{} days", b.consecutive_low_days) },
    ]);
    println!("  PEM risk:       {}", paint_risk(b.pem_risk_level));
    println!(
        "  Recommendation: {}",
        paint_recommendation(b.activity_recommendation)
    );
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load_or_default(),
    }
}

fn open_service(cli: &Cli, config: &AppConfig) -> Result<HrvService<Database>> {
    let db_path = cli.database.clone().unwrap_or_else(|| config.database_path());
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(HrvService::from_config(db, config)?)
}

fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    let user = cli
        .user
        .clone()
        .unwrap_or_else(|| config.settings.default_user.clone());

    match &cli.command {
        Commands::Analyze { file, json } => {
            let series = read_rr_file(file).map_err(HrvBudgetError::from)?;
            let analyzer = BatchAnalyzer::new(
                QualityGate::with_bounds(config.quality),
                HrvMetricsEngine::with_config(config.spectral.clone()),
            );
            let (report, metrics) = analyzer.analyze_series(&series);

            if *json {
                let output = match &metrics {
                    Ok(m) => serde_json::json!({ "quality": report, "metrics": m }),
                    Err(e) => serde_json::json!({
                        "quality": report,
                        "metrics": null,
                        "error": e.to_string(),
                    }),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_quality(&report);
            }

            let metrics = metrics.map_err(HrvBudgetError::from)?;
            if !*json {
                print_metrics(&metrics);
            }
        }

        Commands::Batch { dir, threads, json } => {
            let analyzer = BatchAnalyzer::with_config(
                QualityGate::with_bounds(config.quality),
                HrvMetricsEngine::with_config(config.spectral.clone()),
                BatchConfig {
                    num_threads: *threads,
                    show_progress: !*json,
                },
            );
            let (results, summary) = analyzer
                .analyze_directory(dir)
                .map_err(HrvBudgetError::from)?;

            if *json {
                let output = serde_json::json!({ "results": results, "summary": summary });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let rows = results
                    .iter()
                    .map(|r| BatchRow {
                        file: r
                            .path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        status: match r.status() {
                            AnalysisStatus::Valid => "valid".green().to_string(),
                            AnalysisStatus::Invalid => "invalid".yellow().to_string(),
                            AnalysisStatus::Failed => "failed".red().to_string(),
                        },
                        artifacts: fmt_opt(r.quality.as_ref().map(|q| q.artifact_percentage), 1),
                        rmssd: fmt_opt(r.metrics.map(|m| m.time_domain.rmssd), 1),
                        mean_hr: fmt_opt(r.metrics.map(|m| m.time_domain.mean_hr), 1),
                    })
                    .collect();
                print_table(rows);
                println!(
                    "{} files: {} valid, {} invalid, {} failed ({:.1} files/s)",
                    summary.total_files,
                    summary.valid.to_string().green(),
                    summary.invalid.to_string().yellow(),
                    summary.failed.to_string().red(),
                    summary.throughput()
                );
            }
        }

        Commands::Submit {
            file,
            at,
            sleep_hours,
            sleep_quality,
            score,
        } => {
            let mut service = open_service(&cli, &config)?;
            let series = read_rr_file(file).map_err(HrvBudgetError::from)?;
            let submission = service.submit_recording(
                &user,
                at.unwrap_or_else(Utc::now),
                &series,
                *sleep_hours,
                *sleep_quality,
            )?;

            print_quality(&submission.quality);
            println!(
                "{} reading {} (RMSSD {} ms, HR {} bpm)",
                "✓ Stored".green().bold(),
                submission.reading.id,
                fmt_opt(submission.reading.rmssd, 1),
                fmt_opt(submission.reading.mean_hr, 1)
            );

            if *score {
                let record = service.score_reading(&user, &submission.reading.id)?;
                print_energy_budget(&record);
            }
        }

        Commands::Baseline { show, at } => {
            let mut service = open_service(&cli, &config)?;
            let baseline = if *show {
                service.active_baseline(&user)?
            } else {
                let baseline = service.recalculate_baseline(&user, at.unwrap_or_else(Utc::now))?;
                println!("{}", "✓ Baseline activated".green().bold());
                baseline
            };

            let s = &baseline.snapshot;
            print_table(vec![
                MetricRow { name: "Id", value: baseline.id.clone() },
                MetricRow {
                    name: "Window",
                    value: format!(
                        "{} to {} ({} days)",
                        s.start_date.format("%Y-%m-%d"),
                        s.end_date.format("%Y-%m-%d"),
                        s.days_count
                    ),
                },
                MetricRow { name: "Readings", value: s.readings_count.to_string() },
                MetricRow { name: "Mean RMSSD (ms)", value: format!("{:.1}", s.mean_rmssd) },
                MetricRow {
                    name: "ln(RMSSD)",
                    value: format!("{:.3} ± {:.3}", s.mean_ln_rmssd, s.sd_ln_rmssd),
                },
                MetricRow {
                    name: "Heart rate (bpm)",
                    value: format!("{} ± {}", fmt_opt(s.mean_hr, 1), fmt_opt(s.sd_hr, 1)),
                },
                MetricRow { name: "Mean HF (ms²)", value: fmt_opt(s.mean_hf_power, 1) },
            ]);
        }

        Commands::Score { reading_id } => {
            let mut service = open_service(&cli, &config)?;
            let record = service.score_reading(&user, reading_id)?;
            print_energy_budget(&record);
        }

        Commands::Interpret { rmssd, mean_hr } => {
            let service = open_service(&cli, &config)?;
            let interpretation = service.interpret(&user, *rmssd, *mean_hr)?;
            let hrv = &interpretation.hrv;

            println!(
                "{} (z = {:+.2})",
                paint_status(hrv.status.label(), hrv.color).bold(),
                hrv.z_score
            );
            println!("  {}", hrv.interpretation);
            if let Some(z) = interpretation.hr_zscore {
                println!("  Heart rate z-score: {:+.2}", z);
            }
            for warning in &interpretation.population.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        Commands::Trend { metric, days } => {
            let service = open_service(&cli, &config)?;
            let now = Utc::now();

            match metric {
                Some(metric) => match service.metric_trend(&user, *metric, now)? {
                    Some(trend) => print_table(vec![
                        MetricRow { name: "Readings", value: trend.readings_count.to_string() },
                        MetricRow { name: "Mean", value: format!("{:.1}", trend.mean) },
                        MetricRow { name: "SD", value: format!("{:.1}", trend.std_dev) },
                        MetricRow {
                            name: "Range",
                            value: format!("{:.1} - {:.1}", trend.min, trend.max),
                        },
                        MetricRow { name: "Direction", value: format!("{:?}", trend.direction) },
                    ]),
                    None => println!(
                        "{}",
                        "Not enough readings in the trend window (need at least 3)".yellow()
                    ),
                },
                None => {
                    let points = service.readiness_trend(&user, *days, now)?;
                    if points.is_empty() {
                        println!("{}", "No energy budgets in this period".yellow());
                    }
                    let rows = points
                        .iter()
                        .map(|p| TrendRow {
                            date: p.date.format("%Y-%m-%d").to_string(),
                            energy_budget: format!("{:.0}", p.energy_budget),
                            hrv_score: format!("{:.0}", p.hrv_score),
                            rhr_score: format!("{:.0}", p.rhr_score),
                            pem_risk: paint_risk(p.pem_risk_level).to_string(),
                            recommendation: paint_recommendation(p.activity_recommendation)
                                .to_string(),
                        })
                        .collect();
                    print_table(rows);
                }
            }
        }

        Commands::History { limit, readings } => {
            let service = open_service(&cli, &config)?;

            if *readings {
                let rows = service
                    .recent_readings(&user, *limit)?
                    .into_iter()
                    .map(|r| ReadingRow {
                        id: r.id,
                        recorded_at: r.recorded_at.format("%Y-%m-%d %H:%M").to_string(),
                        rmssd: fmt_opt(r.rmssd, 1),
                        mean_hr: fmt_opt(r.mean_hr, 1),
                        lf_hf: fmt_opt(r.lf_hf_ratio, 2),
                    })
                    .collect();
                print_table(rows);
            } else {
                let rows = service
                    .recent_energy_budgets(&user, *limit)?
                    .into_iter()
                    .map(|r| BudgetRow {
                        date: r.date.format("%Y-%m-%d").to_string(),
                        energy_budget: format!("{:.0}", r.breakdown.energy_budget),
                        hrv_zscore: format!("{:+.2}", r.breakdown.hrv_zscore),
                        pem_risk: paint_risk(r.breakdown.pem_risk_level).to_string(),
                        recommendation: paint_recommendation(r.breakdown.activity_recommendation)
                            .to_string(),
                    })
                    .collect();
                print_table(rows);
            }
        }

        Commands::Config { init, path } => {
            let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);

            if *path {
                println!("{}", config_path.display());
            } else if *init {
                if config_path.exists() {
                    println!("Config already exists: {}", config_path.display());
                } else {
                    config.save_to_file(&config_path)?;
                    println!("{} {}", "✓ Wrote".green(), config_path.display());
                }
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging(&config.logging.clone().with_verbosity(cli.verbose))?;

    if let Err(error) = run(cli, config) {
        if let Some(err) = error.downcast_ref::<HrvBudgetError>() {
            match err.severity() {
                ErrorSeverity::Critical | ErrorSeverity::Error => {
                    tracing::error!(error = %err, retryable = err.is_retryable(), "Command failed")
                }
                ErrorSeverity::Warning | ErrorSeverity::Info => {
                    tracing::debug!(error = %err, "Command stopped")
                }
            }
            eprintln!("{} {}", "Error:".red().bold(), err.user_message());
            std::process::exit(1);
        }
        return Err(error);
    }

    Ok(())
}

use crate::infra::{
    build_reporting_api, seed_demo_region, InMemoryReportStore, StaticTokenResolver,
};
use chrono::Utc;
use clap::Args;
use sampurasun::config::AppConfig;
use sampurasun::error::AppError;
use sampurasun::telemetry;
use sampurasun::workflows::reporting::{
    CallerIdentity, DashboardSummary, MonthlyVisitors, PeriodFilter, ReportingError,
    StakeholderId, SweepOutcome,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Export window for the CSV portion of the demo (monthly, yearly or all)
    #[arg(long, default_value = "all")]
    pub(crate) export: PeriodFilter,
    /// Override the overdue grace period in days (0 gives the two-state rule)
    #[arg(long)]
    pub(crate) grace_days: Option<i64>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SweepArgs {
    /// Load the sample region before sweeping
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    let store = Arc::new(InMemoryReportStore::default());
    if args.seed_demo {
        seed_demo_region(&store, Utc::now()).map_err(ReportingError::from)?;
    }
    let resolver = StaticTokenResolver::from_config(&config.auth);
    let api = build_reporting_api(&config, Arc::clone(&store), Arc::new(resolver));

    let sweep = Arc::clone(&api.sweep);
    let outcome = tokio::task::spawn_blocking(move || sweep.run_once(Utc::now())).await?;

    render_sweep_outcome(&outcome);
    println!("Notifications stored: {}", store.notification_count());
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { export, grace_days } = args;

    let mut config = AppConfig::load()?;
    if let Some(grace_days) = grace_days {
        config.compliance.grace_days = grace_days.max(0);
    }

    let now = Utc::now();
    let store = Arc::new(InMemoryReportStore::default());
    seed_demo_region(&store, now).map_err(ReportingError::from)?;
    let resolver = StaticTokenResolver::from_config(&config.auth);
    let api = build_reporting_api(&config, Arc::clone(&store), Arc::new(resolver));
    let caller = CallerIdentity::system();

    println!("Tourism reporting compliance demo");
    println!(
        "Policy: compliant within {} days, overdue for a further {} days",
        api.service.policy().window().num_days(),
        api.service.policy().grace().num_days()
    );

    let summary = api.service.dashboard_summary(&caller, now)?;
    render_dashboard(&summary);

    let trend = api.service.monthly_trend(PeriodFilter::All.scope(now.date_naive()))?;
    render_trend(&trend);

    let artifact = api.service.export(&caller, export, now)?;
    println!("\nExport {} ({} rows)", artifact.filename, artifact.rows);
    print!("{}", artifact.body);

    let outcome = api.sweep.run_once(now);
    render_sweep_outcome(&outcome);

    let inbox_owner = StakeholderId("kawah-putih".to_string());
    let inbox = api.service.notifications(&inbox_owner)?;
    println!("\nInbox for {inbox_owner}");
    for notification in inbox {
        println!(
            "  [{}] {}",
            notification.created_at.format("%Y-%m-%d %H:%M"),
            notification.message
        );
    }

    Ok(())
}

fn render_dashboard(summary: &DashboardSummary) {
    println!("\nDashboard as of {}", summary.generated_at.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "  Visitors: {} total ({} domestic, {} foreign) across {} reports",
        summary.total_visitors,
        summary.breakdown.domestic_visitors,
        summary.breakdown.foreign_visitors,
        summary.breakdown.report_count
    );
    println!("  Average occupancy: {:.2}%", summary.average_occupancy);
    println!(
        "  Status: {} compliant, {} overdue, {} suspended",
        summary.status_counts.compliant,
        summary.status_counts.overdue,
        summary.status_counts.suspended
    );
    for view in &summary.stakeholders {
        let latest = view
            .latest_submission
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  - {:<28} {:<16} {:<12} ({}, last report {})",
            view.name, view.type_label, view.status_label, view.status_colour, latest
        );
    }
}

fn render_trend(trend: &[MonthlyVisitors]) {
    println!("\nMonthly visitors");
    if trend.is_empty() {
        println!("  no reports yet");
        return;
    }
    for month in trend {
        println!(
            "  {}  {:>7} domestic  {:>6} foreign  {:>7} total",
            month.label, month.nusantara, month.mancanegara, month.total
        );
    }
}

fn render_sweep_outcome(outcome: &SweepOutcome) {
    match outcome {
        SweepOutcome::Completed(summary) => {
            println!("\nCompliance sweep for {}", summary.period);
            println!(
                "  Scanned {} stakeholders, {} already reported",
                summary.scanned, summary.already_reported
            );
            if summary.notified.is_empty() {
                println!("  Reminders: none needed");
            } else {
                let names: Vec<String> =
                    summary.notified.iter().map(ToString::to_string).collect();
                println!("  Reminders sent to: {}", names.join(", "));
            }
            if !summary.failed.is_empty() {
                let names: Vec<String> = summary.failed.iter().map(ToString::to_string).collect();
                println!("  Failed: {}", names.join(", "));
            }
        }
        SweepOutcome::Skipped => println!("\nCompliance sweep skipped: another run in progress"),
        SweepOutcome::Unavailable { reason } => println!("\nCompliance sweep aborted: {reason}"),
    }
}

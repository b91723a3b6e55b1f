use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod dashboard;
mod date;
mod error;
mod feeds;
mod fetch;
mod header;
mod models;
mod report;
mod stats;
mod tokenizer;

use dashboard::FeedUrls;
use fetch::FeedClient;
use stats::{CoreSubject, ProgramFilter};

#[derive(Parser)]
#[command(name = "kurikulum-feeds")]
#[command(about = "Curriculum unit dashboard feeds from published spreadsheet exports", long_about = None)]
struct Cli {
    #[command(flatten)]
    feeds: FeedArgs,
    /// Year assumed for dates written without one
    #[arg(long, global = true)]
    year: Option<i32>,
    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FeedArgs {
    #[arg(long, env = "TAKWIM_CSV_URL", global = true)]
    takwim_url: Option<String>,
    #[arg(long, env = "PROGRAMS_CSV_URL", global = true)]
    programs_url: Option<String>,
    #[arg(long, env = "PBD_CSV_URL", global = true)]
    pbd_url: Option<String>,
    #[arg(long, env = "HEADCOUNT_CSV_URL", global = true)]
    headcount_url: Option<String>,
    #[arg(long, env = "TEACHERS_CSV_URL", global = true)]
    teachers_url: Option<String>,
    #[arg(long, env = "FOLDER_IMAGES_CSV_URL", global = true)]
    images_url: Option<String>,
}

impl From<FeedArgs> for FeedUrls {
    fn from(args: FeedArgs) -> Self {
        FeedUrls {
            takwim: args.takwim_url,
            programs: args.programs_url,
            pbd: args.pbd_url,
            headcount: args.headcount_url,
            teachers: args.teachers_url,
            images: args.images_url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List calendar events
    Takwim {
        /// Only events from today on
        #[arg(long)]
        upcoming: bool,
        /// Events in this month of any year
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long)]
        search: Option<String>,
        /// Show the upcoming highlighted dates instead
        #[arg(long)]
        important: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List program activities, newest first
    Programs {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        in_year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Classroom assessment mastery per subject
    Pbd {
        #[arg(long, value_enum)]
        subject: Option<CoreSubject>,
        #[arg(long)]
        class: Option<String>,
    },
    /// Headcount targets against achievement
    Headcount,
    /// Teacher roster
    Teachers {
        #[arg(long)]
        search: Option<String>,
        /// Show counts per position and specialization instead
        #[arg(long)]
        breakdown: bool,
    },
    /// Gallery images, newest first
    Images {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Load every feed and print the headline numbers
    Summary,
    /// Load every feed and write a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn require<'a>(url: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    url.as_deref()
        .with_context(|| format!("{name} must be set (flag or environment variable)"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct PbdView {
    subject: CoreSubject,
    class: Option<String>,
    classes: Vec<String>,
    summary: models::TierSummary,
    years: Vec<models::YearBreakdown>,
    streams: Vec<models::StreamComparison>,
}

#[derive(Serialize)]
struct SummaryView {
    events: models::EventStats,
    next_key_event: Option<models::Countdown>,
    subjects: Vec<(CoreSubject, models::TierSummary)>,
    headcount_rate: f64,
    programs: usize,
    teachers: usize,
    images: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let today = Local::now().date_naive();
    let year = cli.year.unwrap_or_else(|| today.year());
    let urls = FeedUrls::from(cli.feeds);
    let client = FeedClient::new(Duration::from_secs(cli.timeout_secs.max(1)))
        .context("failed to build HTTP client")?;

    match cli.command {
        Commands::Takwim {
            upcoming,
            month,
            search,
            important,
            limit,
        } => {
            let url = require(&urls.takwim, "TAKWIM_CSV_URL")?;
            let events = client.fetch_events(url, year).await;
            let shown: Vec<&models::CalendarEvent> = if important {
                stats::important_dates(&events, today)
            } else {
                stats::filter_events(&events, month, search.as_deref())
                    .into_iter()
                    .filter(|e| !upcoming || e.date >= today)
                    .take(limit)
                    .collect()
            };

            if cli.json {
                return print_json(&shown);
            }
            if let Some(month) = month.filter(|_| !important) {
                println!(
                    "{} events in month {month}",
                    stats::month_count(&events, month)
                );
            }
            if shown.is_empty() {
                println!("No calendar events found.");
                return Ok(());
            }
            for event in shown {
                println!("- {} {} ({})", event.date, event.program, event.unit);
            }
        }
        Commands::Programs {
            search,
            domain,
            in_year,
            month,
            limit,
        } => {
            let url = require(&urls.programs, "PROGRAMS_CSV_URL")?;
            let programs = client.fetch_programs(url, year).await;
            let filter = ProgramFilter {
                search,
                domain,
                year: in_year,
                month,
            };
            let matched = stats::filter_programs(&programs, &filter);
            let shown: Vec<_> = matched.into_iter().take(limit).collect();

            if cli.json {
                return print_json(&shown);
            }
            if shown.is_empty() {
                println!("No program activities found.");
                return Ok(());
            }
            for program in shown {
                println!(
                    "- {} {} [{} / {}] {} images",
                    program.date,
                    program.program,
                    program.domain,
                    program.unit,
                    program.image_urls.len()
                );
            }
        }
        Commands::Pbd { subject, class } => {
            let url = require(&urls.pbd, "PBD_CSV_URL")?;
            let records = client.fetch_assessments(url).await;

            let Some(subject) = subject else {
                let summaries = stats::core_summaries(&records);
                if cli.json {
                    return print_json(&summaries);
                }
                for (subject, summary) in summaries {
                    println!(
                        "- {}: {} students, MTM {:.1}%, TP5-6 {:.1}%",
                        subject.name(),
                        summary.total,
                        summary.mtm_pct,
                        summary.quality_pct
                    );
                }
                return Ok(());
            };

            let view = PbdView {
                subject,
                summary: stats::subject_summary(&records, subject, class.as_deref()),
                class,
                classes: stats::classes(&records),
                years: stats::yearly_breakdown(&records, subject),
                streams: stats::stream_comparison(&records, subject),
            };
            if cli.json {
                return print_json(&view);
            }

            let label = view.class.as_deref().unwrap_or("all classes");
            println!("{} ({label})", subject.name());
            println!("Classes: {}", view.classes.join(", "));
            println!(
                "TP1-6 {:?}, total {}, MTM {:.1}%, TP5-6 {:.1}%",
                view.summary.tiers, view.summary.total, view.summary.mtm_pct, view.summary.quality_pct
            );
            for (year, stream) in view.years.iter().zip(&view.streams) {
                println!(
                    "- {}: {:?} (Bestari {:.1}%, Cemerlang {:.1}%)",
                    year.year, year.tiers, stream.bestari_pct, stream.cemerlang_pct
                );
            }
        }
        Commands::Headcount => {
            let url = require(&urls.headcount, "HEADCOUNT_CSV_URL")?;
            let records = client.fetch_headcount(url).await;

            if cli.json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("No headcount targets found.");
                return Ok(());
            }
            println!(
                "Achievement against target: {:.1}%",
                stats::achievement_rate(&records)
            );
            for record in &records {
                println!(
                    "- {}: TOV {} / ETR {} / AR {}",
                    record.subject, record.baseline, record.target, record.achieved
                );
            }
        }
        Commands::Teachers { search, breakdown } => {
            let url = require(&urls.teachers, "TEACHERS_CSV_URL")?;
            let teachers = client.fetch_teachers(url).await;

            if breakdown {
                let dist = stats::teacher_distribution(&teachers);
                if cli.json {
                    return print_json(&dist);
                }
                println!(
                    "{} teachers, {} specializations",
                    dist.total, dist.specialization_count
                );
                println!("By position:");
                for (position, count) in &dist.positions {
                    println!("- {position}: {count}");
                }
                println!("By specialization:");
                for (specialization, count) in &dist.specializations {
                    println!("- {specialization}: {count}");
                }
                return Ok(());
            }

            let matched = stats::search_teachers(&teachers, search.as_deref().unwrap_or(""));

            if cli.json {
                return print_json(&matched);
            }
            println!("{} of {} teachers", matched.len(), teachers.len());
            for teacher in matched {
                println!(
                    "- {} {} ({}, {})",
                    teacher.name, teacher.grade, teacher.position, teacher.specialization
                );
            }
        }
        Commands::Images { limit } => {
            let url = require(&urls.images, "FOLDER_IMAGES_CSV_URL")?;
            let images = client.fetch_images(url).await;
            let shown: Vec<_> = stats::images_by_recency(&images, year)
                .into_iter()
                .take(limit)
                .collect();

            if cli.json {
                return print_json(&shown);
            }
            if shown.is_empty() {
                println!("No gallery images found.");
                return Ok(());
            }
            for image in shown {
                println!(
                    "- {} {} {}",
                    image.date_str.as_deref().unwrap_or("-"),
                    image.name,
                    image.url
                );
            }
        }
        Commands::Summary => {
            let snapshot = dashboard::load(&client, &urls, year).await;
            let view = SummaryView {
                events: stats::event_stats(&snapshot.events, today),
                next_key_event: stats::next_key_event(&snapshot.events, today),
                subjects: stats::core_summaries(&snapshot.assessments),
                headcount_rate: stats::achievement_rate(&snapshot.headcount),
                programs: snapshot.programs.len(),
                teachers: snapshot.teachers.len(),
                images: snapshot.images.len(),
            };

            if cli.json {
                return print_json(&view);
            }
            println!(
                "Takwim: {} events, {} this month, {} upcoming, {} units",
                view.events.total, view.events.this_month, view.events.upcoming, view.events.units
            );
            if let Some(next) = &view.next_key_event {
                println!("Next: {} in {} days ({})", next.program, next.days_left, next.date);
            }
            for (subject, summary) in &view.subjects {
                println!("PBD {}: MTM {:.1}%", subject.name(), summary.mtm_pct);
            }
            println!("Headcount achievement: {:.1}%", view.headcount_rate);
            println!(
                "{} programs, {} teachers, {} images",
                view.programs, view.teachers, view.images
            );
        }
        Commands::Report { out } => {
            let snapshot = dashboard::load(&client, &urls, year).await;
            let report = report::build_report(&snapshot, today);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

mod apply;
mod catalog;
mod clock;
mod config;
mod db;
mod error;
mod filter;
mod models;
mod similar;
mod store;
mod tui;
mod workflow;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apply::{ApplyInput, NoPrompt, Prompter, TerminalPrompter};
use catalog::Catalog;
use clock::{Clock, SystemClock};
use config::Config;
use db::Database;
use error::BoardError;
use filter::{FilterCriteria, Listing, SalaryRange, SearchOverrides, DEFAULT_SALARY_MAX};
use models::{ApplicationStatus, ExperienceLevel, Job, JobType, Location, WorkType};
use similar::DEFAULT_SIMILAR_LIMIT;
use store::JobStore;
use workflow::{ApplicationWorkflow, FailureInjector};

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Browse job listings, save favourites and apply from the terminal")]
struct Cli {
    /// Path to the local storage database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Alternative job catalog (JSON)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Default)]
struct FilterArgs {
    /// Job type (Internship, Full-time); repeatable
    #[arg(long = "job-type")]
    job_types: Vec<JobType>,

    /// Work type (Remote, Onsite, Hybrid); repeatable
    #[arg(long = "work-type")]
    work_types: Vec<WorkType>,

    /// Exact location, "City, Country"
    #[arg(long)]
    location: Option<Location>,

    /// Experience level (Entry, Junior, Mid, Senior); repeatable
    #[arg(long = "experience")]
    experience_levels: Vec<ExperienceLevel>,

    /// Lowest acceptable salary floor
    #[arg(long, default_value = "0")]
    salary_min: u64,

    /// Highest acceptable salary ceiling
    #[arg(long, default_value_t = DEFAULT_SALARY_MAX)]
    salary_max: u64,

    /// Search title and company
    #[arg(short, long)]
    keyword: Option<String>,

    /// Exact category
    #[arg(short, long)]
    category: Option<String>,

    /// Search box location, "City, Country" or "all"
    #[arg(long)]
    search_location: Option<String>,

    /// Search box job type label, or "all"
    #[arg(long)]
    search_job_type: Option<String>,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            job_types: self.job_types.clone(),
            work_types: self.work_types.clone(),
            location: self.location.clone(),
            salary: SalaryRange {
                min: self.salary_min,
                max: self.salary_max,
            },
            experience_levels: self.experience_levels.clone(),
        }
    }

    fn overrides(&self) -> SearchOverrides {
        SearchOverrides {
            keyword: self.keyword.clone(),
            location: self.search_location.clone(),
            job_type: self.search_job_type.clone(),
            category: self.category.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize local storage
    Init,

    /// List jobs matching the given filters
    List {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page to show (6 jobs per page)
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Show job details and similar jobs
    Show {
        /// Job ID
        id: String,
    },

    /// Save a job, or unsave it if already saved
    Save {
        /// Job ID
        id: String,
    },

    /// List saved jobs
    Saved,

    /// Apply to a job; asks for anything not given as a flag
    Apply {
        /// Job ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Resume file (.pdf, .doc, .docx, at most 5MB)
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Cover letter text (at least 100 characters)
        #[arg(long, conflicts_with = "cover_letter_file")]
        cover_letter: Option<String>,

        /// Read the cover letter from a file
        #[arg(long)]
        cover_letter_file: Option<PathBuf>,
    },

    /// Show applications and saved jobs at a glance
    Dashboard,

    /// Update the status of an application
    Status {
        /// Job ID
        id: String,

        /// New status (Applied, Interview, Rejected)
        status: ApplicationStatus,
    },

    /// List known locations
    Locations,

    /// List categories with open positions
    Categories,

    /// Browse jobs interactively
    Browse {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_catalog(config: &Config) -> Result<Catalog> {
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::bundled()?,
    };
    if catalog.is_empty() {
        warn!("The job catalog is empty");
    }
    Ok(catalog)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if cli.db.is_some() {
        config.db_path = cli.db.clone();
    }
    if cli.catalog.is_some() {
        config.catalog_path = cli.catalog.clone();
    }
    init_logging(&config);

    if let Commands::Init = cli.command {
        let db = Database::open(config.db_path.as_deref())?;
        db.init()?;
        println!("Storage initialized at {}", db.path().display());
        return Ok(());
    }

    let catalog = load_catalog(&config)?;
    let storage = db::open_storage(config.db_path.as_deref());
    let clock = Arc::new(SystemClock);
    let mut store = JobStore::load(catalog, storage, clock.clone());

    match cli.command {
        Commands::Init => {}

        Commands::List { filters, page } => {
            let mut listing = Listing::new();
            listing.set_criteria(filters.criteria());
            listing.set_overrides(filters.overrides());
            listing.load(store.list_jobs(), clock.as_ref(), config.loading_delay).await;
            listing.go_to_page(page);

            let jobs = listing.page_jobs(store.list_jobs());
            if jobs.is_empty() {
                println!("No jobs found. Try adjusting your filters.");
            } else {
                println!("{} jobs found", listing.result_count());
                print_job_table(&store, &jobs);
                println!(
                    "\nPage {} of {}",
                    listing.current_page(),
                    listing.total_pages()
                );
            }
        }

        Commands::Show { id } => {
            clock.sleep(config.loading_delay).await;
            match store.get_job_by_id(&id) {
                Some(job) => {
                    print_job_details(&store, job);
                    let similar = store.similar_jobs(&id, DEFAULT_SIMILAR_LIMIT);
                    if !similar.is_empty() {
                        println!("\n--- Similar Jobs ---");
                        print_job_table(&store, &similar);
                    }
                }
                None => {
                    println!("Job #{} not found.", id);
                }
            }
        }

        Commands::Save { id } => {
            let title = store
                .get_job_by_id(&id)
                .map(|job| job.title.clone())
                .unwrap_or_else(|| format!("job #{}", id));
            if store.toggle_save_job(&id) {
                println!("Saved {}.", title);
            } else {
                println!("Removed {} from saved jobs.", title);
            }
            warn_if_session_only(&store);
        }

        Commands::Saved => {
            let jobs = store.saved_jobs();
            if jobs.is_empty() {
                println!("No saved jobs.");
            } else {
                let noun = if jobs.len() == 1 { "job" } else { "jobs" };
                println!("{} {} saved", jobs.len(), noun);
                print_job_table(&store, &jobs);
            }
            let unlisted = store.saved_ids().len() - jobs.len();
            if unlisted > 0 {
                println!("({} saved job(s) are no longer listed)", unlisted);
            }
        }

        Commands::Apply {
            id,
            name,
            email,
            phone,
            resume,
            cover_letter,
            cover_letter_file,
        } => {
            let cover_letter = match (cover_letter, cover_letter_file) {
                (Some(text), _) => Some(text),
                (None, Some(path)) => Some(std::fs::read_to_string(&path).with_context(|| {
                    format!("Failed to read cover letter file: {}", path.display())
                })?),
                (None, None) => None,
            };

            let mut workflow = match ApplicationWorkflow::begin(&store, &id) {
                Ok(wf) => wf.with_submit_delay(config.submit_delay),
                Err(BoardError::AlreadyApplied(_)) => {
                    println!("You have already applied to this job.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let input = ApplyInput {
                name,
                email,
                phone,
                resume,
                cover_letter,
            };
            let mut prompter: Box<dyn Prompter> = if std::io::stdin().is_terminal() {
                Box::new(TerminalPrompter)
            } else {
                Box::new(NoPrompt)
            };
            let mut failures = FailureInjector::new(config.failure_rate, config.seed);
            apply::run_apply(
                &mut workflow,
                &mut store,
                clock.as_ref(),
                &mut failures,
                input,
                prompter.as_mut(),
            )
            .await?;

            let job = store
                .get_job_by_id(workflow.job_id())
                .ok_or_else(|| anyhow!("Job #{} not found", workflow.job_id()))?;
            println!("Application submitted!");
            println!(
                "Your application for {} at {} has been successfully submitted.",
                job.title, job.company
            );
            warn_if_session_only(&store);
        }

        Commands::Dashboard => {
            let stats = store.stats();
            println!("Applied:       {}", stats.applied);
            println!("Saved:         {}", stats.saved);
            println!("Interviews:    {}", stats.interviews);
            println!("Response rate: {}%", stats.response_rate);

            let applied = store.applied_jobs();
            println!("\n--- Applications ---");
            if store.applications().is_empty() {
                println!("No applications yet.");
            } else {
                println!("{:<6} {:<10} {:<12} {:<30} {:<20}", "ID", "STATUS", "APPLIED", "TITLE", "COMPANY");
                println!("{}", "-".repeat(80));
                for (app, job) in &applied {
                    println!(
                        "{:<6} {:<10} {:<12} {:<30} {:<20}",
                        job.id,
                        app.status,
                        app.applied_date.format("%Y-%m-%d"),
                        truncate(&job.title, 28),
                        truncate(&job.company, 18)
                    );
                }
                let unlisted = store.applications().len() - applied.len();
                if unlisted > 0 {
                    println!("({} application(s) for jobs no longer listed)", unlisted);
                }
            }

            let saved = store.saved_jobs();
            println!("\n--- Saved ---");
            if saved.is_empty() {
                println!("No saved jobs.");
            } else {
                print_job_table(&store, &saved);
            }
        }

        Commands::Status { id, status } => {
            let updated = store.set_application_status(&id, status)?;
            println!("Marked {} application(s) for job #{} as {}.", updated, id, status);
            warn_if_session_only(&store);
        }

        Commands::Locations => {
            for location in store.catalog().cities() {
                println!("{}", location);
            }
        }

        Commands::Categories => {
            println!("{:<20} {:>6}", "CATEGORY", "OPEN");
            println!("{}", "-".repeat(27));
            for category in store.catalog().categories() {
                println!("{:<20} {:>6}", truncate(&category.name, 18), category.count);
            }
        }

        Commands::Browse { filters } => {
            let mut listing = Listing::new();
            listing.set_criteria(filters.criteria());
            listing.set_overrides(filters.overrides());
            listing.refresh(store.list_jobs());
            tui::run_browse(&mut store, listing, config.loading_delay)?;
        }
    }

    Ok(())
}

fn warn_if_session_only(store: &JobStore) {
    if !store.is_persistent() {
        eprintln!("Warning: local storage is unavailable; this change lasts for this session only.");
    }
}

fn print_job_table(store: &JobStore, jobs: &[&Job]) {
    println!(
        "{:<5} {:<2} {:<28} {:<16} {:<20} {:<10} {:>15}",
        "ID", "", "TITLE", "COMPANY", "LOCATION", "TYPE", "SALARY"
    );
    println!("{}", "-".repeat(100));
    for job in jobs {
        let marks = format!(
            "{}{}",
            if store.is_job_saved(&job.id) { "*" } else { " " },
            if store.is_job_applied(&job.id) { "+" } else { " " }
        );
        println!(
            "{:<5} {:<2} {:<28} {:<16} {:<20} {:<10} {:>15}",
            job.id,
            marks,
            truncate(&job.title, 26),
            truncate(&job.company, 14),
            truncate(&job.location.to_string(), 18),
            job.job_type,
            format!("{}k-{}k", job.salary.min / 1000, job.salary.max / 1000)
        );
    }
}

fn print_job_details(store: &JobStore, job: &Job) {
    println!("Job #{}", job.id);
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!("Location: {}", job.location);
    println!("Type: {} / {}", job.job_type, job.work_type);
    println!("Experience: {}", job.experience_level);
    println!("Category: {}", job.category);
    println!(
        "Salary: {} {} - {}",
        job.salary.currency, job.salary.min, job.salary.max
    );
    println!("Posted: {}", job.posted_date.format("%Y-%m-%d"));
    println!("Apply by: {}", job.application_deadline.format("%Y-%m-%d"));
    if store.is_job_applied(&job.id) {
        println!("Status: applied");
    } else if store.is_job_saved(&job.id) {
        println!("Status: saved");
    }

    println!("\n{}", textwrap::fill(&job.description, 80));
    let sections = [
        ("Responsibilities", &job.responsibilities),
        ("Requirements", &job.requirements),
        ("Skills", &job.skills),
        ("Benefits", &job.benefits),
    ];
    for (label, entries) in sections {
        if !entries.is_empty() {
            println!("\n{}:", label);
            for entry in entries {
                println!("  - {}", entry);
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clarity::github::store_token;
use clarity::project::{Enumerated, Motivation, ProjectType, Status, Urgency};
use clarity::query::{self, ListQuery, FIELDS};
use clarity::{Config, ImportPipeline, Project, ProjectRepository, SortKey, SortOrder};

const MAX_DESCRIPTION_LENGTH: usize = 60;

#[derive(Parser)]
#[command(name = "clarity")]
#[command(about = "Track your software projects with GitHub data and your own metadata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync repositories and languages from GitHub
    Sync,

    /// Show all projects
    List {
        /// Filter projects as KEY=VALUE (can be repeated)
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Sort projects by (name, status, urgency, type, motivation, created_at, pushed_at)
        #[arg(short, long)]
        sort: Option<String>,

        /// Order projects (asc, desc)
        #[arg(short, long)]
        order: Option<String>,

        /// Limit output to N projects
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one project
    Show {
        /// Project name
        name: String,
    },

    /// Update a project's metadata
    Update {
        /// Project name
        name: Option<String>,

        /// Apply to every project with unset metadata (only fills unset fields)
        #[arg(long, conflicts_with = "name")]
        all_missing: bool,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        urgency: Option<String>,

        #[arg(long = "type")]
        project_type: Option<String>,

        #[arg(long)]
        motivation: Option<String>,
    },

    /// Show filter options for the list command
    Filters,

    /// Store a GitHub access token in the token file
    Auth {
        /// Personal access token
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    init_logging(cli.verbose, &config)?;
    info!("Starting Clarity v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync => cmd_sync(&config).await,
        Commands::List {
            filters,
            sort,
            order,
            limit,
        } => cmd_list(&config, &filters, sort, order, limit),
        Commands::Show { name } => cmd_show(&config, &name),
        Commands::Update {
            name,
            all_missing,
            status,
            urgency,
            project_type,
            motivation,
        } => {
            let changes = MetadataChanges::parse(status, urgency, project_type, motivation)?;
            cmd_update(&config, name, all_missing, changes)
        }
        Commands::Filters => cmd_filters(),
        Commands::Auth { token } => {
            store_token(&config.token_file(), &token)?;
            println!("Token saved to {}", config.token_file().display());
            Ok(())
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    let default_level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

async fn cmd_sync(config: &Config) -> Result<()> {
    let pipeline =
        ImportPipeline::from_config(config).context("Cannot sync without a GitHub token")?;
    let summary = pipeline.run().await;

    println!("Done.");
    println!("   Repositories: {}", summary.repositories_listed);
    println!("   Written: {}", summary.records_written);
    if !summary.write_failures.is_empty() {
        println!("   Failed: {}", summary.write_failures.join(", "));
    }
    if summary.languages_skipped {
        println!("   Language data was unavailable for this sync");
    }
    Ok(())
}

fn cmd_list(
    config: &Config,
    filters: &[String],
    sort: Option<String>,
    order: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    // Validate everything before touching the stores
    let query = ListQuery {
        criteria: query::parse_criteria(filters)?,
        sort: sort.map(|s| s.parse::<SortKey>()).transpose()?,
        order: order.map(|o| o.parse::<SortOrder>()).transpose()?,
        limit,
    };

    let repository = ProjectRepository::from_config(config);
    let projects = query.apply(repository.load_all()?)?;

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    println!(
        "{:<4} {:<4} {:<4} {:<30} {:<4} {}",
        "stts", "urgc", "mtvn", "name", "type", "description"
    );
    for project in &projects {
        println!(
            "{:<4} {:<4} {:<4} {:<30} {:<4} {}",
            icon(project.metadata.status),
            icon(project.metadata.urgency),
            icon(project.metadata.motivation),
            project.name(),
            icon(project.metadata.project_type),
            short_description(project)
        );
    }
    Ok(())
}

fn cmd_show(config: &Config, name: &str) -> Result<()> {
    let repository = ProjectRepository::from_config(config);
    let Some(project) = repository.find(name)? else {
        bail!("No project named: {}", name);
    };

    println!("----");
    println!("{}", project.name());
    println!("----");
    let languages: Vec<String> = project
        .language_percentages()
        .iter()
        .map(|(language, percent)| format!("{} ({}%)", language, percent))
        .collect();
    println!("{}", languages.join(", "));
    println!("----");
    println!("{:<12} {}", "Created:", days_ago(project.created_days_ago()));
    println!("{:<12} {}", "Last pushed:", days_ago(project.pushed_days_ago()));
    println!("----");
    println!("[{}] Status: {}", icon(project.metadata.status), label(project.metadata.status));
    println!("[{}] Urgency: {}", icon(project.metadata.urgency), label(project.metadata.urgency));
    println!(
        "[{}] Type: {}",
        icon(project.metadata.project_type),
        label(project.metadata.project_type)
    );
    println!(
        "[{}] Motivation: {}",
        icon(project.metadata.motivation),
        label(project.metadata.motivation)
    );
    println!("----");
    if let Some(description) = &project.record.description {
        println!("{}", description);
    }
    Ok(())
}

/// Metadata values given on the command line
struct MetadataChanges {
    status: Option<Status>,
    urgency: Option<Urgency>,
    project_type: Option<ProjectType>,
    motivation: Option<Motivation>,
}

impl MetadataChanges {
    fn parse(
        status: Option<String>,
        urgency: Option<String>,
        project_type: Option<String>,
        motivation: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            status: status.map(|s| s.parse()).transpose()?,
            urgency: urgency.map(|s| s.parse()).transpose()?,
            project_type: project_type.map(|s| s.parse()).transpose()?,
            motivation: motivation.map(|s| s.parse()).transpose()?,
        })
    }

    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.urgency.is_none()
            && self.project_type.is_none()
            && self.motivation.is_none()
    }

    fn apply(&self, project: &mut Project, only_unset: bool) {
        fn set<T: Copy>(field: &mut Option<T>, value: Option<T>, only_unset: bool) {
            if value.is_some() && (!only_unset || field.is_none()) {
                *field = value;
            }
        }

        let metadata = &mut project.metadata;
        set(&mut metadata.status, self.status, only_unset);
        set(&mut metadata.urgency, self.urgency, only_unset);
        set(&mut metadata.project_type, self.project_type, only_unset);
        set(&mut metadata.motivation, self.motivation, only_unset);
    }
}

fn cmd_update(
    config: &Config,
    name: Option<String>,
    all_missing: bool,
    changes: MetadataChanges,
) -> Result<()> {
    let repository = ProjectRepository::from_config(config);

    if all_missing {
        let projects = repository.all_with_no_metadata()?;
        if changes.is_empty() {
            println!("Projects with unset metadata ({}):", projects.len());
            for project in &projects {
                println!("  {}", project.name());
            }
            return Ok(());
        }

        for mut project in projects {
            changes.apply(&mut project, true);
            repository.save(&project)?;
            println!("Saved {}", project.name());
        }
        return Ok(());
    }

    let Some(name) = name else {
        bail!("Please give the name of the project, or use --all-missing");
    };
    if changes.is_empty() {
        bail!("Nothing to update; pass --status, --urgency, --type or --motivation");
    }

    let Some(mut project) = repository.find(&name)? else {
        bail!("No project named: {}", name);
    };

    println!("Updating {}", project.name());
    changes.apply(&mut project, false);
    repository.save(&project)?;
    println!("Saved!");
    Ok(())
}

fn cmd_filters() -> Result<()> {
    println!("Filter usage:");
    println!("> clarity list --filter KEY=VALUE");
    println!();
    println!("{:<13}VALUES", "KEYS");
    for field in FIELDS {
        println!("{:<12} {}", field.name, field.describe());
    }
    println!();
    println!("Filters can be repeated:");
    println!("> clarity list --filter urgency=high --filter type=client");
    Ok(())
}

fn icon<T: Enumerated>(value: Option<T>) -> &'static str {
    value.map(|v| v.icon()).unwrap_or("")
}

fn label<T: Enumerated>(value: Option<T>) -> &'static str {
    value.map(|v| v.as_str()).unwrap_or("-")
}

fn days_ago(days: Option<i64>) -> String {
    days.map(|d| format!("{} days ago", d))
        .unwrap_or_else(|| "unknown".to_string())
}

fn short_description(project: &Project) -> String {
    let description = project.record.description.as_deref().unwrap_or("");
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        let cut: String = description.chars().take(MAX_DESCRIPTION_LENGTH).collect();
        format!("{}...", cut)
    } else {
        description.to_string()
    }
}

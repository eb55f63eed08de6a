use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cadence_core::{HistoryRecord, PlannedTask, PlanningKey, local_today};
use cadence_engine::{
    ChatCapability, DailyTick, GenerativeSelector, HistoryStore, OpenAiClient, Orchestrator,
    PlanStore, SystemClock,
};

mod catalog;
mod config;
mod state;
mod store;

use catalog::FileCatalogProvider;
use store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Adaptive daily task planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config and a starter catalog module
    Init,

    /// Regenerate today's plan, replacing any existing batch
    Plan,

    /// Regenerate one module's plan for today, leaving the rest untouched
    Refresh {
        /// Module id (catalog file stem)
        #[arg(long)]
        module: String,
    },

    /// Print today's plan grouped by catalog group
    Today,

    /// Record a completed task in the history ledger
    Done {
        name: String,

        #[arg(long)]
        group: String,

        /// How hard it felt, 1 (very easy) to 5 (very hard)
        #[arg(long)]
        difficulty: Option<u8>,

        #[arg(long)]
        module: Option<String>,
    },

    /// Record a not-completed attempt with a difficulty rating
    Feedback {
        name: String,

        #[arg(long)]
        group: String,

        #[arg(long)]
        difficulty: u8,

        #[arg(long)]
        module: Option<String>,
    },

    /// Print the recent history ledger
    History {
        /// Trailing window in days
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Ensure today has a plan, then run the daily tick loop
    Run,
}

type CliOrchestrator = Orchestrator<FileCatalogProvider, JsonFileStore, JsonFileStore>;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Init => {
            config::init_config()?;
            let path = catalog::write_example_catalog(&state::catalog_dir()?)?;
            println!("Catalog module ready: {}", path.display());
        }

        Command::Plan => {
            let orch = build_orchestrator()?;
            let tasks = orch.regenerate_daily(Utc::now())?;
            println!("Planned {} tasks for today\n", tasks.len());
            print_tasks(&tasks);
        }

        Command::Refresh { module } => {
            let orch = build_orchestrator()?;
            let tasks = orch.regenerate_module(&module, Utc::now())?;
            println!("Refreshed module {module}: {} tasks\n", tasks.len());
            print_tasks(&tasks);
        }

        Command::Today => {
            show_today()?;
        }

        Command::Done {
            name,
            group,
            difficulty,
            module,
        } => {
            record(&name, &group, true, difficulty, module)?;
            println!("Recorded: {group}: {name} done");
        }

        Command::Feedback {
            name,
            group,
            difficulty,
            module,
        } => {
            record(&name, &group, false, Some(difficulty), module)?;
            println!("Recorded feedback: {group}: {name} (difficulty {difficulty})");
        }

        Command::History { days } => {
            show_history(days)?;
        }

        Command::Run => {
            run_loop().await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_store() -> Result<JsonFileStore> {
    Ok(JsonFileStore::new(state::history_path()?, state::plans_path()?))
}

fn build_orchestrator() -> Result<CliOrchestrator> {
    let cfg = config::load_config()?;
    let store = build_store()?;
    let catalog = FileCatalogProvider::new(state::catalog_dir()?);

    let capability: Option<Arc<dyn ChatCapability>> = cfg.api_key().map(|key| {
        Arc::new(OpenAiClient::new(key, &cfg.llm.model, &cfg.llm.base_url))
            as Arc<dyn ChatCapability>
    });
    if capability.is_none() && cfg.policy.use_generative {
        info!(
            "no API key in ${}; the fallback selector will plan today",
            cfg.llm.api_key_env
        );
    }

    let selector = GenerativeSelector::new(capability, cfg.policy.clone());
    Ok(Orchestrator::new(
        catalog,
        store.clone(),
        store,
        selector,
        cfg.policy,
    ))
}

fn record(
    name: &str,
    group: &str,
    completed: bool,
    difficulty: Option<u8>,
    module: Option<String>,
) -> Result<()> {
    if let Some(d) = difficulty {
        anyhow::ensure!((1..=5).contains(&d), "difficulty must be 1..=5, got {d}");
    }

    let cfg = config::load_config()?;
    let tz = cfg.policy.tz()?;
    let now = Utc::now();

    let mut rec = HistoryRecord::new(local_today(tz, now), now, group, name).completed(completed);
    rec.difficulty = difficulty;
    rec.module_id = module;

    build_store()?.append(rec)?;
    Ok(())
}

fn show_today() -> Result<()> {
    let cfg = config::load_config()?;
    let store = build_store()?;
    let today = local_today(cfg.policy.tz()?, Utc::now());
    let key = PlanningKey::daily(today);

    let tasks = store.tasks_for(&key)?;
    if tasks.is_empty() {
        println!("No plan for {today}. Run: cadence plan");
        return Ok(());
    }

    println!("# Plan for {today}\n");
    print_tasks(&tasks);

    if let Some(summary) = store.summary_for(&key)? {
        if !summary.summary_text.is_empty() {
            println!("\n{}", summary.summary_text);
        }
    }
    Ok(())
}

fn print_tasks(tasks: &[PlannedTask]) {
    let mut grouped: BTreeMap<&str, Vec<&PlannedTask>> = BTreeMap::new();
    for task in tasks {
        grouped.entry(task.group.as_str()).or_default().push(task);
    }

    for (group, tasks) in grouped {
        println!("## {group}");
        for t in tasks {
            let url = t.url.as_deref().map(|u| format!(" <{u}>")).unwrap_or_default();
            println!("- {}{url}", t.name);
            if let Some(reason) = &t.reason {
                println!("    {reason}");
            }
        }
        println!();
    }
}

fn show_history(days: u32) -> Result<()> {
    let cfg = config::load_config()?;
    let store = build_store()?;
    let today = local_today(cfg.policy.tz()?, Utc::now());
    let since = today - Duration::days(i64::from(days));

    let mut records = store.window(since)?;
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if records.is_empty() {
        println!("No history in the last {days} days.");
        return Ok(());
    }

    for r in records {
        let status = if r.completed { "done" } else { "pending" };
        let difficulty = r
            .difficulty
            .map(|d| format!(" d={d}"))
            .unwrap_or_default();
        println!("{} | {}: {} | {status}{difficulty}", r.date, r.group, r.name);
    }
    Ok(())
}

async fn run_loop() -> Result<()> {
    let cfg = config::load_config()?;
    let tz = cfg.policy.tz()?;
    let orch = build_orchestrator()?;

    match orch.ensure_today(Utc::now())? {
        Some(tasks) => info!(count = tasks.len(), "planned today on startup"),
        None => info!("today already has a plan"),
    }

    let tick = DailyTick::new(SystemClock, tz);
    tick.run(|| orch.regenerate_daily(Utc::now()).map(|_| ()))
        .await
        .context("daily tick loop")
}

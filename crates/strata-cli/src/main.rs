//! strata CLI: analyze a catalog, review recommendations, apply them safely.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use strata_core::prelude::{
    AdvisorConfig, ExecState, ExecutionId, ExecutionRecord, ObjectRef, ObjectType, Recommendation,
    RecommendationId, RunId, Scope,
};
use strata_ddl::DdlOptions;
use strata_exec::{Advisor, BatchOptions, ExecuteOptions};
use strata_rules::{parse_strategy_file, RuleError, StrategyBook, StrategyFileConfig};
use strata_store::{HistoryFilter, Ledger, MemoryCatalog, RecommendationFilter, RunStore};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Storage tiering advisor: score objects, recommend encodings, apply them safely", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Catalog snapshot (JSON) the advisor analyzes and modifies
    #[arg(long, global = true, default_value = "catalog.json")]
    catalog: PathBuf,

    /// Journal directory (overrides config)
    #[arg(long, global = true)]
    state_dir: Option<String>,

    /// Strategy file (YAML) with extra strategies and config overrides
    #[arg(long, global = true)]
    strategies: Option<PathBuf>,

    /// Analysis workers (overrides config)
    #[arg(long, global = true)]
    analysis_parallelism: Option<usize>,

    /// Concurrent executions (overrides config)
    #[arg(long, global = true)]
    execution_parallelism: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze objects and record recommendations
    Analyze {
        #[arg(short, long, default_value = "balanced")]
        strategy: String,
        /// Only objects of this owner
        #[arg(long)]
        owner: Option<String>,
        /// Object types to include (repeatable); default all
        #[arg(long = "type")]
        object_types: Vec<ObjectType>,
        /// Skip objects smaller than this (overrides config)
        #[arg(long)]
        min_size: Option<u64>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Show an analysis run (latest when no id is given)
    Status { run: Option<u64> },

    /// List recommendations, largest projected savings first
    Recommendations {
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(long)]
        min_savings_pct: Option<f64>,
        #[arg(long = "type")]
        object_type: Option<ObjectType>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = strata_store::filter::DEFAULT_LIMIT)]
        limit: usize,
        /// Include superseded and non-actionable rows
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },

    /// Show one recommendation in full
    Show { id: u64 },

    /// Print the DDL for a recommendation
    Ddl {
        id: u64,
        #[arg(long)]
        online: bool,
        #[arg(long)]
        parallel: Option<u32>,
    },

    /// Execute one recommendation (dry run unless --apply)
    Execute {
        id: u64,
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        online: bool,
        #[arg(long)]
        parallel: Option<u32>,
        /// Statement timeout in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Execute a strategy's top recommendations, or the listed ids (dry run unless --apply)
    Batch {
        #[arg(short, long, default_value = "balanced")]
        strategy: String,
        /// Recommendation ids to run instead of the strategy queue
        #[arg(long, value_delimiter = ',')]
        ids: Vec<u64>,
        #[arg(long, default_value_t = 10)]
        max_objects: usize,
        #[arg(long)]
        max_total_size: Option<u64>,
        #[arg(long)]
        min_savings_pct: Option<f64>,
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        online: bool,
        #[arg(long)]
        parallel: Option<u32>,
    },

    /// Show one execution record
    Execution { id: u64 },

    /// Execution history, newest first
    History {
        #[arg(long)]
        days: Option<u64>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        status: Option<ExecState>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List registered strategies
    Strategies {
        #[arg(long)]
        json: bool,
    },

    /// Show one strategy in full
    Strategy { name: String },

    /// Compare every strategy's decision for one object
    Compare {
        owner: String,
        name: String,
        #[arg(long = "type", default_value = "table")]
        object_type: ObjectType,
        #[arg(long)]
        partition: Option<String>,
        /// LOB column (for --type lob)
        #[arg(long)]
        column: Option<String>,
    },

    /// Estate totals and projected savings per strategy
    Stats,

    /// Live metrics, recommendations and executions for one object
    Table {
        owner: String,
        name: String,
        #[arg(long = "type", default_value = "table")]
        object_type: ObjectType,
        #[arg(long)]
        partition: Option<String>,
    },

    /// Export recommendations as CSV
    Export {
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct Session {
    advisor: Advisor,
    catalog: MemoryCatalog,
    catalog_path: PathBuf,
}

impl Session {
    /// Persist the catalog after statements changed it.
    fn save_catalog(&self) -> CliResult {
        self.catalog.save(&self.catalog_path)?;
        Ok(())
    }
}

fn open_session(global: &GlobalArgs) -> CliResult<Session> {
    let mut config = AdvisorConfig::from_env();
    let book = StrategyBook::with_builtins();
    let mut file_strategies = Vec::new();
    if let Some(path) = &global.strategies {
        let doc = parse_strategy_file(&fs::read_to_string(path)?)?;
        if let Some(file_cfg) = &doc.config {
            apply_strategy_config(&mut config, file_cfg);
        }
        file_strategies = doc.strategies;
    }
    apply_cli_overrides(&mut config, global);

    let catalog = MemoryCatalog::load(&global.catalog)?;
    let ledger = Ledger::open(&config.state_dir)?;

    for s in file_strategies {
        book.upsert(s)?;
    }
    // strategies used by recorded runs stay frozen across invocations
    let mut used: BTreeMap<String, String> = BTreeMap::new();
    for run in ledger.runs()? {
        used.insert(run.strategy, run.strategy_digest);
    }
    for (name, digest) in &used {
        match book.get(name) {
            Ok(current) if current.digest()?.to_hex() != *digest => {
                return Err(RuleError::Frozen(name.clone()).into());
            }
            Ok(_) => book.mark_referenced(name)?,
            Err(_) => info!(strategy = %name, "recorded run uses a strategy that is not registered"),
        }
    }

    let advisor = Advisor::new(
        config,
        Arc::new(catalog.clone()),
        Arc::new(ledger),
        Arc::new(book),
    )?;
    Ok(Session {
        advisor,
        catalog,
        catalog_path: global.catalog.clone(),
    })
}

fn apply_strategy_config(cfg: &mut AdvisorConfig, doc: &StrategyFileConfig) {
    doc.apply_to(cfg);
}

fn apply_cli_overrides(cfg: &mut AdvisorConfig, global: &GlobalArgs) {
    if let Some(dir) = &global.state_dir {
        cfg.state_dir = dir.clone();
    }
    if let Some(n) = global.analysis_parallelism {
        cfg.analysis_parallelism = n;
    }
    if let Some(n) = global.execution_parallelism {
        cfg.execution_parallelism = n;
    }
}

async fn run(cli: Cli) -> CliResult {
    let session = open_session(&cli.global)?;
    let advisor = &session.advisor;

    match cli.command {
        Commands::Analyze {
            strategy,
            owner,
            object_types,
            min_size,
            prefix,
            parallelism,
        } => {
            let scope = Scope {
                owner,
                object_types,
                min_size_bytes: min_size.unwrap_or(0),
                name_prefix: prefix,
            };
            let summary = advisor.start_analysis(scope, &strategy, parallelism).await?;
            let run = &summary.run;
            if summary.succeeded() {
                println!("✓ Analysis {} completed", run.id.get());
            } else {
                println!("✗ Analysis {} failed: {}", run.id.get(), run.error.as_deref().unwrap_or("unknown"));
            }
            println!("  Strategy: {} ({})", run.strategy, short_digest(&run.strategy_digest));
            println!("  Objects analyzed: {}", run.objects_analyzed);
            println!("  Objects failed: {}", run.objects_failed);
            println!("  Recommendations: {} ({} actionable)", summary.recommendations, summary.actionable);
            println!("  Projected savings: {}", human(summary.projected_savings_bytes));
        }

        Commands::Status { run } => {
            let found = match run {
                Some(id) => Some(advisor.analysis_status(RunId::new(id))?),
                None => advisor.latest_run()?,
            };
            match found {
                Some(r) => println!("{}", serde_json::to_string_pretty(&r)?),
                None => println!("No analysis runs recorded"),
            }
        }

        Commands::Recommendations {
            strategy,
            min_savings_pct,
            object_type,
            owner,
            limit,
            all,
            json,
        } => {
            let base = if all {
                RecommendationFilter::all()
            } else {
                RecommendationFilter::default()
            };
            let filter = RecommendationFilter {
                strategy,
                min_savings_pct,
                object_type,
                owner,
                limit: Some(limit),
                ..base
            };
            let rows = advisor.recommendations(&filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_recommendations(&rows);
            }
        }

        Commands::Show { id } => {
            let rec = advisor.recommendation(RecommendationId::new(id))?;
            println!("{}", serde_json::to_string_pretty(&rec)?);
        }

        Commands::Ddl { id, online, parallel } => {
            let ddl = advisor.generate_ddl(
                RecommendationId::new(id),
                &DdlOptions {
                    online,
                    parallel_degree: parallel,
                },
            )?;
            println!("{};", ddl.text());
            if ddl.placeholder {
                eprintln!("warning: no template for this object; nothing will run");
            }
        }

        Commands::Execute {
            id,
            apply,
            online,
            parallel,
            timeout_ms,
        } => {
            let opts = ExecuteOptions {
                dry_run: !apply,
                online,
                parallel_degree: parallel,
                timeout: timeout_ms.map(Duration::from_millis),
            };
            let record = advisor.execute(RecommendationId::new(id), opts).await?;
            print_execution(&record);
            if apply {
                session.save_catalog()?;
            }
        }

        Commands::Batch {
            strategy,
            ids,
            max_objects,
            max_total_size,
            min_savings_pct,
            apply,
            online,
            parallel,
        } => {
            let opts = BatchOptions {
                max_objects,
                max_total_size_bytes: max_total_size,
                min_savings_pct,
                online,
                dry_run: !apply,
                parallel_degree: parallel,
            };
            let summary = if ids.is_empty() {
                advisor.batch_execute(&strategy, opts).await?
            } else {
                let ids: Vec<RecommendationId> = ids.into_iter().map(RecommendationId::new).collect();
                advisor.batch_execute_ids(&ids, opts).await?
            };
            for item in &summary.items {
                let status = match (&item.record, &item.error) {
                    (Some(r), _) => r.status.to_string(),
                    (None, Some(e)) => format!("ERROR {e}"),
                    (None, None) => "LOST".to_string(),
                };
                println!(
                    "  #{:<6} {:<6} {:<40} {:>12}  {}",
                    item.recommendation_id.get(),
                    format!("{:?}", item.tier),
                    item.object.to_string(),
                    human(item.projected_savings_bytes),
                    status
                );
            }
            println!(
                "✓ Batch processed {}: {} succeeded, {} failed, {} saved ({} projected)",
                summary.processed,
                summary.succeeded,
                summary.failed,
                human(summary.total_savings_bytes),
                human(summary.projected_savings_bytes)
            );
            if apply {
                session.save_catalog()?;
            }
        }

        Commands::Execution { id } => {
            let record = advisor.execution(ExecutionId::new(id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::History {
            days,
            owner,
            status,
            limit,
        } => {
            let records = advisor.history(
                days,
                HistoryFilter {
                    since_ms: None,
                    owner,
                    status,
                    limit,
                },
            )?;
            if records.is_empty() {
                println!("No executions recorded");
            }
            for r in &records {
                print_execution(r);
            }
        }

        Commands::Strategies { json } => {
            let strategies = advisor.strategies()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&strategies)?);
            } else {
                for s in &strategies {
                    let frozen = if advisor.book().is_referenced(&s.name)? {
                        " (in use)"
                    } else {
                        ""
                    };
                    println!("{}{}: {}", s.name, frozen, s.description);
                    for rule in s.ordered_rules().values().flatten() {
                        println!(
                            "  {:<6} p{:<4} {:<20} {}",
                            rule.object_type.to_string(),
                            rule.priority,
                            rule.encoding.to_string(),
                            rule.label.as_deref().unwrap_or("")
                        );
                    }
                }
            }
        }

        Commands::Strategy { name } => {
            println!("{}", serde_json::to_string_pretty(&advisor.strategy(&name)?)?);
        }

        Commands::Compare {
            owner,
            name,
            object_type,
            partition,
            column,
        } => {
            let mut object = ObjectRef::table(owner, name);
            object.object_type = object_type;
            object.partition = partition;
            object.column = column;
            let rows = advisor.compare_strategies(&object).await?;
            println!("Strategy comparison for {}", object);
            for c in &rows {
                println!(
                    "  {:<14} {:<20} {:>12} saved ({:.1}%)  {}",
                    c.strategy,
                    c.encoding.to_string(),
                    human(c.projected_savings_bytes),
                    c.savings_pct,
                    c.rationale
                );
            }
        }

        Commands::Stats => {
            let estate = advisor.compression_statistics()?;
            println!(
                "Estate: {} objects, {} ({} already compressed in {} objects)",
                estate.total_objects,
                human(estate.total_size_bytes),
                human(estate.compressed_size_bytes),
                estate.compressed_objects
            );
            println!(
                "  Actionable: {}, projected savings {} (avg {:.1}%)",
                estate.actionable,
                human(estate.projected_savings_bytes),
                estate.avg_savings_pct
            );
            for s in advisor.savings_by_strategy()? {
                println!(
                    "{:<14} {:>5} objects  {:>12} of {:>12}  avg ratio {:.2}x  avg {:.1}%",
                    s.strategy,
                    s.objects,
                    human(s.total_savings_bytes),
                    human(s.total_size_bytes),
                    s.avg_ratio,
                    s.avg_savings_pct
                );
            }
        }

        Commands::Table {
            owner,
            name,
            object_type,
            partition,
        } => {
            let mut object = ObjectRef::table(owner, name);
            object.object_type = object_type;
            object.partition = partition;
            let stats = advisor.table_statistics(&object).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Export { out, strategy, all } => {
            let mut filter = if all {
                RecommendationFilter::all()
            } else {
                RecommendationFilter {
                    limit: None,
                    ..RecommendationFilter::default()
                }
            };
            filter.strategy = strategy;
            let n = export(advisor, &filter, &out)?;
            println!("✓ Exported {} recommendations to {}", n, out.display());
        }
    }

    Ok(())
}

fn export(advisor: &Advisor, filter: &RecommendationFilter, out: &Path) -> CliResult<usize> {
    let file = fs::File::create(out)?;
    Ok(advisor.export_recommendations_csv(filter, file)?)
}

fn print_recommendations(rows: &[Recommendation]) {
    if rows.is_empty() {
        println!("No recommendations");
        return;
    }
    for r in rows {
        println!(
            "#{:<6} {:<40} {:>12} -> {:<20} {:>12} ({:.1}%, {:?})",
            r.id.get(),
            r.object.to_string(),
            human(r.size_bytes),
            r.encoding.to_string(),
            human(r.projected_savings_bytes),
            r.savings_pct,
            r.priority()
        );
    }
}

fn print_execution(r: &ExecutionRecord) {
    let mode = if r.dry_run { "dry run" } else { "apply" };
    println!("Execution {} [{}] {} ({})", r.id.get(), r.status, r.object, mode);
    println!("  Statement: {}", r.statement);
    let path: Vec<String> = r.path.iter().map(|s| s.to_string()).collect();
    println!("  Path: {}", path.join(" -> "));
    if let Some(after) = r.size_after_bytes {
        println!("  Size: {} -> {}", human(r.size_before_bytes), human(after));
    }
    if let Some(e) = &r.error {
        println!("  Error: {}", e);
    }
}

fn human(bytes: u64) -> String {
    strata_rules::rationale::human_size(bytes)
}

fn short_digest(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}

#[cfg(test)]
mod tests {
    use super::{apply_cli_overrides, apply_strategy_config, AdvisorConfig, GlobalArgs};
    use std::path::PathBuf;
    use strata_rules::StrategyFileConfig;

    fn globals() -> GlobalArgs {
        GlobalArgs {
            catalog: PathBuf::from("catalog.json"),
            state_dir: None,
            strategies: None,
            analysis_parallelism: None,
            execution_parallelism: None,
        }
    }

    #[test]
    fn strategy_file_overrides_env_defaults() {
        let mut config = AdvisorConfig::default();
        let file = StrategyFileConfig {
            sample_rows: Some(5_000),
            analysis_parallelism: Some(8),
            ..Default::default()
        };
        apply_strategy_config(&mut config, &file);
        assert_eq!(config.sample_rows, 5_000);
        assert_eq!(config.analysis_parallelism, 8);
        assert_eq!(config.execution_parallelism, 2);
    }

    #[test]
    fn cli_overrides_higher_priority_than_file() {
        let mut config = AdvisorConfig::default();
        let file = StrategyFileConfig {
            analysis_parallelism: Some(8),
            ..Default::default()
        };
        apply_strategy_config(&mut config, &file);

        let cli = GlobalArgs {
            analysis_parallelism: Some(3),
            state_dir: Some("/tmp/strata".into()),
            ..globals()
        };
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.analysis_parallelism, 3);
        assert_eq!(config.state_dir, "/tmp/strata");
    }
}

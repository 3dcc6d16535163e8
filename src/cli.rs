use crate::{
    aggregate::Aggregator,
    config::Config,
    pipeline::Pipeline,
    report::{RunIndex, Summary},
    runner::LighthouseRunner,
    sitemap,
    store::ReportStore,
    util::{ensure_dir, now_rfc3339, sha256_hex, write_pretty_json},
    work::{build_work_items, plan_batches, WorkItem},
};
use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "sitemap-audit")]
#[command(about = "Run Lighthouse over every URL of a sitemap and summarize the scores")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./sitemap-audit.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the audit tool can be started.
    Doctor {},
    /// Print the batches a run would dispatch.
    Plan {
        #[command(flatten)]
        source: UrlSource,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Audit every URL and write the summary.
    Run {
        #[command(flatten)]
        source: UrlSource,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Rebuild the summary from reports already on disk.
    Summarize {
        #[command(flatten)]
        source: UrlSource,
    },
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub struct UrlSource {
    /// Sitemap to read URLs from (overrides sitemap.url and SITEMAP_URL).
    #[arg(long)]
    pub sitemap: Option<String>,
    /// Audit these URLs instead of reading a sitemap. Repeatable.
    #[arg(long = "url")]
    pub urls: Vec<String>,
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let mut cfg = match &cfg_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    cfg.validate()?;

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg).await
        }
        Command::Plan { source, batch_size } => {
            if let Some(b) = batch_size {
                cfg.global.batch_size = *b;
            }
            let _guard = init_logging(&args, &cfg, None)?;
            plan(&cfg, source).await
        }
        Command::Run {
            source,
            workers,
            batch_size,
        } => {
            if let Some(w) = workers {
                cfg.global.workers = *w;
            }
            if let Some(b) = batch_size {
                cfg.global.batch_size = *b;
            }
            let log_path = resolve_log_path(&cfg);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            if let Some(path) = &cfg_path {
                info!("config {}", path.display());
            }
            run(&cfg, source).await
        }
        Command::Summarize { source } => {
            let log_path = resolve_log_path(&cfg);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            summarize(&cfg, source).await
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("sitemap-audit.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.summary_dir).join("sitemap-audit.log"))
}

/// Resolves the work list: explicit `--url`s win, otherwise the sitemap is fetched.
/// A sitemap that cannot be fetched yields an empty list.
async fn resolve_items(cfg: &Config, source: &UrlSource) -> Result<(String, Vec<WorkItem>)> {
    if !source.urls.is_empty() {
        let items = build_work_items(source.urls.iter().cloned(), cfg.sitemap.max_urls);
        return Ok(("--url".to_string(), items));
    }
    let url = source
        .sitemap
        .clone()
        .or_else(|| cfg.sitemap_url())
        .ok_or_else(|| {
            anyhow!("no URL source: pass --sitemap or --url, or set sitemap.url / SITEMAP_URL")
        })?;
    let urls = sitemap::sitemap_urls(&cfg.sitemap, &url).await;
    Ok((url, build_work_items(urls, cfg.sitemap.max_urls)))
}

async fn doctor(cfg: &Config) -> Result<()> {
    let store = ReportStore::new(&cfg.paths.reports_dir);
    let runner = LighthouseRunner::new(cfg, store)?;
    let diag = runner.doctor().await;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if !diag.ok {
        return Err(anyhow!("{} is not usable", diag.command));
    }
    Ok(())
}

async fn plan(cfg: &Config, source: &UrlSource) -> Result<()> {
    let (label, items) = resolve_items(cfg, source).await?;
    let batches = plan_batches(&items, cfg.global.batch_size);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "source": label,
            "items": items.len(),
            "workers": cfg.global.workers,
            "batch_size": cfg.global.batch_size,
            "batches": batches,
        }))?
    );
    Ok(())
}

async fn run(cfg: &Config, source: &UrlSource) -> Result<()> {
    let started = now_rfc3339();
    let summary_dir = PathBuf::from(&cfg.paths.summary_dir);
    ensure_dir(&summary_dir)?;

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(summary_dir.join("effective-config.toml"), raw)?;
    }

    let (label, items) = resolve_items(cfg, source).await?;
    let url_list: Vec<&str> = items.iter().map(|i| i.raw_url.as_str()).collect();
    let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
    let run_id = sha256_hex(format!("{}:{}", cfg_hash, url_list.join("\n")).as_bytes());
    info!("run_id={run_id} source={label} items={}", items.len());

    let store = ReportStore::new(&cfg.paths.reports_dir);
    let runner = LighthouseRunner::new(cfg, store.clone())?;
    info!("lighthouse config {}", runner.config_path().display());
    let pipeline = Pipeline::new(cfg, store, runner);
    let out = pipeline.run(items).await?;

    if cfg.global.write_run_index {
        let index = RunIndex {
            run_id: run_id.clone(),
            started,
            finished: now_rfc3339(),
            source: label,
            items: out.stats.items,
            batches: out.stats.batches,
            failed_batches: out.stats.failed_batches,
            workers: out.stats.workers,
            batch_size: out.stats.batch_size,
            pages: out.summary.pages.len(),
            errors: out.summary.error_list.len(),
            summary: out.summary_path.display().to_string(),
        };
        write_pretty_json(&summary_dir.join(&cfg.output.index_filename), &index)?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "run_id": run_id,
                "summary": out.summary_path,
                "total": out.summary.summary.total,
                "pages": out.summary.pages.len(),
                "errors": out.summary.error_list.len(),
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

async fn summarize(cfg: &Config, source: &UrlSource) -> Result<()> {
    let (_, items) = resolve_items(cfg, source).await?;
    if let Some(summary) = rebuild_summary(cfg, &items)? {
        if cfg.global.print_summary {
            println!("{}", serde_json::to_string_pretty(&summary.summary)?);
        }
    }
    Ok(())
}

/// Re-aggregates reports already on disk. An empty work list (for example a sitemap
/// that could not be fetched) leaves the existing summary untouched.
pub fn rebuild_summary(cfg: &Config, items: &[WorkItem]) -> Result<Option<Summary>> {
    let path = PathBuf::from(&cfg.paths.summary_dir).join(&cfg.output.summary_filename);
    if items.is_empty() {
        warn!("no urls to summarize; keeping {}", path.display());
        return Ok(None);
    }
    let store = ReportStore::new(&cfg.paths.reports_dir);
    Aggregator::new(store).run(items, &path).map(Some)
}

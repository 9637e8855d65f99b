use anyhow::{Context, Result, bail};
use chrono::Utc;
use fieldsync_lib::application::ports::queue_store::{MutationPersistence, UploadPersistence};
use fieldsync_lib::{AppConfig, ConnectionPool, MutationRecord, SqliteQueuePersistence, UploadItem};
use std::collections::BTreeMap;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueKind {
    Mutations,
    Uploads,
    All,
}

#[derive(Debug, Clone)]
struct CliOptions {
    output: Option<PathBuf>,
    pretty: bool,
    queue: QueueKind,
    database_url: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct QueueReport {
    generated_at_ms: i64,
    database_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mutations: Option<Section<MutationRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uploads: Option<Section<UploadItem>>,
}

#[derive(Debug, serde::Serialize)]
struct Section<T> {
    total: usize,
    by_status: BTreeMap<String, usize>,
    records: Vec<T>,
}

fn usage() -> &'static str {
    "Usage: queue_inspect [--queue <mutations|uploads|all>] [--output <path>] [--pretty] [--database-url <url>]"
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(args)?;
    let database_url = resolve_database_url(&options);

    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = rt.block_on(async {
        collect_report(&database_url, options.queue)
            .await
            .with_context(|| format!("Failed to read queues from {database_url}"))
    })?;

    let payload = if options.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    match options.output.as_deref() {
        Some(path) => {
            write_output(path, &payload)?;
            println!("Queue snapshot written to {}", path.display());
        }
        None => println!("{payload}"),
    }
    Ok(())
}

async fn collect_report(database_url: &str, queue: QueueKind) -> Result<QueueReport> {
    let pool = ConnectionPool::new(database_url, 1).await?;
    pool.migrate().await?;
    let persistence = SqliteQueuePersistence::new(pool.clone());

    let mutations = if queue != QueueKind::Uploads {
        let records = MutationPersistence::load_all(&persistence).await?;
        Some(section(records, |record| record.status.as_str()))
    } else {
        None
    };
    let uploads = if queue != QueueKind::Mutations {
        let items = UploadPersistence::load_all(&persistence).await?;
        Some(section(items, |item| item.status.as_str()))
    } else {
        None
    };

    pool.close().await;
    Ok(QueueReport {
        generated_at_ms: Utc::now().timestamp_millis(),
        database_url: database_url.to_string(),
        mutations,
        uploads,
    })
}

fn section<T>(records: Vec<T>, status: impl Fn(&T) -> &'static str) -> Section<T> {
    let mut by_status = BTreeMap::new();
    for record in &records {
        *by_status.entry(status(record).to_string()).or_insert(0) += 1;
    }
    Section {
        total: records.len(),
        by_status,
        records,
    }
}

fn write_output(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

fn parse_args<I>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut output = None;
    let mut pretty = false;
    let mut queue = QueueKind::All;
    let mut database_url = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" | "--output" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--output requires a path\n{}", usage()))?;
                output = Some(PathBuf::from(path));
            }
            "--pretty" => pretty = true,
            "--queue" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--queue requires a value\n{}", usage()))?;
                queue = parse_queue(&value)?;
            }
            "--database-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--database-url requires a value\n{}", usage())
                })?;
                database_url = Some(value);
            }
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {other}\n{}", usage()),
        }
    }

    Ok(CliOptions {
        output,
        pretty,
        queue,
        database_url,
    })
}

fn parse_queue(value: &str) -> Result<QueueKind> {
    match value.to_ascii_lowercase().as_str() {
        "mutations" => Ok(QueueKind::Mutations),
        "uploads" => Ok(QueueKind::Uploads),
        "all" => Ok(QueueKind::All),
        other => bail!("Unknown queue: {other}. Expected 'mutations', 'uploads' or 'all'."),
    }
}

fn resolve_database_url(options: &CliOptions) -> String {
    if let Some(url) = &options.database_url {
        return url.clone();
    }
    AppConfig::from_env().database.url
}

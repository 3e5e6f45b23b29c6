//! CLI entry point for `mboxcraft`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use mboxcraft::config::Config;
use mboxcraft::engine::{Engine, ParseReport};
use mboxcraft::partition::{DateGranularity, PartitionStrategy, UndatedPolicy};
use mboxcraft::progress::Progress;

#[derive(Parser)]
#[command(
    name = "mboxcraft",
    version,
    about = "Parse, thread, split and merge MBOX archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show statistics for an archive
    Stats {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List subject threads
    Threads {
        path: PathBuf,
        #[arg(long)]
        json: bool,
        /// Show at most this many threads
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Split an archive into several files
    Split {
        path: PathBuf,
        /// Split strategy
        #[arg(long, value_enum, default_value_t = SplitBy::Count)]
        by: SplitBy,
        /// Messages per file (--by count)
        #[arg(long)]
        count: Option<usize>,
        /// Size cap per file in bytes (--by size)
        #[arg(long)]
        max_bytes: Option<u64>,
        /// Domain to route into its own file (--by domain, repeatable)
        #[arg(long = "domain", value_name = "DOMAIN")]
        domains: Vec<String>,
        /// Keep undated messages in an "undated" file (--by day|month|year|date)
        #[arg(long)]
        undated: bool,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Merge several archives into one
    Merge {
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Parse the inputs and write records sorted by date instead of concatenating
        #[arg(long)]
        records: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitBy {
    Count,
    Size,
    Day,
    Month,
    Year,
    Domain,
    /// Date buckets at the configured granularity
    Date,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = mboxcraft::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Stats { path, json } => cmd_stats(&config, &path, json),
        Commands::Threads { path, json, limit } => cmd_threads(&config, &path, json, limit),
        Commands::Split {
            path,
            by,
            count,
            max_bytes,
            domains,
            undated,
            output,
        } => {
            let strategy = build_strategy(&config, by, count, max_bytes, domains, undated)?;
            cmd_split(&config, &path, &strategy, &output)
        }
        Commands::Merge {
            inputs,
            output,
            records,
        } => cmd_merge(&config, &inputs, &output, records),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mboxcraft::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxcraft.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn build_strategy(
    config: &Config,
    by: SplitBy,
    count: Option<usize>,
    max_bytes: Option<u64>,
    domains: Vec<String>,
    undated: bool,
) -> anyhow::Result<PartitionStrategy> {
    let undated = if undated {
        UndatedPolicy::Bucket
    } else {
        config.split.undated
    };
    let by_date = |granularity| PartitionStrategy::ByDate {
        granularity,
        undated,
    };

    Ok(match by {
        SplitBy::Count => {
            PartitionStrategy::ByCount(count.unwrap_or(config.split.default_count))
        }
        SplitBy::Size => {
            PartitionStrategy::BySize(max_bytes.unwrap_or(config.split.default_max_bytes))
        }
        SplitBy::Day => by_date(DateGranularity::Day),
        SplitBy::Month => by_date(DateGranularity::Month),
        SplitBy::Year => by_date(DateGranularity::Year),
        SplitBy::Date => by_date(config.split.date_granularity),
        SplitBy::Domain => {
            let domains = if domains.is_empty() {
                config.split.domains.clone()
            } else {
                domains
            };
            if domains.is_empty() {
                anyhow::bail!("--by domain needs at least one --domain (or [split] domains)");
            }
            PartitionStrategy::ByDomain(domains)
        }
    })
}

fn progress_bar(template: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Load an archive behind a progress bar.
fn load(engine: &Engine, path: &Path) -> anyhow::Result<ParseReport> {
    let pb = progress_bar("{spinner:.green} Parsing [{bar:40.cyan/blue}] {pos}/{len}");
    let report = engine.load_archive(path, &|p: &Progress| {
        pb.set_length(p.total as u64);
        pb.set_position(p.completed as u64);
    })?;
    pb.finish_and_clear();
    Ok(report)
}

/// Show statistics for an archive.
fn cmd_stats(config: &Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let engine = Engine::with_config(config);
    let start = Instant::now();
    let report = load(&engine, path)?;
    let elapsed = start.elapsed();
    let threads = engine.threads(&report.messages);

    let messages = &report.messages;
    let dated: Vec<_> = messages.iter().filter_map(|m| m.date).collect();
    let date_range = dated.iter().min().zip(dated.iter().max());
    let with_attachments = messages.iter().filter(|m| m.attachment_count() > 0).count();
    let file_size = std::fs::metadata(path)?.len();

    if json {
        let stats = serde_json::json!({
            "file": path.to_string_lossy(),
            "file_size": file_size,
            "message_count": messages.len(),
            "dropped_chunks": report.dropped,
            "undated": messages.len() - dated.len(),
            "thread_count": threads.len(),
            "with_attachments": with_attachments,
            "date_range": date_range.map(|(min, max)| serde_json::json!({
                "oldest": min.to_rfc3339(),
                "newest": max.to_rfc3339(),
            })),
            "parsing_time_ms": elapsed.as_millis(),
        });
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Size", format_size(file_size, BINARY));
    println!("  {:<20} {}", "Messages", messages.len());
    println!("  {:<20} {}", "Dropped chunks", report.dropped);
    println!("  {:<20} {}", "Undated", messages.len() - dated.len());
    println!("  {:<20} {}", "Threads", threads.len());
    println!("  {:<20} {}", "With attachments", with_attachments);
    if let Some((min, max)) = date_range {
        println!(
            "  {:<20} {} — {}",
            "Date range",
            min.format("%Y-%m-%d"),
            max.format("%Y-%m-%d")
        );
    }
    println!("  {:<20} {:.2?}", "Parsing time", elapsed);
    println!();
    Ok(())
}

/// List subject threads, largest first.
fn cmd_threads(config: &Config, path: &Path, json: bool, limit: Option<usize>) -> anyhow::Result<()> {
    let engine = Engine::with_config(config);
    let report = load(&engine, path)?;
    let threads = engine.threads(&report.messages);
    let shown = limit.unwrap_or(threads.len()).min(threads.len());

    if json {
        let items: Vec<serde_json::Value> = threads[..shown]
            .iter()
            .map(|t| {
                serde_json::json!({
                    "key": t.key,
                    "subject": t.subject(),
                    "message_count": t.len(),
                    "participants": t.participants,
                    "first": t.date_range.map(|(a, _)| a.to_rfc3339()),
                    "last": t.date_range.map(|(_, b)| b.to_rfc3339()),
                })
            })
            .collect();
        let output = serde_json::json!({
            "thread_count": threads.len(),
            "threads": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {} thread(s)", threads.len());
    println!();
    println!("  {:>5} {:>6} {:<23} {:<50}", "#", "Msgs", "Last", "Subject");
    println!("  {}", "-".repeat(86));
    for (i, thread) in threads[..shown].iter().enumerate() {
        let last = thread
            .date_range
            .map(|(_, b)| b.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let subject: String = thread.subject().chars().take(49).collect();
        println!("  {:>5} {:>6} {:<23} {:<50}", i + 1, thread.len(), last, subject);
    }
    println!();
    Ok(())
}

/// Split an archive into several files.
fn cmd_split(
    config: &Config,
    path: &Path,
    strategy: &PartitionStrategy,
    output: &Path,
) -> anyhow::Result<()> {
    let engine = Engine::with_config(config);
    let report = load(&engine, path)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());

    let pb = progress_bar("{spinner:.green} Writing [{bar:40.cyan/blue}] {pos}/{len} files");
    let outputs = engine.split_to_dir(
        &report.messages,
        strategy,
        output,
        &stem,
        &|p: &Progress| {
            pb.set_length(p.total as u64);
            pb.set_position(p.completed as u64);
        },
    )?;
    pb.finish_and_clear();

    let written: usize = outputs.iter().map(|o| o.messages).sum();
    println!();
    println!(
        "  Split {} message(s) into {} file(s) in {}",
        written,
        outputs.len(),
        output.display()
    );
    if written < report.messages.len() {
        println!(
            "  {} undated message(s) left out (use --undated to keep them)",
            report.messages.len() - written
        );
    }
    for out in &outputs {
        println!("  {:>8}  {}", out.messages, out.path.display());
    }
    println!();
    Ok(())
}

/// Merge multiple archives into one.
fn cmd_merge(config: &Config, inputs: &[PathBuf], output: &Path, records: bool) -> anyhow::Result<()> {
    if inputs.is_empty() {
        anyhow::bail!("No input files given");
    }
    let engine = Engine::with_config(config);
    let pb = progress_bar("{spinner:.green} Merging [{bar:40.cyan/blue}] {pos}/{len}");
    let sink = |p: &Progress| {
        pb.set_length(p.total as u64);
        pb.set_position(p.completed as u64);
    };

    let stats = if records {
        let mut all = Vec::new();
        for input in inputs {
            let report = engine.load_archive(input, &sink)?;
            all.extend(report.messages);
        }
        let refs: Vec<_> = all.iter().collect();
        engine.merge_messages(&refs, output, &sink)?
    } else {
        engine.merge_files(inputs, output, &sink)?
    };
    pb.finish_and_clear();

    use humansize::{format_size, BINARY};
    println!();
    println!("  Merge complete:");
    println!("  {:<25} {}", "Input files", inputs.len());
    println!("  {:<25} {}", "Total messages", stats.messages);
    println!(
        "  {:<25} {}",
        "Output size",
        format_size(stats.output_size, BINARY)
    );
    println!("  {:<25} {}", "Output file", output.display());
    println!();
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxcraft", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

//! slabarena command-line tool
//!
//! Exercises a slab arena and reports what it did:
//! - `demo`: allocate a few buffers and print them
//! - `classes`: print the slab class table of a policy
//! - `stats`: run a list of allocations and print the arena statistics
//!
//! # Examples
//!
//! ```bash
//! # Class table for 48-byte start chunks growing by 25%
//! slabarena classes --start-chunk-size 48 --growth-factor 1.25 --count 20
//!
//! # Allocate three buffers, release them, print Prometheus metrics
//! slabarena stats --sizes 3,17,4096 --release --format prometheus
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use slabarena::arena::{calculate_size_classes, chunks_per_slab, FOOTER_LEN};
use slabarena::config::{LogFormat, Settings};
use slabarena::{logging, metrics, Arena, Buf};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// slabarena - reference-counted slab allocator
#[derive(Parser, Debug)]
#[command(name = "slabarena")]
#[command(version = slabarena::VERSION)]
#[command(about = "Reference-counted slab allocator toolkit", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true, env = "SLABARENA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level directive (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable allocator debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Log format (compact, pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Allocate a couple of buffers and show them
    Demo,

    /// Print the slab class table
    Classes(ClassesArgs),

    /// Run allocations and print arena statistics
    Stats(StatsArgs),

    /// Print the effective settings as TOML
    Config,

    /// Show version
    Version,
}

/// Arena policy overrides
#[derive(Args, Debug, Clone)]
struct PolicyArgs {
    /// Chunk size of the smallest class
    #[arg(long)]
    start_chunk_size: Option<usize>,

    /// Bytes per slab
    #[arg(long)]
    slab_size: Option<usize>,

    /// Growth factor between classes
    #[arg(long)]
    growth_factor: Option<f64>,
}

#[derive(Args, Debug)]
struct ClassesArgs {
    #[command(flatten)]
    policy: PolicyArgs,

    /// Number of classes to print
    #[arg(short, long, default_value = "16")]
    count: usize,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[command(flatten)]
    policy: PolicyArgs,

    /// Comma-separated allocation sizes
    #[arg(short, long, value_delimiter = ',', required = true)]
    sizes: Vec<usize>,

    /// Release every buffer after allocating
    #[arg(long)]
    release: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
    Prometheus,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    logging::init(&settings.logging)?;

    match cli.command {
        Commands::Demo => demo_command(),
        Commands::Classes(args) => classes_command(&settings, args),
        Commands::Stats(args) => stats_command(&settings, args),
        Commands::Config => {
            print!("{}", settings.to_toml_string()?);
            Ok(())
        }
        Commands::Version => {
            println!("slabarena {}", slabarena::VERSION);
            Ok(())
        }
    }
}

/// Settings file first, then command-line overrides
fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(level) = &cli.log_level {
        settings.logging.filter = level.clone();
    }
    if let Some(format) = &cli.log_format {
        settings.logging.format = format.parse::<LogFormat>()?;
    }
    settings.logging.debug |= cli.debug;
    settings.logging.ansi &= !cli.no_color;

    let policy = match &cli.command {
        Commands::Classes(args) => Some(&args.policy),
        Commands::Stats(args) => Some(&args.policy),
        _ => None,
    };
    if let Some(policy) = policy {
        if let Some(v) = policy.start_chunk_size {
            settings.arena.start_chunk_size = v;
        }
        if let Some(v) = policy.slab_size {
            settings.arena.slab_size = v;
        }
        if let Some(v) = policy.growth_factor {
            settings.arena.growth_factor = v;
        }
    }
    settings.arena.validate()?;

    Ok(settings)
}

/// Demo command - small fixed workload
fn demo_command() -> anyhow::Result<()> {
    let mut arena = Arena::new(32, 1 << 9, 2.0)?;

    let buf = arena.alloc(130)?;
    let other = arena.alloc(131)?;
    arena.add_ref(&buf);
    arena.bytes_mut(&buf)[..5].copy_from_slice(b"hello");

    println!(
        "got the buf: len={}, cap={} refs={} loc={}",
        buf.len(),
        arena.capacity(&buf),
        arena.ref_count(&buf),
        buf.loc()
    );
    println!("first bytes: {:?}", &arena.bytes(&buf)[..8]);

    arena.set_next(&buf, Some(&other));
    arena.dec_ref(&other);
    release_all(&mut arena, &[buf, buf]);
    info!(stats = ?arena.snapshot(), "Demo finished");
    Ok(())
}

/// Classes command - class table of the configured policy
fn classes_command(settings: &Settings, args: ClassesArgs) -> anyhow::Result<()> {
    let policy = &settings.arena;
    println!(
        "{:>6}  {:>12}  {:>10}  {:>12}",
        "class", "chunk_size", "per_slab", "slab_bytes"
    );

    let sizes = calculate_size_classes(
        policy.start_chunk_size,
        policy.slab_size,
        policy.growth_factor,
    );
    for (index, chunk_size) in sizes.into_iter().take(args.count).enumerate() {
        let per_slab = chunks_per_slab(policy.slab_size, chunk_size);
        let partial = if chunk_size > policy.slab_size { " (partial)" } else { "" };
        println!(
            "{:>6}  {:>12}  {:>10}  {:>12}{}",
            index,
            chunk_size,
            per_slab,
            per_slab * (chunk_size + FOOTER_LEN),
            partial
        );
    }
    Ok(())
}

/// Stats command - run the allocations and print statistics
fn stats_command(settings: &Settings, args: StatsArgs) -> anyhow::Result<()> {
    let mut arena = Arena::from_config(&settings.arena)?;

    let mut held = Vec::with_capacity(args.sizes.len());
    for size in &args.sizes {
        match arena.alloc(*size) {
            Ok(buf) => held.push(buf),
            Err(e) => warn!(size, error = %e, "Allocation refused"),
        }
    }
    if args.release {
        release_all(&mut arena, &held);
    }

    match args.format {
        OutputFormat::Text => {
            for (key, value) in arena.stats(BTreeMap::new()) {
                println!("{} = {}", key, value);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&arena.snapshot())?);
        }
        OutputFormat::Prometheus => {
            print!("{}", metrics::render("slabarena", &arena.snapshot())?);
        }
    }
    Ok(())
}

fn release_all(arena: &mut Arena, bufs: &[Buf]) {
    for buf in bufs {
        arena.dec_ref(buf);
    }
}

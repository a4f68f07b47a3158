use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use ratings_partition::{
    build_range_partitions, build_round_robin_partitions, count_partitions, load_ratings,
    route_range_insert, route_round_robin_insert, BuildReport, PartitionConfig, RatingRecord,
    Result, RoutedInsert, Store,
};

#[derive(Parser)]
#[command(name = "rpart")]
#[command(about = "Range and round-robin partitioning of rating tables")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML configuration file (defaults to the RPART_CONFIG environment variable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// DuckDB database file, overriding the configuration
    #[arg(long)]
    database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a ratings file (`user::item::rating` or CSV) into a base table
    Load { table: String, file: PathBuf },
    /// Split a base table into N range partitions on rating
    RangePart { table: String, partitions: usize },
    /// Split a base table into N round-robin partitions
    RrPart { table: String, partitions: usize },
    /// Route one record into the existing range partitions
    RangeInsert {
        table: String,
        user: i32,
        item: i32,
        rating: f64,
    },
    /// Route one record into the existing round-robin partitions
    RrInsert {
        table: String,
        user: i32,
        item: i32,
        rating: f64,
    },
    /// Count partition tables whose name starts with a prefix
    Count { prefix: String },
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new().filter_level(level).init();
}

fn load_config(cli: &Cli) -> Result<PartitionConfig> {
    let mut config = match &cli.config {
        Some(path) => PartitionConfig::from_file(path)?,
        None => PartitionConfig::from_env()?,
    };
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let store = Store::open(load_config(&cli)?)?;
    let quiet = cli.quiet;

    match cli.command {
        Command::Load { table, file } => {
            let report = load_ratings(&store, &table, &file)?;
            if !quiet {
                println!(
                    "{}: loaded {} rows ({} malformed, {} duplicate)",
                    table, report.loaded, report.skipped, report.duplicates
                );
            }
        }
        Command::RangePart { table, partitions } => {
            let report = build_range_partitions(&store, &table, partitions)?;
            print_build(&report, quiet);
        }
        Command::RrPart { table, partitions } => {
            let report = build_round_robin_partitions(&store, &table, partitions)?;
            print_build(&report, quiet);
        }
        Command::RangeInsert {
            table,
            user,
            item,
            rating,
        } => {
            let routed = route_range_insert(&store, &table, &RatingRecord::new(user, item, rating))?;
            print_routed(&routed, quiet);
        }
        Command::RrInsert {
            table,
            user,
            item,
            rating,
        } => {
            let record = RatingRecord::new(user, item, rating);
            let routed = route_round_robin_insert(&store, &table, &record)?;
            print_routed(&routed, quiet);
        }
        Command::Count { prefix } => {
            println!("{}", count_partitions(&store, &prefix)?);
        }
    }
    Ok(())
}

fn print_build(report: &BuildReport, quiet: bool) {
    if quiet {
        return;
    }
    println!(
        "{} partitioning: {} rows into {} partitions {:?}",
        report.strategy,
        report.total_rows(),
        report.partitions,
        report.rows_per_partition
    );
}

fn print_routed(routed: &RoutedInsert, quiet: bool) {
    if quiet {
        return;
    }
    let base = if routed.base_written { " (+ base table)" } else { "" };
    println!("inserted into {}{}", routed.table, base);
}

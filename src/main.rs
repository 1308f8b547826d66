use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Parser;
use simple_logger::SimpleLogger;

use large_file_sort::sort::{Sort, MAX_SORT_TASKS};

/// Sort a large delimited file by a list of fields
#[derive(Parser, Debug)]
#[command(name = "large-file-sort", version)]
struct Args {
    /// File to sort. The first line is treated as a header and dropped
    #[arg(short = 'f', long = "file-name")]
    file_name: PathBuf,

    /// Number of files to split into
    #[arg(short = 'n', long = "number-files-to-split")]
    chunks: usize,

    /// Zero based columns to sort by, in order of precedence
    #[arg(short = 'c', long = "columns-to-sort", num_args = 1.., required = true)]
    columns: Vec<usize>,

    /// Maximum number of files sorted at the same time
    #[arg(short, long, default_value_t = MAX_SORT_TASKS)]
    tasks: usize,

    /// Field separator
    #[arg(short, long, default_value_t = ',')]
    separator: char,

    /// Sort the split files one after the other
    #[arg(long)]
    sequential: bool,

    /// Directory for the split files and the result, cleared before use. Must not contain the input
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Verify the result is sorted
    #[arg(long)]
    check: bool,

    /// Log level: error, warn, info, debug or trace. RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

fn run(args: Args) -> Result<(), anyhow::Error> {
    let mut sort = Sort::new(args.file_name.clone(), args.chunks, args.columns);
    sort.with_tasks(args.tasks);
    sort.with_field_separator(args.separator);
    sort.with_parallel(!args.sequential);
    if let Some(work_dir) = args.work_dir {
        sort.with_work_dir(work_dir);
    }

    let report = sort.sort()
        .with_context(|| format!("sorting {}", args.file_name.display()))?;
    println!("{}", report);

    if args.check && !sort.check(report.output())? {
        return Err(anyhow!("{} is not sorted", report.output().display()));
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = SimpleLogger::new().with_level(args.log_level).env().init() {
        eprintln!("failed to initialize logging: {e}");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

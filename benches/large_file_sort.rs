use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Error};
use benchmark_rs::benchmarks::Benchmarks;
use benchmark_rs::stopwatch::StopWatch;
use data_encoding::HEXLOWER;
use rand::Rng;
use simple_logger::SimpleLogger;

use large_file_sort::sort::Sort;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Clone)]
pub struct BenchmarkConfig {
    files: BTreeMap<usize, PathBuf>,
    bench_results_dir: PathBuf,
    tasks: usize,
    parallel: bool,
    chunks: usize,
    description: String,
}

impl BenchmarkConfig {
    pub fn new(files: BTreeMap<usize, PathBuf>, bench_results_dir: PathBuf, tasks: usize, parallel: bool, chunks: usize, description: &str) -> BenchmarkConfig {
        BenchmarkConfig {
            files,
            bench_results_dir,
            tasks,
            parallel,
            chunks,
            description: description.to_string(),
        }
    }

    pub fn get_input_path(&self, key: usize) -> PathBuf {
        self.files.get(&key).unwrap().clone()
    }

    pub fn bench_results_dir(&self) -> &PathBuf {
        &self.bench_results_dir
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }
}

impl Display for BenchmarkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "tasks: {}, parallel: {}, chunks: {}, description: {}",
                 self.tasks,
                 self.parallel,
                 self.chunks,
                 self.description,
        )
    }
}

fn work_dir_name(dir: &PathBuf) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

fn cleanup(bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    if bench_results_dir.exists() {
        fs::remove_dir_all(bench_results_dir.clone()).with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }
    Ok(())
}

fn setup(bench_input_dir: &PathBuf, bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    cleanup(bench_results_dir)?;

    if !bench_input_dir.exists() {
        fs::create_dir_all(bench_input_dir.clone())?;
    }

    if !bench_results_dir.exists() {
        fs::create_dir_all(bench_results_dir.clone())
            .with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }

    Ok(())
}

fn create_input_files(count: usize, factor: usize, base_path: PathBuf) -> Result<BTreeMap<usize, PathBuf>, anyhow::Error> {
    let mut files: BTreeMap<usize, PathBuf> = BTreeMap::new();
    let mut rng = rand::thread_rng();
    for i in 1..=count {
        let number_of_lines = i * factor;
        let path = base_path.join(format!("{number_of_lines}.csv"));
        if !path.exists() {
            let mut writer = BufWriter::new(
                File::create(&path)
                    .with_context(|| anyhow!("path: {}", path.to_string_lossy()))?);
            writeln!(writer, "event_type,product_id,brand,price,user_session")?;
            for _j in 0..number_of_lines {
                writeln!(
                    writer,
                    "{},{},{},{}.{:02},{}",
                    ["view", "cart", "purchase", "remove_from_cart"][rng.gen_range(0..4)],
                    rng.gen_range(1_000_000..9_999_999),
                    HEXLOWER.encode(&rng.gen::<[u8; 3]>()),
                    rng.gen_range(0..2000),
                    rng.gen_range(0..100),
                    HEXLOWER.encode(&rng.gen::<[u8; 16]>()),
                )?;
            }
            writer.flush()?;
        }
        files.insert(number_of_lines, path);
    }
    Ok(files)
}

fn sort(stop_watch: &mut StopWatch, config: BenchmarkConfig, work: usize) -> Result<(), anyhow::Error> {
    stop_watch.pause();
    let input_path = config.get_input_path(work);
    let work_dir = work_dir_name(config.bench_results_dir());
    log::info!("Start sorting {}", input_path.to_string_lossy());
    stop_watch.resume();
    let mut large_file_sort = Sort::new(input_path.clone(), config.chunks(), vec![0, 2, 3]);
    large_file_sort.with_work_dir(work_dir.clone());
    large_file_sort.with_tasks(config.tasks());
    large_file_sort.with_parallel(config.parallel());
    large_file_sort.sort()?;
    stop_watch.pause();
    log::info!("Finish sorting {}", input_path.to_string_lossy());
    fs::remove_dir_all(work_dir.clone())
        .with_context(|| anyhow!("{}", work_dir.to_string_lossy()))?;
    Ok(())
}

#[test]
fn large_file_sort_bench() -> Result<(), Error> {
    SimpleLogger::new().init().unwrap();
    log::info!("Started large_file_sort_bench.");

    let bench_input_dir = PathBuf::from("./target/benchmarks/input");
    let bench_results_dir = PathBuf::from("./target/benchmarks/results");
    setup(&bench_input_dir, &bench_results_dir)?;

    let files = create_input_files(5, 50_000, bench_input_dir.clone())?;

    let mut benchmarks = Benchmarks::new("large-file-sort");

    benchmarks.add(
        "sequential-20-chunks",
        sort,
        BenchmarkConfig::new(files.clone(), bench_results_dir.clone(), 1, false, 20, "sequential"),
        files.keys().cloned().collect(),
        3,
        0,
    )?;

    for tasks in [2, 4, 8] {
        benchmarks.add(
            &format!("parallel-{tasks}-tasks-20-chunks"),
            sort,
            BenchmarkConfig::new(files.clone(), bench_results_dir.clone(), tasks, true, 20, "parallel"),
            files.keys().cloned().collect(),
            3,
            0,
        )?;
    }

    benchmarks.add(
        "parallel-8-tasks-100-chunks",
        sort,
        BenchmarkConfig::new(files.clone(), bench_results_dir.clone(), 8, true, 100, "many chunks"),
        files.keys().cloned().collect(),
        3,
        0,
    )?;

    benchmarks.run()?;
    benchmarks.save_to_csv(PathBuf::from("./target/benchmarks/"), true, true)?;
    benchmarks.save_to_json(PathBuf::from("./target/benchmarks/"))?;

    log::info!("Finished large_file_sort_bench.");
    Ok(())
}

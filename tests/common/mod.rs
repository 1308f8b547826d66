use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use rand::Rng;

/// Create a fresh directory under ./target/results/ for one test.
pub fn setup() -> PathBuf {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    let dir = temp_file_name(&results_dir_path);
    fs::create_dir_all(&dir).unwrap_or_else(|_|
        panic!("Failed to create results directory: {:?}", dir)
    );
    dir
}

pub fn temp_file_name(dir: &Path) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().collect::<Result<Vec<String>, _>>()?;
    Ok(lines)
}

/// Write `header` followed by `rows` to `dir/name`.
#[allow(dead_code)]
pub fn write_input(dir: &Path, name: &str, header: &str, rows: &[String]) -> Result<PathBuf, anyhow::Error> {
    let path = dir.join(name);
    let mut writer = BufWriter::new(File::create(&path)?);
    writeln!(writer, "{}", header)?;
    for row in rows {
        writeln!(writer, "{}", row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Rows of four comma separated fields drawn from `distinct` templates, so that many rows are
/// identical and many more share their leading fields.
#[allow(dead_code)]
pub fn random_rows(count: usize, distinct: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let templates: Vec<String> = (0..distinct)
        .map(|i| {
            format!(
                "{},{},{},{}",
                ["view", "cart", "purchase"][i % 3],
                HEXLOWER.encode(&rng.gen::<[u8; 2]>()),
                rng.gen_range(0..20),
                if i % 5 == 0 { String::new() } else { HEXLOWER.encode(&rng.gen::<[u8; 4]>()) },
            )
        })
        .collect();
    (0..count)
        .map(|_| templates[rng.gen_range(0..distinct)].clone())
        .collect()
}

/// Whether every adjacent pair of `lines` is ordered by `fields`, compared as strings. A line
/// too short for `fields` makes the result false.
#[allow(dead_code)]
pub fn is_sorted(lines: &[String], fields: &[usize], separator: char) -> bool {
    let key = |line: &String| -> Option<Vec<String>> {
        let parts: Vec<&str> = line.split(separator).collect();
        fields.iter().map(|i| parts.get(*i).map(|part| part.to_string())).collect()
    };
    lines.windows(2).all(|pair| match (key(&pair[0]), key(&pair[1])) {
        (Some(first), Some(second)) => first <= second,
        _ => false,
    })
}

//! CSV output and text rendering of training results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use csv::Writer;
use itertools::Itertools;

use crate::environment::{FrozenLake, Position};
use crate::error::Result;
use crate::orchestrator::EpisodeRecord;

pub fn success_rate_file_name(lake: &FrozenLake, agents: usize) -> String {
    format!("success_rate_{}x{}_agents_{agents}.csv", lake.height(), lake.width())
}

/// `Episode,Success Rate` rows; the header says `Average Success Rate`
/// when the rates are averaged over several trials.
pub fn write_success_rates(path: impl AsRef<Path>, records: &[EpisodeRecord], trials: usize) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    let header = if trials > 1 { "Average Success Rate" } else { "Success Rate" };
    wtr.write_record(["Episode", header])?;
    for record in records {
        wtr.write_record([record.episode.to_string(), format!("{:.2}", record.success_rate)])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_update_timings(path: impl AsRef<Path>, times: &[Duration]) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(["index", "time_ms"])?;
    for (i, t) in times.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{:.6}", t.as_secs_f64() * 1000.0)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write both reports under `dir`; returns the files written.
pub fn write_reports(
    dir: impl AsRef<Path>,
    lake: &FrozenLake,
    agents: usize,
    trials: usize,
    records: &[EpisodeRecord],
    times: Option<&[Duration]>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let rates = dir.join(success_rate_file_name(lake, agents));
    write_success_rates(&rates, records, trials)?;
    written.push(rates);

    if let Some(times) = times {
        let timings = dir.join("update_timings.csv");
        write_update_timings(&timings, times)?;
        written.push(timings);
    }
    Ok(written)
}

/// `(0, 0) -> (0, 1) -> ...`
pub fn render_path(path: &[Position]) -> String {
    path.iter().join(" -> ")
}

/// The lake with the path drawn in: `S` start, `G` goal, `*` visited,
/// `o` ground, `x` hole.
pub fn render_lake(lake: &FrozenLake, path: &[Position]) -> String {
    use crate::environment::Cell;
    (0..lake.height())
        .map(|y| {
            (0..lake.width())
                .map(|x| {
                    let pos = Position::new(x, y);
                    if pos == lake.start() {
                        'S'
                    } else if pos == lake.goal() {
                        'G'
                    } else if path.contains(&pos) {
                        '*'
                    } else if lake.cell(pos) == Cell::Hole {
                        'x'
                    } else {
                        'o'
                    }
                })
                .collect::<String>()
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::GridSize;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pprl-report-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_success_rate_csv() {
        let dir = scratch("single");
        let lake = GridSize::Four.lake();
        let records = [
            EpisodeRecord { episode: 1, success_rate: 0.0 },
            EpisodeRecord { episode: 2, success_rate: 0.5 },
            EpisodeRecord { episode: 3, success_rate: 2.0 / 3.0 },
        ];
        let written = write_reports(&dir, &lake, 2, 1, &records, None).unwrap();
        assert_eq!(written, vec![dir.join("success_rate_4x4_agents_2.csv")]);
        let text = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(text, "Episode,Success Rate\n1,0.00\n2,0.50\n3,0.67\n");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_average_header_and_timings() {
        let dir = scratch("avg");
        let lake = GridSize::Three.lake();
        let records = [EpisodeRecord { episode: 1, success_rate: 0.25 }];
        let times = [Duration::from_micros(1500), Duration::from_millis(2)];
        let written = write_reports(&dir, &lake, 1, 3, &records, Some(&times)).unwrap();
        assert_eq!(written.len(), 2);
        let rates = fs::read_to_string(&written[0]).unwrap();
        assert!(rates.starts_with("Episode,Average Success Rate\n1,0.25"));
        let timings = fs::read_to_string(&written[1]).unwrap();
        assert_eq!(timings, "index,time_ms\n0,1.500000\n1,2.000000\n");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_render_path() {
        let lake = GridSize::Three.lake();
        let path = [Position::new(0, 0), Position::new(0, 1), Position::new(1, 1), Position::new(2, 1), Position::new(2, 2)];
        assert_eq!(render_path(&path), "(0, 0) -> (0, 1) -> (1, 1) -> (2, 1) -> (2, 2)");
        assert_eq!(render_lake(&lake, &path), "Sxx\n***\nxxG");
    }
}

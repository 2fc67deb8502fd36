use std::fs::OpenOptions;
use std::path::Path;

use serde::Serialize;

use super::error::FileResult;

/// Buffer pool I/O counters.
///
/// Field order is the column order of the CSV output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub logical_reads: u64,
    pub logical_writes: u64,
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub buffer_hits: u64,
    pub buffer_misses: u64,
}

impl PoolStats {
    /// Fraction of fix requests served from the pool (0.0 when nothing was requested)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.buffer_hits + self.buffer_misses;
        if total == 0 {
            return 0.0;
        }
        self.buffer_hits as f64 / total as f64
    }

    /// Write a header line and a single row, replacing any existing file
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.serialize(self)?;
        writer.flush()?;
        Ok(())
    }

    /// Append a row, writing the header only if the file is new or empty
    pub fn append_csv<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        writer.serialize(self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "logical_reads,logical_writes,physical_reads,physical_writes,buffer_hits,buffer_misses";

    fn sample() -> PoolStats {
        PoolStats {
            logical_reads: 10,
            logical_writes: 3,
            physical_reads: 4,
            physical_writes: 2,
            buffer_hits: 6,
            buffer_misses: 4,
        }
    }

    #[test]
    fn test_hit_ratio() {
        assert_eq!(PoolStats::default().hit_ratio(), 0.0);
        assert!((sample().hit_ratio() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_csv_column_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pf_stats.csv");

        sample().write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![HEADER, "10,3,4,2,6,4"]);

        // Overwrites rather than appends
        PoolStats::default().write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_append_csv_writes_header_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sweep.csv");

        sample().append_csv(&path).unwrap();
        PoolStats::default().append_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![HEADER, "10,3,4,2,6,4", "0,0,0,0,0,0"]);
    }
}

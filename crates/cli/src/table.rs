//! Flat table export of classification records (CSV or Parquet by extension).

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use kinkmap::prelude::*;
use polars::df;
use polars::prelude::*;

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}

/// `x:y` pairs joined by `;`, e.g. `0:5;2:3;4:1`.
pub fn boundary_key(gb: &GridBoundary) -> String {
    gb.pts
        .iter()
        .map(|(i, j)| format!("{i}:{j}"))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn records_frame<I>(records: I) -> Result<DataFrame>
where
    I: IntoIterator<Item = ClassificationRecord>,
{
    let mut kinks = Vec::new();
    let mut labels = Vec::new();
    let mut keys = Vec::new();
    for rec in records {
        kinks.push(rec.kinks as u32);
        labels.push(rec.label);
        keys.push(boundary_key(&rec.boundary));
    }
    let df = df!(
        "kinks" => kinks,
        "label" => labels,
        "boundary" => keys,
    )?;
    Ok(df)
}

pub fn write_records<I>(path: &Path, records: I) -> Result<()>
where
    I: IntoIterator<Item = ClassificationRecord>,
{
    let mut df = records_frame(records)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    if is_parquet(path) {
        ParquetWriter::new(file)
            .finish(&mut df)
            .with_context(|| format!("writing {}", path.display()))?;
    } else {
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    tracing::info!(rows = df.height(), path = %path.display(), "table written");
    Ok(())
}

/// Per-kink-count totals and positives of a previously written table.
pub fn summarize(path: &Path) -> Result<DataFrame> {
    let lf = if is_parquet(path) {
        LazyFrame::scan_parquet(path, ScanArgsParquet::default())?
    } else {
        LazyCsvReader::new(path)
            .with_infer_schema_length(Some(100))
            .finish()?
    };
    let df = lf
        .group_by([col("kinks")])
        .agg([
            len().alias("boundaries"),
            col("label").cast(DataType::UInt32).sum().alias("positives"),
        ])
        .sort(["kinks"], Default::default())
        .collect()
        .with_context(|| format!("summarizing {}", path.display()))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn records() -> Vec<ClassificationRecord> {
        let rec = |pts: Vec<(u32, u32)>, label| {
            let boundary = GridBoundary::new(pts);
            ClassificationRecord {
                kinks: boundary.kinks(),
                boundary,
                label,
            }
        };
        vec![
            rec(vec![(0, 5), (4, 1)], true),
            rec(vec![(0, 7), (4, 7)], false),
            rec(vec![(0, 5), (2, 3), (4, 4)], false),
        ]
    }

    #[test]
    fn boundary_key_lists_vertices() {
        let gb = GridBoundary::new(vec![(0, 5), (2, 3), (4, 1)]);
        assert_eq!(boundary_key(&gb), "0:5;2:3;4:1");
    }

    #[test]
    fn frame_has_one_row_per_record() {
        let df = records_frame(records()).unwrap();
        assert_eq!(df.shape(), (3, 3));
    }

    #[test]
    fn csv_round_trip_summarizes_by_kinks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/map.csv");
        write_records(&path, records()).unwrap();
        assert!(path.exists());
        let summary = summarize(&path).unwrap();
        // kink counts 0 and 1
        assert_eq!(summary.height(), 2);
        assert_eq!(summary.width(), 3);
    }

    #[test]
    fn parquet_is_chosen_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.parquet");
        write_records(&path, records()).unwrap();
        let summary = summarize(&path).unwrap();
        assert_eq!(summary.height(), 2);
    }
}

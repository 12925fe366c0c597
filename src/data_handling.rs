//! Data structures for partitioned fund datasets.
//!
//! This module defines `FundDataset` (a numeric feature matrix with per-row
//! fund identity and report date) and `LabeledDataset` (a dataset plus the
//! cluster label column attached by the experiment runner). Partitions arrive
//! pre-split by date from the upstream data pipeline; the loader here reads
//! the delimited hand-off format that pipeline produces.

use anyhow::Context;
use chrono::NaiveDate;
use ndarray::{Array2, Axis};
use std::path::Path;

/// Per-row identity carried alongside the feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FundMetadata {
    /// Fund registration number (CNPJ), one per observation row.
    pub fund_cnpj: Vec<String>,
    /// Reporting date, one per observation row.
    pub report_date: Vec<NaiveDate>,
}

impl FundMetadata {
    pub fn filter_by_indices(&self, indices: &[usize]) -> FundMetadata {
        FundMetadata {
            fund_cnpj: indices.iter().map(|&i| self.fund_cnpj[i].clone()).collect(),
            report_date: indices.iter().map(|&i| self.report_date[i]).collect(),
        }
    }
}

/// One partition of the fund panel: rows are (fund, report date) observations,
/// columns are engineered features plus the interpretable look features.
#[derive(Debug, Clone)]
pub struct FundDataset {
    pub x: Array2<f64>,
    pub feature_names: Vec<String>,
    pub metadata: FundMetadata,
}

impl FundDataset {
    pub fn new(x: Array2<f64>, feature_names: Vec<String>, metadata: FundMetadata) -> Self {
        assert_eq!(
            x.ncols(),
            feature_names.len(),
            "feature name count must match matrix columns"
        );
        assert_eq!(
            x.nrows(),
            metadata.fund_cnpj.len(),
            "metadata rows must match matrix rows"
        );
        FundDataset {
            x,
            feature_names,
            metadata,
        }
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    /// Index of a named feature column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Extract a named column as a plain vector.
    pub fn column(&self, name: &str) -> anyhow::Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .with_context(|| format!("feature '{}' not found in dataset", name))?;
        Ok(self.x.column(idx).to_vec())
    }

    /// Keep only rows where `mask[i]` is true.
    pub fn filter(&self, mask: &[bool]) -> FundDataset {
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| if m { Some(i) } else { None })
            .collect();

        FundDataset {
            x: self.x.select(Axis(0), &selected),
            feature_names: self.feature_names.clone(),
            metadata: self.metadata.filter_by_indices(&selected),
        }
    }

    /// Drop rows containing NaN or infinite values. The upstream pipeline is
    /// expected to have filtered these already; this mirrors its final
    /// `dropna` so nothing non-finite reaches a model.
    pub fn drop_non_finite(&self) -> FundDataset {
        let mask: Vec<bool> = (0..self.nrows())
            .map(|r| self.x.row(r).iter().all(|v| v.is_finite()))
            .collect();
        let dropped = mask.iter().filter(|&&m| !m).count();
        if dropped > 0 {
            log::debug!("Dropping {} rows with non-finite values", dropped);
        }
        self.filter(&mask)
    }

    /// Attach a predicted cluster label column, returning an independent copy.
    pub fn with_labels(&self, labels: Vec<usize>) -> LabeledDataset {
        assert_eq!(
            labels.len(),
            self.nrows(),
            "label count must match dataset rows"
        );
        LabeledDataset {
            data: self.clone(),
            labels,
        }
    }

    /// Load a partition from the delimited file produced by the data pipeline.
    ///
    /// Expects a header with `fund_cnpj` and `report_date` columns; every
    /// other column is parsed as a numeric feature.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<FundDataset> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("failed to open dataset file {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let cnpj_idx = headers
            .iter()
            .position(|h| h == "fund_cnpj")
            .context("missing 'fund_cnpj' column")?;
        let date_idx = headers
            .iter()
            .position(|h| h == "report_date")
            .context("missing 'report_date' column")?;

        let feature_cols: Vec<usize> = (0..headers.len())
            .filter(|&i| i != cnpj_idx && i != date_idx)
            .collect();
        let feature_names: Vec<String> = feature_cols
            .iter()
            .map(|&i| headers[i].to_string())
            .collect();

        let mut fund_cnpj = Vec::new();
        let mut report_date = Vec::new();
        let mut data = Vec::new();
        let mut nrows = 0usize;

        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("bad record at line {}", line + 2))?;
            fund_cnpj.push(record[cnpj_idx].to_string());
            let date = NaiveDate::parse_from_str(&record[date_idx], "%Y-%m-%d")
                .with_context(|| format!("bad report_date at line {}", line + 2))?;
            report_date.push(date);
            for &col in &feature_cols {
                let value: f64 = record[col]
                    .parse()
                    .with_context(|| format!("bad numeric value at line {}", line + 2))?;
                data.push(value);
            }
            nrows += 1;
        }

        let x = Array2::from_shape_vec((nrows, feature_cols.len()), data)
            .context("dataset shape mismatch")?;

        log::info!(
            "Loaded {} rows x {} features from {}",
            nrows,
            feature_names.len(),
            path.display()
        );

        Ok(FundDataset::new(
            x,
            feature_names,
            FundMetadata {
                fund_cnpj,
                report_date,
            },
        ))
    }
}

/// A partition with its predicted cluster labels attached.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub data: FundDataset,
    pub labels: Vec<usize>,
}

impl LabeledDataset {
    /// Number of rows assigned to each label, indexed by label value.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let k = self.labels.iter().copied().max().map_or(0, |m| m + 1);
        let mut sizes = vec![0usize; k];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Distinct labels present, ascending.
    pub fn unique_labels(&self) -> Vec<usize> {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn tiny_dataset() -> FundDataset {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, f64::NAN]];
        FundDataset::new(
            x,
            vec!["return".to_string(), "gross_by_net".to_string()],
            FundMetadata {
                fund_cnpj: vec!["00.000.000/0001-00".into(), "11.111.111/0001-11".into(), "22.222.222/0001-22".into()],
                report_date: vec![
                    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                    NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
                    NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                ],
            },
        )
    }

    #[test]
    fn filter_keeps_metadata_aligned() {
        let ds = tiny_dataset();
        let filtered = ds.filter(&[true, false, true]);
        assert_eq!(filtered.nrows(), 2);
        assert_eq!(filtered.metadata.fund_cnpj[1], "22.222.222/0001-22");
        assert_eq!(filtered.x[[1, 0]], 3.0);
    }

    #[test]
    fn drop_non_finite_removes_nan_rows() {
        let ds = tiny_dataset();
        let clean = ds.drop_non_finite();
        assert_eq!(clean.nrows(), 2);
        assert!(clean.x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn with_labels_copies_and_counts() {
        let ds = tiny_dataset();
        let labeled = ds.with_labels(vec![0, 1, 0]);
        assert_eq!(labeled.cluster_sizes(), vec![2, 1]);
        assert_eq!(labeled.unique_labels(), vec![0, 1]);
        // Original dataset is untouched.
        assert_eq!(ds.nrows(), 3);
    }

    #[test]
    fn column_lookup() {
        let ds = tiny_dataset();
        assert_eq!(ds.column("return").unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(ds.column("sharpe").is_err());
    }
}

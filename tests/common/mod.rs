//! Shared builders for synthetic fund datasets used by the integration tests.

use chrono::NaiveDate;
use fundcluster::data_handling::{FundDataset, FundMetadata};
use ndarray::Array2;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

pub const FEATURE_NAMES: [&str; 4] = ["mean_return", "sharpe", "vol_3m", "gross_by_net"];

/// Two well-separated blobs in 4 dimensions: the first half of the rows sits
/// near the origin, the second half near (10, 10, 10, 10), noise sd 0.5.
pub fn blob_dataset(n_rows: usize, seed: u64) -> FundDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();

    let mut data = Vec::with_capacity(n_rows * FEATURE_NAMES.len());
    let mut fund_cnpj = Vec::with_capacity(n_rows);
    let mut report_date = Vec::with_capacity(n_rows);

    for i in 0..n_rows {
        let center = if i < n_rows / 2 { 0.0 } else { 10.0 };
        for _ in 0..FEATURE_NAMES.len() {
            data.push(center + noise.sample(&mut rng));
        }
        fund_cnpj.push(format!("{:014}", i));
        report_date.push(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }

    let x = Array2::from_shape_vec((n_rows, FEATURE_NAMES.len()), data).unwrap();
    FundDataset::new(
        x,
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        FundMetadata {
            fund_cnpj,
            report_date,
        },
    )
}

/// Every row identical: clustering must collapse to a single label.
pub fn constant_dataset(n_rows: usize) -> FundDataset {
    let x = Array2::from_elem((n_rows, FEATURE_NAMES.len()), 1.5);
    FundDataset::new(
        x,
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        FundMetadata {
            fund_cnpj: (0..n_rows).map(|i| format!("{:014}", i)).collect(),
            report_date: vec![NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(); n_rows],
        },
    )
}

pub fn look_features() -> Vec<String> {
    vec!["mean_return".to_string(), "sharpe".to_string()]
}

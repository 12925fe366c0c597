//! Integration tests for the dataset loader: the delimited hand-off format
//! produced by the upstream data pipeline.

use chrono::NaiveDate;
use fundcluster::data_handling::FundDataset;
use std::io::Write;
use std::path::PathBuf;

fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("fundcluster_loader_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn loads_features_and_metadata_aligned() {
    let path = write_fixture(
        "partition.csv",
        "fund_cnpj,report_date,mean_return,sharpe\n\
         00000000000100,2025-01-31,0.012,1.1\n\
         00000000000200,2025-02-28,-0.003,0.4\n\
         00000000000300,2025-03-31,0.020,1.8\n",
    );

    let ds = FundDataset::from_csv(&path).unwrap();
    assert_eq!(ds.nrows(), 3);
    assert_eq!(ds.ncols(), 2);
    assert_eq!(ds.feature_names, vec!["mean_return", "sharpe"]);
    assert_eq!(ds.x[[1, 0]], -0.003);
    assert_eq!(ds.x[[2, 1]], 1.8);
    assert_eq!(ds.metadata.fund_cnpj[0], "00000000000100");
    assert_eq!(
        ds.metadata.report_date[2],
        NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
    );

    std::fs::remove_file(&path).ok();
}

#[test]
fn identity_columns_can_appear_anywhere_in_the_header() {
    let path = write_fixture(
        "shuffled_header.csv",
        "vol_3m,fund_cnpj,gross_by_net,report_date\n\
         0.05,00000000000100,1.2,2025-06-30\n",
    );

    let ds = FundDataset::from_csv(&path).unwrap();
    assert_eq!(ds.feature_names, vec!["vol_3m", "gross_by_net"]);
    assert_eq!(ds.x[[0, 0]], 0.05);
    assert_eq!(ds.x[[0, 1]], 1.2);

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_identity_column_is_an_error() {
    let path = write_fixture(
        "no_cnpj.csv",
        "report_date,mean_return\n2025-01-31,0.01\n",
    );

    let err = FundDataset::from_csv(&path).unwrap_err();
    assert!(err.to_string().contains("fund_cnpj"), "{}", err);

    std::fs::remove_file(&path).ok();
}

#[test]
fn malformed_rows_report_their_line() {
    let bad_date = write_fixture(
        "bad_date.csv",
        "fund_cnpj,report_date,mean_return\n\
         00000000000100,2025-01-31,0.01\n\
         00000000000200,31/02/2025,0.02\n",
    );
    let err = FundDataset::from_csv(&bad_date).unwrap_err();
    assert!(err.to_string().contains("line 3"), "{}", err);

    let bad_number = write_fixture(
        "bad_number.csv",
        "fund_cnpj,report_date,mean_return\n\
         00000000000100,2025-01-31,not_a_number\n",
    );
    let err = FundDataset::from_csv(&bad_number).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{}", err);

    std::fs::remove_file(&bad_date).ok();
    std::fs::remove_file(&bad_number).ok();
}

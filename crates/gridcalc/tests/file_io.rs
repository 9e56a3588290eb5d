//! Tests for opening and saving workbooks

use gridcalc::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn test_csv_open_calculate_save() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.csv");
    std::fs::write(&input, "1,2,=A1+B1\n3,4,=SUM(A1:B2)\n").unwrap();

    let mut workbook = Workbook::open(&input).unwrap();
    let stats = workbook.calculate().unwrap();
    assert_eq!(stats.cells_calculated, 2);

    let output = dir.path().join("output.csv");
    workbook.save(&output).unwrap();
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "1,2,3\n3,4,10\n");
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("book.ods");
    assert!(Workbook::open(&path).is_err());
    assert!(Workbook::new().save(&path).is_err());
}

//! Tests for incremental recalculation after edits

use chrono::NaiveDate;
use gridcalc::prelude::*;
use gridcalc::CalculationOptions;
use pretty_assertions::assert_eq;

fn value_at(workbook: &Workbook, address: &str) -> CellValue {
    let addr = CellAddress::parse(address).unwrap();
    workbook
        .worksheet(0)
        .unwrap()
        .get_calculated_value_at(addr.row, addr.col)
        .cloned()
        .unwrap_or_default()
}

fn key(address: &str) -> CellKey {
    let addr = CellAddress::parse(address).unwrap();
    CellKey::new(0, addr.row, addr.col)
}

fn chain() -> Workbook {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 1.0).unwrap();
    sheet.set_cell_formula("B1", "=A1*2").unwrap();
    sheet.set_cell_formula("C1", "=B1+1").unwrap();
    sheet.set_cell_formula("D1", "=50*2").unwrap();
    sheet.set_cell_formula("E1", "=SUM(A1:A3)").unwrap();
    workbook
}

#[test]
fn test_edit_recalculates_only_dependents() {
    let mut workbook = chain();
    let mut calculator = Calculator::new();
    let stats = calculator.calculate_all(&mut workbook).unwrap();
    assert_eq!(stats.cells_calculated, 4);
    assert_eq!(value_at(&workbook, "C1"), CellValue::Number(3.0));

    workbook.worksheet_mut(0).unwrap().set_cell_value("A1", 5.0).unwrap();
    let stats = calculator
        .on_mutation(&mut workbook, Mutation::CellChanged(key("A1")))
        .unwrap();

    assert_eq!(stats.cells_calculated, 3);
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(10.0));
    assert_eq!(value_at(&workbook, "C1"), CellValue::Number(11.0));
    assert_eq!(value_at(&workbook, "D1"), CellValue::Number(100.0));
    assert_eq!(value_at(&workbook, "E1"), CellValue::Number(5.0));
}

#[test]
fn test_edits_inside_ranges_reach_range_readers() {
    let mut workbook = chain();
    let mut calculator = Calculator::new();
    calculator.calculate_all(&mut workbook).unwrap();

    workbook.worksheet_mut(0).unwrap().set_cell_value("A3", 7.0).unwrap();
    let stats = calculator
        .on_mutation(&mut workbook, Mutation::CellChanged(key("A3")))
        .unwrap();

    assert_eq!(stats.cells_calculated, 1);
    assert_eq!(value_at(&workbook, "E1"), CellValue::Number(8.0));
}

#[test]
fn test_formula_edit_rebuilds_dependencies() {
    let mut workbook = chain();
    let mut calculator = Calculator::new();
    calculator.calculate_all(&mut workbook).unwrap();

    workbook
        .worksheet_mut(0)
        .unwrap()
        .set_cell_formula("B1", "=D1/4")
        .unwrap();
    calculator
        .on_mutation(&mut workbook, Mutation::FormulaChanged(key("B1")))
        .unwrap();
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(25.0));
    assert_eq!(value_at(&workbook, "C1"), CellValue::Number(26.0));

    // B1 no longer reads A1
    workbook.worksheet_mut(0).unwrap().set_cell_value("A1", 9.0).unwrap();
    let stats = calculator
        .on_mutation(&mut workbook, Mutation::CellChanged(key("A1")))
        .unwrap();
    assert_eq!(stats.cells_calculated, 1);
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(25.0));
}

#[test]
fn test_clearing_a_cell() {
    let mut workbook = chain();
    let mut calculator = Calculator::new();
    calculator.calculate_all(&mut workbook).unwrap();

    workbook.worksheet_mut(0).unwrap().clear_cell("A1").unwrap();
    calculator
        .on_mutation(&mut workbook, Mutation::CellCleared(key("A1")))
        .unwrap();
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(0.0));
    assert_eq!(value_at(&workbook, "C1"), CellValue::Number(1.0));
}

#[test]
fn test_edit_that_closes_a_cycle() {
    let mut workbook = chain();
    let mut calculator = Calculator::new();
    calculator.calculate_all(&mut workbook).unwrap();

    workbook
        .worksheet_mut(0)
        .unwrap()
        .set_cell_formula("A1", "=C1")
        .unwrap();
    let stats = calculator
        .on_mutation(&mut workbook, Mutation::FormulaChanged(key("A1")))
        .unwrap();
    assert_eq!(stats.circular_references, 3);
    assert_eq!(value_at(&workbook, "A1"), CellValue::Error(CellError::Ref));
    assert_eq!(value_at(&workbook, "C1"), CellValue::Error(CellError::Ref));
    assert_eq!(value_at(&workbook, "D1"), CellValue::Number(100.0));
}

#[test]
fn test_volatile_cells_run_on_every_pass() {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=TODAY()").unwrap();
    sheet.set_cell_formula("B1", "=A1+1").unwrap();
    sheet.set_cell_formula("C1", "=2*2").unwrap();

    let now = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let options = CalculationOptions {
        now: Some(now),
        ..Default::default()
    };
    let mut calculator = Calculator::with_options(options);
    calculator.calculate_all(&mut workbook).unwrap();
    assert_eq!(value_at(&workbook, "A1"), CellValue::Number(45292.0));
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(45293.0));

    workbook.worksheet_mut(0).unwrap().set_cell_value("Z9", 1.0).unwrap();
    let stats = calculator
        .on_mutation(&mut workbook, Mutation::CellChanged(key("Z9")))
        .unwrap();
    assert_eq!(stats.volatile_cells, 1);
    assert_eq!(stats.cells_calculated, 2);
}

#[test]
fn test_new_formulas_without_results_are_picked_up() {
    let mut workbook = chain();
    let mut calculator = Calculator::new();
    calculator.calculate_all(&mut workbook).unwrap();

    workbook
        .worksheet_mut(0)
        .unwrap()
        .set_cell_formula("F1", "=C1*10")
        .unwrap();
    workbook.worksheet_mut(0).unwrap().set_cell_value("A2", 1.0).unwrap();
    calculator
        .on_mutation(&mut workbook, Mutation::SheetRecalculated(0))
        .unwrap();
    assert_eq!(value_at(&workbook, "F1"), CellValue::Number(30.0));
    assert_eq!(value_at(&workbook, "E1"), CellValue::Number(2.0));
}

#[test]
fn test_trusting_stored_results() {
    let mut workbook = chain();
    workbook.calculate().unwrap();

    // A stale stored result is kept when nothing marks it dirty
    workbook
        .worksheet_mut(0)
        .unwrap()
        .set_formula_result(0, 1, CellValue::Number(-1.0))
        .unwrap();
    let options = CalculationOptions {
        force_full_calculation: false,
        ..Default::default()
    };
    let stats = workbook.calculate_with_options(&options).unwrap();
    assert_eq!(stats.cells_calculated, 0);
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(-1.0));

    workbook.calculate().unwrap();
    assert_eq!(value_at(&workbook, "B1"), CellValue::Number(2.0));
}

//! Runs the gridcalc binary end to end

use pretty_assertions::assert_eq;
use std::process::Command;
use tempfile::tempdir;

fn gridcalc(args: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_gridcalc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    (output.status.success(), String::from_utf8(output.stdout).unwrap())
}

#[test]
fn test_eval() {
    assert_eq!(gridcalc(&["eval", "=1+2*3"]), (true, "7\n".to_string()));
    assert_eq!(gridcalc(&["eval", "=FOOBAR(1)"]), (true, "#NAME?\n".to_string()));
    assert!(!gridcalc(&["eval", "=1+(2"]).0);
}

#[test]
fn test_eval_against_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("data.csv");
    std::fs::write(&input, "1,2\n3,=A2*2\n").unwrap();
    let path = input.to_str().unwrap();

    assert_eq!(
        gridcalc(&["eval", "=SUM(A1:B2)", "--csv", path]),
        (true, "12\n".to_string())
    );
    assert_eq!(
        gridcalc(&["eval", "=@1:1", "--csv", path, "--cell", "B5"]),
        (true, "2\n".to_string())
    );
}

#[test]
fn test_calc() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "2,=A1^3\n").unwrap();

    let (ok, stdout) = gridcalc(&["calc", input.to_str().unwrap()]);
    assert!(ok);
    assert_eq!(stdout, "2,8\n");

    let (ok, _) = gridcalc(&["calc", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
    assert!(ok);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "2,8\n");
}

#[test]
fn test_ast_json() {
    let (ok, stdout) = gridcalc(&["ast", "=SUM(A1,2)", "--json"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["kind"], "root");
    assert_eq!(json["children"][0]["name"], "SUM");
    assert_eq!(json["children"][0]["children"][0]["target"], "cell");
}

#[test]
fn test_functions_lists_registry() {
    let (ok, stdout) = gridcalc(&["functions"]);
    assert!(ok);
    assert!(stdout.lines().any(|l| l.starts_with("SUM\t")));
    assert!(stdout.lines().any(|l| l.starts_with("NOW\t") && l.ends_with("volatile")));
}

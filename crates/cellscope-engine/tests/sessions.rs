use cellscope_engine::{
    Analyzer, CellValue, Complexity, EngineError, MemoryWorkbook,
};

fn workbook(tag: i64) -> MemoryWorkbook {
    let mut wb = MemoryWorkbook::new();
    wb.set_value("Sheet1", "A1", CellValue::Int(tag));
    wb.set_formula("Sheet1", "B1", "=A1*2", CellValue::Int(tag * 2));
    wb
}

#[test]
fn sessions_are_isolated() {
    let analyzer = Analyzer::new();
    let first = analyzer.open_session(workbook(1)).unwrap();
    let second = analyzer.open_session(workbook(100)).unwrap();
    assert_ne!(first, second);

    let a = analyzer.drill_down(first, "Sheet1", "B1").unwrap();
    let b = analyzer.drill_down(second, "Sheet1", "B1").unwrap();
    assert_eq!(a.dependencies[0].value, Some(1.0));
    assert_eq!(b.dependencies[0].value, Some(100.0));
}

#[test]
fn closed_sessions_reject_further_work() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(workbook(1)).unwrap();
    analyzer.close_session(session).unwrap();
    assert!(matches!(
        analyzer.drill_down(session, "Sheet1", "B1"),
        Err(EngineError::SessionNotFound)
    ));
    assert!(matches!(
        analyzer.sheet_names(session),
        Err(EngineError::SessionNotFound)
    ));
}

#[test]
fn sheet_names_come_from_the_open_cache() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(workbook(1)).unwrap();
    assert_eq!(analyzer.sheet_names(session).unwrap(), ["Sheet1"]);
    let meta = analyzer.session_meta(session).unwrap();
    assert_eq!(meta.id, session);
}

#[test]
fn parallel_sessions_run_concurrently() {
    let analyzer = Analyzer::new();
    let first = analyzer.open_session(workbook(1)).unwrap();
    let second = analyzer.open_session(workbook(2)).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let a = analyzer.drill_down(first, "Sheet1", "B1").unwrap();
                    assert_eq!(a.dependencies[0].value, Some(1.0));
                }
            });
            scope.spawn(|| {
                for _ in 0..50 {
                    let b = analyzer.drill_down(second, "Sheet1", "B1").unwrap();
                    assert_eq!(b.dependencies[0].value, Some(2.0));
                }
            });
        }
    });
}

#[test]
fn inspect_reports_complexity_and_flags() {
    let mut wb = workbook(1);
    wb.set_formula(
        "Sheet1",
        "C1",
        "=VLOOKUP(A1,[Ext.xlsx]Data!A1:B9,2)",
        CellValue::Int(0),
    );
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(wb).unwrap();

    let constant = analyzer.inspect(session, "Sheet1", "A1").unwrap();
    assert_eq!(constant.complexity, Complexity::Simple);
    assert!(!constant.can_drill_down);
    assert_eq!(constant.value, Some(1.0));
    assert!(constant.formula.is_none());

    let simple = analyzer.inspect(session, "Sheet1", "B1").unwrap();
    assert!(simple.can_drill_down);
    assert_eq!(simple.formula.as_deref(), Some("=A1*2"));

    let external = analyzer.inspect(session, "Sheet1", "C1").unwrap();
    assert!(external.has_external_refs);
    assert!(!external.can_drill_down, "external refs block drill-down");

    // Absent cell: no data, not an error.
    let absent = analyzer.inspect(session, "Sheet1", "Z99").unwrap();
    assert!(absent.value.is_none());
    assert!(absent.formula.is_none());

    // Lowercase addresses are accepted.
    let lower = analyzer.inspect(session, "Sheet1", "b1").unwrap();
    assert_eq!(lower.address, "B1");
}

#[test]
fn responses_serialize_for_the_transport_layer() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(workbook(1)).unwrap();
    let result = analyzer.drill_down(session, "Sheet1", "B1").unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["source_cell"], "Sheet1!B1");
    assert_eq!(json["source_value"], 2.0);
    let dep = &json["dependencies"][0];
    assert_eq!(dep["cell_reference"], "Sheet1!A1");
    assert!(dep["path_id"].is_string(), "path ids must survive JSON");
    assert_eq!(dep["name"]["source"], "fallback");
    assert!(dep.get("marker").is_none(), "no marker for plain nodes");
}

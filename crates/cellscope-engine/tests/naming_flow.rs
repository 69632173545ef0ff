use cellscope_engine::{
    AiStatus, Analyzer, CellValue, EngineError, MemoryWorkbook, NameMode, NameSource,
};

/// Ten formula inputs in column B, labels in column A, plus a total that
/// reads all ten.
fn labeled_workbook() -> MemoryWorkbook {
    let mut wb = MemoryWorkbook::new();
    for row in 1..=10 {
        wb.set_value(
            "Sheet1",
            &format!("A{row}"),
            CellValue::Text(format!("Line {row}")),
        );
        wb.set_value("Sheet1", &format!("B{row}"), CellValue::Int(row as i64));
    }
    wb.set_formula("Sheet1", "C1", "=SUM(B1:B10)", CellValue::Int(55));
    wb
}

#[test]
fn configuration_propagates_to_already_visible_cells() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();

    // Ten cells become visible before any naming configuration exists.
    let result = analyzer.drill_down(session, "Sheet1", "C1").unwrap();
    assert_eq!(result.dependencies.len(), 10);
    for node in &result.dependencies {
        assert_eq!(node.name.source, NameSource::Fallback);
    }
    let refs: Vec<String> = result
        .dependencies
        .iter()
        .map(|n| n.cell_reference.clone())
        .collect();

    // One configuration call, no re-expansion.
    analyzer
        .configure_sheet_label_column(session, "Sheet1", "A")
        .unwrap();

    let resolved = analyzer
        .resolve_names(session, &refs, NameMode::Component)
        .unwrap();
    assert_eq!(resolved.len(), 10);
    for (reference, name) in &resolved {
        assert_eq!(
            name.source,
            NameSource::Component,
            "{reference} still reports {:?}",
            name.source
        );
        assert!(name.name.starts_with("Line "), "{reference} → {}", name.name);
    }
}

#[test]
fn manual_name_wins_in_both_modes() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();

    analyzer
        .configure_sheet_label_column(session, "Sheet1", "A")
        .unwrap();
    analyzer
        .set_context_text(session, "Sheet1", "B3", "Budget")
        .unwrap();
    analyzer
        .record_ai_suggestion(session, "Sheet1!B3", "AI Label", 0.95, AiStatus::Success)
        .unwrap();
    analyzer
        .set_manual_name(session, "Sheet1", "B3", "Headcount")
        .unwrap();

    let reference = vec!["Sheet1!B3".to_string()];
    let component = analyzer
        .resolve_names(session, &reference, NameMode::Component)
        .unwrap();
    assert_eq!(component["Sheet1!B3"].name, "Headcount");
    assert_eq!(component["Sheet1!B3"].source, NameSource::Manual);

    let generated = analyzer
        .resolve_names(session, &reference, NameMode::Generated)
        .unwrap();
    assert_eq!(generated["Sheet1!B3"].name, "Headcount");
    assert_eq!(generated["Sheet1!B3"].source, NameSource::ManualEdit);
}

#[test]
fn generated_mode_uses_ai_then_component_then_fallback() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    let reference = vec!["Sheet1!B2".to_string()];

    // Nothing configured: raw reference.
    let resolved = analyzer
        .resolve_names(session, &reference, NameMode::Generated)
        .unwrap();
    assert_eq!(resolved["Sheet1!B2"].source, NameSource::Fallback);

    // Component data exists: component-fallback.
    analyzer
        .configure_sheet_label_column(session, "Sheet1", "A")
        .unwrap();
    let resolved = analyzer
        .resolve_names(session, &reference, NameMode::Generated)
        .unwrap();
    assert_eq!(resolved["Sheet1!B2"].source, NameSource::ComponentFallback);
    assert_eq!(resolved["Sheet1!B2"].name, "Line 2");

    // Successful AI suggestion outranks it.
    analyzer
        .record_ai_suggestion(session, "Sheet1!B2", "Units Sold", 0.8, AiStatus::Success)
        .unwrap();
    let resolved = analyzer
        .resolve_names(session, &reference, NameMode::Generated)
        .unwrap();
    assert_eq!(resolved["Sheet1!B2"].source, NameSource::Ai);
    assert_eq!(resolved["Sheet1!B2"].confidence, Some(0.8));

    // A failed suggestion is data, not an error, and falls through.
    analyzer
        .record_ai_suggestion(session, "Sheet1!B2", "junk", 0.1, AiStatus::Failed)
        .unwrap();
    let resolved = analyzer
        .resolve_names(session, &reference, NameMode::Generated)
        .unwrap();
    assert_eq!(resolved["Sheet1!B2"].source, NameSource::ComponentFallback);
}

#[test]
fn node_views_carry_resolved_names() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    analyzer
        .configure_sheet_label_column(session, "Sheet1", "A")
        .unwrap();

    let result = analyzer.drill_down(session, "Sheet1", "C1").unwrap();
    let b1 = &result.dependencies[0];
    assert_eq!(b1.name.name, "Line 1");
    assert_eq!(b1.name.source, NameSource::ComponentFallback);
}

#[test]
fn invalid_configuration_is_rejected_without_state_change() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    analyzer
        .configure_sheet_label_column(session, "Sheet1", "A")
        .unwrap();

    // Column ZZ is far outside the used area; "7" is not a column at all.
    assert!(matches!(
        analyzer.configure_sheet_label_column(session, "Sheet1", "ZZ"),
        Err(EngineError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        analyzer.configure_sheet_label_column(session, "Sheet1", "7"),
        Err(EngineError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        analyzer.configure_sheet_label_row(session, "Sheet1", 99),
        Err(EngineError::InvalidConfiguration(_))
    ));

    let config = analyzer.naming_config(session).unwrap();
    assert_eq!(config["Sheet1"].label_column, Some(1), "prior config intact");
    assert_eq!(config["Sheet1"].label_row, None);
}

#[test]
fn label_row_supplies_column_labels() {
    let mut wb = MemoryWorkbook::new();
    wb.set_value("Sheet1", "B1", CellValue::Text("FY2024".into()));
    wb.set_value("Sheet1", "B5", CellValue::Int(9));
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(wb).unwrap();
    analyzer
        .configure_sheet_label_row(session, "Sheet1", 1)
        .unwrap();

    let resolved = analyzer
        .resolve_names(session, &["Sheet1!B5".to_string()], NameMode::Component)
        .unwrap();
    assert_eq!(resolved["Sheet1!B5"].name, "FY2024");
    assert_eq!(resolved["Sheet1!B5"].components, ["FY2024"]);
}

#[test]
fn unparseable_reference_strings_resolve_to_themselves() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    let refs = vec!["not a ref".to_string(), "Sheet1!A1:B2".to_string()];
    let resolved = analyzer
        .resolve_names(session, &refs, NameMode::Component)
        .unwrap();
    for raw in &refs {
        assert_eq!(resolved[raw].name, *raw);
        assert_eq!(resolved[raw].source, NameSource::Fallback);
    }
}

#[test]
fn ai_processed_cells_lists_suggestions_and_manual_edits() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    analyzer
        .record_ai_suggestion(session, "Sheet1!B1", "One", 0.9, AiStatus::Success)
        .unwrap();
    analyzer
        .set_manual_name(session, "Sheet1", "B4", "Four")
        .unwrap();

    let processed = analyzer.ai_processed_cells(session, "Sheet1").unwrap();
    assert_eq!(processed, ["Sheet1!B1", "Sheet1!B4"]);

    // A bare (unqualified) reference cannot be attributed to a sheet.
    assert!(matches!(
        analyzer.record_ai_suggestion(session, "B9", "x", 0.5, AiStatus::Success),
        Err(EngineError::InvalidAddress { .. })
    ));
}

#[test]
fn row_values_lists_populated_cells_with_columns() {
    let mut wb = MemoryWorkbook::new();
    wb.set_value("Sheet1", "A2", CellValue::Text("Revenue".into()));
    wb.set_value("Sheet1", "C2", CellValue::Int(1200));
    wb.set_value("Sheet1", "D9", CellValue::Int(1));
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(wb).unwrap();

    let values = analyzer.row_values(session, "Sheet1", 2).unwrap();
    let pairs: Vec<(&str, &str)> = values
        .iter()
        .map(|v| (v.column.as_str(), v.value.as_str()))
        .collect();
    assert_eq!(pairs, [("A", "Revenue"), ("C", "1200")]);

    assert!(analyzer.row_values(session, "Sheet1", 100).unwrap().is_empty());
}

#[test]
fn overrides_require_an_existing_cell() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    assert!(matches!(
        analyzer.set_manual_name(session, "Sheet1", "Q99", "ghost"),
        Err(EngineError::CellNotFound { .. })
    ));
    assert!(matches!(
        analyzer.set_context_text(session, "Sheet1", "Q99", "ghost"),
        Err(EngineError::CellNotFound { .. })
    ));
}

#[test]
fn context_text_is_scoped_to_one_cell() {
    let analyzer = Analyzer::new();
    let session = analyzer.open_session(labeled_workbook()).unwrap();
    analyzer
        .configure_sheet_label_column(session, "Sheet1", "A")
        .unwrap();
    analyzer
        .set_context_text(session, "Sheet1", "B1", "Actuals")
        .unwrap();

    let refs = vec!["Sheet1!B1".to_string(), "Sheet1!B2".to_string()];
    let resolved = analyzer
        .resolve_names(session, &refs, NameMode::Component)
        .unwrap();
    assert_eq!(resolved["Sheet1!B1"].name, "Actuals Line 1");
    assert_eq!(resolved["Sheet1!B2"].name, "Line 2", "sibling untouched");
}

//! End-to-end pipeline runs against scripted completions and an in-memory backend.

use crate::integration::test_utils::{
    order_formulas, order_structure, pipeline, FailPoint, MockBackend, MockCompletionClient,
    DEFAULT_TAB_ID, DEFAULT_TAB_TITLE,
};
use flowsheet::docs::project::{
    COMPLETE_SCHEMA_FILE, FAILURE_FILE, FORMULA_PLAN_FILE, METADATA_FILE, README_FILE,
    SCHEMAS_DIR, STRUCTURE_FILE,
};
use flowsheet::docs::ProjectStatus;
use flowsheet::error::{ErrorKind, ProviderError};
use flowsheet::pipeline::{CancelSignal, Stage};
use flowsheet::schema::{validate_value, FormulaDefinition, FormulaPlan};
use flowsheet::sheets::{Materializer, MaterializerSettings, SpreadsheetBackend, ValueInput};
use flowsheet::telemetry::{EventBus, EventLevel, EventSubscriber, PipelineEvent};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn stage_sequence(events: &[PipelineEvent]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();
    for event in events {
        if stages.last() != Some(&event.stage) {
            stages.push(event.stage);
        }
    }
    stages
}

#[tokio::test]
async fn test_full_run_materializes_and_documents() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::new();
    let pipeline = pipeline(client.clone(), backend.clone(), temp.path());

    let mut events = EventSubscriber::for_request(pipeline.events(), "wf-happy");
    let result = pipeline
        .run_with_id("wf-happy".to_string(), "Order tracking for a bakery", &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(result.request_id, "wf-happy");
    assert_eq!(result.structure.system_name, "Order Desk");
    assert_eq!(result.formula_plan.formulas.len(), 1);
    assert_eq!(result.rejected_formulas.len(), 1);
    assert_eq!(result.rejected_formulas[0].column, "tax");
    assert_eq!(client.calls(), 2);

    // Spreadsheet shape
    assert_eq!(backend.created.lock().as_slice(), ["Order Desk".to_string()]);
    assert_eq!(
        backend.renamed_sheets.lock().as_slice(),
        [(DEFAULT_TAB_ID, "Customers".to_string(), 1000, 8)]
    );
    assert_eq!(
        backend.added_sheets.lock().as_slice(),
        [("Orders".to_string(), 1000, 11)]
    );
    assert_eq!(backend.tab_titles("mock-sheet-1"), vec!["Customers", "Orders"]);

    let writes = backend.writes.lock().clone();
    let orders_header = writes
        .iter()
        .find(|w| w.range == "'Orders'!A1:F1")
        .expect("orders header written");
    assert_eq!(orders_header.input, ValueInput::Raw);
    assert_eq!(
        orders_header.values,
        vec![vec![
            "order_id".to_string(),
            "customer_id".to_string(),
            "quantity".to_string(),
            "unit_price".to_string(),
            "total".to_string(),
            "status".to_string(),
        ]]
    );

    let formula = writes
        .iter()
        .find(|w| w.input == ValueInput::UserEntered)
        .expect("formula written");
    assert_eq!(formula.range, "'Orders'!E2:E11");
    assert_eq!(formula.values.len(), 10);
    assert_eq!(formula.values[0], vec!["=IFERROR(C2*D2, 0)".to_string()]);
    assert_eq!(formula.values[9], vec!["=IFERROR(C11*D11, 0)".to_string()]);

    // Artifacts
    let dir = result.project_dir.clone().expect("project dir");
    assert!(dir.starts_with(temp.path()));
    for file in [STRUCTURE_FILE, FORMULA_PLAN_FILE, COMPLETE_SCHEMA_FILE] {
        assert!(dir.join(SCHEMAS_DIR).join(file).is_file(), "missing {}", file);
    }
    assert!(dir.join(METADATA_FILE).is_file());
    assert!(dir.join(README_FILE).is_file());
    assert!(!dir.join(FAILURE_FILE).exists());

    let spreadsheet = result.spreadsheet.clone().unwrap();
    assert_eq!(spreadsheet.id, "mock-sheet-1");

    // Events
    let events = events.drain();
    assert_eq!(
        stage_sequence(&events),
        vec![
            Stage::Init,
            Stage::Structure,
            Stage::Formula,
            Stage::Sheets,
            Stage::Docs,
            Stage::Complete
        ]
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    let last = events.last().unwrap();
    assert_eq!(last.stage, Stage::Complete);
    assert_eq!(
        last.data.as_ref().unwrap()["spreadsheet_url"],
        json!(spreadsheet.url)
    );
    assert!(events
        .iter()
        .any(|e| e.stage == Stage::Formula && e.level == EventLevel::Warn && e.message.contains("tax")));
}

#[tokio::test]
async fn test_schema_violation_stops_before_backend() {
    let temp = TempDir::new().unwrap();
    let duplicate_sheets = json!({
        "system_name": "Broken",
        "sheets": [
            {"name": "Items", "columns": ["id"]},
            {"name": "items", "columns": ["id"]}
        ]
    });
    let client = MockCompletionClient::scripted(duplicate_sheets, json!({"formulas": []}));
    let backend = MockBackend::new();
    let pipeline = pipeline(client.clone(), backend.clone(), temp.path());

    let mut events = EventSubscriber::for_request(pipeline.events(), "wf-schema");
    let failure = pipeline
        .run_with_id("wf-schema".to_string(), "Inventory", &CancelSignal::new())
        .await
        .unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Structure);
    assert_eq!(failure.error.kind(), ErrorKind::Schema);
    assert!(failure.failure_record.is_none());
    assert_eq!(client.calls(), 1);
    assert_eq!(backend.calls(), 0);
    assert!(pipeline.projects().list().unwrap().is_empty());

    let events = events.drain();
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].stage, Stage::Error);
    assert_eq!(terminal[0].error_kind, Some(ErrorKind::Schema));
    assert_eq!(terminal[0].data.as_ref().unwrap()["failed_stage"], json!("structure"));
}

#[tokio::test]
async fn test_partial_spreadsheet_leaves_failure_record() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::failing(FailPoint::Write("'Orders'!E".to_string()));
    let pipeline = pipeline(client, backend, temp.path());

    let failure = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Sheets);
    assert_eq!(failure.error.kind(), ErrorKind::Materialization);
    assert_eq!(failure.error.partial_spreadsheet_id(), Some("mock-sheet-1"));
    assert_eq!(
        failure.spreadsheet.as_ref().map(|s| s.id.as_str()),
        Some("mock-sheet-1")
    );
    let record_path = failure.failure_record.clone().expect("failure record");
    assert!(record_path.ends_with(FAILURE_FILE));
    assert!(record_path.is_file());

    let projects = pipeline.projects().list().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].status, ProjectStatus::Failed);
    assert_eq!(projects[0].system_name, "Order Desk");

    let record = pipeline.projects().load_failure(&projects[0].id).unwrap();
    assert_eq!(record.failed_stage, Stage::Sheets);
    assert_eq!(record.error_kind, "materialization");
    assert_eq!(
        record.spreadsheet.map(|s| s.id),
        Some("mock-sheet-1".to_string())
    );
}

#[tokio::test]
async fn test_backend_auth_failure_persists_nothing() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::failing(FailPoint::Authenticate);
    let pipeline = pipeline(client, backend.clone(), temp.path());

    let failure = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Sheets);
    assert_eq!(failure.error.kind(), ErrorKind::Auth);
    assert!(failure.failure_record.is_none());
    assert!(backend.created.lock().is_empty());
    assert!(pipeline.projects().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_header_formatting_failure_is_a_warning() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::failing(FailPoint::FormatHeader);
    let pipeline = pipeline(client, backend, temp.path());

    let result = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(result.warnings.len(), 2);
    assert!(result.warnings[0].contains("Customers"));
    assert!(result.project_dir.is_some());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::new();
    let pipeline = pipeline(client.clone(), backend.clone(), temp.path());

    let cancel = CancelSignal::new();
    cancel.cancel();
    let failure = pipeline.run("Order tracking", &cancel).await.unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Init);
    assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
    assert_eq!(client.calls(), 0);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_formula_generation() {
    let temp = TempDir::new().unwrap();
    let cancel = CancelSignal::new();
    let trigger = cancel.clone();
    let structure = order_structure();
    let client = MockCompletionClient::with_handler(move |messages| {
        if crate::integration::test_utils::is_formula_request(messages) {
            trigger.cancel();
            Ok(order_formulas().to_string())
        } else {
            Ok(structure.to_string())
        }
    });
    let backend = MockBackend::new();
    let pipeline = pipeline(client.clone(), backend.clone(), temp.path());

    let failure = pipeline.run("Order tracking", &cancel).await.unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Formula);
    assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
    assert_eq!(client.calls(), 2);
    assert_eq!(backend.calls(), 0);
    assert!(pipeline.projects().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_never_touches_backend() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::new();
    let pipeline = pipeline(client, backend.clone(), temp.path());

    let plan = pipeline
        .plan("Order tracking", &CancelSignal::new())
        .await
        .unwrap();

    assert_eq!(plan.structure.sheets.len(), 2);
    assert_eq!(plan.formula_plan.formulas.len(), 1);
    assert_eq!(plan.rejected_formulas.len(), 1);
    assert_eq!(backend.calls(), 0);
    assert!(pipeline.projects().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_transient_provider_error_is_retried() {
    let temp = TempDir::new().unwrap();
    let attempts = Arc::new(AtomicU32::new(0));
    let seen = attempts.clone();
    let client = MockCompletionClient::with_handler(move |messages| {
        if crate::integration::test_utils::is_formula_request(messages) {
            return Ok(json!({"formulas": []}).to_string());
        }
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ProviderError::RateLimited("slow down".to_string()))
        } else {
            Ok(order_structure().to_string())
        }
    });
    let backend = MockBackend::new();
    let pipeline = pipeline(client.clone(), backend, temp.path());

    let mut events = EventSubscriber::for_request(pipeline.events(), "wf-retry");
    let result = pipeline
        .run_with_id("wf-retry".to_string(), "Order tracking", &CancelSignal::new())
        .await
        .unwrap();

    assert!(result.formula_plan.is_empty());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(client.calls(), 3);
    let retries: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| e.stage == Stage::Structure && e.level == EventLevel::Warn)
        .collect();
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0].data.as_ref().unwrap()["attempt"], json!(1));
}

#[tokio::test]
async fn test_non_transient_provider_error_fails_once() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::with_handler(|_| {
        Err(ProviderError::Auth("bad key".to_string()))
    });
    let backend = MockBackend::new();
    let pipeline = pipeline(client.clone(), backend, temp.path());

    let failure = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Structure);
    assert_eq!(failure.error.kind(), ErrorKind::Auth);
    assert_eq!(client.calls(), 1);
}

fn total_formula(start_row: u64) -> serde_json::Value {
    json!({
        "formulas": [{
            "sheet": "Orders",
            "column": "total",
            "expression": "=IFERROR(quantity*unit_price, 0)",
            "dependencies": ["quantity", "unit_price"],
            "start_row": start_row,
            "auto_fill": true
        }]
    })
}

#[tokio::test]
async fn test_fill_range_is_clamped_to_grid() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), total_formula(995));
    let backend = MockBackend::new();
    let pipeline = pipeline(client, backend.clone(), temp.path());

    let result = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap();

    let writes = backend.writes.lock().clone();
    let formula = writes
        .iter()
        .find(|w| w.input == ValueInput::UserEntered)
        .expect("formula written");
    assert_eq!(formula.range, "'Orders'!E995:E1000");
    assert_eq!(formula.values.len(), 6);
    assert_eq!(formula.values[0], vec!["=IFERROR(C995*D995, 0)".to_string()]);
    let orders = result.sheet_stats.iter().find(|s| s.name == "Orders").unwrap();
    assert_eq!(orders.rows, 1000);
}

#[tokio::test]
async fn test_out_of_grid_start_rows_never_reach_backend() {
    for start_row in [5000, u64::from(u32::MAX)] {
        let temp = TempDir::new().unwrap();
        let client = MockCompletionClient::scripted(order_structure(), total_formula(start_row));
        let backend = MockBackend::new();
        let pipeline = pipeline(client, backend.clone(), temp.path());

        let result = pipeline
            .run("Order tracking", &CancelSignal::new())
            .await
            .unwrap();

        assert!(result.formula_plan.is_empty(), "start_row {}", start_row);
        assert_eq!(result.rejected_formulas.len(), 1);
        assert!(result.rejected_formulas[0].reason.contains("outside"));
        assert!(backend
            .writes
            .lock()
            .iter()
            .all(|w| w.input == ValueInput::Raw));
    }
}

#[tokio::test]
async fn test_materializer_skips_formula_outside_grid() {
    let structure = validate_value(order_structure()).unwrap();
    let plan = FormulaPlan {
        formulas: vec![FormulaDefinition {
            sheet: "Orders".into(),
            column: "total".into(),
            start_row: u32::MAX,
            expression: "=quantity*unit_price".into(),
            rationale: String::new(),
            dependencies: vec![],
            auto_fill: true,
        }],
    };
    let backend = MockBackend::new();
    let materializer = Materializer::new(
        backend.clone(),
        MaterializerSettings {
            fill_rows: 10,
            ..MaterializerSettings::default()
        },
    );

    let materialized = materializer
        .materialize(&structure, &plan, &EventBus::default().emitter("wf-grid"))
        .await
        .unwrap();

    assert_eq!(materialized.warnings.len(), 1);
    assert!(materialized.warnings[0].contains("outside"));
    assert!(backend
        .writes
        .lock()
        .iter()
        .all(|w| w.input == ValueInput::Raw));
}

#[tokio::test]
async fn test_mock_grid_rejects_rows_past_the_tab() {
    let backend = MockBackend::new();
    let handle = backend.create_spreadsheet("Grid").await.unwrap();
    backend
        .add_sheet(&handle.spreadsheet_id, "Orders", 50, 5)
        .await
        .unwrap();

    let fits = backend
        .write_values(
            &handle.spreadsheet_id,
            "'Orders'!A41:A50",
            vec![vec!["=1".to_string()]; 10],
            ValueInput::UserEntered,
        )
        .await;
    assert!(fits.is_ok());
    let overflow = backend
        .write_values(
            &handle.spreadsheet_id,
            "'Orders'!A45:A54",
            vec![vec!["=1".to_string()]; 10],
            ValueInput::UserEntered,
        )
        .await;
    assert!(overflow.is_err());
}

#[tokio::test]
async fn test_sheet_named_like_default_tab() {
    let temp = TempDir::new().unwrap();
    let structure = json!({
        "system_name": "Ledger",
        "sheets": [
            {"name": "Summary", "columns": ["period", "balance"]},
            {"name": DEFAULT_TAB_TITLE, "columns": ["entry", "amount"]}
        ]
    });
    let client = MockCompletionClient::scripted(structure, json!({"formulas": []}));
    let backend = MockBackend::new();
    let pipeline = pipeline(client, backend.clone(), temp.path());

    let result = pipeline
        .run("A ledger", &CancelSignal::new())
        .await
        .unwrap();

    let id = result.spreadsheet.unwrap().id;
    assert_eq!(backend.tab_titles(&id), vec!["Summary", DEFAULT_TAB_TITLE]);
    assert!(backend
        .writes
        .lock()
        .iter()
        .any(|w| w.range == "'Sheet1'!A1:B1"));
}

#[tokio::test]
async fn test_cancel_after_materialization_keeps_spreadsheet() {
    let temp = TempDir::new().unwrap();
    let cancel = CancelSignal::new();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let backend = MockBackend::cancelling(cancel.clone());
    let pipeline = pipeline(client, backend.clone(), temp.path());

    let failure = pipeline.run("Order tracking", &cancel).await.unwrap_err();

    assert_eq!(failure.failed_stage, Stage::Sheets);
    assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
    assert!(backend
        .writes
        .lock()
        .iter()
        .any(|w| w.input == ValueInput::UserEntered));
    let spreadsheet = failure.spreadsheet.clone().expect("spreadsheet kept");
    assert_eq!(spreadsheet.id, "mock-sheet-1");

    let record_path = failure.failure_record.clone().expect("failure record");
    assert!(record_path.ends_with(FAILURE_FILE));
    let projects = pipeline.projects().list().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].status, ProjectStatus::Failed);
    let record = pipeline.projects().load_failure(&projects[0].id).unwrap();
    assert_eq!(record.error_kind, "cancelled");
    assert_eq!(record.spreadsheet, Some(spreadsheet));
}

//! Project artifacts written by a run can be read back and listed.

use crate::integration::test_utils::{
    order_formulas, order_structure, pipeline, MockBackend, MockCompletionClient,
};
use flowsheet::docs::project::{COMPLETE_SCHEMA_FILE, SCHEMAS_DIR};
use flowsheet::docs::{load_structure, render_readme, ProjectStatus};
use flowsheet::pipeline::CancelSignal;
use serde_json::Value;
use tempfile::TempDir;

#[tokio::test]
async fn test_structure_document_round_trips() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let pipeline = pipeline(client, MockBackend::new(), temp.path());

    let result = pipeline
        .run("Order tracking for a bakery", &CancelSignal::new())
        .await
        .unwrap();
    let dir = result.project_dir.clone().unwrap();

    let reloaded = load_structure(&dir).unwrap();
    assert_eq!(reloaded, result.structure);

    let record = pipeline
        .projects()
        .load(&dir.file_name().unwrap().to_string_lossy())
        .unwrap();
    assert_eq!(record.structure.as_ref(), Some(&result.structure));
    assert_eq!(record.formula_plan.as_ref(), Some(&result.formula_plan));
    assert_eq!(record.metadata.project_info.request_id, result.request_id);
    assert_eq!(record.metadata.statistics.total_formulas, 1);
    assert_eq!(record.metadata.statistics.rejected_formulas, 1);
    assert_eq!(record.metadata.system.total_sheets, 2);
    assert_eq!(
        record.metadata.spreadsheet.as_ref().map(|s| s.id.as_str()),
        Some("mock-sheet-1")
    );
}

#[tokio::test]
async fn test_complete_schema_nests_flow_and_metadata() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let pipeline = pipeline(client, MockBackend::new(), temp.path());

    let result = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap();
    let path = result
        .project_dir
        .as_ref()
        .unwrap()
        .join(SCHEMAS_DIR)
        .join(COMPLETE_SCHEMA_FILE);
    let value: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(value["flow"]["system_name"], "Order Desk");
    assert_eq!(value["formulas"]["formulas"][0]["column"], "total");
    assert_eq!(value["metadata"]["system"]["name"], "Order Desk");

    // The nested flow is itself a valid structure document.
    let flow = flowsheet::schema::validate_value(value["flow"].clone()).unwrap();
    assert_eq!(flow, result.structure);
}

#[tokio::test]
async fn test_readme_is_deterministic_and_describes_sheets() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let pipeline = pipeline(client, MockBackend::new(), temp.path());

    let result = pipeline
        .run("Order tracking", &CancelSignal::new())
        .await
        .unwrap();

    let first = render_readme(&result);
    let second = render_readme(&result);
    assert_eq!(first, second);
    assert!(first.contains("# Order Desk"));
    assert!(first.contains("Customers"));
    assert!(first.contains("Orders"));
    assert!(first.contains("unit_price"));
    assert!(first.contains("https://docs.google.com/spreadsheets/d/mock-sheet-1"));
}

#[tokio::test]
async fn test_projects_list_newest_first_and_delete() {
    let temp = TempDir::new().unwrap();
    let client = MockCompletionClient::scripted(order_structure(), order_formulas());
    let pipeline = pipeline(client, MockBackend::new(), temp.path());

    pipeline
        .run("First prompt", &CancelSignal::new())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    pipeline
        .run("Second prompt", &CancelSignal::new())
        .await
        .unwrap();

    let projects = pipeline.projects().list().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].prompt, "Second prompt");
    assert_eq!(projects[1].prompt, "First prompt");
    assert!(projects.iter().all(|p| p.status == ProjectStatus::Complete));
    assert!(projects.iter().all(|p| p.sheets == 2));

    pipeline.projects().delete(&projects[1].id).unwrap();
    let remaining = pipeline.projects().list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, projects[0].id);

    assert!(pipeline.projects().delete("../escape").is_err());
    assert!(pipeline.projects().load("missing").is_err());
}

//! Shared test utilities for integration tests
//!
//! Hand-written `CompletionClient` and `SpreadsheetBackend` mocks, canned model replies, and a
//! pipeline builder rooted in a temp directory.

use async_trait::async_trait;
use flowsheet::error::{BackendError, ProviderError};
use flowsheet::generation::prompts::FORMULA_SYSTEM_PROMPT;
use flowsheet::generation::RetryPolicy;
use flowsheet::pipeline::{CancelSignal, PipelineSettings, WorkflowPipeline};
use flowsheet::provider::{
    ChatMessage, CompletionClient, CompletionOptions, CompletionResponse, TokenUsage,
};
use flowsheet::sheets::{MaterializerSettings, SpreadsheetBackend, SpreadsheetHandle, ValueInput};
use flowsheet::telemetry::EventBus;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Handler = dyn Fn(&[ChatMessage]) -> Result<String, ProviderError> + Send + Sync;

/// Completion client answering from a closure over the request messages.
pub struct MockCompletionClient {
    handler: Box<Handler>,
    calls: AtomicU32,
}

impl MockCompletionClient {
    pub fn with_handler<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&[ChatMessage]) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicU32::new(0),
        })
    }

    /// Reply with `structure` to the structure request and `formulas` to the formula request.
    pub fn scripted(structure: Value, formulas: Value) -> Arc<Self> {
        Self::with_handler(move |messages| {
            if is_formula_request(messages) {
                Ok(formulas.to_string())
            } else {
                Ok(format!("Here is the design:\n```json\n{}\n```", structure))
            }
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn is_formula_request(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .map(|m| m.content == FORMULA_SYSTEM_PROMPT)
        .unwrap_or(false)
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = (self.handler)(&messages)?;
        Ok(CompletionResponse {
            content,
            model: "mock-model".to_string(),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Where the mock backend should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailPoint {
    Authenticate,
    Create,
    AddSheet(String),
    FormatHeader,
    /// Formula or header writes whose range contains this text.
    Write(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub range: String,
    pub values: Vec<Vec<String>>,
    pub input: ValueInput,
}

/// Title the backend gives the tab it creates with every spreadsheet.
pub const DEFAULT_TAB_TITLE: &str = "Sheet1";
pub const DEFAULT_TAB_ID: i64 = 0;
const DEFAULT_TAB_ROWS: u32 = 1000;
const DEFAULT_TAB_COLUMNS: u32 = 26;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTab {
    pub id: i64,
    pub title: String,
    pub rows: u32,
    pub columns: u32,
}

/// In-memory spreadsheet backend that records every call.
///
/// Like the real service it refuses duplicate tab titles and writes past a tab's last row.
#[derive(Default)]
pub struct MockBackend {
    fail: Option<FailPoint>,
    cancel_on_create: Option<CancelSignal>,
    pub created: Mutex<Vec<String>>,
    pub tabs: Mutex<HashMap<String, Vec<MockTab>>>,
    pub added_sheets: Mutex<Vec<(String, u32, u32)>>,
    pub renamed_sheets: Mutex<Vec<(i64, String, u32, u32)>>,
    pub writes: Mutex<Vec<WriteCall>>,
    pub formatted: Mutex<Vec<(i64, u32)>>,
    next_sheet_id: AtomicU32,
    calls: AtomicU32,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(fail: FailPoint) -> Arc<Self> {
        Arc::new(Self {
            fail: Some(fail),
            ..Self::default()
        })
    }

    /// Trips `cancel` as soon as the spreadsheet exists; the rest of the run still succeeds.
    pub fn cancelling(cancel: CancelSignal) -> Arc<Self> {
        Arc::new(Self {
            cancel_on_create: Some(cancel),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tab titles of a spreadsheet, in creation order.
    pub fn tab_titles(&self, spreadsheet_id: &str) -> Vec<String> {
        self.tabs
            .lock()
            .get(spreadsheet_id)
            .map(|tabs| tabs.iter().map(|t| t.title.clone()).collect())
            .unwrap_or_default()
    }

    fn rejected(what: &str) -> BackendError {
        BackendError::Rejected {
            status: 400,
            message: format!("mock rejected {}", what),
        }
    }
}

/// Split `'Sheet'!A2:A11` into the unquoted sheet title and the last row referenced.
fn parse_range(range: &str) -> Option<(String, u32)> {
    let (sheet, cells) = range.rsplit_once('!')?;
    let sheet = sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(sheet)
        .replace("''", "'");
    let last_cell = cells.rsplit(':').next()?;
    let digits: String = last_cell.chars().filter(|c| c.is_ascii_digit()).collect();
    Some((sheet, digits.parse().ok()?))
}

#[async_trait]
impl SpreadsheetBackend for MockBackend {
    async fn authenticate(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail == Some(FailPoint::Authenticate) {
            return Err(BackendError::Auth("no credential".to_string()));
        }
        Ok(())
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetHandle, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail == Some(FailPoint::Create) {
            return Err(Self::rejected("create"));
        }
        let spreadsheet_id = {
            let mut created = self.created.lock();
            created.push(title.to_string());
            format!("mock-sheet-{}", created.len())
        };
        self.tabs.lock().insert(
            spreadsheet_id.clone(),
            vec![MockTab {
                id: DEFAULT_TAB_ID,
                title: DEFAULT_TAB_TITLE.to_string(),
                rows: DEFAULT_TAB_ROWS,
                columns: DEFAULT_TAB_COLUMNS,
            }],
        );
        if let Some(cancel) = &self.cancel_on_create {
            cancel.cancel();
        }
        Ok(SpreadsheetHandle {
            spreadsheet_id,
            default_sheet_id: Some(DEFAULT_TAB_ID),
        })
    }

    async fn add_sheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<i64, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail == Some(FailPoint::AddSheet(title.to_string())) {
            return Err(Self::rejected("addSheet"));
        }
        let mut all_tabs = self.tabs.lock();
        let tabs = all_tabs
            .get_mut(spreadsheet_id)
            .ok_or_else(|| Self::rejected("addSheet on unknown spreadsheet"))?;
        if tabs.iter().any(|t| t.title.eq_ignore_ascii_case(title)) {
            return Err(Self::rejected(&format!("duplicate sheet title '{}'", title)));
        }
        let id = i64::from(self.next_sheet_id.fetch_add(1, Ordering::SeqCst)) + 100;
        tabs.push(MockTab {
            id,
            title: title.to_string(),
            rows,
            columns,
        });
        self.added_sheets
            .lock()
            .push((title.to_string(), rows, columns));
        Ok(id)
    }

    async fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut all_tabs = self.tabs.lock();
        let tabs = all_tabs
            .get_mut(spreadsheet_id)
            .ok_or_else(|| Self::rejected("rename on unknown spreadsheet"))?;
        if tabs
            .iter()
            .any(|t| t.id != sheet_id && t.title.eq_ignore_ascii_case(title))
        {
            return Err(Self::rejected(&format!("duplicate sheet title '{}'", title)));
        }
        let tab = tabs
            .iter_mut()
            .find(|t| t.id == sheet_id)
            .ok_or_else(|| Self::rejected("rename of unknown sheet"))?;
        tab.title = title.to_string();
        tab.rows = rows;
        tab.columns = columns;
        self.renamed_sheets
            .lock()
            .push((sheet_id, title.to_string(), rows, columns));
        Ok(())
    }

    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
        input: ValueInput,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(FailPoint::Write(needle)) = &self.fail {
            if range.contains(needle.as_str()) {
                return Err(Self::rejected("values.update"));
            }
        }
        let (sheet, last_row) =
            parse_range(range).ok_or_else(|| Self::rejected(&format!("range {}", range)))?;
        let rows = self
            .tabs
            .lock()
            .get(spreadsheet_id)
            .and_then(|tabs| tabs.iter().find(|t| t.title == sheet).map(|t| t.rows))
            .ok_or_else(|| Self::rejected(&format!("unknown sheet in {}", range)))?;
        if last_row > rows {
            return Err(Self::rejected(&format!(
                "range {} exceeds grid limits ({} rows)",
                range, rows
            )));
        }
        self.writes.lock().push(WriteCall {
            range: range.to_string(),
            values,
            input,
        });
        Ok(())
    }

    async fn format_header(
        &self,
        _spreadsheet_id: &str,
        sheet_id: i64,
        column_count: u32,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail == Some(FailPoint::FormatHeader) {
            return Err(Self::rejected("repeatCell"));
        }
        self.formatted.lock().push((sheet_id, column_count));
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Two related sheets, as a model would reply.
pub fn order_structure() -> Value {
    json!({
        "system_name": "Order Desk",
        "description": "Track customers and their orders",
        "workflow_stages": ["Quote", "Order", "Invoice"],
        "integrations": ["Stripe"],
        "sheets": [
            {
                "name": "Customers",
                "primary_key": "customer_id",
                "columns": [
                    {"name": "customer_id", "type": "text", "required": true},
                    {"name": "name", "type": "text"},
                    {"name": "email", "type": "email"}
                ]
            },
            {
                "name": "Orders",
                "primary_key": "order_id",
                "relationships": ["Customers"],
                "columns": [
                    {"name": "order_id", "type": "text", "required": true},
                    {"name": "customer_id", "type": "text"},
                    {"name": "quantity", "type": "number", "default_value": 1},
                    {"name": "unit_price", "type": "currency"},
                    {"name": "total", "type": "currency"},
                    {"name": "status", "type": "DROPDOWN"}
                ]
            }
        ]
    })
}

/// One good formula and one that targets a column that does not exist.
pub fn order_formulas() -> Value {
    json!({
        "formulas": [
            {
                "sheet": "Orders",
                "column": "total",
                "expression": "=IFERROR(quantity*unit_price, 0)",
                "dependencies": ["quantity", "unit_price"],
                "start_row": 2,
                "auto_fill": true,
                "rationale": "Line total"
            },
            {
                "sheet": "Orders",
                "column": "tax",
                "expression": "=total*0.2",
                "dependencies": ["total"]
            }
        ]
    })
}

pub fn fast_settings(projects_dir: &Path) -> PipelineSettings {
    PipelineSettings {
        completion: CompletionOptions::default(),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
        },
        materializer: MaterializerSettings {
            fill_rows: 10,
            ..MaterializerSettings::default()
        },
        projects_dir: projects_dir.to_path_buf(),
    }
}

pub fn pipeline(
    client: Arc<dyn CompletionClient>,
    backend: Arc<dyn SpreadsheetBackend>,
    projects_dir: &Path,
) -> WorkflowPipeline {
    WorkflowPipeline::new(client, backend, fast_settings(projects_dir), EventBus::default())
}

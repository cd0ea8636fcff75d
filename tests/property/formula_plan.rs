//! Formula filtering over arbitrary candidate lists

use flowsheet::generation::filter_formulas;
use flowsheet::schema::{validate_value, FlowStructure, FormulaDefinition};
use proptest::prelude::*;
use serde_json::json;

const GRID_ROWS: u32 = 100;

fn start_rows() -> impl Strategy<Value = u32> {
    prop_oneof![0u32..4, 95u32..105, Just(u32::MAX)]
}

fn structure() -> FlowStructure {
    validate_value(json!({
        "system_name": "Orders",
        "sheets": [
            {"name": "Customers", "columns": ["customer_id", "name", "tier"]},
            {"name": "Orders", "columns": ["order_id", "customer_id", "qty", "price", "total"]}
        ]
    }))
    .unwrap()
}

fn candidate() -> impl Strategy<Value = FormulaDefinition> {
    let sheets = prop::sample::select(vec!["Customers", "Orders", "Invoices"]);
    let columns = prop::sample::select(vec!["customer_id", "name", "qty", "total", "missing"]);
    let expressions = prop::sample::select(vec!["=qty*price", "qty*price", "", "=1"]);
    let deps = prop::collection::vec(
        prop::sample::select(vec!["qty", "price", "Customers.tier", "Orders!qty", "nope"]),
        0..3,
    );
    (sheets, columns, expressions, deps, start_rows(), any::<bool>()).prop_map(
        |(sheet, column, expression, deps, start_row, auto_fill)| FormulaDefinition {
            sheet: sheet.to_string(),
            column: column.to_string(),
            start_row,
            expression: expression.to_string(),
            rationale: String::new(),
            dependencies: deps.into_iter().map(str::to_string).collect(),
            auto_fill,
        },
    )
}

proptest! {
    /// Every candidate is either kept or rejected, and kept formulas bind to real cells
    #[test]
    fn filtering_partitions_candidates(candidates in prop::collection::vec(candidate(), 0..12)) {
        let flow = structure();
        let total = candidates.len();
        let outcome = filter_formulas(&flow, candidates, GRID_ROWS);

        prop_assert_eq!(outcome.plan.formulas.len() + outcome.rejected.len(), total);
        for formula in &outcome.plan.formulas {
            let sheet = flow.sheet(&formula.sheet);
            prop_assert!(sheet.is_some());
            prop_assert!(sheet.unwrap().column(&formula.column).is_some());
            prop_assert!(formula.expression.starts_with('='));
            prop_assert!(formula.start_row >= 2);
            prop_assert!(formula.start_row <= GRID_ROWS);
        }

        let mut targets: Vec<_> = outcome
            .plan
            .formulas
            .iter()
            .map(|f| (f.sheet.clone(), f.column.clone()))
            .collect();
        targets.sort();
        targets.dedup();
        prop_assert_eq!(targets.len(), outcome.plan.formulas.len());
    }

    /// Filtering the kept plan again keeps all of it
    #[test]
    fn filtering_is_idempotent(candidates in prop::collection::vec(candidate(), 0..12)) {
        let flow = structure();
        let first = filter_formulas(&flow, candidates, GRID_ROWS);
        let second = filter_formulas(&flow, first.plan.formulas.clone(), GRID_ROWS);
        prop_assert_eq!(&second.plan, &first.plan);
        prop_assert!(second.rejected.is_empty());
    }
}

//! Rule evaluation and the docstep transition
//!
//! Every rule in a docstep reads the same previous state. Writes are only
//! recorded, then committed together once all rules have run, so the
//! outcome never depends on rule order within a step.

use std::collections::BTreeMap;

use flux_lang::{eval_binary, eval_unary, BinaryOp, Expr, FluxCell, FluxDocument, FluxRule, RuleMode, Stmt, Value};

use crate::state::{GridState, RuntimeState};
use crate::{KernelError, RuntimeEvent};

/// Cell fields a rule may assign
const WRITABLE_CELL_FIELDS: &[&str] = &["content", "tags", "dynamic", "density", "salience"];

/// Numeric cell fields averaged over a neighborhood
const NUMERIC_CELL_FIELDS: &[&str] = &["dynamic", "density", "salience"];

/// Advance the document by one docstep
pub fn run_docstep_once(doc: &FluxDocument, prev: &RuntimeState) -> Result<RuntimeState, KernelError> {
    let mut writes = PendingWrites::default();

    for rule in &doc.rules {
        if rule.mode != RuleMode::Docstep {
            log::trace!("Skipping {:?} rule '{}' during docstep", rule.mode, rule.name);
            continue;
        }

        match &rule.scope.grid {
            Some(grid_name) => {
                let grid = prev.grid(grid_name).ok_or_else(|| KernelError::UnknownGrid {
                    rule: rule.name.clone(),
                    grid: grid_name.clone(),
                })?;
                for (row, col, _) in grid.iter() {
                    let scope = CellScope { grid, row, col };
                    RuleEval::new(rule, prev, Some(scope), &mut writes).run()?;
                }
            }
            None => RuleEval::new(rule, prev, None, &mut writes).run()?,
        }
    }

    let next = writes.commit(prev);
    log::debug!(
        "Docstep {} -> {}: {} param write(s), {} cell write(s)",
        prev.docstep_index,
        next.docstep_index,
        writes.params.len(),
        writes.cells.len()
    );
    Ok(next)
}

/// Apply an external event.
///
/// Event rules are not executed yet; the state comes back unchanged.
pub fn handle_event(_doc: &FluxDocument, state: RuntimeState, event: &RuntimeEvent) -> RuntimeState {
    log::debug!("Event '{}' received; event rules are not executed", event.event_type);
    state
}

// === Write-ahead log ===

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CellKey {
    grid: String,
    row: usize,
    col: usize,
}

/// Field-wise patch for one cell; later writes replace earlier ones per field
#[derive(Debug, Clone, Default)]
struct CellPatch {
    content: Option<String>,
    tags: Option<Vec<String>>,
    dynamic: Option<f64>,
    density: Option<f64>,
    salience: Option<f64>,
}

impl CellPatch {
    fn apply(&self, cell: &mut FluxCell) {
        if let Some(content) = &self.content {
            cell.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            cell.tags = tags.clone();
        }
        if let Some(dynamic) = self.dynamic {
            cell.dynamic = dynamic;
        }
        if let Some(density) = self.density {
            cell.density = density;
        }
        if let Some(salience) = self.salience {
            cell.salience = salience;
        }
    }
}

#[derive(Debug, Default)]
struct PendingWrites {
    params: BTreeMap<String, Value>,
    cells: BTreeMap<CellKey, CellPatch>,
}

impl PendingWrites {
    fn commit(&self, prev: &RuntimeState) -> RuntimeState {
        let mut next = prev.clone();
        for (name, value) in &self.params {
            next.params.insert(name.clone(), value.clone());
        }
        for (key, patch) in &self.cells {
            if let Some(cell) = next.grids.get_mut(&key.grid).and_then(|g| g.get_mut(key.row, key.col)) {
                patch.apply(cell);
            }
        }
        next.docstep_index += 1;
        next
    }
}

// === Evaluation ===

#[derive(Clone, Copy)]
struct CellScope<'a> {
    grid: &'a GridState,
    row: usize,
    col: usize,
}

impl<'a> CellScope<'a> {
    fn cell(&self) -> Option<&'a FluxCell> {
        self.grid.get(self.row, self.col)
    }

    /// Moore (`all`) or von Neumann (`orth`) neighborhood, clipped to bounds
    fn neighbors(&self, orthogonal: bool) -> Vec<&'a FluxCell> {
        let mut out = Vec::new();
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if (dr == 0 && dc == 0) || (orthogonal && dr != 0 && dc != 0) {
                    continue;
                }
                let row = self.row as i64 + dr;
                let col = self.col as i64 + dc;
                if row < 0 || col < 0 {
                    continue;
                }
                if let Some(cell) = self.grid.get(row as usize, col as usize) {
                    out.push(cell);
                }
            }
        }
        out
    }
}

struct RuleEval<'a, 'w> {
    rule: &'a FluxRule,
    prev: &'a RuntimeState,
    scope: Option<CellScope<'a>>,
    locals: BTreeMap<String, Value>,
    writes: &'w mut PendingWrites,
}

impl<'a, 'w> RuleEval<'a, 'w> {
    fn new(rule: &'a FluxRule, prev: &'a RuntimeState, scope: Option<CellScope<'a>>, writes: &'w mut PendingWrites) -> Self {
        Self {
            rule,
            prev,
            scope,
            locals: BTreeMap::new(),
            writes,
        }
    }

    fn run(mut self) -> Result<(), KernelError> {
        let rule = self.rule;
        let condition = self.evaluate(&rule.condition)?;
        let fired = condition.as_bool().ok_or_else(|| KernelError::NonBooleanCondition {
            rule: rule.name.clone(),
            found: condition.type_name(),
        })?;

        let branch = if fired { &rule.then_branch } else { &rule.else_branch };
        for stmt in branch {
            self.execute(stmt)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), KernelError> {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let value = self.evaluate(value)?;
                self.assign(target, value)
            }
            // Locals only live for the current evaluation
            Stmt::Let { name, value, .. } => {
                let value = self.evaluate(value)?;
                self.locals.insert(name.clone(), value);
                Ok(())
            }
            Stmt::AdvanceDocstep { .. } => Ok(()),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<(), KernelError> {
        match target {
            Expr::Identifier { name } => self.write_param(name, value),
            Expr::Member { object, property } => match object.as_ref() {
                Expr::Identifier { name } if name == "params" => self.write_param(property, value),
                Expr::Identifier { name } if name == "cell" => self.write_cell(property, value),
                _ => Err(self.invalid_target(target)),
            },
            _ => Err(self.invalid_target(target)),
        }
    }

    fn write_param(&mut self, name: &str, value: Value) -> Result<(), KernelError> {
        if !self.prev.params.contains_key(name) {
            return Err(KernelError::UnknownParam {
                rule: self.rule.name.clone(),
                name: name.to_string(),
            });
        }
        self.writes.params.insert(name.to_string(), value);
        Ok(())
    }

    fn write_cell(&mut self, field: &str, value: Value) -> Result<(), KernelError> {
        let Some(scope) = self.scope else {
            return Err(KernelError::CellWriteOutsideGrid {
                rule: self.rule.name.clone(),
                field: field.to_string(),
            });
        };
        if !WRITABLE_CELL_FIELDS.contains(&field) {
            return Err(self.invalid_target(&Expr::Member {
                object: Box::new(Expr::ident("cell")),
                property: field.to_string(),
            }));
        }

        let rule = self.rule;
        let type_error = |expected: &str| KernelError::Type {
            rule: rule.name.clone(),
            message: format!("cell.{} expects {}, got {}", field, expected, value.type_name()),
        };

        let key = CellKey {
            grid: scope.grid.name.clone(),
            row: scope.row,
            col: scope.col,
        };
        let mut patch = self.writes.cells.get(&key).cloned().unwrap_or_default();
        match field {
            "content" => patch.content = Some(value.to_display_string()),
            "tags" => {
                let tags = value.as_list().ok_or_else(|| type_error("a list"))?;
                patch.tags = Some(tags.iter().map(Value::to_display_string).collect());
            }
            _ => {
                let number = value.as_f64().ok_or_else(|| type_error("a number"))?;
                match field {
                    "dynamic" => patch.dynamic = Some(number),
                    "density" => patch.density = Some(number),
                    _ => patch.salience = Some(number),
                }
            }
        }
        self.writes.cells.insert(key, patch);
        Ok(())
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, KernelError> {
        match expr {
            Expr::Literal { value } => Ok(value.clone()),

            Expr::Identifier { name } => self.lookup(name),

            Expr::Member { object, property } => {
                let object = self.evaluate(object)?;
                self.member(&object, property)
            }

            Expr::NeighborsCall { method, args, .. } => {
                let scope = self.scope.ok_or_else(|| KernelError::OutsideGrid {
                    rule: self.rule.name.clone(),
                    name: "neighbors".to_string(),
                })?;
                if !args.is_empty() {
                    return Err(KernelError::Type {
                        rule: self.rule.name.clone(),
                        message: format!("neighbors.{}() takes no arguments", method),
                    });
                }
                let cells = match method.as_str() {
                    "all" => scope.neighbors(false),
                    "orth" => scope.neighbors(true),
                    _ => {
                        return Err(KernelError::UnknownNeighborsMethod {
                            rule: self.rule.name.clone(),
                            method: method.clone(),
                        })
                    }
                };
                Ok(Value::List(cells.into_iter().map(cell_value).collect()))
            }

            Expr::Call { callee, .. } => Err(KernelError::UnsupportedCall {
                rule: self.rule.name.clone(),
                callee: callee.dotted_name().unwrap_or_else(|| "<expression>".to_string()),
            }),

            Expr::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                eval_unary(*op, &operand).map_err(|source| self.op_error(source))
            }

            Expr::Binary { op: BinaryOp::And, left, right } => {
                let left = self.evaluate(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(right)?.is_truthy()))
            }

            Expr::Binary { op: BinaryOp::Or, left, right } => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate(right)?.is_truthy()))
            }

            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                eval_binary(*op, &left, &right).map_err(|source| self.op_error(source))
            }

            Expr::List { items } => items.iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, KernelError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        match name {
            "params" => Ok(Value::Object(self.prev.params.clone())),
            "docstep" => Ok(Value::Int(self.prev.docstep_index as i64)),
            "cell" => self.scope
                .and_then(|scope| scope.cell())
                .map(cell_value)
                .ok_or_else(|| KernelError::OutsideGrid {
                    rule: self.rule.name.clone(),
                    name: "cell".to_string(),
                }),
            "neighbors" => Err(KernelError::Type {
                rule: self.rule.name.clone(),
                message: "neighbors must be called, e.g. neighbors.all()".to_string(),
            }),
            _ => self.prev.params.get(name).cloned().ok_or_else(|| KernelError::UnknownIdentifier {
                rule: self.rule.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn member(&self, object: &Value, property: &str) -> Result<Value, KernelError> {
        match object {
            Value::Object(fields) => Ok(fields.get(property).cloned().unwrap_or(Value::Null)),
            Value::List(items) => aggregate(items, property).ok_or_else(|| KernelError::Type {
                rule: self.rule.name.clone(),
                message: format!("unknown neighborhood field '{}'", property),
            }),
            other => Err(KernelError::Type {
                rule: self.rule.name.clone(),
                message: format!("cannot read '{}' of {}", property, other.type_name()),
            }),
        }
    }

    fn invalid_target(&self, target: &Expr) -> KernelError {
        KernelError::InvalidAssignmentTarget {
            rule: self.rule.name.clone(),
            target: target.dotted_name().unwrap_or_else(|| "<expression>".to_string()),
        }
    }

    fn op_error(&self, source: flux_lang::OpError) -> KernelError {
        KernelError::Operator {
            rule: self.rule.name.clone(),
            source,
        }
    }
}

/// Object view of a cell as seen by rule expressions
fn cell_value(cell: &FluxCell) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), Value::str(cell.id.as_str()));
    fields.insert("tags".to_string(), Value::List(cell.tags.iter().map(|t| Value::str(t.as_str())).collect()));
    fields.insert("content".to_string(), Value::str(cell.content.as_str()));
    fields.insert("dynamic".to_string(), Value::Float(cell.dynamic));
    fields.insert("density".to_string(), Value::Float(cell.density));
    fields.insert("salience".to_string(), Value::Float(cell.salience));
    Value::Object(fields)
}

/// Member access on a neighborhood: averages, counts and per-cell lists
fn aggregate(cells: &[Value], property: &str) -> Option<Value> {
    match property {
        "count" | "length" => Some(Value::Int(cells.len() as i64)),
        p if NUMERIC_CELL_FIELDS.contains(&p) => {
            if cells.is_empty() {
                return Some(Value::Float(0.0));
            }
            let sum: f64 = cells.iter()
                .filter_map(|cell| cell.as_object()?.get(p)?.as_f64())
                .sum();
            Some(Value::Float(sum / cells.len() as f64))
        }
        "content" | "id" | "tags" => Some(Value::List(
            cells.iter()
                .map(|cell| cell.as_object().and_then(|o| o.get(property)).cloned().unwrap_or(Value::Null))
                .collect(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::init_runtime_state;
    use flux_lang::parse_document;

    fn doc(source: &str) -> FluxDocument {
        parse_document(&format!("document {{ {} }}", source)).unwrap()
    }

    fn step(doc: &FluxDocument, state: &RuntimeState) -> RuntimeState {
        run_docstep_once(doc, state).unwrap()
    }

    #[test]
    fn test_simultaneous_update() {
        let d = doc(r#"
            grid field {
                size { rows = 1; cols = 3; }
                cell a { dynamic = 0.6; }
                cell b { dynamic = 0.6; }
                cell c { dynamic = 0.4; }
            }
            rule grow(mode = docstep, grid = field) {
                when cell.content == "" and neighbors.all().dynamic > 0.5
                then cell.content = "noise";
            }
        "#);
        let next = step(&d, &init_runtime_state(&d));
        assert_eq!(next.grid("field").unwrap().contents(), vec!["noise", "", "noise"]);
        assert_eq!(next.docstep_index, 1);
    }

    #[test]
    fn test_reads_come_from_previous_state() {
        // With in-place updates the activation would sweep the whole row
        let d = doc(r#"
            grid g {
                size { rows = 1; cols = 4; }
                cell a { dynamic = 1; }
            }
            rule spread(grid = g) {
                when cell.dynamic == 0 and neighbors.orth().dynamic > 0
                then cell.dynamic = 1;
            }
        "#);
        let s1 = step(&d, &init_runtime_state(&d));
        let dynamics = |s: &RuntimeState| -> Vec<f64> {
            s.grid("g").unwrap().iter().map(|(_, _, c)| c.dynamic).collect()
        };
        assert_eq!(dynamics(&s1), vec![1.0, 1.0, 0.0, 0.0]);
        let s2 = step(&d, &s1);
        assert_eq!(dynamics(&s2), vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_param_writes_last_writer_wins() {
        let d = doc(r#"
            state { param level: int @ 1; }
            rule first() { when true then level = level + 10; }
            rule second() { when true then params.level = level + 100; }
        "#);
        let next = step(&d, &init_runtime_state(&d));
        assert_eq!(next.param("level"), Some(&Value::Int(101)));
    }

    #[test]
    fn test_else_branch() {
        let d = doc(r#"
            state { param on: bool @ false; param hits: int @ 0; }
            rule toggle() { when on then { on = false; } else { on = true; hits = hits + 1; } }
        "#);
        let s1 = step(&d, &init_runtime_state(&d));
        assert_eq!(s1.param("on"), Some(&Value::Bool(true)));
        assert_eq!(s1.param("hits"), Some(&Value::Int(1)));
        let s2 = step(&d, &s1);
        assert_eq!(s2.param("on"), Some(&Value::Bool(false)));
        assert_eq!(s2.param("hits"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_cell_write_outside_grid_scope() {
        let d = doc(r#"rule bad() { when true then cell.content = "x"; }"#);
        let err = run_docstep_once(&d, &init_runtime_state(&d)).unwrap_err();
        assert!(matches!(err, KernelError::CellWriteOutsideGrid { ref rule, .. } if rule == "bad"));
    }

    #[test]
    fn test_non_boolean_condition_names_rule() {
        let d = doc(r#"state { param n: int @ 3; } rule counted() { when n + 1 then n = 0; }"#);
        let err = run_docstep_once(&d, &init_runtime_state(&d)).unwrap_err();
        assert_eq!(err.to_string(), "Rule 'counted': condition must be a boolean, got int");
    }

    #[test]
    fn test_neighbors_outside_grid_scope() {
        let d = doc(r#"rule bad() { when neighbors.all().count > 0 then docstep = 1; }"#);
        let err = run_docstep_once(&d, &init_runtime_state(&d)).unwrap_err();
        assert!(matches!(err, KernelError::OutsideGrid { .. }));
    }

    #[test]
    fn test_unknown_neighbors_method() {
        let d = doc(r#"
            grid g { cell a {} }
            rule r(grid = g) { when neighbors.diag().count > 0 then cell.content = "x"; }
        "#);
        let err = run_docstep_once(&d, &init_runtime_state(&d)).unwrap_err();
        assert!(matches!(err, KernelError::UnknownNeighborsMethod { ref method, .. } if method == "diag"));
    }

    #[test]
    fn test_generic_calls_rejected() {
        let d = doc(r#"state { param n: int @ 0; } rule r() { when choose([true]) then n = 1; }"#);
        let err = run_docstep_once(&d, &init_runtime_state(&d)).unwrap_err();
        assert!(matches!(err, KernelError::UnsupportedCall { ref callee, .. } if callee == "choose"));
    }

    #[test]
    fn test_event_rules_not_executed() {
        let d = doc(r#"
            state { param n: int @ 0; }
            rule tap(mode = event, on = "click") { when true then n = 1; }
        "#);
        let next = step(&d, &init_runtime_state(&d));
        assert_eq!(next.param("n"), Some(&Value::Int(0)));
        assert_eq!(next.docstep_index, 1);
    }

    #[test]
    fn test_neighborhood_sizes() {
        let d = doc(r#"
            state { param corner: int @ 0; param center: int @ 0; }
            grid g { size { rows = 3; cols = 3; } }
        "#);
        let state = init_runtime_state(&d);
        let grid = state.grid("g").unwrap();
        let corner = CellScope { grid, row: 0, col: 0 };
        let center = CellScope { grid, row: 1, col: 1 };
        assert_eq!(corner.neighbors(false).len(), 3);
        assert_eq!(corner.neighbors(true).len(), 2);
        assert_eq!(center.neighbors(false).len(), 8);
        assert_eq!(center.neighbors(true).len(), 4);
    }

    #[test]
    fn test_handle_event_is_noop() {
        let d = doc(r#"state { param n: int @ 0; } rule tap(mode = event) { when true then n = 1; }"#);
        let state = init_runtime_state(&d);
        let event = RuntimeEvent::new("click");
        assert_eq!(handle_event(&d, state.clone(), &event), state);
    }
}

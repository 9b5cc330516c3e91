//! Static document checks
//!
//! Every check is advisory: findings are collected into a flat list of
//! [`Diagnostic`]s and nothing here fails or stops early.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::*;
use crate::diagnostic::{Diagnostic, Span};
use crate::value::Value;

/// Methods the kernel's `neighbors` namespace understands
pub const NEIGHBOR_METHODS: &[&str] = &["all", "orth"];

/// Identifiers that make `visibleIf` depend on the clock
const TIME_IDENTIFIERS: &[&str] = &["time", "timeSeconds", "docstep"];

/// Calls that make `visibleIf` depend on the clock or on randomness
const NONDETERMINISTIC_CALLS: &[&str] = &[
    "now", "timeSeconds", "choose", "chooseStep", "cycle", "shuffle", "sample", "phase", "hashpick",
];

/// Check a parsed document, returning every finding
pub fn check_document(file: &str, doc: &FluxDocument) -> Vec<Diagnostic> {
    let mut checker = Checker::new(file, doc);
    checker.check_grids();
    checker.check_rules();
    checker.check_runtime();
    checker.check_body();

    log::debug!("Checked '{}': {} diagnostic(s)", file, checker.diagnostics.len());
    checker.diagnostics
}

/// Same as [`check_document`], rendered as `file:line:col: Check error: msg`
pub fn check_document_strings(file: &str, doc: &FluxDocument) -> Vec<String> {
    check_document(file, doc).iter().map(ToString::to_string).collect()
}

struct Checker<'a> {
    file: &'a str,
    doc: &'a FluxDocument,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn new(file: &'a str, doc: &'a FluxDocument) -> Self {
        Self {
            file,
            doc,
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::check(self.file, span, message));
    }

    fn check_grids(&mut self) {
        let doc = self.doc;
        let mut seen = BTreeSet::new();
        for grid in &doc.grids {
            if !seen.insert(grid.name.as_str()) {
                self.report(grid.span, format!("Duplicate grid '{}'", grid.name));
            }
        }
    }

    fn check_rules(&mut self) {
        let doc = self.doc;
        for rule in &doc.rules {
            if let Some(grid) = &rule.scope.grid {
                if doc.grid(grid).is_none() {
                    self.report(rule.span, format!("Rule '{}' references unknown grid '{}'", rule.name, grid));
                }
            }

            self.check_neighbor_calls(&rule.condition, rule.span);
            for stmt in rule.then_branch.iter().chain(&rule.else_branch) {
                match stmt {
                    Stmt::Assign { target, value, span } => {
                        self.check_neighbor_calls(target, *span);
                        self.check_neighbor_calls(value, *span);
                    }
                    Stmt::Let { value, span, .. } => self.check_neighbor_calls(value, *span),
                    Stmt::AdvanceDocstep { .. } => {}
                }
            }
        }
    }

    fn check_neighbor_calls(&mut self, expr: &Expr, fallback: Span) {
        let mut unknown = Vec::new();
        expr.walk(&mut |e| {
            if let Expr::NeighborsCall { method, span, .. } = e {
                if !NEIGHBOR_METHODS.contains(&method.as_str()) {
                    unknown.push((method.clone(), *span));
                }
            }
        });
        for (method, span) in unknown {
            let span = if span == Span::default() { fallback } else { span };
            self.report(span, format!(
                "Unknown neighbors method '{}' (expected one of: {})",
                method,
                NEIGHBOR_METHODS.join(", ")
            ));
        }
    }

    fn check_runtime(&mut self) {
        let doc = self.doc;
        let Some(runtime) = &doc.runtime else {
            return;
        };
        for advance in &runtime.docstep_advance {
            match advance {
                DocstepAdvance::Timer { duration, span } => {
                    if !(duration.amount > 0.0) {
                        self.report(*span, format!(
                            "docstepAdvance timer must be positive, got {}{}",
                            Value::Float(duration.amount),
                            duration.unit.name()
                        ));
                    }
                }
            }
        }
    }

    fn check_body(&mut self) {
        let doc = self.doc;
        let Some(body) = &doc.body else {
            return;
        };

        let mut nodes = Vec::new();
        for node in body {
            node.walk(&mut |n| nodes.push(n));
        }

        // Labels first, so ref() targets can be resolved anywhere in the tree
        let mut labels: BTreeMap<String, Span> = BTreeMap::new();
        for node in &nodes {
            let Some(label) = node.props.get("label") else {
                continue;
            };
            match label {
                NodePropValue::Literal(Value::String(text)) => {
                    if labels.contains_key(text) {
                        self.report(node.span, format!("Duplicate label '{}' on {} '{}'", text, node.kind, node.id));
                    } else {
                        labels.insert(text.clone(), node.span);
                    }
                }
                _ => self.report(node.span, format!("label on {} '{}' must be a literal string", node.kind, node.id)),
            }
        }

        for node in nodes {
            self.check_node(node, &labels);
        }
    }

    fn check_node(&mut self, node: &'a DocumentNode, labels: &BTreeMap<String, Span>) {
        if !node.is_slot() {
            if node.refresh.is_some() {
                self.report(node.span, format!(
                    "refresh is only allowed on slot or inline_slot nodes, found on {} '{}'",
                    node.kind, node.id
                ));
            }
            if node.transition.is_some() {
                self.report(node.span, format!(
                    "transition is only allowed on slot or inline_slot nodes, found on {} '{}'",
                    node.kind, node.id
                ));
            }
        }

        if let Some(visible) = node.props.get("visibleIf") {
            self.check_visible_if(node, visible);
        }

        if node.kind == "grid" {
            match grid_reference(node) {
                Some(name) if self.doc.grid(&name).is_none() => {
                    self.report(node.span, format!("Grid node '{}' references unknown grid '{}'", node.id, name));
                }
                Some(_) => {}
                None => self.report(node.span, format!("Grid node '{}' must name a grid with a literal 'grid' property", node.id)),
            }
        }

        for (key, value) in &node.props {
            let NodePropValue::Dynamic(expr) = value else {
                continue;
            };
            let mut problems = Vec::new();
            expr.walk(&mut |e| match e {
                Expr::Call { callee, args, span } if matches!(callee.as_ref(), Expr::Identifier { name } if name == "ref") => {
                    match args.first().and_then(Expr::as_constant) {
                        Some(Value::String(target)) => {
                            if !labels.contains_key(&target) {
                                problems.push((*span, format!("ref('{}') does not match any label", target)));
                            }
                        }
                        _ => problems.push((*span, "ref() expects a literal label string".to_string())),
                    }
                }
                Expr::NeighborsCall { span, .. } => {
                    problems.push((*span, "neighbors.* is only available inside grid rules".to_string()));
                }
                _ => {}
            });
            for (span, message) in problems {
                let span = if span == Span::default() { node.span } else { span };
                self.report(span, format!("{} (in {} '{}', property '{}')", message, node.kind, node.id, key));
            }
        }
    }

    fn check_visible_if(&mut self, node: &DocumentNode, visible: &NodePropValue) {
        let expr = match visible {
            NodePropValue::Literal(Value::Bool(_)) => return,
            NodePropValue::Literal(other) => {
                self.report(node.span, format!(
                    "visibleIf on {} '{}' must be a boolean, got {}",
                    node.kind, node.id, other.type_name()
                ));
                return;
            }
            NodePropValue::Dynamic(expr) => expr,
        };

        if !is_boolean_shaped(expr) {
            self.report(node.span, format!("visibleIf on {} '{}' must be a boolean expression", node.kind, node.id));
            return;
        }

        let mut offender = None;
        expr.walk(&mut |e| {
            if offender.is_some() {
                return;
            }
            match e {
                Expr::Identifier { name } if TIME_IDENTIFIERS.contains(&name.as_str()) => {
                    offender = Some(name.clone());
                }
                Expr::Call { callee, .. } => {
                    if let Some(name) = callee.dotted_name() {
                        if NONDETERMINISTIC_CALLS.contains(&name.as_str()) || name.starts_with("assets.") {
                            offender = Some(format!("{}()", name));
                        }
                    }
                }
                _ => {}
            }
        });

        if let Some(name) = offender {
            self.report(node.span, format!(
                "visibleIf on {} '{}' must not depend on time or randomness (uses {})",
                node.kind, node.id, name
            ));
        }
    }
}

/// Grid name a `grid` content node points at
pub fn grid_reference(node: &DocumentNode) -> Option<String> {
    match node.props.get("grid") {
        Some(NodePropValue::Literal(Value::String(name))) => Some(name.clone()),
        _ => None,
    }
}

fn is_boolean_shaped(expr: &Expr) -> bool {
    match expr {
        Expr::Literal { value } => matches!(value, Value::Bool(_)),
        Expr::Unary { op: UnaryOp::Not, .. } => true,
        Expr::Binary { op, .. } => op.is_boolean(),
        // A parameter reference may hold a bool; its type is checked at render time
        Expr::Identifier { .. } | Expr::Member { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn check(source: &str) -> Vec<String> {
        let doc = parse_document(source).unwrap();
        check_document_strings("test.flux", &doc)
    }

    #[test]
    fn test_clean_document() {
        let diagnostics = check(r#"
            document {
                grid g { size { rows = 1; cols = 1; } }
                rule r(grid = g) { when neighbors.orth().count > 0 then cell.content = "x"; }
                runtime { docstepAdvance = [ timer(1s) ]; }
                body {
                    page p {
                        text t { label = "intro"; content = "hi"; }
                        slot s { refresh = docstep; content = @ref("intro"); visibleIf = @(params.open == true); }
                        grid v { grid = g; }
                    }
                }
            }
        "#);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_unknown_grid_and_neighbor_method() {
        let diagnostics = check(r#"
            document {
                rule r(grid = missing) { when neighbors.diag().count > 0 then x = 1; }
            }
        "#);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].starts_with("test.flux:3:17: Check error: Rule 'r' references unknown grid 'missing'"));
        assert!(diagnostics[1].contains("Unknown neighbors method 'diag'"));
    }

    #[test]
    fn test_timer_must_be_positive() {
        let diagnostics = check("document { runtime { docstepAdvance = [ timer(0s) ]; } }");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("timer must be positive"));
    }

    #[test]
    fn test_refresh_only_on_slots() {
        let diagnostics = check(r#"
            document { body { text t { refresh = never; transition = fade(1s); } } }
        "#);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].contains("refresh is only allowed"));
        assert!(diagnostics[1].contains("transition is only allowed"));
    }

    #[test]
    fn test_label_rules() {
        let diagnostics = check(r#"
            document { body {
                text a { label = "x"; }
                text b { label = "x"; }
                text c { label = @("y" + "z"); }
            } }
        "#);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].contains("Duplicate label 'x'"));
        assert!(diagnostics[1].contains("must be a literal string"));
    }

    #[test]
    fn test_visible_if_rejects_time_and_randomness() {
        let diagnostics = check(r#"
            document { body {
                text a { visibleIf = @(time > 3); }
                text b { visibleIf = @(choose([true, false]) == true); }
                text c { visibleIf = @(assets.pick() != null); }
                text d { visibleIf = "yes"; }
                text e { visibleIf = @(1 + 2); }
                text f { visibleIf = true; }
            } }
        "#);
        assert_eq!(diagnostics.len(), 5, "{:?}", diagnostics);
        assert!(diagnostics[0].contains("uses time"));
        assert!(diagnostics[1].contains("uses choose()"));
        assert!(diagnostics[2].contains("uses assets.pick()"));
        assert!(diagnostics[3].contains("must be a boolean, got string"));
        assert!(diagnostics[4].contains("must be a boolean expression"));
    }

    #[test]
    fn test_dangling_ref_and_unknown_grid_node() {
        let diagnostics = check(r#"
            document { body {
                text a { content = @ref("nowhere"); }
                grid v { grid = ghost; }
            } }
        "#);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().any(|d| d.contains("ref('nowhere') does not match any label")));
        assert!(diagnostics.iter().any(|d| d.contains("unknown grid 'ghost'")));
    }
}

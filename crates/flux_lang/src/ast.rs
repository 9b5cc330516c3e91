//! Abstract Syntax Tree for Flux documents
//!
//! The AST is a plain owned tree: it is built once by the parser and then
//! only read by the validator, the grid kernel and the render pipeline.
//! Every type serialises to the camelCase JSON consumed by editor tooling.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::diagnostic::Span;
use crate::value::Value;

/// Root of a parsed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxDocument {
    pub meta: BTreeMap<String, String>,
    pub state: StateDecl,
    pub page_config: Option<PageConfig>,
    pub grids: Vec<FluxGrid>,
    pub rules: Vec<FluxRule>,
    pub runtime: Option<RuntimeConfig>,
    /// Content tree; absent for legacy grid-only documents
    pub body: Option<Vec<DocumentNode>>,
    pub assets: Vec<AssetDecl>,
    pub banks: Vec<BankDecl>,
    pub materials: Vec<MaterialDecl>,
}

impl FluxDocument {
    pub fn grid(&self, name: &str) -> Option<&FluxGrid> {
        self.grids.iter().find(|g| g.name == name)
    }

    pub fn param(&self, name: &str) -> Option<&ParamDecl> {
        self.state.params.iter().find(|p| p.name == name)
    }

    /// Declared `version` meta entry
    pub fn version(&self) -> Option<&str> {
        self.meta.get("version").map(String::as_str)
    }
}

// === State ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub params: Vec<ParamDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Int,
    Float,
    Bool,
    String,
}

impl ParamType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(Self::Int),
            "float" | "number" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub range: Option<ParamRange>,
    pub initial: Value,
    pub span: Span,
}

/// Inclusive `[min, max]`; bounds may be infinite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    #[serde(with = "bound")]
    pub min: f64,
    #[serde(with = "bound")]
    pub max: f64,
}

/// JSON has no infinity, so bounds travel as numbers or "inf"/"-inf"
mod bound {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::value::{non_finite_name, parse_non_finite};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(non_finite_name(*value))
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => parse_non_finite(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid bound '{}'", s))),
        }
    }
}

// === Page ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub size: Option<PageSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
    pub units: String,
}

// === Grids ===

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    #[default]
    Grid,
    Linear,
    Graph,
    Spatial,
}

impl Topology {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "grid" => Some(Self::Grid),
            "linear" => Some(Self::Linear),
            "graph" => Some(Self::Graph),
            "spatial" => Some(Self::Spatial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxGrid {
    pub name: String,
    pub topology: Topology,
    pub page: Option<i64>,
    pub rows: Option<usize>,
    pub cols: Option<usize>,
    pub cells: Vec<FluxCell>,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxCell {
    pub id: String,
    pub tags: Vec<String>,
    pub content: String,
    pub dynamic: f64,
    pub density: f64,
    pub salience: f64,
}

// === Rules ===

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    #[default]
    Docstep,
    Event,
    Timer,
}

impl RuleMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "docstep" => Some(Self::Docstep),
            "event" => Some(Self::Event),
            "timer" => Some(Self::Timer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleScope {
    pub grid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxRule {
    pub name: String,
    pub mode: RuleMode,
    pub scope: RuleScope,
    pub on_event_type: Option<String>,
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    pub else_branch: Vec<Stmt>,
    pub span: Span,
}

/// Statements inside rule branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Stmt {
    /// `target = value;`
    Assign { target: Expr, value: Expr, span: Span },
    /// `let name = value;`
    Let { name: String, value: Expr, span: Span },
    /// `advanceDocstep();`
    AdvanceDocstep { span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Self::Assign { span, .. } | Self::Let { span, .. } | Self::AdvanceDocstep { span } => *span,
        }
    }
}

// === Expressions ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    /// Literal value
    Literal { value: Value },

    /// Identifier reference
    Identifier { name: String },

    /// Member access: `object.property`
    Member { object: Box<Expr>, property: String },

    /// Ordinary call: `callee(args)`
    Call { callee: Box<Expr>, args: Vec<Expr>, span: Span },

    /// `neighbors.<method>(args)`; only meaningful in grid-scoped rules
    NeighborsCall { method: String, args: Vec<Expr>, span: Span },

    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },

    /// List literal: `[a, b, c]`
    List { items: Vec<Expr> },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal { value: value.into() }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    /// Dotted name for `a.b.c` chains of identifiers, e.g. `assets.pick`
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Self::Identifier { name } => Some(name.clone()),
            Self::Member { object, property } => {
                object.dotted_name().map(|base| format!("{}.{}", base, property))
            }
            _ => None,
        }
    }

    /// Pre-order walk over this expression and all sub-expressions
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Self::Literal { .. } | Self::Identifier { .. } => {}
            Self::Member { object, .. } => object.walk(visit),
            Self::Call { callee, args, .. } => {
                callee.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            Self::NeighborsCall { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Self::Unary { operand, .. } => operand.walk(visit),
            Self::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::List { items } => {
                for item in items {
                    item.walk(visit);
                }
            }
        }
    }

    /// Constant value if the expression contains no references or calls
    pub fn as_constant(&self) -> Option<Value> {
        match self {
            Self::Literal { value } => Some(value.clone()),
            Self::List { items } => items.iter()
                .map(Expr::as_constant)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            Self::Unary { op: UnaryOp::Neg, operand } => match operand.as_constant()? {
                Value::Int(n) => Some(Value::Int(-n)),
                Value::Float(f) => Some(Value::Float(-f)),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::StrictEq => "===",
            Self::Ne => "!=",
            Self::StrictNe => "!==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// Comparison and logical operators produce booleans
    pub fn is_boolean(&self) -> bool {
        !matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Logical not: !x
    Not,
}

// === Runtime block ===

/// Time units accepted after a numeric duration amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Ms,
    S,
    M,
    H,
    Bar,
    Beat,
    Sub,
    Tick,
}

impl DurationUnit {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ms" => Some(Self::Ms),
            "s" => Some(Self::S),
            "m" => Some(Self::M),
            "h" => Some(Self::H),
            "bar" | "bars" => Some(Self::Bar),
            "beat" | "beats" => Some(Self::Beat),
            "sub" | "subs" => Some(Self::Sub),
            "tick" | "ticks" => Some(Self::Tick),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ms => "ms",
            Self::S => "s",
            Self::M => "m",
            Self::H => "h",
            Self::Bar => "bar",
            Self::Beat => "beat",
            Self::Sub => "sub",
            Self::Tick => "tick",
        }
    }

    /// Seconds per unit; musical units have no fixed length
    pub fn seconds_per_unit(&self) -> Option<f64> {
        match self {
            Self::Ms => Some(0.001),
            Self::S => Some(1.0),
            Self::M => Some(60.0),
            Self::H => Some(3600.0),
            Self::Bar | Self::Beat | Self::Sub | Self::Tick => None,
        }
    }
}

/// A parsed duration literal.
///
/// `amount` is normalised to seconds for clock units (`ms`, `s`, `m`, `h`)
/// and kept as the raw scalar for musical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub amount: f64,
    pub unit: DurationUnit,
}

impl Duration {
    pub fn new(raw_amount: f64, unit: DurationUnit) -> Self {
        let amount = match unit.seconds_per_unit() {
            Some(factor) => raw_amount * factor,
            None => raw_amount,
        };
        Self { amount, unit }
    }

    /// Length in seconds, if the unit is a clock unit
    pub fn seconds(&self) -> Option<f64> {
        self.unit.seconds_per_unit().map(|_| self.amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub events_apply: Option<String>,
    pub docstep_advance: Vec<DocstepAdvance>,
    pub span: Span,
}

impl RuntimeConfig {
    /// First timer-driven docstep advance, if any
    pub fn timer(&self) -> Option<&Duration> {
        self.docstep_advance.iter().find_map(|advance| match advance {
            DocstepAdvance::Timer { duration, .. } => Some(duration),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DocstepAdvance {
    Timer { duration: Duration, span: Span },
}

// === Content tree ===

/// When a node's dynamic properties are re-evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RefreshPolicy {
    #[default]
    OnLoad,
    Never,
    OnDocstep,
    Every { amount: f64, unit: DurationUnit },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: String,
    pub duration: Option<Duration>,
    pub ease: Option<String>,
}

/// A node property: literal, or an expression resolved at render time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum NodePropValue {
    Literal(Value),
    Dynamic(Expr),
}

impl NodePropValue {
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Dynamic(_) => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub kind: String,
    pub props: BTreeMap<String, NodePropValue>,
    pub children: Vec<DocumentNode>,
    pub refresh: Option<RefreshPolicy>,
    pub transition: Option<Transition>,
    pub span: Span,
}

impl DocumentNode {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: BTreeMap::new(),
            children: Vec::new(),
            refresh: None,
            transition: None,
            span: Span::default(),
        }
    }

    /// Slot-like nodes are the only ones allowed to carry refresh/transition
    pub fn is_slot(&self) -> bool {
        self.kind == "slot" || self.kind == "inline_slot"
    }

    /// Pre-order walk over this node and its descendants
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a DocumentNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

// === Assets ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDecl {
    pub name: String,
    pub kind: String,
    pub path: String,
    pub tags: Vec<String>,
    pub weight: f64,
    pub meta: BTreeMap<String, Value>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankDecl {
    pub name: String,
    pub kind: String,
    pub root: String,
    pub include: String,
    pub tags: Vec<String>,
    pub weight: f64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDecl {
    pub name: String,
    pub material_kind: String,
    pub tags: Vec<String>,
    pub weight: f64,
    pub label: Option<String>,
    pub color: Option<String>,
    pub score: Option<BTreeMap<String, Value>>,
    pub midi: Option<BTreeMap<String, Value>>,
    pub video: Option<BTreeMap<String, Value>>,
    pub span: Span,
}

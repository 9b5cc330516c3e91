//! Evaluator for dynamic node properties
//!
//! Sees `params`, `meta`, `time`/`timeSeconds`, `docstep` and the builtins in
//! [`crate::builtins`]. Randomness comes from the [`Mulberry32`] stream the
//! caller seeds per property, so results only depend on the inputs.

use std::collections::BTreeMap;

use flux_assets::AssetCatalog;
use flux_lang::{eval_binary, eval_unary, BinaryOp, Expr, Mulberry32, Value};

use crate::builtins;
use crate::EvalError;

/// Read-only inputs of one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub params: &'a BTreeMap<String, Value>,
    pub meta: &'a BTreeMap<String, String>,
    pub time: f64,
    pub docstep: u64,
    /// `label` prop value to the id of the node carrying it
    pub labels: &'a BTreeMap<String, String>,
    pub catalog: &'a AssetCatalog,
}

pub struct Evaluator<'a> {
    pub(crate) ctx: EvalContext<'a>,
    pub(crate) rng: Mulberry32,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvalContext<'a>, rng: Mulberry32) -> Self {
        Self { ctx, rng }
    }

    pub fn context(&self) -> &EvalContext<'a> {
        &self.ctx
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal { value } => Ok(value.clone()),

            Expr::Identifier { name } => self.lookup(name),

            Expr::Member { object, property } => {
                let object = self.evaluate(object)?;
                member(&object, property)
            }

            Expr::Call { callee, args, .. } => {
                let name = callee
                    .dotted_name()
                    .ok_or_else(|| EvalError::UnsupportedCall("<expression>".to_string()))?;
                let args = args.iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                builtins::call(self, &name, args)
            }

            Expr::NeighborsCall { method, .. } => Err(EvalError::NeighborsOutsideRule(method.clone())),

            Expr::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                Ok(eval_unary(*op, &operand)?)
            }

            Expr::Binary { op: BinaryOp::And, left, right } => {
                if !self.evaluate(left)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(right)?.is_truthy()))
            }

            Expr::Binary { op: BinaryOp::Or, left, right } => {
                if self.evaluate(left)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate(right)?.is_truthy()))
            }

            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(eval_binary(*op, &left, &right)?)
            }

            Expr::List { items } => items.iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        match name {
            "params" => Ok(Value::Object(self.ctx.params.clone())),
            "meta" => Ok(Value::Object(
                self.ctx.meta.iter().map(|(k, v)| (k.clone(), Value::str(v.as_str()))).collect(),
            )),
            "time" | "timeSeconds" => Ok(Value::Float(self.ctx.time)),
            "docstep" => Ok(Value::Int(self.ctx.docstep as i64)),
            _ => self.ctx.params
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownIdentifier(name.to_string())),
        }
    }
}

fn member(object: &Value, property: &str) -> Result<Value, EvalError> {
    match object {
        Value::Null => Err(EvalError::NullMember(property.to_string())),
        Value::Object(fields) => Ok(fields.get(property).cloned().unwrap_or(Value::Null)),
        Value::List(items) if property == "length" => Ok(Value::Int(items.len() as i64)),
        Value::String(s) if property == "length" => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(EvalError::Type(format!(
            "cannot read property '{}' of {}",
            property,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_lang::parse_expression;

    struct Fixture {
        params: BTreeMap<String, Value>,
        meta: BTreeMap<String, String>,
        labels: BTreeMap<String, String>,
        catalog: AssetCatalog,
    }

    impl Fixture {
        fn new() -> Self {
            let mut params = BTreeMap::new();
            params.insert("tempo".to_string(), Value::Float(120.0));
            params.insert("open".to_string(), Value::Bool(true));
            let mut meta = BTreeMap::new();
            meta.insert("title".to_string(), "Demo".to_string());
            Self {
                params,
                meta,
                labels: BTreeMap::new(),
                catalog: AssetCatalog::default(),
            }
        }

        fn eval(&self, source: &str) -> Result<Value, EvalError> {
            let ctx = EvalContext {
                params: &self.params,
                meta: &self.meta,
                time: 2.5,
                docstep: 4,
                labels: &self.labels,
                catalog: &self.catalog,
            };
            let expr = parse_expression(source).unwrap();
            Evaluator::new(ctx, Mulberry32::new(1)).evaluate(&expr)
        }
    }

    #[test]
    fn test_identifiers() {
        let f = Fixture::new();
        assert_eq!(f.eval("params.tempo + 1").unwrap(), Value::Float(121.0));
        assert_eq!(f.eval("tempo").unwrap(), Value::Float(120.0));
        assert_eq!(f.eval("docstep * 2").unwrap(), Value::Int(8));
        assert_eq!(f.eval("time").unwrap(), Value::Float(2.5));
        assert_eq!(f.eval("meta.title").unwrap(), Value::str("Demo"));
        assert_eq!(f.eval("params.missing").unwrap(), Value::Null);
    }

    #[test]
    fn test_logic_short_circuits() {
        let f = Fixture::new();
        assert_eq!(f.eval("params.open or undefinedThing").unwrap(), Value::Bool(true));
        assert_eq!(f.eval("!params.open && undefinedThing").unwrap(), Value::Bool(false));
        assert_eq!(
            f.eval("undefinedThing").unwrap_err(),
            EvalError::UnknownIdentifier("undefinedThing".to_string())
        );
    }

    #[test]
    fn test_member_errors() {
        let f = Fixture::new();
        assert_eq!(f.eval("params.missing.x").unwrap_err(), EvalError::NullMember("x".to_string()));
        assert_eq!(f.eval("[1, 2, 3].length").unwrap(), Value::Int(3));
        assert!(matches!(f.eval("docstep.x"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_neighbors_rejected() {
        let f = Fixture::new();
        assert_eq!(
            f.eval("neighbors.all().dynamic").unwrap_err(),
            EvalError::NeighborsOutsideRule("all".to_string())
        );
        assert_eq!(
            f.eval("neighbors.all().dynamic").unwrap_err().to_string(),
            "neighbors.all() is only available inside grid-scoped rules"
        );
    }

    #[test]
    fn test_operator_errors() {
        let f = Fixture::new();
        assert!(matches!(f.eval("1 / 0"), Err(EvalError::Operator(_))));
        assert_eq!(f.eval("\"t=\" + time").unwrap(), Value::str("t=2.5"));
    }
}

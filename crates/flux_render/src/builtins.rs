//! Builtin functions of the render evaluator
//!
//! | call                              | result                                        |
//! |-----------------------------------|-----------------------------------------------|
//! | `choose(list)`                    | uniform pick from the property's stream       |
//! | `chooseStep(list, offset?)`       | `list[(docstep + offset) % len]`              |
//! | `cycle(list, index?)`             | `list[index % len]`, index defaults to docstep|
//! | `hashpick(list, key)`             | `list[stableHash(key) % len]`                 |
//! | `phase(x)`                        | fractional part, always in `[0, 1)`           |
//! | `lerp(a, b, t)`                   | `a + (b - a) * t`                             |
//! | `shuffle(list)` / `sample(list,n)`| random permutation / `n` distinct items       |
//! | `stableHash(...)`                 | hash of the arguments                         |
//! | `now()` / `timeSeconds()`         | evaluation time in seconds                    |
//! | `ref(label)`                      | id of the node carrying `label`               |
//! | `assets.pick(tags?, strategy?, seed?)` | one catalog entry, or null               |

use flux_assets::PickStrategy;
use flux_lang::{stable_hash, Mulberry32, Value};

use crate::eval::Evaluator;
use crate::EvalError;

/// Dispatch a call by its dotted name
pub fn call(ev: &mut Evaluator<'_>, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match name {
        "choose" => {
            expect_args(name, &args, 1, 1, "1")?;
            let items = list_arg(name, &args[0])?;
            if items.is_empty() {
                return Ok(Value::Null);
            }
            Ok(items[ev.rng.next_index(items.len())].clone())
        }

        "chooseStep" => {
            expect_args(name, &args, 1, 2, "1 or 2")?;
            let offset = match args.get(1) {
                Some(value) => int_arg(name, value)?,
                None => 0,
            };
            let index = (ev.ctx.docstep as i64).wrapping_add(offset);
            Ok(pick_wrapped(list_arg(name, &args[0])?, index))
        }

        "cycle" => {
            expect_args(name, &args, 1, 2, "1 or 2")?;
            let index = match args.get(1) {
                Some(value) => int_arg(name, value)?,
                None => ev.ctx.docstep as i64,
            };
            Ok(pick_wrapped(list_arg(name, &args[0])?, index))
        }

        "hashpick" => {
            expect_args(name, &args, 2, 2, "2")?;
            let items = list_arg(name, &args[0])?;
            if items.is_empty() {
                return Ok(Value::Null);
            }
            let index = stable_hash(&args[1..]) as usize % items.len();
            Ok(items[index].clone())
        }

        "phase" => {
            expect_args(name, &args, 1, 1, "1")?;
            let x = number_arg(name, &args[0])?;
            Ok(Value::Float(x - x.floor()))
        }

        "lerp" => {
            expect_args(name, &args, 3, 3, "3")?;
            let a = number_arg(name, &args[0])?;
            let b = number_arg(name, &args[1])?;
            let t = number_arg(name, &args[2])?;
            Ok(Value::Float(a + (b - a) * t))
        }

        "shuffle" => {
            expect_args(name, &args, 1, 1, "1")?;
            let mut items = list_arg(name, &args[0])?.to_vec();
            ev.rng.shuffle(&mut items);
            Ok(Value::List(items))
        }

        "sample" => {
            expect_args(name, &args, 2, 2, "2")?;
            let mut items = list_arg(name, &args[0])?.to_vec();
            let n = int_arg(name, &args[1])?.max(0) as usize;
            ev.rng.shuffle(&mut items);
            items.truncate(n);
            Ok(Value::List(items))
        }

        "stableHash" => Ok(Value::Int(i64::from(stable_hash(&args)))),

        "now" | "timeSeconds" => {
            expect_args(name, &args, 0, 0, "0")?;
            Ok(Value::Float(ev.ctx.time))
        }

        "ref" => {
            expect_args(name, &args, 1, 1, "1")?;
            let label = args[0]
                .as_str()
                .ok_or_else(|| EvalError::Type(format!("ref() expects a string label, got {}", args[0].type_name())))?;
            ev.ctx.labels
                .get(label)
                .map(|id| Value::str(id.as_str()))
                .ok_or_else(|| EvalError::UnknownLabel(label.to_string()))
        }

        "assets.pick" => assets_pick(ev, args),

        _ => Err(EvalError::UnsupportedCall(name.to_string())),
    }
}

fn assets_pick(ev: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    const NAME: &str = "assets.pick";
    expect_args(NAME, &args, 0, 3, "0 to 3")?;

    let tags: Vec<String> = match args.first() {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(tag)) => vec![tag.clone()],
        Some(Value::List(items)) => items.iter().map(Value::to_display_string).collect(),
        Some(other) => {
            return Err(EvalError::Type(format!(
                "{}() expects tags as a string or list, got {}",
                NAME,
                other.type_name()
            )))
        }
    };

    let strategy = match args.get(1) {
        None | Some(Value::Null) => PickStrategy::Uniform,
        Some(value) => {
            let name = value.as_str().ok_or_else(|| {
                EvalError::Type(format!("{}() expects the strategy as a string", NAME))
            })?;
            PickStrategy::from_name(name).map_err(|e| EvalError::Type(e.to_string()))?
        }
    };

    let picked = match args.get(2) {
        // An explicit seed draws from its own stream, not the property's
        Some(seed) if !seed.is_null() => {
            let mut rng = Mulberry32::from_values(&[Value::str(NAME), seed.clone()]);
            ev.ctx.catalog.pick(&tags, strategy, &mut rng)
        }
        _ => ev.ctx.catalog.pick(&tags, strategy, &mut ev.rng),
    };

    Ok(picked.map(|asset| asset.to_value()).unwrap_or(Value::Null))
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize, expected: &'static str) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn list_arg<'v>(name: &str, value: &'v Value) -> Result<&'v [Value], EvalError> {
    value
        .as_list()
        .ok_or_else(|| EvalError::Type(format!("{}() expects a list, got {}", name, value.type_name())))
}

fn number_arg(name: &str, value: &Value) -> Result<f64, EvalError> {
    value
        .as_f64()
        .ok_or_else(|| EvalError::Type(format!("{}() expects a number, got {}", name, value.type_name())))
}

fn int_arg(name: &str, value: &Value) -> Result<i64, EvalError> {
    Ok(number_arg(name, value)?.floor() as i64)
}

fn pick_wrapped(items: &[Value], index: i64) -> Value {
    if items.is_empty() {
        return Value::Null;
    }
    items[index.rem_euclid(items.len() as i64) as usize].clone()
}

// Evaluator for compiled enrichment rules.

use serde_json::{Number, Value};

use super::parser::{Assignment, Expr, Func, parse};
use super::{EnrichContext, Enricher, RuleError};
use crate::model::{FieldMap, RawNode};

/// A compiled expression rule.
///
/// Assignments run in order; each one sees the raw record plus every
/// output assigned before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    assignments: Vec<Assignment>,
}

impl Program {
    pub fn compile(src: &str) -> Result<Self, RuleError> {
        Ok(Self {
            assignments: parse(src)?,
        })
    }

    /// Output field names, in assignment order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.target.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl Enricher for Program {
    fn enrich(&self, node: &RawNode, ctx: &EnrichContext<'_>) -> Result<FieldMap, RuleError> {
        let mut outputs = FieldMap::new();
        for assignment in &self.assignments {
            let value = Scope {
                node,
                ctx,
                outputs: &outputs,
            }
            .eval(&assignment.expr)?;
            outputs.insert(assignment.target.clone(), value);
        }
        Ok(outputs)
    }
}

struct Scope<'a> {
    node: &'a RawNode,
    ctx: &'a EnrichContext<'a>,
    outputs: &'a FieldMap,
}

impl Scope<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, RuleError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::BaseUrl => Ok(Value::String(self.ctx.base_url.to_owned())),
            Expr::Field(path) => Ok(self.field(path)),
            Expr::Output(name) => Ok(self.outputs.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Add(lhs, rhs) => add(self.eval(lhs)?, self.eval(rhs)?),
            Expr::Call(func, args) => self.call(*func, args),
        }
    }

    fn field(&self, path: &[String]) -> Value {
        let Some((head, rest)) = path.split_first() else {
            return Value::Null;
        };
        let mut current = self.node.get(head);
        for segment in rest {
            current = current.and_then(|v| v.get(segment));
        }
        current.cloned().unwrap_or(Value::Null)
    }

    fn call(&self, func: Func, args: &[Expr]) -> Result<Value, RuleError> {
        match func {
            Func::Concat => {
                let mut out = String::new();
                for arg in args {
                    let v = self.eval(arg)?;
                    if !v.is_null() {
                        out.push_str(&text(&v, "concat")?);
                    }
                }
                Ok(Value::String(out))
            }
            Func::Upper => self.map_text(args, "upper", |s| s.to_uppercase()),
            Func::Lower => self.map_text(args, "lower", |s| s.to_lowercase()),
            Func::Trim => self.map_text(args, "trim", |s| s.trim().to_owned()),
            Func::Coalesce | Func::Default => {
                for arg in args {
                    let v = self.eval(arg)?;
                    if !v.is_null() {
                        return Ok(v);
                    }
                }
                Ok(Value::Null)
            }
            Func::Url => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    let v = self.eval(arg)?;
                    if v.is_null() {
                        return Err(RuleError::NullOperand {
                            operation: "url()".into(),
                        });
                    }
                    parts.push(text(&v, "url")?);
                }
                Ok(Value::String(join_url(&parts)))
            }
            Func::Len => {
                let len = match self.eval(&args[0])? {
                    Value::Null => 0,
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    other => other.to_string().chars().count(),
                };
                Ok(Value::Number(Number::from(len)))
            }
        }
    }

    /// Apply a string transform; null passes through unchanged.
    fn map_text(
        &self,
        args: &[Expr],
        name: &str,
        f: impl Fn(&str) -> String,
    ) -> Result<Value, RuleError> {
        match self.eval(&args[0])? {
            Value::Null => Ok(Value::Null),
            v => Ok(Value::String(f(&text(&v, name)?))),
        }
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, RuleError> {
    if lhs.is_null() || rhs.is_null() {
        return Err(RuleError::NullOperand {
            operation: "'+'".into(),
        });
    }
    if let (Value::Number(a), Value::Number(b)) = (&lhs, &rhs) {
        if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
            if let Some(sum) = a.checked_add(b) {
                return Ok(Value::Number(Number::from(sum)));
            }
        }
        let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
        return Number::from_f64(sum)
            .map(Value::Number)
            .ok_or_else(|| RuleError::Type(format!("'+' produced a non-finite number ({sum})")));
    }
    let mut out = text(&lhs, "'+'")?;
    out.push_str(&text(&rhs, "'+'")?);
    Ok(Value::String(out))
}

/// Scalar rendered as text. Objects and arrays cannot be used as text.
fn text(value: &Value, operation: &str) -> Result<String, RuleError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(RuleError::NullOperand {
            operation: operation.to_owned(),
        }),
        Value::Array(_) | Value::Object(_) => Err(RuleError::Type(format!(
            "{operation} expects text, got a structured value"
        ))),
    }
}

/// Join URL parts with exactly one `/` between them.
pub(crate) fn join_url(parts: &[String]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(part.trim_end_matches('/'));
            continue;
        }
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(part);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn node(value: Value) -> RawNode {
        RawNode::new(serde_json::from_value(value).unwrap())
    }

    fn ctx() -> EnrichContext<'static> {
        EnrichContext {
            base_url: "https://acme.example.com/",
            primary_key_field: "Id",
        }
    }

    fn run(src: &str, record: Value) -> Result<FieldMap, RuleError> {
        let program = Program::compile(src).expect("compile failed");
        program.enrich(&node(record), &ctx())
    }

    #[test]
    fn builds_record_link() {
        let out = run(
            "recordUrl = url(baseUrl, Id)\nlabel = upper(Name) + ' (' + Type + ')'",
            json!({"Id": "001A", "Name": "Acme", "Type": "Customer"}),
        )
        .unwrap();

        assert_eq!(out["recordUrl"], json!("https://acme.example.com/001A"));
        assert_eq!(out["label"], json!("ACME (Customer)"));
    }

    #[test]
    fn numbers_add_and_strings_concatenate() {
        let out = run(
            "total = Amount + 5; tag = 'n' + Amount; ratio = Rate + 0.5",
            json!({"Amount": 10, "Rate": 1.25}),
        )
        .unwrap();

        assert_eq!(out["total"], json!(15));
        assert_eq!(out["tag"], json!("n10"));
        assert_eq!(out["ratio"], json!(1.75));
    }

    #[test]
    fn missing_field_is_null_and_null_plus_fails() {
        let out = run("x = Missing", json!({})).unwrap();
        assert_eq!(out["x"], Value::Null);

        let err = run("x = 'a' + Missing", json!({})).expect_err("null operand");
        assert_eq!(
            err,
            RuleError::NullOperand {
                operation: "'+'".into()
            }
        );
    }

    #[test]
    fn coalesce_default_and_outputs() {
        let out = run(
            "name = coalesce(Nick, Name, 'anon')\nshout = default(Missing, $name)\nn = len($name)",
            json!({"Name": "Zed"}),
        )
        .unwrap();

        assert_eq!(out["name"], json!("Zed"));
        assert_eq!(out["shout"], json!("Zed"));
        assert_eq!(out["n"], json!(3));
    }

    #[test]
    fn nested_paths_read_objects() {
        let out = run(
            "owner = lower(record.Owner.Name)",
            json!({"Owner": {"Name": "Amy Pond"}}),
        )
        .unwrap();
        assert_eq!(out["owner"], json!("amy pond"));
    }

    #[test]
    fn structured_values_are_not_text() {
        let err = run("x = concat(Owner)", json!({"Owner": {"Name": "A"}}))
            .expect_err("object is not text");
        assert!(matches!(err, RuleError::Type(_)));
    }

    #[test]
    fn url_joins_with_single_slashes() {
        assert_eq!(
            join_url(&["https://h/".into(), "/lightning/r/".into(), "001".into()]),
            "https://h/lightning/r/001"
        );
    }

    #[test]
    fn outputs_are_listed_in_order() {
        let program =
            Program::compile("b = 1; a = 2").expect("compile failed");
        assert_eq!(program.outputs().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}

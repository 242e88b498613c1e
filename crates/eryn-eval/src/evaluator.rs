//! Evaluates a parsed [`Expr`] against `context`/`local`/`shared`, and the
//! [`Bridge`] implementation that wires that evaluation into
//! `eryn_render`'s decode loop.

use eryn_compiler::localize;
use eryn_render::{Bridge, LoopIterable};

use crate::error::{EvalError, EvalResult};
use crate::expr::{Accessor, CompareOp, Expr, Root, TemplatePart};
use crate::value::{loop_iterable, Value};

/// Which expression grammar subset is accepted: `normal` is the full
/// literal + dotted-accessor + comparison language; `strict` additionally
/// rejects anything but literals and `context`/`local`/`shared` accessor
/// chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    strict: bool,
}

impl Evaluator {
    #[must_use]
    pub fn normal() -> Self {
        Self { strict: false }
    }

    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn parse(&self, source: &str) -> EvalResult<Expr> {
        let expr = crate::expr::parse(source)?;
        if self.strict && !expr.is_strict_allowed() {
            return Err(EvalError::TooComplexForStrict);
        }
        Ok(expr)
    }
}

/// Owns `context`/`local`/`shared` and evaluates expressions against them;
/// the concrete [`Bridge`] this crate hands the renderer.
#[derive(Debug, Clone)]
pub struct EvalState {
    pub context: Value,
    pub local: Value,
    pub shared: Value,
    evaluator: Evaluator,
}

impl EvalState {
    #[must_use]
    pub fn new(evaluator: Evaluator, context: Value, shared: Value) -> Self {
        Self { context, local: Value::object(), shared, evaluator }
    }

    fn root(&self, root: &Root) -> &Value {
        match root {
            Root::Context => &self.context,
            Root::Local => &self.local,
            Root::Shared => &self.shared,
        }
    }

    fn eval_accessor(&self, base: &Value, accessor: &Accessor) -> EvalResult<Value> {
        match accessor {
            Accessor::Field(name) => Ok(base.field(name).cloned().unwrap_or(Value::Null)),
            Accessor::Index(inner) => {
                let index = self.eval(inner)?;
                let key = match &index {
                    Value::Str(s) => s.clone(),
                    Value::I64(n) => n.to_string(),
                    _ => return Err(EvalError::FieldAccessOnScalar(format!("{index:?}"))),
                };
                Ok(base.field(&key).cloned().unwrap_or(Value::Null))
            }
        }
    }

    fn eval_path(&self, root: &Root, bare_name: &Option<String>, chain: &[Accessor]) -> EvalResult<Value> {
        let mut value = if let Some(name) = bare_name { self.root(root).field(name).cloned().unwrap_or(Value::Null) } else { self.root(root).clone() };
        for accessor in chain {
            value = self.eval_accessor(&value, accessor)?;
        }
        Ok(value)
    }

    /// Evaluates an already-parsed expression against this state's
    /// `context`/`local`/`shared`.
    pub fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::I64(*n)),
            Expr::Float(n) => Ok(Value::F64(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::TemplateLiteral(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(t) => out.push_str(t),
                        TemplatePart::Interpolate(e) => {
                            let v = self.eval(e)?;
                            out.push_str(&stringify_for_template(&v));
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Array(items) => items.iter().map(|e| self.eval(e)).collect::<EvalResult<Vec<_>>>().map(Value::Array),
            Expr::Object(fields) => {
                let mut map = indexmap::IndexMap::new();
                for (key, value_expr) in fields {
                    map.insert(key.clone(), self.eval(value_expr)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Path { root, bare_name, chain } => self.eval_path(root, bare_name, chain),
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.truthy())),
            Expr::And(a, b) => {
                let left = self.eval(a)?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval(b)
            }
            Expr::Or(a, b) => {
                let left = self.eval(a)?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval(b)
            }
            Expr::Compare(a, op, b) => {
                let left = self.eval(a)?;
                let right = self.eval(b)?;
                Ok(Value::Bool(match op {
                    CompareOp::Eq => left.loosely_eq(&right),
                    CompareOp::Ne => !left.loosely_eq(&right),
                    CompareOp::Lt => left.partial_compare(&right).ok_or(EvalError::Incomparable)? == std::cmp::Ordering::Less,
                    CompareOp::Le => left.partial_compare(&right).ok_or(EvalError::Incomparable)? != std::cmp::Ordering::Greater,
                    CompareOp::Gt => left.partial_compare(&right).ok_or(EvalError::Incomparable)? == std::cmp::Ordering::Greater,
                    CompareOp::Ge => left.partial_compare(&right).ok_or(EvalError::Incomparable)? != std::cmp::Ordering::Less,
                }))
            }
        }
    }

    fn parse_and_eval(&self, expr: &[u8]) -> Result<Value, String> {
        let source = core::str::from_utf8(expr).map_err(|e| e.to_string())?;
        let parsed = self.evaluator.parse(source).map_err(|e| e.to_string())?;
        self.eval(&parsed).map_err(|e| e.to_string())
    }
}

/// Matches the namespaced form `eryn_compiler::localize` splices into
/// expressions referencing this iterator, so a loop's own assignment lands
/// under the same key its body's localized references look up.
fn localized_key(iterator: &[u8]) -> String {
    let mut key = Vec::with_capacity(localize::PREFIX.len() + iterator.len() + localize::SUFFIX.len());
    key.extend_from_slice(localize::PREFIX);
    key.extend_from_slice(iterator);
    key.extend_from_slice(localize::SUFFIX);
    String::from_utf8_lossy(&key).into_owned()
}

fn stringify_for_template(value: &Value) -> String {
    use eryn_render::RenderValue;
    if value.is_nullish() {
        String::new()
    } else if value.is_string() {
        String::from_utf8_lossy(value.as_bytes()).into_owned()
    } else if value.is_number() {
        value.as_number_string()
    } else if value.is_boolean() {
        if value.as_bool() { "true" } else { "false" }.to_string()
    } else {
        String::from_utf8_lossy(&value.to_json_bytes()).into_owned()
    }
}

impl Bridge for EvalState {
    type Value = Value;
    type Backup = Value;

    fn eval_template(&mut self, expr: &[u8]) -> Result<Option<Value>, String> {
        self.parse_and_eval(expr).map(Some)
    }

    fn eval_void_template(&mut self, expr: &[u8]) -> Result<(), String> {
        if self.evaluator.strict {
            return Err("void templates are not supported in 'strict' mode".to_string());
        }
        self.parse_and_eval(expr).map(|_| ())
    }

    fn eval_conditional_template(&mut self, expr: &[u8]) -> Result<bool, String> {
        self.parse_and_eval(expr).map(|v| v.truthy())
    }

    fn init_loop_iterable(&mut self, expr: &[u8]) -> Result<LoopIterable<Value>, String> {
        let value = self.parse_and_eval(expr)?;
        loop_iterable(&value).ok_or_else(|| "loop expression must evaluate to an array or object".to_string())
    }

    fn eval_iterator_array_assignment(&mut self, clone: bool, iterator: &[u8], iterable: &Value, index: usize) {
        let key = localized_key(iterator);
        let elem = match iterable {
            Value::Array(items) => items.get(index).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        };
        self.assign_local(key, self.copy_value(clone, &elem));
    }

    fn eval_iterator_object_assignment(&mut self, clone: bool, iterator: &[u8], iterable: &Value, keys: &[String], index: usize) {
        let key_name = keys.get(index).cloned().unwrap_or_default();
        let elem = iterable.field(&key_name).cloned().unwrap_or(Value::Null);
        let mut entry = indexmap::IndexMap::new();
        entry.insert("key".to_string(), Value::Str(key_name));
        entry.insert("value".to_string(), self.copy_value(clone, &elem));
        self.assign_local(localized_key(iterator), Value::Object(entry));
    }

    fn unassign(&mut self, iterator: &[u8]) {
        let key = localized_key(iterator);
        if let Value::Object(map) = &mut self.local {
            map.shift_remove(&key);
        }
    }

    fn copy_value(&self, _clone: bool, value: &Value) -> Value {
        value.clone()
    }

    fn backup_context(&mut self, _clone: bool) -> Value {
        self.context.clone()
    }

    fn backup_local(&mut self, _clone: bool) -> Value {
        self.local.clone()
    }

    fn init_context(&mut self, expr: &[u8]) -> Result<(), String> {
        self.context = if expr.is_empty() { Value::object() } else { self.parse_and_eval(expr)? };
        Ok(())
    }

    fn init_local(&mut self) {
        self.local = Value::object();
    }

    fn restore_context(&mut self, backup: Value) {
        self.context = backup;
    }

    fn restore_local(&mut self, backup: Value) {
        self.local = backup;
    }
}

impl EvalState {
    fn assign_local(&mut self, key: String, value: Value) {
        if let Value::Object(map) = &mut self.local {
            map.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state() -> EvalState {
        let mut context = indexmap::IndexMap::new();
        context.insert("name".to_string(), Value::Str("World".to_string()));
        context.insert("count".to_string(), Value::I64(3));
        EvalState::new(Evaluator::normal(), Value::Object(context), Value::object())
    }

    #[test]
    fn evaluates_dotted_accessor() {
        let mut s = state();
        assert_eq!(s.eval_template(b"context.name").unwrap(), Some(Value::Str("World".to_string())));
    }

    #[test]
    fn evaluates_comparison() {
        let mut s = state();
        assert!(s.eval_conditional_template(b"context.count > 1").unwrap());
        assert!(!s.eval_conditional_template(b"context.count > 10").unwrap());
    }

    #[test]
    fn evaluates_template_literal_interpolation() {
        let mut s = state();
        assert_eq!(s.eval_template(b"`Hi, ${context.name}!`").unwrap(), Some(Value::Str("Hi, World!".to_string())));
    }

    #[test]
    fn strict_mode_rejects_comparison() {
        let mut s = state();
        s.evaluator = Evaluator::strict();
        assert!(s.eval_conditional_template(b"context.count > 1").is_err());
        assert_eq!(s.eval_template(b"context.name").unwrap(), Some(Value::Str("World".to_string())));
    }

    #[test]
    fn loop_iterable_over_array() {
        let mut ctx = indexmap::IndexMap::new();
        ctx.insert("items".to_string(), Value::Array(vec![Value::I64(1), Value::I64(2)]));
        let mut s = EvalState::new(Evaluator::normal(), Value::Object(ctx), Value::object());
        let iterable = s.init_loop_iterable(b"context.items").unwrap();
        assert_eq!(iterable.length, 2);
        assert!(iterable.is_array);
        s.eval_iterator_array_assignment(false, b"i", &iterable.iterable, 1);
        assert_eq!(s.eval_template(b"__local__i").unwrap(), Some(Value::I64(2)));
    }
}

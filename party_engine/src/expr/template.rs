//! `{{ expr }}` placeholder resolution and deep interpolation.

use super::{
    context::EvalContext,
    eval::{evaluate, to_text, truthy},
    parser::parse,
};
use log::warn;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("placeholder regex must compile"));

/// Resolves configuration values against one evaluation context.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    context: EvalContext<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(context: EvalContext<'a>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> EvalContext<'a> {
        self.context
    }

    /// Resolves a single value.
    ///
    /// Non-strings come back unchanged. A string that is exactly one
    /// placeholder yields the natively typed result; a string mixing text and
    /// placeholders yields the interpolated string. If any placeholder fails to
    /// evaluate, the original string is returned as is.
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => self.resolve_str(text),
            other => other.clone(),
        }
    }

    pub fn resolve_str(&self, text: &str) -> Value {
        let placeholders: Vec<_> = PLACEHOLDER.captures_iter(text).collect();
        if placeholders.is_empty() {
            return Value::String(text.to_string());
        }

        if let [only] = placeholders.as_slice()
            && only.get(0).is_some_and(|m| m.start() == 0 && m.end() == text.len())
        {
            let source = only.get(1).map_or("", |m| m.as_str());
            return match self.evaluate(source) {
                Some(value) => value,
                None => Value::String(text.to_string()),
            };
        }

        let mut output = String::with_capacity(text.len());
        let mut last_index = 0;
        for captures in &placeholders {
            let (Some(full), Some(source)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            output.push_str(&text[last_index..full.start()]);
            match self.evaluate(source.as_str()) {
                Some(value) => output.push_str(&to_text(&value)),
                None => return Value::String(text.to_string()),
            }
            last_index = full.end();
        }
        output.push_str(&text[last_index..]);
        Value::String(output)
    }

    /// Deep-copies a tree, resolving every string leaf. Object keys are kept
    /// verbatim; the input is never modified.
    pub fn interpolate(&self, tree: &Value) -> Value {
        match tree {
            Value::String(text) => self.resolve_str(text),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.interpolate(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| (key.clone(), self.interpolate(v)))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    /// Evaluates a condition.
    ///
    /// A string condition may be a single `{{ expr }}`, a bare expression, or
    /// a mixed template whose interpolated text is tested. Evaluation failure
    /// counts as false.
    pub fn test(&self, condition: &Value) -> bool {
        let Value::String(text) = condition else {
            return truthy(condition);
        };
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix("{{")
            .and_then(|rest| rest.strip_suffix("}}"))
            .filter(|inner| !inner.contains("{{") && !inner.contains("}}"));

        match inner {
            Some(source) => self.evaluate(source).is_some_and(|v| truthy(&v)),
            None if trimmed.contains("{{") => match self.resolve_str(text) {
                Value::String(resolved) if resolved == *text => {
                    warn!("Condition {text:?} could not be resolved, treating as false");
                    false
                }
                resolved => truthy(&resolved),
            },
            None => self.evaluate(trimmed).is_some_and(|v| truthy(&v)),
        }
    }

    fn evaluate(&self, source: &str) -> Option<Value> {
        match parse(source.trim()).and_then(|expr| evaluate(&expr, &self.context)) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Unresolved expression {{{{{source}}}}}: {e}");
                None
            }
        }
    }
}

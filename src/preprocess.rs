//! Conditional directives for stylesheet sources.
//!
//! Lines between `// @if ENV='production'` and `// @endif` are kept only when
//! the condition holds. Block comment forms (`/* @if ... */`) work the same
//! way, and `/* @echo ENV */` is replaced inline with the variable's value.
//! Conditions compare with `=`, `==` or `!=`. Blocks nest.

use crate::env::Environment;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

static CONDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\w+)\s*(==|!=|=)\s*(?:'([^']*)'|"([^"]*)"|(\S+))$"#).unwrap()
});

static ECHO: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*\s*@echo\s+(\w+)\s*\*/").unwrap());

/// Error while preprocessing a source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreprocessError {
    #[error("line {line}: malformed condition '{condition}'")]
    BadCondition { line: usize, condition: String },
    #[error("line {line}: @endif without matching @if")]
    StrayEndif { line: usize },
    #[error("line {line}: @if is never closed")]
    Unterminated { line: usize },
    #[error("line {line}: unknown variable '{name}' in @echo")]
    UnknownVariable { line: usize, name: String },
}

/// Variables visible to directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessContext {
    vars: BTreeMap<String, String>,
}

impl PreprocessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with `ENV` set to the environment tag.
    pub fn for_environment(environment: Environment) -> Self {
        Self::new().with("ENV", environment.to_string())
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

enum Directive<'a> {
    If(&'a str),
    Endif,
}

/// Recognise a directive line in either comment form.
fn directive(line: &str) -> Option<Directive<'_>> {
    let trimmed = line.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("//") {
        rest.trim()
    } else if let Some(rest) = trimmed.strip_prefix("/*").and_then(|r| r.strip_suffix("*/")) {
        rest.trim()
    } else {
        return None;
    };

    if let Some(condition) = body.strip_prefix("@if ") {
        Some(Directive::If(condition.trim()))
    } else if body == "@endif" {
        Some(Directive::Endif)
    } else {
        None
    }
}

fn evaluate(condition: &str, line: usize, ctx: &PreprocessContext) -> Result<bool, PreprocessError> {
    let caps = CONDITION.captures(condition).ok_or_else(|| PreprocessError::BadCondition {
        line,
        condition: condition.to_string(),
    })?;

    let actual = ctx.get(&caps[1]).unwrap_or("");
    let expected = caps.get(3).or(caps.get(4)).or(caps.get(5)).map_or("", |m| m.as_str());

    Ok(match &caps[2] {
        "!=" => actual != expected,
        _ => actual == expected,
    })
}

fn echo(line: &str, number: usize, ctx: &PreprocessContext) -> Result<String, PreprocessError> {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for caps in ECHO.captures_iter(line) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
        let value = ctx.get(name.as_str()).ok_or_else(|| PreprocessError::UnknownVariable {
            line: number,
            name: name.as_str().to_string(),
        })?;
        out.push_str(&line[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&line[last..]);
    Ok(out)
}

/// Apply directives to `source`.
///
/// Directive lines themselves are removed from the output; every other line
/// keeps its line ending.
pub fn preprocess(source: &str, ctx: &PreprocessContext) -> Result<String, PreprocessError> {
    // (line of the @if, whether the block is active)
    let mut stack: Vec<(usize, bool)> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for (idx, line) in source.split_inclusive('\n').enumerate() {
        let number = idx + 1;
        let active = stack.last().map_or(true, |(_, active)| *active);

        match directive(line) {
            Some(Directive::If(condition)) => {
                let holds = active && evaluate(condition, number, ctx)?;
                stack.push((number, holds));
            }
            Some(Directive::Endif) => {
                if stack.pop().is_none() {
                    return Err(PreprocessError::StrayEndif { line: number });
                }
            }
            None if active => out.push_str(&echo(line, number, ctx)?),
            None => {}
        }
    }

    if let Some((line, _)) = stack.pop() {
        return Err(PreprocessError::Unterminated { line });
    }

    Ok(out)
}

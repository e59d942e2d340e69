//! Calculator tool — evaluates mathematical expressions.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, unary negation, and decimal
//! numbers via a precedence-climbing parser over the raw input. No
//! dependencies beyond std.

use async_trait::async_trait;

use ferrite_core::error::ToolError;
use ferrite_core::schema::ParamSpec;
use ferrite_core::tool::{Tool, ToolContext};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, parentheses, and decimal numbers."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("expression")
                .describe("The mathematical expression to evaluate, e.g. '(2 + 3) * 4'")
                .required(),
        ]
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let expression = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        let value = evaluate(expression).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;

        // Integers print without a trailing .0
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(format!("{}", value as i64))
        } else {
            Ok(format!("{value}"))
        }
    }
}

// ── Precedence-climbing evaluator ─────────────────────────────────────────

/// Evaluate a mathematical expression string.
pub fn evaluate(input: &str) -> Result<f64, String> {
    let mut cursor = Cursor::new(input);
    let value = cursor.expression(0)?;
    cursor.skip_whitespace();
    match cursor.peek() {
        None => Ok(value),
        Some(c) => Err(format!("unexpected character '{c}'")),
    }
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

fn precedence(op: char) -> Option<u8> {
    match op {
        '+' | '-' => Some(1),
        '*' | '/' => Some(2),
        _ => None,
    }
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<f64, String> {
        let mut left = self.atom()?;

        loop {
            self.skip_whitespace();
            let Some(op) = self.peek() else { break };
            let Some(prec) = precedence(op) else { break };
            if prec < min_precedence {
                break;
            }
            self.chars.next();

            let right = self.expression(prec + 1)?;
            left = match op {
                '+' => left + right,
                '-' => left - right,
                '*' => left * right,
                '/' => {
                    if right == 0.0 {
                        return Err("division by zero".into());
                    }
                    left / right
                }
                _ => unreachable!(),
            };
        }

        Ok(left)
    }

    fn atom(&mut self) -> Result<f64, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.atom()?)
            }
            Some('(') => {
                self.chars.next();
                let value = self.expression(0)?;
                self.skip_whitespace();
                match self.chars.next() {
                    Some(')') => Ok(value),
                    _ => Err("expected closing parenthesis".into()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("unexpected character '{c}'")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let mut literal = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            literal.push(c);
            self.chars.next();
        }
        literal
            .parse()
            .map_err(|_| format!("invalid number '{literal}'"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

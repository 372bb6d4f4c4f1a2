//! Calculator tool
//!
//! Safe arithmetic evaluation over a closed operator set: addition,
//! subtraction, multiplication, division, remainder, exponentiation,
//! parentheses, and unary minus. Nothing else parses, so there is no way to
//! reach host functionality through an expression.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::{ParameterSpec, ParameterType, Tool};
use sdk::types::{ToolInput, ToolOutput};
use serde_json::json;
use tracing::debug;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs safe mathematical calculations"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "expression",
            ParameterType::String,
            "Mathematical expression to evaluate (e.g. '2 + 2', '10 * 5 + 3')",
        )]
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, EngineError> {
        let expression = input
            .param_str("expression")
            .map_err(|e| EngineError::ToolError(e.to_string()))?;

        debug!("Evaluating: {}", expression);

        match evaluate(&expression) {
            Ok(result) => Ok(ToolOutput::json(json!({
                "expression": expression,
                "result": result,
            }))),
            Err(e) => Ok(ToolOutput::error(format!(
                "Failed to evaluate '{}': {}",
                expression, e
            ))),
        }
    }
}

/// Evaluate an arithmetic expression
fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing input".to_string());
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Number(number));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/' | '%') factor)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                Token::Percent => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("modulo by zero".to_string());
                    }
                    value %= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // factor := unary ('^' factor)?   (right-associative)
    fn factor(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some(Token::Caret) {
            self.advance();
            let exponent = self.factor()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<f64, String> {
        if self.peek() == Some(Token::Minus) {
            self.advance();
            return Ok(-self.unary()?);
        }
        self.primary()
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> Result<f64, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                if self.advance() != Some(Token::RParen) {
                    return Err("missing closing parenthesis".to_string());
                }
                Ok(value)
            }
            Some(other) => Err(format!("unexpected token {:?}", other)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(evaluate("2 + 2").unwrap(), 4.0);
        assert_eq!(evaluate("10 * 5 + 3").unwrap(), 53.0);
        assert_eq!(evaluate("10 - 4 / 2").unwrap(), 8.0);
        assert_eq!(evaluate("7 % 3").unwrap(), 1.0);
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(evaluate("(10 + 2) * 3").unwrap(), 36.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0); // right-associative
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
    }

    #[test]
    fn test_floats() {
        assert!((evaluate("0.1 + 0.2").unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(evaluate("1.5 * 4").unwrap(), 6.0);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("5 % 0").is_err());
    }

    #[test]
    fn test_rejects_anything_else() {
        assert!(evaluate("2 + x").is_err());
        assert!(evaluate("pow(2, 3)").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 2").is_err());
    }

    #[tokio::test]
    async fn test_tool_success_output() {
        let tool = CalculatorTool;
        let output = tool
            .run(ToolInput::new().with_param("expression", json!("6 * 7")))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.data["result"], json!(42.0));
        assert_eq!(output.data["expression"], json!("6 * 7"));
    }

    #[tokio::test]
    async fn test_tool_error_output() {
        let tool = CalculatorTool;
        let output = tool
            .run(ToolInput::new().with_param("expression", json!("1 / 0")))
            .await
            .unwrap();

        assert!(!output.success);
        assert!(output.error.as_deref().unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_missing_expression_is_validation_error() {
        let tool = CalculatorTool;
        let result = tool.run(ToolInput::new()).await;
        assert!(result.is_err());
    }
}

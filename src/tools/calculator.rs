use async_trait::async_trait;
use serde_json::Value;

use crate::llm::tools::ToolParam;
use crate::tools::{Tool, required_str_arg};

/// Evaluates an arithmetic expression without ever executing code.
///
/// Only numeric literals, `+ - * / % ^`, unary minus, and parentheses are
/// accepted; any other construct is rejected during lexing or parsing and
/// reported as text. `^` is the power operator.
pub fn evaluate(expression: &str) -> String {
    match parse(expression).and_then(|expr| eval(&expr)) {
        Ok(value) => format_number(value),
        Err(reason) => format!("Calculation error: {reason}. Please check the expression."),
    }
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

#[derive(Debug)]
enum Expr {
    Number(f64),
    Negate(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                let mut seen_dot = false;
                while let Some(&d) = chars.peek() {
                    match d {
                        '0'..='9' => literal.push(d),
                        '.' if !seen_dot => {
                            seen_dot = true;
                            literal.push(d);
                        }
                        _ => break,
                    }
                    chars.next();
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(format!("unsupported character '{other}'")),
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
    fn expr(&mut self) -> Result<Expr, String> {
        let mut left = self.term()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // unary := '-' unary | power
    fn unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(Token::Minus) {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.power()
    }

    // power := atom ('^' unary)?, right-associative
    fn power(&mut self) -> Result<Expr, String> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Caret) {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(_) => Err("unexpected operator".to_string()),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn parse(expression: &str) -> Result<Expr, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing input".to_string());
    }
    Ok(expr)
}

fn eval(expr: &Expr) -> Result<f64, String> {
    let value = match expr {
        Expr::Number(value) => *value,
        Expr::Negate(operand) => -eval(operand)?,
        Expr::Binary { op, left, right } => {
            let left = eval(left)?;
            let right = eval(right)?;
            match op {
                BinOp::Add => left + right,
                BinOp::Sub => left - right,
                BinOp::Mul => left * right,
                BinOp::Div => {
                    if right == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    left / right
                }
                BinOp::Rem => {
                    if right == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    left % right
                }
                BinOp::Pow => left.powf(right),
            }
        }
    };

    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a plain arithmetic expression for precise calculations \
         (addition, subtraction, multiplication, division, remainder, power). \
         Provide the full expression as a string, e.g. '1500 * (1 + 0.05)^3'."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required_string(
            "expression",
            "Arithmetic expression to evaluate.",
        )]
    }

    async fn invoke(&self, args: &Value) -> String {
        match required_str_arg(args, "expression") {
            Ok(expression) => evaluate(&expression),
            Err(reason) => format!("Calculation error: {reason}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::evaluate;

    #[test]
    fn evaluates_basic_arithmetic() {
        assert_eq!(evaluate("2+2"), "4");
        assert_eq!(evaluate("10 - 3 * 2"), "4");
        assert_eq!(evaluate("(10 - 3) * 2"), "14");
        assert_eq!(evaluate("7 / 2"), "3.5");
        assert_eq!(evaluate("10 % 3"), "1");
    }

    #[test]
    fn caret_is_the_power_operator() {
        assert_eq!(evaluate("2^10"), "1024");
        assert_eq!(evaluate("2^-1"), "0.5");

        let compounded = evaluate("5000 * (1 + 0.045)^5");
        assert!(
            compounded.starts_with("6230.9"),
            "unexpected result: {compounded}"
        );
    }

    #[test]
    fn power_is_right_associative_and_binds_over_unary_minus() {
        assert_eq!(evaluate("2^3^2"), "512");
        assert_eq!(evaluate("-2^2"), "-4");
    }

    #[test]
    fn unary_minus_nests() {
        assert_eq!(evaluate("--5"), "5");
        assert_eq!(evaluate("3 * -2"), "-6");
    }

    #[test]
    fn rejects_anything_but_arithmetic() {
        assert!(evaluate("__import__('os')").starts_with("Calculation error:"));
        assert!(evaluate("2 + x").starts_with("Calculation error:"));
        assert!(evaluate("system(\"ls\")").starts_with("Calculation error:"));
        assert!(evaluate("").starts_with("Calculation error:"));
        assert!(evaluate("1 2").starts_with("Calculation error:"));
        assert!(evaluate("(1 + 2").starts_with("Calculation error:"));
    }

    #[test]
    fn division_by_zero_is_reported_as_text() {
        assert!(evaluate("1/0").starts_with("Calculation error:"));
        assert!(evaluate("5 % 0").starts_with("Calculation error:"));
    }

    #[test]
    fn integral_results_print_without_fraction() {
        assert_eq!(evaluate("1.5 + 2.5"), "4");
        assert_eq!(evaluate("0.1 + 0.2"), "0.30000000000000004");
    }
}

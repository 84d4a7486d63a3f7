//! Numeric expression evaluation.
//!
//! Accepts literals and simple arithmetic over them (`+ - * /`, unary minus,
//! parentheses) plus statistical functions over an inline series: `sum`,
//! `mean`, `min`, `max`, and `percentile(p, ...)`. Evaluation is eager and
//! total: division by zero and non-finite results are errors, never silent
//! NaN/Infinity propagation.

/// Returned when a numeric expression fails to parse or evaluate.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum NumericEvaluationError {
    /// The expression text does not follow the grammar.
    #[error("invalid numeric expression: {detail}")]
    Parse {
        /// What the parser stumbled over.
        detail: String,
    },

    /// A division had a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// Evaluation produced NaN or Infinity.
    #[error("expression result is not finite ({value})")]
    NonFinite {
        /// The offending value.
        value: f64,
    },

    /// The expression called a function this evaluator does not know.
    #[error("unknown function `{name}`")]
    UnknownFunction {
        /// The unrecognized function name.
        name: String,
    },

    /// A known function was called with unusable arguments.
    #[error("bad arguments to `{function}`: {detail}")]
    BadArguments {
        /// The function name.
        function: String,
        /// What was wrong with the arguments.
        detail: String,
    },
}

/// Evaluate a numeric expression to a finite `f64`.
pub(crate) fn evaluate(expr: &str) -> Result<f64, NumericEvaluationError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    parser.expect_end()?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NumericEvaluationError::NonFinite { value })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, NumericEvaluationError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_ascii_whitespace() => {
                chars.next();
            }
            '+' => push_simple(&mut chars, &mut tokens, Token::Plus),
            '-' => push_simple(&mut chars, &mut tokens, Token::Minus),
            '*' => push_simple(&mut chars, &mut tokens, Token::Star),
            '/' => push_simple(&mut chars, &mut tokens, Token::Slash),
            '(' => push_simple(&mut chars, &mut tokens, Token::LParen),
            ')' => push_simple(&mut chars, &mut tokens, Token::RParen),
            ',' => push_simple(&mut chars, &mut tokens, Token::Comma),
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
                        end = idx + c.len_utf8();
                        chars.next();
                    } else if (c == '+' || c == '-')
                        && expr[start..end].ends_with(['e', 'E'])
                    {
                        // Exponent sign, e.g. `1e-3`.
                        end = idx + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &expr[start..end];
                let number = literal.parse::<f64>().map_err(|_| {
                    NumericEvaluationError::Parse {
                        detail: format!("malformed number `{literal}`"),
                    }
                })?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = idx + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(expr[start..end].to_string()));
            }
            other => {
                return Err(NumericEvaluationError::Parse {
                    detail: format!("unexpected character `{other}`"),
                });
            }
        }
    }

    if tokens.is_empty() {
        return Err(NumericEvaluationError::Parse {
            detail: "empty expression".to_string(),
        });
    }
    Ok(tokens)
}

fn push_simple(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    tokens: &mut Vec<Token>,
    token: Token,
) {
    chars.next();
    tokens.push(token);
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<(), NumericEvaluationError> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(NumericEvaluationError::Parse {
                detail: format!("expected {context}, got {other:?}"),
            }),
        }
    }

    fn expect_end(&mut self) -> Result<(), NumericEvaluationError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(NumericEvaluationError::Parse {
                detail: format!("trailing input at {token:?}"),
            }),
        }
    }

    fn expression(&mut self) -> Result<f64, NumericEvaluationError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek().cloned() {
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

    fn term(&mut self) -> Result<f64, NumericEvaluationError> {
        let mut value = self.unary()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.unary()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(NumericEvaluationError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, NumericEvaluationError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(-self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<f64, NumericEvaluationError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                self.expect(&Token::LParen, "`(` after function name")?;
                let args = self.arguments()?;
                apply_function(&name, &args)
            }
            other => Err(NumericEvaluationError::Parse {
                detail: format!("expected a value, got {other:?}"),
            }),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, NumericEvaluationError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                other => {
                    return Err(NumericEvaluationError::Parse {
                        detail: format!("expected `,` or `)` in argument list, got {other:?}"),
                    });
                }
            }
        }
    }
}

fn apply_function(name: &str, args: &[f64]) -> Result<f64, NumericEvaluationError> {
    let require_series = |function: &str| -> Result<(), NumericEvaluationError> {
        if args.is_empty() {
            Err(NumericEvaluationError::BadArguments {
                function: function.to_string(),
                detail: "requires at least one value".to_string(),
            })
        } else {
            Ok(())
        }
    };

    match name {
        "sum" => {
            require_series("sum")?;
            Ok(args.iter().sum())
        }
        "mean" => {
            require_series("mean")?;
            #[allow(clippy::cast_precision_loss)]
            Ok(args.iter().sum::<f64>() / args.len() as f64)
        }
        "min" => {
            require_series("min")?;
            Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            require_series("max")?;
            Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        "percentile" => percentile(args),
        other => Err(NumericEvaluationError::UnknownFunction {
            name: other.to_string(),
        }),
    }
}

/// Linear-interpolation percentile (R-7, the common spreadsheet estimator):
/// `percentile(p, x1, ..., xn)` with `p` in `[0, 100]`.
fn percentile(args: &[f64]) -> Result<f64, NumericEvaluationError> {
    let [p, series @ ..] = args else {
        return Err(NumericEvaluationError::BadArguments {
            function: "percentile".to_string(),
            detail: "requires a rank and at least one value".to_string(),
        });
    };
    if series.is_empty() {
        return Err(NumericEvaluationError::BadArguments {
            function: "percentile".to_string(),
            detail: "requires a rank and at least one value".to_string(),
        });
    }
    if !(0.0..=100.0).contains(p) {
        return Err(NumericEvaluationError::BadArguments {
            function: "percentile".to_string(),
            detail: format!("rank must be in [0, 100], got {p}"),
        });
    }

    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);

    #[allow(clippy::cast_precision_loss)]
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = rank.floor() as usize;
    let upper = lower.saturating_add(1).min(sorted.len() - 1);
    let weight = rank - rank.floor();
    Ok(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

//! Recursive-descent parser for the assertion subset.
//!
//! Statements outside the subset are still recognized so that callers can
//! reject the whole body with a precise reason; their indented bodies are
//! skipped rather than parsed.

use crate::ast::{BinOperator, CmpOperator, ExprNode, Stmt, UnaryOperator};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::value::Value;

/// Parse errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}:{column}: unexpected character {ch:?}")]
    UnexpectedChar { ch: char, line: usize, column: usize },

    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    #[error("line {line}: invalid escape sequence")]
    InvalidEscape { line: usize },

    #[error("line {line}: invalid number literal {text:?}")]
    InvalidNumber { text: String, line: usize },

    #[error("line {line}: unbalanced bracket")]
    UnbalancedBracket { line: usize },

    #[error("line {line}:{column}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("line {line}: {construct} is not supported")]
    Unsupported { construct: String, line: usize },
}

/// Keywords that open an indented block.
const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "def", "class", "with", "try", "except", "finally",
    "async",
];

/// Keywords of single-line statements outside the subset.
const SIMPLE_KEYWORDS: &[&str] = &[
    "return", "pass", "break", "continue", "raise", "import", "from", "global", "nonlocal",
    "del", "yield", "await",
];

/// Words that can never start an atom.
const RESERVED: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "elif", "for", "while", "def", "class",
    "return", "lambda", "yield", "await", "import", "from", "as", "with", "try", "except",
    "finally", "raise", "pass", "break", "continue", "global", "nonlocal", "del", "assert",
    "async",
];

const AUG_ASSIGN: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "**=", "&=", "|=", "^=", ">>=", "<<=", "@=",
];

/// Parse a whole assertion body.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut statements = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.at_eof() {
            break;
        }
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

/// Parse a single expression.
pub fn parse_expression(source: &str) -> Result<ExprNode, ParseError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.skip_newlines();
    let expr = parser.expression_list()?;
    parser.skip_newlines();
    if !parser.at_eof() {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(
            matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof),
            "token stream must end with Eof"
        );
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(p) if *p == punct)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Name(n) if n == word)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ParseError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", punct)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: describe(&token.kind),
            line: token.line,
            column: token.column,
        }
    }

    fn unsupported(&self, construct: &str) -> ParseError {
        ParseError::Unsupported {
            construct: construct.to_string(),
            line: self.peek().line,
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    /// Consume through the end of the current logical line.
    fn skip_line(&mut self) {
        loop {
            match self.advance().kind {
                TokenKind::Newline | TokenKind::Eof => break,
                _ => {}
            }
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let head = self.peek().clone();

        if let TokenKind::Name(word) = &head.kind {
            if word == "assert" {
                self.advance();
                let test = self.expression()?;
                let msg = if self.eat_punct(",") {
                    Some(self.expression()?)
                } else {
                    None
                };
                self.expect_end()?;
                return Ok(Stmt::Assert { test, msg });
            }
            if COMPOUND_KEYWORDS.contains(&word.as_str()) {
                self.skip_block(head.column);
                return Ok(Stmt::Unsupported {
                    keyword: word.clone(),
                    line: head.line,
                });
            }
            if SIMPLE_KEYWORDS.contains(&word.as_str()) {
                self.skip_line();
                return Ok(Stmt::Unsupported {
                    keyword: word.clone(),
                    line: head.line,
                });
            }
        }

        let first = self.expression_list()?;

        if self.is_punct("=") {
            let mut targets = vec![first];
            let value = loop {
                self.expect_punct("=")?;
                let next = self.expression_list()?;
                if self.is_punct("=") {
                    targets.push(next);
                } else {
                    break next;
                }
            };
            self.expect_end()?;
            return Ok(Stmt::Assign { targets, value });
        }

        if let TokenKind::Punct(p) = self.peek().kind {
            if AUG_ASSIGN.contains(&p) || p == ":" {
                let keyword = if p == ":" {
                    "annotated assignment"
                } else {
                    "augmented assignment"
                };
                self.skip_line();
                return Ok(Stmt::Unsupported {
                    keyword: keyword.to_string(),
                    line: head.line,
                });
            }
        }

        self.expect_end()?;
        Ok(Stmt::Expr(first))
    }

    /// Skip a compound statement header and every deeper-indented line after it.
    fn skip_block(&mut self, header_column: usize) {
        self.skip_line();
        loop {
            let token = self.peek();
            if token.kind == TokenKind::Eof {
                break;
            }
            if token.line_start && token.column <= header_column {
                break;
            }
            self.skip_line();
        }
    }

    // ---- expressions ----

    /// Comma-separated expressions, a bare tuple when there is more than one.
    fn expression_list(&mut self) -> Result<ExprNode, ParseError> {
        let first = self.expression()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.at_expression_end() {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(ExprNode::TupleLit(items))
    }

    fn at_expression_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof)
            || self.is_punct("=")
            || self.is_punct(")")
            || self.is_punct("]")
    }

    fn expression(&mut self) -> Result<ExprNode, ParseError> {
        let expr = self.or_test()?;
        if self.is_word("if") {
            return Err(self.unsupported("conditional expression"));
        }
        Ok(expr)
    }

    fn or_test(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.and_test()?;
        while self.eat_word("or") {
            let right = self.and_test()?;
            left = binop(left, BinOperator::Or, right);
        }
        Ok(left)
    }

    fn and_test(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.not_test()?;
        while self.eat_word("and") {
            let right = self.not_test()?;
            left = binop(left, BinOperator::And, right);
        }
        Ok(left)
    }

    fn not_test(&mut self) -> Result<ExprNode, ParseError> {
        if self.eat_word("not") {
            let operand = self.not_test()?;
            return Ok(ExprNode::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<ExprNode, ParseError> {
        let left = self.bit_or()?;
        let mut comparisons = Vec::new();
        while let Some(op) = self.compare_operator() {
            comparisons.push((op, self.bit_or()?));
        }
        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(ExprNode::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn compare_operator(&mut self) -> Option<CmpOperator> {
        let next_is = |word: &str| matches!(self.peek_kind_at(1), TokenKind::Name(n) if n == word);
        let (op, width) = match &self.peek().kind {
            TokenKind::Punct("==") => (CmpOperator::Eq, 1),
            TokenKind::Punct("!=") => (CmpOperator::NotEq, 1),
            TokenKind::Punct("<") => (CmpOperator::Lt, 1),
            TokenKind::Punct("<=") => (CmpOperator::LtE, 1),
            TokenKind::Punct(">") => (CmpOperator::Gt, 1),
            TokenKind::Punct(">=") => (CmpOperator::GtE, 1),
            TokenKind::Name(n) if n == "in" => (CmpOperator::In, 1),
            TokenKind::Name(n) if n == "not" && next_is("in") => (CmpOperator::NotIn, 2),
            TokenKind::Name(n) if n == "is" && next_is("not") => (CmpOperator::IsNot, 2),
            TokenKind::Name(n) if n == "is" => (CmpOperator::Is, 1),
            _ => return None,
        };
        for _ in 0..width {
            self.advance();
        }
        Some(op)
    }

    fn bit_or(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.bit_xor()?;
        while self.eat_punct("|") {
            let right = self.bit_xor()?;
            left = binop(left, BinOperator::BitOr, right);
        }
        Ok(left)
    }

    fn bit_xor(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.bit_and()?;
        while self.eat_punct("^") {
            let right = self.bit_and()?;
            left = binop(left, BinOperator::BitXor, right);
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.shift()?;
        while self.eat_punct("&") {
            let right = self.shift()?;
            left = binop(left, BinOperator::BitAnd, right);
        }
        Ok(left)
    }

    fn shift(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.arith()?;
        loop {
            let op = if self.eat_punct("<<") {
                BinOperator::LShift
            } else if self.eat_punct(">>") {
                BinOperator::RShift
            } else {
                break;
            };
            let right = self.arith()?;
            left = binop(left, op, right);
        }
        Ok(left)
    }

    fn arith(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat_punct("+") {
                BinOperator::Add
            } else if self.eat_punct("-") {
                BinOperator::Sub
            } else {
                break;
            };
            let right = self.term()?;
            left = binop(left, op, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.factor()?;
        loop {
            let op = if self.eat_punct("*") {
                BinOperator::Mult
            } else if self.eat_punct("/") {
                BinOperator::Div
            } else if self.eat_punct("//") {
                BinOperator::FloorDiv
            } else if self.eat_punct("%") {
                BinOperator::Mod
            } else if self.is_punct("@") {
                return Err(self.unsupported("matrix multiplication"));
            } else {
                break;
            };
            let right = self.factor()?;
            left = binop(left, op, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<ExprNode, ParseError> {
        let op = if self.eat_punct("-") {
            UnaryOperator::Neg
        } else if self.eat_punct("+") {
            UnaryOperator::Pos
        } else if self.eat_punct("~") {
            UnaryOperator::Invert
        } else {
            return self.power();
        };
        let operand = self.factor()?;
        Ok(ExprNode::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<ExprNode, ParseError> {
        let base = self.primary()?;
        if self.eat_punct("**") {
            let exponent = self.factor()?;
            return Ok(binop(base, BinOperator::Pow, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<ExprNode, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_punct("(") {
                expr = self.call(expr)?;
            } else if self.eat_punct(".") {
                let attr = match self.advance().kind {
                    TokenKind::Name(name) => name,
                    _ => return Err(self.unexpected("attribute name")),
                };
                expr = ExprNode::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else if self.eat_punct("[") {
                let index = self.expression_list()?;
                if self.is_punct(":") {
                    return Err(self.unsupported("slice"));
                }
                self.expect_punct("]")?;
                expr = ExprNode::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn call(&mut self, func: ExprNode) -> Result<ExprNode, ParseError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.is_punct(")") {
            if self.is_punct("*") || self.is_punct("**") {
                return Err(self.unsupported("starred argument"));
            }
            let is_keyword = matches!(self.peek().kind, TokenKind::Name(_))
                && matches!(self.peek_kind_at(1), TokenKind::Punct("="));
            if is_keyword {
                let name = match self.advance().kind {
                    TokenKind::Name(name) => name,
                    _ => return Err(self.unexpected("keyword name")),
                };
                self.expect_punct("=")?;
                keywords.push((name, self.expression()?));
            } else {
                args.push(self.expression()?);
                if self.is_word("for") {
                    return Err(self.unsupported("generator expression"));
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(ExprNode::Call {
            func: Box::new(func),
            args,
            keywords,
        })
    }

    fn atom(&mut self) -> Result<ExprNode, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(i) => {
                self.advance();
                Ok(ExprNode::Constant(Value::Int(i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(ExprNode::Constant(Value::Float(f)))
            }
            TokenKind::Str(s) => {
                self.advance();
                let mut text = s;
                // Adjacent literals concatenate.
                while let TokenKind::Str(next) = &self.peek().kind {
                    text.push_str(next);
                    self.advance();
                }
                Ok(ExprNode::Constant(Value::Str(text)))
            }
            TokenKind::Name(name) => match name.as_str() {
                "True" => {
                    self.advance();
                    Ok(ExprNode::Constant(Value::Bool(true)))
                }
                "False" => {
                    self.advance();
                    Ok(ExprNode::Constant(Value::Bool(false)))
                }
                "None" => {
                    self.advance();
                    Ok(ExprNode::Constant(Value::None))
                }
                "lambda" => Err(self.unsupported("lambda")),
                "await" | "yield" => Err(self.unsupported(&format!("'{}' expression", name))),
                word if RESERVED.contains(&word) => Err(self.unexpected("expression")),
                _ => {
                    self.advance();
                    Ok(ExprNode::Identifier(name.clone()))
                }
            },
            TokenKind::Punct("(") => {
                self.advance();
                if self.eat_punct(")") {
                    return Ok(ExprNode::TupleLit(Vec::new()));
                }
                let first = self.expression()?;
                if self.is_word("for") {
                    return Err(self.unsupported("generator expression"));
                }
                if !self.is_punct(",") {
                    self.expect_punct(")")?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.eat_punct(",") {
                    if self.is_punct(")") {
                        break;
                    }
                    items.push(self.expression()?);
                }
                self.expect_punct(")")?;
                Ok(ExprNode::TupleLit(items))
            }
            TokenKind::Punct("[") => {
                self.advance();
                let items = self.sequence_items("]")?;
                Ok(ExprNode::ListLit(items))
            }
            TokenKind::Punct("{") => {
                self.advance();
                self.brace_display()
            }
            TokenKind::Punct("...") => Err(self.unsupported("ellipsis")),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn sequence_items(&mut self, close: &str) -> Result<Vec<ExprNode>, ParseError> {
        let mut items = Vec::new();
        while !self.is_punct(close) {
            if self.is_punct("*") {
                return Err(self.unsupported("starred element"));
            }
            items.push(self.expression()?);
            if self.is_word("for") {
                return Err(self.unsupported("comprehension"));
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(close)?;
        Ok(items)
    }

    fn brace_display(&mut self) -> Result<ExprNode, ParseError> {
        if self.eat_punct("}") {
            return Ok(ExprNode::MapLit(Vec::new()));
        }
        if self.is_punct("**") {
            return Err(self.unsupported("dict unpacking"));
        }
        let first = self.expression()?;
        if !self.eat_punct(":") {
            if self.is_word("for") {
                return Err(self.unsupported("comprehension"));
            }
            let mut items = vec![first];
            if self.eat_punct(",") {
                items.extend(self.sequence_items("}")?);
            } else {
                self.expect_punct("}")?;
            }
            return Ok(ExprNode::SetLit(items));
        }

        let mut entries = vec![(first, self.expression()?)];
        if self.is_word("for") {
            return Err(self.unsupported("comprehension"));
        }
        while self.eat_punct(",") {
            if self.is_punct("}") {
                break;
            }
            let key = self.expression()?;
            self.expect_punct(":")?;
            entries.push((key, self.expression()?));
        }
        self.expect_punct("}")?;
        Ok(ExprNode::MapLit(entries))
    }
}

fn binop(left: ExprNode, op: BinOperator, right: ExprNode) -> ExprNode {
    ExprNode::BinOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Name(n) => format!("'{}'", n),
        TokenKind::Int(i) => i.to_string(),
        TokenKind::Float(f) => f.to_string(),
        TokenKind::Str(s) => format!("{:?}", s),
        TokenKind::Punct(p) => format!("'{}'", p),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> ExprNode {
        ExprNode::Identifier(name.to_string())
    }

    fn int(v: i64) -> ExprNode {
        ExprNode::Constant(Value::int(v))
    }

    #[test]
    fn test_assert_with_call_and_comparison() {
        let stmts = parse_program("assert f(1, [2, 3]) == (4, 5)\n").unwrap();
        assert_eq!(stmts.len(), 1);
        let Stmt::Assert { test, msg } = &stmts[0] else {
            panic!("expected assert, got {:?}", stmts[0]);
        };
        assert!(msg.is_none());
        let ExprNode::Compare { left, comparisons } = test else {
            panic!("expected comparison, got {:?}", test);
        };
        assert_eq!(left.callee_name(), Some("f"));
        assert_eq!(comparisons.len(), 1);
        assert_eq!(comparisons[0].0, CmpOperator::Eq);
        assert_eq!(comparisons[0].1, ExprNode::TupleLit(vec![int(4), int(5)]));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            binop(int(1), BinOperator::Add, binop(int(2), BinOperator::Mult, int(3)))
        );

        let expr = parse_expression("-2 ** 2").unwrap();
        assert_eq!(
            expr,
            ExprNode::UnaryOp {
                op: UnaryOperator::Neg,
                operand: Box::new(binop(int(2), BinOperator::Pow, int(2))),
            }
        );
    }

    #[test]
    fn test_boolean_connectives() {
        let expr = parse_expression("not a or b and c").unwrap();
        let ExprNode::BinOp { op, left, .. } = expr else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOperator::Or);
        assert!(matches!(*left, ExprNode::UnaryOp { op: UnaryOperator::Not, .. }));
    }

    #[test]
    fn test_membership_and_identity_operators() {
        let expr = parse_expression("a not in b").unwrap();
        assert!(matches!(
            expr,
            ExprNode::Compare { ref comparisons, .. } if comparisons[0].0 == CmpOperator::NotIn
        ));
        let expr = parse_expression("a is not None").unwrap();
        assert!(matches!(
            expr,
            ExprNode::Compare { ref comparisons, .. } if comparisons[0].0 == CmpOperator::IsNot
        ));
    }

    #[test]
    fn test_chained_assignment() {
        let stmts = parse_program("a = b = 3").unwrap();
        assert_eq!(
            stmts,
            vec![Stmt::Assign {
                targets: vec![ident("a"), ident("b")],
                value: int(3),
            }]
        );
    }

    #[test]
    fn test_dict_and_set_displays() {
        let dict = parse_expression("{1: 'a', 2: 'b'}").unwrap();
        assert!(matches!(dict, ExprNode::MapLit(ref e) if e.len() == 2));
        let set = parse_expression("{1, 2}").unwrap();
        assert!(matches!(set, ExprNode::SetLit(ref e) if e.len() == 2));
        let empty = parse_expression("{}").unwrap();
        assert_eq!(empty, ExprNode::MapLit(vec![]));
    }

    #[test]
    fn test_compound_statement_skips_body() {
        let source = "x = 1\nfor i in range(3):\n    assert i < 3\n    y = i\nassert x == 1\n";
        let stmts = parse_program(source).unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(matches!(
            &stmts[1],
            Stmt::Unsupported { keyword, line: 2 } if keyword == "for"
        ));
        assert!(matches!(stmts[2], Stmt::Assert { .. }));
    }

    #[test]
    fn test_augmented_assignment_is_unsupported() {
        let stmts = parse_program("x = 1\nx += 1\n").unwrap();
        assert!(matches!(
            &stmts[1],
            Stmt::Unsupported { keyword, .. } if keyword == "augmented assignment"
        ));
    }

    #[test]
    fn test_keyword_arguments_and_attributes() {
        let expr = parse_expression("obj.method(1, key=2)").unwrap();
        let ExprNode::Call { func, args, keywords } = expr else {
            panic!("expected call");
        };
        assert!(matches!(*func, ExprNode::Attribute { ref attr, .. } if attr == "method"));
        assert_eq!(args, vec![int(1)]);
        assert_eq!(keywords, vec![("key".to_string(), int(2))]);
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            parse_expression("[x for x in y]"),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(
            parse_expression("a if b else c"),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(
            parse_expression("xs[1:2]"),
            Err(ParseError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_bare_tuple_assignment() {
        let stmts = parse_program("t = 1, 2").unwrap();
        assert_eq!(
            stmts,
            vec![Stmt::Assign {
                targets: vec![ident("t")],
                value: ExprNode::TupleLit(vec![int(1), int(2)]),
            }]
        );
    }

    #[test]
    fn test_assert_message() {
        let stmts = parse_program("assert x, 'boom'").unwrap();
        assert!(matches!(&stmts[0], Stmt::Assert { msg: Some(_), .. }));
    }

    #[test]
    fn test_multiline_call() {
        let stmts = parse_program("assert f(\n    1,\n    2,\n) == 3\n").unwrap();
        assert_eq!(stmts.len(), 1);
    }
}

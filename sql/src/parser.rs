use std::fmt;

use tracing::debug;

use common::err::{DbError, DbResult};

use crate::token::{tokenize, Sym, Token};

/// One parsed statement of the dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE name (col TYPE, ...)`. Declared types are kept as
    /// written; the closed type set is enforced later.
    CreateTable {
        table: String,
        columns: Vec<(String, String)>,
    },
    /// `INSERT INTO name VALUES (col="v", ...)`. Assignments in
    /// source order.
    Insert {
        table: String,
        values: Vec<(String, String)>,
    },
    Select(SelectQuery),
    DropTable {
        table: String,
    },
    Explain(SelectQuery),
    Ping,
}

/// Normalized SELECT tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table_name: String,
    /// Column names; `*` is kept as the literal `*`, `AS` aliases are
    /// stripped down to the source column.
    pub select_columns: Vec<String>,
    /// Flat list in source order. AND/OR structure is flattened by
    /// in-order traversal; parentheses only group during the parse.
    pub where_conditions: Vec<Condition>,
    /// Order-by columns as written; direction keywords are dropped.
    pub order_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    /// `BETWEEN` carries `"<start> AND <end>"`; `IS [NOT] NULL` is empty.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Between,
    Like,
    IsNull,
    IsNotNull,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Between => "BETWEEN",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{}", text)
    }
}

/// Parses one statement. A trailing `;` is tolerated, keywords are
/// case-insensitive.
pub fn parse(sql: &str) -> DbResult<Statement> {
    let text = sql.trim().trim_end_matches(';').trim();
    if text.is_empty() {
        return Err(DbError::Parse("empty statement".to_string()));
    }
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };

    let leading = match parser.peek() {
        Some(Token::Ident(word)) => word.to_ascii_uppercase(),
        other => {
            return Err(DbError::Parse(format!(
                "statement cannot start with '{}'",
                display_or_end(other)
            )))
        }
    };

    let statement = match leading.as_str() {
        "CREATE" => parser.parse_create()?,
        "INSERT" => parser.parse_insert()?,
        "SELECT" => Statement::Select(parser.parse_select()?),
        "DROP" => parser.parse_drop()?,
        "EXPLAIN" => {
            parser.advance();
            Statement::Explain(parser.parse_select()?)
        }
        "PING" => {
            parser.advance();
            Statement::Ping
        }
        other => {
            debug!("statement with leading keyword '{}' is unsupported", other);
            return Err(DbError::Parse(format!(
                "unsupported statement '{}'",
                other
            )));
        }
    };
    parser.expect_end()?;
    Ok(statement)
}

fn display_or_end(token: Option<&Token>) -> String {
    match token {
        Some(t) => t.to_string(),
        None => "end of input".to_string(),
    }
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
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn expect_keyword(&mut self, keyword: &str) -> DbResult<()> {
        if self.peek_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(DbError::Parse(format!(
                "expected {}, found '{}'",
                keyword,
                display_or_end(self.peek())
            )))
        }
    }

    fn expect_symbol(&mut self, sym: Sym) -> DbResult<()> {
        match self.peek() {
            Some(Token::Symbol(s)) if *s == sym => {
                self.advance();
                Ok(())
            }
            other => Err(DbError::Parse(format!(
                "expected '{}', found '{}'",
                sym,
                display_or_end(other)
            ))),
        }
    }

    fn eat_symbol(&mut self, sym: Sym) -> bool {
        match self.peek() {
            Some(Token::Symbol(s)) if *s == sym => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn expect_ident(&mut self, what: &str) -> DbResult<String> {
        match self.advance() {
            Some(Token::Ident(w)) => Ok(w),
            other => Err(DbError::Parse(format!(
                "expected {}, found '{}'",
                what,
                display_or_end(other.as_ref())
            ))),
        }
    }

    fn expect_end(&mut self) -> DbResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(DbError::Parse(format!("unexpected trailing '{}'", t))),
        }
    }

    /// A literal value: quoted string, number, or bareword.
    fn expect_value(&mut self, what: &str) -> DbResult<String> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(s),
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(w)) => Ok(w),
            other => Err(DbError::Parse(format!(
                "expected {}, found '{}'",
                what,
                display_or_end(other.as_ref())
            ))),
        }
    }

    fn parse_create(&mut self) -> DbResult<Statement> {
        self.expect_keyword("CREATE")?;
        self.expect_keyword("TABLE")?;
        let table = self.expect_ident("table name")?;
        self.expect_symbol(Sym::LParen)?;

        let mut columns = Vec::new();
        loop {
            let name = self.expect_ident("column name")?;
            let decl = self.expect_ident("column type")?;
            columns.push((name, decl));
            if !self.eat_symbol(Sym::Comma) {
                break;
            }
        }
        self.expect_symbol(Sym::RParen)?;
        Ok(Statement::CreateTable { table, columns })
    }

    fn parse_insert(&mut self) -> DbResult<Statement> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.expect_ident("table name")?;
        self.expect_keyword("VALUES")?;
        self.expect_symbol(Sym::LParen)?;

        let mut values = Vec::new();
        loop {
            let column = self.expect_ident("column name")?;
            self.expect_symbol(Sym::Eq)?;
            let value = self.expect_value("column value")?;
            values.push((column, value));
            if !self.eat_symbol(Sym::Comma) {
                break;
            }
        }
        self.expect_symbol(Sym::RParen)?;
        Ok(Statement::Insert { table, values })
    }

    fn parse_drop(&mut self) -> DbResult<Statement> {
        self.expect_keyword("DROP")?;
        self.expect_keyword("TABLE")?;
        let table = self.expect_ident("table name")?;
        Ok(Statement::DropTable { table })
    }

    fn parse_select(&mut self) -> DbResult<SelectQuery> {
        self.expect_keyword("SELECT")?;

        let mut select_columns = Vec::new();
        loop {
            if self.eat_symbol(Sym::Star) {
                select_columns.push("*".to_string());
            } else {
                let column = self.expect_ident("select column")?;
                select_columns.push(column);
                // strip an AS alias down to the source column
                if self.peek_keyword("AS") {
                    self.advance();
                    self.expect_ident("alias")?;
                }
            }
            if !self.eat_symbol(Sym::Comma) {
                break;
            }
        }

        self.expect_keyword("FROM")?;
        let table_name = self.expect_ident("table name")?;

        let mut where_conditions = Vec::new();
        if self.peek_keyword("WHERE") {
            self.advance();
            self.parse_or_expr(&mut where_conditions)?;
        }

        let mut order_by = Vec::new();
        if self.peek_keyword("ORDER") {
            self.advance();
            self.expect_keyword("BY")?;
            loop {
                let column = self.expect_ident("order-by column")?;
                order_by.push(column);
                if self.peek_keyword("ASC") || self.peek_keyword("DESC") {
                    self.advance();
                }
                if !self.eat_symbol(Sym::Comma) {
                    break;
                }
            }
        }

        Ok(SelectQuery {
            table_name,
            select_columns,
            where_conditions,
            order_by,
        })
    }

    // conditions are appended during the descent, which is exactly the
    // in-order flattening of the AND/OR tree
    fn parse_or_expr(&mut self, out: &mut Vec<Condition>) -> DbResult<()> {
        self.parse_and_expr(out)?;
        while self.peek_keyword("OR") {
            self.advance();
            self.parse_and_expr(out)?;
        }
        Ok(())
    }

    fn parse_and_expr(&mut self, out: &mut Vec<Condition>) -> DbResult<()> {
        self.parse_primary(out)?;
        while self.peek_keyword("AND") {
            self.advance();
            self.parse_primary(out)?;
        }
        Ok(())
    }

    fn parse_primary(&mut self, out: &mut Vec<Condition>) -> DbResult<()> {
        if self.eat_symbol(Sym::LParen) {
            self.parse_or_expr(out)?;
            return self.expect_symbol(Sym::RParen);
        }
        let condition = self.parse_predicate()?;
        out.push(condition);
        Ok(())
    }

    fn parse_predicate(&mut self) -> DbResult<Condition> {
        let column = self.expect_ident("column name")?;

        if self.peek_keyword("IS") {
            self.advance();
            if self.peek_keyword("NOT") {
                self.advance();
                self.expect_keyword("NULL")?;
                return Ok(Condition {
                    column,
                    operator: Operator::IsNotNull,
                    value: String::new(),
                });
            }
            self.expect_keyword("NULL")?;
            return Ok(Condition {
                column,
                operator: Operator::IsNull,
                value: String::new(),
            });
        }

        if self.peek_keyword("BETWEEN") {
            self.advance();
            let start = self.expect_value("range start")?;
            self.expect_keyword("AND")?;
            let end = self.expect_value("range end")?;
            return Ok(Condition {
                column,
                operator: Operator::Between,
                value: format!("{} AND {}", start, end),
            });
        }

        if self.peek_keyword("LIKE") {
            self.advance();
            let pattern = self.expect_value("pattern")?;
            return Ok(Condition {
                column,
                operator: Operator::Like,
                value: pattern,
            });
        }

        let operator = match self.advance() {
            Some(Token::Symbol(Sym::Eq)) => Operator::Eq,
            Some(Token::Symbol(Sym::NotEq)) => Operator::NotEq,
            Some(Token::Symbol(Sym::Gt)) => Operator::Gt,
            Some(Token::Symbol(Sym::GtEq)) => Operator::GtEq,
            Some(Token::Symbol(Sym::Lt)) => Operator::Lt,
            Some(Token::Symbol(Sym::LtEq)) => Operator::LtEq,
            other => {
                return Err(DbError::Parse(format!(
                    "expected comparison operator, found '{}'",
                    display_or_end(other.as_ref())
                )))
            }
        };
        let value = self.expect_value("comparison value")?;
        Ok(Condition {
            column,
            operator,
            value,
        })
    }
}

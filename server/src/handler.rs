use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use common::config::ServerConfig;
use common::err::{DbError, DbResult};
use common::schema::{Column, ColumnType, Row};
use planner::catalog::MetadataStore;
use planner::planner::QueryPlanner;
use sql::parser::{parse, SelectQuery, Statement};
use sql::resolver::{self, SchemaView};
use storage::buffer_pool::BufferPool;
use storage::table_service::TableService;

use crate::registry::ConnectionRegistry;
use crate::response::{SqlResponse, TablePayload};

/// Requests larger than this are rejected as framing errors.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Per-connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    HandshakeSent,
    Authenticated,
    Closed,
}

/// Everything a handler borrows from the dispatcher. Sharing is by
/// explicit handle only; there are no process-wide globals.
pub struct SharedServices {
    pub config: ServerConfig,
    pub service: Arc<TableService>,
    pub registry: Arc<ConnectionRegistry>,
    pub store: Option<Arc<dyn MetadataStore>>,
    pub planner: Option<Arc<QueryPlanner>>,
    pub buffer_pool: Option<Arc<BufferPool>>,
}

/// One connection: a strict read-frame, dispatch, write-frame loop.
/// Frames are a 4-byte big-endian length followed by UTF-8 payload:
/// raw SQL inbound, a JSON envelope outbound.
pub struct ConnectionHandler {
    id: u64,
    stream: TcpStream,
    state: ConnectionState,
    close_signal: Arc<Notify>,
    shared: Arc<SharedServices>,
}

impl ConnectionHandler {
    pub fn new(
        id: u64,
        stream: TcpStream,
        close_signal: Arc<Notify>,
        shared: Arc<SharedServices>,
    ) -> Self {
        ConnectionHandler {
            id,
            stream,
            state: ConnectionState::Connected,
            close_signal,
            shared,
        }
    }

    /// Drives the connection to completion. Every exit path (EOF,
    /// socket failure, forced close) unregisters the connection and
    /// shuts the socket down; nothing propagates to other handlers.
    pub async fn run(mut self) {
        if let Err(e) = self.serve().await {
            match &e {
                DbError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
                    debug!("connection {} ended mid-frame", self.id)
                }
                _ => warn!("connection {}: {}", self.id, e),
            }
        }
        self.state = ConnectionState::Closed;
        self.shared.registry.unregister(self.id);
        if let Err(e) = self.stream.shutdown().await {
            debug!("connection {} socket shutdown: {}", self.id, e);
        }
        info!("connection {} closed", self.id);
    }

    async fn serve(&mut self) -> DbResult<()> {
        let greeting = SqlResponse::ok(format!("dbserver ready, connection {}", self.id));
        write_frame(&mut self.stream, &greeting.to_json()).await?;
        self.state = ConnectionState::HandshakeSent;

        loop {
            let next = tokio::select! {
                _ = self.close_signal.notified() => None,
                frame = read_frame(&mut self.stream) => Some(frame?),
            };
            let request = match next {
                // asked to close, or client EOF
                None => {
                    debug!("connection {} close requested", self.id);
                    return Ok(());
                }
                Some(None) => return Ok(()),
                Some(Some(text)) => text,
            };

            let response = self.dispatch(&request);
            write_frame(&mut self.stream, &response.to_json()).await?;
        }
    }

    /// Routes one request by its leading keyword, case-insensitively.
    /// PING never enters the SQL pipeline.
    fn dispatch(&mut self, request: &str) -> SqlResponse {
        let sql = request.trim().trim_end_matches(';').trim();
        if sql.is_empty() {
            return SqlResponse::error("Unsupported SQL query", Some(400));
        }

        if sql.eq_ignore_ascii_case("PING") {
            return SqlResponse::ok("pong");
        }
        if let Some(rest) = strip_keyword(sql, "AUTH") {
            return self.authenticate(rest);
        }
        if self.state == ConnectionState::HandshakeSent {
            // first command without AUTH: the static defaults apply
            self.state = ConnectionState::Authenticated;
        }

        match parse(sql) {
            Ok(Statement::Ping) => SqlResponse::ok("pong"),
            Ok(Statement::CreateTable { table, columns }) => self.create_table(&table, columns),
            Ok(Statement::Insert { table, values }) => self.insert(&table, values),
            Ok(Statement::Select(query)) => self.select(&query),
            Ok(Statement::DropTable { table }) => self.drop_table(&table),
            Ok(Statement::Explain(_)) => self.explain(sql),
            Err(e @ DbError::Parse(_)) => {
                if leading_keyword_is_known(sql) {
                    SqlResponse::from_error(&e)
                } else {
                    SqlResponse::error("Unsupported SQL query", Some(400))
                }
            }
            Err(e) => SqlResponse::from_error(&e),
        }
    }

    /// `AUTH <user> <password>` against the configured static
    /// credentials.
    fn authenticate(&mut self, credentials: &str) -> SqlResponse {
        let mut parts = credentials.split_whitespace();
        let (user, password) = match (parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(password), None) => (user, password),
            _ => return SqlResponse::error("AUTH expects a user and a password", Some(400)),
        };
        if user == self.shared.config.default_user
            && password == self.shared.config.default_password
        {
            self.state = ConnectionState::Authenticated;
            SqlResponse::ok("Authenticated")
        } else {
            warn!("connection {} failed authentication for '{}'", self.id, user);
            SqlResponse::error("Authentication failed", None)
        }
    }

    fn create_table(&self, table: &str, columns: Vec<(String, String)>) -> SqlResponse {
        // handler-level duplicate pre-check; the service itself keeps
        // the first table silently
        if self.shared.service.table_exists(table) {
            return SqlResponse::from_error(&DbError::AlreadyExists(table.to_string()));
        }

        let mut cols = Vec::with_capacity(columns.len());
        for (name, decl) in columns {
            match ColumnType::from_decl(&decl) {
                Ok(column_type) => cols.push(Column::new(name, column_type)),
                Err(e) => return SqlResponse::from_error(&e),
            }
        }

        match self.shared.service.create_table(table, cols) {
            Ok(ddl) => {
                if let Some(store) = &self.shared.store {
                    if let Some(created) = self.shared.service.get_table(table) {
                        store.register_table(&created);
                    }
                }
                SqlResponse::ok_with_data("Table created", ddl)
            }
            Err(e) => SqlResponse::from_error(&e),
        }
    }

    fn insert(&self, table: &str, values: Vec<(String, String)>) -> SqlResponse {
        let view = ServiceSchemaView(self.shared.service.as_ref());
        if let Err(e) = resolver::resolve_insert(table, &values, &view) {
            return SqlResponse::from_error(&e);
        }

        let mut row = Row::new();
        for (column, value) in values {
            row.insert(column, value);
        }
        match self.shared.service.insert(table, row.clone()) {
            Ok(()) => {
                if let Some(store) = &self.shared.store {
                    store.record_insert(table, &row);
                }
                SqlResponse::ok("Data inserted")
            }
            Err(e) => SqlResponse::from_error(&e),
        }
    }

    /// WHERE is accepted but not applied here: filtering lives in the
    /// planner, result shaping with the client.
    fn select(&self, query: &SelectQuery) -> SqlResponse {
        match self.shared.service.select(&query.table_name) {
            Ok(Some(table)) => {
                let payload = TablePayload::from_table(&table);
                match serde_json::to_string(&payload) {
                    Ok(json) => {
                        SqlResponse::ok_with_data(format!("{} rows", table.rows.len()), json)
                    }
                    Err(e) => {
                        SqlResponse::error(format!("cannot serialize result: {}", e), Some(500))
                    }
                }
            }
            Ok(None) => {
                SqlResponse::from_error(&DbError::TableNotFound(query.table_name.clone()))
            }
            Err(e) => SqlResponse::from_error(&e),
        }
    }

    fn drop_table(&self, table: &str) -> SqlResponse {
        match self.shared.service.drop_table(table) {
            Ok(true) => {
                if let Some(store) = &self.shared.store {
                    store.drop_table(table);
                }
                SqlResponse::ok("Table dropped")
            }
            Ok(false) => SqlResponse::from_error(&DbError::TableNotFound(table.to_string())),
            Err(e) => SqlResponse::from_error(&e),
        }
    }

    fn explain(&self, sql: &str) -> SqlResponse {
        let planner = match &self.shared.planner {
            Some(p) => p,
            None => return SqlResponse::from_error(&DbError::PlannerUnavailable),
        };
        // the plan and its hash are computed over the inner SELECT text
        let inner = strip_keyword(sql, "EXPLAIN").unwrap_or(sql).trim();
        match planner.explain(inner) {
            Ok(plan) => match serde_json::to_string(&plan) {
                Ok(json) => SqlResponse::ok_with_data("Query plan generated", json),
                Err(e) => SqlResponse::error(format!("cannot serialize plan: {}", e), Some(500)),
            },
            Err(e) => SqlResponse::from_error(&e),
        }
    }
}

/// The live table schemas, viewed the way the resolver wants them.
struct ServiceSchemaView<'a>(&'a TableService);

impl SchemaView for ServiceSchemaView<'_> {
    fn table_exists(&self, table: &str) -> bool {
        self.0.table_exists(table)
    }

    fn columns(&self, table: &str) -> Option<Vec<Column>> {
        self.0.get_table(table).map(|t| t.schema.columns().to_vec())
    }
}

fn strip_keyword<'a>(sql: &'a str, keyword: &str) -> Option<&'a str> {
    let mut parts = sql.splitn(2, char::is_whitespace);
    let first = parts.next()?;
    if first.eq_ignore_ascii_case(keyword) {
        Some(parts.next().unwrap_or(""))
    } else {
        None
    }
}

fn leading_keyword_is_known(sql: &str) -> bool {
    let first = sql.split_whitespace().next().unwrap_or("");
    ["CREATE", "INSERT", "SELECT", "DROP", "EXPLAIN", "PING"]
        .iter()
        .any(|kw| first.eq_ignore_ascii_case(kw))
}

/// Reads one length-prefixed frame; `None` on a clean EOF between
/// frames.
pub(crate) async fn read_frame(stream: &mut TcpStream) -> DbResult<Option<String>> {
    let len = match stream.read_u32().await {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_BYTES {
        return Err(DbError::Protocol(format!(
            "frame of {} bytes exceeds the {} byte limit",
            len, MAX_FRAME_BYTES
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    let text = String::from_utf8(buf)
        .map_err(|_| DbError::Protocol("request payload is not UTF-8".to_string()))?;
    Ok(Some(text))
}

pub(crate) async fn write_frame(stream: &mut TcpStream, payload: &str) -> DbResult<()> {
    stream.write_u32(payload.len() as u32).await?;
    stream.write_all(payload.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

use common::log::tracing_factory::TracingFactory;
use common::server::Server;
use planner::catalog::{IndexMetadata, MetadataStore};
use planner::plan::{QueryPlan, StepType};
use server::response::TablePayload;

use crate::server_util::{
    connect_raw, read_frame, start_server, start_server_with, temp_dir, TestClient,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_insert_select_round_trip() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s1_round_trip");
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    let resp = client
        .send("CREATE TABLE users (id INT, name VARCHAR)")
        .await;
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("Table created"));
    assert_eq!(
        resp.data.as_deref(),
        Some("CREATE TABLE users (id INT, name VARCHAR)")
    );

    let resp = client
        .send(r#"INSERT INTO users VALUES (id="1", name="John")"#)
        .await;
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("Data inserted"));

    let resp = client
        .send(r#"INSERT INTO users VALUES (id="2", name="Jane")"#)
        .await;
    assert!(resp.success);

    let resp = client.send("SELECT * FROM users").await;
    assert!(resp.success);
    let payload: TablePayload = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(payload.table_name, "users");
    assert_eq!(payload.data_type["id"], "INT");
    assert_eq!(payload.data_type["name"], "VARCHAR");
    assert_eq!(payload.rows.len(), 2);
    assert_eq!(payload.rows[0]["id"], "1");
    assert_eq!(payload.rows[0]["name"], "John");
    assert_eq!(payload.rows[1]["id"], "2");
    assert_eq!(payload.rows[1]["name"], "Jane");

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn type_rejection_names_column_and_type() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s2_type_rejection");
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    assert!(client.send("CREATE TABLE t (x INT)").await.success);
    let resp = client.send(r#"INSERT INTO t VALUES (x="abc")"#).await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));
    let message = resp.message.unwrap();
    assert!(message.contains("'x'"));
    assert!(message.contains("INT"));

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ping_duplicate_create_drop_and_unsupported() {
    TracingFactory::init_log(true);
    let dir = temp_dir("dialect_basics");
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    let resp = client.send("PING").await;
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("pong"));
    assert!(client.send("ping;").await.success);

    assert!(client.send("CREATE TABLE t (x INT)").await.success);
    let resp = client.send("CREATE TABLE t (x INT)").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(409));

    let resp = client.send("CREATE TABLE bad (x FLOAT)").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));

    assert!(client.send("DROP TABLE t").await.success);
    let resp = client.send("DROP TABLE t").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));

    let resp = client.send("SELECT * FROM missing").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));

    let resp = client.send("TRUNCATE TABLE t").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));
    assert_eq!(resp.message.as_deref(), Some("Unsupported SQL query"));

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn auth_checks_static_credentials() {
    TracingFactory::init_log(true);
    let dir = temp_dir("auth");
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    let resp = client.send("AUTH admin admin").await;
    assert!(resp.success);

    let resp = client.send("AUTH admin wrong").await;
    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("Authentication failed"));

    // the command loop keeps serving either way
    assert!(client.send("PING").await.success);

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn explain_covered_index_over_the_wire() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s3_covered");
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    assert!(
        client
            .send("CREATE TABLE users (id INT, name VARCHAR, email VARCHAR)")
            .await
            .success
    );
    for i in 0..20 {
        let sql = format!(
            r#"INSERT INTO users VALUES (id="{}", name="user{}", email="u{}@x.dev")"#,
            i, i, i
        );
        assert!(client.send(&sql).await.success);
    }
    // the index surface is catalog metadata, there is no DDL for it
    let store = server.shared().store.as_ref().unwrap();
    store.save_index(IndexMetadata::new(
        "idx_name_email",
        "users",
        vec!["name".into(), "email".into()],
    ));

    let resp = client
        .send("EXPLAIN SELECT name, email FROM users WHERE name = 'user7'")
        .await;
    assert!(resp.success);
    let plan: QueryPlan = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(plan.execution_steps.len(), 1);
    let step = &plan.execution_steps[0];
    assert_eq!(step.step_type, StepType::CoveredIndexScan);
    assert_eq!(step.index_used.as_deref(), Some("idx_name_email"));
    assert!(step.is_covered);
    // 20 rows, 20 distinct names: selectivity 0.05, one matching row
    assert_eq!(step.estimated_rows, 1);

    // same text again: identical hash and steps
    let resp = client
        .send("EXPLAIN SELECT name, email FROM users WHERE name = 'user7'")
        .await;
    let again: QueryPlan = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(again.query_hash, plan.query_hash);
    assert_eq!(again.execution_steps, plan.execution_steps);

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn explain_without_usable_index_scans_the_table() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s4_fallback");
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    assert!(
        client
            .send("CREATE TABLE users (id INT, name VARCHAR, age INT)")
            .await
            .success
    );
    for i in 0..10 {
        let sql = format!(
            r#"INSERT INTO users VALUES (id="{}", name="u{}", age="30")"#,
            i, i
        );
        assert!(client.send(&sql).await.success);
    }

    let resp = client
        .send("EXPLAIN SELECT * FROM users WHERE age = 30")
        .await;
    assert!(resp.success);
    let plan: QueryPlan = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    let step = &plan.execution_steps[0];
    assert_eq!(step.step_type, StepType::TableScan);
    assert_eq!(step.index_used, None);
    assert_eq!(step.estimated_cost, 10.0);
    assert!(step.description.contains("No index"));
    // the * expanded to the declared columns
    assert_eq!(step.accessed_columns, vec!["id", "name", "age"]);

    let resp = client.send("EXPLAIN SELECT * FROM missing").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admission_control_closes_excess_connections() {
    TracingFactory::init_log(true);
    let dir = temp_dir("admission");
    let mut server = start_server_with(&dir, |cfg| cfg.max_connections = 1).await;

    let mut first = TestClient::connect(server.local_addr()).await;
    assert!(first.send("PING").await.success);

    // the second socket is closed without a frame
    let mut refused = connect_raw(server.local_addr()).await;
    assert!(read_frame(&mut refused).await.is_err());

    // the first connection is unaffected
    assert!(first.send("PING").await.success);

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connection_ids_increase_across_connects() {
    TracingFactory::init_log(true);
    let dir = temp_dir("conn_ids");
    let mut server = start_server(&dir).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let client = TestClient::connect(server.local_addr()).await;
        // greeting reads "dbserver ready, connection N"
        let id: u64 = client
            .greeting
            .rsplit(' ')
            .next()
            .unwrap()
            .trim_matches(|c: char| !c.is_ascii_digit())
            .parse()
            .unwrap();
        ids.push(id);
        drop(client);
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

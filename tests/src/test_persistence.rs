use common::log::tracing_factory::TracingFactory;
use common::server::Server;
use server::response::TablePayload;

use crate::server_util::{start_server, temp_dir, TestClient};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tables_survive_a_restart_in_order() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s5_restart");

    {
        let mut server = start_server(&dir).await;
        let mut client = TestClient::connect(server.local_addr()).await;
        assert!(
            client
                .send("CREATE TABLE users (id INT, name VARCHAR)")
                .await
                .success
        );
        assert!(
            client
                .send(r#"INSERT INTO users VALUES (id="1", name="John")"#)
                .await
                .success
        );
        assert!(
            client
                .send(r#"INSERT INTO users VALUES (id="2", name="Jane")"#)
                .await
                .success
        );
        server.shutdown(true).await.unwrap();
    }

    // a brand new process over the same storage directory
    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;
    let resp = client.send("SELECT * FROM users").await;
    assert!(resp.success);
    let payload: TablePayload = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(payload.rows.len(), 2);
    assert_eq!(payload.rows[0]["name"], "John");
    assert_eq!(payload.rows[1]["name"], "Jane");

    // statistics were rebuilt from disk, so the planner sees the rows
    let resp = client.send("EXPLAIN SELECT * FROM users").await;
    assert!(resp.success);
    let plan: planner::plan::QueryPlan =
        serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(plan.execution_steps[0].estimated_rows, 2);

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropped_tables_stay_dropped_after_restart() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s5_drop_restart");

    {
        let mut server = start_server(&dir).await;
        let mut client = TestClient::connect(server.local_addr()).await;
        assert!(client.send("CREATE TABLE users (id INT)").await.success);
        assert!(
            client
                .send(r#"INSERT INTO users VALUES (id="1")"#)
                .await
                .success
        );
        assert!(client.send("DROP TABLE users").await.success);
        server.shutdown(true).await.unwrap();
    }

    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;
    let resp = client.send("SELECT * FROM users").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(400));

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_corrupt_file_does_not_block_the_others() {
    TracingFactory::init_log(true);
    let dir = temp_dir("corrupt_startup");

    {
        let mut server = start_server(&dir).await;
        let mut client = TestClient::connect(server.local_addr()).await;
        assert!(client.send("CREATE TABLE good (id INT)").await.success);
        assert!(
            client
                .send(r#"INSERT INTO good VALUES (id="7")"#)
                .await
                .success
        );
        server.shutdown(true).await.unwrap();
    }
    std::fs::write(dir.join("broken.dat"), b"not a table file").unwrap();

    let mut server = start_server(&dir).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    let resp = client.send("SELECT * FROM good").await;
    assert!(resp.success);
    let payload: TablePayload = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(payload.rows.len(), 1);

    let resp = client.send("SELECT * FROM broken").await;
    assert!(!resp.success);

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

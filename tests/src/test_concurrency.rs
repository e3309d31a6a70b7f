use std::collections::HashSet;

use common::log::tracing_factory::TracingFactory;
use common::server::Server;
use server::response::TablePayload;

use crate::server_util::{start_server, temp_dir, TestClient};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_inserts_from_many_connections_lose_nothing() {
    TracingFactory::init_log(true);
    let dir = temp_dir("s6_concurrent");
    let mut server = start_server(&dir).await;

    let mut setup = TestClient::connect(server.local_addr()).await;
    assert!(
        setup
            .send("CREATE TABLE events (id INT, source VARCHAR)")
            .await
            .success
    );

    let connections = 8;
    let per_connection = 50;
    let addr = server.local_addr();

    let mut workers = Vec::new();
    for conn in 0..connections {
        workers.push(tokio::spawn(async move {
            let mut client = TestClient::connect(addr).await;
            for i in 0..per_connection {
                let id = conn * per_connection + i;
                let sql = format!(
                    r#"INSERT INTO events VALUES (id="{}", source="conn{}")"#,
                    id, conn
                );
                let resp = client.send(&sql).await;
                assert!(resp.success, "insert {} failed: {:?}", id, resp.message);
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let resp = setup.send("SELECT * FROM events").await;
    assert!(resp.success);
    let payload: TablePayload = serde_json::from_str(resp.data.as_deref().unwrap()).unwrap();
    assert_eq!(payload.rows.len(), (connections * per_connection) as usize);

    // every acknowledged insert is present exactly once
    let ids: HashSet<i32> = payload
        .rows
        .iter()
        .map(|r| r["id"].parse().unwrap())
        .collect();
    assert_eq!(ids.len(), (connections * per_connection) as usize);
    for id in 0..connections * per_connection {
        assert!(ids.contains(&id), "id {} missing", id);
    }

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_creates_yield_exactly_one_table() {
    TracingFactory::init_log(true);
    let dir = temp_dir("racing_creates");
    let mut server = start_server(&dir).await;
    let addr = server.local_addr();

    let mut workers = Vec::new();
    for _ in 0..4 {
        workers.push(tokio::spawn(async move {
            let mut client = TestClient::connect(addr).await;
            client.send("CREATE TABLE shared (id INT)").await
        }));
    }
    let mut created = 0;
    for worker in workers {
        let resp = worker.await.unwrap();
        if resp.success {
            created += 1;
        } else {
            assert_eq!(resp.error_code, Some(409));
        }
    }
    // the pre-check/create pair is not atomic, so several racers may
    // win the check; the service still keeps exactly one table
    assert!(created >= 1);

    let mut client = TestClient::connect(addr).await;
    let resp = client.send("SELECT * FROM shared").await;
    assert!(resp.success);

    server.shutdown(true).await.unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

use std::sync::Arc;

use tracing::info;

use common::config::ServerConfig;
use common::err::DbResult;
use planner::catalog::{InMemoryMetadataStore, MetadataStore};
use planner::planner::QueryPlanner;
use storage::buffer_pool::BufferPool;
use storage::file_manager::TableFileManager;
use storage::table_service::TableService;

use crate::dispatcher::Dispatcher;
use crate::handler::SharedServices;
use crate::registry::ConnectionRegistry;

/// Builds the full service stack for one process: buffer pool → file
/// manager → table service (startup recovery included) → catalog
/// store seeded from the loaded tables → planner → dispatcher.
pub async fn build_dispatcher(config: ServerConfig) -> DbResult<Dispatcher> {
    let buffer_pool = Arc::new(BufferPool::new(config.buffer_pool_max_pages));
    let file_manager = Arc::new(TableFileManager::with_buffer_pool(
        config.storage_directory.clone(),
        Arc::clone(&buffer_pool),
    )?);
    let service = Arc::new(TableService::with_file_manager(file_manager));

    let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
    for table in service.get_all_tables() {
        store.register_table(&table);
    }
    info!(
        "catalog seeded with {} tables from {}",
        service.get_all_tables().len(),
        config.storage_directory
    );
    let planner = Arc::new(QueryPlanner::new(Arc::clone(&store)));

    let shared = Arc::new(SharedServices {
        config,
        service,
        registry: Arc::new(ConnectionRegistry::new()),
        store: Some(store),
        planner: Some(planner),
        buffer_pool: Some(buffer_pool),
    });
    Dispatcher::bind(shared).await
}

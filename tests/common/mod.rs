use std::sync::Arc;

use pyrite::buffer::buffer_pool_manager::BufferPoolManager;
use pyrite::common::logger::initialize_logger;
use pyrite::storage::disk::disk_manager::FileDiskManager;
use tempfile::TempDir;

/// Shared setup for storage integration tests: a tempdir-backed database
/// file, its disk manager, and a buffer pool on top.
pub struct TestContext {
    pub bpm: Arc<BufferPoolManager>,
    pub disk_manager: Arc<FileDiskManager>,
    _temp_dir: TempDir,
}

impl TestContext {
    pub fn new(test_name: &str, pool_size: usize) -> Self {
        initialize_logger();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let db_file = temp_dir.path().join(format!("{test_name}.db"));
        let disk_manager = Arc::new(FileDiskManager::new(&db_file).expect("open database file"));
        let bpm = Arc::new(BufferPoolManager::new(pool_size, disk_manager.clone()));
        Self {
            bpm,
            disk_manager,
            _temp_dir: temp_dir,
        }
    }
}

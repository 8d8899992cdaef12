use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::config::{PageId, DB_PAGE_SIZE};
use crate::common::exception::DiskError;
use crate::storage::page::page::PageImage;

/// Page-granular disk interface consumed by the buffer pool: read and write
/// whole page images, allocate and release page ids. All four operations are
/// synchronous and may block.
pub trait DiskManager: Send + Sync {
    fn read_page(&self, page_id: PageId, page_data: &mut PageImage) -> Result<(), DiskError>;
    fn write_page(&self, page_id: PageId, page_data: &PageImage) -> Result<(), DiskError>;
    fn allocate_page(&self) -> PageId;
    fn deallocate_page(&self, page_id: PageId);
}

/// FileDiskManager stores pages in a single database file at
/// `page_id * DB_PAGE_SIZE` offsets. Reads past the end of the file observe
/// zeroes, so freshly allocated pages read back empty before their first
/// write.
pub struct FileDiskManager {
    file_name: PathBuf,
    db_io: Mutex<File>,
    next_page_id: AtomicU32,
    num_writes: AtomicU32,
    num_flushes: AtomicU32,
}

impl FileDiskManager {
    /// Opens (or creates) the database file. Page id allocation resumes past
    /// the highest page the file already holds.
    pub fn new(db_file: impl AsRef<Path>) -> Result<Self, DiskError> {
        let path = db_file.as_ref().to_path_buf();
        let open_err = |source| DiskError::Open {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();
        let next_page_id = len.div_ceil(DB_PAGE_SIZE as u64) as PageId;
        debug!("opened database file {}, {len} bytes", path.display());
        Ok(Self {
            file_name: path,
            db_io: Mutex::new(file),
            next_page_id: AtomicU32::new(next_page_id),
            num_writes: AtomicU32::new(0),
            num_flushes: AtomicU32::new(0),
        })
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Forces buffered writes down to the device.
    pub fn shut_down(&self) -> Result<(), DiskError> {
        let file = self.db_io.lock();
        file.sync_all().map_err(|source| DiskError::Open {
            path: self.file_name.clone(),
            source,
        })?;
        self.num_flushes.fetch_add(1, Ordering::SeqCst);
        debug!("database file {} synced", self.file_name.display());
        Ok(())
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::SeqCst)
    }

    pub fn num_flushes(&self) -> u32 {
        self.num_flushes.load(Ordering::SeqCst)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, page_data: &mut PageImage) -> Result<(), DiskError> {
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        let io_err = |source| DiskError::PageIo { page_id, source };
        let mut file = self.db_io.lock();
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        let mut total = 0;
        while total < DB_PAGE_SIZE {
            match file.read(&mut page_data[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_err(e)),
            }
        }
        // Short reads hit the end of the file; the tail of the page is zero.
        page_data[total..].fill(0);
        trace!("read page {page_id} at offset {offset}");
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page_data: &PageImage) -> Result<(), DiskError> {
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        let io_err = |source| DiskError::PageIo { page_id, source };
        let mut file = self.db_io.lock();
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        file.write_all(page_data).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        self.num_writes.fetch_add(1, Ordering::SeqCst);
        trace!("wrote page {page_id} at offset {offset}");
        Ok(())
    }

    fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    fn deallocate_page(&self, page_id: PageId) {
        // Page ids are not recycled; the slot simply goes unused.
        trace!("deallocated page {page_id}");
    }
}

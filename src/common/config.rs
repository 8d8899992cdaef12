/** Size of a data page in bytes. */
pub const DB_PAGE_SIZE: usize = 4096;

/** Default number of frames in the buffer pool. */
pub const BUFFER_POOL_SIZE: usize = 10;

/** Attempts the hash index makes against an exhausted pool before giving up. */
pub const PAGE_ALLOC_RETRIES: usize = 1024;

pub const INVALID_PAGE_ID: PageId = PageId::MAX; // invalid page id
pub const INVALID_TXN_ID: TxnId = TxnId::MAX; // invalid transaction id

pub type FrameId = usize; // frame id type
pub type PageId = u32; // page id type
pub type TxnId = u64; // transaction id type

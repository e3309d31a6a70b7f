use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use common::err::DbResult;
use common::schema::Table;

use crate::buffer_pool::BufferPool;
use crate::codec::table_file;
use crate::page::{PageId, PAGE_SIZE};

/// One `<table>.dat` file per table under a root directory.
///
/// Writes serialize to a `.tmp` sibling, flush, then atomically rename
/// over the target: a crash at any point leaves either the old file or
/// the whole new one. A stray `.tmp` from a dead process is ignorable
/// garbage and never read.
#[derive(Debug)]
pub struct TableFileManager {
    root: PathBuf,
    buffer_pool: Option<Arc<BufferPool>>,
}

impl TableFileManager {
    pub fn new(root: impl Into<PathBuf>) -> DbResult<Self> {
        Self::create(root.into(), None)
    }

    pub fn with_buffer_pool(root: impl Into<PathBuf>, pool: Arc<BufferPool>) -> DbResult<Self> {
        Self::create(root.into(), Some(pool))
    }

    fn create(root: PathBuf, buffer_pool: Option<Arc<BufferPool>>) -> DbResult<Self> {
        fs::create_dir_all(&root)?;
        Ok(TableFileManager { root, buffer_pool })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.dat", name))
    }

    pub fn write_table(&self, table: &Table) -> DbResult<()> {
        let data = table_file::encode_table(table)?;
        let path = self.table_path(&table.name);
        let tmp = self.root.join(format!("{}.dat.tmp", table.name));
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        if let Some(pool) = &self.buffer_pool {
            pool.invalidate_table(&table.name);
        }
        debug!(
            "wrote table '{}': {} rows, {} bytes",
            table.name,
            table.rows.len(),
            data.len()
        );
        Ok(())
    }

    /// Full table from disk, `None` when the file does not exist.
    /// Bypasses any row-level state; goes through the buffer pool at
    /// page granularity when one is attached.
    pub fn read_table(&self, name: &str) -> DbResult<Option<Table>> {
        let path = self.table_path(name);
        let data = match &self.buffer_pool {
            Some(_) => match self.read_all_pages(name, &path)? {
                Some(d) => d,
                None => return Ok(None),
            },
            None => match fs::read(&path) {
                Ok(d) => d,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            },
        };
        let table = table_file::decode_table(name, &path.to_string_lossy(), &data)?;
        Ok(Some(table))
    }

    fn read_all_pages(&self, name: &str, path: &Path) -> DbResult<Option<Vec<u8>>> {
        let len = match fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::with_capacity(len as usize);
        let mut page_no = 0u64;
        while let Some(page) = self.read_page(name, page_no)? {
            data.extend_from_slice(&page);
            if page.len() < PAGE_SIZE {
                break;
            }
            page_no += 1;
        }
        Ok(Some(data))
    }

    /// The page-sized slice starting at `page_no × PAGE_SIZE`; the last
    /// page of a file may be short. `None` past EOF or for a missing
    /// file.
    pub fn read_page(&self, name: &str, page_no: u64) -> DbResult<Option<Bytes>> {
        let path = self.table_path(name);
        match &self.buffer_pool {
            Some(pool) => {
                let id = PageId::new(name, page_no);
                pool.get_page(&id, || Self::load_page(&path, page_no))
            }
            None => Self::load_page(&path, page_no),
        }
    }

    fn load_page(path: &Path, page_no: u64) -> DbResult<Option<Bytes>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        let offset = page_no * PAGE_SIZE as u64;
        if offset >= len {
            return Ok(None);
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; PAGE_SIZE.min((len - offset) as usize)];
        file.read_exact(&mut buf)?;
        Ok(Some(Bytes::from(buf)))
    }

    /// Removes the table file; returns whether it existed.
    pub fn delete_table(&self, name: &str) -> DbResult<bool> {
        let path = self.table_path(name);
        let existed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if let Some(pool) = &self.buffer_pool {
            pool.invalidate_table(name);
        }
        Ok(existed)
    }

    /// Table names with a `.dat` file in the root directory, `.tmp`
    /// leftovers excluded. Order is unspecified.
    pub fn list_all_tables(&self) -> DbResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(stem) = file_name.strip_suffix(".dat") {
                if !stem.is_empty() {
                    names.push(stem.to_string());
                }
            }
        }
        Ok(names)
    }
}

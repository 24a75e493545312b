use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Error;
use crate::tree::{Content, Node};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    /// Never issued by the synthesizer, writes are acknowledged and dropped
    Write,
}

/// Content producer of a virtual file.
///
/// Called with the operation, the file, the offset inside the file and a buffer
/// already clipped to the file size. Returns how many bytes were produced, the
/// remainder of the buffer is zero filled.
pub type Callback = dyn Fn(Operation, &Node, u32, &mut [u8]) -> io::Result<usize> + Send + Sync;

/// Backing file opened read-only for the duration of one read
#[derive(Debug)]
pub(crate) struct BackingFile {
    file: fs::File,
}

impl BackingFile {
    pub fn open<P: AsRef<Path>>(filepath: P) -> io::Result<Self> {
        let file = fs::File::options().read(true).open(filepath)?;
        Ok(Self { file })
    }

    /// Read until `buf` is full or end of file is reached
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(size) => filled += size,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

pub(crate) struct Stat {
    pub size: u32,
    pub modified: NaiveDateTime,
}

pub(crate) fn stat(path: &Path) -> Result<Stat, Error> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(Error::InvalidArgument("not a regular file"));
    }
    let size = u32::try_from(metadata.len()).map_err(|_| Error::InvalidArgument("file too large"))?;
    let modified = match metadata.modified() {
        Ok(time) => DateTime::<Utc>::from(time).naive_utc(),
        Err(_) => Utc::now().naive_utc(),
    };
    Ok(Stat { size, modified })
}

/// Fill `buf` with content of `node` from `offset`, zero padding past the end of file
pub(crate) fn read(node: &Node, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
    let available = (node.size as u64).saturating_sub(offset).min(buf.len() as u64) as usize;
    let (head, tail) = buf.split_at_mut(available);
    tail.fill(0);
    if available == 0 {
        return Ok(());
    }
    let produced = match &node.content {
        Content::Virtual(callback) => callback(Operation::Read, node, offset as u32, head)
            .inspect_err(|e| warn!("Virtual file {} read failed: {}", node.name, e))?,
        Content::Backing(path) => BackingFile::open(path)
            .and_then(|mut file| file.read_at(offset, head))
            .inspect_err(|e| warn!("Backing file {} read failed: {}", path.display(), e))?,
        Content::Directory(_) => 0,
    };
    let produced = produced.min(available);
    if produced < available {
        trace!("Short read of {}, {} of {} bytes", node.name, produced, available);
        head[produced..].fill(0);
    }
    Ok(())
}

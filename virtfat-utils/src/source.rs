use std::fs;
use std::io;
use std::path::Path;

use virtfat::{Drive, FileID, Node, Operation};

use crate::Error;

/// Mirror the content of a host directory below `dir`
pub fn populate(drive: &mut Drive, dir: FileID, path: &Path) -> Result<(), Error> {
    let mut entries = fs::read_dir(path)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_str().ok_or(Error::String("File name not UTF-8"))?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let id = drive.add_dir(dir, name)?;
            populate(drive, id, &entry.path())?;
        } else if file_type.is_file() {
            drive.add_backing_file(dir, Some(name), entry.path())?;
        } else {
            warn!("Skip {}", entry.path().display());
        }
    }
    Ok(())
}

const README: &[u8] = b"This drive is synthesized on demand, nothing is stored.\r\n";

fn readme(_: Operation, _: &Node, offset: u32, buf: &mut [u8]) -> io::Result<usize> {
    let content = README.get(offset as usize..).unwrap_or_default();
    let size = core::cmp::min(content.len(), buf.len());
    buf[..size].copy_from_slice(&content[..size]);
    Ok(size)
}

/// Content used when no host directory is given
pub fn demo(drive: &mut Drive, dir: FileID) -> Result<(), Error> {
    drive.add_virtual_file(dir, "README.TXT", README.len() as u32, readme)?;
    Ok(())
}

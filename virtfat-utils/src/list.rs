use virtfat::{Drive, Match};

use crate::Error;

pub fn list(drive: &Drive, path: &str) -> Result<(), Error> {
    let id = drive.find_path(drive.root(), path.trim_matches('/'), Match::Any)?;
    let node = drive.file(id)?;
    let children = match node.is_directory() {
        true => drive.children(id)?,
        false => core::slice::from_ref(&id),
    };
    for &child in children {
        let node = drive.file(child)?;
        let attributes = node.attributes();
        let mut flags = ['-'; 5];
        if attributes.directory() {
            flags[0] = 'd';
        }
        if attributes.read_only() {
            flags[1] = 'r';
        }
        if attributes.system() {
            flags[2] = 's';
        }
        if attributes.hidden() {
            flags[3] = 'h';
        }
        if attributes.archive() {
            flags[4] = 'a';
        }
        let flags: String = flags.iter().collect();
        let date = node.date().format("%Y-%m-%d %H:%M:%S");
        let suffix = if node.is_directory() { "/" } else { "" };
        let short_name = node.short_name();
        match node.is_long_named() {
            true => println!("{} {:10} {} {}{} ({})", flags, node.size(), date, node.name(), suffix, short_name),
            false => println!("{} {:10} {} {}{}", flags, node.size(), date, node.name(), suffix),
        }
    }
    Ok(())
}

pub(crate) mod entry;
pub mod listing;
pub(crate) mod long_name;

use super::Volume;
use crate::endian::Plain;
use crate::geometry::FatType;
use crate::tree::shortname::{label_bytes, ShortName};
use crate::tree::{FileID, Node};
use crate::types::ClusterID;
use entry::{Attributes, ShortEntry};

pub(crate) const ENTRY_SIZE: usize = 32;

/// Slots of one directory sector, `first` being the table index of the first slot
struct Slots<'a> {
    buf: &'a mut [u8],
    first: u32,
    last: u32,
}

impl<'a> Slots<'a> {
    fn put<T: Plain>(&mut self, slot: u32, entry: &T) {
        if (self.first..self.last).contains(&slot) {
            let offset = (slot - self.first) as usize * ENTRY_SIZE;
            entry.encode(&mut self.buf[offset..offset + ENTRY_SIZE]);
        }
    }
}

fn short_entry(volume: &Volume, node: &Node) -> ShortEntry {
    let size = if node.is_directory() { 0 } else { node.size };
    let fat32 = volume.geometry.fat_type == FatType::FAT32;
    let name = node.short_name();
    ShortEntry::new(name, node.attributes, node.date, node.start_cluster(), size, fat32)
}

/// "." describes the directory itself, ".." its parent
fn dot_entries(volume: &Volume, node: &Node, slots: &mut Slots) {
    let fat32 = volume.geometry.fat_type == FatType::FAT32;
    let dot = ShortEntry::new(&ShortName::DOT, node.attributes, node.date, node.start_cluster(), 0, fat32);
    slots.put(0, &dot);
    let parent = match node.parent {
        Some(id) => volume.tree.node(id),
        None => return,
    };
    // ".." of a first level directory points to cluster 0 whatever the FAT type
    let cluster = match parent.is_root() {
        true => ClusterID::FREE,
        false => parent.start_cluster(),
    };
    let dotdot = ShortEntry::new(&ShortName::DOTDOT, parent.attributes, parent.date, cluster, 0, fat32);
    slots.put(1, &dotdot);
}

fn label_entry(volume: &Volume, root: &Node, label: &str, slots: &mut Slots) {
    let fat32 = volume.geometry.fat_type == FatType::FAT32;
    let name = ShortName::from_bytes(&label_bytes(Some(label)));
    let entry = ShortEntry::new(&name, Attributes::VOLUME_LABEL, root.date, ClusterID::FREE, 0, fat32);
    slots.put(0, &entry)
}

/// Produce sector `sector` of the directory table of `dir`
pub(crate) fn read_sector(volume: &Volume, dir: FileID, sector: u32, buf: &mut [u8]) {
    buf.fill(0);
    let tree = volume.tree;
    let node = tree.node(dir);
    let per_sector = (buf.len() / ENTRY_SIZE) as u32;
    let first = sector * per_sector;
    let mut slots = Slots { buf, first, last: first + per_sector };
    match (node.is_root(), volume.label) {
        (false, _) => dot_entries(volume, node, &mut slots),
        (true, Some(label)) => label_entry(volume, node, label, &mut slots),
        (true, None) => (),
    }

    let children = node.children();
    let start = children.partition_point(|&id| {
        let (entry, _) = tree.node(id).entry_position();
        entry < first
    });
    for &id in children[start..].iter() {
        let child = tree.node(id);
        let placement = child.placement;
        if placement.entry >= slots.last {
            break;
        }
        if placement.long_entries > 0 {
            let name: Vec<u16> = child.name.encode_utf16().collect();
            let checksum = long_name::checksum(&child.short_name);
            for position in 0..placement.long_entries {
                let entry = long_name::entry(&name, placement.long_entries, position, checksum);
                slots.put(placement.entry + position as u32, &entry);
            }
        }
        let (slot, _) = child.entry_position();
        slots.put(slot, &short_entry(volume, child));
    }
}

/// Master boot record in front of the partition
pub(crate) mod mbr;

/// Reserved region: boot sector, FSINFO and FAT32 backups
pub(crate) mod boot;

/// FAT region, two identical copies of
/// [`fat_sectors`](crate::geometry::Geometry::fat_sectors) sectors
pub(crate) mod fat;

/// Directory tables, either the fixed FAT12/16 root region or directory clusters
pub(crate) mod data;

use crate::geometry::Geometry;
use crate::tree::recalc::Allocation;
use crate::tree::Tree;

/// Read-only view of a recalculated drive, shared by all codecs
#[derive(Copy, Clone)]
pub(crate) struct Volume<'a> {
    pub geometry: &'a Geometry,
    pub tree: &'a Tree,
    pub allocation: &'a Allocation,
    pub long_names: bool,
    pub label: Option<&'a str>,
    pub serial: u32,
}

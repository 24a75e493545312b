#![doc = include_str!("../README.md")]

#[macro_use]
extern crate hex_literal;
extern crate heapless;
#[macro_use]
extern crate log;

mod dump;
mod endian;
pub mod error;
pub mod file;
pub mod geometry;
mod range;
mod read;
mod region;
mod source;
mod tree;
pub mod types;

use chrono::Utc;

pub use error::Error;
pub use geometry::{FatSelect, FatType, Geometry, Mbr, Options, Parameters};
pub use region::data::entry::{Attributes, Timestamp};
pub use region::data::listing::{parse_directory, Listing};
pub use source::{Callback, Operation};
pub use tree::shortname::ShortName;
pub use tree::{FileID, Kind, Match, Node};
use tree::recalc::Allocation;
use tree::{Tree, ROOT};

pub const DEFAULT_SERIAL: u32 = 0x12345678;

/// A synthesized FAT drive.
///
/// The tree can only be changed while the drive is unlocked, sectors can only be
/// read while the layout is up to date, which `lock` guarantees.
pub struct Drive {
    geometry: Geometry,
    options: Options,
    tree: Tree,
    label: Option<String>,
    serial: u32,
    lock_count: u32,
    /// Absent while the drive is dirty
    allocation: Option<Allocation>,
}

impl Drive {
    /// Empty drive of `capacity` bytes, rounded up to whole sectors
    pub fn new(capacity: u64, options: Options) -> Result<Self, Error> {
        Self::with_parameters(capacity, options, Parameters::default())
    }

    pub fn with_parameters(capacity: u64, options: Options, params: Parameters) -> Result<Self, Error> {
        let geometry = Geometry::solve(capacity, &options, &params)?;
        let now = Utc::now().naive_utc();
        let tree = Tree::new(geometry.fat_type == FatType::FAT32, now);
        info!("Created {} drive of {} sectors", geometry.fat_type, geometry.total_sectors());
        Ok(Self {
            geometry,
            options,
            tree,
            label: None,
            serial: DEFAULT_SERIAL,
            lock_count: 0,
            allocation: None,
        })
    }

    /// Solve a new geometry keeping the file tree
    pub fn recreate(&mut self, capacity: u64, mut options: Options, params: Parameters) -> Result<(), Error> {
        self.ensure_unlocked()?;
        if options.fat == FatSelect::Same {
            options.fat = FatSelect::Fixed(self.geometry.fat_type);
        }
        let geometry = Geometry::solve(capacity, &options, &params)?;
        self.tree.set_root_allocated(geometry.fat_type == FatType::FAT32);
        if geometry.fat_type != self.geometry.fat_type {
            info!("Drive changed from {} to {}", self.geometry.fat_type, geometry.fat_type);
        }
        self.geometry = geometry;
        self.options = options;
        self.set_dirty();
        Ok(())
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn fat_type(&self) -> FatType {
        self.geometry.fat_type
    }

    /// Boot sector file system type string, such as `FAT16   `
    pub fn filesystem_name(&self) -> &'static [u8; 8] {
        self.geometry.fat_type.filesystem_name()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Explicit parameters for re-creating this drive with the same layout
    pub fn parameters(&self) -> Parameters {
        self.geometry.parameters()
    }

    pub fn sector_size(&self) -> u32 {
        self.geometry.sector_size
    }

    pub fn sectors_per_cluster(&self) -> u32 {
        self.geometry.sectors_per_cluster
    }

    pub fn cluster_size(&self) -> u32 {
        self.geometry.cluster_size()
    }

    /// Size of the whole drive in bytes, MBR included
    pub fn bytes(&self) -> u64 {
        self.geometry.bytes()
    }

    pub fn total_sectors(&self) -> u64 {
        self.geometry.total_sectors()
    }

    pub fn data_clusters(&self) -> u32 {
        self.geometry.clusters
    }

    /// `None` while the drive is dirty
    pub fn used_clusters(&self) -> Option<u32> {
        self.allocation.as_ref().map(Allocation::used_clusters)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Set or clear the volume label, an empty label clears it
    pub fn set_label(&mut self, label: Option<&str>) -> Result<(), Error> {
        self.ensure_unlocked()?;
        self.label = label.filter(|label| !label.is_empty()).map(String::from);
        self.set_dirty();
        Ok(())
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn set_serial(&mut self, serial: u32) -> Result<(), Error> {
        self.ensure_unlocked()?;
        self.serial = serial;
        self.set_dirty();
        Ok(())
    }

    pub fn root(&self) -> FileID {
        ROOT
    }

    pub fn file(&self, id: FileID) -> Result<&Node, Error> {
        self.tree.get(id)
    }

    pub fn is_dirty(&self) -> bool {
        self.allocation.is_none()
    }

    /// Recompute directory sizes and cluster assignments
    pub fn recalc(&mut self) -> Result<(), Error> {
        self.ensure_unlocked()?;
        self.update()
    }

    fn update(&mut self) -> Result<(), Error> {
        self.allocation = None;
        let labelled = self.label.is_some();
        let allocation = self.tree.recalc(&self.geometry, self.options.long_names, labelled)?;
        debug!(
            "Recalculated {} files, {} of {} clusters used",
            allocation.index.len(),
            allocation.used_clusters(),
            self.geometry.clusters
        );
        self.allocation = Some(allocation);
        Ok(())
    }

    /// Freeze the tree, recalculating first when dirty. Locks nest.
    pub fn lock(&mut self) -> Result<(), Error> {
        if self.is_dirty() {
            self.update()?;
        }
        self.lock_count += 1;
        Ok(())
    }

    pub fn unlock(&mut self) -> Result<(), Error> {
        match self.lock_count {
            0 => Err(Error::InvalidArgument("drive not locked")),
            _ => {
                self.lock_count -= 1;
                Ok(())
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), Error> {
        match self.is_locked() {
            true => Err(Error::PermissionDenied),
            false => Ok(()),
        }
    }

    pub(crate) fn set_dirty(&mut self) {
        if self.allocation.take().is_some() {
            trace!("Drive marked dirty");
        }
    }

    pub(crate) fn volume(&self) -> Result<region::Volume<'_>, Error> {
        let allocation = self.allocation.as_ref().ok_or(Error::Stale)?;
        Ok(region::Volume {
            geometry: &self.geometry,
            tree: &self.tree,
            allocation,
            long_names: self.options.long_names,
            label: self.label.as_deref(),
            serial: self.serial,
        })
    }
}

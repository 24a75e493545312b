use super::{FileID, Tree, ROOT};
use crate::error::Error;
use crate::geometry::{FatType, Geometry};
use crate::range::{Range, RangeIndex};
use crate::types::ClusterID;

/// Outcome of a successful recalculation
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub index: RangeIndex,
    /// First cluster past the allocated ones
    pub next_cluster: ClusterID,
}

impl Allocation {
    pub fn used_clusters(&self) -> u32 {
        self.next_cluster.offset()
    }
}

const ENTRY_SIZE: u32 = 32;

impl Tree {
    pub(crate) fn recalc(
        &mut self,
        geometry: &Geometry,
        long_names: bool,
        labelled: bool,
    ) -> Result<Allocation, Error> {
        self.count_entries(ROOT, geometry, long_names, labelled)?;

        let mut ranges = Vec::new();
        ranges.try_reserve_exact(self.order.len()).map_err(|_| Error::OutOfMemory)?;
        let mut next_cluster = ClusterID::FIRST;
        let mut next_sector = geometry.data_start;
        for position in 0..self.order.len() {
            let id = self.order[position];
            let node = self.node_mut(id);
            let clusters = match node.is_directory() {
                true => node.placement.clusters,
                false => geometry.clusters_of(node.size as u64),
            };
            // A chain never outgrows the allocation and keeps at least one cluster
            let chained = match node.fat_size {
                Some(size) => core::cmp::max(1, geometry.clusters_of(size as u64)).min(clusters),
                None => clusters,
            };
            let placement = &mut node.placement;
            placement.clusters = clusters;
            if clusters == 0 {
                placement.start_cluster = ClusterID::FREE;
                placement.end_cluster = ClusterID::FREE;
                placement.chain_end = ClusterID::FREE;
                placement.start_sector = 0;
                placement.end_sector = 0;
                continue;
            }
            if next_cluster.offset() as u64 + clusters as u64 > geometry.clusters as u64 {
                return Err(Error::OutOfSpace("data region"));
            }
            let sectors = clusters * geometry.sectors_per_cluster;
            placement.start_cluster = next_cluster;
            placement.end_cluster = next_cluster + clusters;
            placement.chain_end = next_cluster + chained;
            placement.start_sector = next_sector;
            placement.end_sector = next_sector + sectors;
            trace!("File {} placed at cluster {} x {}", id, next_cluster, clusters);
            ranges.push(Range {
                sector_start: placement.start_sector,
                sector_end: placement.end_sector,
                cluster_start: placement.start_cluster,
                cluster_end: placement.end_cluster,
                chain_end: placement.chain_end,
                file: id,
            });
            next_cluster += clusters;
            next_sector += sectors;
        }
        Ok(Allocation { index: RangeIndex::new(ranges), next_cluster })
    }

    /// Lay out the entry table of `dir` and all directories below it
    fn count_entries(
        &mut self,
        dir: FileID,
        geometry: &Geometry,
        long_names: bool,
        labelled: bool,
    ) -> Result<(), Error> {
        let children = self.children(dir)?.to_vec();
        let is_root = dir == ROOT;
        let mut entries: u32 = match is_root {
            true => labelled as u32,
            false => 2,
        };
        for child in children {
            if self.node(child).is_directory() {
                self.count_entries(child, geometry, long_names, labelled)?;
            }
            let node = self.node_mut(child);
            let long_entries = match long_names && node.long_named {
                true => node.long_entries_needed(),
                false => 0,
            };
            node.placement.entry = entries;
            node.placement.long_entries = long_entries;
            entries += long_entries as u32 + 1;
        }

        let fat32 = geometry.fat_type == FatType::FAT32;
        if is_root && !fat32 && entries > geometry.root_entries {
            return Err(Error::OutOfSpace("root directory"));
        }
        let table = entries * ENTRY_SIZE;
        let clusters = match (is_root, fat32) {
            (true, true) => core::cmp::max(1, geometry.clusters_of(table as u64)),
            (true, false) => 0,
            (false, _) => geometry.clusters_of(table as u64),
        };
        let node = self.node_mut(dir);
        // Clustered directories span whole clusters, the fixed root only its entries
        node.size = match clusters {
            0 => table,
            clusters => clusters * geometry.cluster_size(),
        };
        node.placement.clusters = clusters;
        Ok(())
    }
}

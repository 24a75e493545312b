use crate::tree::FileID;
use crate::types::ClusterID;

/// Sectors and clusters owned by one file or directory, ends exclusive
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Range {
    pub sector_start: u32,
    pub sector_end: u32,
    pub cluster_start: ClusterID,
    pub cluster_end: ClusterID,
    /// Clusters from here to `cluster_end` are allocated but left out of the FAT chain
    pub chain_end: ClusterID,
    pub file: FileID,
}

/// Disjoint ranges sorted by starting sector
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RangeIndex(Vec<Range>);

impl RangeIndex {
    pub fn new(mut ranges: Vec<Range>) -> Self {
        ranges.sort_unstable_by_key(|range| range.sector_start);
        Self(ranges)
    }

    /// Position of the first range ending after `sector`
    pub fn position_by_sector(&self, sector: u32) -> usize {
        self.0.partition_point(|range| range.sector_end <= sector)
    }

    /// Position of the first range ending after `cluster`
    pub fn position_by_cluster(&self, cluster: ClusterID) -> usize {
        self.0.partition_point(|range| range.cluster_end <= cluster)
    }

    pub fn find_sector(&self, sector: u32) -> Option<&Range> {
        let range = self.0.get(self.position_by_sector(sector))?;
        (range.sector_start <= sector).then_some(range)
    }

    pub fn get(&self, position: usize) -> Option<&Range> {
        self.0.get(position)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Range> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

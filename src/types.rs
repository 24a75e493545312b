use derive_more::{Display, From, Into};

/// Absolute sector number on the synthesized drive, MBR included
#[derive(Copy, Clone, Debug, Display, From, Into, PartialEq, Eq)]
pub struct SectorID(u64);

/// FAT cluster number, data clusters start at 2
#[derive(Copy, Clone, Debug, Default, Display, From, Into, Eq, Ord, PartialOrd, PartialEq)]
pub struct ClusterID(u32);

impl ClusterID {
    /// Start cluster of empty files and of the FAT12/16 root
    pub const FREE: Self = Self(0);
    pub(crate) const FIRST: Self = Self(2);

    pub fn valid(&self) -> bool {
        *self >= Self::FIRST
    }

    /// Index of this cluster inside the data region
    pub(crate) fn offset(self) -> u32 {
        self.0 - Self::FIRST.0
    }
}

impl core::ops::Add<u32> for ClusterID {
    type Output = Self;

    fn add(self, clusters: u32) -> Self {
        Self(self.0 + clusters)
    }
}

impl core::ops::AddAssign<u32> for ClusterID {
    fn add_assign(&mut self, clusters: u32) {
        *self = *self + clusters
    }
}

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::tree::{FileID, ROOT};
use crate::Drive;

impl Drive {
    /// Run `f` with the drive locked, unlocking whatever the outcome
    fn locked<T, F>(&mut self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Self) -> Result<T, Error>,
    {
        self.lock()?;
        let result = f(self);
        self.unlock()?;
        result
    }

    /// Write the whole drive image to `path`, one cluster at a time
    pub fn dump<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        self.locked(|drive| {
            let mut file = BufWriter::new(fs::File::create(path)?);
            let total = drive.total_sectors();
            let step = drive.sectors_per_cluster() as u64;
            let mut buf = vec![0u8; drive.cluster_size() as usize];
            let mut sector = 0;
            while sector < total {
                let count = core::cmp::min(step, total - sector);
                let buf = &mut buf[..(count * drive.sector_size() as u64) as usize];
                drive.read_sectors(sector, buf)?;
                file.write_all(buf)?;
                sector += count;
            }
            file.flush()?;
            info!("Dumped {} sectors to {}", total, path.display());
            Ok(())
        })
    }

    /// Print geometry, file placements and the range index
    pub fn dump_info<W: Write>(&mut self, out: &mut W) -> Result<(), Error> {
        self.locked(|drive| drive.write_info(out).map_err(Error::from))
    }

    fn write_info<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let geometry = &self.geometry;
        writeln!(out, "Drive details:")?;
        writeln!(out, "  Label:                 {}", self.label().unwrap_or("<none>"))?;
        writeln!(out, "  Serial number:         0x{:08x}", self.serial)?;
        writeln!(out, "  Bytes per sector:      {}", geometry.sector_size)?;
        writeln!(out, "  Sectors per cluster:   {}", geometry.sectors_per_cluster)?;
        writeln!(out, "  Bytes per cluster:     {}", geometry.cluster_size())?;
        writeln!(out, "  Sector count:          {}", geometry.sectors)?;
        writeln!(out, "  Cluster count (data):  {}", geometry.clusters)?;
        match geometry.mbr_sectors {
            0 => writeln!(out, "  MBR sectors:           <no MBR>")?,
            sectors => writeln!(out, "  MBR sectors:           {}", sectors)?,
        }
        writeln!(out, "  Drive size:            {}", geometry.bytes())?;
        writeln!(out, "  Filesystem:            {}", geometry.fat_type)?;
        writeln!(out, "  Root dir entries:      {}", geometry.root_entries)?;
        writeln!(out, "  Sectors per FAT:       {}", geometry.fat_sectors)?;
        writeln!(out, "  FAT 1 start:           {}", geometry.fat1_start)?;
        writeln!(out, "  FAT 2 start:           {}", geometry.fat2_start)?;
        writeln!(out, "  Root dir start sect:   {}", geometry.root_start)?;
        writeln!(out, "  Root dir sectors:      {}", geometry.root_sectors)?;
        writeln!(out, "  Data sector start:     {}", geometry.data_start)?;
        if let Some(used) = self.used_clusters() {
            writeln!(out, "  Data clusters used:    {}", used)?;
        }

        writeln!(out, "\nFiles:")?;
        for &id in self.tree.order().iter().chain(self.unallocated_root().iter()) {
            let node = self.tree.node(id);
            let kind = if node.is_directory() { "Dir " } else { "File" };
            let parent = match node.parent() {
                Some(parent) => self.tree.node(parent).name(),
                None => "<none>",
            };
            let (entry, long_entries) = node.entry_position();
            writeln!(out, "  {} {}: '{}'", kind, id, node.name())?;
            writeln!(out, "    Short name:       '{}'", node.short_name())?;
            writeln!(out, "    Parent:           {}", parent)?;
            writeln!(out, "    Size:             {}", node.size())?;
            writeln!(out, "    Clusters:         {}", node.clusters())?;
            writeln!(out, "    Start cluster:    {}", node.start_cluster())?;
            writeln!(out, "    End cluster:      {}", node.end_cluster())?;
            if let Some(fat_size) = node.fat_size() {
                writeln!(out, "    FAT size:         {} (chain ends at {})", fat_size, node.chain_end())?;
            }
            writeln!(out, "    Sectors:          {:?}", node.sectors())?;
            writeln!(out, "    Entry position:   {} ({} long)", entry, long_entries)?;
        }

        writeln!(out, "\nRanges:")?;
        let ranges = self.allocation.iter().flat_map(|allocation| allocation.index.iter());
        for (index, range) in ranges.enumerate() {
            writeln!(out, "{:3}: '{}'", index, self.tree.node(range.file).name())?;
            writeln!(out, "     Sector start:  {}", range.sector_start)?;
            writeln!(out, "     Sector end:    {}", range.sector_end)?;
            writeln!(out, "     Cluster start: {}", range.cluster_start)?;
            writeln!(out, "     Cluster end:   {}", range.cluster_end)?;
        }
        Ok(())
    }

    /// FAT12/16 roots are not part of the allocation order
    fn unallocated_root(&self) -> Option<FileID> {
        (!self.tree.order().contains(&ROOT)).then_some(ROOT)
    }
}

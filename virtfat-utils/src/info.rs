use std::io;

use mbr_nostd::{MasterBootRecord, PartitionTable};
use virtfat::Drive;

use crate::Error;

pub fn info(drive: &mut Drive) -> Result<(), Error> {
    drive.dump_info(&mut io::stdout().lock())?;
    if drive.geometry().mbr_sectors == 0 {
        return Ok(());
    }
    let mut buf = vec![0u8; drive.sector_size() as usize];
    drive.read_sectors(0, &mut buf)?;
    let mbr = MasterBootRecord::from_bytes(&buf).map_err(|_| Error::String("Invalid MBR"))?;
    println!("\nPartitions:");
    for (index, entry) in mbr.partition_table_entries().iter().enumerate() {
        if entry.sector_count == 0 {
            continue;
        }
        let partition_type = entry.partition_type;
        println!("  {}: {:?}", index, partition_type);
        println!("     Start sector:  {}", entry.logical_block_address);
        println!("     Sector count:  {}", entry.sector_count);
    }
    Ok(())
}

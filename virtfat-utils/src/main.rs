#[macro_use]
extern crate log;

mod dump;
mod info;
mod list;
mod sector;
mod source;

use std::path::PathBuf;

use clap::Parser;
use derive_more::Display;
use thiserror::Error;
use virtfat::{Drive, FatSelect, FatType, Mbr, Options};

#[derive(Debug, Display, Error)]
pub enum Error {
    #[display("{_0}")]
    Drive(#[from] virtfat::Error),
    #[display("IO: {_0}")]
    IO(#[from] std::io::Error),
    #[display("{_0}")]
    String(&'static str),
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum Fat {
    Auto,
    /// Automatic, but never FAT32
    AutoNo32,
    Fat12,
    Fat16,
    Fat32,
}

impl From<Fat> for FatSelect {
    fn from(fat: Fat) -> Self {
        match fat {
            Fat::Auto => Self::Auto,
            Fat::AutoNo32 => Self::AutoNo32,
            Fat::Fat12 => Self::Fixed(FatType::FAT12),
            Fat::Fat16 => Self::Fixed(FatType::FAT16),
            Fat::Fat32 => Self::Fixed(FatType::FAT32),
        }
    }
}

#[derive(Debug, clap::Args)]
struct List {
    /// Specify path to list, default to root directory
    #[clap(default_value = "/")]
    path: String,
}

#[derive(Debug, clap::Args)]
struct Dump {
    /// Image file to write
    image: PathBuf,
}

#[derive(Debug, clap::Args)]
struct Sector {
    /// Absolute sector number, MBR included
    sector: u64,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Print drive geometry and file placement
    Info,
    /// List file and directory in specified path
    #[clap(name = "ls")]
    List(List),
    /// Write the synthesized image to a file
    Dump(Dump),
    /// Hex dump a single sector
    Sector(Sector),
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long)]
    quiet: bool,
    #[clap(short, action = clap::ArgAction::Count)]
    verbosity: u8,
    /// Host directory exposed on the drive, a demo file is added when absent
    #[clap(short, long)]
    source: Option<PathBuf>,
    /// Drive size in MiB
    #[clap(long, default_value_t = 64)]
    size: u64,
    #[clap(long, value_enum, default_value_t = Fat::Auto)]
    fat: Fat,
    /// Emit VFAT long names
    #[clap(long)]
    vfat: bool,
    /// Put a master boot record in front of the partition
    #[clap(long)]
    mbr: bool,
    #[clap(long)]
    label: Option<String>,
    #[clap(subcommand)]
    action: Action,
}

fn build(args: &Args) -> Result<Drive, Error> {
    let options = Options {
        fat: args.fat.into(),
        long_names: args.vfat,
        mbr: args.mbr.then_some(Mbr::Single),
        ..Default::default()
    };
    let mut drive = Drive::new(args.size << 20, options)?;
    drive.set_label(args.label.as_deref())?;
    let root = drive.root();
    match &args.source {
        Some(path) => source::populate(&mut drive, root, path)?,
        None => source::demo(&mut drive, root)?,
    }
    drive.lock()?;
    Ok(drive)
}

fn main() {
    let args = Args::parse();
    let level = match (args.quiet, args.verbosity) {
        (true, _) => log::LevelFilter::Off,
        (_, 0) => log::LevelFilter::Info,
        (_, 1) => log::LevelFilter::Debug,
        (_, _) => log::LevelFilter::Trace,
    };
    log::set_max_level(level);
    env_logger::builder().filter(None, level).target(env_logger::Target::Stderr).init();

    let result = build(&args).and_then(|mut drive| match &args.action {
        Action::Info => info::info(&mut drive),
        Action::List(list) => list::list(&drive, &list.path),
        Action::Dump(dump) => dump::dump(&mut drive, &dump.image),
        Action::Sector(sector) => sector::sector(&drive, sector.sector),
    });
    if let Some(error) = result.err() {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

pub(crate) mod recalc;
pub mod shortname;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use derive_more::Display;

use crate::error::Error;
use crate::region::data::entry::Attributes;
use crate::source::Callback;
use crate::types::ClusterID;
use shortname::ShortName;

/// Handle of a file or directory inside a drive
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct FileID(u32);

impl FileID {
    #[cfg(test)]
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) const ROOT: FileID = FileID(0);

pub(crate) enum Content {
    Directory(Vec<FileID>),
    Virtual(Box<Callback>),
    Backing(PathBuf),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Directory,
    Virtual,
    Backing,
}

/// Where a node landed during the last recalculation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Placement {
    pub clusters: u32,
    pub start_cluster: ClusterID,
    pub end_cluster: ClusterID,
    /// One past the last cluster chained in the FAT
    pub chain_end: ClusterID,
    pub start_sector: u32,
    pub end_sector: u32,
    /// First slot occupied in the parent directory table
    pub entry: u32,
    /// Long name entries in front of the short entry
    pub long_entries: u8,
}

pub struct Node {
    pub(crate) name: String,
    pub(crate) short_name: ShortName,
    pub(crate) long_named: bool,
    pub(crate) attributes: Attributes,
    pub(crate) parent: Option<FileID>,
    pub(crate) date: NaiveDateTime,
    /// Content size, or directory table size once recalculated
    pub(crate) size: u32,
    /// Bytes covered by the FAT chain when shorter than the content
    pub(crate) fat_size: Option<u32>,
    pub(crate) content: Content,
    pub(crate) placement: Placement,
}

impl Node {
    pub(crate) fn new(name: &str, attributes: Attributes, date: NaiveDateTime, content: Content) -> Self {
        Self {
            name: name.into(),
            short_name: ShortName::default(),
            long_named: false,
            attributes,
            parent: None,
            date,
            size: 0,
            fat_size: None,
            content,
            placement: Placement::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &ShortName {
        &self.short_name
    }

    /// Whether long name entries are emitted in front of the 8.3 entry
    pub fn is_long_named(&self) -> bool {
        self.long_named
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn parent(&self) -> Option<FileID> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn fat_size(&self) -> Option<u32> {
        self.fat_size
    }

    pub fn kind(&self) -> Kind {
        match self.content {
            Content::Directory(_) => Kind::Directory,
            Content::Virtual(_) => Kind::Virtual,
            Content::Backing(_) => Kind::Backing,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.content, Content::Directory(_))
    }

    pub fn backing_path(&self) -> Option<&Path> {
        match &self.content {
            Content::Backing(path) => Some(path),
            _ => None,
        }
    }

    pub fn clusters(&self) -> u32 {
        self.placement.clusters
    }

    /// First cluster, `ClusterID::FREE` for empty files and the FAT12/16 root
    pub fn start_cluster(&self) -> ClusterID {
        self.placement.start_cluster
    }

    pub fn end_cluster(&self) -> ClusterID {
        self.placement.end_cluster
    }

    /// End of the cluster chain, before `end_cluster` when the FAT size is overridden
    pub fn chain_end(&self) -> ClusterID {
        self.placement.chain_end
    }

    /// Sector range relative to the partition start
    pub fn sectors(&self) -> core::ops::Range<u32> {
        self.placement.start_sector..self.placement.end_sector
    }

    /// Directory table slot of the 8.3 entry and the number of long name entries before it
    pub fn entry_position(&self) -> (u32, u8) {
        let placement = &self.placement;
        (placement.entry + placement.long_entries as u32, placement.long_entries)
    }

    pub(crate) fn children(&self) -> &[FileID] {
        match &self.content {
            Content::Directory(children) => children,
            _ => &[],
        }
    }

    pub(crate) fn long_entries_needed(&self) -> u8 {
        ((self.name.encode_utf16().count() + 12) / 13) as u8
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("short_name", &self.short_name.as_string())
            .field("kind", &self.kind())
            .field("size", &self.size)
            .field("fat_size", &self.fat_size)
            .field("placement", &self.placement)
            .finish()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Match {
    /// Long or short name
    #[default]
    Any,
    Short,
    Long,
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

/// Arena of nodes, the root always lives in slot 0
pub(crate) struct Tree {
    nodes: Vec<Option<Node>>,
    /// Creation order, which is the cluster allocation order as well
    order: Vec<FileID>,
}

impl Tree {
    pub fn new(root_allocated: bool, date: NaiveDateTime) -> Self {
        let mut attributes = Attributes::default();
        attributes.set_directory(true);
        let root = Node::new("", attributes, date, Content::Directory(Vec::new()));
        let order = if root_allocated { vec![ROOT] } else { Vec::new() };
        Self { nodes: vec![Some(root)], order }
    }

    pub fn get(&self, id: FileID) -> Result<&Node, Error> {
        self.nodes.get(id.index()).and_then(Option::as_ref).ok_or(Error::NotFound)
    }

    pub fn get_mut(&mut self, id: FileID) -> Result<&mut Node, Error> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut).ok_or(Error::NotFound)
    }

    /// Lookup of an id known to be alive
    pub fn node(&self, id: FileID) -> &Node {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node,
            _ => unreachable!("Dangling file {}", id),
        }
    }

    pub fn node_mut(&mut self, id: FileID) -> &mut Node {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => unreachable!("Dangling file {}", id),
        }
    }

    pub fn order(&self) -> &[FileID] {
        &self.order
    }

    /// Only FAT32 stores its root directory inside the data region
    pub fn set_root_allocated(&mut self, allocated: bool) {
        let present = self.order.contains(&ROOT);
        match (allocated, present) {
            (true, false) => self.order.push(ROOT),
            (false, true) => self.order.retain(|&id| id != ROOT),
            _ => (),
        }
    }

    pub fn children(&self, dir: FileID) -> Result<&[FileID], Error> {
        match &self.get(dir)?.content {
            Content::Directory(children) => Ok(children),
            _ => Err(Error::InvalidArgument("not a directory")),
        }
    }

    fn children_mut(&mut self, dir: FileID) -> Result<&mut Vec<FileID>, Error> {
        match &mut self.get_mut(dir)?.content {
            Content::Directory(children) => Ok(children),
            _ => Err(Error::InvalidArgument("not a directory")),
        }
    }

    pub fn insert(&mut self, parent: FileID, mut node: Node) -> Result<FileID, Error> {
        let id = FileID(self.nodes.len() as u32);
        self.children_mut(parent)?.push(id);
        node.parent = Some(parent);
        self.nodes.push(Some(node));
        self.order.push(id);
        Ok(id)
    }

    /// Unlink `id` from its parent, the node itself stays
    pub fn detach(&mut self, id: FileID) -> Result<(), Error> {
        let parent = self.get(id)?.parent.ok_or(Error::InvalidArgument("root directory"))?;
        self.children_mut(parent)?.retain(|&child| child != id);
        Ok(())
    }

    pub fn attach(&mut self, id: FileID, parent: FileID) -> Result<(), Error> {
        self.children_mut(parent)?.push(id);
        self.get_mut(id)?.parent = Some(parent);
        Ok(())
    }

    /// Remove `id` and all its descendants
    pub fn remove(&mut self, id: FileID) -> Result<(), Error> {
        self.detach(id)?;
        let mut stack = vec![id];
        let mut removed = Vec::new();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) {
                if let Content::Directory(children) = node.content {
                    stack.extend(children);
                }
                removed.push(id);
            }
        }
        removed.sort_unstable();
        self.order.retain(|id| removed.binary_search(id).is_err());
        Ok(())
    }

    pub fn swap_children(&mut self, dir: FileID, a: usize, b: usize) -> Result<(), Error> {
        self.children_mut(dir)?.swap(a, b);
        Ok(())
    }

    pub fn find(&self, dir: FileID, name: &str, how: Match, skip: Option<FileID>) -> Option<FileID> {
        let children = self.children(dir).ok()?;
        children.iter().copied().filter(|&id| Some(id) != skip).find(|&id| {
            let node = self.node(id);
            match how {
                Match::Any => same_name(&node.name, name) || node.short_name.matches(name),
                Match::Short => node.short_name.matches(name),
                Match::Long => same_name(&node.name, name),
            }
        })
    }

    /// Whether `candidate` clashes with a short or long name inside `dir`
    pub fn short_name_taken(&self, dir: FileID, candidate: &ShortName, skip: Option<FileID>) -> bool {
        let name = candidate.as_string();
        let children = self.node(dir).children();
        children.iter().filter(|&&id| Some(id) != skip).any(|&id| {
            let node = self.node(id);
            node.short_name == *candidate || same_name(&node.name, &name)
        })
    }

    /// Whether `ancestor` is `id` itself or one of its parents
    pub fn is_ancestor(&self, ancestor: FileID, id: FileID) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).ok().and_then(|node| node.parent);
        }
        false
    }

    pub fn find_path(&self, dir: FileID, path: &str, how: Match) -> Result<FileID, Error> {
        let path = path.trim_matches(|c| c == '/' || c == '\\');
        let mut current = dir;
        if path.is_empty() {
            return self.get(current).map(|_| current);
        }
        for name in path.split(['/', '\\']) {
            if !self.get(current)?.is_directory() {
                return Err(Error::InvalidArgument("not a directory"));
            }
            current = self.find(current, name, how, None).ok_or(Error::NotFound)?;
        }
        Ok(current)
    }
}

//! Project item record and snapshot shape.
//!
//! # Responsibility
//! - Define the leaf data record held by the item store.
//! - Convert between items and the flat snapshot records exchanged by
//!   `pack`/`unpack`.
//!
//! # Invariants
//! - Root-typed items never carry a parent handle.
//! - `root` is a cached back-reference only; it is recomputed by the tree and
//!   never persisted.
//!
//! # See also
//! - `crate::tree` for the store that owns items.

use crate::model::handle::{Handle, HandleError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural role of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    NoType,
    /// Top-level container anchoring one class.
    Root,
    Folder,
    /// Document backed by one content unit.
    File,
    /// Legacy trash marker; behaves as a root.
    Trash,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoType => "NO_TYPE",
            Self::Root => "ROOT",
            Self::Folder => "FOLDER",
            Self::File => "FILE",
            Self::Trash => "TRASH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NO_TYPE" => Some(Self::NoType),
            "ROOT" => Some(Self::Root),
            "FOLDER" => Some(Self::Folder),
            "FILE" => Some(Self::File),
            "TRASH" => Some(Self::Trash),
            _ => None,
        }
    }
}

/// Domain category of an item, inherited from its root.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemClass {
    NoClass,
    Novel,
    Plot,
    Character,
    World,
    Timeline,
    Object,
    Entity,
    Custom,
    Archive,
    Template,
    Trash,
}

impl ItemClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoClass => "NO_CLASS",
            Self::Novel => "NOVEL",
            Self::Plot => "PLOT",
            Self::Character => "CHARACTER",
            Self::World => "WORLD",
            Self::Timeline => "TIMELINE",
            Self::Object => "OBJECT",
            Self::Entity => "ENTITY",
            Self::Custom => "CUSTOM",
            Self::Archive => "ARCHIVE",
            Self::Template => "TEMPLATE",
            Self::Trash => "TRASH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NO_CLASS" => Some(Self::NoClass),
            "NOVEL" => Some(Self::Novel),
            "PLOT" => Some(Self::Plot),
            "CHARACTER" => Some(Self::Character),
            "WORLD" => Some(Self::World),
            "TIMELINE" => Some(Self::Timeline),
            "OBJECT" => Some(Self::Object),
            "ENTITY" => Some(Self::Entity),
            "CUSTOM" => Some(Self::Custom),
            "ARCHIVE" => Some(Self::Archive),
            "TEMPLATE" => Some(Self::Template),
            "TRASH" => Some(Self::Trash),
            _ => None,
        }
    }
}

/// How a document's words are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemLayout {
    NoLayout,
    /// Manuscript text; counted as novel words.
    Document,
    /// Supporting material; counted as note words.
    Note,
}

impl ItemLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoLayout => "NO_LAYOUT",
            Self::Document => "DOCUMENT",
            Self::Note => "NOTE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NO_LAYOUT" => Some(Self::NoLayout),
            "DOCUMENT" => Some(Self::Document),
            "NOTE" => Some(Self::Note),
            _ => None,
        }
    }
}

/// Flat snapshot record for one item.
///
/// Field order is the stable wire order of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub handle: String,
    pub parent: Option<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub class: ItemClass,
    pub layout: ItemLayout,
    pub name: String,
    pub word_count: u64,
}

/// Errors converting a snapshot record into an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Record handle is malformed.
    InvalidHandle(HandleError),
    /// Record parent handle is malformed.
    InvalidParent {
        handle: Handle,
        source: HandleError,
    },
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHandle(err) => write!(f, "invalid item record: {err}"),
            Self::InvalidParent { handle, source } => {
                write!(f, "invalid parent on item record {handle}: {source}")
            }
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidHandle(err) => Some(err),
            Self::InvalidParent { source, .. } => Some(source),
        }
    }
}

/// One entry of the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub handle: Handle,
    /// `None` for roots and for items detached by a repair.
    pub parent: Option<Handle>,
    /// Cached topmost ancestor, set by the tree after a successful walk.
    pub root: Option<Handle>,
    pub item_type: ItemType,
    pub item_class: ItemClass,
    pub item_layout: ItemLayout,
    pub name: String,
    pub word_count: u64,
}

impl Item {
    /// Creates an item with no layout and a zero word count.
    ///
    /// Root-typed items drop any parent.
    pub fn new(
        handle: Handle,
        name: impl Into<String>,
        parent: Option<Handle>,
        item_type: ItemType,
        item_class: ItemClass,
    ) -> Self {
        let parent = if item_type_is_root(item_type) {
            None
        } else {
            parent
        };
        Self {
            handle,
            parent,
            root: None,
            item_type,
            item_class,
            item_layout: ItemLayout::NoLayout,
            name: name.into(),
            word_count: 0,
        }
    }

    /// Builds an item from a snapshot record.
    ///
    /// # Errors
    /// - Returns `InvalidHandle` / `InvalidParent` for malformed handle text.
    pub fn from_record(record: &ItemRecord) -> Result<Self, RecordError> {
        let handle = Handle::parse(&record.handle).map_err(RecordError::InvalidHandle)?;
        let parent = match record.parent.as_deref() {
            None => None,
            Some(value) => Some(Handle::parse(value).map_err(|source| {
                RecordError::InvalidParent {
                    handle: handle.clone(),
                    source,
                }
            })?),
        };
        Ok(Self {
            handle,
            parent,
            root: None,
            item_type: record.item_type,
            item_class: record.class,
            item_layout: record.layout,
            name: record.name.clone(),
            word_count: record.word_count,
        })
    }

    /// Packs this item into its snapshot record.
    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            handle: self.handle.to_string(),
            parent: self.parent.as_ref().map(Handle::to_string),
            item_type: self.item_type,
            class: self.item_class,
            layout: self.item_layout,
            name: self.name.clone(),
            word_count: self.word_count,
        }
    }

    /// Copies all item data under a new handle. The cached root is kept since
    /// the copy shares the source's parent.
    pub fn duplicate_as(&self, handle: Handle) -> Self {
        Self {
            handle,
            ..self.clone()
        }
    }

    pub fn is_root_type(&self) -> bool {
        item_type_is_root(self.item_type)
    }

    pub fn is_file_type(&self) -> bool {
        self.item_type == ItemType::File
    }

    /// Whether this item is the trash container.
    pub fn is_trash_root(&self) -> bool {
        self.is_root_type() && self.item_class == ItemClass::Trash
    }

    /// Applies defaults derived from the root's class.
    ///
    /// Items inside the trash keep their own class so they can be restored.
    pub fn set_class_defaults(&mut self, root_class: ItemClass) {
        if self.parent.is_some() && root_class != ItemClass::Trash {
            self.item_class = root_class;
        }
        if self.is_file_type() && self.item_layout == ItemLayout::NoLayout {
            self.item_layout = if self.item_class == ItemClass::Novel {
                ItemLayout::Document
            } else {
                ItemLayout::Note
            };
        }
    }
}

fn item_type_is_root(item_type: ItemType) -> bool {
    matches!(item_type, ItemType::Root | ItemType::Trash)
}

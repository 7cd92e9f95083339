//! Entity registry: the fixed, ordered list of syncable tables.
//!
//! `TableKind::ALL` is ordered parents-first. Change scripts are emitted in
//! this order, so a store that enforces foreign keys can replay them without
//! deferring constraints. Adding a table is a code change here and nowhere else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A foreign key from one syncable table to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Column on the child row holding the parent id
    pub column: &'static str,
    /// Table the column points at
    pub parent: TableKind,
}

const fn fk(column: &'static str, parent: TableKind) -> ForeignKey {
    ForeignKey { column, parent }
}

const NO_REFERENCES: &[ForeignKey] = &[];
const ITEM_REFERENCES: &[ForeignKey] = &[
    fk("folder_id", TableKind::Folders),
    fk("logo_id", TableKind::Logos),
];
const FIELD_VALUE_REFERENCES: &[ForeignKey] = &[
    fk("item_id", TableKind::Items),
    fk("field_definition_id", TableKind::FieldDefinitions),
];
const ITEM_TAG_REFERENCES: &[ForeignKey] = &[
    fk("item_id", TableKind::Items),
    fk("tag_id", TableKind::Tags),
];
const ITEM_CHILD_REFERENCES: &[ForeignKey] = &[fk("item_id", TableKind::Items)];

/// Syncable table kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Logos,
    Folders,
    FieldDefinitions,
    Tags,
    Items,
    FieldValues,
    FieldHistories,
    ItemTags,
    Attachments,
    TotpCodes,
    Passkeys,
}

impl TableKind {
    /// Every syncable table, parents before children.
    pub const ALL: [Self; 11] = [
        Self::Logos,
        Self::Folders,
        Self::FieldDefinitions,
        Self::Tags,
        Self::Items,
        Self::FieldValues,
        Self::FieldHistories,
        Self::ItemTags,
        Self::Attachments,
        Self::TotpCodes,
        Self::Passkeys,
    ];

    /// Table name used in the local store and in vault documents.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logos => "logos",
            Self::Folders => "folders",
            Self::FieldDefinitions => "field_definitions",
            Self::Tags => "tags",
            Self::Items => "items",
            Self::FieldValues => "field_values",
            Self::FieldHistories => "field_histories",
            Self::ItemTags => "item_tags",
            Self::Attachments => "attachments",
            Self::TotpCodes => "totp_codes",
            Self::Passkeys => "passkeys",
        }
    }

    /// Foreign keys this table holds, all pointing at earlier registry entries.
    pub const fn references(self) -> &'static [ForeignKey] {
        match self {
            Self::Logos | Self::Folders | Self::FieldDefinitions | Self::Tags => NO_REFERENCES,
            Self::Items => ITEM_REFERENCES,
            Self::FieldValues => FIELD_VALUE_REFERENCES,
            Self::ItemTags => ITEM_TAG_REFERENCES,
            Self::FieldHistories | Self::Attachments | Self::TotpCodes | Self::Passkeys => {
                ITEM_CHILD_REFERENCES
            }
        }
    }

    /// Index of this table in `ALL`.
    pub fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown table: {s}")))
    }
}

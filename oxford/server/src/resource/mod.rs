//! Officer pages as data.
//!
//! Every officer dashboard is the same list/detail page over a different
//! table. A [`ResourceConfig`] says which table, which fields, how the list is
//! ordered and which extra behaviors the page has.

use crate::form::FieldSpec;
use crate::remote::SortOrder;

pub mod catalog;
pub mod events;
pub mod web;

/// Two-valued status column that can be flipped in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusToggle {
    pub column: &'static str,
    /// Value of an unfinished row. A missing or null column reads as this.
    pub off: &'static str,
    pub on: &'static str,
}

impl StatusToggle {
    pub fn flipped(&self, current: &str) -> &'static str {
        if current == self.on { self.off } else { self.on }
    }
}

#[derive(Debug)]
pub struct ResourceConfig {
    /// Path segment of the page, e.g. `members` for `/members`.
    pub slug: &'static str,
    /// Name of the remote table.
    pub table: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
    /// Singular name used in buttons and notices.
    pub noun: &'static str,
    pub fields: &'static [FieldSpec],
    /// Columns shown for each row in the list.
    pub summary: &'static [&'static str],
    pub order: Option<SortOrder>,
    /// Fixed column values added to every insert.
    pub insert_defaults: &'static [(&'static str, &'static str)],
    /// Lists are filtered by, and inserts carry, the configured house id.
    pub house_scoped: bool,
    pub toggle: Option<StatusToggle>,
    /// Boolean column that makes a saved row read-only when true.
    pub read_only_flag: Option<&'static str>,
    /// Page refreshes itself when the table changes.
    pub realtime: bool,
    pub pdf_export: bool,
    pub delete_prompt: &'static str,
    /// Static document linked from the page header, as (label, href).
    pub header_link: Option<(&'static str, &'static str)>,
}

impl ResourceConfig {
    pub fn path(&self) -> String {
        format!("/{}", self.slug)
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn created_notice(&self) -> String {
        format!("{} added", self.noun)
    }

    pub fn updated_notice(&self) -> String {
        format!("{} updated", self.noun)
    }

    pub fn deleted_notice(&self) -> String {
        format!("{} deleted", self.noun)
    }
}

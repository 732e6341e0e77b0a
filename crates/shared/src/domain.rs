use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_newtype!(DutyId);

/// A duty as stored by the server. The id is always server-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duty {
    pub id: DutyId,
    pub name: String,
}

/// Unvalidated form input for creating or renaming a duty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyDraft {
    pub name: String,
}

impl DutyDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&Duty> for DutyDraft {
    fn from(duty: &Duty) -> Self {
        Self {
            name: duty.name.clone(),
        }
    }
}

/// One server-side page of a listing.
///
/// `total_pages` is computed by the server as `ceil(total / page_size)` and trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 1-based index of the first item on this page, or 0 for an empty page.
    pub fn first_index(&self) -> u64 {
        if self.items.is_empty() {
            return 0;
        }
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size) + 1
    }

    pub fn last_index(&self) -> u64 {
        match self.first_index() {
            0 => 0,
            first => first + self.items.len() as u64 - 1,
        }
    }
}

//! Data-defined damage causes.
//!
//! A cause id (`"physical"`, `"fall"`, ...) keys into a [`CauseTable`] of
//! [`CauseFlags`] that downstream systems consult: does this cause bypass
//! resistances, wear equipment, ignore last-stand trinkets. The table is
//! external data; definitions load from a JSON document so gameplay can add
//! causes without touching the pipeline.
//!
//! An unknown cause id is recoverable: the lookup warns and answers with
//! conservative defaults (no bypass, no special handling), and processing
//! continues.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// CauseFlags
// ---------------------------------------------------------------------------

/// Behavior flags for one damage cause.
///
/// The default is the conservative profile used for unrecognized causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CauseFlags {
    /// The damage ignores the target's resistances.
    pub bypasses_resistances: bool,
    /// Applying the damage wears the target's equipment.
    pub causes_durability_loss: bool,
    /// A fatal hit cannot be prevented by last-stand effects.
    pub fatal_ignores_totems: bool,
}

// ---------------------------------------------------------------------------
// CauseTableError
// ---------------------------------------------------------------------------

/// Errors loading cause definitions.
#[derive(Debug, thiserror::Error)]
pub enum CauseTableError {
    /// The JSON document did not match the definition schema.
    #[error("invalid cause definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// CauseTable
// ---------------------------------------------------------------------------

/// Lookup table from cause id to [`CauseFlags`].
#[derive(Debug, Clone, Default)]
pub struct CauseTable {
    causes: HashMap<String, CauseFlags>,
}

impl CauseTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in causes every server ships with.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.insert("physical", CauseFlags::default());
        table.insert(
            "fall",
            CauseFlags {
                bypasses_resistances: false,
                causes_durability_loss: false,
                fatal_ignores_totems: false,
            },
        );
        table.insert(
            "fire",
            CauseFlags {
                causes_durability_loss: true,
                ..CauseFlags::default()
            },
        );
        table.insert(
            "magic",
            CauseFlags {
                bypasses_resistances: true,
                ..CauseFlags::default()
            },
        );
        table.insert(
            "void",
            CauseFlags {
                bypasses_resistances: true,
                fatal_ignores_totems: true,
                ..CauseFlags::default()
            },
        );
        table
    }

    /// Load a table from a JSON document of `{ "cause_id": { flags... } }`.
    ///
    /// Omitted flags default to false, so sparse definitions are fine.
    pub fn from_json(json: &str) -> Result<Self, CauseTableError> {
        let causes: HashMap<String, CauseFlags> = serde_json::from_str(json)?;
        Ok(Self { causes })
    }

    /// Define or replace a cause.
    pub fn insert(&mut self, cause_id: impl Into<String>, flags: CauseFlags) {
        self.causes.insert(cause_id.into(), flags);
    }

    /// Whether a cause id is defined.
    pub fn contains(&self, cause_id: &str) -> bool {
        self.causes.contains_key(cause_id)
    }

    /// Flags for a cause id.
    ///
    /// Unknown ids warn and answer with [`CauseFlags::default`]; they never
    /// fail the lookup.
    pub fn lookup(&self, cause_id: &str) -> CauseFlags {
        match self.causes.get(cause_id) {
            Some(flags) => *flags,
            None => {
                warn!(cause_id, "unknown damage cause, using conservative defaults");
                CauseFlags::default()
            }
        }
    }

    /// Number of defined causes.
    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

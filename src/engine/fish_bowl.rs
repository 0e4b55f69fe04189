//! The fish bowl: the operational whitelist of cells that fleet allocation
//! is restricted to.
//!
//! Installed once at startup and read-only afterwards. Until something is
//! installed, every cell is admitted.

use anyhow::{Context, Result, anyhow};
use h3o::{CellIndex, Resolution};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::info;

static FISH_BOWL: OnceLock<FishBowl> = OnceLock::new();

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FishBowl {
    cells: HashSet<CellIndex>,
    resolutions: Vec<Resolution>,
}

impl FishBowl {
    /// A bowl that admits every cell.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: impl IntoIterator<Item = CellIndex>) -> Self {
        let cells: HashSet<CellIndex> = cells.into_iter().collect();
        let mut resolutions: Vec<Resolution> = Vec::new();
        for cell in &cells {
            let res = cell.resolution();
            if !resolutions.contains(&res) {
                resolutions.push(res);
            }
        }
        Self { cells, resolutions }
    }

    /// Parses textual H3 ids. Any malformed id fails the whole list.
    pub fn from_ids<S: AsRef<str>>(ids: &[S]) -> Result<Self> {
        let cells = ids
            .iter()
            .map(|id| {
                let id = id.as_ref().trim();
                id.parse::<CellIndex>()
                    .map_err(|e| anyhow!("invalid fish bowl cell '{id}': {e}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_cells(cells))
    }

    /// Loads a JSON array of H3 ids from `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fish bowl '{path}'"))?;
        let ids: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("fish bowl '{path}' must be a JSON array of cell ids"))?;
        Self::from_ids(&ids)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// A cell is admitted if it, or its ancestor at any whitelisted
    /// resolution, is in the bowl.
    pub fn contains(&self, cell: CellIndex) -> bool {
        if self.is_unrestricted() || self.cells.contains(&cell) {
            return true;
        }
        self.resolutions
            .iter()
            .filter_map(|&res| cell.parent(res))
            .any(|parent| self.cells.contains(&parent))
    }
}

/// Installs the process-wide bowl. Fails if one is already in place.
pub fn install(bowl: FishBowl) -> Result<()> {
    let size = bowl.len();
    FISH_BOWL
        .set(bowl)
        .map_err(|_| anyhow!("fish bowl already initialized"))?;
    info!(cells = size, "Fish bowl installed");
    Ok(())
}

/// The process-wide bowl; unrestricted if nothing was installed.
pub fn global() -> &'static FishBowl {
    FISH_BOWL.get_or_init(FishBowl::unrestricted)
}

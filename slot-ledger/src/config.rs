// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    fs,
    path::{Path, PathBuf},
};

use core_types::{config::SlotLimits, DrawingId};

use crate::error::{Result, StoreError};

pub const DEFAULT_STATE_DIR: &str = "raffle.state";

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub state_dir: PathBuf,
    pub limits: SlotLimits,
}

impl LedgerConfig {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            limits: SlotLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SlotLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn drawings_dir(&self) -> PathBuf {
        self.state_dir.join("drawings")
    }

    pub fn book_path(&self, drawing_id: &DrawingId) -> PathBuf {
        self.drawings_dir().join(format!("{drawing_id}.json"))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let dir = self.drawings_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir, source })?;
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_STATE_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn book_paths_live_under_drawings_dir() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().join("state"));
        config.ensure_dirs().unwrap();
        assert!(config.drawings_dir().is_dir());
        assert_eq!(
            config.book_path(&DrawingId::from("abc")),
            dir.path().join("state").join("drawings").join("abc.json")
        );
    }
}

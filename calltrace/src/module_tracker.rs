//! Per-process module bookkeeping over the interval maps.
//!
//! Trace sources are noisy: the same image is reported under device-namespace
//! and drive-letter paths, unload events arrive more than once, and process
//! ids are recycled. The tracker absorbs all of that, reserving hard failures
//! for genuinely conflicting module information under the strict policy.

use std::collections::HashMap;

use log::error;

use crate::errors::{ParseError, Result};
use crate::module_space::{
    AnnotatedModuleInformation, ModuleInformation, ModuleRange, ModuleSpace,
};

fn basename(path: &str) -> &str {
    path.rsplit(|c| c == '\\' || c == '/').next().unwrap_or(path)
}

pub struct ModuleTracker {
    fail_on_module_conflict: bool,
    processes: HashMap<u32, ModuleSpace>,
}

impl ModuleTracker {
    pub fn new(fail_on_module_conflict: bool) -> Self {
        Self {
            fail_on_module_conflict,
            processes: HashMap::new(),
        }
    }

    /// Records a module load for `process_id`.
    ///
    /// Colliding inserts are reconciled in order: an entry matching on
    /// identity fields with the same path basename is the same image seen
    /// under an aliased path; dirty colliders are stale state from a
    /// recycled process id and are evicted; anything else is a real
    /// conflict, fatal only under the strict policy.
    pub fn add_module(&mut self, process_id: u32, info: &ModuleInformation) -> Result<()> {
        // Zero-size and path-less records appear in legacy traces with
        // contradictory contents; skip them outright.
        if info.module_size == 0 || info.path.is_empty() {
            return Ok(());
        }

        let space = self.processes.entry(process_id).or_default();
        let range = info.range();
        let annotated = AnnotatedModuleInformation::new(info.clone());

        let (mut collided, inserted) = space.find_or_insert(range, annotated.clone());
        if inserted {
            return Ok(());
        }

        if let Some(existing) = space.get(&collided) {
            if existing.info.base_address == info.base_address
                && existing.info.checksum == info.checksum
                && existing.info.module_size == info.module_size
                && existing.info.time_date_stamp == info.time_date_stamp
                && basename(&existing.info.path) == basename(&info.path)
            {
                return Ok(());
            }
        }

        while space.get(&collided).is_some_and(|e| e.is_dirty) {
            space.remove(&collided);
            let (key, inserted) = space.find_or_insert(range, annotated.clone());
            if inserted {
                return Ok(());
            }
            collided = key;
        }

        let (existing_path, existing_base, existing_size) = match space.get(&collided) {
            Some(existing) => (
                existing.info.path.clone(),
                existing.info.base_address,
                existing.info.module_size,
            ),
            None => (String::new(), collided.base(), collided.size()),
        };
        error!(
            "Conflicting module info for pid={}: {} (base={:#x}, size={}) and {} (base={:#x}, size={})",
            process_id,
            info.path,
            info.base_address,
            info.module_size,
            existing_path,
            existing_base,
            existing_size,
        );
        if self.fail_on_module_conflict {
            return Err(ParseError::ModuleConflict {
                process_id,
                new_path: info.path.clone(),
                new_base: info.base_address,
                new_size: info.module_size,
                existing_path,
                existing_base,
                existing_size,
            });
        }
        Ok(())
    }

    /// Records a module unload for `process_id`.
    ///
    /// The entry is marked dirty rather than removed: events within a
    /// process are not strictly time-ordered across buffer flushes, so a
    /// later function event may still legitimately reference the module.
    pub fn remove_module(&mut self, process_id: u32, info: &ModuleInformation) -> Result<()> {
        if info.module_size == 0 || info.path.is_empty() {
            return Ok(());
        }

        let space = self.processes.entry(process_id).or_default();
        let range = info.range();
        let Some((key, _)) = space.find_first_intersection(range) else {
            // Certain modules fire multiple unload events; not worth a log.
            return Ok(());
        };

        if key != range {
            error!(
                "Trying to remove module with mismatching range: {} (base={:#x}, size={})",
                info.path, info.base_address, info.module_size,
            );
            if self.fail_on_module_conflict {
                return Err(ParseError::RangeMismatch {
                    process_id,
                    path: info.path.clone(),
                    base: info.base_address,
                    size: info.module_size,
                });
            }
        }

        if let Some(entry) = space.get_mut(&key) {
            entry.is_dirty = true;
        }
        Ok(())
    }

    /// Marks every module of an ended process dirty.
    ///
    /// The module space itself is retained so late in-flight events still
    /// resolve; the dirty marks let a recycled process id overwrite it.
    pub fn remove_process(&mut self, process_id: u32) -> Result<()> {
        let Some(space) = self.processes.get_mut(&process_id) else {
            error!("Unknown process id: {}", process_id);
            return Err(ParseError::UnknownProcess { process_id });
        };
        for (_, entry) in space.iter_mut() {
            entry.is_dirty = true;
        }
        Ok(())
    }

    /// The module containing `address` in `process_id`'s space, if any.
    /// Dirty entries still resolve; they stay authoritative for late events
    /// until a conflicting insert overwrites them.
    pub fn module_at(&self, process_id: u32, address: u64) -> Option<&ModuleInformation> {
        let space = self.processes.get(&process_id)?;
        let (_, entry) = space.find_first_intersection(ModuleRange::new(address, 1))?;
        Some(&entry.info)
    }

    /// Drops a process's module space outright.
    ///
    /// The engine never calls this (ended processes are only dirtied, per
    /// [`Self::remove_process`]); it exists for callers that retire a pid
    /// for good between sessions.
    pub fn discard_process(&mut self, process_id: u32) {
        self.processes.remove(&process_id);
    }

    pub fn space(&self, process_id: u32) -> Option<&ModuleSpace> {
        self.processes.get(&process_id)
    }
}

//! Content-hashed LRU cache of linked programs with write-back to disk.
//!
//! Slots are keyed by [`ShaderState::content_hash`] and always compared against the full
//! state. A slot evicted before its program was ever persisted hands the program binary to
//! a short-lived `scache-{hash}` thread that writes it out. At construction a preload
//! thread reads the reload index and stages every valid entry; a later miss on a staged
//! hash recreates the program from its binary instead of retranslating.

pub mod disk;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use hashbrown::HashMap;
use lru::LruCache;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::assembler::ProgramAssembler;
use crate::binding::ShaderBinding;
use crate::config::ShaderCacheConfig;
use crate::host::{CompileError, HostApi, LinkError, ProgramBinary, ProgramObject};
use crate::shader_translate::TranslateError;
use crate::state::{PrimitiveAssembly, ShaderState};
use disk::{DiskEntry, Stamp};

#[derive(Debug, Error)]
pub enum ShaderCacheError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("shader cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub translations: u64,
    pub binary_loads: u64,
    pub evictions: u64,
    pub save_tasks_spawned: u64,
    /// Persisted entries discarded for a stamp mismatch, corruption or host rejection.
    pub disk_rejects: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderCacheLookupSource {
    /// The program was resident.
    Memory,
    /// The program was recreated from a persisted binary.
    Persistent,
    /// The state was translated, compiled and linked.
    Translated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderCacheLookup {
    pub source: ShaderCacheLookupSource,
    pub hash: u64,
    pub program: ProgramObject,
    pub primitive_assembly: PrimitiveAssembly,
}

/// A resident program. `persisted` is set once its binary is on disk (or was loaded
/// from there), so eviction only saves programs that are not.
#[derive(Debug)]
pub struct ShaderCacheSlot {
    pub state: ShaderState,
    pub binding: ShaderBinding,
    pub persisted: bool,
}

/// Entries staged by the preload thread, in index order.
#[derive(Default)]
struct Preloaded {
    entries: HashMap<u64, DiskEntry>,
    order: Vec<u64>,
    rejects: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ShaderCache {
    config: ShaderCacheConfig,
    stamp: Stamp,
    slots: LruCache<u64, ShaderCacheSlot>,
    assembler: ProgramAssembler,
    saves: HashMap<u64, JoinHandle<()>>,
    preloaded: Arc<Mutex<Preloaded>>,
    preload: Option<JoinHandle<()>>,
    stats: ShaderCacheStats,
}

impl ShaderCache {
    /// Creates the cache and, when a cache directory is configured, starts preloading the
    /// entries listed in its reload index.
    pub fn new(config: ShaderCacheConfig, host: &dyn HostApi) -> Self {
        let stamp = Stamp {
            version: config.version.clone(),
            vendor: host.vendor(),
        };
        let preloaded = Arc::new(Mutex::new(Preloaded::default()));
        let preload = config
            .cache_dir
            .clone()
            .and_then(|dir| spawn_preload(dir, stamp.clone(), Arc::clone(&preloaded)));
        Self {
            slots: LruCache::new(config.capacity),
            assembler: ProgramAssembler::new(config.module_capacity, config.fallback_on_error),
            config,
            stamp,
            saves: HashMap::new(),
            preloaded,
            preload,
            stats: ShaderCacheStats::default(),
        }
    }

    pub fn config(&self) -> &ShaderCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> ShaderCacheStats {
        let mut stats = self.stats;
        stats.disk_rejects += lock(&self.preloaded).rejects;
        stats
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resident content hashes, most recently used first.
    pub fn resident_hashes(&self) -> Vec<u64> {
        self.slots.iter().map(|(hash, _)| *hash).collect()
    }

    /// Hashes staged by the preload thread and not yet claimed by a lookup.
    pub fn preloaded_hashes(&self) -> Vec<u64> {
        let preloaded = lock(&self.preloaded);
        preloaded
            .order
            .iter()
            .copied()
            .filter(|hash| preloaded.entries.contains_key(hash))
            .collect()
    }

    /// Blocks until the preload thread has finished.
    pub fn wait_for_preload(&mut self) {
        if let Some(handle) = self.preload.take() {
            if handle.join().is_err() {
                error!("shader cache preload thread panicked");
            }
        }
    }

    /// Returns the program for `state`, building it on a miss. The calling thread blocks
    /// for the duration of any host compile.
    pub fn lookup(
        &mut self,
        host: &mut dyn HostApi,
        state: &ShaderState,
    ) -> Result<ShaderCacheLookup, ShaderCacheError> {
        let hash = state.content_hash();
        if let Some(slot) = self.slots.get(&hash) {
            if slot.state == *state {
                self.stats.hits += 1;
                debug!(hash = %format_args!("{hash:016x}"), "shader cache hit");
                return Ok(ShaderCacheLookup {
                    source: ShaderCacheLookupSource::Memory,
                    hash,
                    program: slot.binding.program,
                    primitive_assembly: slot.binding.primitive_assembly,
                });
            }
        }

        self.stats.misses += 1;
        if let Some(stale) = self.slots.pop(&hash) {
            warn!(hash = %format_args!("{hash:016x}"), "content hash collision; replacing resident program");
            host.delete_program(stale.binding.program);
        }
        // An earlier eviction of this hash may still be writing its file.
        self.join_save(hash);
        self.ensure_space(host);

        let (slot, source) = match self.take_preloaded(hash, state) {
            Some(entry) => match self.assembler.from_binary(host, state, &entry.binary) {
                Some(binding) => {
                    self.stats.binary_loads += 1;
                    let slot = ShaderCacheSlot {
                        state: state.clone(),
                        binding,
                        persisted: true,
                    };
                    (slot, ShaderCacheLookupSource::Persistent)
                }
                None => {
                    warn!(hash = %format_args!("{hash:016x}"), "host rejected persisted program binary; retranslating");
                    self.stats.disk_rejects += 1;
                    self.remove_persisted(hash);
                    (self.translate(host, state)?, ShaderCacheLookupSource::Translated)
                }
            },
            None => (self.translate(host, state)?, ShaderCacheLookupSource::Translated),
        };

        debug!(hash = %format_args!("{hash:016x}"), ?source, "shader cache miss");
        let lookup = ShaderCacheLookup {
            source,
            hash,
            program: slot.binding.program,
            primitive_assembly: slot.binding.primitive_assembly,
        };
        self.slots.put(hash, slot);
        Ok(lookup)
    }

    /// The resident binding for `hash`, for uniform uploads. Does not affect LRU order.
    pub fn binding_mut(&mut self, hash: u64) -> Option<&mut ShaderBinding> {
        self.slots.peek_mut(&hash).map(|slot| &mut slot.binding)
    }

    fn translate(
        &mut self,
        host: &mut dyn HostApi,
        state: &ShaderState,
    ) -> Result<ShaderCacheSlot, ShaderCacheError> {
        let binding = self.assembler.assemble(host, state)?;
        self.stats.translations += 1;
        Ok(ShaderCacheSlot {
            state: state.clone(),
            binding,
            persisted: false,
        })
    }

    fn take_preloaded(&mut self, hash: u64, state: &ShaderState) -> Option<DiskEntry> {
        let entry = lock(&self.preloaded).entries.remove(&hash)?;
        (entry.state == *state).then_some(entry)
    }

    fn remove_persisted(&self, hash: u64) {
        if let Some(dir) = &self.config.cache_dir {
            if let Err(err) = disk::remove_entry(dir, hash) {
                error!(hash = %format_args!("{hash:016x}"), %err, "failed to delete rejected cache entry");
            }
        }
    }

    fn ensure_space(&mut self, host: &mut dyn HostApi) {
        while self.slots.len() >= self.config.capacity.get() {
            let Some((hash, slot)) = self.slots.pop_lru() else {
                break;
            };
            self.evict(host, hash, slot);
        }
    }

    fn evict(&mut self, host: &mut dyn HostApi, hash: u64, slot: ShaderCacheSlot) {
        self.stats.evictions += 1;
        debug!(hash = %format_args!("{hash:016x}"), persisted = slot.persisted, "evicting shader program");
        if self.config.persistence_enabled() && !slot.persisted {
            // The binary must be read before the program is deleted.
            match host.program_binary(slot.binding.program) {
                Some(binary) => self.spawn_save(hash, slot.state, binary),
                None => debug!(hash = %format_args!("{hash:016x}"), "host provided no program binary; not persisting"),
            }
        }
        host.delete_program(slot.binding.program);
    }

    fn spawn_save(&mut self, hash: u64, state: ShaderState, binary: ProgramBinary) {
        let Some(dir) = self.config.cache_dir.clone() else {
            return;
        };
        self.join_save(hash);
        self.saves.retain(|_, handle| !handle.is_finished());

        let stamp = self.stamp.clone();
        let spawned = thread::Builder::new()
            .name(format!("scache-{hash:x}"))
            .spawn(move || {
                match disk::write_entry(&dir, hash, &stamp, &state, &binary) {
                    Ok(()) => debug!(hash = %format_args!("{hash:016x}"), "saved shader program"),
                    Err(err) => {
                        error!(hash = %format_args!("{hash:016x}"), error = %format_args!("{err:#}"), "failed to save shader program");
                        if let Err(err) = disk::remove_entry(&dir, hash) {
                            error!(hash = %format_args!("{hash:016x}"), %err, "failed to delete partial cache entry");
                        }
                    }
                }
            });
        match spawned {
            Ok(handle) => {
                self.stats.save_tasks_spawned += 1;
                self.saves.insert(hash, handle);
            }
            Err(err) => error!(%err, "failed to spawn shader save thread"),
        }
    }

    fn join_save(&mut self, hash: u64) {
        if let Some(handle) = self.saves.remove(&hash) {
            if handle.join().is_err() {
                error!(hash = %format_args!("{hash:016x}"), "shader save thread panicked");
            }
        }
    }

    fn join_saves(&mut self) {
        let hashes: Vec<u64> = self.saves.keys().copied().collect();
        for hash in hashes {
            self.join_save(hash);
        }
    }

    /// Writes the reload index (resident programs most recently used first, then staged
    /// entries nobody asked for), evicts every program so unsaved ones are persisted, and
    /// waits for all saves to land.
    pub fn flush(&mut self, host: &mut dyn HostApi) -> Result<(), ShaderCacheError> {
        self.wait_for_preload();

        let mut index = self.resident_hashes();
        for hash in self.preloaded_hashes() {
            if !index.contains(&hash) {
                index.push(hash);
            }
        }

        while let Some((hash, slot)) = self.slots.pop_lru() {
            self.evict(host, hash, slot);
        }
        self.assembler.clear(host);
        self.join_saves();

        if let Some(dir) = &self.config.cache_dir {
            if let Err(err) = disk::write_index(dir, &index) {
                error!(path = %disk::index_path(dir).display(), %err, "failed to write shader cache index");
                return Err(err.into());
            }
            debug!(entries = index.len(), "wrote shader cache index");
        }
        Ok(())
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        self.wait_for_preload();
        self.join_saves();
    }
}

fn spawn_preload(
    dir: PathBuf,
    stamp: Stamp,
    preloaded: Arc<Mutex<Preloaded>>,
) -> Option<JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name("scache-preload".to_owned())
        .spawn(move || preload(&dir, &stamp, &preloaded));
    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!(%err, "failed to spawn shader cache preload thread");
            None
        }
    }
}

/// Stages every valid entry named by the index. Invalid entries are deleted so they are
/// not retried.
fn preload(dir: &std::path::Path, stamp: &Stamp, preloaded: &Mutex<Preloaded>) {
    let hashes = match disk::read_index(dir) {
        Ok(hashes) => hashes,
        Err(err) => {
            warn!(error = %format_args!("{err:#}"), "unreadable shader cache index");
            return;
        }
    };
    let mut loaded = 0usize;
    for hash in hashes {
        if lock(preloaded).entries.contains_key(&hash) {
            continue;
        }
        match disk::load_entry(dir, hash, stamp) {
            Ok(entry) => {
                let mut preloaded = lock(preloaded);
                preloaded.entries.insert(hash, entry);
                preloaded.order.push(hash);
                loaded += 1;
            }
            Err(err) => {
                warn!(
                    hash = %format_args!("{hash:016x}"),
                    path = %disk::entry_path(dir, hash).display(),
                    reason = %format_args!("{err:#}"),
                    "rejecting persisted shader program"
                );
                lock(preloaded).rejects += 1;
                if let Err(err) = disk::remove_entry(dir, hash) {
                    error!(hash = %format_args!("{hash:016x}"), %err, "failed to delete rejected cache entry");
                }
            }
        }
    }
    debug!(loaded, "shader cache preload finished");
}

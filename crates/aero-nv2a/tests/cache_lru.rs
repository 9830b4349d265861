mod common;

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use aero_nv2a::{
    ShaderCache, ShaderCacheConfig, ShaderCacheError, ShaderCacheLookupSource, ShaderStageKind,
};
use common::{state, MockHost};
use pretty_assertions::assert_eq;

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn lookup_of_evicted_state_evicts_lru_and_saves_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = MockHost::new("Mock Vendor");
    let config = ShaderCacheConfig::default()
        .with_capacity(capacity(2))
        .with_cache_dir(dir.path());
    let mut cache = ShaderCache::new(config, &host);
    cache.wait_for_preload();

    let (a, b, c) = (state(1), state(2), state(3));
    for s in [&a, &b, &c] {
        let found = cache.lookup(&mut host, s).unwrap();
        assert_eq!(found.source, ShaderCacheLookupSource::Translated);
    }
    // Inserting C pushed A out.
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(cache.stats().save_tasks_spawned, 1);
    assert_eq!(cache.resident_hashes(), vec![c.content_hash(), b.content_hash()]);

    let found = cache.lookup(&mut host, &a).unwrap();
    assert_eq!(found.hash, a.content_hash());
    assert_eq!(found.source, ShaderCacheLookupSource::Translated);

    let stats = cache.stats();
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.save_tasks_spawned, 2);
    assert_eq!(stats.misses, 4);
    assert_eq!(stats.hits, 0);
    assert_eq!(cache.resident_hashes(), vec![a.content_hash(), c.content_hash()]);
    assert_eq!(host.live_programs(), 2);

    let b_program = host
        .deleted_programs
        .last()
        .copied()
        .expect("B was deleted");
    assert!(host.program_sources(b_program).is_none());
}

#[test]
fn hit_refreshes_recency() {
    let mut host = MockHost::new("Mock Vendor");
    let config = ShaderCacheConfig::default().with_capacity(capacity(2));
    let mut cache = ShaderCache::new(config, &host);

    let (a, b, c) = (state(1), state(2), state(3));
    let first = cache.lookup(&mut host, &a).unwrap();
    cache.lookup(&mut host, &b).unwrap();
    let again = cache.lookup(&mut host, &a).unwrap();
    assert_eq!(again.source, ShaderCacheLookupSource::Memory);
    assert_eq!(again.program, first.program);

    cache.lookup(&mut host, &c).unwrap();
    assert_eq!(cache.resident_hashes(), vec![c.content_hash(), a.content_hash()]);
    // Without a cache directory nothing is saved.
    assert_eq!(cache.stats().save_tasks_spawned, 0);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn resident_set_matches_lru_model() {
    const CAPACITY: usize = 4;
    let mut host = MockHost::new("Mock Vendor");
    let config = ShaderCacheConfig::default().with_capacity(capacity(CAPACITY));
    let mut cache = ShaderCache::new(config, &host);
    let states: Vec<_> = (1..=7).map(state).collect();

    let mut model: VecDeque<u64> = VecDeque::new();
    let mut expected_hits = 0u64;
    let mut seed = 0x2545_f491_u32;
    for _ in 0..300 {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let s = &states[seed as usize % states.len()];
        let hash = s.content_hash();

        let found = cache.lookup(&mut host, s).unwrap();
        if let Some(pos) = model.iter().position(|&h| h == hash) {
            model.remove(pos);
            expected_hits += 1;
            assert_eq!(found.source, ShaderCacheLookupSource::Memory);
        } else {
            assert_eq!(found.source, ShaderCacheLookupSource::Translated);
            if model.len() == CAPACITY {
                model.pop_back();
            }
        }
        model.push_front(hash);

        assert!(cache.len() <= CAPACITY);
        assert_eq!(cache.resident_hashes(), Vec::from(model.clone()));
    }
    assert_eq!(cache.stats().hits, expected_hits);
    assert_eq!(host.live_programs(), cache.len());
}

#[test]
fn compiled_stages_are_shared_between_programs() {
    let mut host = MockHost::new("Mock Vendor");
    let mut cache = ShaderCache::new(ShaderCacheConfig::default(), &host);
    cache.lookup(&mut host, &state(1)).unwrap();
    cache.lookup(&mut host, &state(2)).unwrap();
    // Same vertex state, different pixel state: one vertex compile, two fragment compiles.
    assert_eq!(host.compiles.len(), 3);
    assert_eq!(host.links, 2);
}

#[test]
fn compile_failure_surfaces_or_falls_back() {
    let mut host = MockHost::new("Mock Vendor");
    host.fail_compile_on = Some("fragColor = r0;".to_owned());
    let mut strict = ShaderCache::new(ShaderCacheConfig::default(), &host);
    let err = strict.lookup(&mut host, &state(0)).unwrap_err();
    assert!(err.to_string().contains("fragment shader failed to compile"), "{err}");
    match &err {
        ShaderCacheError::Compile(compile) => {
            assert_eq!(compile.stage, ShaderStageKind::Fragment);
            assert!(compile.glsl.contains("fragColor = r0;"), "{}", compile.glsl);
            assert!(compile.log.contains("rejected"), "{}", compile.log);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(strict.is_empty());

    let config = ShaderCacheConfig::default().with_fallback_on_error(true);
    let mut lenient = ShaderCache::new(config, &host);
    let found = lenient.lookup(&mut host, &state(0)).unwrap();
    let sources = host.program_sources(found.program).unwrap();
    assert!(sources[1].contains("fragColor = vec4(1.0, 0.0, 1.0, 1.0);"), "{sources:?}");
}

#[test]
fn vertex_constants_upload_only_changes() {
    let mut host = MockHost::new("Mock Vendor");
    let mut cache = ShaderCache::new(ShaderCacheConfig::default(), &host);
    let found = cache.lookup(&mut host, &state(1)).unwrap();
    let binding = cache.binding_mut(found.hash).unwrap();

    let mut constants = [[0.0f32; 4]; 192];
    assert_eq!(binding.upload_vertex_constants(&mut host, &constants, false), 192);
    assert_eq!(binding.upload_vertex_constants(&mut host, &constants, false), 0);

    constants[7] = [1.0, 2.0, 3.0, 4.0];
    constants[8][3] = -0.0;
    assert_eq!(binding.upload_vertex_constants(&mut host, &constants, false), 2);
    assert_eq!(host.uploads.last().unwrap().1, [0.0, 0.0, 0.0, -0.0]);

    binding.invalidate_vertex_constants();
    assert_eq!(binding.upload_vertex_constants(&mut host, &constants, false), 192);
}

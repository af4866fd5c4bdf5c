use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;
use tiercache::{CacheManager, CacheSettings, CacheType};

// ============================================================================
// Benchmark 1: Namespaced Routing
// ============================================================================

fn benchmark_manager_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_routing");
    group.sample_size(100);

    let temp_dir = TempDir::new().expect("temp dir");
    let manager = CacheManager::new(CacheSettings {
        file_cache_dir: temp_dir.path().to_path_buf(),
        ..CacheSettings::default()
    })
    .expect("cache manager");

    for cache_type in [CacheType::Memory, CacheType::Analysis, CacheType::Session] {
        manager.set("warm", &42u32, cache_type, None);
        group.bench_function(format!("get_{}", cache_type), |b| {
            b.iter(|| {
                let _ = manager.get::<u32>(black_box("warm"), cache_type);
            });
        });
    }

    group.bench_function("get_unrouted", |b| {
        b.iter(|| {
            let _ = manager.get::<u32>(black_box("warm"), CacheType::User);
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark 2: Stats Collection
// ============================================================================

fn benchmark_manager_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_stats");
    group.sample_size(30);

    let temp_dir = TempDir::new().expect("temp dir");
    let manager = CacheManager::new(CacheSettings {
        file_cache_dir: temp_dir.path().to_path_buf(),
        ..CacheSettings::default()
    })
    .expect("cache manager");
    for i in 0..50 {
        manager.set(&format!("key_{}", i), &i, CacheType::File, None);
        manager.set(&format!("key_{}", i), &i, CacheType::Memory, None);
    }

    group.bench_function("get_stats", |b| {
        b.iter(|| black_box(manager.get_stats()));
    });

    group.finish();
}

criterion_group!(benches, benchmark_manager_routing, benchmark_manager_stats);

criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion, black_box};

use terrastream::geometry::{BufferConfig, GeometryAllocator};

fn bench_alloc_free_churn(c: &mut Criterion) {
    let mut allocator = GeometryAllocator::new(BufferConfig::default());

    c.bench_function("alloc_free_churn", |b| {
        b.iter(|| {
            let a = allocator.alloc(black_box(600), black_box(3000), None).unwrap();
            let b2 = allocator.alloc(600, 3000, None).unwrap();
            allocator.free(&a).unwrap();
            let c2 = allocator.alloc(600, 3000, None).unwrap();
            allocator.free(&b2).unwrap();
            allocator.free(&c2).unwrap();
        });
    });
}

fn bench_draw_group_recompute_fragmented(c: &mut Criterion) {
    let mut allocator = GeometryAllocator::new(BufferConfig::default());

    // fragment the index space: free every other binding
    let bindings: Vec<_> = (0..256)
        .map(|_| allocator.alloc(60, 300, None).unwrap())
        .collect();
    for binding in bindings.iter().step_by(2) {
        allocator.free(binding).unwrap();
    }

    c.bench_function("draw_group_recompute_fragmented", |b| {
        b.iter(|| {
            allocator.recompute_draw_groups();
            black_box(allocator.draw_groups().len());
        });
    });
}

fn bench_index_remap_write(c: &mut Criterion) {
    let mut allocator = GeometryAllocator::new(BufferConfig::default());
    let binding = allocator.alloc(30_000, 90_000, None).unwrap();
    let indices: Vec<u32> = (0..90_000u32).map(|i| i % 30_000).collect();

    c.bench_function("index_remap_write_90k", |b| {
        b.iter(|| {
            allocator
                .write_indices(black_box(&binding), black_box(&indices))
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_alloc_free_churn,
    bench_draw_group_recompute_fragmented,
    bench_index_remap_write,
);
criterion_main!(benches);

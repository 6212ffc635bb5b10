use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pq_core::{CreateOptions, Direction, Product, Queue};
use tempfile::tempdir;

fn make_product(seqno: u32, size: usize) -> Product {
    let mut signature = [0u8; 16];
    signature[12..16].copy_from_slice(&seqno.to_be_bytes());
    Product {
        origin: "bench".into(),
        feedtype: 1,
        seqno,
        arrival: (i64::from(seqno), 0),
        ident: format!("bench-{seqno}"),
        signature,
        data: vec![0xAB; size],
    }
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &size in &[64usize, 1024, 16384] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let dir = tempdir().unwrap();
            let path = dir.path().join("pq.dat");
            let mut queue = Queue::create(&path, CreateOptions::new(0o600, 8, 64 * 1024 * 1024, 4096)).unwrap();
            let mut seqno = 0u32;
            b.iter(|| {
                let product = make_product(seqno, size);
                seqno = seqno.wrapping_add(1);
                black_box(queue.insert(&product).ok());
            });
        });
    }
    group.finish();
}

fn bench_sequence(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pq.dat");
    let mut queue = Queue::create(&path, CreateOptions::new(0o600, 8, 64 * 1024 * 1024, 4096)).unwrap();
    for seqno in 0..2000u32 {
        let _ = queue.insert(&make_product(seqno, 256));
    }

    c.bench_function("sequence_forward_full_scan", |b| {
        b.iter(|| {
            loop {
                let result = queue.sequence(Direction::Gt, None, |_, data| {
                    black_box(data.len());
                    Ok(())
                });
                if result.is_err() {
                    break;
                }
            }
            queue.set_cursor(0);
        });
    });
}

criterion_group!(benches, bench_insert, bench_sequence);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use dura::archive::Archive;
use dura::backup::{backup, BackupOptions};
use std::path::PathBuf;
use tempfile::TempDir;

fn bench_ingest(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    std::fs::create_dir(&src_dir).unwrap();
    let sources: Vec<PathBuf> = (0..64)
        .map(|i| {
            let path = src_dir.join(format!("f{i:02}"));
            std::fs::write(&path, vec![i as u8; 4096]).unwrap();
            path
        })
        .collect();
    let archive = Archive::create(&tmp.path().join("archive")).unwrap();

    c.bench_function("backup_64x4k", |b| {
        b.iter(|| backup(&archive, &sources, &BackupOptions::default()).unwrap())
    });
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);

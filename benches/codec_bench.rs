#![allow(clippy::unwrap_used)]

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use b2f::codec::{lzhuf, Codec};

fn message_like(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(b"Mid: TJKYEIMMHSRB\r\nSubject: Position report\r\n\r\n");
        data.extend_from_slice(b"R: 2024/01/04 10:00 @ LA5NTA 59.1N 10.5E ");
        data.push((data.len() % 256) as u8);
    }
    data.truncate(size);
    data
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let sizes = [512usize, 4096, 65536, 512 * 1024];

    for &size in &sizes {
        let data = message_like(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("lzhuf_compress_{size}b"), |b| {
            b.iter(|| lzhuf::compress(&data).unwrap())
        });
        group.bench_function(format!("lzhuf_decompress_{size}b"), |b| {
            let compressed = lzhuf::compress(&data).unwrap();
            b.iter(|| {
                let out = lzhuf::decompress(&compressed).unwrap();
                assert_eq!(out.len(), data.len());
            })
        });

        group.bench_function(format!("gzip_compress_{size}b"), |b| {
            b.iter(|| Codec::Gzip.compress(&data).unwrap())
        });
        group.bench_function(format!("gzip_decompress_{size}b"), |b| {
            let compressed = Codec::Gzip.compress(&data).unwrap();
            b.iter(|| {
                let out = Codec::Gzip.decompress(&compressed).unwrap();
                assert_eq!(out.len(), data.len());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);

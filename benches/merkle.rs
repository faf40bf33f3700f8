#![cfg(feature = "nightly")]
#![feature(test)]
extern crate test;

use test::{black_box, Bencher};

use pmerkle::{CancelToken, HashKind, StringData, TreeBuilder, TreeHasher};

fn items(n: usize) -> Vec<StringData> {
    (0..n).map(|i| StringData::new(format!("value{}", i))).collect()
}

fn builder(reuse: bool) -> TreeBuilder {
    TreeBuilder::new()
        .with_hasher(TreeHasher::new(HashKind::Sha256, true, reuse))
        .with_max_concurrency(1000)
}

#[bench]
fn bench_build_1k(b: &mut Bencher) {
    let data = items(1_000);
    let builder = builder(true);
    let ctx = CancelToken::new();
    b.iter(|| black_box(builder.build(&ctx, &data).unwrap().root_digest().copied()))
}

#[bench]
fn bench_build_1k_no_reuse(b: &mut Bencher) {
    let data = items(1_000);
    let builder = builder(false);
    let ctx = CancelToken::new();
    b.iter(|| black_box(builder.build(&ctx, &data).unwrap().root_digest().copied()))
}

#[bench]
fn bench_build_100k(b: &mut Bencher) {
    let data = items(100_000);
    let builder = builder(true);
    let ctx = CancelToken::new();
    b.iter(|| black_box(builder.build(&ctx, &data).unwrap().root_digest().copied()))
}

#[bench]
fn bench_verify_100k(b: &mut Bencher) {
    let data = items(100_000);
    let ctx = CancelToken::new();
    let tree = builder(true).build(&ctx, &data).unwrap();
    let needle = StringData::new("value99999");
    b.iter(|| black_box(tree.verify(&ctx, &needle).unwrap()))
}

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use dl_core::classify::is_animated_gif;
use dl_core::scope::Site;
use dl_core::settings::{Filter, SiteSettings};
use dl_core::store::SiteTable;

fn bench_resolve(c: &mut Criterion) {
    let mut table = SiteTable::new();
    for i in 0..200 {
        table.set(
            Site::parse_key(&format!("site{i}.example")),
            SiteSettings::new(Filter::Normal),
        );
    }
    table.set(
        Site::parse_key("sub.example.com/docs"),
        SiteSettings::new(Filter::Dim1),
    );

    c.bench_function("resolve_url", |b| {
        b.iter(|| table.resolve(black_box("https://sub.example.com/docs/page")))
    });
}

fn bench_animated_scan(c: &mut Criterion) {
    // A static image: one frame signature at the end of 256 KiB of data.
    let mut buffer = vec![0u8; 256 * 1024];
    buffer.extend_from_slice(&[0x00, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C]);

    c.bench_function("animated_scan_static", |b| {
        b.iter(|| is_animated_gif(black_box(&buffer)))
    });
}

criterion_group!(benches, bench_resolve, bench_animated_scan);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use prawdec_rs::dng_pipeline::decode::DecodedFrame;
use prawdec_rs::dng_pipeline::{FrameMetadata, SampleLayout, StandardDngWriter};
use std::io::Cursor;

fn generate_mock_frame(width: u32, height: u32, bits: u16) -> DecodedFrame {
    let max = (1u32 << bits) - 1;
    let pixels = (0..width * height)
        .map(|i| ((i * 37) % (max + 1)) as u16)
        .collect();
    DecodedFrame {
        metadata: FrameMetadata::new(width, height, bits),
        pixels,
    }
}

fn benchmark_frame_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("dng_by_size");

    let sizes = vec![
        (640, 360, "640x360"),
        (1920, 1080, "1920x1080"),
        (4096, 2160, "4096x2160"),
    ];

    for (width, height, label) in sizes {
        let frame = generate_mock_frame(width, height, 12);

        group.bench_with_input(BenchmarkId::from_parameter(label), &frame, |b, frame| {
            let writer = StandardDngWriter::new();

            b.iter(|| {
                let mut output = Cursor::new(Vec::new());
                let _ = writer.encode(black_box(frame), &mut output);
            });
        });
    }

    group.finish();
}

fn benchmark_sample_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_layouts");
    let frame = generate_mock_frame(1920, 1080, 12);

    let layouts = vec![
        (SampleLayout::Packed, "packed"),
        (SampleLayout::Widened16, "widened16"),
    ];

    for (layout, label) in layouts {
        group.bench_with_input(BenchmarkId::from_parameter(label), &frame, |b, frame| {
            let writer = StandardDngWriter::new().with_layout(layout);

            b.iter(|| {
                let mut output = Cursor::new(Vec::new());
                let _ = writer.encode(black_box(frame), &mut output);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_frame_sizes, benchmark_sample_layouts);
criterion_main!(benches);

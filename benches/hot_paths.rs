//! Benchmarks for per-frame work: tile resolution and map rendering

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use damage_map::annotate::SelectionTool;
use damage_map::geo::{GeoBounds, ViewportBounds};
use damage_map::map::features::DamagedBuilding;
use damage_map::map::{FeatureRendering, MapRenderer, RenderState, Viewport};
use damage_map::tiles::{resolve, TileIndex, TileRecord};

const TILE_DEG: f64 = 0.005;

/// `n` x `n` tiles south-east of (31.45, 34.40)
fn tile_grid(n: i32) -> Vec<TileRecord> {
    let mut records = Vec::with_capacity((n * n) as usize);
    for row in 0..n {
        for col in 0..n {
            let lat_max = 31.55 - row as f64 * TILE_DEG;
            let lon_min = 34.40 + col as f64 * TILE_DEG;
            records.push(TileRecord::new(
                row,
                col,
                GeoBounds::new(lat_max - TILE_DEG, lat_max, lon_min, lon_min + TILE_DEG),
            ));
        }
    }
    records
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiles/resolve");
    let view = ViewportBounds::new(31.52, 31.49, 34.48, 34.44);
    for n in [10, 40, 100] {
        let records = tile_grid(n);
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &records, |b, records| {
            b.iter(|| resolve(black_box(&view), black_box(records)))
        });
    }
    group.finish();
}

fn bench_parse_index(c: &mut Criterion) {
    let mut text = String::from("row,col,lat_min,lat_max,lon_min,lon_max\n");
    for r in tile_grid(40) {
        let b = r.bounds;
        text.push_str(&format!("{},{},{},{},{},{}\n", r.row, r.col, b.lat_min, b.lat_max, b.lon_min, b.lon_max));
    }
    c.bench_function("tiles/parse_index_1600", |b| b.iter(|| TileIndex::parse(black_box(&text))));
}

fn bench_render(c: &mut Criterion) {
    let mut renderer = MapRenderer::new();
    for i in 0..20_000 {
        let t = i as f64;
        renderer.buildings.push(DamagedBuilding {
            id: i.to_string(),
            lon: 34.40 + (t * 0.618_034).fract() * 0.2,
            lat: 31.45 + (t * 0.414_214).fract() * 0.1,
        });
    }
    let tool = SelectionTool::new();

    let mut group = c.benchmark_group("render");
    for (name, zoom, rendering) in [
        ("heat_z13", 13.0, FeatureRendering::Heat),
        ("markers_z17", 17.0, FeatureRendering::Markers),
    ] {
        let viewport = Viewport::new(34.47, 31.5, zoom, 320, 200);
        group.bench_function(name, |b| {
            b.iter(|| {
                renderer.render(
                    160,
                    50,
                    black_box(&viewport),
                    RenderState {
                        rendering,
                        overlays: std::iter::empty(),
                        tool: &tool,
                    },
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_parse_index, bench_render);
criterion_main!(benches);

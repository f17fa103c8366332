//! GRIB2 reading and a full run over synthetic GRIB2 files.

use ingestion::{GribReader, GridReader, Pipeline, PipelineConfig};
use test_utils::icon_d2::{ISSUANCE, REGULAR_VARIANT};
use test_utils::{
    assert_approx_eq, bzip2_compress, create_precipitation_grid, directory_listing_html,
    icon_d2_file_name, FixtureServer, Grib2Builder,
};
use wgf4::Wgf4File;

const COLS: usize = 6;
const ROWS: usize = 4;

/// Four quarter-hour steps approaching the cumulative total of `hour`.
fn hourly_steps(hour: u32) -> Vec<Vec<f32>> {
    let start = create_precipitation_grid(COLS, ROWS, hour - 1);
    let end = create_precipitation_grid(COLS, ROWS, hour);
    (1..=4)
        .map(|q| {
            start
                .iter()
                .zip(&end)
                .map(|(a, b)| a + (b - a) * q as f32 / 4.0)
                .collect()
        })
        .collect()
}

#[test]
fn test_reads_stacked_steps_and_axes() {
    let builder = Grib2Builder::new_precipitation();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.grib2");
    std::fs::write(&path, builder.build_steps(&hourly_steps(2))).unwrap();

    let grid = GribReader.read(&path).unwrap();

    assert_eq!(grid.field.dims, vec![4, ROWS, COLS]);
    assert_eq!(grid.field.values.len(), 4 * ROWS * COLS);
    assert_eq!(grid.latitudes.len(), ROWS);
    assert_eq!(grid.longitudes.len(), COLS);
    for (j, lat) in grid.latitudes.iter().enumerate() {
        assert_approx_eq!(*lat, builder.latitude(j as u32), 1e-5);
    }
    for (i, lon) in grid.longitudes.iter().enumerate() {
        assert_approx_eq!(*lon, builder.longitude(i as u32), 1e-5);
    }

    let last_step = &grid.field.values[3 * ROWS * COLS..];
    for (got, want) in last_step.iter().zip(create_precipitation_grid(COLS, ROWS, 2)) {
        assert_approx_eq!(*got, want, 1e-2);
    }
}

#[test]
fn test_reads_single_message_as_two_dimensional() {
    let values = create_precipitation_grid(COLS, ROWS, 48);
    let bytes = Grib2Builder::new_precipitation().with_data(values).build();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.grib2");
    std::fs::write(&path, bytes).unwrap();

    let grid = GribReader.read(&path).unwrap();
    assert_eq!(grid.field.dims, vec![ROWS, COLS]);
}

#[test]
fn test_reads_custom_grid_and_origin() {
    let builder = Grib2Builder::new_precipitation()
        .with_reference_time(2024, 3, 1, 6)
        .with_grid(5, 3)
        .with_origin(43_180_000, 10_500_000);
    let bytes = builder.clone().with_data(create_precipitation_grid(5, 3, 1)).build();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.grib2");
    std::fs::write(&path, bytes).unwrap();

    let grid = GribReader.read(&path).unwrap();

    assert_eq!(grid.field.dims, vec![3, 5]);
    assert_approx_eq!(grid.latitudes[0], 43.18, 1e-5);
    assert_approx_eq!(grid.longitudes[0], 10.5, 1e-5);
    assert_approx_eq!(grid.longitudes[4], builder.longitude(4), 1e-5);
}

#[test]
fn test_empty_file_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.grib2");
    std::fs::write(&path, b"").unwrap();

    assert!(GribReader.read(&path).is_err());
}

#[tokio::test]
async fn test_run_over_grib2_files() {
    let builder = Grib2Builder::new_precipitation();
    let names: Vec<String> = (1..=3)
        .map(|h| format!("{}.bz2", icon_d2_file_name(REGULAR_VARIANT, ISSUANCE, h)))
        .collect();

    let mut server = FixtureServer::builder().route(
        "/tot_prec",
        directory_listing_html(&names.iter().map(String::as_str).collect::<Vec<_>>()),
    );
    for (hour, name) in (1..=3).zip(&names) {
        let grib = builder.build_steps(&hourly_steps(hour));
        server = server.route(&format!("/tot_prec/{}", name), bzip2_compress(&grib));
    }
    let server = server.start().await;

    let output = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::new(server.url("/tot_prec"));
    config.output_root = output.path().to_path_buf();

    let report = Pipeline::new(&config, GribReader).unwrap().run().await.unwrap();
    assert!(report.is_success(), "{:?}", report.summary());
    assert_eq!(report.converted, 3);

    // Each hour's increment equals one hour of the generator's hourly rate
    let hourly = create_precipitation_grid(COLS, ROWS, 1);
    for path in &report.outputs {
        let file = Wgf4File::read(path).unwrap();
        assert_eq!(file.values.len(), ROWS * COLS);
        for (got, want) in file.values.iter().zip(&hourly) {
            assert_approx_eq!(*got, *want, 2e-2);
        }

        // Grid points arrive as f32, so allow a few microdegrees
        assert_approx_eq!(file.header.latitude_min, 47_000_000, 5);
        assert_approx_eq!(file.header.latitude_max, 47_060_000, 5);
        assert_approx_eq!(file.header.longitude_min, 6_000_000, 5);
        assert_approx_eq!(file.header.longitude_max, 6_100_000, 5);
        assert_approx_eq!(file.header.latitude_step, 15_000, 2);
        assert_approx_eq!(file.header.longitude_step, 16_667, 2);
        assert_eq!(file.header.multiplier, 1_000_000);
    }
}

//! Common test fixtures: provider file names, listing pages and compressed payloads.

use std::io::Write;

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;

/// Common ICON-D2 naming values for testing.
pub mod icon_d2 {
    /// Issuance used across tests (2024-03-01T00Z).
    pub const ISSUANCE: &str = "2024030100";

    /// Projection variant selected by the pipeline.
    pub const REGULAR_VARIANT: &str = "regular-lat-lon";

    /// Projection variant the pipeline must ignore.
    pub const ICOSAHEDRAL_VARIANT: &str = "icosahedral";

    /// Offset whose file carries a single field instead of a stack.
    pub const SINGLE_FIELD_OFFSET: u32 = 48;
}

/// Builds an ICON-D2 total-precipitation file name (without compression suffix).
///
/// ```
/// use test_utils::icon_d2_file_name;
///
/// assert_eq!(
///     icon_d2_file_name("regular-lat-lon", "2024030100", 5),
///     "icon-d2_germany_regular-lat-lon_single-level_2024030100_005_2d_tot_prec.grib2"
/// );
/// ```
pub fn icon_d2_file_name(variant: &str, issuance: &str, offset: u32) -> String {
    format!(
        "icon-d2_germany_{}_single-level_{}_{:03}_2d_tot_prec.grib2",
        variant, issuance, offset
    )
}

/// Renders an Apache-style directory index containing the given hrefs.
pub fn directory_listing_html(hrefs: &[&str]) -> String {
    let mut html = String::from(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
         <html>\n<head><title>Index of /weather/nwp/icon-d2/grib/00/tot_prec</title></head>\n\
         <body>\n<h1>Index of /weather/nwp/icon-d2/grib/00/tot_prec</h1><pre>\n\
         <a href=\"../\">../</a>\n",
    );
    for href in hrefs {
        html.push_str(&format!(
            "<a href=\"{href}\">{href}</a>                01-Mar-2024 02:14     1176413\n"
        ));
    }
    html.push_str("</pre><hr></body>\n</html>\n");
    html
}

/// Compresses bytes with bzip2, as the provider publishes them.
pub fn bzip2_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::best());
    encoder.write_all(data).expect("in-memory bzip2 write");
    encoder.finish().expect("in-memory bzip2 finish")
}

/// Compresses bytes with gzip.
pub fn gzip_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("in-memory gzip write");
    encoder.finish().expect("in-memory gzip finish")
}

/// Deterministic pseudo-random payload, large enough to span many chunks.
pub fn patterned_payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 251) as u8
        })
        .collect()
}

//! Finds the closest station to Mariehamn, downloads its archive and prints
//! how the year splits over the UTCI stress categories.
//!
//! Pass a station document file (JSON array, optionally gzipped) as the first
//! argument.

use epw_comfort::{CategoryKind, ComfortConfig, DocumentSource, EpwComfort, LatLon};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    configure_polars_display();
    let documents = env::args()
        .nth(1)
        .unwrap_or_else(|| "data/stations.json.gz".to_string());

    let client =
        EpwComfort::from_documents(DocumentSource::Path(documents.into()), ComfortConfig::default())
            .await?;

    let analysis = client
        .analyze_location()
        .location(LatLon(60.0970, 19.9348))
        .radius_km(100.0)
        .call()
        .await?;

    println!(
        "{} ({}), {} hourly records",
        analysis.station.name,
        analysis.station.id,
        analysis.series.len()
    );
    println!("{}", analysis.report.to_dataframe()?);
    for line in analysis.report.describe_shares(CategoryKind::Stress) {
        println!("{}", line);
    }

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    env::set_var("POLARS_FMT_MAX_ROWS", "12");
}

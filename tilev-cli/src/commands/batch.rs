use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tilev::geojson::add_elevations_to_geojson;
use tilev::{ElevationResolver, LatLng};

/// Points resolved per batch. Each chunk is grouped by tile and fetched
/// concurrently.
const CHUNK_SIZE: usize = 1000;

pub async fn run(
    resolver: &ElevationResolver,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: String,
    lon_col: String,
) -> Result<()> {
    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => process_csv(resolver, &input, output, &lat_col, &lon_col).await,
        "geojson" | "json" => process_geojson(resolver, &input, output).await,
        _ => bail!(
            "Unsupported file format: {}. Use .csv or .geojson",
            extension
        ),
    }
}

fn output_path(input: &Path, output: Option<PathBuf>, extension: &str) -> PathBuf {
    output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        input.with_file_name(format!("{}_elevation.{}", stem, extension))
    })
}

fn parse_coordinate(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64> {
    record
        .get(idx)
        .with_context(|| format!("Missing {}", name))?
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}", name))
}

async fn process_csv(
    resolver: &ElevationResolver,
    input: &Path,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == lon_col)
        .with_context(|| format!("Column '{}' not found in CSV", lon_col))?;

    let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    let points = records
        .iter()
        .map(|record| {
            Ok(LatLng::new(
                parse_coordinate(record, lat_idx, "latitude")?,
                parse_coordinate(record, lon_idx, "longitude")?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    // Unresolvable points come back as NaN and are written as "void"
    let mut elevations = Vec::with_capacity(points.len());
    for chunk in points.chunks(CHUNK_SIZE) {
        elevations.extend(resolver.get_elevations_or(chunk, f32::NAN).await);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("done");

    let output_path = output_path(input, output, "csv");
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("elevation");
    writer.write_record(&new_headers)?;

    let mut void_count = 0usize;
    for (record, elevation) in records.iter().zip(&elevations) {
        let elevation = if elevation.is_nan() {
            void_count += 1;
            "void".to_string()
        } else {
            format!("{:.1}", elevation)
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&elevation);
        writer.write_record(&new_record)?;
    }
    writer.flush()?;

    if void_count > 0 {
        eprintln!("{} of {} points could not be resolved", void_count, records.len());
    }
    println!("Output written to: {}", output_path.display());
    Ok(())
}

async fn process_geojson(
    resolver: &ElevationResolver,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let reader = BufReader::new(file);

    let geojson: geojson::GeoJson =
        serde_json::from_reader(reader).context("Failed to parse GeoJSON")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message("Resolving elevations...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = add_elevations_to_geojson(resolver, geojson)
        .await
        .context("Failed to add elevations")?;
    spinner.finish_and_clear();

    let output_path = output_path(input, output, "geojson");
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);
    serde_json::to_writer_pretty(&mut writer, &result)?;
    writer.flush()?;

    println!("Output written to: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let path = output_path(Path::new("/data/track.csv"), None, "csv");
        assert_eq!(path, PathBuf::from("/data/track_elevation.csv"));
    }

    #[test]
    fn test_explicit_output_path() {
        let path = output_path(
            Path::new("/data/track.geojson"),
            Some(PathBuf::from("/tmp/out.geojson")),
            "geojson",
        );
        assert_eq!(path, PathBuf::from("/tmp/out.geojson"));
    }

    #[test]
    fn test_parse_coordinate() {
        let record = csv::StringRecord::from(vec!["a", " 35.5 ", "x"]);
        assert_eq!(parse_coordinate(&record, 1, "latitude").unwrap(), 35.5);
        assert!(parse_coordinate(&record, 2, "latitude").is_err());
        assert!(parse_coordinate(&record, 5, "latitude").is_err());
    }
}

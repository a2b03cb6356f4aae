use anyhow::{Context, Result};
use serde::Serialize;
use tilev::ElevationResolver;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lon: f64,
    elevation: f32,
    zoom: u8,
}

pub async fn run(resolver: &ElevationResolver, lat: f64, lon: f64, json: bool) -> Result<()> {
    let elevation = resolver
        .get_elevation(lat, lon)
        .await
        .context("Failed to get elevation")?;

    if json {
        let response = ElevationResponse {
            lat,
            lon,
            elevation,
            zoom: resolver.zoom(),
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{:.1}", elevation);
    }

    Ok(())
}

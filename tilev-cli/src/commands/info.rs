use anyhow::{Context, Result};
use tilev::ElevationResolver;

pub async fn run(resolver: &ElevationResolver, lat: f64, lon: f64) -> Result<()> {
    let addr = resolver
        .address(lat, lon)
        .context("Failed to locate tile")?;
    let url = resolver.tile_url(addr.tile);

    println!("Tile Information");
    println!("================");
    println!("Coordinate:  {:.6}, {:.6}", lat, lon);
    println!("Projection:  {}", resolver.projection_name());
    println!("Zoom:        {}", resolver.zoom());
    println!("Tile:        {}", addr.tile);
    println!(
        "Pixel:       {:.2}, {:.2} (of {})",
        addr.local_x,
        addr.local_y,
        resolver.tile_size()
    );
    println!("URL:         {}", url);

    let tile = resolver
        .tile(addr.tile)
        .await
        .with_context(|| format!("Failed to fetch tile {}", url))?;

    println!();
    println!("Elevation Statistics");
    println!("--------------------");
    println!(
        "At point:    {:.1}m",
        tile.sample(addr.local_x, addr.local_y)
    );
    match tile.min_max() {
        Some((min, max)) => {
            println!("Min:         {:.1}m", min);
            println!("Max:         {:.1}m", max);
            println!("Range:       {:.1}m", max - min);
        }
        None => println!("No elevation data"),
    }

    Ok(())
}

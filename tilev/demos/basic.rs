//! Basic example demonstrating tilev library usage.
//!
//! Run with: cargo run --example basic --features http -- <url-template> [terrain-rgb|terrarium]
//!
//! For example, with the public Terrarium tiles:
//!
//! ```text
//! cargo run --example basic --features http -- \
//!     "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png" terrarium
//! ```

use std::env;

use tilev::{ElevationError, ElevationResolverBuilder, Encoding, LatLng};

#[tokio::main]
async fn main() -> Result<(), ElevationError> {
    let mut args = env::args().skip(1);
    let template = args.next().unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic --features http -- <url-template> [encoding]");
        std::process::exit(1);
    });
    let encoding: Encoding = match args.next() {
        Some(name) => name.parse().unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        }),
        None => Encoding::default(),
    };

    let resolver = ElevationResolverBuilder::new(template)
        .encoding(encoding)
        .zoom(12)
        .cache_size(10)
        .build()?;

    // Query some famous peaks in a single batch
    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Denali, Alaska", 63.0695, -151.0074),
    ];
    let points: Vec<LatLng> = locations
        .iter()
        .map(|(_, lat, lon)| LatLng::new(*lat, *lon))
        .collect();

    println!("Elevation queries (nearest-neighbor, zoom {}):", resolver.zoom());
    println!("{:-<50}", "");

    match resolver.get_elevations(&points).await {
        Ok(elevations) => {
            for ((name, _, _), elevation) in locations.iter().zip(elevations) {
                println!("{}: {:.1}m", name, elevation);
            }
        }
        Err(e) => println!("batch failed: {}", e),
    }

    // Show cache statistics
    let stats = resolver.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Fetches: {}", stats.fetch_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}

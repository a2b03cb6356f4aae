use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tilev::{ElevationResolver, ElevationResolverBuilder, Encoding, FileTransport};

mod commands;

/// Template used with --data-dir when none is given.
const DEFAULT_FILE_TEMPLATE: &str = "{z}/{x}/{y}.png";

/// Terrain elevation from map tiles
#[derive(Parser)]
#[command(name = "tilev")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    resolver: ResolverArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
pub struct ResolverArgs {
    /// Tile URL template with {x}, {y} and {z} placeholders
    #[arg(short, long, env = "TILEV_URL_TEMPLATE", global = true)]
    url_template: Option<String>,

    /// Read tiles from this directory instead of over HTTP
    #[arg(short, long, env = "TILEV_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Zoom level of the tile set
    #[arg(short, long, env = "TILEV_ZOOM", default_value = "12", global = true)]
    zoom: u8,

    /// Tile edge length in pixels
    #[arg(long, env = "TILEV_TILE_SIZE", default_value = "256", global = true)]
    tile_size: u32,

    /// Maximum tiles in cache
    #[arg(
        short,
        long,
        env = "TILEV_CACHE_SIZE",
        default_value = "100",
        global = true
    )]
    cache_size: usize,

    /// Pixel encoding: terrain-rgb or terrarium
    #[arg(
        short,
        long,
        env = "TILEV_ENCODING",
        default_value = "terrain-rgb",
        global = true
    )]
    encoding: Encoding,
}

impl ResolverArgs {
    /// Build a resolver from the command-line options.
    pub fn build(&self) -> Result<ElevationResolver> {
        let template = match (&self.url_template, &self.data_dir) {
            (Some(template), _) => template.clone(),
            (None, Some(_)) => DEFAULT_FILE_TEMPLATE.to_string(),
            (None, None) => anyhow::bail!(
                "No tile source. Use --url-template (or TILEV_URL_TEMPLATE), or --data-dir for local tiles"
            ),
        };

        let mut builder = ElevationResolverBuilder::new(template)
            .zoom(self.zoom)
            .tile_size(self.tile_size)
            .cache_size(self.cache_size)
            .encoding(self.encoding);

        if let Some(dir) = &self.data_dir {
            builder = builder.transport(Arc::new(FileTransport::new(dir)));
        }

        builder.build().context("Failed to create elevation resolver")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation for a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Process elevation for multiple coordinates from a file
    Batch {
        /// Input file (CSV or GeoJSON)
        input: PathBuf,

        /// Output file (same format as input if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude (CSV only)
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude (CSV only)
        #[arg(long, default_value = "lon")]
        lon_col: String,
    },

    /// Display the tile covering a coordinate
    Info {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let resolver = cli.resolver.build()?;

    match cli.command {
        Commands::Query { lat, lon, json } => commands::query::run(&resolver, lat, lon, json).await,
        Commands::Batch {
            input,
            output,
            lat_col,
            lon_col,
        } => commands::batch::run(&resolver, input, output, lat_col, lon_col).await,
        Commands::Info { lat, lon } => commands::info::run(&resolver, lat, lon).await,
    }
}

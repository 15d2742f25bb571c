use clap::Parser;
use collagist::blueprint::Blueprint;
use collagist::decode::{decode_oriented, PageOrientation};
use collagist::tree::Dimensions;
use collagist::{compose, optimizer};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "collagist")]
#[command(about = "Arrange photos into a single collage image")]
#[command(long_about = "\
Arrange photos into a single collage image

Images are laid out by a seeded search that keeps every photo close to its
true aspect ratio; the canvas size and orientation are chosen to fit the
arrangement. The same images and seed always produce the same collage.

A layout can be saved as a JSON blueprint (--save-blueprint) and replayed
later against the same number of images (--blueprint), skipping the search.")]
#[command(version)]
struct Cli {
    /// Input images (JPEG or PNG), in layout order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output JPEG path
    #[arg(short, long, default_value = "collage.jpg")]
    output: PathBuf,

    /// Seed for the layout search
    #[arg(long)]
    seed: Option<u64>,

    /// Replay a saved blueprint instead of searching
    #[arg(long, conflicts_with = "seed")]
    blueprint: Option<PathBuf>,

    /// Write the chosen layout as a JSON blueprint
    #[arg(long)]
    save_blueprint: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut images = Vec::with_capacity(cli.images.len());
    for path in &cli.images {
        let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let image =
            decode_oriented(&bytes).map_err(|e| format!("{}: {e}", path.display()))?;
        let orientation = PageOrientation::of(image.width(), image.height());
        println!(
            "  {} {}x{} [{orientation}]",
            path.display(),
            image.width(),
            image.height()
        );
        images.push(image);
    }

    let dimensions: Vec<Dimensions> = images
        .iter()
        .map(|image| Dimensions::new(image.width(), image.height()))
        .collect();

    let layout = match &cli.blueprint {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let blueprint: Blueprint = serde_json::from_str(&json)?;
            blueprint.decode(images.len())?
        }
        None => optimizer::optimize(&dimensions, cli.seed)?,
    };

    let jpeg = compose::render(&layout, &images)?;

    if let Some(path) = &cli.save_blueprint {
        let json = serde_json::to_string_pretty(&Blueprint::from_layout(&layout))?;
        std::fs::write(path, json)?;
        println!("blueprint saved to {}", path.display());
    }

    std::fs::write(&cli.output, &jpeg)?;
    println!(
        "collage written to {} ({}x{})",
        cli.output.display(),
        layout.canvas.width,
        layout.canvas.height
    );
    Ok(())
}

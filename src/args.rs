use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "venue-harvest")]
#[command(about = "Harvests venue listings from a directory site, one batch of regions per call")]
#[command(version)]
pub struct Args {
    /// Index of the first region to scrape
    #[arg(short, long, default_value_t = 0)]
    pub start_index: usize,

    /// Regions to scrape in this call (defaults to regions_per_call from the config)
    #[arg(short, long)]
    pub max_regions: Option<usize>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file the records are upserted into
    #[arg(short, long, default_value = "venues.json")]
    pub output: PathBuf,

    /// Fetch the whole-catalog page instead of walking regions
    #[arg(long)]
    pub catalog: bool,

    /// Use plain HTTP only, without a WebDriver browser
    #[arg(long)]
    pub no_render: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["venue-harvest"]);
        assert_eq!(args.start_index, 0);
        assert_eq!(args.max_regions, None);
        assert_eq!(args.output, PathBuf::from("venues.json"));
        assert!(!args.catalog);
        assert!(!args.no_render);
    }

    #[test]
    fn test_resume_flags() {
        let args = Args::parse_from([
            "venue-harvest",
            "--start-index",
            "12",
            "--max-regions",
            "3",
            "--no-render",
        ]);
        assert_eq!(args.start_index, 12);
        assert_eq!(args.max_regions, Some(3));
        assert!(args.no_render);
    }
}

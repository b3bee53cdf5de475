use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "omr-sheet")]
#[command(version, about = "Read the marked answers from a photographed 5x5 answer sheet")]
pub struct Cli {
    /// Photograph or scan of the answer sheet
    #[arg(required = true)]
    pub input: PathBuf,

    /// Debug overlay output path [default: input_debug.jpg]
    pub debug_output: Option<PathBuf>,

    /// Do not write a debug overlay
    #[arg(long, conflicts_with = "debug_output")]
    pub no_debug: bool,

    /// TOML file overriding detection and grid parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TrueType font for overlay labels [default: a system font if found]
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Exit with status 1 when the sheet could not be read
    #[arg(long)]
    pub strict: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pub pretty: bool,

    /// Show pipeline details on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Where the overlay goes, or `None` when it is disabled
    pub fn debug_output_path(&self) -> Option<PathBuf> {
        if self.no_debug {
            return None;
        }
        Some(self.debug_output.clone().unwrap_or_else(|| {
            let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
            parent.join(format!("{}_debug.jpg", stem))
        }))
    }
}

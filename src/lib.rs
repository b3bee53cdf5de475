pub mod cli;
pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod pipeline;
pub mod preprocess;
pub mod result;
pub mod transform;

pub use cli::Cli;
pub use config::OmrConfig;
pub use debug::DebugOverlay;
pub use detection::{find_sheet_corners, BoundaryMatch};
pub use error::OmrError;
pub use geometry::CornerSet;
pub use grid::{analyze_grid, GridAnalysis};
pub use pipeline::{analyze_image, process_decoded, process_image, SheetAnalysis};
pub use result::{Answer, OmrResult};

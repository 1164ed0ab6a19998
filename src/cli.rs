use crate::pdf::{Pdftoppm, Rasterizer, RenderOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pdfslice")]
#[command(about = "Extract and preview page selections from PDF files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// pdftoppm executable used to render previews
    #[arg(long, global = true, env = "PDFSLICE_PDFTOPPM", default_value = "pdftoppm")]
    pub pdftoppm: PathBuf,

    /// Preview resolution in dots per inch
    #[arg(long, global = true, env = "PDFSLICE_DPI", default_value_t = 72)]
    pub dpi: u32,
}

impl Cli {
    pub fn rasterizer(&self) -> Arc<dyn Rasterizer> {
        Arc::new(Pdftoppm::new(
            self.pdftoppm.clone(),
            RenderOptions { dpi: self.dpi },
        ))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the valid page range and metadata of a PDF
    Info {
        /// PDF file to inspect
        path: PathBuf,
    },

    /// Copy a page selection into a new PDF
    #[command(alias = "cat")]
    Extract {
        /// PDF file to extract from
        path: PathBuf,

        /// Page selection (e.g., "1-2, 5-7, 11, 13"); pages are written in this order
        pages: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a page selection to PNG files
    Preview {
        /// PDF file to preview
        path: PathBuf,

        /// Page selection (e.g., "1-2, 5-7"); at most 50 distinct pages
        pages: String,

        /// Directory the rendered pages are written to
        #[arg(short = 'd', long, default_value = "pdfslice-preview")]
        output_dir: PathBuf,
    },

    /// Choose files and pages interactively
    Shell {
        /// Default directory for previews
        #[arg(short = 'd', long, default_value = "pdfslice-preview")]
        preview_dir: PathBuf,
    },

    /// Run as MCP server over stdio
    Mcp,
}

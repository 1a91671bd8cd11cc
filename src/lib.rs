// ABOUTME: Library module for the deckling program.
// ABOUTME: Contains slide conversion, deck assembly and PPTX packaging.

pub mod assembler;
pub mod browser;
pub mod config;
pub mod convert;
pub mod css;
pub mod errors;
pub mod layout;
pub mod markup;
pub mod pptx;
pub mod resources;
pub mod slide;
pub mod utils;

// Reexport common types and functions
pub use assembler::{DeckAssembler, DeckReport};
pub use browser::{BrowserConverter, BrowserOptions};
pub use config::{Config, DeckConfig, Renderer};
pub use convert::SlideConverter;
pub use errors::{ConvertError, DeckError, Result};
pub use layout::LayoutPreset;
pub use markup::{convert_markup, MarkupConverter, MarkupOptions};
pub use pptx::{save_pptx, write_pptx};
pub use slide::{DeckMetadata, Presentation, SlideSpec};

#[cfg(test)]
mod tests;

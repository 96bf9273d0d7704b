//! Named SQL templates: where they come from, how they are held, and how they render.

mod registry;
mod render;
mod source;

pub use registry::{Template, TemplateRegistry};
pub use render::{RenderedStatement, render};
pub use source::{DirSource, MemorySource, TemplateSource};

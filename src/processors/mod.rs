//! Document processors: EPUB extraction and translated export

pub mod epub;
pub mod export;

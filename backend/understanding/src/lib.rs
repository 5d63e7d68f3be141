pub mod chunker;
pub mod loader;
pub mod vision;

pub use chunker::RecursiveChunker;
pub use loader::{FileDocumentLoader, IMAGE_EXTENSIONS};
pub use vision::{analyze_image, describe_image, ImageAnalysis, VisionProvider};

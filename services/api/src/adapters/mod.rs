pub mod extraction_llm;

pub use extraction_llm::GeminiExtractionAdapter;

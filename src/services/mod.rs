pub mod llm_service;
pub mod result_writer;

pub use llm_service::{AiServiceClient, QuestionSolver};
pub use result_writer::ResultWriter;

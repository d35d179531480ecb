//! Biodiversity assistant: image identification and nature Q&A.

mod chat;
mod identify;

pub use chat::BiodiversityChat;
pub use identify::{image_data_url, Identification, ImageIdentifier, OrganismLabel};

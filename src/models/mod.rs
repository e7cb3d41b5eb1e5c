use uuid::Uuid;

pub mod price_sample;
pub mod product;

// Re-exports for convenience
pub use price_sample::*;
pub use product::*;

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub mod supabase;

pub use supabase::{SupabaseConfig, SupabaseStore, SOLVE_FEATURE};

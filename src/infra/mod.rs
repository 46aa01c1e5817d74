pub mod supabase;
pub mod umoiq;

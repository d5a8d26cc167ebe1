// handlers/schools/mod.rs - School-scoped handlers for staff sessions

pub mod students; // GET /api/schools/:school_id/students

pub use students::students_get;

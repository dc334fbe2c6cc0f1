mod admin;
mod files;
mod uploads;

pub use admin::{health, sweep};
pub use files::{delete_file, list_files, upload_file};
pub use uploads::{serve_upload, view_upload};

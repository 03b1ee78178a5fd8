mod client;

pub use client::{download_file, download_file_async, DownloadEntry};

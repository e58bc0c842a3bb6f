pub mod client;

pub use client::{HttpUploader, NoopUploader, UploadHandle, UploadReceipt, Uploader, WAV_CONTENT_TYPE};

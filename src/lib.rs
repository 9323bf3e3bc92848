//! # EmailListVerify Client
//!
//! A Rust client library for the EmailListVerify email-verification REST
//! API. It wraps the remote endpoints behind typed calls: one-shot email
//! checks, credit lookup, and the bulk upload → poll → download lifecycle
//! for batch verification jobs.
//!
//! ## Features
//!
//! - **Single Verification**: Check individual addresses and account credits
//! - **Bulk Lifecycle**: Upload an address list, poll for completion with a
//!   bounded, cancellable wait loop, and download result CSVs
//! - **Job Tracking**: An in-memory registry for concurrently submitted jobs
//! - **Local Heuristics**: Offline syntax check and disposable-domain lookup
//! - **Error Handling**: One error type distinguishing bad input, auth
//!   failures, transport failures, and remote job failures
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use emaillistverify::{api::Client, jobs::JobRegistry};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("your_api_key")?;
//!
//! // One-shot check
//! let status = client.verify_email("user@example.com")?;
//! println!("status: {status}");
//!
//! // Bulk verification, blocking until the results are on disk
//! let registry = JobRegistry::new(client);
//! let job = registry.submit_job(
//!     Path::new("emails.csv"),
//!     Path::new("results.csv"),
//!     true,
//! )?;
//! println!("job {} finished as {:?}", job.file_id, job.status);
//! # Ok(())
//! # }
//! ```

/// Transport seam, the canonical client, and single-email verification
pub mod api;

/// Bulk verification lifecycle: upload, status polling, result download
pub mod bulk;

/// Error types shared across the crate
pub mod errors;

/// Local, network-free email heuristics
pub mod heuristics;

/// Registry tracking submitted bulk jobs
pub mod jobs;

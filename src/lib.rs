//! # cloud-vision
//!
//! Batched client for the Cloud Vision `images:annotate` REST API. Register
//! images from raw bytes, local files or URLs, choose which annotations you
//! want (labels, text, faces, landmarks, logos, safe-search, image
//! properties), and get the results back keyed by the identifier you used
//! for each image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloud_vision::vision::{Feature, VisionClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = VisionClient::new(std::env::var("VISION_API_KEY")?);
//!
//!     client
//!         .add_image_by_url("https://example.com/portrait.jpg")?
//!         .add_image_by_filename("photos/beach.png")?
//!         .add_raw_image(std::fs::read("logo.png")?, "logo")?
//!         .add_feature(Feature::LabelDetection, 10)
//!         .add_feature(Feature::FaceDetection, 1);
//!
//!     // At most 10 images per API call; calls run concurrently.
//!     let annotations = client.request(10).await?;
//!
//!     for (id, response) in annotations.iter() {
//!         println!("### {id} ###");
//!         for label in &response.label_annotations {
//!             println!("  * {}", label.description.as_deref().unwrap_or("?"));
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration-driven usage
//!
//! ```rust,no_run
//! use cloud_vision::config::Config;
//! use cloud_vision::pipeline::{build_client, collect_inputs, register_inputs, render_report};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(Some("config.json".as_ref()))?;
//! let mut client = build_client(&config)?;
//!
//! let inputs = collect_inputs(&["./photos".to_string()]);
//! register_inputs(&mut client, &inputs)?;
//!
//! let annotations = client.request(config.batch_size).await?;
//! print!("{}", render_report(&annotations));
//! # Ok(())
//! # }
//! ```
//!
//! ## Batching
//!
//! Images are sent `batch_size` at a time. Each batch is tagged with a
//! base64-encoded JSON list of the identifiers it contains, which is used to
//! route the positional `responses` array back to the right images. See
//! [`vision::batch`].
//!
//! ## Modules
//!
//! - [`vision`]: features, the client, batching and the response model
//! - [`config`]: Configuration types and loading/saving
//! - [`pipeline`]: Input collection, client construction, report rendering

pub mod config;
pub mod pipeline;
pub mod vision;

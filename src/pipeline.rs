use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::config::Config;
use crate::vision::{AnnotateImageResponse, Annotations, VisionClient};

/// Extensions of image files the annotate endpoint accepts.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "ico", "tif", "tiff",
];

/// Command-line inputs sorted by source.
#[derive(Debug, Default, PartialEq)]
pub struct Inputs {
    pub files: Vec<PathBuf>,
    pub urls: Vec<String>,
}

impl Inputs {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.urls.len()
    }
}

/// Sort raw inputs into remote URLs and local image files.
///
/// Anything starting with `http://` or `https://` is a URL. Everything else
/// is a path: files are kept if they carry a supported extension, directories
/// are walked recursively (following symlinks).
///
/// # Example
///
/// ```rust,no_run
/// use cloud_vision::pipeline::collect_inputs;
///
/// let inputs = collect_inputs(&[
///     "photo.jpg".to_string(),                    // single file
///     "./photos/".to_string(),                    // entire directory
///     "https://example.com/cat.png".to_string(),  // remote image
/// ]);
/// println!("{} files, {} urls", inputs.files.len(), inputs.urls.len());
/// ```
pub fn collect_inputs(inputs: &[String]) -> Inputs {
    let mut collected = Inputs::default();

    for input in inputs {
        if is_url(input) {
            collected.urls.push(input.clone());
            continue;
        }

        let path = Path::new(input);
        if path.is_file() {
            if is_supported_image(path) {
                collected.files.push(path.to_path_buf());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    collected.files.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    collected
}

fn is_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build a [`VisionClient`] from configuration: key, endpoint, timeout and
/// the configured feature list. No images are registered.
pub fn build_client(config: &Config) -> Result<VisionClient> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder.build().context("Failed to build HTTP client")?;

    let mut client = VisionClient::with_client(config.api_key.clone(), http);
    client.set_endpoint(config.endpoint.clone());
    for request in config.feature_requests() {
        client.add_feature(request.feature, request.max_results);
    }
    Ok(client)
}

/// Register every collected input with the client.
pub fn register_inputs(client: &mut VisionClient, inputs: &Inputs) -> Result<()> {
    for file in &inputs.files {
        client.add_image_by_filename(file)?;
    }
    for url in &inputs.urls {
        client.add_image_by_url(url.as_str())?;
    }
    Ok(())
}

/// Render annotations as an indented, human-readable listing.
pub fn render_report(annotations: &Annotations) -> String {
    Report(annotations).to_string()
}

/// Plain-text view of a set of annotations, one block per image.
struct Report<'a>(&'a Annotations);

impl fmt::Display for Report<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, response) in self.0.iter() {
            writeln!(out, "### {id} ###")?;
            render_response(out, response)?;
            writeln!(out)?;
        }
        Ok(())
    }
}

fn render_response(out: &mut fmt::Formatter<'_>, response: &AnnotateImageResponse) -> fmt::Result {
    if let Some(ref error) = response.error {
        writeln!(out, "== ERROR ==\n\t* {} (code {})", error.message, error.code)?;
    }

    if !response.label_annotations.is_empty() {
        writeln!(out, "== LABEL ANNOTATIONS ==")?;
        for annotation in &response.label_annotations {
            writeln!(out, "\t* {}", describe(annotation.description.as_deref(), annotation.score))?;
        }
    }

    if !response.landmark_annotations.is_empty() {
        writeln!(out, "== LANDMARK ANNOTATIONS ==")?;
        for annotation in &response.landmark_annotations {
            let name = annotation.description.as_deref().unwrap_or("?");
            match annotation.locations.first().and_then(|l| l.lat_lng) {
                Some(lat_lng) => {
                    writeln!(out, "\t* {name} ({},{})", lat_lng.latitude, lat_lng.longitude)?;
                }
                None => {
                    writeln!(out, "\t* {name}")?;
                }
            }
        }
    }

    if !response.logo_annotations.is_empty() {
        writeln!(out, "== LOGO ANNOTATIONS ==")?;
        for annotation in &response.logo_annotations {
            writeln!(out, "\t* {}", describe(annotation.description.as_deref(), annotation.score))?;
        }
    }

    if !response.text_annotations.is_empty() {
        writeln!(out, "== TEXT ANNOTATIONS ==")?;
        for annotation in &response.text_annotations {
            let text = annotation.description.as_deref().unwrap_or_default();
            writeln!(out, "\t* {}", text.replace('\n', " "))?;
        }
    }

    for (i, face) in response.face_annotations.iter().enumerate() {
        writeln!(out, "== FACE {} ==", i + 1)?;
        for (label, likelihood) in [
            ("Joy", face.joy_likelihood),
            ("Sorrow", face.sorrow_likelihood),
            ("Anger", face.anger_likelihood),
            ("Surprise", face.surprise_likelihood),
            ("Underexposed", face.under_exposed_likelihood),
            ("Blurred", face.blurred_likelihood),
            ("Headwear", face.headwear_likelihood),
        ] {
            writeln!(out, "\t* {label}: {}", likelihood.as_str())?;
        }
    }

    if let Some(ref safe) = response.safe_search_annotation {
        writeln!(out, "== SAFE SEARCH ==")?;
        for (label, likelihood) in [
            ("Adult", safe.adult),
            ("Spoof", safe.spoof),
            ("Medical", safe.medical),
            ("Violence", safe.violence),
            ("Racy", safe.racy),
        ] {
            writeln!(out, "\t* {label}: {}", likelihood.as_str())?;
        }
    }

    if let Some(colors) = response
        .image_properties_annotation
        .as_ref()
        .and_then(|p| p.dominant_colors.as_ref())
    {
        writeln!(out, "== DOMINANT COLORS ==")?;
        for info in &colors.colors {
            let c = info.color;
            writeln!(
                out,
                "\t* #{:02x}{:02x}{:02x} ({:.1}% of pixels)",
                c.red as u8,
                c.green as u8,
                c.blue as u8,
                info.pixel_fraction * 100.0
            )?;
        }
    }

    Ok(())
}

fn describe(description: Option<&str>, score: Option<f32>) -> String {
    let description = description.unwrap_or("?");
    match score {
        Some(score) => format!("{description} ({score:.2})"),
        None => description.to_string(),
    }
}

use anyhow::{Context, Result};
use futures::future::try_join_all;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};

use super::batch::{self, Batch, BatchResponse, EncodedImage};
use super::{Annotations, Feature, FeatureRequest, VisionError};

/// Base URL of the public Cloud Vision REST API.
pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1";

/// A registered local file: its result identifier and the real path.
#[derive(Debug, Clone)]
struct ImageFile {
    id: String,
    path: PathBuf,
}

/// Builds and submits batched `images:annotate` requests.
///
/// Images are registered from three sources: raw bytes under a caller-chosen
/// name, local files, and remote URLs. Each identifier may only be registered
/// once. [`request`](Self::request) loads every image, sends them in batches
/// concurrently and hands back results keyed by the identifier each image
/// was registered under.
///
/// # Example
///
/// ```rust,no_run
/// use cloud_vision::vision::{Feature, VisionClient};
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut client = VisionClient::new("my-api-key");
/// client
///     .add_image_by_url("https://example.com/cat.jpg")?
///     .add_image_by_filename("photos/dog.png")?
///     .add_feature(Feature::LabelDetection, 10)
///     .add_feature(Feature::FaceDetection, 1);
///
/// let annotations = client.request(10).await?;
/// for (id, response) in annotations.iter() {
///     for label in &response.label_annotations {
///         println!("{id}: {:?}", label.description);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VisionClient {
    api_key: String,
    endpoint: String,
    client: Client,
    raw_images: Vec<EncodedImage>,
    files: Vec<ImageFile>,
    urls: Vec<String>,
    features: Vec<FeatureRequest>,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(api_key, Client::new())
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, TLS).
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
            raw_images: Vec::new(),
            files: Vec::new(),
            urls: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) -> &mut Self {
        self.api_key = api_key.into();
        self
    }

    /// Point the client at another API root, e.g. a regional endpoint.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) -> &mut Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Full URL that batches are POSTed to, key included.
    pub fn annotate_url(&self) -> String {
        format!("{}/images:annotate?key={}", self.endpoint, self.api_key)
    }

    /// Register in-memory image bytes under `name`.
    pub fn add_raw_image(
        &mut self,
        image: impl AsRef<[u8]>,
        name: impl Into<String>,
    ) -> Result<&mut Self, VisionError> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.raw_images
            .push(EncodedImage::from_bytes(name, image.as_ref()));
        Ok(self)
    }

    /// Register a local file. It is read when the request is sent; files that
    /// no longer exist by then are skipped.
    ///
    /// The result identifier is the path rendered as UTF-8 (lossily); the file
    /// itself is always read through the original path.
    pub fn add_image_by_filename(
        &mut self,
        filename: impl AsRef<Path>,
    ) -> Result<&mut Self, VisionError> {
        let path = filename.as_ref().to_path_buf();
        let id = path.to_string_lossy().into_owned();
        self.ensure_unique(&id)?;
        self.files.push(ImageFile { id, path });
        Ok(self)
    }

    /// Register a remote image. The URL needs a scheme and a host.
    pub fn add_image_by_url(&mut self, url: impl Into<String>) -> Result<&mut Self, VisionError> {
        let url = url.into();
        self.ensure_unique(&url)?;
        match Url::parse(&url) {
            Ok(parsed) if parsed.has_host() => {}
            _ => return Err(VisionError::InvalidUrl(url)),
        }
        self.urls.push(url);
        Ok(self)
    }

    /// Request `feature` with at most `max_results` results. Adding a feature
    /// again replaces its bound and keeps its position.
    pub fn add_feature(&mut self, feature: Feature, max_results: u32) -> &mut Self {
        match self.features.iter_mut().find(|f| f.feature == feature) {
            Some(existing) => existing.max_results = max_results,
            None => self.features.push(FeatureRequest::new(feature, max_results)),
        }
        self
    }

    /// Like [`add_feature`](Self::add_feature), taking the wire or short name.
    pub fn add_feature_by_name(
        &mut self,
        name: &str,
        max_results: u32,
    ) -> Result<&mut Self, VisionError> {
        let feature = name.parse()?;
        Ok(self.add_feature(feature, max_results))
    }

    pub fn features(&self) -> &[FeatureRequest] {
        &self.features
    }

    /// Identifiers in the order their results will be returned.
    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.raw_images
            .iter()
            .map(|image| image.id.as_str())
            .chain(self.files.iter().map(|file| file.id.as_str()))
            .chain(self.urls.iter().map(String::as_str))
    }

    pub fn image_count(&self) -> usize {
        self.raw_images.len() + self.files.len() + self.urls.len()
    }

    fn ensure_unique(&self, id: &str) -> Result<(), VisionError> {
        if self.image_ids().any(|existing| existing == id) {
            return Err(VisionError::DuplicateImage(id.to_string()));
        }
        Ok(())
    }

    /// Fail fast if the request can't possibly succeed.
    pub fn check_requirements(&self) -> Result<(), VisionError> {
        if self.api_key.is_empty() {
            return Err(VisionError::MissingApiKey);
        }
        if self.features.is_empty() {
            return Err(VisionError::MissingFeatures);
        }
        if self.image_count() == 0 {
            return Err(VisionError::MissingImages);
        }
        Ok(())
    }

    /// Read every registered file that exists, in registration order.
    pub async fn images_from_files(&self) -> Result<Vec<EncodedImage>> {
        let mut images = Vec::with_capacity(self.files.len());
        for file in &self.files {
            if !file.path.exists() {
                log::warn!("Skipping missing image file: {}", file.path.display());
                continue;
            }
            let bytes = tokio::fs::read(&file.path)
                .await
                .with_context(|| format!("Failed to read image file {}", file.path.display()))?;
            images.push(EncodedImage::from_bytes(file.id.as_str(), &bytes));
        }
        Ok(images)
    }

    /// Download every registered URL concurrently. Any failure fails the lot.
    pub async fn images_from_urls(&self) -> Result<Vec<EncodedImage>> {
        try_join_all(self.urls.iter().map(|url| self.fetch_url(url))).await
    }

    async fn fetch_url(&self, url: &str) -> Result<EncodedImage> {
        log::debug!("Downloading {url}");
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download image {url}"))?
            .error_for_status()
            .with_context(|| format!("Failed to download image {url}"))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read image body from {url}"))?;
        Ok(EncodedImage::from_bytes(url, &bytes))
    }

    /// All images, encoded: raw images, then files, then URLs.
    pub async fn load_images(&self) -> Result<Vec<EncodedImage>> {
        let mut images = self.raw_images.clone();
        images.extend(self.images_from_files().await?);
        images.extend(self.images_from_urls().await?);
        Ok(images)
    }

    /// Annotate every registered image, `batch_size` images per API call.
    ///
    /// All batches are sent concurrently. Results come back in registration
    /// order regardless of which call finishes first.
    pub async fn request(&self, batch_size: usize) -> Result<Annotations> {
        self.check_requirements()?;
        if batch_size == 0 {
            return Err(VisionError::InvalidBatchSize.into());
        }

        let images = self.load_images().await?;
        if images.is_empty() {
            log::warn!("None of the registered images could be loaded; nothing to annotate");
            return Ok(Annotations::default());
        }

        let batches = batch::build_batches(&images, &self.features, batch_size)?;
        log::info!(
            "Annotating {} image(s) in {} batch(es) of up to {batch_size}",
            images.len(),
            batches.len()
        );

        let responses = try_join_all(batches.iter().map(|b| self.send_batch(b))).await?;

        let mut annotations = Annotations::with_capacity(images.len());
        for (batch, response) in batches.iter().zip(responses) {
            annotations.extend(batch::correlate(&batch.token, response)?);
        }

        for (id, status) in annotations.errors() {
            log::warn!("Vision API could not process {id}: {}", status.message);
        }

        Ok(annotations)
    }

    async fn send_batch(&self, batch: &Batch) -> Result<BatchResponse> {
        log::debug!("Sending batch of {} image(s)", batch.len());

        let resp = self
            .client
            .post(self.annotate_url())
            .json(&batch.body)
            .send()
            .await
            .context("Vision API request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("Failed to read Vision API response")?;

        if !status.is_success() {
            anyhow::bail!("Vision API error ({}): {}", status, text);
        }

        serde_json::from_str(&text).context("Failed to parse Vision API response JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{Method, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // ── fake Vision API ──────────────────────────────────────────────
    //
    // GET /img/<name>   → body is the bytes of <name>
    // GET /missing      → 404
    // POST ...annotate  → one label per request whose description is the
    //                     decoded image content; key=denied → 403

    #[derive(Default)]
    struct Recorded {
        posts: Vec<(String, Value)>,
        gets: Vec<String>,
    }

    async fn fake_api(
        State(recorded): State<Arc<Mutex<Recorded>>>,
        method: Method,
        uri: Uri,
        body: Bytes,
    ) -> Response {
        let path = uri.path().to_string();
        if method == Method::GET {
            recorded.lock().unwrap().gets.push(path.clone());
            return match path.strip_prefix("/img/") {
                Some(name) => name.as_bytes().to_vec().into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            };
        }

        let query = uri.query().unwrap_or_default().to_string();
        if query == "key=denied" {
            return (StatusCode::FORBIDDEN, r#"{"error":{"code":403,"message":"denied"}}"#)
                .into_response();
        }

        let request: Value = serde_json::from_slice(&body).unwrap();
        let responses: Vec<Value> = request["requests"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| {
                let content = STANDARD.decode(r["image"]["content"].as_str().unwrap()).unwrap();
                let text = String::from_utf8(content).unwrap();
                if text == "corrupt" {
                    json!({"error": {"code": 3, "message": "Bad image data."}})
                } else {
                    json!({"labelAnnotations": [{"description": text, "score": 0.9}]})
                }
            })
            .collect();

        recorded.lock().unwrap().posts.push((format!("{path}?{query}"), request));
        axum::Json(json!({ "responses": responses })).into_response()
    }

    async fn spawn_fake_api() -> (String, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let app = Router::new()
            .fallback(fake_api)
            .with_state(recorded.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), recorded)
    }

    fn labels_of(annotations: &Annotations) -> Vec<(String, String)> {
        annotations
            .iter()
            .map(|(id, r)| {
                let label = r.label_annotations[0].description.clone().unwrap_or_default();
                (id.to_string(), label)
            })
            .collect()
    }

    // ── registry ─────────────────────────────────────────────────────

    #[test]
    fn duplicate_raw_image_rejected() {
        let mut client = VisionClient::new("key");
        client.add_raw_image(b"one", "photo").unwrap();
        let err = client.add_raw_image(b"two", "photo").unwrap_err();
        assert_eq!(err, VisionError::DuplicateImage("photo".into()));
        assert_eq!(err.to_string(), "Image 'photo' already added");
    }

    #[test]
    fn duplicate_filename_rejected() {
        let mut client = VisionClient::new("key");
        client.add_image_by_filename("a.jpg").unwrap();
        assert!(matches!(
            client.add_image_by_filename("a.jpg"),
            Err(VisionError::DuplicateImage(_))
        ));
    }

    #[test]
    fn duplicate_url_rejected() {
        let mut client = VisionClient::new("key");
        client.add_image_by_url("https://example.com/a.jpg").unwrap();
        assert!(matches!(
            client.add_image_by_url("https://example.com/a.jpg"),
            Err(VisionError::DuplicateImage(_))
        ));
    }

    #[test]
    fn duplicate_across_sources_rejected() {
        let mut client = VisionClient::new("key");
        client.add_raw_image(b"bytes", "a.jpg").unwrap();
        assert!(matches!(
            client.add_image_by_filename("a.jpg"),
            Err(VisionError::DuplicateImage(_))
        ));
    }

    #[test]
    fn invalid_url_rejected() {
        let mut client = VisionClient::new("key");
        for bad in ["not a url", "example.com/cat.jpg", "mailto:someone@example.com", ""] {
            assert_eq!(
                client.add_image_by_url(bad).unwrap_err(),
                VisionError::InvalidUrl(bad.to_string()),
                "{bad:?}"
            );
        }
        assert_eq!(client.image_count(), 0);
    }

    #[test]
    fn image_ids_in_source_order() {
        let mut client = VisionClient::new("key");
        client
            .add_image_by_url("https://example.com/u.jpg")
            .unwrap()
            .add_image_by_filename("f.jpg")
            .unwrap()
            .add_raw_image(b"r", "raw")
            .unwrap();
        let ids: Vec<_> = client.image_ids().collect();
        assert_eq!(ids, ["raw", "f.jpg", "https://example.com/u.jpg"]);
    }

    #[test]
    fn add_feature_replaces_bound_in_place() {
        let mut client = VisionClient::new("key");
        client
            .add_feature(Feature::LabelDetection, 10)
            .add_feature(Feature::FaceDetection, 1)
            .add_feature(Feature::LabelDetection, 3);
        assert_eq!(
            client.features(),
            [
                FeatureRequest::new(Feature::LabelDetection, 3),
                FeatureRequest::new(Feature::FaceDetection, 1),
            ]
        );
    }

    #[test]
    fn add_feature_by_name_unknown() {
        let mut client = VisionClient::new("key");
        assert!(client.add_feature_by_name("logo", 5).is_ok());
        assert_eq!(
            client.add_feature_by_name("NOPE", 1).unwrap_err(),
            VisionError::UnknownFeature("NOPE".into())
        );
    }

    #[test]
    fn annotate_url_includes_key() {
        let mut client = VisionClient::new("abc");
        assert_eq!(
            client.annotate_url(),
            "https://vision.googleapis.com/v1/images:annotate?key=abc"
        );
        client.set_endpoint("http://localhost:9000/v1/").set_api_key("xyz");
        assert_eq!(client.annotate_url(), "http://localhost:9000/v1/images:annotate?key=xyz");
    }

    // ── check_requirements ───────────────────────────────────────────

    #[test]
    fn requirements_checked_in_order() {
        let mut client = VisionClient::new("");
        assert_eq!(client.check_requirements(), Err(VisionError::MissingApiKey));

        client.set_api_key("key");
        assert_eq!(client.check_requirements(), Err(VisionError::MissingFeatures));

        client.add_feature(Feature::LabelDetection, 1);
        assert_eq!(client.check_requirements(), Err(VisionError::MissingImages));

        client.add_raw_image(b"x", "x").unwrap();
        assert_eq!(client.check_requirements(), Ok(()));
    }

    #[tokio::test]
    async fn request_validates_before_network() {
        // nothing listens on this endpoint; validation must fail first
        let mut client = VisionClient::new("key");
        client.set_endpoint("http://127.0.0.1:9");
        client.add_raw_image(b"x", "x").unwrap();

        let err = client.request(10).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<VisionError>(),
            Some(&VisionError::MissingFeatures)
        );

        client.add_feature(Feature::LabelDetection, 1);
        let err = client.request(0).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<VisionError>(),
            Some(&VisionError::InvalidBatchSize)
        );
    }

    // ── image loading ────────────────────────────────────────────────

    #[tokio::test]
    async fn files_missing_are_skipped() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.jpg");
        std::fs::write(&present, b"jpeg-bytes").unwrap();

        let mut client = VisionClient::new("key");
        client
            .add_image_by_filename(dir.path().join("gone.jpg"))
            .unwrap()
            .add_image_by_filename(&present)
            .unwrap();

        let images = client.images_from_files().await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, present.to_string_lossy());
        assert_eq!(images[0].content, STANDARD.encode(b"jpeg-bytes"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn files_with_non_utf8_names_are_read() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"caf\xe9.jpg"));
        std::fs::write(&path, b"latin1-name").unwrap();
        assert!(path.exists());

        let mut client = VisionClient::new("key");
        client.add_image_by_filename(&path).unwrap();

        let images = client.images_from_files().await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, path.to_string_lossy());
        assert_eq!(images[0].content, STANDARD.encode(b"latin1-name"));
    }

    #[tokio::test]
    async fn urls_downloaded_in_registration_order() {
        let (base, recorded) = spawn_fake_api().await;
        let mut client = VisionClient::new("key");
        for name in ["one", "two", "three"] {
            client.add_image_by_url(format!("{base}/img/{name}")).unwrap();
        }

        let images = client.images_from_urls().await.unwrap();
        let contents: Vec<_> = images.iter().map(|i| STANDARD.decode(&i.content).unwrap()).collect();
        assert_eq!(contents, [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        assert_eq!(images[2].id, format!("{base}/img/three"));
        assert_eq!(recorded.lock().unwrap().gets.len(), 3);
    }

    #[tokio::test]
    async fn url_download_failure_fails_request() {
        let (base, recorded) = spawn_fake_api().await;
        let mut client = VisionClient::new("key");
        client.set_endpoint(format!("{base}/v1"));
        client
            .add_feature(Feature::LabelDetection, 1)
            .add_image_by_url(format!("{base}/img/ok"))
            .unwrap()
            .add_image_by_url(format!("{base}/missing"))
            .unwrap();

        let err = client.request(10).await.unwrap_err();
        assert!(err.to_string().contains("/missing"), "{err:#}");
        assert!(recorded.lock().unwrap().posts.is_empty());
    }

    // ── request ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn request_batches_and_reassembles_in_order() {
        let (base, recorded) = spawn_fake_api().await;
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.jpg");
        std::fs::write(&file, b"from-file").unwrap();

        let mut client = VisionClient::new("secret");
        client.set_endpoint(format!("{base}/v1"));
        client
            .add_feature(Feature::LabelDetection, 10)
            .add_feature(Feature::FaceDetection, 1);
        for i in 0..4 {
            client.add_raw_image(format!("raw-{i}"), format!("name-{i}")).unwrap();
        }
        client
            .add_image_by_filename(&file)
            .unwrap()
            .add_image_by_url(format!("{base}/img/from-url"))
            .unwrap();

        let annotations = client.request(4).await.unwrap();

        let file_id = file.to_string_lossy().into_owned();
        let url_id = format!("{base}/img/from-url");
        assert_eq!(
            labels_of(&annotations),
            [
                ("name-0".to_string(), "raw-0".to_string()),
                ("name-1".to_string(), "raw-1".to_string()),
                ("name-2".to_string(), "raw-2".to_string()),
                ("name-3".to_string(), "raw-3".to_string()),
                (file_id.clone(), "from-file".to_string()),
                (url_id.clone(), "from-url".to_string()),
            ]
        );
        assert_eq!(
            annotations.get(&url_id).unwrap().label_annotations[0].description.as_deref(),
            Some("from-url")
        );

        let recorded = recorded.lock().unwrap();
        // 6 images at 4 per call
        assert_eq!(recorded.posts.len(), 2);
        let mut sizes: Vec<usize> = recorded
            .posts
            .iter()
            .map(|(_, body)| body["requests"].as_array().unwrap().len())
            .collect();
        sizes.sort();
        assert_eq!(sizes, [2, 4]);

        for (target, body) in &recorded.posts {
            assert_eq!(target, "/v1/images:annotate?key=secret");
            assert_eq!(
                body["requests"][0]["features"],
                json!([
                    {"type": "LABEL_DETECTION", "maxResults": 10},
                    {"type": "FACE_DETECTION", "maxResults": 1}
                ])
            );
        }
    }

    #[tokio::test]
    async fn request_splits_into_ceil_batches() {
        let (base, recorded) = spawn_fake_api().await;
        let mut client = VisionClient::new("key");
        client.set_endpoint(&base);
        client.add_feature(Feature::TextDetection, 1);
        for i in 0..7 {
            client.add_raw_image(format!("{i}"), format!("img{i}")).unwrap();
        }

        let annotations = client.request(3).await.unwrap();
        assert_eq!(annotations.len(), 7);
        assert_eq!(recorded.lock().unwrap().posts.len(), 3);

        let ids: Vec<_> = annotations.ids().collect();
        assert_eq!(ids, ["img0", "img1", "img2", "img3", "img4", "img5", "img6"]);
    }

    #[tokio::test]
    async fn request_surfaces_per_image_errors() {
        let (base, _) = spawn_fake_api().await;
        let mut client = VisionClient::new("key");
        client.set_endpoint(&base);
        client.add_feature(Feature::LabelDetection, 1);
        client
            .add_raw_image(b"fine", "good")
            .unwrap()
            .add_raw_image(b"corrupt", "bad")
            .unwrap();

        let annotations = client.request(10).await.unwrap();
        assert_eq!(annotations.len(), 2);
        let errors: Vec<_> = annotations.errors().map(|(id, _)| id).collect();
        assert_eq!(errors, ["bad"]);
    }

    #[tokio::test]
    async fn request_http_error_status() {
        let (base, _) = spawn_fake_api().await;
        let mut client = VisionClient::new("denied");
        client.set_endpoint(&base);
        client.add_feature(Feature::LabelDetection, 1);
        client.add_raw_image(b"x", "x").unwrap();

        let err = client.request(10).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Vision API error (403"), "{message}");
        assert!(message.contains("denied"));
    }

    #[tokio::test]
    async fn request_all_files_missing_sends_nothing() {
        let (base, recorded) = spawn_fake_api().await;
        let mut client = VisionClient::new("key");
        client.set_endpoint(&base);
        client.add_feature(Feature::LabelDetection, 1);
        client.add_image_by_filename("/nonexistent/photo.jpg").unwrap();

        let annotations = client.request(10).await.unwrap();
        assert!(annotations.is_empty());
        assert!(recorded.lock().unwrap().posts.is_empty());
    }
}

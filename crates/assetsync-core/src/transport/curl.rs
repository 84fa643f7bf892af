//! libcurl implementation of [`Transport`] for the REST/JSON asset API.
//!
//! One `Easy` handle per request, run on the calling (blocking) thread.
//! Progress and cancellation go through curl's progress callback: returning
//! false there aborts the request, which surfaces as [`AssetError::Cancelled`].

use ::curl::easy::{Easy, Form, List, ReadError};
use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{ClientConfig, HttpConfig};
use crate::error::{AssetError, Result};
use crate::model::{AssetId, AssetRef, DataSource, RenditionDescriptor};
use crate::storage::ByteSink;
use crate::transfer::TransferIo;

use super::credentials::CredentialProvider;
use super::wire::{self, CreateMetadata, GenerateResponse, HeaderCapture};
use super::{
    AssetRecord, CreateAsset, DownloadInfo, GenerateRenditions, Transport, UploadSource,
};

impl From<::curl::Error> for AssetError {
    fn from(e: ::curl::Error) -> Self {
        AssetError::Network(e.to_string())
    }
}

impl From<::curl::FormError> for AssetError {
    fn from(e: ::curl::FormError) -> Self {
        AssetError::InvalidArgument(format!("multipart form: {e}"))
    }
}

enum RequestBody<'a> {
    Empty,
    Json(Vec<u8>),
    File(&'a UploadSource),
    Multipart(Form),
}

/// Where a successful response body goes.
enum ResponseSink<'s> {
    Buffer,
    Stream(&'s mut dyn ByteSink),
}

struct Response {
    status: u32,
    etag: Option<String>,
    /// Error bodies and buffered JSON; empty when streamed into a sink.
    body: Vec<u8>,
    streamed: u64,
}

impl Response {
    fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

pub struct CurlTransport {
    base: Url,
    credentials: Arc<dyn CredentialProvider>,
    http: HttpConfig,
}

impl CurlTransport {
    pub fn new(base: Url, credentials: Arc<dyn CredentialProvider>, http: HttpConfig) -> Self {
        Self {
            base,
            credentials,
            http,
        }
    }

    pub fn from_config(
        cfg: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> anyhow::Result<Self> {
        let base = cfg.validate()?;
        Ok(Self::new(base, credentials, cfg.http_or_default()))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/v1/assets/{segments...}`; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                AssetError::InvalidArgument(format!("base URL {} cannot be a base", self.base))
            })?;
            path.pop_if_empty().push("v1").push("assets");
            path.extend(segments);
        }
        Ok(url)
    }

    fn asset_endpoint(&self, id: &AssetId, rest: &[&str]) -> Result<Url> {
        let mut segments = vec![id.as_str()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn headers(&self, extra: &[String]) -> Result<List> {
        let mut list = List::new();
        if let Some(token) = self.credentials.bearer_token()? {
            list.append(&format!("Authorization: Bearer {token}"))?;
        }
        // Disable `Expect: 100-continue` round trips on uploads.
        list.append("Expect:")?;
        for h in extra {
            list.append(h)?;
        }
        Ok(list)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        method: &str,
        url: &Url,
        body: RequestBody<'_>,
        extra_headers: &[String],
        mut sink: ResponseSink<'_>,
        io: &TransferIo,
        what: &str,
    ) -> Result<Response> {
        io.checkpoint()?;

        let mut easy = Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(Duration::from_secs(self.http.connect_timeout_secs))?;
        easy.timeout(Duration::from_secs(self.http.timeout_secs))?;
        easy.useragent(&self.http.user_agent)?;
        easy.progress(true)?;

        let mut upload_file = None;
        match body {
            RequestBody::Empty => {}
            RequestBody::Json(bytes) => {
                easy.post(true)?;
                easy.post_fields_copy(&bytes)?;
            }
            RequestBody::File(source) => {
                upload_file = Some(File::open(&source.path)?);
                easy.upload(true)?;
                easy.in_filesize(source.size)?;
            }
            RequestBody::Multipart(form) => easy.httppost(form)?,
        }
        match method {
            "GET" | "POST" => {}
            "PUT" if upload_file.is_some() => {}
            other => easy.custom_request(other)?,
        }
        easy.http_headers(self.headers(extra_headers)?)?;

        let capture = HeaderCapture::default();
        let mut buffer = Vec::new();
        let mut streamed = 0u64;
        let sink_error: RefCell<Option<std::io::Error>> = RefCell::new(None);

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                capture.feed(data);
                true
            })?;
            transfer.write_function(|data| {
                match &mut sink {
                    ResponseSink::Stream(s) if capture.is_success() => {
                        if let Err(e) = s.write_chunk(data) {
                            sink_error.replace(Some(e));
                            return Ok(0);
                        }
                        streamed += data.len() as u64;
                    }
                    _ => buffer.extend_from_slice(data),
                }
                Ok(data.len())
            })?;
            if let Some(file) = upload_file.as_mut() {
                transfer.read_function(|buf| file.read(buf).map_err(|_| ReadError::Abort))?;
            }
            transfer.progress_function(|dltotal, dlnow, ultotal, ulnow| {
                if io.is_aborted() {
                    return false;
                }
                if ultotal > 0.0 && ulnow < ultotal {
                    io.report(ulnow as u64, ultotal as u64);
                } else if dltotal > 0.0 {
                    io.report(dlnow as u64, dltotal as u64);
                }
                true
            })?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if io.is_aborted() {
                return Err(AssetError::Cancelled);
            }
            if let Some(io_err) = sink_error.into_inner() {
                return Err(AssetError::Io(io_err));
            }
            tracing::debug!(error = %e, "{what}: request failed");
            return Err(AssetError::Network(format!("{what}: {e}")));
        }

        let status = match capture.status() {
            Some(s) => s,
            None => easy.response_code()?,
        };
        tracing::debug!(status, "{what}");
        let response = Response {
            status,
            etag: capture.etag(),
            body: buffer,
            streamed,
        };
        if !wire::is_success(response.status) {
            return Err(wire::status_error(response.status, &response.body, what));
        }
        Ok(response)
    }

    fn upload(
        &self,
        url: &Url,
        source: &UploadSource,
        io: &TransferIo,
        what: &str,
    ) -> Result<AssetRecord> {
        let headers = [
            format!("Content-Type: {}", source.content_type),
            format!("X-Content-SHA256: {}", source.sha256),
        ];
        let resp = self.execute(
            "PUT",
            url,
            RequestBody::File(source),
            &headers,
            ResponseSink::Buffer,
            io,
            what,
        )?;
        io.report(source.size, source.size);
        resp.json()
    }
}

impl Transport for CurlTransport {
    fn create_asset(&self, request: &CreateAsset, io: &TransferIo) -> Result<AssetRecord> {
        let metadata = serde_json::to_vec(&CreateMetadata {
            name: &request.name,
            content_type: &request.source.content_type,
            destination: &request.destination,
            sha256: &request.source.sha256,
        })?;
        let mut form = Form::new();
        form.part("metadata")
            .contents(&metadata)
            .content_type("application/json")
            .add()?;
        form.part("file")
            .file(&request.source.path)
            .content_type(&request.source.content_type)
            .filename(&request.name)
            .add()?;

        let url = self.endpoint(&[])?;
        let resp = self.execute(
            "POST",
            &url,
            RequestBody::Multipart(form),
            &[],
            ResponseSink::Buffer,
            io,
            &format!("POST asset {}", request.name),
        )?;
        resp.json()
    }

    fn fetch_asset(&self, id: &AssetId, io: &TransferIo) -> Result<AssetRef> {
        let url = self.asset_endpoint(id, &[])?;
        let resp = self.execute(
            "GET",
            &url,
            RequestBody::Empty,
            &["Accept: application/json".to_string()],
            ResponseSink::Buffer,
            io,
            &format!("GET asset {id}"),
        )?;
        let mut asset: AssetRef = resp.json()?;
        if asset.revision.is_none() {
            asset.revision = resp.etag;
        }
        Ok(asset)
    }

    fn delete_asset(&self, id: &AssetId, io: &TransferIo) -> Result<()> {
        let url = self.asset_endpoint(id, &[])?;
        self.execute(
            "DELETE",
            &url,
            RequestBody::Empty,
            &[],
            ResponseSink::Buffer,
            io,
            &format!("DELETE asset {id}"),
        )?;
        Ok(())
    }

    fn upload_master(
        &self,
        id: &AssetId,
        source: &UploadSource,
        io: &TransferIo,
    ) -> Result<AssetRecord> {
        let url = self.asset_endpoint(id, &["master"])?;
        self.upload(&url, source, io, &format!("PUT master {id}"))
    }

    fn upload_rendition(
        &self,
        id: &AssetId,
        descriptor: &RenditionDescriptor,
        source: &UploadSource,
        io: &TransferIo,
    ) -> Result<AssetRecord> {
        let kind = descriptor.kind.as_str();
        let url = self.asset_endpoint(id, &["renditions", kind])?;
        self.upload(&url, source, io, &format!("PUT rendition {kind} of {id}"))
    }

    fn generate_renditions(
        &self,
        id: &AssetId,
        request: &GenerateRenditions,
        io: &TransferIo,
    ) -> Result<Vec<RenditionDescriptor>> {
        let url = self.asset_endpoint(id, &["renditions:generate"])?;
        let resp = self.execute(
            "POST",
            &url,
            RequestBody::Json(serde_json::to_vec(request)?),
            &["Content-Type: application/json".to_string()],
            ResponseSink::Buffer,
            io,
            &format!("POST generate renditions for {id}"),
        )?;
        Ok(resp.json::<GenerateResponse>()?.renditions)
    }

    fn download(
        &self,
        id: &AssetId,
        source: DataSource,
        sink: &mut dyn ByteSink,
        io: &TransferIo,
    ) -> Result<DownloadInfo> {
        let url = self.asset_endpoint(id, &source.path_segments())?;
        let resp = self.execute(
            "GET",
            &url,
            RequestBody::Empty,
            &[],
            ResponseSink::Stream(sink),
            io,
            &format!("GET {source} of {id}"),
        )?;
        if resp.streamed > 0 {
            io.report(resp.streamed, resp.streamed);
        }
        Ok(DownloadInfo {
            bytes: resp.streamed,
            revision: resp.etag,
        })
    }
}

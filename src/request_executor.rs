//! ISAPI camera protocol client
//! Single HTTP exchange with Basic or Digest authentication
//!
//! Basic credentials are sent eagerly unless the client prefers Digest. With
//! Digest preferred, a 401 carrying a Digest challenge is answered by
//! resending the same request once with a freshly computed `Authorization`
//! header. That resend is part of the same attempt as far as the retry
//! budget is concerned.

use crate::client_config::ClientOptions;
use crate::device_endpoint::{ Credentials, DeviceEndpoint };
use crate::digest_auth::{ compute_authorization_header, DigestChallenge };
use crate::isapi_error::IsapiError;
use crate::request_log::{ AttemptRecord, RequestContext, RequestLog };
use log::debug;
use reqwest::header::{ HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE };
use reqwest::{ Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode };
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Content type of XML request bodies
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// What to send
#[derive(Debug, Clone)]
pub struct RequestSpec<'a> {
    pub method: Method,
    pub path: &'a str,
    pub body: Option<&'a str>,
    pub accept: Option<&'a str>,
}

/// What came back
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
    /// True if this is the answer to the Digest resend
    pub digest: bool,
}

impl HttpExchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues one request per call against a fixed device
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    endpoint: DeviceEndpoint,
    credentials: Credentials,
    prefer_digest: bool,
}

impl RequestExecutor {
    pub fn new(
        endpoint: DeviceEndpoint,
        credentials: Credentials,
        options: &ClientOptions
    ) -> Result<Self, IsapiError> {
        let client = ClientBuilder::new()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.allow_self_signed)
            .redirect(reqwest::redirect::Policy::none())
            .gzip(true)
            .deflate(true)
            .user_agent(options.user_agent.as_str())
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .pool_idle_timeout(options.pool_idle_timeout)
            .build()
            .map_err(IsapiError::Request)?;

        Ok(Self {
            client,
            endpoint,
            credentials,
            prefer_digest: options.prefer_digest,
        })
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Send one attempt and report it to `log`.
    ///
    /// Any HTTP status is a successful exchange here; interpreting it is the
    /// caller's job.
    pub async fn execute(
        &self,
        spec: &RequestSpec<'_>,
        context: &RequestContext<'_>,
        attempt: u32,
        log: &dyn RequestLog,
        cancel: &CancellationToken
    ) -> Result<HttpExchange, IsapiError> {
        let url = self.endpoint.build(spec.path)?;

        debug!(
            "[{}] Request attempt {}: {} {} accept={} body={} chars (corr {})",
            context.host,
            attempt,
            spec.method,
            url,
            spec.accept.unwrap_or("-"),
            spec.body.map(str::len).unwrap_or(0),
            context.correlation_id
        );

        let started = Instant::now();
        let result = self.exchange(&url, spec, context, cancel).await;

        match &result {
            Ok(exchange) =>
                log.attempt_finished(context, &(AttemptRecord {
                    attempt,
                    status: Some(exchange.status),
                    elapsed: started.elapsed(),
                    body_len: exchange.body.len(),
                    digest: exchange.digest,
                })),
            Err(IsapiError::Cancelled) => {}
            Err(_) =>
                log.attempt_finished(context, &(AttemptRecord {
                    attempt,
                    status: None,
                    elapsed: started.elapsed(),
                    body_len: 0,
                    digest: false,
                })),
        }

        result
    }

    async fn exchange(
        &self,
        url: &Url,
        spec: &RequestSpec<'_>,
        context: &RequestContext<'_>,
        cancel: &CancellationToken
    ) -> Result<HttpExchange, IsapiError> {
        let eager_auth = if self.prefer_digest {
            None
        } else {
            Some(self.credentials.basic_authorization())
        };

        let response = cancellable(cancel, self.build_request(url, spec, eager_auth).send()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.prefer_digest {
            if let Some(challenge) = find_digest_challenge(response.headers()) {
                debug!(
                    "[{}] 401 received. Retrying with Digest authentication for {} {} (corr {})",
                    context.host,
                    spec.method,
                    url.path(),
                    context.correlation_id
                );
                drop(response);

                let authorization = compute_authorization_header(
                    &challenge,
                    &self.credentials,
                    spec.method.as_str(),
                    &path_and_query(url)
                );
                let retry = cancellable(
                    cancel,
                    self.build_request(url, spec, Some(authorization)).send()
                ).await?;
                return read_exchange(retry, true, cancel).await;
            }
        }

        read_exchange(response, false, cancel).await
    }

    fn build_request(&self, url: &Url, spec: &RequestSpec<'_>, authorization: Option<String>) -> RequestBuilder {
        let mut request = self.client.request(spec.method.clone(), url.clone());

        if let Some(accept) = spec.accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(body) = spec.body {
            request = request.header(CONTENT_TYPE, XML_CONTENT_TYPE).body(body.to_string());
        }
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        request
    }
}

async fn read_exchange(
    response: Response,
    digest: bool,
    cancel: &CancellationToken
) -> Result<HttpExchange, IsapiError> {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("HTTP error").to_string();
    let body = cancellable(cancel, response.bytes()).await?;

    Ok(HttpExchange {
        status: status.as_u16(),
        reason,
        body: body.to_vec(),
        digest,
    })
}

/// Race a transport future against the cancellation token
async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T, IsapiError>
    where F: Future<Output = Result<T, reqwest::Error>>
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IsapiError::Cancelled),
        result = future => result.map_err(IsapiError::Request),
    }
}

/// First Digest challenge among the `WWW-Authenticate` headers
fn find_digest_challenge(headers: &HeaderMap) -> Option<DigestChallenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(DigestChallenge::parse)
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use std::fmt;

/// An [`HttpClient`] wrapper that appends an API key as a URL query parameter.
///
/// The key is added at execution time, so URLs built and logged by callers
/// never contain it.
pub struct UrlParam<C> {
    inner: C,
    param_name: String,
    key: String,
}

impl<C> UrlParam<C> {
    pub fn new(inner: C, param_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            inner,
            param_name: param_name.into(),
            key: key.into(),
        }
    }
}

impl<C> fmt::Debug for UrlParam<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlParam")
            .field("param_name", &self.param_name)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the outgoing URL, then fails against an unroutable port.
    #[derive(Default)]
    struct Recorder {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpClient for Recorder {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.urls.lock().unwrap().push(req.url().to_string());
            reqwest::Client::new().execute(req).await
        }
    }

    #[tokio::test]
    async fn test_key_is_appended_to_query() {
        let client = UrlParam::new(Recorder::default(), "appid", "s3cret");
        let url = "http://127.0.0.1:9/air_pollution?lat=13.75&lon=100.5".parse().unwrap();
        let req = reqwest::Request::new(reqwest::Method::GET, url);

        let _ = client.execute(req).await;

        let urls = client.inner.urls.lock().unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].ends_with("lat=13.75&lon=100.5&appid=s3cret"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = UrlParam::new(Recorder::default(), "appid", "s3cret");
        let printed = format!("{client:?}");
        assert!(printed.contains("appid"));
        assert!(!printed.contains("s3cret"));
    }
}

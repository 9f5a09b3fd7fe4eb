use reqwest::{header::HeaderMap, Proxy};
use std::time::Duration;

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
}

impl Client {
    pub fn new(proxy_url: Option<String>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7".parse()?);
        headers.insert("accept-language", "en,zh-CN;q=0.9,zh;q=0.8".parse()?);
        headers.insert("user-agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".parse()?);

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .http2_adaptive_window(true)
            .use_rustls_tls()
            .cookie_store(true)
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(30));

        if let Some(p) = proxy_url.filter(|s| !s.is_empty()) {
            builder = builder.proxy(Proxy::all(p)?);
        }

        let http = builder.build()?;
        Ok(Self { http })
    }

    // 带单次请求超时的 GET，图片下载用它限定等待上限
    pub async fn get_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> anyhow::Result<reqwest::Response> {
        Ok(self.http.get(url).timeout(timeout).send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_with_timeout_returns_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let client = Client::new(None).unwrap();
        let resp = client
            .get_with_timeout(&format!("{}/page", server.uri()), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_get_with_timeout_enforces_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = Client::new(None).unwrap();
        let result = client
            .get_with_timeout(&format!("{}/slow", server.uri()), Duration::from_millis(200))
            .await;
        assert!(result.is_err(), "超时必须按错误返回");
    }
}

/// E-utilities API 客户端
///
/// 封装 esearch / epost / einfo 三个远程调用：
/// 限流 → HTTP 请求 → 状态码校验 → 按 Content-Type 解析
use crate::clients::response::{
    parse_info_xml, parse_post_xml, parse_search_json, parse_search_xml, ContentKind, DbInfo,
    Reply, SearchHandle, SearchResult,
};
use crate::config::Config;
use crate::error::ApiError;
use crate::infrastructure::RateLimiter;
use crate::models::SortOrder;
use reqwest::header::CONTENT_TYPE;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 默认检索的数据库
pub const DEFAULT_DATABASE: &str = "pubmed";

/// 上报给 NCBI 的工具名
const TOOL_NAME: &str = "bestmatch_bias";

/// 连接失败时的最大重试次数
const MAX_CONNECT_RETRIES: u32 = 3;

/// 第一次重试前的等待时间，之后每次翻倍
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// 一次 esearch 请求
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub database: &'a str,
    pub term: &'a str,
    pub sort: Option<SortOrder>,
    pub max_results: usize,
    /// 指定后在历史服务器的结果集内检索
    pub reuse: Option<&'a SearchHandle>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(term: &'a str, sort: SortOrder, max_results: usize) -> Self {
        Self {
            database: DEFAULT_DATABASE,
            term,
            sort: Some(sort),
            max_results,
            reuse: None,
        }
    }

    pub fn with_reuse(mut self, handle: &'a SearchHandle) -> Self {
        self.reuse = Some(handle);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Post,
}

/// 一次 HTTP 往返的原始结果
struct RawResponse {
    url: String,
    content_type: String,
    body: Vec<u8>,
}

/// E-utilities 客户端
///
/// 所有 worker 共享同一个实例（以及其中的限流器和调用计数）
pub struct EutilsClient {
    http: reqwest::Client,
    prefix: String,
    api_key: Option<String>,
    email: Option<String>,
    limiter: Arc<RateLimiter>,
    call_count: AtomicU64,
}

impl EutilsClient {
    /// 根据配置创建客户端，限流器按 `rate_limit` 创建
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let limiter = Arc::new(RateLimiter::per_second(config.rate_limit));
        Self::with_limiter(config, limiter)
    }

    /// 使用外部传入的限流器创建客户端
    pub fn with_limiter(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::ClientInit)?;

        Ok(Self {
            http,
            prefix: config.api_prefix.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            email: config.email.clone(),
            limiter,
            call_count: AtomicU64::new(0),
        })
    }

    /// 已完成的 HTTP 往返次数
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// 检索
    ///
    /// 响应中嵌入的错误放在 `SearchResult::errors` 里，不会返回 `Err`
    pub async fn search(
        &self,
        request: &SearchRequest<'_>,
    ) -> Result<Reply<SearchResult>, ApiError> {
        let mut params = self.base_params(Some(request.database));
        params.push(("term", request.term.to_string()));
        params.push(("retmax", request.max_results.to_string()));
        if let Some(sort) = request.sort {
            params.push(("sort", sort.as_param().to_string()));
        }
        if let Some(handle) = request.reuse {
            params.push(("usehistory", "y".to_string()));
            params.push(("WebEnv", handle.web_env.clone()));
            params.push(("query_key", handle.query_key.clone()));
        }

        debug!("esearch 检索式长度: {} 字符", request.term.len());
        let raw = self.send("esearch.fcgi", Verb::Post, &params).await?;

        let reply = match ContentKind::from_header(&raw.content_type) {
            ContentKind::Xml => {
                let data = parse_search_xml(&String::from_utf8_lossy(&raw.body));
                Reply::Parsed { raw: raw.body, data }
            }
            ContentKind::Json => match parse_search_json(&raw.body) {
                Some(data) => Reply::Parsed { raw: raw.body, data },
                None => Reply::Unparsed {
                    raw: raw.body,
                    content_type: raw.content_type,
                },
            },
            ContentKind::Other => Reply::Unparsed {
                raw: raw.body,
                content_type: raw.content_type,
            },
        };

        Ok(reply)
    }

    /// 把一批 ID 注册到历史服务器，返回可复用的句柄
    pub async fn register(
        &self,
        database: &str,
        identifiers: &[String],
    ) -> Result<SearchHandle, ApiError> {
        let mut params = self.base_params(Some(database));
        params.push(("id", identifiers.join(",")));

        debug!("epost 注册 {} 个 ID", identifiers.len());
        let raw = self.send("epost.fcgi", Verb::Post, &params).await?;

        let parsed = match ContentKind::from_header(&raw.content_type) {
            ContentKind::Xml => parse_post_xml(&String::from_utf8_lossy(&raw.body)),
            _ => {
                return Err(ApiError::MissingHistoryHandle {
                    url: raw.url,
                    errors: vec![format!("无法解析的响应类型: {}", raw.content_type)],
                })
            }
        };

        parsed.handle.ok_or(ApiError::MissingHistoryHandle {
            url: raw.url,
            errors: parsed.errors,
        })
    }

    /// 获取数据库信息，`database` 为空时返回数据库列表
    pub async fn info(&self, database: Option<&str>) -> Result<Reply<DbInfo>, ApiError> {
        let params = self.base_params(database);
        let raw = self.send("einfo.fcgi", Verb::Get, &params).await?;

        let reply = match ContentKind::from_header(&raw.content_type) {
            ContentKind::Xml => {
                let data = parse_info_xml(&String::from_utf8_lossy(&raw.body));
                Reply::Parsed { raw: raw.body, data }
            }
            _ => Reply::Unparsed {
                raw: raw.body,
                content_type: raw.content_type,
            },
        };

        Ok(reply)
    }

    /// 公共参数
    fn base_params(&self, database: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(8);
        if let Some(db) = database {
            params.push(("db", db.to_string()));
        }
        params.push(("retmode", "xml".to_string()));
        params.push(("tool", TOOL_NAME.to_string()));
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        params
    }

    /// 发送请求
    ///
    /// 每次尝试前都要先拿到令牌；只有连接失败才重试
    async fn send(
        &self,
        endpoint: &str,
        verb: Verb,
        params: &[(&'static str, String)],
    ) -> Result<RawResponse, ApiError> {
        let url = format!("{}/eutils/{}", self.prefix, endpoint);
        let mut attempt = 0;

        let response = loop {
            self.limiter.acquire().await;

            let request = match verb {
                Verb::Get => self.http.get(&url).query(params),
                Verb::Post => self.http.post(&url).form(params),
            };

            match request.send().await {
                Ok(response) => break response,
                Err(e) if e.is_connect() && attempt < MAX_CONNECT_RETRIES => {
                    let backoff = CONNECT_BACKOFF * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        "连接 {} 失败 (尝试 {}/{}), 等待 {:?} 后重试: {}",
                        endpoint, attempt, MAX_CONNECT_RETRIES, backoff, e
                    );
                    sleep(backoff).await;
                }
                Err(source) => return Err(ApiError::RequestFailed { url, source }),
            }
        };

        self.call_count.fetch_add(1, Ordering::Relaxed);

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RemoteCallFailed {
                status: status.as_u16(),
                url,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(source) => return Err(ApiError::RequestFailed { url, source }),
        };

        debug!("{} 返回 {} 字节 ({})", endpoint, body.len(), content_type);

        Ok(RawResponse {
            url,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(api_key: Option<&str>, email: Option<&str>) -> EutilsClient {
        let config = Config {
            api_key: api_key.map(str::to_string),
            email: email.map(str::to_string),
            api_prefix: "http://127.0.0.1:9/entrez/".to_string(),
            ..Config::default()
        };
        EutilsClient::new(&config).unwrap()
    }

    #[test]
    fn test_base_params_include_credentials_when_set() {
        let client = client_with(Some("k123"), Some("me@example.org"));
        let params = client.base_params(Some("pubmed"));
        assert!(params.contains(&("db", "pubmed".to_string())));
        assert!(params.contains(&("retmode", "xml".to_string())));
        assert!(params.contains(&("api_key", "k123".to_string())));
        assert!(params.contains(&("email", "me@example.org".to_string())));
        assert_eq!(client.prefix, "http://127.0.0.1:9/entrez");
    }

    #[test]
    fn test_base_params_without_credentials() {
        let client = client_with(None, None);
        let params = client.base_params(None);
        assert!(params.iter().all(|(k, _)| *k != "api_key" && *k != "db"));
    }

    #[test]
    fn test_search_request_builder() {
        let handle = SearchHandle {
            web_env: "W".to_string(),
            query_key: "1".to_string(),
        };
        let request = SearchRequest::new("asthma", SortOrder::Relevance, 20).with_reuse(&handle);
        assert_eq!(request.database, DEFAULT_DATABASE);
        assert_eq!(request.reuse, Some(&handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_retries_with_backoff_then_fails() {
        // 绑定后立即释放，端口上没有监听者
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = Config {
            api_prefix: format!("http://127.0.0.1:{}/entrez", port),
            ..Config::default()
        };
        // 补充速率极低，消耗的令牌数就是尝试次数
        let limiter = Arc::new(RateLimiter::new(0.0001, 10.0));
        let client = EutilsClient::with_limiter(&config, limiter.clone()).unwrap();
        let started = tokio::time::Instant::now();

        let err = client
            .search(&SearchRequest::new("asthma", SortOrder::Relevance, 5))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RequestFailed { .. }));
        let used = 10.0 - limiter.available().await;
        assert!((used - 4.0).abs() < 0.05, "used {} tokens", used);
        // 500ms + 1s + 2s
        assert!(started.elapsed() >= Duration::from_millis(3500));
        assert_eq!(client.call_count(), 0);
    }
}

//! E-utilities 响应解析
//!
//! 按 Content-Type 决定是否解析：
//! - `text/xml` → 解析为结构化数据
//! - `application/json`（仅 esearch）→ 解析 `esearchresult`
//! - 其他 → 只保留原始字节
//!
//! 响应中嵌入的错误元素（`ERROR`、`ErrorList`）被收集为字符串，不作为 `Err` 返回

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// 远程响应
#[derive(Debug, Clone)]
pub enum Reply<T> {
    /// 已解析
    Parsed { raw: Vec<u8>, data: T },
    /// 无法识别的内容类型，只保留原始字节
    Unparsed { raw: Vec<u8>, content_type: String },
}

impl<T> Reply<T> {
    /// 原始响应体
    pub fn raw(&self) -> &[u8] {
        match self {
            Reply::Parsed { raw, .. } | Reply::Unparsed { raw, .. } => raw,
        }
    }

    pub fn parsed(&self) -> Option<&T> {
        match self {
            Reply::Parsed { data, .. } => Some(data),
            Reply::Unparsed { .. } => None,
        }
    }
}

/// 历史服务器上的结果集句柄，只在同一会话内有效
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHandle {
    pub web_env: String,
    pub query_key: String,
}

/// esearch 结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// 索引报告的总命中数，缺失时为 0
    pub matched_count: u64,
    /// 实际返回的 ID
    pub identifiers: Vec<String>,
    /// 嵌入的错误信息
    pub errors: Vec<String>,
    /// 使用 usehistory 时返回的句柄
    pub history: Option<SearchHandle>,
}

/// epost 结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostResult {
    pub handle: Option<SearchHandle>,
    pub errors: Vec<String>,
}

/// einfo 结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbInfo {
    pub db_name: Option<String>,
    pub count: Option<u64>,
    pub last_update: Option<String>,
    /// 不指定数据库时返回的数据库列表
    pub db_list: Vec<String>,
}

/// 响应体格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Xml,
    Json,
    Other,
}

impl ContentKind {
    pub fn from_header(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/xml" | "application/xml" => ContentKind::Xml,
            "application/json" | "text/json" => ContentKind::Json,
            _ => ContentKind::Other,
        }
    }
}

struct Patterns {
    count: Regex,
    id_list: Regex,
    id: Regex,
    error: Regex,
    error_list: Regex,
    element: Regex,
    web_env: Regex,
    query_key: Regex,
    db_name: Regex,
    db_list: Regex,
    last_update: Regex,
    char_ref: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("内置正则表达式无效");
        Patterns {
            count: re(r"<Count>\s*(\d+)\s*</Count>"),
            id_list: re(r"(?s)<IdList>(.*?)</IdList>"),
            id: re(r"<Id>\s*([^<\s]+)\s*</Id>"),
            error: re(r"(?s)<ERROR>(.*?)</ERROR>"),
            error_list: re(r"(?s)<ErrorList>(.*?)</ErrorList>"),
            element: re(r"(?s)<(\w+)>([^<]*)</\w+>"),
            web_env: re(r"<WebEnv>\s*([^<]+?)\s*</WebEnv>"),
            query_key: re(r"<QueryKey>\s*([^<]+?)\s*</QueryKey>"),
            db_name: re(r"<DbName>\s*([^<]+?)\s*</DbName>"),
            db_list: re(r"(?s)<DbList>(.*?)</DbList>"),
            last_update: re(r"<LastUpdate>\s*([^<]+?)\s*</LastUpdate>"),
            char_ref: re(r"&#(x[0-9a-fA-F]+|[0-9]+);"),
        }
    })
}

fn first_capture(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
}

/// 还原 XML 预定义实体和数字字符引用
///
/// `&amp;` 最后处理，`&amp;#39;` 还原为字面量 `&#39;`
fn unescape(text: &str) -> String {
    let named = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");

    let numeric = patterns().char_ref.replace_all(&named, |c: &regex::Captures| {
        let code = &c[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| c[0].to_string())
    });

    numeric.replace("&amp;", "&")
}

/// 收集 `ERROR` 元素与 `ErrorList` 子元素的文本
fn embedded_errors(body: &str) -> Vec<String> {
    let p = patterns();
    let mut errors: Vec<String> = p
        .error
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| unescape(m.as_str().trim()))
        .filter(|s| !s.is_empty())
        .collect();

    for list in p.error_list.captures_iter(body) {
        let Some(inner) = list.get(1) else { continue };
        for item in p.element.captures_iter(inner.as_str()) {
            let text = unescape(item[2].trim());
            if !text.is_empty() {
                errors.push(format!("{}: {}", &item[1], text));
            }
        }
    }

    errors
}

fn history_handle(web_env: Option<String>, query_key: Option<String>) -> Option<SearchHandle> {
    match (web_env, query_key) {
        (Some(web_env), Some(query_key)) => Some(SearchHandle { web_env, query_key }),
        _ => None,
    }
}

/// 解析 eSearchResult XML
pub fn parse_search_xml(body: &str) -> SearchResult {
    let p = patterns();

    // 只在 TranslationStack 之前找顶层 Count，缺失时不能误用词项的 Count
    let head = body.split("<TranslationStack>").next().unwrap_or_default();
    let matched_count = first_capture(&p.count, head)
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);

    let identifiers = p
        .id_list
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|list| {
            p.id.captures_iter(list.as_str())
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default();

    SearchResult {
        matched_count,
        identifiers,
        errors: embedded_errors(body),
        history: history_handle(
            first_capture(&p.web_env, body),
            first_capture(&p.query_key, body),
        ),
    }
}

/// 解析 retmode=json 的 esearch 响应，不是合法 JSON 时返回 None
pub fn parse_search_json(body: &[u8]) -> Option<SearchResult> {
    let root: Value = serde_json::from_slice(body).ok()?;
    let mut result = SearchResult::default();

    if let Some(err) = root.get("error").and_then(|v| v.as_str()) {
        result.errors.push(err.to_string());
    }

    let Some(es) = root.get("esearchresult") else {
        return Some(result);
    };

    result.matched_count = match es.get("count") {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    };

    if let Some(ids) = es.get("idlist").and_then(|v| v.as_array()) {
        result.identifiers = ids
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
    }

    if let Some(err) = es.get("ERROR").and_then(|v| v.as_str()) {
        result.errors.push(err.to_string());
    }

    if let Some(list) = es.get("errorlist").and_then(|v| v.as_object()) {
        for (kind, items) in list {
            for item in items.as_array().into_iter().flatten() {
                if let Some(text) = item.as_str().filter(|t| !t.is_empty()) {
                    result.errors.push(format!("{}: {}", kind, text));
                }
            }
        }
    }

    let text = |key: &str| es.get(key).and_then(|v| v.as_str()).map(str::to_string);
    result.history = history_handle(text("webenv"), text("querykey"));

    Some(result)
}

/// 解析 ePostResult XML
pub fn parse_post_xml(body: &str) -> PostResult {
    let p = patterns();
    PostResult {
        handle: history_handle(
            first_capture(&p.web_env, body),
            first_capture(&p.query_key, body),
        ),
        errors: embedded_errors(body),
    }
}

/// 解析 eInfoResult XML
pub fn parse_info_xml(body: &str) -> DbInfo {
    let p = patterns();

    if let Some(list) = p.db_list.captures(body).and_then(|c| c.get(1)) {
        return DbInfo {
            db_list: p
                .db_name
                .captures_iter(list.as_str())
                .map(|c| c[1].to_string())
                .collect(),
            ..Default::default()
        };
    }

    DbInfo {
        db_name: first_capture(&p.db_name, body),
        count: first_capture(&p.count, body).and_then(|c| c.parse().ok()),
        last_update: first_capture(&p.last_update, body),
        db_list: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE eSearchResult PUBLIC "-//NLM//DTD esearch 20060628//EN" "https://eutils.ncbi.nlm.nih.gov/eutils/dtd/20060628/esearch.dtd">
<eSearchResult><Count>1234</Count><RetMax>3</RetMax><RetStart>0</RetStart><QueryKey>1</QueryKey><WebEnv>MCID_abc</WebEnv><IdList>
<Id>38000001</Id>
<Id>38000002</Id>
<Id>38000003</Id>
</IdList><TranslationSet/><TranslationStack>   <TermSet>    <Term>asthma[All Fields]</Term>    <Field>All Fields</Field>    <Count>99999</Count>    <Explode>N</Explode>   </TermSet>   </TranslationStack><QueryTranslation>asthma[All Fields]</QueryTranslation></eSearchResult>
"#;

    #[test]
    fn test_parse_search_xml() {
        let result = parse_search_xml(SEARCH_XML);
        assert_eq!(result.matched_count, 1234);
        assert_eq!(result.identifiers, vec!["38000001", "38000002", "38000003"]);
        assert!(result.errors.is_empty());
        assert_eq!(
            result.history,
            Some(SearchHandle {
                web_env: "MCID_abc".to_string(),
                query_key: "1".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_search_xml_with_embedded_errors() {
        let body = r#"<eSearchResult><Count>0</Count><RetMax>0</RetMax><IdList/>
<ErrorList><PhraseNotFound>zzqx</PhraseNotFound><FieldNotFound></FieldNotFound></ErrorList>
<ERROR>Invalid query &amp; syntax</ERROR></eSearchResult>"#;
        let result = parse_search_xml(body);
        assert_eq!(result.matched_count, 0);
        assert!(result.identifiers.is_empty());
        assert_eq!(
            result.errors,
            vec!["Invalid query & syntax", "PhraseNotFound: zzqx"]
        );
    }

    #[test]
    fn test_missing_count_defaults_to_zero() {
        let result = parse_search_xml("<eSearchResult><ERROR>boom</ERROR></eSearchResult>");
        assert_eq!(result.matched_count, 0);
        assert_eq!(result.errors, vec!["boom"]);
        assert_eq!(result.history, None);
    }

    #[test]
    fn test_count_ignores_translation_stack() {
        let body = "<eSearchResult><ERROR>Search Backend failed</ERROR><TranslationStack><TermSet><Term>asthma</Term><Count>99999</Count></TermSet></TranslationStack></eSearchResult>";
        let result = parse_search_xml(body);
        assert_eq!(result.matched_count, 0);
        assert_eq!(result.errors, vec!["Search Backend failed"]);
    }

    #[test]
    fn test_unescape_character_references() {
        assert_eq!(unescape("Phrase &#39;foo&#x27; not found"), "Phrase 'foo' not found");
        assert_eq!(unescape("a &amp;#39; b &lt;c&gt;"), "a &#39; b <c>");
        assert_eq!(unescape("bad &#xZZ; &#1114112;"), "bad &#xZZ; &#1114112;");

        let body = "<eSearchResult><Count>0</Count><ERROR>Term &#39;zzqx&#39; invalid</ERROR></eSearchResult>";
        assert_eq!(parse_search_xml(body).errors, vec!["Term 'zzqx' invalid"]);
    }

    #[test]
    fn test_parse_search_json() {
        let body = br#"{"header":{"type":"esearch"},"esearchresult":{"count":"42","retmax":"2","idlist":["11","12"],"errorlist":{"phrasesnotfound":["foo"],"fieldsnotfound":[]},"webenv":"W","querykey":"3"}}"#;
        let result = parse_search_json(body).unwrap();
        assert_eq!(result.matched_count, 42);
        assert_eq!(result.identifiers, vec!["11", "12"]);
        assert_eq!(result.errors, vec!["phrasesnotfound: foo"]);
        assert_eq!(result.history.unwrap().query_key, "3");
    }

    #[test]
    fn test_parse_search_json_rejects_garbage() {
        assert!(parse_search_json(b"<html>").is_none());
    }

    #[test]
    fn test_parse_post_xml() {
        let body = "<ePostResult>\n<QueryKey>1</QueryKey>\n<WebEnv>NCID_01_xyz</WebEnv>\n</ePostResult>";
        let result = parse_post_xml(body);
        assert_eq!(result.handle.unwrap().web_env, "NCID_01_xyz");
        assert!(result.errors.is_empty());

        let failed = parse_post_xml("<ePostResult><ERROR>IDs contain invalid characters</ERROR></ePostResult>");
        assert!(failed.handle.is_none());
        assert_eq!(failed.errors.len(), 1);
    }

    #[test]
    fn test_parse_info_xml() {
        let body = "<eInfoResult><DbInfo><DbName>pubmed</DbName><MenuName>PubMed</MenuName><Count>36000000</Count><LastUpdate>2024/01/01 03:00</LastUpdate><FieldList/></DbInfo></eInfoResult>";
        let info = parse_info_xml(body);
        assert_eq!(info.db_name.as_deref(), Some("pubmed"));
        assert_eq!(info.count, Some(36_000_000));
        assert_eq!(info.last_update.as_deref(), Some("2024/01/01 03:00"));

        let list = parse_info_xml("<eInfoResult><DbList><DbName>pubmed</DbName><DbName>pmc</DbName></DbList></eInfoResult>");
        assert_eq!(list.db_list, vec!["pubmed", "pmc"]);
        assert!(list.db_name.is_none());
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(ContentKind::from_header("text/xml; charset=UTF-8"), ContentKind::Xml);
        assert_eq!(ContentKind::from_header("application/json"), ContentKind::Json);
        assert_eq!(ContentKind::from_header("text/html"), ContentKind::Other);
    }

    #[test]
    fn test_reply_accessors() {
        let reply: Reply<SearchResult> = Reply::Unparsed {
            raw: b"oops".to_vec(),
            content_type: "text/html".to_string(),
        };
        assert_eq!(reply.raw(), b"oops");
        assert!(reply.parsed().is_none());
    }
}

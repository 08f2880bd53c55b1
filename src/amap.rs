use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const AMAP_BASE_URL: &str = "https://restapi.amap.com/v3";
const PAGE_SIZE: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider status codes and what they mean.
const AMAP_ERROR_MESSAGES: &[(&str, &str)] = &[
    ("10001", "API密钥不正确或过期"),
    ("10002", "请求过于频繁"),
    ("10003", "访问已超出日配额"),
    ("10004", "单位时间内访问过于频繁"),
    ("10005", "IP白名单出错，发送请求的服务器IP不在IP白名单内"),
    ("10006", "绑定域名出错，当前API的请求域名与绑定域名不符"),
    ("10007", "数字签名未通过验证"),
    ("10008", "MD5安全码未通过验证"),
    ("10009", "请求key与绑定平台不符"),
    ("10010", "IP访问超限"),
    ("10011", "服务不支持https请求"),
    ("10012", "权限不足，服务请求被拒绝"),
    ("10013", "Key被删除"),
    ("20000", "请求参数非法"),
    ("20001", "缺少必填参数"),
    ("20002", "请求协议非法"),
    ("20003", "其他未知错误"),
];

const RATE_LIMIT_CODES: &[&str] = &["10002", "10004", "10010", "10021"];
const QPS_EXCEEDED: &str = "CUQPS_HAS_EXCEEDED_THE_LIMIT";

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("高德地图API错误 ({code}): {}", describe_status(.code, .info.as_deref()))]
    Provider { code: String, info: Option<String> },

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("place search request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl PlaceError {
    /// True when the provider throttled the request.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            PlaceError::Provider { code, info } => {
                RATE_LIMIT_CODES.contains(&code.as_str())
                    || info.as_deref().is_some_and(|i| i.contains(QPS_EXCEEDED))
            }
            PlaceError::Status(status) => *status == 429,
            PlaceError::Http(_) => false,
        }
    }
}

fn describe_status(code: &str, info: Option<&str>) -> String {
    AMAP_ERROR_MESSAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| message.to_string())
        .or_else(|| info.map(str::to_string))
        .unwrap_or_else(|| "未知错误".to_string())
}

/// A decoded `"lng,lat"` position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

/// Decodes the provider's `"lng,lat"` token. Parts after the second are
/// ignored; anything without two leading finite numbers yields `None`.
pub fn parse_location(location: Option<&str>) -> Option<Coordinate> {
    let mut parts = location?.split(',');
    let (lng, lat) = (parts.next()?, parts.next()?);
    let lng: f64 = lng.trim().parse().ok()?;
    let lat: f64 = lat.trim().parse().ok()?;
    (lng.is_finite() && lat.is_finite()).then_some(Coordinate { lng, lat })
}

/// The provider returns `[]` instead of a string for missing text fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TextField {
    Text(String),
    List(Vec<String>),
}

impl TextField {
    fn into_text(self) -> Option<String> {
        let text = match self {
            TextField::Text(text) => text,
            TextField::List(parts) => parts.join(""),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

fn text_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let field: Option<TextField> = Option::deserialize(deserializer)?;
    Ok(field.and_then(TextField::into_text))
}

/// One place record as returned by the place search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceCandidate {
    #[serde(default, deserialize_with = "text_field")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "text_field")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub cityname: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "text_field")]
    pub kind: Option<String>,
}

impl PlaceCandidate {
    pub fn coordinate(&self) -> Option<Coordinate> {
        parse_location(self.location.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct PlaceSearchResponse {
    status: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    infocode: Option<String>,
    #[serde(default)]
    pois: Option<Vec<PlaceCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    infocode: Option<String>,
    #[serde(default)]
    geocodes: Option<Vec<Geocode>>,
}

#[derive(Debug, Deserialize)]
struct Geocode {
    #[serde(default, deserialize_with = "text_field")]
    location: Option<String>,
}

/// Keyword search over a place database.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(
        &self,
        keyword: &str,
        city: Option<&str>,
    ) -> Result<Vec<PlaceCandidate>, PlaceError>;
}

/// Client for the AMap web service API
#[derive(Clone)]
pub struct AmapClient {
    http: reqwest::Client,
    key: String,
    base_url: String,
}

impl AmapClient {
    pub fn new(key: impl Into<String>) -> Result<Self, PlaceError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            key: key.into(),
            base_url: AMAP_BASE_URL.to_string(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let query = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!(
            "{}/{}?key={}&{}",
            self.base_url,
            path,
            urlencoding::encode(&self.key),
            query
        )
    }

    async fn get_text(&self, url: &str) -> Result<String, PlaceError> {
        debug!("GET {}", url.replace(&self.key, "***API_KEY***"));

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlaceError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    /// Resolves a free-form address to a coordinate.
    pub async fn geocode(
        &self,
        address: &str,
        city: Option<&str>,
    ) -> Result<Option<Coordinate>, PlaceError> {
        let url = self.url(
            "geocode/geo",
            &[
                ("address", address.trim()),
                ("city", city.map(str::trim).unwrap_or("")),
            ],
        );
        let body = self.get_text(&url).await?;
        decode_geocode(&body)
    }
}

#[async_trait]
impl PlaceSearch for AmapClient {
    async fn search(
        &self,
        keyword: &str,
        city: Option<&str>,
    ) -> Result<Vec<PlaceCandidate>, PlaceError> {
        let offset = PAGE_SIZE.to_string();
        let url = self.url(
            "place/text",
            &[
                ("keywords", keyword.trim()),
                ("city", city.map(str::trim).unwrap_or("")),
                ("offset", offset.as_str()),
                ("page", "1"),
                ("extensions", "base"),
            ],
        );
        let body = self.get_text(&url).await?;
        let candidates = decode_place_search(&body)?;
        info!("Place search '{}' returned {} candidates", keyword, candidates.len());
        Ok(candidates)
    }
}

/// Decodes a place-search body. A body that does not look like a place
/// search response counts as zero results.
fn decode_place_search(body: &str) -> Result<Vec<PlaceCandidate>, PlaceError> {
    let parsed: PlaceSearchResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unexpected place search response: {}", e);
            return Ok(Vec::new());
        }
    };

    if parsed.status != "1" {
        return Err(PlaceError::Provider {
            code: parsed.infocode.unwrap_or(parsed.status),
            info: parsed.info,
        });
    }
    Ok(parsed.pois.unwrap_or_default())
}

fn decode_geocode(body: &str) -> Result<Option<Coordinate>, PlaceError> {
    let parsed: GeocodeResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unexpected geocode response: {}", e);
            return Ok(None);
        }
    };

    if parsed.status != "1" {
        return Err(PlaceError::Provider {
            code: parsed.infocode.unwrap_or(parsed.status),
            info: parsed.info,
        });
    }
    Ok(parsed
        .geocodes
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|g| parse_location(g.location.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            parse_location(Some("116.397,39.909")),
            Some(Coordinate {
                lng: 116.397,
                lat: 39.909
            })
        );
        assert_eq!(
            parse_location(Some("116.3,39.9,10")),
            Some(Coordinate {
                lng: 116.3,
                lat: 39.9
            })
        );
        assert_eq!(parse_location(Some("abc,39.9")), None);
        assert_eq!(parse_location(Some("116.397")), None);
        assert_eq!(parse_location(Some("inf,39.9")), None);
        assert_eq!(parse_location(Some("NaN,39.9")), None);
        assert_eq!(parse_location(None), None);
    }

    #[test]
    fn test_decode_place_search_accepts_array_fields() {
        let body = r#"{
            "status": "1",
            "info": "OK",
            "count": "2",
            "pois": [
                {"id": "B001", "name": "中山陵", "address": "石象路7号", "location": "118.848,32.064", "cityname": "南京市", "type": "风景名胜"},
                {"name": "无名地点", "address": [], "location": "118.8,32.0", "cityname": []}
            ]
        }"#;

        let pois = decode_place_search(body).unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].cityname.as_deref(), Some("南京市"));
        assert_eq!(pois[0].kind.as_deref(), Some("风景名胜"));
        assert_eq!(pois[1].address, None);
        assert_eq!(pois[1].cityname, None);
        assert!(pois[1].coordinate().is_some());
    }

    #[test]
    fn test_decode_place_search_provider_error() {
        let err = decode_place_search(r#"{"status": "0", "info": "INVALID_USER_KEY", "infocode": "10001"}"#)
            .unwrap_err();
        assert!(matches!(err, PlaceError::Provider { ref code, .. } if code == "10001"));
        assert!(!err.is_rate_limited());
        assert_eq!(err.to_string(), "高德地图API错误 (10001): API密钥不正确或过期");
    }

    #[test]
    fn test_rate_limit_detection() {
        let by_code = PlaceError::Provider {
            code: "10004".to_string(),
            info: None,
        };
        assert!(by_code.is_rate_limited());

        let by_info = PlaceError::Provider {
            code: "10021".to_string(),
            info: Some(QPS_EXCEEDED.to_string()),
        };
        assert!(by_info.is_rate_limited());
        assert_eq!(
            by_info.to_string(),
            "高德地图API错误 (10021): CUQPS_HAS_EXCEEDED_THE_LIMIT"
        );

        assert!(!PlaceError::Status(500).is_rate_limited());
    }

    #[test]
    fn test_malformed_body_is_empty() {
        assert!(decode_place_search("<html>busy</html>").unwrap().is_empty());

        let err = decode_place_search(r#"{"status": "0", "info": "SERVICE_BUSY"}"#).unwrap_err();
        assert_eq!(err.to_string(), "高德地图API错误 (0): SERVICE_BUSY");
        assert_eq!(decode_geocode("not json").unwrap(), None);
    }

    #[test]
    fn test_decode_geocode() {
        let body = r#"{"status": "1", "geocodes": [{"formatted_address": "北京市东城区", "location": "116.407,39.904"}]}"#;
        assert_eq!(
            decode_geocode(body).unwrap(),
            Some(Coordinate {
                lng: 116.407,
                lat: 39.904
            })
        );
        assert_eq!(decode_geocode(r#"{"status": "1", "geocodes": []}"#).unwrap(), None);
    }

    #[test]
    fn test_url_encodes_params() {
        let client = AmapClient::new("k3y").unwrap();
        let url = client.url("place/text", &[("keywords", "南京 夫子庙"), ("city", "")]);
        assert!(url.starts_with("https://restapi.amap.com/v3/place/text?key=k3y&"));
        assert!(url.contains("keywords=%E5%8D%97%E4%BA%AC%20%E5%A4%AB%E5%AD%90%E5%BA%99"));
        assert!(url.ends_with("city="));
    }
}

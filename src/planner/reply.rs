//! Turns the model's free-text reply into a title, a description and the
//! list of place keywords to resolve.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

pub const MAX_KEYWORDS: usize = 10;
const MAX_KEYWORD_CHARS: usize = 50;
const MAX_FALLBACK_KEYWORDS: usize = 5;
const FALLBACK_PROMPT_CHARS: usize = 10;

pub const DETAIL_MARKER: &str = "【详细规划】";
const DETAIL_TITLE: &str = "详细规划";
const PLAN_TITLE: &str = "旅游行程规划";

/// Cities recognised when the reply gives no usable keywords.
const COMMON_PLACES: &[&str] = &[
    "北京", "上海", "广州", "深圳", "杭州", "南京", "苏州", "成都", "西安", "重庆",
];

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hard-coded pattern is valid")
}

static TITLE_MARKER: Lazy<Regex> = Lazy::new(|| regex(r"标题[:：]"));
static KEYWORDS_MARKER: Lazy<Regex> = Lazy::new(|| regex(r"关键景点[:：]"));
static DETAIL_TITLE_RE: Lazy<Regex> = Lazy::new(|| regex(r"【详细规划】(.+?)："));
static TITLE_RE: Lazy<Regex> = Lazy::new(|| regex(r"标题[:：]\s*(.+)"));
static KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| regex(r"关键景点[:：]\s*(.+)"));
static BODY_RE: Lazy<Regex> = Lazy::new(|| regex(r"📍\s*推荐景点[:：]([\s\S]*?)关键景点[:：]"));
static TITLE_LINE_RE: Lazy<Regex> = Lazy::new(|| regex(r"标题[:：][^\n]*\n"));
static KEYWORDS_LINE_RE: Lazy<Regex> = Lazy::new(|| regex(r"关键景点[:：][^\n]*"));
static KEYWORD_SEPARATORS: Lazy<Regex> = Lazy::new(|| regex(r"[,，、\n]"));

/// Markdown rewrites, applied in order.
static MARKDOWN_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (regex(r"\*\*([^*]+)\*\*"), "${1}"),
        (regex(r"\*([^*]+)\*"), "${1}"),
        (regex(r"(?m)^#+\s*"), ""),
        (regex(r"```[\s\S]*?```"), ""),
        (regex(r"`([^`]+)`"), "${1}"),
        (regex(r"(?m)^\s*[-*+]\s+"), "• "),
        (regex(r"(?m)^\s*\d+\.\s+"), ""),
        (regex(r"\[([^\]]+)\]"), "${1}"),
        (regex(r"【([^】]+)】"), "${1}"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// A follow-up about an itinerary that is already on screen.
    Contextual,
    /// A brand-new itinerary.
    FreshPlan,
}

/// What the pipeline keeps from one model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub mode: ReplyMode,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

pub fn detect_mode(raw: &str) -> ReplyMode {
    if raw.contains(DETAIL_MARKER) || (!TITLE_MARKER.is_match(raw) && !KEYWORDS_MARKER.is_match(raw)) {
        ReplyMode::Contextual
    } else {
        ReplyMode::FreshPlan
    }
}

/// Parses a model reply. `prompt` is only consulted for the keyword fallback
/// when a fresh plan lists no usable keywords.
pub fn parse_reply(raw: &str, prompt: &str) -> ParsedPlan {
    let mode = detect_mode(raw);
    let (title, description, keywords) = match mode {
        ReplyMode::Contextual => {
            let title = capture(&DETAIL_TITLE_RE, raw).unwrap_or(DETAIL_TITLE);
            debug!("Contextual reply, existing map markers stay as they are");
            (title, raw.trim().to_string(), Vec::new())
        }
        ReplyMode::FreshPlan => {
            let title = capture(&TITLE_RE, raw).unwrap_or(PLAN_TITLE);
            let description = match capture(&BODY_RE, raw) {
                Some(body) => body.to_string(),
                None => {
                    let without_title = TITLE_LINE_RE.replace(raw, "");
                    KEYWORDS_LINE_RE
                        .replace(&without_title, "")
                        .trim()
                        .to_string()
                }
            };

            let mut keywords = split_keywords(capture(&KEYWORDS_RE, raw).unwrap_or(""));
            if keywords.is_empty() {
                keywords = fallback_keywords(prompt);
                info!("No keywords in reply, falling back to {:?}", keywords);
            }
            (title, description, keywords)
        }
    };

    ParsedPlan {
        mode,
        title: clean_markdown(title),
        description: Some(clean_markdown(&description)),
        keywords,
    }
}

/// First capture group, trimmed, if it is not blank.
fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

pub fn split_keywords(text: &str) -> Vec<String> {
    KEYWORD_SEPARATORS
        .split(text)
        .map(str::trim)
        .filter(|k| !k.is_empty() && k.chars().count() < MAX_KEYWORD_CHARS)
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Keywords guessed from the prompt alone: well-known cities it mentions, or
/// else its opening characters.
pub fn fallback_keywords(prompt: &str) -> Vec<String> {
    let mut keywords: Vec<String> = COMMON_PLACES
        .iter()
        .filter(|place| prompt.contains(*place))
        .take(MAX_FALLBACK_KEYWORDS)
        .map(|place| place.to_string())
        .collect();

    if keywords.is_empty() {
        keywords.push(prompt.chars().take(FALLBACK_PROMPT_CHARS).collect());
    }
    keywords
}

/// Strips markdown decoration so the text reads cleanly in a chat bubble.
pub fn clean_markdown(text: &str) -> String {
    MARKDOWN_RULES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRESH_REPLY: &str = "标题：**南京三日游**
📍 推荐景点：
第1天：中山陵、明孝陵
第2天：夫子庙、秦淮河
关键景点：中山陵，明孝陵、夫子庙,秦淮河";

    #[test]
    fn test_fresh_plan() {
        let plan = parse_reply(FRESH_REPLY, "南京三日游");
        assert_eq!(plan.mode, ReplyMode::FreshPlan);
        assert_eq!(plan.title, "南京三日游");
        assert_eq!(
            plan.description.as_deref(),
            Some("第1天：中山陵、明孝陵\n第2天：夫子庙、秦淮河")
        );
        assert_eq!(plan.keywords, vec!["中山陵", "明孝陵", "夫子庙", "秦淮河"]);
    }

    #[test]
    fn test_contextual_reply() {
        let raw = "【详细规划】第4天：\n8:00-9:00 早餐\n9:00-12:00 玄武湖公园";
        let plan = parse_reply(raw, "第4天怎么玩");
        assert_eq!(plan.mode, ReplyMode::Contextual);
        assert_eq!(plan.title, "第4天");
        assert!(plan.keywords.is_empty());
        assert!(plan.description.unwrap().starts_with("详细规划第4天："));
    }

    #[test]
    fn test_reply_without_markers_is_contextual() {
        let plan = parse_reply("第二天可以早点出发。", "第二天呢");
        assert_eq!(plan.mode, ReplyMode::Contextual);
        assert_eq!(plan.title, "详细规划");
        assert_eq!(plan.description.as_deref(), Some("第二天可以早点出发。"));
        assert!(plan.keywords.is_empty());
    }

    #[test]
    fn test_detail_marker_wins_over_plan_markers() {
        let raw = "【详细规划】第2天安排：\n标题：不该用到\n关键景点：夫子庙";
        assert_eq!(detect_mode(raw), ReplyMode::Contextual);
    }

    #[test]
    fn test_fresh_plan_fallbacks() {
        let raw = "这是一个行程\n关键景点：西湖";
        let plan = parse_reply(raw, "杭州");
        assert_eq!(plan.mode, ReplyMode::FreshPlan);
        assert_eq!(plan.title, "旅游行程规划");
        assert_eq!(plan.description.as_deref(), Some("这是一个行程"));

        let raw = "标题：成都美食\n第1天：宽窄巷子\n关键景点：宽窄巷子";
        let plan = parse_reply(raw, "成都");
        assert_eq!(plan.description.as_deref(), Some("第1天：宽窄巷子"));
    }

    #[test]
    fn test_empty_keywords_fall_back_to_prompt() {
        let plan = parse_reply("标题：行程\n关键景点：", "想去北京和上海玩");
        assert_eq!(plan.keywords, vec!["北京", "上海"]);

        let plan = parse_reply("标题：行程", "去一个安静的小镇住几天看看风景");
        assert_eq!(plan.keywords, vec!["去一个安静的小镇住几"]);
    }

    #[test]
    fn test_keyword_bounds() {
        let long = "长".repeat(50);
        let many: Vec<String> = (0..15).map(|i| format!("景点{}", i)).collect();
        let text = format!("{}, ,,{}", long, many.join("，"));

        let keywords = split_keywords(&text);
        assert_eq!(keywords.len(), MAX_KEYWORDS);
        assert_eq!(keywords[0], "景点0");
        assert!(keywords.iter().all(|k| !k.is_empty() && k.chars().count() < 50));

        let just_fits = "短".repeat(49);
        assert_eq!(split_keywords(&just_fits), vec![just_fits.clone()]);
    }

    #[test]
    fn test_fallback_keywords_cap() {
        let prompt = "北京上海广州深圳杭州南京苏州";
        assert_eq!(
            fallback_keywords(prompt),
            vec!["北京", "上海", "广州", "深圳", "杭州"]
        );
    }

    #[test]
    fn test_clean_markdown() {
        let text = "## 行程\n**重点** 和 *提示*\n- 第一项\n* 第二项\n1. 编号\n`代码` [链接] 【提醒】\n```\nignored\n```";
        assert_eq!(
            clean_markdown(text),
            "行程\n重点 和 提示\n• 第一项\n• 第二项\n编号\n代码 链接 提醒"
        );
    }
}

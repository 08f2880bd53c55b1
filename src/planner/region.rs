//! Keyword tables that decide whether a request is in scope and which
//! administrative region it is about.
//!
//! Matching is plain substring containment with no word boundaries, so a
//! listed name inside an unrelated word also matches (e.g. "世界" inside
//! "世界之窗").

use tracing::debug;

/// Foreign countries, cities, regions and generic international-travel terms.
const INTERNATIONAL_KEYWORDS: &[&str] = &[
    // countries
    "日本", "韩国", "泰国", "新加坡", "马来西亚", "印尼", "越南", "菲律宾", "缅甸", "柬埔寨", "老挝",
    "美国", "加拿大", "英国", "法国", "德国", "意大利", "西班牙", "荷兰", "瑞士", "奥地利", "俄罗斯",
    "澳大利亚", "新西兰", "印度", "巴基斯坦", "孟加拉", "斯里兰卡", "尼泊尔", "不丹", "马尔代夫",
    "土耳其", "伊朗", "伊拉克", "沙特", "阿联酋", "埃及", "摩洛哥", "南非", "肯尼亚", "坦桑尼亚",
    "巴西", "阿根廷", "智利", "秘鲁", "墨西哥", "古巴", "牙买加",
    // cities
    "东京", "大阪", "京都", "横滨", "名古屋", "神户", "福冈", "札幌", "仙台", "广岛",
    "首尔", "釜山", "济州岛", "大邱", "仁川",
    "曼谷", "清迈", "普吉岛", "芭提雅", "华欣",
    "吉隆坡", "槟城", "兰卡威",
    "纽约", "洛杉矶", "拉斯维加斯", "旧金山", "芝加哥", "华盛顿", "波士顿", "迈阿密", "西雅图", "奥兰多",
    "伦敦", "巴黎", "罗马", "威尼斯", "佛罗伦萨", "巴塞罗那", "马德里", "阿姆斯特丹", "布鲁塞尔", "米兰",
    "柏林", "慕尼黑", "维也纳", "苏黎世", "莫斯科", "圣彼得堡", "布拉格", "布达佩斯",
    "悉尼", "墨尔本", "奥克兰", "布里斯班", "珀斯", "阿德莱德",
    "孟买", "新德里", "加尔各答", "班加罗尔", "金奈",
    "伊斯坦布尔", "安卡拉", "迪拜", "阿布扎比", "多哈", "科威特",
    "开罗", "亚历山大", "卡萨布兰卡", "马拉喀什",
    "里约热内卢", "圣保罗", "布宜诺斯艾利斯", "利马", "圣地亚哥",
    // states, provinces, islands
    "北海道", "本州", "四国", "九州", "冲绳",
    "加州", "纽约州", "佛州", "德州", "夏威夷",
    "巴厘岛", "爪哇岛", "苏门答腊",
    "西西里", "撒丁岛", "托斯卡纳",
    "巴伐利亚", "普罗旺斯", "安达卢西亚",
    "昆士兰", "新南威尔士", "维多利亚州",
    // continents and travel terms
    "欧洲", "北美", "南美", "非洲", "大洋洲", "中东", "东南亚", "南亚", "北欧", "西欧", "东欧",
    "出国", "国外", "海外", "境外", "签证", "护照", "免签", "落地签",
    "游轮", "邮轮", "国际航班", "跨国", "环球", "世界", "全球",
];

/// Colloquial multi-province regions and the province that stands in for them.
const REGION_ALIASES: &[(&str, &str)] = &[
    ("长三角", "江苏"),
    ("长江三角洲", "江苏"),
    ("珠三角", "广东"),
    ("珠江三角洲", "广东"),
    ("京津冀", "北京"),
    ("环渤海", "北京"),
    ("粤港澳", "广东"),
    ("大湾区", "广东"),
    ("东北", "辽宁"),
    ("西北", "陕西"),
    ("西南", "四川"),
    ("华北", "北京"),
    ("华东", "江苏"),
    ("华南", "广东"),
    ("华中", "湖北"),
];

const PROVINCES: &[&str] = &[
    "北京", "天津", "上海", "重庆", "河北", "山西", "辽宁", "吉林", "黑龙江",
    "江苏", "浙江", "安徽", "福建", "江西", "山东", "河南", "湖北", "湖南",
    "广东", "广西", "海南", "四川", "贵州", "云南", "西藏", "陕西", "甘肃",
    "青海", "宁夏", "新疆", "内蒙古", "台湾", "香港", "澳门",
];

const CITIES: &[&str] = &[
    "深圳", "广州",
    "杭州", "南京", "苏州", "成都", "西安", "武汉", "长沙", "郑州", "无锡", "宁波",
    "济南", "青岛", "大连", "沈阳", "哈尔滨", "长春", "石家庄", "太原", "呼和浩特",
    "南昌", "合肥", "福州", "厦门", "南宁", "海口", "昆明", "贵阳", "拉萨", "兰州",
    "西宁", "银川", "乌鲁木齐", "温州", "佛山", "东莞", "泉州", "惠州", "嘉兴",
    "烟台", "珠海", "镇江", "盐城", "金华", "台州", "绍兴", "湖州", "常州",
    "桂林", "丽江", "大理", "三亚", "张家界", "九寨沟", "黄山", "泰山", "庐山",
    "峨眉山", "普陀山", "五台山", "华山", "衡山", "恒山", "嵩山", "武当山",
    "承德", "秦皇岛", "威海", "日照", "洛阳", "开封", "平遥", "凤凰", "阳朔",
];

/// True when the prompt names a foreign destination or an international
/// travel term.
pub fn is_out_of_domain(prompt: &str) -> bool {
    let lowered = prompt.to_lowercase();
    INTERNATIONAL_KEYWORDS
        .iter()
        .find(|keyword| prompt.contains(*keyword) || lowered.contains(&keyword.to_lowercase()))
        .inspect(|keyword| debug!("Out-of-domain keyword '{}' in prompt", keyword))
        .is_some()
}

/// Finds the region a prompt is about: region aliases first, then provinces,
/// then cities. Within each tier the first listed match wins.
pub fn extract_region(prompt: &str) -> Option<&'static str> {
    if let Some((alias, province)) = REGION_ALIASES
        .iter()
        .find(|(alias, _)| prompt.contains(alias))
    {
        debug!("Region alias '{}' maps to '{}'", alias, province);
        return Some(*province);
    }

    PROVINCES
        .iter()
        .chain(CITIES)
        .find(|name| prompt.contains(*name))
        .copied()
}

/// Administrative suffixes that may or may not be spelled out.
const REGION_SUFFIXES: &[char] = &['市', '省'];

/// True when `field` names `region`, with or without a trailing
/// administrative suffix on either side ("南京" vs "南京市").
pub fn mentions_region(field: &str, region: &str) -> bool {
    if region.is_empty() {
        return false;
    }
    // "南京市" in a field already contains "南京", so only the suffixed
    // region needs a second look.
    field.contains(region)
        || region
            .strip_suffix(REGION_SUFFIXES)
            .is_some_and(|short| !short.is_empty() && field.contains(short))
}

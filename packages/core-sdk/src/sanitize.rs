use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*?>.*?</(script|style)>").unwrap());
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)</?[A-Za-z!][^>]*>").unwrap());
static OCTETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[a-fA-F0-9]{2}").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/**
 * \brief 清洗模型返回的文本，使其可直接作为 alt 属性值。
 * \details 去掉 script/style 及其内容与其余标签（仅匹配以字母、`/` 或 `!` 开头的标签，单独的 `<`、`>` 保留），控制字符视为空白，删除百分号编码字节，合并空白并去除首尾空白。
 */
pub fn sanitize_alt_text(raw: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(raw, "");
    let text = TAGS.replace_all(&text, "");
    let text: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let text = OCTETS.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

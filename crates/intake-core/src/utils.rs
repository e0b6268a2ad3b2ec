//! 通用工具函数

use regex::Regex;
use std::sync::OnceLock;

/// 缺失字段的占位符
pub const PLACEHOLDER_SYMBOL: &str = "－";
pub const PLACEHOLDER_NUMBER: &str = "－";
pub const PLACEHOLDER_BRANCH_NUMBER: &str = "00";
pub const PLACEHOLDER_BURDEN_RATIO: &str = "3割";
pub const PLACEHOLDER_INSURER_NUMBER: &str = "－";

fn leading_digits() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(\d+)").expect("static pattern"))
}

/// 去除首尾空白，空字符串视为缺失
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 缺失时使用占位符
pub fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    non_blank(value).unwrap_or(placeholder).to_string()
}

/// 解析年龄字段开头的数字，例如 "72歳" -> 72
pub fn parse_leading_age(value: &str) -> Option<u32> {
    leading_digits()
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 生成年龄显示字符串
pub fn age_label(age: u32) -> String {
    format!("{}歳", age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_age() {
        assert_eq!(parse_leading_age("72歳"), Some(72));
        assert_eq!(parse_leading_age(" 8"), Some(8));
        assert_eq!(parse_leading_age("45歳 (昭和55年生)"), Some(45));
        assert_eq!(parse_leading_age("歳"), None);
        assert_eq!(parse_leading_age(""), None);
    }

    #[test]
    fn test_non_blank_and_placeholder() {
        assert_eq!(non_blank(Some("  12 ")), Some("12"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);

        assert_eq!(or_placeholder(None, PLACEHOLDER_BRANCH_NUMBER), "00");
        assert_eq!(or_placeholder(Some("01"), PLACEHOLDER_BRANCH_NUMBER), "01");
        assert_eq!(age_label(70), "70歳");
    }
}

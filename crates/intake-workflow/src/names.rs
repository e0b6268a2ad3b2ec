//! 姓名匹配
//!
//! 读音、罗马字等等价判断属于外部文本处理能力，引擎只调用 `NameMatcher`。

/// 姓名匹配能力
pub trait NameMatcher {
    fn names_match(&self, input: &str, truth: &str) -> bool;
}

impl<F> NameMatcher for F
where
    F: Fn(&str, &str) -> bool,
{
    fn names_match(&self, input: &str, truth: &str) -> bool {
        self(input, truth)
    }
}

/// 默认实现：忽略空白、全角半角、片假名平假名和大小写差异后做精确比较
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedNameMatcher;

impl NameMatcher for NormalizedNameMatcher {
    fn names_match(&self, input: &str, truth: &str) -> bool {
        let input = normalize_name(input);
        !input.is_empty() && input == normalize_name(truth)
    }
}

/// 姓名规范化
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(fold_char)
        .flat_map(char::to_lowercase)
        .collect()
}

fn fold_char(c: char) -> char {
    match c {
        // 全角 ASCII
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        // 片假名 -> 平假名
        '\u{30A1}'..='\u{30F6}' => char::from_u32(c as u32 - 0x60).unwrap_or(c),
        _ => c,
    }
}

//! 数值强制转换
//!
//! 表单中的数值字段以原始文本保存。提交前按照宽松规则取出文本开头的数值部分，
//! 无法解析时得到非有限值（NaN），由调用方决定是否阻止提交。

use serde::Serializer;

/// 跳过前导空白和可选符号，返回 (符号, 剩余文本)
fn split_sign(input: &str) -> (f64, &str) {
    let trimmed = input.trim_start();
    if let Some(rest) = trimmed.strip_prefix('-') {
        (-1.0, rest)
    } else if let Some(rest) = trimmed.strip_prefix('+') {
        (1.0, rest)
    } else {
        (1.0, trimmed)
    }
}

/// 按整数规则解析文本前缀："42.9kg" -> 42，"abc" -> NaN
pub fn parse_int_prefix(input: &str) -> f64 {
    let (sign, rest) = split_sign(input);
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return f64::NAN;
    }
    match rest[..digits].parse::<f64>() {
        Ok(value) => sign * value,
        Err(_) => f64::NAN,
    }
}

/// 按浮点规则解析文本前缀："72.5 in" -> 72.5，".5" -> 0.5，"" -> NaN
pub fn parse_float_prefix(input: &str) -> f64 {
    let (sign, rest) = split_sign(input);
    if rest.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    let mut mantissa_digits = 0;

    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        mantissa_digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
            mantissa_digits += 1;
        }
        end = frac;
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }

    // 指数部分必须带至少一位数字才算数
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_digits_start = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits_start {
            end = exp;
        }
    }

    let prefix = rest[..end].trim_end_matches('.');
    let prefix = if prefix.is_empty() { "0" } else { prefix };
    match prefix.parse::<f64>() {
        Ok(value) => sign * value,
        Err(_) => f64::NAN,
    }
}

/// 整数字段的序列化：有限值写成整数，非有限值写成 null
pub fn serialize_whole<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// 浮点字段的序列化：非有限值写成 null
pub fn serialize_measure<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// 把数值格式化回表单文本，非有限值为空串
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        String::new()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

//! 外设应答解析
//!
//! 外设对每条请求最多回一行文本。测距请求的应答格式为 `Distance: <cm>`，
//! 其他应答（如 `OK`、调试输出）只用于日志。

/// 测距请求指令字
pub const DISTANCE_REQUEST: &str = "distance";

/// 测距应答前缀
const DISTANCE_PREFIX: &str = "Distance:";

/// 解析测距应答
///
/// 返回厘米为单位的距离；不是测距应答或数值无效时返回 `None`。
///
/// # Example
///
/// ```
/// use rover_protocol::parse_distance;
///
/// assert_eq!(parse_distance("Distance: 42"), Some(42));
/// assert_eq!(parse_distance("OK"), None);
/// ```
pub fn parse_distance(line: &str) -> Option<u32> {
    let line = line.trim();
    let start = line.find(DISTANCE_PREFIX)?;
    let value = line[start + DISTANCE_PREFIX.len()..].trim();
    // 部分固件会带单位，例如 "Distance: 42 cm"
    let digits = value.split_whitespace().next()?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance("Distance: 42"), Some(42));
        assert_eq!(parse_distance("Distance:7"), Some(7));
        assert_eq!(parse_distance("  Distance: 120 cm \r"), Some(120));
        assert_eq!(parse_distance("echo Distance: 3"), Some(3));
    }

    #[test]
    fn test_parse_distance_rejects_other_lines() {
        assert_eq!(parse_distance(""), None);
        assert_eq!(parse_distance("OK"), None);
        assert_eq!(parse_distance("Distance:"), None);
        assert_eq!(parse_distance("Distance: far"), None);
        assert_eq!(parse_distance("Distance: -5"), None);
    }
}

//! 十进制数位打包
//!
//! 状态码 `s` 与颜色码 `c` 在报文中是一个整数，每个十进制数位是一个独立的取值（0 位为最低位）。
//! 内存中使用 [`DigitCode`] 按位存储，只在序列化边界与整数互转。

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 每个打包整数保留的数位个数
pub const DIGIT_SLOTS: usize = 10;

/// 旧接口允许写入的最大数位值（10 会进位到高一位）
pub const MAX_LEGACY_DIGIT: i64 = 10;

const POW10: [i64; DIGIT_SLOTS + 1] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
];

fn check_value_and_index(value: i64, index: u32) -> Result<()> {
    if value < 0 {
        return Err(TrackError::invalid(format!(
            "packed value must be non-negative, got {value}"
        )));
    }
    if index as usize >= DIGIT_SLOTS {
        return Err(TrackError::invalid(format!(
            "digit index must be in [0, {}], got {index}",
            DIGIT_SLOTS - 1
        )));
    }
    Ok(())
}

/// 替换整数 `value` 中第 `index` 个十进制数位
///
/// `digit` 允许范围为 `[0, 10]`；写入 10 时会进位到高一位。
pub fn set_digit(value: i64, index: u32, digit: i64) -> Result<i64> {
    check_value_and_index(value, index)?;
    if !(0..=MAX_LEGACY_DIGIT).contains(&digit) {
        return Err(TrackError::invalid(format!(
            "digit value must be in [0, {MAX_LEGACY_DIGIT}], got {digit}"
        )));
    }

    let exp = POW10[index as usize];
    let remainder = value % exp;
    let upper = value / POW10[index as usize + 1];

    upper
        .checked_mul(10)
        .and_then(|v| v.checked_add(digit))
        .and_then(|v| v.checked_mul(exp))
        .and_then(|v| v.checked_add(remainder))
        .ok_or_else(|| TrackError::invalid(format!("packed value {value} overflows")))
}

/// 读取整数 `value` 中第 `index` 个十进制数位
pub fn get_digit(value: i64, index: u32) -> Result<i64> {
    check_value_and_index(value, index)?;
    Ok((value / POW10[index as usize]) % 10)
}

/// 按位存储的状态/颜色码
///
/// 每个槽位取值 0..=9。序列化时打包为旧格式整数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DigitCode {
    digits: [u8; DIGIT_SLOTS],
}

impl DigitCode {
    /// 全零码
    pub const ZERO: DigitCode = DigitCode {
        digits: [0; DIGIT_SLOTS],
    };

    /// 从打包整数创建
    pub fn new(value: i64) -> Result<Self> {
        Self::try_from(value)
    }

    /// 读取第 `index` 位
    pub fn digit(&self, index: usize) -> Result<u8> {
        self.digits
            .get(index)
            .copied()
            .ok_or_else(|| TrackError::invalid(format!("digit index out of range: {index}")))
    }

    /// 返回替换第 `index` 位后的新码
    pub fn with_digit(mut self, index: usize, digit: u8) -> Result<Self> {
        if digit > 9 {
            return Err(TrackError::invalid(format!(
                "digit value must be in [0, 9], got {digit}"
            )));
        }
        let slot = self
            .digits
            .get_mut(index)
            .ok_or_else(|| TrackError::invalid(format!("digit index out of range: {index}")))?;
        *slot = digit;
        Ok(self)
    }

    /// 打包为旧格式整数
    pub fn value(&self) -> i64 {
        self.digits
            .iter()
            .zip(POW10.iter())
            .map(|(d, p)| i64::from(*d) * p)
            .sum()
    }

    /// 全部数位（0 位在前）
    pub fn digits(&self) -> [u8; DIGIT_SLOTS] {
        self.digits
    }
}

impl From<u32> for DigitCode {
    fn from(value: u32) -> Self {
        let mut digits = [0u8; DIGIT_SLOTS];
        let mut rest = value;
        for slot in digits.iter_mut() {
            *slot = (rest % 10) as u8;
            rest /= 10;
        }
        DigitCode { digits }
    }
}

impl TryFrom<i64> for DigitCode {
    type Error = TrackError;

    fn try_from(value: i64) -> Result<Self> {
        if !(0..POW10[DIGIT_SLOTS]).contains(&value) {
            return Err(TrackError::invalid(format!(
                "packed code must be in [0, {}), got {value}",
                POW10[DIGIT_SLOTS]
            )));
        }
        let mut digits = [0u8; DIGIT_SLOTS];
        let mut rest = value;
        for slot in digits.iter_mut() {
            *slot = (rest % 10) as u8;
            rest /= 10;
        }
        Ok(DigitCode { digits })
    }
}

impl From<DigitCode> for i64 {
    fn from(code: DigitCode) -> Self {
        code.value()
    }
}

impl fmt::Display for DigitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_digit_replaces_single_slot() {
        assert_eq!(set_digit(12345, 0, 9).unwrap(), 12349);
        assert_eq!(set_digit(12345, 2, 0).unwrap(), 12045);
        assert_eq!(set_digit(12345, 4, 7).unwrap(), 72345);
        // 超出当前宽度的位按 0 处理
        assert_eq!(set_digit(5, 3, 2).unwrap(), 2005);
        assert_eq!(set_digit(0, 9, 1).unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_set_digit_ten_carries_into_next_slot() {
        // 旧接口接受 10，结果是进位而不是单个数位
        let value = set_digit(0, 0, 10).unwrap();
        assert_eq!(value, 10);
        assert_eq!(get_digit(value, 0).unwrap(), 0);
        assert_eq!(get_digit(value, 1).unwrap(), 1);

        assert_eq!(set_digit(195, 1, 10).unwrap(), 205);
    }

    #[test]
    fn test_set_digit_rejects_bad_arguments() {
        assert!(set_digit(-1, 0, 1).unwrap_err().is_invalid_argument());
        assert!(set_digit(1, 10, 1).unwrap_err().is_invalid_argument());
        assert!(set_digit(1, 0, 11).unwrap_err().is_invalid_argument());
        assert!(set_digit(1, 0, -1).unwrap_err().is_invalid_argument());
        assert!(set_digit(i64::MAX, 9, 9).is_err());
    }

    #[test]
    fn test_get_digit() {
        assert_eq!(get_digit(9876, 0).unwrap(), 6);
        assert_eq!(get_digit(9876, 3).unwrap(), 9);
        assert_eq!(get_digit(9876, 7).unwrap(), 0);
        assert!(get_digit(-5, 0).is_err());
        assert!(get_digit(5, 10).is_err());
    }

    #[test]
    fn test_digit_code_packing() {
        let code = DigitCode::new(1203).unwrap();
        assert_eq!(code.digit(0).unwrap(), 3);
        assert_eq!(code.digit(1).unwrap(), 0);
        assert_eq!(code.digit(3).unwrap(), 1);
        assert_eq!(code.digit(9).unwrap(), 0);
        assert!(code.digit(10).is_err());
        assert_eq!(code.value(), 1203);
        assert_eq!(DigitCode::from(1203u32), code);
        assert_eq!(code.to_string(), "1203");
    }

    #[test]
    fn test_digit_code_bounds() {
        assert!(DigitCode::new(-1).is_err());
        assert!(DigitCode::new(10_000_000_000).is_err());
        assert_eq!(DigitCode::new(9_999_999_999).unwrap().digits(), [9; DIGIT_SLOTS]);
        assert_eq!(DigitCode::from(u32::MAX).value(), i64::from(u32::MAX));

        assert!(DigitCode::ZERO.with_digit(0, 10).is_err());
        assert!(DigitCode::ZERO.with_digit(10, 1).is_err());
    }

    #[test]
    fn test_digit_code_json_is_legacy_integer() {
        let code = DigitCode::ZERO.with_digit(1, 1).unwrap().with_digit(0, 4).unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "14");

        let parsed: DigitCode = serde_json::from_str("14").unwrap();
        assert_eq!(parsed, code);
        assert!(serde_json::from_str::<DigitCode>("-3").is_err());
    }

    proptest! {
        #[test]
        fn prop_set_then_get_roundtrip(
            value in 0i64..1_000_000_000_000,
            index in 0u32..10,
            digit in 0i64..10,
        ) {
            let updated = set_digit(value, index, digit).unwrap();
            prop_assert_eq!(get_digit(updated, index).unwrap(), digit);
            for other in (0u32..10).filter(|i| *i != index) {
                prop_assert_eq!(get_digit(updated, other).unwrap(), get_digit(value, other).unwrap());
            }
            // 第 10 位以上保持不变
            prop_assert_eq!(updated / 10_000_000_000, value / 10_000_000_000);
        }

        #[test]
        fn prop_digit_code_matches_integer_ops(
            value in 0u32..=u32::MAX,
            index in 0usize..10,
            digit in 0u8..10,
        ) {
            let code = DigitCode::from(value).with_digit(index, digit).unwrap();
            let packed = set_digit(i64::from(value), index as u32, i64::from(digit)).unwrap();
            prop_assert_eq!(code.value(), packed);
        }
    }
}

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;

/// 越南盾纸币面额
pub const VALID_DENOMINATIONS: [u32; 9] = [
    1_000, 2_000, 5_000, 10_000, 20_000, 50_000, 100_000, 200_000, 500_000,
];

/// 以千为单位的简写数字
const SHORTHAND_THOUSANDS: [u32; 9] = [1, 2, 5, 10, 20, 50, 100, 200, 500];

/// 归一化标签到面额
pub static DENOMINATION_TABLE: phf::Map<&'static str, u32> = phf_map! {
    "1000" => 1_000,
    "2000" => 2_000,
    "5000" => 5_000,
    "10000" => 10_000,
    "20000" => 20_000,
    "50000" => 50_000,
    "100000" => 100_000,
    "200000" => 200_000,
    "500000" => 500_000,
    "1k" => 1_000,
    "2k" => 2_000,
    "5k" => 5_000,
    "10k" => 10_000,
    "20k" => 20_000,
    "50k" => 50_000,
    "100k" => 100_000,
    "200k" => 200_000,
    "500k" => 500_000,
};

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digit pattern"));

/// 小写、去空格、去掉 "vnd" / "dong"
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace(' ', "")
        .replace("vnd", "")
        .replace("dong", "")
}

/// 类别标签解析为面额，无法识别时返回 0
///
/// 先查表，未命中时取原始标签中的第一串数字：属于千位简写的乘以 1000，
/// 否则按完整面额返回。
pub fn resolve_denomination(label: &str) -> u32 {
    if let Some(&value) = DENOMINATION_TABLE.get(normalize_label(label).as_str()) {
        return value;
    }

    let Some(digits) = DIGITS.find(label) else {
        return 0;
    };
    match digits.as_str().parse::<u32>() {
        Ok(value) if SHORTHAND_THOUSANDS.contains(&value) => value * 1000,
        Ok(value) => value,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_values_are_real_banknotes() {
        for value in DENOMINATION_TABLE.values() {
            assert!(VALID_DENOMINATIONS.contains(value));
        }
        assert_eq!(DENOMINATION_TABLE.len(), 18);
    }

    #[test]
    fn every_table_key_resolves_regardless_of_case_and_spacing() {
        for (key, &value) in DENOMINATION_TABLE.entries() {
            assert_eq!(resolve_denomination(key), value, "{}", key);
            assert_eq!(resolve_denomination(&key.to_uppercase()), value, "{}", key);

            let spaced: String = key.chars().flat_map(|c| [c, ' ']).collect();
            assert_eq!(resolve_denomination(&spaced), value, "{:?}", spaced);
        }
    }

    #[test]
    fn shorthand_thousands() {
        for n in SHORTHAND_THOUSANDS {
            assert_eq!(resolve_denomination(&format!("{}k", n)), n * 1000);
        }
        assert_eq!(resolve_denomination("5k"), 5_000);
        assert_eq!(resolve_denomination("note_20"), 20_000);
    }

    #[test]
    fn currency_suffixes_are_ignored() {
        assert_eq!(resolve_denomination("500000 VND"), 500_000);
        assert_eq!(resolve_denomination("50000dong"), 50_000);
        assert_eq!(resolve_denomination("10 K VND"), 10_000);
    }

    #[test]
    fn digit_fallback_uses_first_run_of_original_label() {
        assert_eq!(resolve_denomination("tien_200000_mat_truoc"), 200_000);
        assert_eq!(resolve_denomination("7 notes 20"), 7);
        assert_eq!(resolve_denomination("v3"), 3);
    }

    #[test]
    fn unknown_labels_resolve_to_zero() {
        assert_eq!(resolve_denomination("Background"), 0);
        assert_eq!(resolve_denomination("banknote"), 0);
        assert_eq!(resolve_denomination(""), 0);
        assert_eq!(resolve_denomination("99999999999999999999"), 0);
    }
}

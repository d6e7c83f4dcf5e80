//! Region detection from node names.

/// A region known to the detector.
#[derive(Debug, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub emoji: &'static str,
    /// Case-insensitive substrings.
    keywords: &'static [&'static str],
    /// Whole-token country codes.
    codes: &'static [&'static str],
}

/// Region used when nothing matches.
pub static UNKNOWN: Region = Region {
    name: "其他",
    emoji: "🌐",
    keywords: &[],
    codes: &[],
};

const REGIONS: &[Region] = &[
    Region { name: "香港", emoji: "🇭🇰", keywords: &["香港", "🇭🇰", "hong kong", "hongkong"], codes: &["HK", "HKG"] },
    Region { name: "台湾", emoji: "🇹🇼", keywords: &["台湾", "台灣", "🇹🇼", "taiwan", "taipei"], codes: &["TW", "TWN"] },
    Region { name: "日本", emoji: "🇯🇵", keywords: &["日本", "东京", "大阪", "🇯🇵", "japan", "tokyo", "osaka"], codes: &["JP", "JPN"] },
    Region { name: "新加坡", emoji: "🇸🇬", keywords: &["新加坡", "狮城", "🇸🇬", "singapore"], codes: &["SG", "SGP"] },
    Region { name: "美国", emoji: "🇺🇸", keywords: &["美国", "美國", "洛杉矶", "硅谷", "🇺🇸", "united states", "los angeles", "seattle"], codes: &["US", "USA"] },
    Region { name: "韩国", emoji: "🇰🇷", keywords: &["韩国", "韓國", "首尔", "🇰🇷", "korea", "seoul"], codes: &["KR", "KOR"] },
    Region { name: "英国", emoji: "🇬🇧", keywords: &["英国", "伦敦", "🇬🇧", "united kingdom", "london"], codes: &["UK", "GB", "GBR"] },
    Region { name: "德国", emoji: "🇩🇪", keywords: &["德国", "法兰克福", "🇩🇪", "germany", "frankfurt"], codes: &["DE", "DEU"] },
    Region { name: "法国", emoji: "🇫🇷", keywords: &["法国", "巴黎", "🇫🇷", "france", "paris"], codes: &["FR", "FRA"] },
    Region { name: "加拿大", emoji: "🇨🇦", keywords: &["加拿大", "🇨🇦", "canada", "toronto"], codes: &["CA", "CAN"] },
    Region { name: "澳大利亚", emoji: "🇦🇺", keywords: &["澳大利亚", "澳洲", "🇦🇺", "australia", "sydney"], codes: &["AU", "AUS"] },
    Region { name: "俄罗斯", emoji: "🇷🇺", keywords: &["俄罗斯", "🇷🇺", "russia", "moscow"], codes: &["RU", "RUS"] },
    Region { name: "印度", emoji: "🇮🇳", keywords: &["印度", "🇮🇳", "india", "mumbai"], codes: &["IN", "IND"] },
    Region { name: "荷兰", emoji: "🇳🇱", keywords: &["荷兰", "🇳🇱", "netherlands", "amsterdam"], codes: &["NL", "NLD"] },
    Region { name: "土耳其", emoji: "🇹🇷", keywords: &["土耳其", "🇹🇷", "turkey", "istanbul"], codes: &["TR", "TUR"] },
];

/// Detect the region of a node name. Keywords win over country codes.
pub fn detect(name: &str) -> &'static Region {
    let lower = name.to_lowercase();
    if let Some(region) = REGIONS
        .iter()
        .find(|r| r.keywords.iter().any(|k| lower.contains(k)))
    {
        return region;
    }

    let tokens: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect();
    REGIONS
        .iter()
        .find(|r| r.codes.iter().any(|code| tokens.iter().any(|t| t == code)))
        .unwrap_or(&UNKNOWN)
}

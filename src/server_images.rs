use crate::models::ServerImageEntry;

/// Last `/`-separated segment of a URL. This is the identifier the backends
/// expect as `path` / `previewFileName`.
pub fn image_name_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// `(date, time, ms)` from a name shaped `..._<YYYYMMDD>_<HHMMSS>_<ms>.<ext>`.
/// Tokens that are missing or not numeric count as zero.
pub fn timestamp_key(file_name: &str) -> (u64, u64, u64) {
    let parts: Vec<&str> = file_name.split('_').collect();
    let token = |from_end: usize| {
        parts
            .len()
            .checked_sub(from_end)
            .and_then(|i| parts.get(i))
            .copied()
            .unwrap_or_default()
    };
    let number = |s: &str| s.parse::<u64>().unwrap_or(0);

    let ms = token(1).split('.').next().unwrap_or_default();
    (number(token(3)), number(token(2)), number(ms))
}

/// Oldest first, keyed on the normal image's file name. Stable for equal keys.
pub fn sort_by_timestamp(entries: &mut [ServerImageEntry]) {
    entries.sort_by_key(|e| timestamp_key(image_name_from_url(&e.normal_url)));
}

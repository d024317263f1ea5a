/// Decides whether a candidate file participates in the merge.
///
/// Main log files (`log_type` present) are aggregated per region: a key
/// qualifies when it contains at least one configured region token as a
/// substring. Without a log type, or with no configured regions, every key
/// qualifies.
pub fn is_eligible(file_key: &str, log_type: Option<&str>, regions: &[String]) -> bool {
    if log_type.is_none() {
        return true;
    }
    if regions.is_empty() {
        return true;
    }
    regions.iter().any(|region| file_key.contains(region.as_str()))
}

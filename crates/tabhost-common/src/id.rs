/// `<prefix>-<12 hex digits>`, short enough to read in logs.
pub fn prefixed_id(prefix: &str) -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &simple[..12])
}

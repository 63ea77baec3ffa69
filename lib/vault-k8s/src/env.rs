use crate::K8sError;

/// Non-empty value of `name`
pub(crate) fn value<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.is_empty())
}

/// Boolean flag, unset means `false`
pub(crate) fn flag<F>(lookup: &F, name: &'static str) -> Result<bool, K8sError>
where
    F: Fn(&str) -> Option<String>,
{
    match value(lookup, name) {
        Some(value) => parse_bool(&value).ok_or(K8sError::InvalidBool { name, value }),
        None => Ok(false),
    }
}

/// Duration in whole seconds, unset means 0
pub(crate) fn seconds<F>(lookup: &F, name: &'static str) -> Result<u64, K8sError>
where
    F: Fn(&str) -> Option<String>,
{
    match value(lookup, name) {
        Some(value) => humantime::parse_duration(&value)
            .map(|d| d.as_secs())
            .map_err(|source| K8sError::InvalidDuration {
                name,
                value,
                source,
            }),
        None => Ok(0),
    }
}

/// Parses the boolean spellings accepted for flags: 1, t, true, 0, f, false
/// in lower, upper or title case
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

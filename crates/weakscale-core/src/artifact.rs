//! JSON artifact persistence

use crate::WeakscaleResult;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// File the ensemble table is written to
pub const ENSEMBLE_CONFIG_FILE: &str = "ensemble_config.json";

/// File the system topology record is written to
pub const SYSTEM_CONFIG_FILE: &str = "system_config.json";

/// File the launcher backend record is written to
pub const LAUNCHER_CONFIG_FILE: &str = "launcher_config.json";

/// Render a value as 4-space indented JSON followed by a newline
pub fn to_json_pretty<T: Serialize>(value: &T) -> WeakscaleResult<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write a value to `path`, replacing whatever was there before
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> WeakscaleResult<()> {
    let bytes = to_json_pretty(value)?;
    std::fs::write(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_four_space_indent() {
        let mut value = BTreeMap::new();
        value.insert("port", vec![8000, 8001]);
        let text = String::from_utf8(to_json_pretty(&value).unwrap()).unwrap();
        assert_eq!(
            text,
            "{\n    \"port\": [\n        8000,\n        8001\n    ]\n}\n"
        );
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");

        write_json(&path, &vec!["a", "b", "c", "d"]).unwrap();
        write_json(&path, &vec!["z"]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec!["z".to_string()]);
    }
}

use super::{ChatExtension, CommandExtension, ExtensionError, ExtensionPipeline, Timestamp, Trim, Window};
use std::path::Path;
use std::sync::Arc;

/// Resolve one extension spec: a built-in name (`trim`, `timestamp`,
/// `window:<n>`) or the path of a `.toml` command manifest.
pub fn load(spec: &str) -> Result<Arc<dyn ChatExtension>, ExtensionError> {
    let spec = spec.trim();
    let load_err = |reason: String| ExtensionError::Load {
        spec: spec.to_string(),
        reason,
    };

    match spec {
        "trim" => return Ok(Arc::new(Trim)),
        "timestamp" => return Ok(Arc::new(Timestamp)),
        _ => {}
    }
    if let Some(size) = spec.strip_prefix("window:") {
        let max: usize = size
            .trim()
            .parse()
            .map_err(|_| load_err(format!("invalid window size '{size}'")))?;
        return Window::new(max)
            .map(|w| Arc::new(w) as Arc<dyn ChatExtension>)
            .map_err(|e| load_err(e.to_string()));
    }

    let path = Path::new(spec);
    if path.extension().is_some_and(|ext| ext == "toml") {
        if !path.is_file() {
            return Err(load_err("file not found".into()));
        }
        return Ok(Arc::new(CommandExtension::from_file(path)?));
    }

    Err(load_err(
        "not a built-in extension (trim, timestamp, window:<n>) or a .toml manifest".into(),
    ))
}

/// Load every spec in order. The first failure aborts.
pub fn load_all<S: AsRef<str>>(specs: &[S]) -> Result<ExtensionPipeline, ExtensionError> {
    let mut pipeline = ExtensionPipeline::new();
    for spec in specs {
        let ext = load(spec.as_ref())?;
        tracing::debug!(extension = ext.name(), "extension loaded");
        pipeline.push(ext);
    }
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtins() {
        assert_eq!(load("trim").unwrap().name(), "trim");
        assert_eq!(load(" timestamp ").unwrap().name(), "timestamp");
        assert_eq!(load("window:6").unwrap().name(), "window:6");
        assert!(matches!(load("window:x"), Err(ExtensionError::Load { .. })));
        assert!(matches!(load("window:0"), Err(ExtensionError::Load { .. })));
    }

    #[test]
    fn test_unknown_spec_rejected() {
        let Err(err) = load("my_module.py") else {
            panic!("expected a load error");
        };
        assert!(matches!(err, ExtensionError::Load { spec, .. } if spec == "my_module.py"));
        assert!(load("/no/such/ext.toml").is_err());
    }

    #[test]
    fn test_manifest_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upper.toml");
        std::fs::write(&path, "name = \"upper\"\non_user_input = \"cat\"\n").unwrap();
        let ext = load(path.to_str().unwrap()).unwrap();
        assert_eq!(ext.name(), "upper");

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "name = \"bad\"\nunknown = 1\n").unwrap();
        assert!(matches!(
            load(bad.to_str().unwrap()),
            Err(ExtensionError::Load { .. })
        ));
    }

    #[test]
    fn test_load_all_preserves_order() {
        let pipeline = load_all(&["trim", "window:2", "timestamp"]).unwrap();
        assert_eq!(pipeline.names(), vec!["trim", "window:2", "timestamp"]);
        assert!(load_all(&["trim", "bogus"]).is_err());
        assert!(load_all::<&str>(&[]).unwrap().is_empty());
    }
}

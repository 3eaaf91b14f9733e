use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::AppError;

use super::codegen::GeneratedSource;

/// Resolve where an EA should be written. A directory target gets the
/// generated file name appended; anything else is used as-is.
pub fn resolve_output_path(source: &GeneratedSource, target: &Path) -> PathBuf {
    if target.is_dir() {
        target.join(&source.filename)
    } else {
        target.to_path_buf()
    }
}

/// Write a generated EA to disk. Returns the path actually written.
pub fn write_generated_source(source: &GeneratedSource, target: &Path) -> Result<PathBuf, AppError> {
    let path = resolve_output_path(source, target);

    let mut file = File::create(&path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", path.display(), e)))?;
    file.write_all(source.code.as_bytes())
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    file.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GeneratedSource {
        GeneratedSource {
            filename: "MyIndicator.mq4".into(),
            code: "void OnTick()\n{\n}\n".into(),
        }
    }

    #[test]
    fn test_write_into_directory_uses_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_generated_source(&sample(), dir.path()).unwrap();
        assert_eq!(written, dir.path().join("MyIndicator.mq4"));
        assert_eq!(std::fs::read_to_string(&written).unwrap(), sample().code);
    }

    #[test]
    fn test_write_to_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Custom_EA.mq4");
        let written = write_generated_source(&sample(), &target).unwrap();
        assert_eq!(written, target);
        assert!(target.exists());
    }

    #[test]
    fn test_missing_parent_is_file_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("EA.mq4");
        let err = write_generated_source(&sample(), &target).unwrap_err();
        assert!(matches!(err, AppError::FileWrite(_)));
    }
}

//! Default classifier: extension and name-pattern based, no content
//! inspection. Destinations are left to the mover's fallback table.

use std::path::Path;

use tracing::info;

use crate::collab::FileClassifier;
use crate::error::Result;
use crate::types::{ClassificationResult, EnvironmentSpec, FileInfo, FileType};

const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "py", "pl", "rb", "ps1"];
const DOCUMENT_EXTENSIONS: &[&str] = &["md", "txt", "rst", "pdf", "doc", "docx"];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml", "ini", "conf", "env"];
const LOG_EXTENSIONS: &[&str] = &["log", "out"];
const TEST_NAME_MARKERS: &[&str] = &["test", "spec"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionClassifier;

impl ExtensionClassifier {
    /// Pure per-file decision: test name markers win, then the
    /// extension tables, then `Other`.
    pub fn classify_path(path: &Path) -> (FileType, f64) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if TEST_NAME_MARKERS.iter().any(|m| name.contains(m)) {
            return (FileType::Test, 0.8);
        }
        if SCRIPT_EXTENSIONS.contains(&extension.as_str()) {
            return (FileType::Script, 0.9);
        }
        if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            return (FileType::Document, 0.9);
        }
        if CONFIG_EXTENSIONS.contains(&extension.as_str()) || name.starts_with(".env") {
            return (FileType::Config, 0.9);
        }
        if LOG_EXTENSIONS.contains(&extension.as_str()) {
            return (FileType::Log, 0.9);
        }
        (FileType::Other, 0.3)
    }
}

impl FileClassifier for ExtensionClassifier {
    fn classify(
        &self,
        environment: &EnvironmentSpec,
        files: &[FileInfo],
    ) -> Result<Vec<ClassificationResult>> {
        let results: Vec<ClassificationResult> = files
            .iter()
            .map(|file| {
                let (file_type, confidence) = Self::classify_path(&file.path);
                ClassificationResult {
                    file: file.clone(),
                    file_type,
                    target_path: None,
                    confidence,
                }
            })
            .collect();
        info!(
            "{}: classified {} files",
            environment.name,
            results.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extension_tables() {
        let cases = [
            ("deploy.sh", FileType::Script),
            ("notes.md", FileType::Document),
            ("app.toml", FileType::Config),
            ("server.log", FileType::Log),
            ("payload.bin", FileType::Other),
        ];
        for (name, expected) in cases {
            let (file_type, _) = ExtensionClassifier::classify_path(&PathBuf::from(name));
            assert_eq!(file_type, expected, "{}", name);
        }
    }

    #[test]
    fn test_test_markers_win_over_extension() {
        let (file_type, _) =
            ExtensionClassifier::classify_path(&PathBuf::from("integration_test.sh"));
        assert_eq!(file_type, FileType::Test);
    }

    #[test]
    fn test_dotenv_is_config() {
        let (file_type, _) = ExtensionClassifier::classify_path(&PathBuf::from(".env.production"));
        assert_eq!(file_type, FileType::Config);
    }

    #[test]
    fn test_results_position_correlated() {
        let files = vec![FileInfo::new("/a/one.sh", 1), FileInfo::new("/a/two.md", 2)];
        let env = EnvironmentSpec::local("test", "/a");
        let results = ExtensionClassifier.classify(&env, &files).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file, files[0]);
        assert_eq!(results[1].file, files[1]);
    }
}

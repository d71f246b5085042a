use std::path::{Path, PathBuf};

use crate::error::PipelineError;

const RUNS_DIR: &str = "_runs";
const REPORT_DIR: &str = "report";

/// Directory scheme under the output root.
///
/// ```text
/// <root>/<country>/<country>.csv                       merged country export
/// <root>/<country>/<top>/.../<code>/<code>_<country>.csv
/// <root>/<country>/<top>/.../<code>/<code>_<country>.summary.json
/// <root>/<country>/report/<country>_<keyword>.csv           keyword report
/// <root>/<country>/report/<country>_<keyword>.summary.json
/// <root>/_runs/run_<timestamp>.json
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Country directories present under the root, sorted. Names starting with `_` or `.`
    /// are bookkeeping, not countries.
    pub fn countries(&self) -> Result<Vec<String>, PipelineError> {
        if !self.root.is_dir() {
            return Err(PipelineError::missing_input(&self.root, "output root does not exist"));
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            out.push(name);
        }
        out.sort();
        Ok(out)
    }

    pub fn country_dir(&self, country: &str) -> PathBuf {
        self.root.join(country)
    }

    pub fn country_csv(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(format!("{country}.csv"))
    }

    pub fn partition_dir<S: AsRef<str>>(&self, country: &str, codes: &[S]) -> PathBuf {
        let mut dir = self.country_dir(country);
        for code in codes {
            dir.push(code.as_ref());
        }
        dir
    }

    pub fn partition_csv<S: AsRef<str>>(&self, country: &str, codes: &[S]) -> PathBuf {
        let code = leaf_code(codes);
        self.partition_dir(country, codes)
            .join(format!("{code}_{country}.csv"))
    }

    pub fn summary_json<S: AsRef<str>>(&self, country: &str, codes: &[S]) -> PathBuf {
        let code = leaf_code(codes);
        self.partition_dir(country, codes)
            .join(format!("{code}_{country}.summary.json"))
    }

    pub fn keyword_csv(&self, country: &str, keyword: &str) -> PathBuf {
        self.keyword_dir(country)
            .join(format!("{country}_{}.csv", keyword_slug(keyword)))
    }

    pub fn keyword_summary_json(&self, country: &str, keyword: &str) -> PathBuf {
        self.keyword_dir(country)
            .join(format!("{country}_{}.summary.json", keyword_slug(keyword)))
    }

    fn keyword_dir(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(REPORT_DIR)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR)
    }
}

fn leaf_code<S: AsRef<str>>(codes: &[S]) -> &str {
    codes.last().map(|c| c.as_ref()).unwrap_or_default()
}

/// File-name form of a keyword: trimmed, inner spaces as `_`.
pub fn keyword_slug(keyword: &str) -> String {
    keyword.trim().replace(' ', "_")
}

/// Whether `name` can be used as a single path component under the output root.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('_')
        && !name.contains(['/', '\\', '\0'])
}

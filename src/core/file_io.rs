use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ConfigError;

pub fn extract_base_name(path: &str) -> &str {
    Path::new(path)
        .file_stem() // Get the base name component of the path
        .and_then(|name| name.to_str())
        .unwrap_or("params")
}

/// `out/<command>/<params stem>[/<datetime>]`, created if missing.
pub fn build_output_path_with_date_time(
    params_path: &str,
    command: &str,
    datetime: &Option<String>,
) -> std::io::Result<PathBuf> {
    let mut dirs = vec!["out", command, extract_base_name(params_path)];
    if let Some(inner_datetime_str) = datetime {
        dirs.push(inner_datetime_str);
    }

    let directory_path: PathBuf = dirs.iter().collect();
    std::fs::create_dir_all(&directory_path)?;
    Ok(directory_path)
}

pub fn date_time_string() -> String {
    use chrono::{Datelike, Local, Timelike};
    let local_time = Local::now();
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        local_time.year(),
        local_time.month(),
        local_time.day(),
        local_time.hour(),
        local_time.minute(),
        local_time.second()
    )
}

pub fn maybe_date_time_string(enable: bool) -> Option<String> {
    if enable {
        Some(date_time_string())
    } else {
        None
    }
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/**
 * Store a path and prefix together, making it easily to quickly generate
 * a collection of files with the same prefix, but separate suffixes.
 */
pub struct FilePrefix {
    pub directory_path: PathBuf,
    pub file_base: String,
}

impl FilePrefix {
    pub fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.directory_path.join(self.file_base.clone() + suffix)
    }

    pub fn write_json<T: Serialize>(&self, suffix: &str, value: &T) -> Result<PathBuf, ConfigError> {
        let path = self.with_suffix(suffix);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_directory_and_extension() {
        assert_eq!(extract_base_name("params/optimize/classical.json"), "classical");
    }

    #[test]
    fn date_time_string_has_fixed_width() {
        let s = date_time_string();
        assert_eq!(s.len(), 15);
        assert_eq!(&s[8..9], "_");
    }

    #[test]
    fn file_prefix_appends_suffix() {
        let prefix = FilePrefix {
            directory_path: PathBuf::from("out/optimize/classical"),
            file_base: "classical".to_owned(),
        };
        assert_eq!(
            prefix.with_suffix("_result.json"),
            PathBuf::from("out/optimize/classical/classical_result.json")
        );
    }
}

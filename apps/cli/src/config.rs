use std::{collections::HashMap, fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            download_dir: PathBuf::from("."),
        }
    }
}

/// Defaults, then `sheetsplit.toml` next to the binary, then environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("sheetsplit.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_config(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("SHEETSPLIT_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("SHEETSPLIT_DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }

    settings
}

fn apply_file_config(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("download_dir") {
        settings.download_dir = PathBuf::from(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_service() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:5000");
        assert_eq!(settings.download_dir, PathBuf::from("."));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("server_url".to_string(), "http://splitter:5000".to_string());
        file_cfg.insert("download_dir".to_string(), "/tmp/out".to_string());
        apply_file_config(&mut settings, &file_cfg);
        assert_eq!(settings.server_url, "http://splitter:5000");
        assert_eq!(settings.download_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn unknown_file_keys_are_ignored() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("upload_url".to_string(), "http://elsewhere".to_string());
        apply_file_config(&mut settings, &file_cfg);
        assert_eq!(settings.server_url, "http://127.0.0.1:5000");
    }
}

use std::{env, path::{Path, PathBuf}};

pub const BRIDGE_ROOT_ENV: &str = "DISCORD_BRIDGE_ROOT";
pub const BRIDGE_DATA_DIR_ENV: &str = "DISCORD_BRIDGE_DATA_DIR";

pub fn get_bridge_root_dir() -> PathBuf {
    if let Ok(root) = env::var(BRIDGE_ROOT_ENV) {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }

    if cfg!(target_os = "windows") {
        let user_data_dir = env::var("APPDATA").unwrap_or_else(|_| {
            env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string())
        });
        Path::new(&user_data_dir).join("discord-bridge")
    } else {
        Path::new("/opt/discord-bridge").to_path_buf()
    }
}

pub fn get_bridge_etc_dir() -> PathBuf {
    get_bridge_root_dir().join("etc")
}

pub fn get_bridge_data_dir() -> PathBuf {
    if let Ok(dir) = env::var(BRIDGE_DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    get_bridge_root_dir().join("data")
}

pub fn get_default_config_path() -> PathBuf {
    get_bridge_etc_dir().join("config.toml")
}

// services log under the root dir, interactive tools under the temp dir
pub fn get_bridge_log_dir(service: &str, is_service: bool) -> PathBuf {
    if is_service {
        get_bridge_root_dir().join("logs").join(service)
    } else {
        env::temp_dir().join("discord-bridge").join("logs")
    }
}

pub fn get_log_file_path(service: &str, is_service: bool) -> PathBuf {
    get_bridge_log_dir(service, is_service).join(format!("{}.log", service))
}

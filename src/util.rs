const CONFIG_PATH: &str = "PLAYER_STORE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "player-store.json";

pub fn get_default_config_path() -> &'static str {
    DEFAULT_CONFIG_PATH
}

/// Config file path: explicit argument, then `PLAYER_STORE_CONFIG`, then the default
pub fn get_config_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    let path_from_env = std::env::var(CONFIG_PATH);
    path_from_env
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

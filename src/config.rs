use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub net: NetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// ローカル観測が途絶えてからトラックを破棄するまでのフレーム数
    #[serde(default = "default_timeout_frames")]
    pub timeout_frames: u32,
    /// 単独観測時に仮定する視距離（メートル）
    #[serde(default = "default_assumed_depth")]
    pub assumed_depth: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// 画像の横縦比（幅/高さ）
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetConfig {
    /// ピア接続の待ち受けアドレス
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_timeout_frames() -> u32 { 100 }
fn default_assumed_depth() -> f32 { 0.5 }
fn default_aspect_ratio() -> f32 { 4.0 / 3.0 }
fn default_listen_addr() -> String { "0.0.0.0:47800".to_string() }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_frames: default_timeout_frames(),
            assumed_depth: default_assumed_depth(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.session.timeout_frames, 100);
        assert!((config.session.assumed_depth - 0.5).abs() < 1e-6);
        assert!((config.camera.aspect_ratio - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[session]\ntimeout_frames = 30\n").unwrap();
        assert_eq!(config.session.timeout_frames, 30);
        assert!((config.session.assumed_depth - 0.5).abs() < 1e-6);
        assert_eq!(config.net.listen_addr, "0.0.0.0:47800");
    }
}

// Copyright (C) 2026 The Render Farm Client Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Typed read/write of the external settings blob a GUI layer persists
//! between runs. The core only needs load/save of this shape — no
//! file-watching, no schema migration.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::RenderType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastClient {
    pub name: String,
    pub address: String,
    pub render_type: RenderType,
    pub performance: f64,
    pub pass: String,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub use_networked: bool,
    pub net_path_windows: Option<String>,
    pub net_path_linux: Option<String>,
    #[serde(rename = "netPathMacOS")]
    pub net_path_mac_os: Option<String>,
}

/// `option_*` booleans keep their snake-style prefix literally, per the
/// persisted schema — not camelCased like the rest of the blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderFarmOptions {
    pub option_auto_reconnect: bool,
    pub option_minimize_to_tray: bool,
    pub option_confirm_on_close: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFarmSettings {
    pub local_blend_files: Vec<String>,
    pub listen_for_broadcasts: bool,
    pub last_version: String,
    pub history: Vec<String>,
    pub past_clients: HashMap<String, PastClient>,
    pub project_settings: HashMap<String, ProjectSettings>,
    #[serde(flatten)]
    pub options: RenderFarmOptions,
}

impl RenderFarmSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = RenderFarmSettings {
            last_version: "1.1.3".into(),
            listen_for_broadcasts: true,
            ..Default::default()
        };
        settings.past_clients.insert(
            "node-a".into(),
            PastClient {
                name: "node-a".into(),
                address: "10.0.0.5:8080".into(),
                render_type: RenderType::Cuda,
                performance: 1.0,
                pass: "secret".into(),
                mac: Some("AA:BB:CC:DD:EE:FF".into()),
            },
        );
        settings.save(&path).unwrap();

        let loaded = RenderFarmSettings::load(&path).unwrap();
        assert_eq!(loaded.last_version, "1.1.3");
        assert!(loaded.listen_for_broadcasts);
        assert_eq!(loaded.past_clients["node-a"].name, "node-a");
    }

    #[test]
    fn on_disk_keys_are_camel_case_except_option_prefixed_fields() {
        let mut settings = RenderFarmSettings {
            last_version: "1.1.3".into(),
            ..Default::default()
        };
        settings.project_settings.insert(
            "C:/scene.blend".into(),
            ProjectSettings {
                use_networked: true,
                net_path_windows: Some(r"\\share\scene.blend".into()),
                net_path_linux: Some("/mnt/share/scene.blend".into()),
                net_path_mac_os: Some("/Volumes/share/scene.blend".into()),
            },
        );

        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("lastVersion").is_some());
        assert!(json.get("localBlendFiles").is_some());
        assert!(json.get("listenForBroadcasts").is_some());
        assert!(json.get("pastClients").is_some());
        assert!(json.get("projectSettings").is_some());
        assert!(json.get("option_auto_reconnect").is_some());

        let nested = &json["projectSettings"]["C:/scene.blend"];
        assert!(nested.get("useNetworked").is_some());
        assert!(nested.get("netPathWindows").is_some());
        assert!(nested.get("netPathLinux").is_some());
        assert!(nested.get("netPathMacOS").is_some());

        let round_tripped: RenderFarmSettings = serde_json::from_value(json).unwrap();
        assert!(round_tripped.project_settings["C:/scene.blend"].use_networked);
    }
}

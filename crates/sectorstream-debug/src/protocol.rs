//! Debug protocol - JSON command/response definitions

use serde::{Deserialize, Serialize};

/// Commands accepted by the debug server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum DebugCommand {
    /// Ping (health check)
    Ping,
    /// Residency counters
    GetStreamingStats,
    /// Names of sectors that currently have an engine object
    ListResidentSectors,
    /// Full state of one sector
    GetSectorInfo { name: String },
    /// Move the observer, as the gameplay layer would
    UpdatePosition {
        x: f32,
        y: f32,
        z: f32,
        sector: String,
        #[serde(default)]
        force: bool,
    },
}

/// Responses from debug server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DebugResponse {
    #[serde(rename = "ok")]
    Ok { data: ResponseData },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    None,
    Pong { message: String },
    StreamingStats(StatsInfo),
    SectorList { sectors: Vec<String> },
    SectorInfo(SectorInfo),
    PositionUpdated {
        sector: Option<String>,
        updates: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsInfo {
    pub current_sector: Option<String>,
    pub updates: u64,
    pub sectors: usize,
    pub resident_sectors: usize,
    pub loaded_meshes: usize,
    pub pending_meshes: usize,
    pub failed_meshes: usize,
    pub active_portals: usize,
    pub resident_lights: usize,
    pub ready_textures: usize,
    pub ready_materials: usize,
    pub ready_factories: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorInfo {
    pub name: String,
    pub resident: bool,
    /// Referenced by a portal but never defined
    pub stub: bool,
    pub ambient: Option<[f32; 3]>,
    pub resident_children: usize,
    pub inbound_portals: usize,
    pub meshes: Vec<MeshInfo>,
    pub portals: Vec<PortalInfo>,
    pub lights: Vec<LightInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshInfo {
    pub name: String,
    /// unloaded, pending, discarding, loaded or failed
    pub state: String,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalInfo {
    pub name: String,
    pub target: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightInfo {
    pub name: String,
    pub resident: bool,
    pub radius: f32,
}

impl DebugResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self::Ok { data }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error {
            message: msg.into(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(ResponseData::Pong {
            message: "pong".into(),
        })
    }

    pub fn none() -> Self {
        Self::ok(ResponseData::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd: DebugCommand = serde_json::from_str(
            r#"{"cmd":"UpdatePosition","params":{"x":1.0,"y":2.0,"z":3.0,"sector":"hall"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            DebugCommand::UpdatePosition {
                x: 1.0,
                y: 2.0,
                z: 3.0,
                sector: "hall".into(),
                force: false,
            }
        );

        let ping: DebugCommand = serde_json::from_str(r#"{"cmd":"Ping"}"#).unwrap();
        assert_eq!(ping, DebugCommand::Ping);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<DebugCommand>(r#"{"cmd":"Explode"}"#).is_err());
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_value(DebugResponse::pong()).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["data"]["message"], "pong");

        let json = serde_json::to_value(DebugResponse::error("no such sector")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "no such sector");

        let list = DebugResponse::ok(ResponseData::SectorList {
            sectors: vec!["A".into(), "B".into()],
        });
        let json = serde_json::to_value(list).unwrap();
        assert_eq!(json["data"]["sectors"][1], "B");
    }

    #[test]
    fn test_stats_flatten_into_data() {
        let stats = StatsInfo {
            current_sector: Some("hall".into()),
            loaded_meshes: 4,
            ..Default::default()
        };
        let json = serde_json::to_value(DebugResponse::ok(ResponseData::StreamingStats(stats))).unwrap();
        assert_eq!(json["data"]["current_sector"], "hall");
        assert_eq!(json["data"]["loaded_meshes"], 4);
    }
}

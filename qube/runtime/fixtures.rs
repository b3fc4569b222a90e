//! Shared builders for unit tests.

use serde_json::{json, Value};

use crate::deserializer::TokenPixel;

#[derive(Debug, Clone)]
pub struct PixelTemplate {
    pub id: &'static str,
    pub phi: f64,
    pub psi: f64,
    pub omega: f64,
    pub autonomy: f64,
    pub signature: &'static str,
    pub intent: &'static str,
    pub corridor: &'static str,
}

impl Default for PixelTemplate {
    fn default() -> Self {
        Self {
            id: "tp-0001",
            phi: 0.3,
            psi: 0.9,
            omega: 1.0,
            autonomy: 0.1,
            signature: "voxel:0x00000000",
            intent: "sha256:9f2c8d1e",
            corridor: "DISTRICT_1.CHAMBER_0.NODE_START",
        }
    }
}

pub fn pixel_json(template: &PixelTemplate) -> Value {
    json!({
        "tokenPixelId": template.id,
        "timestamp": 1_700_000_000.5,
        "agentId": "agent-q",
        "corridor": template.corridor,
        "stateVector": {
            "phi": template.phi,
            "psi": template.psi,
            "omega": template.omega,
            "tau": 12.0
        },
        "intentHash": template.intent,
        "eventDelta": "delta:noop",
        "autonomyIndex": template.autonomy,
        "voxelSignature": template.signature,
        "prevHash": "sha256:prev",
        "hash": "sha256:self"
    })
}

pub fn pixel(template: &PixelTemplate) -> TokenPixel {
    serde_json::from_value(pixel_json(template)).unwrap()
}
